use bignum::BigNumTrait;
pub use bignum::NumBigInt as BigNum;
use failure::Error;
use mac::hmac_sha256;
use protocol::{unpack, Value};
use rand::Rng;
use sha2::{Digest, Sha256};

const N_HEX: &str = "\
    ffffffffffffffffc90fdaa22168c234c4c6628b80dc1cd129024e088a67cc74\
    020bbea63b139b22514a08798e3404ddef9519b3cd3a431b302b0a6df25f1437\
    4fe1356d6d51c245e485b576625e7ec6f44c42e9a637ed6b0bff5cb6f406b7ed\
    ee386bfb5a899fa5ae9f24117c4b1fe649286651ece45b3dc2007cb8a163bf05\
    98da48361c55d39a69163fa8fd24cf5f83655d23dca3ad961c62f356208552bb\
    9ed529077096966d670c354e4abc9804f1746c08ca237327ffffffffffffffff";

pub const G: u32 = 2;
pub const K: u32 = 3;
pub const SALT_SIZE: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SrpStep {
    ClientKey,
    ServerKey,
    ClientProof,
    ServerProof,
    ClientAuthenticated,
}

pub(crate) const SRP_STEPS: &[SrpStep] = &[
    SrpStep::ClientKey,
    SrpStep::ServerKey,
    SrpStep::ClientProof,
    SrpStep::ServerProof,
    SrpStep::ClientAuthenticated,
];

#[derive(Debug)]
pub struct SRP {
    N: BigNum,
    g: BigNum,
    k: BigNum,
}

pub fn serialize<T: BigNumTrait>(x: &T) -> Vec<u8> {
    x.to_bytes_be()
}

pub fn deserialize<T: BigNumTrait>(x: &[u8]) -> T {
    T::from_bytes_be(x)
}

impl SRP {
    pub fn new() -> Result<Self, Error> {
        Self::new_with_k(K)
    }

    pub fn new_with_k(k: u32) -> Result<Self, Error> {
        Ok(SRP {
            N: BigNum::from_hex_str(N_HEX)?,
            g: BigNum::from_u32(G),
            k: BigNum::from_u32(k),
        })
    }

    pub fn g(&self) -> &BigNum {
        &self.g
    }

    pub fn N(&self) -> &BigNum {
        &self.N
    }

    pub fn k(&self) -> &BigNum {
        &self.k
    }

    /// Draws a salt and returns it with the verifier `g^x mod N`.
    pub fn password_to_verifier(&self, identifier: &[u8], password: &[u8]) -> (Vec<u8>, BigNum) {
        let mut rng = rand::thread_rng();
        let salt: Vec<u8> = (0..SALT_SIZE).map(|_| rng.gen()).collect();
        let v = self.verifier(&salt, identifier, password);
        (salt, v)
    }

    pub fn verifier(&self, salt: &[u8], identifier: &[u8], password: &[u8]) -> BigNum {
        let x = compute_x(salt, identifier, password);
        self.g.mod_exp(&x, &self.N)
    }

    /// An ephemeral exponent with its power of g.
    pub fn ephemeral(&self) -> (BigNum, BigNum) {
        let exponent = BigNum::gen_below(&self.N);
        let power = self.g.mod_exp(&exponent, &self.N);
        (exponent, power)
    }
}

fn hash_to_int(parts: &[&[u8]]) -> BigNum {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    deserialize(&hasher.finalize())
}

pub fn compute_x(salt: &[u8], identifier: &[u8], password: &[u8]) -> BigNum {
    hash_to_int(&[salt, identifier, password])
}

pub fn compute_u(A: &BigNum, B: &BigNum) -> BigNum {
    hash_to_int(&[&serialize(A)[..], &serialize(B)[..]])
}

/// The proof exchanged by both sides: `HMAC-SHA256(SHA256(S), salt)`.
pub fn hash_secret(S: &BigNum, salt: &[u8]) -> Vec<u8> {
    let key = Sha256::digest(&serialize(S)).to_vec();
    hmac_sha256(&key, salt)
}

/// How the scrambling parameter u is agreed on, and how the server key message is laid out.
pub trait UComputer {
    /// Multiplier of the verifier in B.
    const K: u32;

    fn server_u(A: &BigNum, B: &BigNum) -> BigNum;

    fn encode_server_key(salt: Vec<u8>, B: BigNum, u: BigNum) -> Vec<Value>;

    /// Returns `(salt, B, u)`.
    fn decode_server_key(args: Vec<Value>, A: &BigNum) -> Result<(Vec<u8>, BigNum, BigNum), Error>;
}

/// u is the hash of both public keys and never sent.
pub struct DefaultUComputer;

impl UComputer for DefaultUComputer {
    const K: u32 = K;

    fn server_u(A: &BigNum, B: &BigNum) -> BigNum {
        compute_u(A, B)
    }

    fn encode_server_key(salt: Vec<u8>, B: BigNum, _: BigNum) -> Vec<Value> {
        vec![salt.into(), B.into()]
    }

    fn decode_server_key(args: Vec<Value>, A: &BigNum) -> Result<(Vec<u8>, BigNum, BigNum), Error> {
        let [salt, B] = unpack::<2>(args)?;
        let B = B.into_int()?;
        let u = compute_u(A, &B);
        Ok((salt.into_bytes()?, B, u))
    }
}

/// u is a random 128 bit number chosen by the server, and `B = g^b`.
pub struct SimplifiedUComputer;

impl UComputer for SimplifiedUComputer {
    const K: u32 = 0;

    fn server_u(_: &BigNum, _: &BigNum) -> BigNum {
        BigNum::gen_random(128)
    }

    fn encode_server_key(salt: Vec<u8>, B: BigNum, u: BigNum) -> Vec<Value> {
        vec![salt.into(), B.into(), u.into()]
    }

    fn decode_server_key(args: Vec<Value>, _: &BigNum) -> Result<(Vec<u8>, BigNum, BigNum), Error> {
        let [salt, B, u] = unpack::<3>(args)?;
        Ok((salt.into_bytes()?, B.into_int()?, u.into_int()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_depends_on_salt() {
        let srp = SRP::new().unwrap();
        let (salt1, v1) = srp.password_to_verifier(b"pablo", b"12345");
        let (salt2, v2) = srp.password_to_verifier(b"pablo", b"12345");
        assert_eq!(SALT_SIZE, salt1.len());
        assert_eq!(salt1 == salt2, v1 == v2);
        assert_eq!(v1, srp.verifier(&salt1, b"pablo", b"12345"));
    }

    #[test]
    fn proof_is_keyed_by_the_shared_secret() {
        let hex = |bytes: Vec<u8>| -> String {
            bytes.iter().map(|b| format!("{:02x}", b)).collect()
        };
        let S = BigNum::from_u32(12345);
        assert_eq!(
            "068d8bc1316433d02eb57a22ffe38a973c440049949d8ff177345a01d0e8dd59",
            hex(hash_secret(&S, b"salt"))
        );
        assert_ne!(hash_secret(&S, b"salt"), hash_secret(&S, b"pepper"));
        assert_ne!(
            hash_secret(&S, b"salt"),
            hash_secret(&BigNum::from_u32(12346), b"salt")
        );
    }

    #[test]
    fn simplified_key_layout() {
        let A = BigNum::from_u32(5);
        let args =
            SimplifiedUComputer::encode_server_key(vec![1, 2], BigNum::from_u32(7), BigNum::one());
        let (salt, B, u) = SimplifiedUComputer::decode_server_key(args, &A).unwrap();
        assert_eq!(vec![1, 2], salt);
        assert_eq!(BigNum::from_u32(7), B);
        assert_eq!(BigNum::one(), u);

        let args = DefaultUComputer::encode_server_key(Vec::new(), B, u);
        assert_eq!(2, args.len());
        assert!(SimplifiedUComputer::decode_server_key(args, &A).is_err());
    }
}
