use bignum::BigNumTrait;
use failure::Error;

pub const NIST_P_HEX: &str = "\
    ffffffffffffffffc90fdaa22168c234c4c6628b80dc1cd129024e088a67cc74\
    020bbea63b139b22514a08798e3404ddef9519b3cd3a431b302b0a6df25f1437\
    4fe1356d6d51c245e485b576625e7ec6f44c42e9a637ed6b0bff5cb6f406b7ed\
    ee386bfb5a899fa5ae9f24117c4b1fe649286651ece45b3dc2007cb8a163bf05\
    98da48361c55d39a69163fa8fd24cf5f83655d23dca3ad961c62f356208552bb\
    9ed529077096966d670c354e4abc9804f1746c08ca237327ffffffffffffffff";

pub const G: u32 = 2;

pub struct DH<T> {
    p: T,
    g: T,
    a: T,
    public: T,
}

/// AES key derived from a shared secret: the first 16 bytes of its SHA-1 digest.
pub fn secret_to_key<T: BigNumTrait>(s: &T) -> Vec<u8> {
    mac::sha1(&s.to_bytes_be())[..16].to_vec()
}

impl<T: BigNumTrait> DH<T> {
    /// Key pair in the NIST group.
    pub fn new() -> Result<Self, Error> {
        Ok(Self::with_parameters(
            T::from_hex_str(NIST_P_HEX)?,
            T::from_u32(G),
        ))
    }

    pub fn with_parameters(p: T, g: T) -> Self {
        let a = T::gen_below(&p);
        let public = g.mod_exp(&a, &p);
        DH { p, g, a, public }
    }

    pub fn p(&self) -> &T {
        &self.p
    }

    pub fn g(&self) -> &T {
        &self.g
    }

    pub fn public_key(&self) -> &T {
        &self.public
    }

    pub fn compute_secret(&self, other: &T) -> T {
        other.mod_exp(&self.a, &self.p)
    }

    pub fn shared_key(&self, other: &T) -> Vec<u8> {
        secret_to_key(&self.compute_secret(other))
    }
}
