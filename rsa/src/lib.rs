#[macro_use]
extern crate failure;

pub mod pkcs1;

use bignum::{to_bytes_be_padded, BigNumExt, BigNumTrait};
use failure::Error;
use num_traits::NumOps;
use tracing::debug;

pub use pkcs1::{pkcs1_pad, pkcs1_unpad, BlockType, SHA1_DIGEST_INFO};

pub const E: u32 = 3;

#[derive(Debug, Fail)]
pub enum RsaError {
    #[fail(display = "message does not fit into the modulus")]
    MessageTooLong,

    #[fail(display = "invalid PKCS#1 padding")]
    InvalidPadding,

    #[fail(display = "signature does not match the message")]
    BadSignature,
}

pub struct Rsa<T> {
    n: T,
    d: T,
    e: T,
}

#[derive(Debug)]
pub struct RsaPublic<T> {
    n: T,
    e: T,
}

impl<T: BigNumTrait> Rsa<T>
where
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    /// Generates a key with public exponent 3 whose modulus has `bits` bits.
    pub fn generate(bits: usize) -> Self {
        let e = T::from_u32(E);
        let one = T::one();
        loop {
            let p = T::gen_prime(bits / 2);
            let q = T::gen_prime(bits - bits / 2);
            if p == q {
                continue;
            }
            let n = &p * &q;
            let et = &(&p - &one) * &(&q - &one);
            // e has no inverse whenever it divides p - 1 or q - 1; draw new primes then.
            match e.mod_inverse(&et) {
                Ok(d) => {
                    debug!(bits = n.bits(), "generated RSA key");
                    return Rsa { n, d, e };
                }
                Err(_) => continue,
            }
        }
    }

    pub fn public_key(&self) -> RsaPublic<T> {
        RsaPublic {
            n: T::clone(&self.n),
            e: T::clone(&self.e),
        }
    }

    pub fn encrypt(&self, m: &T) -> T {
        m.mod_exp(&self.e, &self.n)
    }

    pub fn decrypt(&self, c: &T) -> T {
        c.mod_exp(&self.d, &self.n)
    }

    pub fn n(&self) -> &T {
        &self.n
    }

    pub fn e(&self) -> &T {
        &self.e
    }

    /// Size of the modulus in bytes.
    pub fn k(&self) -> usize {
        self.n.bytes()
    }

    /// Encrypts the bytes as a big endian integer, which must be smaller than the modulus.
    pub fn encrypt_bytes(&self, m: &[u8]) -> Result<Vec<u8>, Error> {
        self.public_key().encrypt_bytes(m)
    }

    /// Decrypts to exactly `k` bytes, keeping leading zeros.
    pub fn decrypt_bytes(&self, c: &[u8]) -> Vec<u8> {
        to_bytes_be_padded(&self.decrypt(&T::from_bytes_be(c)), self.k())
    }

    /// PKCS#1 v1.5 signature over the SHA-1 digest of `message`.
    pub fn sign(&self, message: &[u8]) -> Result<T, Error> {
        let block = pkcs1::signature_block(message, self.k())?;
        Ok(self.decrypt(&T::from_bytes_be(&block)))
    }
}

impl<T: BigNumTrait> RsaPublic<T>
where
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    pub fn encrypt(&self, m: &T) -> T {
        m.mod_exp(&self.e, &self.n)
    }

    pub fn n(&self) -> &T {
        &self.n
    }

    pub fn e(&self) -> &T {
        &self.e
    }

    pub fn k(&self) -> usize {
        self.n.bytes()
    }

    pub fn encrypt_bytes(&self, m: &[u8]) -> Result<Vec<u8>, Error> {
        let m = T::from_bytes_be(m);
        if m >= self.n {
            return Err(RsaError::MessageTooLong.into());
        }
        Ok(to_bytes_be_padded(&self.encrypt(&m), self.k()))
    }

    /// The signature block `s^e mod n` as `k` bytes.
    fn signature_block(&self, signature: &T) -> Vec<u8> {
        to_bytes_be_padded(&self.encrypt(signature), self.k())
    }

    /// Strict verification: the whole block must be the expected padded digest.
    pub fn verify(&self, message: &[u8], signature: &T) -> Result<(), Error> {
        let expected = pkcs1::signature_block(message, self.k())?;
        if self.signature_block(signature) != expected {
            return Err(RsaError::BadSignature.into());
        }
        Ok(())
    }

    /// Verification that parses `00 01 FF.. 00 DigestInfo hash` from the left and ignores
    /// whatever follows the hash.
    pub fn verify_sloppy(&self, message: &[u8], signature: &T) -> Result<(), Error> {
        let block = self.signature_block(signature);
        if pkcs1::sloppy_digest(&block) != Some(mac::sha1(message)) {
            return Err(RsaError::BadSignature.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bignum::{NumBigInt, OpensslBigNum};

    #[test]
    fn encrypt_decrypt() {
        let rsa = Rsa::<OpensslBigNum>::generate(512);
        assert_eq!(512, rsa.n().bits());
        let m = <OpensslBigNum as BigNumTrait>::from_u32(42);
        assert_eq!(m, rsa.decrypt(&rsa.encrypt(&m)));
    }

    #[test]
    fn text_round_trip() {
        let rsa = Rsa::<NumBigInt>::generate(512);
        let message = b"There are two annoying things about implementing RSA.";
        let ciphertext = rsa.encrypt_bytes(message).unwrap();
        assert_eq!(rsa.k(), ciphertext.len());
        let cleartext = rsa.decrypt_bytes(&ciphertext);
        assert_eq!(&message[..], &cleartext[cleartext.len() - message.len()..]);
        assert!(cleartext[..cleartext.len() - message.len()].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_oversized_message() {
        let rsa = Rsa::<OpensslBigNum>::generate(256);
        let err = rsa.encrypt_bytes(&[0xff; 40]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RsaError>(),
            Some(RsaError::MessageTooLong)
        ));
    }

    #[test]
    fn signatures() {
        let rsa = Rsa::<OpensslBigNum>::generate(1024);
        let public = rsa.public_key();
        let signature = rsa.sign(b"hi mom").unwrap();
        assert!(public.verify(b"hi mom", &signature).is_ok());
        assert!(public.verify_sloppy(b"hi mom", &signature).is_ok());
        assert!(public.verify(b"hi dad", &signature).is_err());
        assert!(public.verify_sloppy(b"hi dad", &signature).is_err());
    }
}
