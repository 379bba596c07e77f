//! RSA servers that leak one bit per query, and one that refuses replays.

use std::collections::HashSet;

use bignum::OpensslBigNum as BigNum;
use bignum::{to_bytes_be_padded, BigNumTrait};
use failure::Error;
use rsa::{pkcs1_pad, pkcs1_unpad, BlockType, Rsa, RsaPublic};
use tracing::debug;

use crate::{compare, OracleError};

/// Decrypts any ciphertext, but only once: the SHA-1 of every ciphertext it has seen is kept.
pub struct RsaDecryptOnce {
    rsa: Rsa<BigNum>,
    seen: HashSet<Vec<u8>>,
}

impl RsaDecryptOnce {
    pub fn new(bits: usize) -> Self {
        RsaDecryptOnce {
            rsa: Rsa::generate(bits),
            seen: HashSet::new(),
        }
    }

    pub fn public_key(&self) -> RsaPublic<BigNum> {
        self.rsa.public_key()
    }

    pub fn decrypt(&mut self, ciphertext: &BigNum) -> Result<BigNum, Error> {
        let fingerprint = mac::sha1(&BigNumTrait::to_bytes_be(ciphertext));
        if !self.seen.insert(fingerprint) {
            return Err(OracleError::Replay.into());
        }
        Ok(self.rsa.decrypt(ciphertext))
    }
}

/// Tells whether the plaintext behind a ciphertext is even.
pub struct RsaParityOracle {
    rsa: Rsa<BigNum>,
}

impl RsaParityOracle {
    pub fn new(bits: usize) -> Self {
        RsaParityOracle {
            rsa: Rsa::generate(bits),
        }
    }

    pub fn public_key(&self) -> RsaPublic<BigNum> {
        self.rsa.public_key()
    }

    pub fn is_even(&self, ciphertext: &BigNum) -> bool {
        !BigNumTrait::is_odd(&self.rsa.decrypt(ciphertext))
    }

    pub fn verify_solution(&self, ciphertext: &BigNum, candidate: &BigNum) -> Result<(), Error> {
        compare(&self.rsa.decrypt(ciphertext), candidate)
    }
}

/// Tells whether a ciphertext decrypts to a block starting with `00 02`.
pub struct RsaPaddingOracle {
    rsa: Rsa<BigNum>,
}

impl RsaPaddingOracle {
    pub fn new(bits: usize) -> Self {
        RsaPaddingOracle {
            rsa: Rsa::generate(bits),
        }
    }

    pub fn public_key(&self) -> RsaPublic<BigNum> {
        self.rsa.public_key()
    }

    /// PKCS#1 v1.5 encryption of `message`.
    pub fn encrypt(&self, message: &[u8]) -> Result<BigNum, Error> {
        let block = pkcs1_pad(message, self.rsa.k(), BlockType::Encryption)?;
        Ok(self.rsa.encrypt(&BigNumTrait::from_bytes_be(&block)))
    }

    pub fn is_conforming(&self, ciphertext: &BigNum) -> bool {
        let block = to_bytes_be_padded(&self.rsa.decrypt(ciphertext), self.rsa.k());
        block[0] == 0 && block[1] == 2
    }

    pub fn verify_solution(&self, ciphertext: &BigNum, candidate: &[u8]) -> Result<(), Error> {
        let block = to_bytes_be_padded(&self.rsa.decrypt(ciphertext), self.rsa.k());
        compare(&pkcs1_unpad(&block, BlockType::Encryption)?[..], candidate)
    }
}

/// Verifies PKCS#1 v1.5 signatures without checking that the hash ends the block.
pub struct SloppyRsaVerifier {
    rsa: Rsa<BigNum>,
}

impl SloppyRsaVerifier {
    pub fn new(bits: usize) -> Self {
        SloppyRsaVerifier {
            rsa: Rsa::generate(bits),
        }
    }

    pub fn public_key(&self) -> RsaPublic<BigNum> {
        self.rsa.public_key()
    }

    pub fn sign(&self, message: &[u8]) -> Result<BigNum, Error> {
        self.rsa.sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &BigNum) -> bool {
        match self.rsa.public_key().verify_sloppy(message, signature) {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "rejected signature");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replayed_ciphertext_is_refused() {
        let mut oracle = RsaDecryptOnce::new(512);
        let m = <BigNum as BigNumTrait>::from_u32(1234);
        let c = oracle.public_key().encrypt(&m);
        assert_eq!(m, oracle.decrypt(&c).unwrap());
        let err = oracle.decrypt(&c).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OracleError>(),
            Some(OracleError::Replay)
        ));
    }

    #[test]
    fn parity() {
        let oracle = RsaParityOracle::new(512);
        let public = oracle.public_key();
        let even = public.encrypt(&<BigNum as BigNumTrait>::from_u32(1000));
        let odd = public.encrypt(&<BigNum as BigNumTrait>::from_u32(1001));
        assert!(oracle.is_even(&even));
        assert!(!oracle.is_even(&odd));
    }

    #[test]
    fn padded_ciphertexts_conform() {
        let oracle = RsaPaddingOracle::new(256);
        let c = oracle.encrypt(b"kick it, CC").unwrap();
        assert!(oracle.is_conforming(&c));
        assert!(oracle.verify_solution(&c, b"kick it, CC").is_ok());

        let raw = oracle
            .public_key()
            .encrypt(&<BigNum as BigNumTrait>::from_u32(2));
        assert!(!oracle.is_conforming(&raw));
    }

    #[test]
    fn sloppy_verifier_accepts_genuine_signatures() {
        let oracle = SloppyRsaVerifier::new(1024);
        let signature = oracle.sign(b"hi mom").unwrap();
        assert!(oracle.verify(b"hi mom", &signature));
        assert!(!oracle.verify(b"hi dad", &signature));
    }
}
