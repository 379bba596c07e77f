//! Oracles around ECB and CBC, plus the comment oracle which also runs in CTR mode.

use aes::{
    decrypt_cbc, encrypt_cbc, random_block, random_bytes, Aes128, AesError, MODE, NONCE_SIZE,
};
use failure::Error;
use rand::Rng;
use serialize::from_base64;
use tracing::debug;

use crate::{compare, decode_profile, has_admin_flag, reject_bytes, Oracle, OracleError};

const SECRET_SUFFIX: &str = "Um9sbGluJyBpbiBteSA1LjAKV2l0aCBteSByYWctdG9wIGRv\
                             d24gc28gbXkgaGFpciBjYW4gYmxvdwpUaGUgZ2lybGllcyBvb\
                             iBzdGFuZGJ5IHdhdmluZyBqdXN0IHRvIHNheSBoaQpEaWQgeW\
                             91IHN0b3A/IE5vLCBJIGp1c3QgZHJvdmUgYnkK";

const COMMENT_PREFIX: &[u8] = b"comment1=cooking%20MCs;userdata=";
const COMMENT_SUFFIX: &[u8] = b";comment2=%20like%20a%20pound%20of%20bacon";

const SESSION_TOKENS: [&str; 10] = [
    "MDAwMDAwTm93IHRoYXQgdGhlIHBhcnR5IGlzIGp1bXBpbmc=",
    "MDAwMDAxV2l0aCB0aGUgYmFzcyBraWNrZWQgaW4gYW5kIHRoZSBWZWdhJ3MgYXJlIHB1bXBpbic=",
    "MDAwMDAyUXVpY2sgdG8gdGhlIHBvaW50LCB0byB0aGUgcG9pbnQsIG5vIGZha2luZw==",
    "MDAwMDAzQ29va2luZyBNQydzIGxpa2UgYSBwb3VuZCBvZiBiYWNvbg==",
    "MDAwMDA0QnVybmluZyAnZW0sIGlmIHlvdSBhaW4ndCBxdWljayBhbmQgbmltYmxl",
    "MDAwMDA1SSBnbyBjcmF6eSB3aGVuIEkgaGVhciBhIGN5bWJhbA==",
    "MDAwMDA2QW5kIGEgaGlnaCBoYXQgd2l0aCBhIHNvdXBlZCB1cCB0ZW1wbw==",
    "MDAwMDA3SSdtIG9uIGEgcm9sbCwgaXQncyB0aW1lIHRvIGdvIHNvbG8=",
    "MDAwMDA4b2xsaW4nIGluIG15IGZpdmUgcG9pbnQgb2g=",
    "MDAwMDA5aXRoIG15IHJhZy10b3AgZG93biBzbyBteSBoYWlyIGNhbiBibG93",
];

/// Encrypts `prefix || input || suffix` under a fixed key, and a fixed IV or nonce.
pub(crate) struct Common {
    key: Vec<u8>,
    iv: Option<Vec<u8>>,
    prefix: Vec<u8>,
    suffix: Vec<u8>,
    mode: MODE,
}

impl Common {
    pub(crate) fn new(prefix: Vec<u8>, suffix: Vec<u8>, mode: MODE) -> Self {
        let iv = match mode {
            MODE::ECB => None,
            MODE::CBC => Some(random_block()),
            MODE::CTR => Some(random_bytes(NONCE_SIZE)),
        };
        Common {
            key: random_block(),
            iv,
            prefix,
            suffix,
            mode,
        }
    }

    pub(crate) fn encrypt(&self, u: &[u8]) -> Result<Vec<u8>, Error> {
        let mut cleartext = Vec::with_capacity(self.prefix.len() + u.len() + self.suffix.len());
        cleartext.extend_from_slice(&self.prefix);
        cleartext.extend_from_slice(u);
        cleartext.extend_from_slice(&self.suffix);
        cleartext.encrypt(&self.key, self.iv.as_deref(), self.mode)
    }

    pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        ciphertext.decrypt(&self.key, self.iv.as_deref(), self.mode)
    }
}

/// Encrypts a single input under ECB or CBC, chosen at random, with a few random bytes on
/// either side.
pub struct EcbOrCbc {
    common: Common,
    already_called: bool,
}

impl EcbOrCbc {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let prefix = random_bytes(rng.gen_range(5..=10));
        let suffix = random_bytes(rng.gen_range(5..=10));
        let mode = if rng.gen() { MODE::ECB } else { MODE::CBC };
        EcbOrCbc {
            common: Common::new(prefix, suffix, mode),
            already_called: false,
        }
    }

    pub fn encrypt(&mut self, u: &[u8]) -> Result<Vec<u8>, Error> {
        if self.already_called {
            return Err(OracleError::AlreadyUsed.into());
        }
        self.already_called = true;
        self.common.encrypt(u)
    }

    pub fn verify_solution(&self, uses_ecb: bool) -> Result<(), Error> {
        compare(self.common.mode == MODE::ECB, uses_ecb)
    }
}

/// ECB encryption of `input || secret`.
pub struct EcbSuffix {
    common: Common,
}

impl EcbSuffix {
    pub fn new() -> Result<Self, Error> {
        Ok(Self::with_suffix(from_base64(SECRET_SUFFIX)?))
    }

    pub fn with_suffix(suffix: Vec<u8>) -> Self {
        EcbSuffix {
            common: Common::new(Vec::new(), suffix, MODE::ECB),
        }
    }

    pub fn verify_suffix(&self, candidate: &[u8]) -> Result<(), Error> {
        compare(&self.common.suffix[..], candidate)
    }
}

impl Oracle for EcbSuffix {
    fn encrypt(&self, u: &[u8]) -> Result<Vec<u8>, Error> {
        self.common.encrypt(u)
    }
}

/// ECB encryption of `random prefix || input || secret`, the prefix holding 1 to 199 bytes.
pub struct EcbPrefixSuffix {
    common: Common,
}

impl EcbPrefixSuffix {
    pub fn new() -> Result<Self, Error> {
        Ok(Self::with_suffix(from_base64(SECRET_SUFFIX)?))
    }

    pub fn with_suffix(suffix: Vec<u8>) -> Self {
        let prefix = random_bytes(rand::thread_rng().gen_range(1..200));
        debug!(prefix_len = prefix.len(), "drew random prefix");
        EcbPrefixSuffix {
            common: Common::new(prefix, suffix, MODE::ECB),
        }
    }

    pub fn verify_suffix(&self, candidate: &[u8]) -> Result<(), Error> {
        compare(&self.common.suffix[..], candidate)
    }
}

impl Oracle for EcbPrefixSuffix {
    fn encrypt(&self, u: &[u8]) -> Result<Vec<u8>, Error> {
        self.common.encrypt(u)
    }
}

/// Encrypted user profiles `email=<input>&uid=10&role=user` under ECB.
pub struct ProfileOracle {
    common: Common,
}

impl ProfileOracle {
    pub fn new() -> Self {
        ProfileOracle {
            common: Common::new(b"email=".to_vec(), b"&uid=10&role=user".to_vec(), MODE::ECB),
        }
    }

    pub fn role(&self, ciphertext: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let cleartext = self.common.decrypt(ciphertext)?;
        let role = decode_profile(&cleartext, b'&')
            .get(&b"role"[..])
            .map(|role| role.to_vec());
        Ok(role)
    }

    pub fn is_admin(&self, ciphertext: &[u8]) -> Result<bool, Error> {
        Ok(self.role(ciphertext)?.as_deref() == Some(&b"admin"[..]))
    }
}

impl Oracle for ProfileOracle {
    fn encrypt(&self, email: &[u8]) -> Result<Vec<u8>, Error> {
        reject_bytes(email, b"&=")?;
        self.common.encrypt(email)
    }
}

/// Wraps user data into a `;`-separated cookie and encrypts it under CBC or CTR.
pub struct CommentOracle {
    common: Common,
}

impl CommentOracle {
    pub fn new(mode: MODE) -> Result<Self, Error> {
        ensure!(mode != MODE::ECB, "comment oracle runs in CBC or CTR mode");
        Ok(CommentOracle {
            common: Common::new(COMMENT_PREFIX.to_vec(), COMMENT_SUFFIX.to_vec(), mode),
        })
    }

    /// Whether the cookie contains the pair `admin=true`. Garbage produced by tampering is
    /// accepted as long as decryption succeeds.
    pub fn is_admin(&self, ciphertext: &[u8]) -> Result<bool, Error> {
        let cleartext = self.common.decrypt(ciphertext)?;
        Ok(has_admin_flag(&cleartext, b';'))
    }
}

impl Oracle for CommentOracle {
    fn encrypt(&self, u: &[u8]) -> Result<Vec<u8>, Error> {
        reject_bytes(u, b";=")?;
        self.common.encrypt(u)
    }
}

/// CBC where the key doubles as IV. The receiver complains about non-ASCII plaintext and
/// quotes it in the error.
pub struct KeyAsIvOracle {
    key: Vec<u8>,
}

impl KeyAsIvOracle {
    pub fn new() -> Self {
        KeyAsIvOracle {
            key: random_block(),
        }
    }

    pub fn ciphertext(&self) -> Result<Vec<u8>, Error> {
        let cleartext = [COMMENT_PREFIX, &b"foo@baz.com"[..], COMMENT_SUFFIX].concat();
        encrypt_cbc(&cleartext, &self.key, &self.key, true)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<(), Error> {
        let cleartext = decrypt_cbc(ciphertext, &self.key, &self.key, true)?;
        if !cleartext.is_ascii() {
            return Err(OracleError::NonAscii {
                plaintext: cleartext,
            }
            .into());
        }
        Ok(())
    }

    pub fn verify_solution(&self, candidate_key: &[u8]) -> Result<(), Error> {
        compare(&self.key[..], candidate_key)
    }
}

/// Hands out CBC encrypted session tokens and tells whether a ciphertext has valid padding.
pub struct PaddingOracle {
    key: Vec<u8>,
    tokens: Vec<Vec<u8>>,
}

impl PaddingOracle {
    pub fn new() -> Result<Self, Error> {
        let tokens = SESSION_TOKENS
            .iter()
            .map(|token| from_base64(token))
            .collect::<Result<Vec<Vec<u8>>, Error>>()?;
        Ok(PaddingOracle {
            key: random_block(),
            tokens,
        })
    }

    /// A random token as `(iv, ciphertext)`.
    pub fn encrypt(&self) -> Result<(Vec<u8>, Vec<u8>), Error> {
        let index = rand::thread_rng().gen_range(0..self.tokens.len());
        let iv = random_block();
        let ciphertext = encrypt_cbc(&self.tokens[index], &self.key, &iv, true)?;
        Ok((iv, ciphertext))
    }

    pub fn check(&self, iv: &[u8], ciphertext: &[u8]) -> Result<bool, Error> {
        match decrypt_cbc(ciphertext, &self.key, iv, true) {
            Ok(_) => Ok(true),
            Err(err) => match err.downcast_ref::<AesError>() {
                Some(AesError::InvalidPadding) => Ok(false),
                _ => Err(err),
            },
        }
    }

    pub fn verify_solution(
        &self,
        cleartext: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<(), Error> {
        compare(&decrypt_cbc(ciphertext, &self.key, iv, true)?[..], cleartext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::BLOCK_SIZE;

    #[test]
    fn ecb_or_cbc_answers_once() {
        let mut oracle = EcbOrCbc::new();
        let ciphertext = oracle.encrypt(&[0; 48]).unwrap();
        assert!(ciphertext.len() >= 64);
        let err = oracle.encrypt(&[0; 48]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OracleError>(),
            Some(OracleError::AlreadyUsed)
        ));
    }

    #[test]
    fn suffix_oracle_is_deterministic() {
        let oracle = EcbSuffix::new().unwrap();
        assert_eq!(oracle.encrypt(b"abc").unwrap(), oracle.encrypt(b"abc").unwrap());
        assert_eq!(144, oracle.encrypt(&[]).unwrap().len());
        assert!(oracle.verify_suffix(b"Rollin' in my 5.0\n").is_err());
    }

    #[test]
    fn honest_profile_is_no_admin() {
        let oracle = ProfileOracle::new();
        let ciphertext = oracle.encrypt(b"foo@bar.com").unwrap();
        assert_eq!(Some(b"user".to_vec()), oracle.role(&ciphertext).unwrap());
        assert!(!oracle.is_admin(&ciphertext).unwrap());
        assert!(oracle.encrypt(b"foo@bar.com&role=admin").is_err());
    }

    #[test]
    fn comment_oracle_quotes_metacharacters_away() {
        for &mode in &[MODE::CBC, MODE::CTR] {
            let oracle = CommentOracle::new(mode).unwrap();
            assert!(oracle.encrypt(b";admin=true").is_err());
            let ciphertext = oracle.encrypt(b"xadminxtrue").unwrap();
            assert!(!oracle.is_admin(&ciphertext).unwrap());
        }
        assert!(CommentOracle::new(MODE::ECB).is_err());
    }

    #[test]
    fn key_as_iv_accepts_own_ciphertext() {
        let oracle = KeyAsIvOracle::new();
        let ciphertext = oracle.ciphertext().unwrap();
        assert!(oracle.decrypt(&ciphertext).is_ok());
    }

    #[test]
    fn padding_oracle_on_fresh_token() {
        let oracle = PaddingOracle::new().unwrap();
        let (iv, ciphertext) = oracle.encrypt().unwrap();
        assert!(oracle.check(&iv, &ciphertext).unwrap());

        // Exactly one flip of the last IV byte turns the first block into something ending in
        // 0x01. A second one exists only if the block already ends in 0x02 0x02.
        let mut tampered = iv.clone();
        let last = BLOCK_SIZE - 1;
        let mut valid = 0;
        for u in 1..=255u8 {
            tampered[last] = iv[last] ^ u;
            if oracle.check(&tampered, &ciphertext[..BLOCK_SIZE]).unwrap() {
                valid += 1;
            }
        }
        assert!(valid >= 1 && valid <= 2);
    }
}
