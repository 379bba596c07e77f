use aes::{ctr_keystream, encrypt_ctr, random_block, random_bytes, CounterLayout, NONCE_SIZE};
use failure::Error;
use xor::XOR;

use crate::{compare, Oracle};

/// CTR encryption of a secret text that offers random access re-encryption.
pub struct CtrEditOracle {
    cleartext: Vec<u8>,
    key: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

impl CtrEditOracle {
    pub fn new(cleartext: Vec<u8>) -> Result<Self, Error> {
        let key = random_block();
        let nonce = random_bytes(NONCE_SIZE);
        let ciphertext = encrypt_ctr(&cleartext, &key, &nonce, CounterLayout::default())?;
        Ok(CtrEditOracle {
            cleartext,
            key,
            nonce,
            ciphertext,
        })
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// The ciphertext after replacing the text at `offset` by `newtext`. Only the edited
    /// range is encrypted again.
    pub fn edit(&self, offset: usize, newtext: &[u8]) -> Result<Vec<u8>, Error> {
        let end = offset + newtext.len();
        ensure!(end <= self.ciphertext.len(), "edit past the end of the text");
        let keystream = ctr_keystream(
            &self.key,
            &self.nonce,
            CounterLayout::default(),
            offset,
            newtext.len(),
        )?;
        let mut ciphertext = self.ciphertext.clone();
        ciphertext[offset..end].copy_from_slice(&newtext.xor(&keystream));
        Ok(ciphertext)
    }

    pub fn verify_solution(&self, candidate: &[u8]) -> Result<(), Error> {
        compare(&self.cleartext[..], candidate)
    }
}

/// Encrypts every input under the same key and the same nonce.
pub struct FixedNonceCtr {
    key: Vec<u8>,
    nonce: Vec<u8>,
}

impl FixedNonceCtr {
    pub fn new() -> Self {
        FixedNonceCtr {
            key: random_block(),
            nonce: vec![0; NONCE_SIZE],
        }
    }

    pub fn verify_keystream(&self, candidate: &[u8]) -> Result<(), Error> {
        let keystream = ctr_keystream(
            &self.key,
            &self.nonce,
            CounterLayout::default(),
            0,
            candidate.len(),
        )?;
        compare(&keystream[..], candidate)
    }
}

impl Oracle for FixedNonceCtr {
    fn encrypt(&self, cleartext: &[u8]) -> Result<Vec<u8>, Error> {
        encrypt_ctr(cleartext, &self.key, &self.nonce, CounterLayout::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_replaces_text_in_place() {
        let oracle = CtrEditOracle::new(b"attack at dawn, not at dusk".to_vec()).unwrap();
        let original = oracle.ciphertext().to_vec();
        let edited = oracle.edit(10, b"noon").unwrap();
        assert_eq!(original.len(), edited.len());
        assert_eq!(original[..10], edited[..10]);
        assert_eq!(original[14..], edited[14..]);
        assert_ne!(original[10..14], edited[10..14]);

        let keystream = oracle.edit(0, &vec![0; original.len()]).unwrap();
        assert_eq!(b"attack at noon, not at dusk".to_vec(), edited.xor(&keystream));
    }

    #[test]
    fn edit_out_of_bounds() {
        let oracle = CtrEditOracle::new(b"short".to_vec()).unwrap();
        assert!(oracle.edit(3, b"abc").is_err());
    }

    #[test]
    fn fixed_nonce_reuses_keystream() {
        let oracle = FixedNonceCtr::new();
        let u = oracle.encrypt(b"first message").unwrap();
        let v = oracle.encrypt(b"other message").unwrap();
        assert_eq!(b"first message".xor(b"other message"), u.xor(&v));
        assert!(oracle.verify_keystream(&u.xor(b"first message")).is_ok());
    }
}
