#[macro_use]
extern crate failure;

pub mod engine;

use std::{thread, time::Duration};

use failure::Error;
use sha2::{Digest, Sha256};
use xor::XOR;

pub use engine::{Compression, Md4, Md4Core, MerkleDamgard, Sha1, Sha1Core};

#[derive(Debug, Fail)]
pub enum MacError {
    #[fail(display = "authentication failed")]
    AuthenticationFailure,

    #[fail(display = "digest must consist of {} bytes, got {}", expected, got)]
    InvalidDigestLength { expected: usize, got: usize },
}

pub fn sha1(message: &[u8]) -> Vec<u8> {
    Sha1::digest(message)
}

pub fn sha256(message: &[u8]) -> Vec<u8> {
    Sha256::digest(message).to_vec()
}

/// `H(key || message)`, which is open to length extension.
pub fn secret_prefix_mac<C: Compression>(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut engine = MerkleDamgard::<C>::new();
    engine.update(key);
    engine.update(message);
    engine.finalize()
}

pub fn verify_secret_prefix_mac<C: Compression>(
    key: &[u8],
    message: &[u8],
    mac: &[u8],
) -> Result<(), Error> {
    if secret_prefix_mac::<C>(key, message) != mac {
        return Err(MacError::AuthenticationFailure.into());
    }
    Ok(())
}

pub fn mac_sha1(key: &[u8], message: &[u8]) -> Vec<u8> {
    secret_prefix_mac::<Sha1Core>(key, message)
}

pub fn mac_md4(key: &[u8], message: &[u8]) -> Vec<u8> {
    secret_prefix_mac::<Md4Core>(key, message)
}

const HMAC_BLOCK_SIZE: usize = 64;

fn hmac<H: Fn(&[u8]) -> Vec<u8>>(hash: H, key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut key = if key.len() > HMAC_BLOCK_SIZE {
        hash(key)
    } else {
        key.to_vec()
    };
    key.resize(HMAC_BLOCK_SIZE, 0);

    let mut i_key_pad = key.xor(&[0x36]);
    i_key_pad.extend_from_slice(message);

    let mut o_key_pad = key.xor(&[0x5c]);
    o_key_pad.extend_from_slice(&hash(&i_key_pad));

    hash(&o_key_pad)
}

pub fn hmac_sha1(key: &[u8], message: &[u8]) -> Vec<u8> {
    hmac(sha1, key, message)
}

pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    hmac(sha256, key, message)
}

/// Compares the first `compared_bytes` bytes one at a time and sleeps for `delay` after every
/// byte that matches, so the running time leaks the length of the common prefix.
pub fn insecure_compare(u: &[u8], v: &[u8], delay: Duration, compared_bytes: usize) -> bool {
    if u.len() < compared_bytes || v.len() < compared_bytes {
        return false;
    }

    for (x, y) in u.iter().zip(v.iter()).take(compared_bytes) {
        if x != y {
            return false;
        }
        thread::sleep(delay);
    }
    true
}
