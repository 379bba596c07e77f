//! Merkle-Damgård hashing with an importable running state.
//!
//! SHA-1 and MD4 both hash `message || padding(len(message))` block by block, and the digest
//! is nothing but the final state. Starting a fresh engine from an observed digest therefore
//! continues the computation of the unknown message, which is the length extension attack.

mod md4;
mod sha1;

use std::marker::PhantomData;

use byteorder::ByteOrder;
use failure::Error;

pub use self::md4::Md4Core;
pub use self::sha1::Sha1Core;

use crate::MacError;

pub const BLOCK_SIZE: usize = 64;

/// The algorithm specific part of a Merkle-Damgård hash.
pub trait Compression: Clone {
    /// Byte order of message words, of the length field and of the digest.
    type Order: ByteOrder;

    const INITIAL_STATE: &'static [u32];

    fn compress(state: &mut [u32], block: &[u8]);
}

#[derive(Clone)]
pub struct MerkleDamgard<C: Compression> {
    state: Vec<u32>,
    length: u64,
    buffer: Vec<u8>,
    phantom: PhantomData<C>,
}

pub type Sha1 = MerkleDamgard<Sha1Core>;
pub type Md4 = MerkleDamgard<Md4Core>;

impl<C: Compression> Default for MerkleDamgard<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Compression> MerkleDamgard<C> {
    pub const DIGEST_SIZE: usize = 4 * C::INITIAL_STATE.len();

    pub fn new() -> Self {
        MerkleDamgard {
            state: C::INITIAL_STATE.to_vec(),
            length: 0,
            buffer: Vec::with_capacity(BLOCK_SIZE),
            phantom: PhantomData,
        }
    }

    /// Continues from the state `digest` after hashing some unknown `prior_length` bytes
    /// together with their padding.
    pub fn from_observed_digest(prior_length: usize, digest: &[u8]) -> Result<Self, Error> {
        if digest.len() != Self::DIGEST_SIZE {
            return Err(MacError::InvalidDigestLength {
                expected: Self::DIGEST_SIZE,
                got: digest.len(),
            }
            .into());
        }
        let state = digest.chunks(4).map(C::Order::read_u32).collect();
        let length = prior_length + Self::padding_for(prior_length).len();
        Ok(MerkleDamgard {
            state,
            length: length as u64,
            buffer: Vec::with_capacity(BLOCK_SIZE),
            phantom: PhantomData,
        })
    }

    /// The bytes appended to a message of `length` bytes before hashing.
    pub fn padding_for(length: usize) -> Vec<u8> {
        let zeros = (BLOCK_SIZE - (length + 9) % BLOCK_SIZE) % BLOCK_SIZE;
        let mut padding = Vec::with_capacity(zeros + 9);
        padding.push(0x80);
        padding.resize(zeros + 1, 0);
        let mut bit_length = [0; 8];
        C::Order::write_u64(&mut bit_length, (length as u64).wrapping_mul(8));
        padding.extend_from_slice(&bit_length);
        padding
    }

    pub fn update(&mut self, data: &[u8]) {
        self.length += data.len() as u64;
        let mut data = data;
        if !self.buffer.is_empty() {
            let take = (BLOCK_SIZE - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() < BLOCK_SIZE {
                return;
            }
            C::compress(&mut self.state, &self.buffer);
            self.buffer.clear();
        }
        let mut blocks = data.chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            C::compress(&mut self.state, block);
        }
        self.buffer.extend_from_slice(blocks.remainder());
    }

    pub fn finalize(mut self) -> Vec<u8> {
        let padding = Self::padding_for(self.length as usize);
        self.update(&padding);

        let mut digest = vec![0; Self::DIGEST_SIZE];
        for (chunk, &word) in digest.chunks_mut(4).zip(self.state.iter()) {
            C::Order::write_u32(chunk, word);
        }
        digest
    }

    /// Digest of everything fed so far followed by `suffix`, leaving `self` untouched.
    pub fn extend(&self, suffix: &[u8]) -> Vec<u8> {
        let mut engine = self.clone();
        engine.update(suffix);
        engine.finalize()
    }

    pub fn digest(message: &[u8]) -> Vec<u8> {
        Self::new().extend(message)
    }
}
