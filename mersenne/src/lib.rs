//! MT19937, the 32 bit Mersenne Twister, together with the tools to clone it from its
//! outputs and to brute force small seeds.

#[macro_use]
extern crate failure;

use byteorder::{ByteOrder, LittleEndian};
use failure::Error;
use serialize::Serialize;
use tracing::debug;

pub const STATE_SIZE: usize = 624;

/// Number of outputs beyond the state size used to confirm a cloned state.
pub const CHECK_MARGIN: usize = 16;

#[derive(Debug, Fail)]
pub enum MersenneError {
    #[fail(display = "need at least {} outputs, got {}", needed, got)]
    NotEnoughOutputs { needed: usize, got: usize },

    #[fail(display = "no candidate state reproduces the observed outputs")]
    SearchExhausted,
}

#[derive(Clone, Debug)]
pub struct MersenneTwister {
    mt: [u32; STATE_SIZE],
    index: usize,
}

impl MersenneTwister {
    pub fn seed(seed: u32) -> Self {
        let mut mt = [0; STATE_SIZE];
        mt[0] = seed;
        for i in 1..STATE_SIZE {
            mt[i] = (mt[i - 1] ^ (mt[i - 1] >> 30))
                .wrapping_mul(0x6c07_8965)
                .wrapping_add(i as u32);
        }
        MersenneTwister { mt, index: 0 }
    }

    /// Builds a generator whose next output is `temper` applied to the twisted `mt`.
    pub fn from_state(mt: [u32; STATE_SIZE]) -> Self {
        MersenneTwister { mt, index: 0 }
    }

    fn twist(&mut self) {
        let mt = &mut self.mt;
        for i in 0..STATE_SIZE {
            let y = (mt[i] & 0x8000_0000) | (mt[(i + 1) % STATE_SIZE] & 0x7fff_ffff);
            mt[i] = mt[(i + 397) % STATE_SIZE] ^ (y >> 1);
            if y % 2 != 0 {
                mt[i] ^= 0x9908_b0df;
            }
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        if self.index == 0 {
            self.twist();
        }
        let y = temper(self.mt[self.index]);
        self.index = (self.index + 1) % STATE_SIZE;
        y
    }
}

impl Iterator for MersenneTwister {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        Some(self.next_u32())
    }
}

pub fn temper(mut y: u32) -> u32 {
    y ^= y >> 11;
    y ^= (y << 7) & 0x9d2c_5680;
    y ^= (y << 15) & 0xefc6_0000;
    y ^= y >> 18;
    y
}

fn inv_rs(mut u: u32, k: u32) -> u32 {
    let mut v = u;
    for _ in 0..=32 / k {
        u >>= k;
        v ^= u;
    }
    v
}

fn inv_lsa(u: u32, k: u32, c: u32) -> u32 {
    let mut v = u;
    for _ in 0..32 / k {
        v = u ^ (v << k & c);
    }
    v
}

pub fn untemper(u: u32) -> u32 {
    inv_rs(
        inv_lsa(inv_lsa(inv_rs(u, 18), 15, 0xefc6_0000), 7, 0x9d2c_5680),
        11,
    )
}

/// Reconstructs a generator from consecutive outputs.
///
/// Any 624 consecutive untempered outputs form a valid state, whatever their position
/// relative to the generator's twists. Each candidate window is confirmed against the outputs
/// that follow it. The returned generator continues right after the last observed output.
pub fn clone_from_outputs(outputs: &[u32]) -> Result<MersenneTwister, Error> {
    let needed = STATE_SIZE + CHECK_MARGIN;
    if outputs.len() < needed {
        return Err(MersenneError::NotEnoughOutputs {
            needed,
            got: outputs.len(),
        }
        .into());
    }

    let untempered: Vec<u32> = outputs.iter().map(|&u| untemper(u)).collect();
    for offset in 0..=outputs.len() - needed {
        let mut state = [0; STATE_SIZE];
        state.copy_from_slice(&untempered[offset..offset + STATE_SIZE]);
        let mut candidate = MersenneTwister::from_state(state);
        let tail = &outputs[offset + STATE_SIZE..];
        if tail.iter().all(|&u| candidate.next_u32() == u) {
            debug!(offset, "cloned generator state");
            return Ok(candidate);
        }
    }
    Err(MersenneError::SearchExhausted.into())
}

/// Returns the first seed in `window` whose generator starts with `observed`.
pub fn find_seed_in_window<I>(observed: &[u32], window: I) -> Option<u32>
where
    I: IntoIterator<Item = u32>,
{
    window.into_iter().find(|&candidate| {
        MersenneTwister::seed(candidate)
            .zip(observed.iter())
            .all(|(u, &v)| u == v)
    })
}

/// Returns the first seed in `candidates` whose `n`-th output equals `u`.
pub fn crack_seed_from_nth<I>(u: u32, n: usize, candidates: I) -> Option<u32>
where
    I: IntoIterator<Item = u32>,
{
    candidates
        .into_iter()
        .find(|&candidate| MersenneTwister::seed(candidate).nth(n) == Some(u))
}

/// Stream cipher keyed by a 16 bit seed: every byte is XORed with the low byte of one output.
pub fn mt_stream_encrypt(data: &[u8], seed: u16) -> Vec<u8> {
    data.iter()
        .zip(MersenneTwister::seed(u32::from(seed)))
        .map(|(&b, r)| b ^ (r & 0xff) as u8)
        .collect()
}

pub fn mt_stream_decrypt(data: &[u8], seed: u16) -> Vec<u8> {
    mt_stream_encrypt(data, seed)
}

/// Password reset token: base64 of the first output, little endian.
pub fn token_from_seed(seed: u32) -> String {
    let mut buffer = [0u8; 4];
    LittleEndian::write_u32(&mut buffer, MersenneTwister::seed(seed).next_u32());
    buffer.to_base64()
}
