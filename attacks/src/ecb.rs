use std::cmp;

use aes::{looks_like_ecb, Aes128, BLOCK_SIZE, MODE};
use failure::Error;
use oracle::{EcbOrCbc, Oracle, ProfileOracle};
use tracing::debug;

use crate::{ceil_div, AttackError};

/// Tells ECB from CBC with a single query: three equal blocks of input always contain two
/// aligned equal plaintext blocks, whatever the length of the random prefix.
pub fn detect_mode(oracle: &mut EcbOrCbc) -> Result<MODE, Error> {
    let ciphertext = oracle.encrypt(&[0; 3 * BLOCK_SIZE])?;
    Ok(if looks_like_ecb(&ciphertext) {
        MODE::ECB
    } else {
        MODE::CBC
    })
}

/// Feeds longer and longer inputs until the ciphertext grows. The size of the jump is the
/// block size.
pub fn ecb_block_size<O: Oracle>(oracle: &O) -> Result<usize, Error> {
    let initial = oracle.encrypt(&[])?.len();
    let mut input = Vec::new();
    for _ in 0..=256 {
        input.push(0);
        let len = oracle.encrypt(&input)?.len();
        if len != initial {
            return Ok(len - initial);
        }
    }
    bail!("ciphertext length never changed")
}

fn uses_padding<O: Oracle>(oracle: &O) -> Result<bool, Error> {
    Ok((oracle.encrypt(&[0])?.len() - oracle.encrypt(&[])?.len()) % BLOCK_SIZE == 0)
}

/// Total length of whatever the oracle wraps around its input.
pub fn prefix_plus_suffix_length<O: Oracle>(oracle: &O) -> Result<usize, Error> {
    let initial = oracle.encrypt(&[])?.len();
    if !uses_padding(oracle)? {
        return Ok(initial);
    }

    let input = [0; BLOCK_SIZE];
    for i in 1..=BLOCK_SIZE {
        if oracle.encrypt(&input[..i])?.len() != initial {
            return Ok(initial - i);
        }
    }
    bail!("ciphertext length did not change within one block")
}

// Number of blocks fully occupied by the prefix: two inputs that differ in their first byte
// produce ciphertexts that agree up to the block holding that byte.
fn full_prefix_blocks_count<O: Oracle>(oracle: &O) -> Result<usize, Error> {
    match oracle
        .encrypt(&[0])?
        .chunks(BLOCK_SIZE)
        .zip(oracle.encrypt(&[1])?.chunks(BLOCK_SIZE))
        .position(|(x, y)| x != y)
    {
        Some(count) => Ok(count),
        None => bail!("no differing blocks found"),
    }
}

// Let C be the first block not fully covered by the prefix. We fill the rest of C and the
// start of the next block with a constant, then shorten that constant one byte at a time.
// The ciphertext of C changes as soon as the first suffix byte slides into C, which tells how
// much of C the prefix takes up:
//
//   prefix prefix k k ... k || k k suffix[0] ...
//   prefix prefix k k ... k suffix[0] || suffix[1] ...
//
// suffix[0] might equal the constant, so we run this with two constants and keep the smaller
// result.
pub fn prefix_length<O: Oracle>(oracle: &O) -> Result<usize, Error> {
    let n = full_prefix_blocks_count(oracle)?;
    let helper = |k: u8| -> Result<usize, Error> {
        let constant_block = vec![k; BLOCK_SIZE];
        let mut prev = oracle.encrypt(&constant_block)?;
        for i in 0..BLOCK_SIZE {
            let cur = oracle.encrypt(&constant_block[i + 1..])?;
            if prev.chunks(BLOCK_SIZE).nth(n) != cur.chunks(BLOCK_SIZE).nth(n) {
                return Ok(i);
            }
            prev = cur;
        }
        Ok(BLOCK_SIZE)
    };
    Ok(n * BLOCK_SIZE + cmp::min(helper(0)?, helper(1)?))
}

pub fn suffix_length<O: Oracle>(oracle: &O) -> Result<usize, Error> {
    Ok(prefix_plus_suffix_length(oracle)? - prefix_length(oracle)?)
}

fn block(ciphertext: &[u8], index: usize) -> Option<&[u8]> {
    ciphertext.get(index * BLOCK_SIZE..(index + 1) * BLOCK_SIZE)
}

// Our input first pads the prefix to a block boundary and then leaves room for exactly one
// unknown byte at the end of a block:
//
//            input start      input end
//                ↓                ↓
// <-- prefix --> 0 ... 0 || 0 ... 0 suffix[0] || suffix[1] ...
//
// The block ending in suffix[0] is matched against the blocks we get by appending every
// candidate byte to the input ourselves. Each recovered byte moves the window by one.
fn decrypt_suffix<O: Oracle>(oracle: &O) -> Result<Vec<u8>, Error> {
    let prefix_len = prefix_length(oracle)?;
    let (prefix_blocks, prefix_padding) = ceil_div(prefix_len, BLOCK_SIZE);
    let suffix_len = suffix_length(oracle)?;
    debug!(prefix_len, suffix_len, "measured oracle");

    let mut input = vec![0; prefix_padding + BLOCK_SIZE - 1];
    let reference_ciphertexts = (0..BLOCK_SIZE)
        .map(|left_shift| oracle.encrypt(&input[left_shift..]))
        .collect::<Result<Vec<Vec<u8>>, Error>>()?;

    let mut suffix = Vec::with_capacity(suffix_len);
    for i in 0..suffix_len {
        let block_index = prefix_blocks + i / BLOCK_SIZE;
        let left_shift = i % BLOCK_SIZE;
        let target = block(&reference_ciphertexts[left_shift], block_index);
        let mut found = false;
        for u in 0u8..=255 {
            input.push(u);
            if target == block(&oracle.encrypt(&input[left_shift..])?, block_index) {
                found = true;
                break;
            }
            input.pop();
        }
        if !found {
            return Err(AttackError::SearchExhausted.into());
        }
        suffix.push(input[input.len() - 1]);
    }
    Ok(suffix)
}

/// Recovers the secret appended by an oracle that encrypts `input || secret` under ECB.
pub fn decrypt_ecb_suffix<O: Oracle>(oracle: &O) -> Result<Vec<u8>, Error> {
    ensure!(
        prefix_length(oracle)? == 0,
        "oracle prepends data to its input"
    );
    decrypt_suffix(oracle)
}

/// Same as [`decrypt_ecb_suffix`] for an oracle that also prepends a random prefix of
/// unknown length.
pub fn decrypt_ecb_prefix_suffix<O: Oracle>(oracle: &O) -> Result<Vec<u8>, Error> {
    decrypt_suffix(oracle)
}

/// Forges a profile ciphertext with `role=admin`, relying on `role` being the last field.
///
/// The email is chosen so that `user` starts the last block. That block is then replaced by
/// the encryption of `admin` plus padding, taken from a second profile where that text sits
/// at a block boundary.
pub fn forge_admin_profile(oracle: &ProfileOracle) -> Result<Vec<u8>, Error> {
    let prefix_len = prefix_length(oracle)?;
    let (prefix_blocks, prefix_padding) = ceil_div(prefix_len, BLOCK_SIZE);
    let mut input = vec![0; prefix_padding];
    input.extend_from_slice(&b"admin".pad());
    let admin_block = oracle
        .encrypt(&input)?
        .split_off(prefix_blocks * BLOCK_SIZE);

    let (blocks, padding) = ceil_div(prefix_plus_suffix_length(oracle)?, BLOCK_SIZE);
    let mut ciphertext = oracle.encrypt(&vec![0; padding + b"user".len()])?;
    ensure!(
        ciphertext.len() == (blocks + 1) * BLOCK_SIZE,
        "unexpected ciphertext length {}",
        ciphertext.len()
    );
    ciphertext[blocks * BLOCK_SIZE..].copy_from_slice(&admin_block[..BLOCK_SIZE]);
    Ok(ciphertext)
}
