use aes::{bitflip, unpad_inplace, Aes128, BLOCK_SIZE};
use failure::Error;
use oracle::{CommentOracle, KeyAsIvOracle, Oracle, OracleError, PaddingOracle};
use tracing::{debug, instrument};
use xor::XOR;

use crate::ecb::prefix_plus_suffix_length;
use crate::{ceil_div, Outcome};

/// Produces a CBC comment cookie that decodes with `admin=true`.
///
/// The input is sized so that the last block is pure padding, which we know to be sixteen
/// `0x10` bytes. Flipping bits in the block before it rewrites the last block to
/// `;admin=true` plus padding and garbles the flipped block, which the parser skips over.
pub fn cbc_bitflip(oracle: &CommentOracle) -> Result<Vec<u8>, Error> {
    let (blocks, padding) = ceil_div(prefix_plus_suffix_length(oracle)?, BLOCK_SIZE);
    let ciphertext = oracle.encrypt(&vec![0; padding])?;
    ensure!(
        ciphertext.len() == (blocks + 1) * BLOCK_SIZE,
        "unexpected ciphertext length {}",
        ciphertext.len()
    );
    bitflip(
        &ciphertext,
        blocks - 1,
        &[BLOCK_SIZE as u8; BLOCK_SIZE],
        &b";admin=true".pad(),
    )
}

/// Recovers the key of a CBC receiver that uses its key as IV.
///
/// With C1 the first ciphertext block and P1 its plaintext, the ciphertext `C1 || 0 || C1`
/// decrypts to `P1 || * || P1 ^ key`. The receiver quotes the non-ASCII result back to us.
/// The last two original blocks are appended to keep the padding valid.
pub fn recover_key_from_iv_equals_key(oracle: &KeyAsIvOracle) -> Result<Outcome<Vec<u8>>, Error> {
    let ciphertext = oracle.ciphertext()?;
    ensure!(
        ciphertext.len() >= 3 * BLOCK_SIZE,
        "ciphertext is shorter than three blocks"
    );

    let first = &ciphertext[..BLOCK_SIZE];
    let mut attack_ciphertext = Vec::with_capacity(5 * BLOCK_SIZE);
    attack_ciphertext.extend_from_slice(first);
    attack_ciphertext.extend_from_slice(&[0; BLOCK_SIZE]);
    attack_ciphertext.extend_from_slice(first);
    attack_ciphertext.extend_from_slice(&ciphertext[ciphertext.len() - 2 * BLOCK_SIZE..]);

    match oracle.decrypt(&attack_ciphertext) {
        Ok(()) => Ok(Outcome::Inconclusive),
        Err(err) => match err.downcast::<OracleError>() {
            Ok(OracleError::NonAscii { plaintext }) => Ok(Outcome::Recovered(
                plaintext[..BLOCK_SIZE].xor(&plaintext[2 * BLOCK_SIZE..3 * BLOCK_SIZE]),
            )),
            Ok(other) => Err(other.into()),
            Err(err) => Err(err),
        },
    }
}

/// Decrypts a CBC ciphertext byte by byte through a padding oracle.
///
/// For every block we tamper with the preceding block (or the IV) from the last byte
/// backwards until the oracle accepts padding of length 1, 2 and so on.
#[instrument(skip(oracle, iv, ciphertext), fields(blocks = ciphertext.len() / BLOCK_SIZE))]
pub fn padding_oracle_decrypt(
    oracle: &PaddingOracle,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Outcome<Vec<u8>>, Error> {
    ensure!(
        !ciphertext.is_empty() && ciphertext.len() % BLOCK_SIZE == 0 && iv.len() == BLOCK_SIZE,
        "ciphertext is not a sequence of blocks"
    );

    let mut cleartext = vec![0; ciphertext.len()];
    let mut prev = iv.to_vec();
    for (block_index, block) in ciphertext.chunks(BLOCK_SIZE).enumerate() {
        let block_offset = block_index * BLOCK_SIZE;
        for i in (0..BLOCK_SIZE).rev() {
            let padding = (BLOCK_SIZE - i) as u8;
            prev[i + 1..].xor_inplace(&[(padding - 1) ^ padding]);
            let mut found = false;
            for u in 0u8..=255 {
                prev[i] ^= u;
                if oracle.check(&prev, block)?
                    && (i < BLOCK_SIZE - 1 || {
                        // A valid last byte might be 2 if the byte before it happens to be 2
                        // already. Changing that byte must keep the padding valid.
                        prev[i - 1] ^= 1;
                        let still_valid = oracle.check(&prev, block)?;
                        prev[i - 1] ^= 1;
                        still_valid
                    })
                {
                    cleartext[block_offset + i] = padding ^ u;
                    found = true;
                    break;
                }
                prev[i] ^= u;
            }
            if !found {
                debug!(block_index, byte = i, "no byte gave valid padding");
                return Ok(Outcome::Inconclusive);
            }
        }
        prev = block.to_vec();
    }

    if unpad_inplace(&mut cleartext, BLOCK_SIZE as u8).is_err() {
        return Ok(Outcome::Inconclusive);
    }
    Ok(Outcome::Recovered(cleartext))
}
