use std::ops::RangeInclusive;

use failure::Error;
use mersenne::{
    clone_from_outputs, find_seed_in_window, mt_stream_decrypt, token_from_seed,
    MersenneTwister, CHECK_MARGIN, STATE_SIZE,
};
use tracing::{debug, info};

use crate::AttackError;

/// Taps enough outputs of `source` to rebuild its state. The returned generator predicts
/// everything `source` produces from then on.
pub fn clone_mt<I>(source: &mut I) -> Result<MersenneTwister, Error>
where
    I: Iterator<Item = u32>,
{
    let outputs: Vec<u32> = source.take(STATE_SIZE + CHECK_MARGIN).collect();
    clone_from_outputs(&outputs)
}

/// Finds the 16 bit key of the MT stream cipher from a ciphertext whose plaintext is known
/// to end with `known_suffix`. Seeds are tried in increasing order.
pub fn crack_mt_stream_seed(ciphertext: &[u8], known_suffix: &[u8]) -> Result<u16, Error> {
    ensure!(
        known_suffix.len() <= ciphertext.len(),
        "known plaintext is longer than the ciphertext"
    );
    let found = (0..=u16::MAX)
        .find(|&seed| mt_stream_decrypt(ciphertext, seed).ends_with(known_suffix));
    match found {
        Some(seed) => {
            info!(seed, "found stream cipher seed");
            Ok(seed)
        }
        None => Err(AttackError::SearchExhausted.into()),
    }
}

/// Whether `token` was produced by a generator seeded with a value from `window`, typically
/// the timestamps of the last few minutes.
pub fn is_token_from_recent_seed(token: &str, window: RangeInclusive<u32>) -> bool {
    window.into_iter().any(|seed| token_from_seed(seed) == token)
}

/// Finds the seed in `window` that produced `outputs`.
pub fn recover_time_seed(outputs: &[u32], window: RangeInclusive<u32>) -> Result<u32, Error> {
    let (start, end) = (*window.start(), *window.end());
    match find_seed_in_window(outputs, window) {
        Some(seed) => {
            debug!(seed, start, end, "seed found in window");
            Ok(seed)
        }
        None => Err(AttackError::SearchExhausted.into()),
    }
}
