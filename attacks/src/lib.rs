//! Attacks against the oracles of the `oracle` crate and against misused primitives.
//!
//! Deterministic attacks return their result directly. Attacks that depend on chance, like a
//! timing side channel, report an [`Outcome`] so that callers can tell "nothing found this time"
//! apart from real errors and retry.

#[macro_use]
extern crate failure;

pub mod cbc;
pub mod ctr;
pub mod dsa_attacks;
pub mod ecb;
pub mod hashing;
pub mod prng;
pub mod rsa_attacks;

use failure::Error;
use tracing::warn;

pub use cbc::{cbc_bitflip, padding_oracle_decrypt, recover_key_from_iv_equals_key};
pub use ctr::{break_ctr_edit, break_fixed_nonce_ctr, ctr_bitflip};
pub use dsa_attacks::{dsa_nonce_brute_force, recover_key_from_repeated_nonce};
pub use ecb::{
    decrypt_ecb_prefix_suffix, decrypt_ecb_suffix, detect_mode, ecb_block_size,
    forge_admin_profile, prefix_length, prefix_plus_suffix_length, suffix_length,
};
pub use hashing::{forge_extension, timing_leak_mac};
pub use prng::{clone_mt, crack_mt_stream_seed, is_token_from_recent_seed, recover_time_seed};
pub use rsa_attacks::{
    bleichenbacher, forge_e3_signature, parity_decrypt, rsa_broadcast,
    unpadded_message_recovery,
};

#[derive(Debug, Fail)]
pub enum AttackError {
    #[fail(display = "exhausted the search space without a match")]
    SearchExhausted,

    #[fail(display = "no conclusive result after {} attempts", attempts)]
    Inconclusive { attempts: usize },
}

/// Result of an attack that may fail by bad luck.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Recovered(T),
    Inconclusive,
}

impl<T> Outcome<T> {
    /// Runs `attack` until it recovers something, at most `max_attempts` times.
    pub fn retry<F>(max_attempts: usize, mut attack: F) -> Result<T, Error>
    where
        F: FnMut() -> Result<Outcome<T>, Error>,
    {
        for attempt in 1..=max_attempts {
            match attack()? {
                Outcome::Recovered(result) => return Ok(result),
                Outcome::Inconclusive => warn!(attempt, max_attempts, "attack inconclusive"),
            }
        }
        Err(AttackError::Inconclusive {
            attempts: max_attempts,
        }
        .into())
    }

    pub fn recovered(self) -> Option<T> {
        match self {
            Outcome::Recovered(result) => Some(result),
            Outcome::Inconclusive => None,
        }
    }
}

/// Returns `(q, r)` with `q = ceil(n / k)` and `q * k = n + r`.
pub(crate) fn ceil_div(n: usize, k: usize) -> (usize, usize) {
    let q = (n + k - 1) / k;
    let r = q * k - n;
    (q, r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_div_rounds_up() {
        assert_eq!((2, 12), ceil_div(20, 16));
        assert_eq!((1, 0), ceil_div(16, 16));
        assert_eq!((0, 0), ceil_div(0, 16));
    }

    #[test]
    fn retry_gives_up() {
        let mut calls = 0;
        let err = Outcome::<()>::retry(3, || {
            calls += 1;
            Ok(Outcome::Inconclusive)
        })
        .unwrap_err();
        assert_eq!(3, calls);
        assert!(matches!(
            err.downcast_ref::<AttackError>(),
            Some(AttackError::Inconclusive { attempts: 3 })
        ));
    }

    #[test]
    fn retry_stops_at_first_success() {
        let mut calls = 0;
        let result = Outcome::retry(5, || {
            calls += 1;
            Ok(if calls == 2 {
                Outcome::Recovered(calls)
            } else {
                Outcome::Inconclusive
            })
        })
        .unwrap();
        assert_eq!(2, result);
        assert_eq!(2, calls);
    }
}
