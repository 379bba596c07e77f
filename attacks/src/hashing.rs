use std::time::{Duration, Instant};

use failure::Error;
use mac::{Compression, MacError, MerkleDamgard};
use oracle::{HmacTimingOracle, MacOracle};
use tracing::{debug, info, instrument};

use crate::{AttackError, Outcome};

const ADMIN: &[u8] = b";admin=true";
const HMAC_SIZE: usize = 20;

/// Forges an admin cookie for a secret-prefix MAC by length extension.
///
/// Returns the forged message together with its MAC. The key length is unknown, so every
/// length the oracle might use is tried until the oracle accepts the MAC.
pub fn forge_extension<C: Compression>(
    oracle: &MacOracle<C>,
) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let (message, mac) = oracle.authenticate(b"foo")?;

    for key_len in 0..200 {
        let prior_length = key_len + message.len();
        let forged_mac =
            MerkleDamgard::<C>::from_observed_digest(prior_length, &mac)?.extend(ADMIN);
        let forged_message = [
            &message[..],
            &MerkleDamgard::<C>::padding_for(prior_length)[..],
            ADMIN,
        ]
        .concat();

        match oracle.is_admin(&forged_message, &forged_mac) {
            Ok(true) => {
                info!(key_len, "forged extended MAC");
                return Ok((forged_message, forged_mac));
            }
            Ok(false) => bail!("authenticated message lacks the admin flag"),
            Err(err) => match err.downcast_ref::<MacError>() {
                Some(MacError::AuthenticationFailure) => continue,
                _ => return Err(err),
            },
        }
    }
    Err(AttackError::SearchExhausted.into())
}

fn fastest_of(
    oracle: &HmacTimingOracle,
    file: &[u8],
    signature: &[u8],
    samples: usize,
) -> Duration {
    (0..samples)
        .map(|_| {
            let start = Instant::now();
            oracle.check(file, signature);
            start.elapsed()
        })
        .min()
        .unwrap_or_default()
}

/// Recovers the HMAC of `file` from the time the oracle takes to reject wrong signatures.
///
/// Each byte is guessed by timing all 256 candidates `samples` times and keeping the minimum,
/// which filters out scheduling noise. The slowest candidate wins if it stands out from the
/// others by more than they differ among themselves; otherwise the attempt is inconclusive.
#[instrument(skip(oracle, file))]
pub fn timing_leak_mac(
    oracle: &HmacTimingOracle,
    file: &[u8],
    samples: usize,
) -> Result<Outcome<Vec<u8>>, Error> {
    ensure!(samples > 0, "need at least one sample per candidate");

    let mut signature = vec![0; HMAC_SIZE];
    for i in 0..HMAC_SIZE {
        let mut timings = (0..=255u8)
            .map(|u| {
                signature[i] = u;
                (fastest_of(oracle, file, &signature, samples), u)
            })
            .collect::<Vec<(Duration, u8)>>();
        timings.sort();

        let (slowest, u) = timings[255];
        let second = timings[254].0;
        let fastest = timings[0].0;
        if slowest - second <= second - fastest {
            debug!(byte = i, ?slowest, ?second, ?fastest, "no candidate stands out");
            return Ok(Outcome::Inconclusive);
        }
        signature[i] = u;
        debug!(byte = i, value = u, "guessed byte");

        if oracle.check(file, &signature) {
            info!(known_bytes = i + 1, "signature accepted");
            return Ok(Outcome::Recovered(signature));
        }
    }
    Ok(Outcome::Inconclusive)
}
