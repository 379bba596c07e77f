use std::marker::PhantomData;
use std::time::Duration;

use aes::random_bytes;
use failure::Error;
use mac::{hmac_sha1, insecure_compare, secret_prefix_mac, verify_secret_prefix_mac, Compression};
use rand::Rng;

use crate::{has_admin_flag, reject_bytes};

const MAC_PREFIX: &[u8] = b"comment1=cooking%20MCs;userdata=";
const MAC_SUFFIX: &[u8] = b";comment2=%20like%20a%20pound%20of%20bacon";

const HMAC_SIZE: usize = 20;

/// Issues and checks secret-prefix MACs `H(key || message)` with a key of unknown length.
pub struct MacOracle<C: Compression> {
    key: Vec<u8>,
    phantom: PhantomData<C>,
}

impl<C: Compression> MacOracle<C> {
    pub fn new() -> Self {
        let key_len = rand::thread_rng().gen_range(1..200);
        MacOracle {
            key: random_bytes(key_len),
            phantom: PhantomData,
        }
    }

    /// The cookie built around `userdata`, together with its MAC.
    pub fn authenticate(&self, userdata: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
        reject_bytes(userdata, b";=")?;
        let message = [MAC_PREFIX, userdata, MAC_SUFFIX].concat();
        let mac = secret_prefix_mac::<C>(&self.key, &message);
        Ok((message, mac))
    }

    /// Fails with `MacError::AuthenticationFailure` unless `mac` authenticates `message`.
    pub fn is_admin(&self, message: &[u8], mac: &[u8]) -> Result<bool, Error> {
        verify_secret_prefix_mac::<C>(&self.key, message, mac)?;
        Ok(has_admin_flag(message, b';'))
    }
}

/// Checks HMAC-SHA1 signatures of files with an early-exit comparison that sleeps after
/// every matching byte.
pub struct HmacTimingOracle {
    key: Vec<u8>,
    delay: Duration,
    compared_bytes: usize,
}

impl HmacTimingOracle {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(5);

    /// Only the first `compared_bytes` bytes of a signature are checked, at most all 20.
    pub fn new(delay: Duration, compared_bytes: usize) -> Self {
        HmacTimingOracle {
            key: random_bytes(HMAC_SIZE),
            delay,
            compared_bytes: compared_bytes.min(HMAC_SIZE),
        }
    }

    pub fn check(&self, file: &[u8], signature: &[u8]) -> bool {
        insecure_compare(
            &hmac_sha1(&self.key, file),
            signature,
            self.delay,
            self.compared_bytes,
        )
    }
}

impl Default for HmacTimingOracle {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY, HMAC_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mac::{MacError, Md4Core, Sha1Core};
    use std::time::Instant;

    #[test]
    fn honest_cookie_is_no_admin() {
        let oracle = MacOracle::<Sha1Core>::new();
        let (message, mac) = oracle.authenticate(b"foo").unwrap();
        assert!(!oracle.is_admin(&message, &mac).unwrap());
        assert!(oracle.authenticate(b"x;admin=true").is_err());
    }

    #[test]
    fn tampered_cookie_is_rejected() {
        let oracle = MacOracle::<Md4Core>::new();
        let (mut message, mac) = oracle.authenticate(b"foo").unwrap();
        message.extend_from_slice(b";admin=true");
        let err = oracle.is_admin(&message, &mac).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MacError>(),
            Some(MacError::AuthenticationFailure)
        ));
    }

    #[test]
    fn timing_oracle_only_compares_a_prefix() {
        let oracle = HmacTimingOracle::new(Duration::from_millis(2), 1);
        let hits = (0..=255u8)
            .filter(|&u| oracle.check(b"file", &[u; HMAC_SIZE]))
            .count();
        assert_eq!(1, hits);
    }

    #[test]
    fn matching_bytes_take_longer() {
        let delay = Duration::from_millis(20);
        let oracle = HmacTimingOracle::new(delay, 2);
        let slow = (0..=255u8)
            .map(|u| {
                let start = Instant::now();
                oracle.check(b"file", &[u; HMAC_SIZE]);
                (start.elapsed(), u)
            })
            .max()
            .map(|(elapsed, _)| elapsed)
            .unwrap();
        assert!(slow >= delay);
    }
}
