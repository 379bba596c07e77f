use std::ops::RangeInclusive;

use bignum::BigNumTrait;
use dsa::{
    nonce_from_repeated_signatures, secret_key_from_nonce, DsaParams, DsaPublic, Signature,
};
use failure::Error;
use num_traits::NumOps;
use tracing::{debug, info, instrument};

use crate::AttackError;

/// Finds the secret key behind a signature whose nonce was drawn from `window`.
///
/// `g^k` is stepped one multiplication at a time; every k that reproduces `r` yields a
/// candidate key, which is checked against the public key.
#[instrument(skip(public, h, signature))]
pub fn dsa_nonce_brute_force<T>(
    public: &DsaPublic<T>,
    h: &T,
    signature: &Signature<T>,
    window: RangeInclusive<u32>,
) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    let DsaParams { p, q, g } = public.params();
    let mut gk = g.mod_exp(&T::from_u32(*window.start()), p);
    for k in window {
        if gk.mod_math(q) == signature.r {
            let k = T::from_u32(k);
            let x = secret_key_from_nonce(q, h, signature, &k)?;
            if public.matches_secret(&x) {
                info!(k = ?k, "found nonce");
                return Ok(x);
            }
            debug!(k = ?k, "r matches but key does not");
        }
        gk = (&gk * g).mod_math(p);
    }
    Err(AttackError::SearchExhausted.into())
}

/// Recovers the secret key from a list of `(hash, signature)` pairs in which two signatures
/// share a nonce. Such pairs show up as equal `r`.
pub fn recover_key_from_repeated_nonce<T>(
    public: &DsaPublic<T>,
    signed: &[(T, Signature<T>)],
) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    let q = &public.params().q;
    for (i, (h1, s1)) in signed.iter().enumerate() {
        for (h2, s2) in &signed[i + 1..] {
            if s1.r != s2.r {
                continue;
            }
            let k = nonce_from_repeated_signatures(q, h1, s1, h2, s2)?;
            let x = secret_key_from_nonce(q, h1, s1, &k)?;
            if public.matches_secret(&x) {
                return Ok(x);
            }
        }
    }
    Err(AttackError::SearchExhausted.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bignum::OpensslBigNum as BigNum;
    use dsa::{message_hash, DsaPrivate};

    fn int(s: &str) -> BigNum {
        <BigNum as BigNumTrait>::from_dec_str(s).unwrap()
    }

    #[test]
    fn small_nonce() {
        let private = DsaPrivate::<BigNum>::generate(DsaParams::standard().unwrap());
        let public = private.public_key();
        let signature = private.sign_with_nonce(b"small k", &int("4242")).unwrap();
        let h = message_hash(b"small k");
        let x = dsa_nonce_brute_force(&public, &h, &signature, 4000..=5000).unwrap();
        assert_eq!(private.x(), &x);
        assert!(dsa_nonce_brute_force(&public, &h, &signature, 0..=4000).is_err());
    }

    #[test]
    fn repeated_nonce() {
        let private = DsaPrivate::<BigNum>::generate(DsaParams::standard().unwrap());
        let public = private.public_key();
        let k = int("123456789");
        let mut signed = Vec::new();
        for message in [&b"first"[..], &b"second"[..], &b"third"[..]].iter() {
            signed.push((message_hash(message), private.sign(message).unwrap()));
        }
        assert!(recover_key_from_repeated_nonce(&public, &signed).is_err());

        for message in [&b"fourth"[..], &b"fifth"[..]].iter() {
            let signature = private.sign_with_nonce(message, &k).unwrap();
            signed.push((message_hash(message), signature));
        }
        let x = recover_key_from_repeated_nonce(&public, &signed).unwrap();
        assert_eq!(private.x(), &x);
    }
}
