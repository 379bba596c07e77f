use std::cmp;

use bignum::OpensslBigNum as BigNum;
use bignum::{crt, to_bytes_be_padded, BigNumExt, BigNumTrait};
use failure::Error;
use num_traits::NumOps;
use oracle::{RsaDecryptOnce, RsaPaddingOracle, RsaParityOracle};
use rsa::{RsaPublic, SHA1_DIGEST_INFO};
use tracing::{debug, info, instrument};

use crate::AttackError;

/// Recovers a message that was encrypted with e = 3 under three different moduli.
///
/// The CRT yields `m^3` modulo the product of the moduli, and as `m^3` is smaller than that
/// product, it is `m^3` itself.
pub fn rsa_broadcast<T>(ciphertexts: &[T], moduli: &[T]) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    ensure!(
        ciphertexts.len() == 3,
        "need three ciphertexts, got {}",
        ciphertexts.len()
    );
    let cube = crt(ciphertexts, moduli)?;
    let m = cube.cube_root();
    ensure!(m.power(3) == cube, "CRT result is not a perfect cube");
    Ok(m)
}

fn unblind<T, F>(public: &RsaPublic<T>, c: &T, decrypt: F) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
    F: FnOnce(&T) -> Result<T, Error>,
{
    let n = public.n();
    let s = T::from_u32(2);
    let blinded = (&public.encrypt(&s) * c).mod_math(n);
    let p = decrypt(&blinded)?;
    Ok((&p * &s.mod_inverse(n)?).mod_math(n))
}

/// Decrypts `c` through a server that refuses to decrypt the same ciphertext twice, by
/// submitting `c * 2^e` instead and dividing the answer by 2.
pub fn unpadded_message_recovery(
    oracle: &mut RsaDecryptOnce,
    c: &BigNum,
) -> Result<BigNum, Error> {
    let public = oracle.public_key();
    unblind(&public, c, |blinded| oracle.decrypt(blinded))
}

/// Forges a PKCS#1 v1.5 signature for `message` that passes a verifier which does not check
/// that the digest ends the block. Works for e = 3 when the modulus is large enough.
///
/// We look for a cube of the form `00 01 FF .. FF 00 DigestInfo hash garbage`. Any integer
/// between the smallest and the largest such block will do, and the interval contains a cube
/// as soon as the garbage is long enough. Otherwise another `FF` is added.
pub fn forge_e3_signature<T>(public: &RsaPublic<T>, message: &[u8]) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    let size = public.k();
    let mut suffix = vec![0u8];
    suffix.extend_from_slice(&SHA1_DIGEST_INFO);
    suffix.extend_from_slice(&mac::sha1(message));

    let one = T::one();
    let mut prefix = vec![1u8, 0xff];
    // The leading zero byte of the block is not part of the integer.
    while 1 + prefix.len() + suffix.len() <= size {
        let unused_space = size - 1 - prefix.len() - suffix.len();
        let fake_block = T::from_bytes_be(&[&prefix[..], &suffix[..]].concat());
        let lower = fake_block.lsh(8 * unused_space);
        let upper = (&fake_block + &one).lsh(8 * unused_space);
        let (r, _) = (&upper - &one).root(3)?;
        if r.power(3) >= lower {
            debug!(ff_count = prefix.len() - 1, unused_space, "found cube");
            return Ok(r);
        }
        prefix.push(0xff);
    }
    Err(AttackError::SearchExhausted.into())
}

// The plaintext of enc(2)^i * c is 2^i * m mod n, and it is even exactly when 2^i * m mod n
// lies in the lower half. Each answer halves the interval
//   (l - 1) * n <= 2^i * m < l * n
// until, after bits(n) steps, it contains a single integer.
fn parity_search<T, F>(public: &RsaPublic<T>, c: &T, is_even: F) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
    F: Fn(&T) -> bool,
{
    let one = T::one();
    let two = T::from_u32(2);
    let n = public.n();
    let k = n.bits();
    let double = public.encrypt(&two);

    let mut current = T::clone(c);
    let mut l = T::one();
    for i in 0..k {
        current = (&current * &double).mod_math(n);
        l = &l * &two;
        if is_even(&current) {
            l = &l - &one;
        }
        if i % 128 == 0 {
            debug!(step = i, upper = ?(n * &l).rsh(i + 1), "narrowing");
        }
    }

    let m = (n * &l).rsh(k);
    ensure!(
        &public.encrypt(&m) == c,
        "parity answers are inconsistent with the ciphertext"
    );
    Ok(m)
}

/// Decrypts `c` with an oracle that leaks the parity of the plaintext.
pub fn parity_decrypt(oracle: &RsaParityOracle, c: &BigNum) -> Result<BigNum, Error> {
    let public = oracle.public_key();
    let m = parity_search(&public, c, |c| oracle.is_even(c))?;
    info!(bits = BigNumTrait::bits(&m), "decrypted via parity oracle");
    Ok(m)
}

// Variable names follow Bleichenbacher's paper "Chosen Ciphertext Attacks Against Protocols
// Based on the RSA Encryption Standard PKCS #1". The ciphertext is already conforming, so
// the blinding step is skipped.
#[allow(non_snake_case)]
fn bleichenbacher_search<T, F>(
    public: &RsaPublic<T>,
    c: &T,
    is_conforming: F,
) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
    F: Fn(&T) -> bool,
{
    let _1 = T::one();
    let _2 = T::from_u32(2);
    let _3 = T::from_u32(3);

    let n = public.n();
    let k = public.k();
    ensure!(k > 11, "modulus too small for PKCS#1 padding");
    let B = _1.lsh(8 * (k - 2));
    let _2B = &_2 * &B;
    let _3B = &_3 * &B;

    let conforming_with =
        |s: &T| -> bool { is_conforming(&(c * &public.encrypt(s)).mod_math(n)) };

    let mut M_prev = vec![(T::clone(&_2B), &_3B - &_1)];
    let mut s_prev = T::one();
    let mut i = 1;

    loop {
        let mut si;
        if i == 1 {
            // Step 2.a
            si = n.ceil_div(&_3B).0;
            while !conforming_with(&si) {
                si = &si + &_1;
            }
        } else if M_prev.len() >= 2 {
            // Step 2.b
            si = &s_prev + &_1;
            while !conforming_with(&si) {
                si = &si + &_1;
            }
        } else {
            // Step 2.c
            let (a, b) = &M_prev[0];
            let mut ri = (&_2 * &(&(b * &s_prev) - &_2B)).ceil_div(n).0;
            'outer: loop {
                si = (&_2B + &(&ri * n)).ceil_div(b).0;
                let U = (&_3B + &(&ri * n)).ceil_div(a).0;
                while si < U {
                    if conforming_with(&si) {
                        break 'outer;
                    }
                    si = &si + &_1;
                }
                ri = &ri + &_1;
            }
        }

        // Step 3
        let mut Mi = Vec::new();
        for (a, b) in &M_prev {
            let mut r = (&(&(a * &si) - &_3B) + &_1).ceil_div(n).0;
            let U = (&(b * &si) - &_2B).floor_div(n).0;
            while r <= U {
                let lower = cmp::max(T::clone(a), (&_2B + &(&r * n)).ceil_div(&si).0);
                let upper = cmp::min(
                    T::clone(b),
                    (&(&_3B - &_1) + &(&r * n)).floor_div(&si).0,
                );
                if lower <= upper {
                    Mi.push((lower, upper));
                }
                r = &r + &_1;
            }
        }
        Mi.sort();
        Mi.dedup();
        debug!(iteration = i, intervals = Mi.len(), "narrowed intervals");

        // Step 4
        match Mi.len() {
            0 => return Err(AttackError::SearchExhausted.into()),
            1 if Mi[0].0 == Mi[0].1 => return Ok(T::clone(&Mi[0].0)),
            _ => {}
        }
        i += 1;
        s_prev = si;
        M_prev = Mi;
    }
}

/// Decrypts a PKCS#1 v1.5 ciphertext with an oracle that tells whether a ciphertext
/// decrypts to a block starting with `00 02`. Returns the full padded block.
#[instrument(skip(oracle, c))]
pub fn bleichenbacher(oracle: &RsaPaddingOracle, c: &BigNum) -> Result<Vec<u8>, Error> {
    ensure!(
        oracle.is_conforming(c),
        "ciphertext does not decrypt to a conforming block"
    );
    let public = oracle.public_key();
    let m = bleichenbacher_search(&public, c, |c| oracle.is_conforming(c))?;
    info!("recovered padded plaintext");
    Ok(to_bytes_be_padded(&m, public.k()))
}
