//! DSA over the fixed 1024 bit group, with the hooks needed to exploit nonce misuse and
//! parameter substitution.
//!
//! Messages are hashed with SHA-1 and the digest is used as an integer without truncation,
//! which is fine because q has 160 bits.

#[macro_use]
extern crate failure;

use bignum::{BigNumExt, BigNumTrait};
use failure::Error;
use num_traits::NumOps;
use tracing::debug;

/// Number of fresh nonces tried before signing gives up.
pub const MAX_SIGNING_ATTEMPTS: usize = 32;

const P_HEX: &str = "\
    800000000000000089e1855218a0e7dac38136ffafa72eda7859f2171e25e65eac698c1702578b07dc2a1076\
    da241c76c62d374d8389ea5aeffd3226a0530cc565f3bf6b50929139ebeac04f48c3c84afb796d61e5a4f9a8fd\
    a812ab59494232c7d2b4deb50aa18ee9e132bfa85ac4374d7f9091abc3d015efc871a584471bb1";
const Q_HEX: &str = "f4f47f05794b256174bba6e9b396a7707e563c5b";
const G_HEX: &str = "\
    5958c9d3898b224b12672c0b98e06c60df923cb8bc999d119458fef538b8fa4046c8db53039db620c094c9fa\
    077ef389b5322a559946a71903f990f1f7e0e025e2d7f7cf494aff1a0470f5b64c36b625a097f1651fe775323\
    556fe00b3608c887892878480e99041be601a62166ca6894bdd41a7054ec89f756ba9fc95302291";

#[derive(Debug, Fail)]
pub enum DsaError {
    #[fail(display = "no nonce produced a signature with nonzero r and s")]
    DegenerateSignature,

    #[fail(display = "signatures do not share a nonce")]
    DistinctNonces,
}

#[derive(Debug)]
pub struct DsaParams<T> {
    pub p: T,
    pub q: T,
    pub g: T,
}

impl<T: BigNumTrait> DsaParams<T> {
    pub fn standard() -> Result<Self, Error> {
        Ok(DsaParams {
            p: T::from_hex_str(P_HEX)?,
            q: T::from_hex_str(Q_HEX)?,
            g: T::from_hex_str(G_HEX)?,
        })
    }

    /// Same group, attacker chosen generator.
    pub fn with_generator(self, g: T) -> Self {
        DsaParams { g, ..self }
    }
}

impl<T: BigNumTrait> Clone for DsaParams<T> {
    fn clone(&self) -> Self {
        DsaParams {
            p: T::clone(&self.p),
            q: T::clone(&self.q),
            g: T::clone(&self.g),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Signature<T> {
    pub r: T,
    pub s: T,
}

pub fn message_hash<T: BigNumTrait>(message: &[u8]) -> T {
    T::from_bytes_be(&mac::sha1(message))
}

/// A uniform value in `[1, bound)`.
fn gen_nonzero_below<T: BigNumTrait>(bound: &T) -> T {
    let zero = T::zero();
    loop {
        let x = T::gen_below(bound);
        if x != zero {
            return x;
        }
    }
}

pub struct DsaPrivate<T> {
    params: DsaParams<T>,
    x: T,
    y: T,
}

impl<T> DsaPrivate<T>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    pub fn generate(params: DsaParams<T>) -> Self {
        let x = gen_nonzero_below(&params.q);
        Self::from_secret(params, x)
    }

    pub fn from_secret(params: DsaParams<T>, x: T) -> Self {
        let y = params.g.mod_exp(&x, &params.p);
        DsaPrivate { params, x, y }
    }

    pub fn x(&self) -> &T {
        &self.x
    }

    pub fn public_key(&self) -> DsaPublic<T> {
        DsaPublic {
            params: self.params.clone(),
            y: T::clone(&self.y),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature<T>, Error> {
        for _ in 0..MAX_SIGNING_ATTEMPTS {
            let k = gen_nonzero_below(&self.params.q);
            match self.sign_with_nonce(message, &k) {
                Ok(signature) => return Ok(signature),
                Err(err) => match err.downcast_ref::<DsaError>() {
                    Some(DsaError::DegenerateSignature) => debug!("degenerate nonce, retrying"),
                    _ => return Err(err),
                },
            }
        }
        Err(DsaError::DegenerateSignature.into())
    }

    /// Signs with a caller supplied nonce. Fails if the nonce yields r = 0 or s = 0.
    pub fn sign_with_nonce(&self, message: &[u8], k: &T) -> Result<Signature<T>, Error> {
        let DsaParams { p, q, g } = &self.params;
        let zero = T::zero();
        let r = g.mod_exp(k, p).mod_math(q);
        if r == zero {
            return Err(DsaError::DegenerateSignature.into());
        }
        let h: T = message_hash(message);
        let s = (&k.mod_inverse(q)? * &(&h + &(&r * &self.x))).mod_math(q);
        if s == zero {
            return Err(DsaError::DegenerateSignature.into());
        }
        Ok(Signature { r, s })
    }
}

#[derive(Debug)]
pub struct DsaPublic<T> {
    params: DsaParams<T>,
    y: T,
}

impl<T> DsaPublic<T>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    pub fn new(params: DsaParams<T>, y: T) -> Self {
        DsaPublic { params, y }
    }

    pub fn params(&self) -> &DsaParams<T> {
        &self.params
    }

    pub fn y(&self) -> &T {
        &self.y
    }

    pub fn verify(&self, message: &[u8], signature: &Signature<T>) -> bool {
        self.verify_hash(&message_hash(message), signature)
    }

    pub fn verify_hash(&self, h: &T, Signature { r, s }: &Signature<T>) -> bool {
        let DsaParams { p, q, g } = &self.params;
        let zero = T::zero();
        if r <= &zero || r >= q || s <= &zero || s >= q {
            return false;
        }
        let w = match s.mod_inverse(q) {
            Ok(w) => w,
            Err(_) => return false,
        };
        let u1 = (h * &w).mod_math(q);
        let u2 = (r * &w).mod_math(q);
        let v = (&g.mod_exp(&u1, p) * &self.y.mod_exp(&u2, p))
            .mod_math(p)
            .mod_math(q);
        &v == r
    }

    /// Whether `x` is the secret key behind this public key.
    pub fn matches_secret(&self, x: &T) -> bool {
        self.params.g.mod_exp(x, &self.params.p) == self.y
    }
}

/// Solves `s = k^-1 (h + x r)` for x.
pub fn secret_key_from_nonce<T>(
    q: &T,
    h: &T,
    Signature { r, s }: &Signature<T>,
    k: &T,
) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    let x = &(&(s * k) - h) * &r.mod_inverse(q)?;
    Ok(x.mod_math(q))
}

/// Recovers the nonce shared by two signatures, which then share the same r.
pub fn nonce_from_repeated_signatures<T>(
    q: &T,
    h1: &T,
    signature1: &Signature<T>,
    h2: &T,
    signature2: &Signature<T>,
) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    if signature1.r != signature2.r {
        return Err(DsaError::DistinctNonces.into());
    }
    let ds = (&signature1.s - &signature2.s).mod_math(q);
    let k = &(h1 - h2).mod_math(q) * &ds.mod_inverse(q)?;
    Ok(k.mod_math(q))
}

/// A signature that verifies for every message once the generator has been replaced by
/// p + 1, because then every power of g and of y is 1 modulo p.
pub fn magic_signature<T>(public: &DsaPublic<T>) -> Result<Signature<T>, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    let DsaParams { p, q, .. } = public.params();
    let z = gen_nonzero_below(q);
    let r = public.y().mod_exp(&z, p).mod_math(q);
    let s = (&r * &z.mod_inverse(q)?).mod_math(q);
    Ok(Signature { r, s })
}
