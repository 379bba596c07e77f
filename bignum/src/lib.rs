#[macro_use]
extern crate failure;

use std::cmp::Ordering;
use std::fmt;

use failure::Error;
use num::bigint::{BigInt, RandBigInt, Sign};
use num::{Integer, Num, One, Signed, Zero};
use num_traits::NumOps;
use openssl::bn::{BigNum, BigNumContext, BigNumRef, MsbOption};
use openssl::error::ErrorStack;

pub use num::bigint::BigInt as NumBigInt;
pub use openssl::bn::BigNum as OpensslBigNum;

#[derive(Debug, Fail)]
pub enum BigNumError {
    #[fail(display = "not invertible modulo the given modulus")]
    NotInvertible,

    #[fail(display = "invalid base {} string {:?}", radix, input)]
    InvalidDigits { radix: u32, input: String },

    #[fail(display = "root of degree {} is undefined", degree)]
    InvalidRootDegree { degree: usize },
}

/// The operations our algorithms need from an arbitrary precision integer type. Implemented
/// for the `num` crate's `BigInt` and for OpenSSL's `BigNum`.
pub trait BigNumTrait: Sized + Ord + fmt::Debug {
    fn zero() -> Self;
    fn one() -> Self;
    fn from_u32(u: u32) -> Self;
    fn from_bytes_be(bytes: &[u8]) -> Self;
    /// Big endian magnitude without leading zeros; empty for zero.
    fn to_bytes_be(&self) -> Vec<u8>;
    fn from_hex_str(s: &str) -> Result<Self, Error>;
    fn from_dec_str(s: &str) -> Result<Self, Error>;
    fn to_hex_str(&self) -> String;
    fn to_dec_str(&self) -> String;
    fn mod_exp(&self, exponent: &Self, modulus: &Self) -> Self;
    fn gen_below(bound: &Self) -> Self;
    fn gen_prime(bits: usize) -> Self;
    fn gen_random(bits: usize) -> Self;
    /// Remainder in `[0, n)` for positive `n`.
    fn mod_math(&self, n: &Self) -> Self;
    fn power(&self, k: usize) -> Self;
    fn clone(x: &Self) -> Self;
    fn rsh(&self, k: usize) -> Self;
    fn lsh(&self, k: usize) -> Self;
    fn bits(&self) -> usize;
    fn bytes(&self) -> usize;
    fn is_odd(&self) -> bool;
}

impl BigNumTrait for BigInt {
    fn zero() -> Self {
        Zero::zero()
    }

    fn one() -> Self {
        One::one()
    }

    fn from_u32(u: u32) -> Self {
        BigInt::from(u)
    }

    fn from_bytes_be(bytes: &[u8]) -> Self {
        BigInt::from_bytes_be(Sign::Plus, bytes)
    }

    fn to_bytes_be(&self) -> Vec<u8> {
        if self.is_zero() {
            return Vec::new();
        }
        self.to_bytes_be().1
    }

    fn from_hex_str(s: &str) -> Result<Self, Error> {
        BigInt::from_str_radix(s, 16).map_err(|_| {
            BigNumError::InvalidDigits {
                radix: 16,
                input: s.to_string(),
            }
            .into()
        })
    }

    fn from_dec_str(s: &str) -> Result<Self, Error> {
        BigInt::from_str_radix(s, 10).map_err(|_| {
            BigNumError::InvalidDigits {
                radix: 10,
                input: s.to_string(),
            }
            .into()
        })
    }

    fn to_hex_str(&self) -> String {
        self.to_str_radix(16)
    }

    fn to_dec_str(&self) -> String {
        self.to_str_radix(10)
    }

    fn mod_exp(&self, exponent: &Self, modulus: &Self) -> Self {
        self.modpow(exponent, modulus)
    }

    fn gen_below(bound: &Self) -> Self {
        let mut rng = rand::thread_rng();
        rng.gen_bigint_range(&Zero::zero(), bound)
    }

    fn gen_prime(bits: usize) -> Self {
        BigInt::from_bytes_be(Sign::Plus, &<BigNum as BigNumTrait>::gen_prime(bits).to_vec())
    }

    fn gen_random(bits: usize) -> Self {
        let mut rng = rand::thread_rng();
        BigInt::from_biguint(Sign::Plus, rng.gen_biguint(bits as u64))
    }

    fn mod_math(&self, n: &Self) -> Self {
        self.mod_floor(n)
    }

    fn power(&self, k: usize) -> Self {
        num::pow(self.clone(), k)
    }

    fn clone(n: &Self) -> Self {
        n.clone()
    }

    fn rsh(&self, k: usize) -> Self {
        self >> k
    }

    fn lsh(&self, k: usize) -> Self {
        self << k
    }

    fn bits(&self) -> usize {
        BigInt::bits(self) as usize
    }

    fn bytes(&self) -> usize {
        (BigNumTrait::bits(self) + 7) / 8
    }

    fn is_odd(&self) -> bool {
        Integer::is_odd(&self.abs())
    }
}

// Failures inside libcrypto here only come from allocation, which we do not recover from.
fn checked<T>(result: Result<T, ErrorStack>) -> T {
    match result {
        Ok(value) => value,
        Err(stack) => panic!("libcrypto bignum operation failed: {}", stack),
    }
}

fn context() -> BigNumContext {
    checked(BigNumContext::new())
}

impl BigNumTrait for BigNum {
    fn zero() -> Self {
        checked(BigNum::new())
    }

    fn one() -> Self {
        BigNumTrait::from_u32(1)
    }

    fn from_u32(u: u32) -> Self {
        checked(BigNum::from_u32(u))
    }

    fn from_bytes_be(bytes: &[u8]) -> Self {
        checked(BigNum::from_slice(bytes))
    }

    fn to_bytes_be(&self) -> Vec<u8> {
        self.to_vec()
    }

    fn from_hex_str(s: &str) -> Result<Self, Error> {
        BigNum::from_hex_str(s).map_err(|_| {
            BigNumError::InvalidDigits {
                radix: 16,
                input: s.to_string(),
            }
            .into()
        })
    }

    fn from_dec_str(s: &str) -> Result<Self, Error> {
        BigNum::from_dec_str(s).map_err(|_| {
            BigNumError::InvalidDigits {
                radix: 10,
                input: s.to_string(),
            }
            .into()
        })
    }

    fn to_hex_str(&self) -> String {
        let hex = checked(BigNumRef::to_hex_str(self)).to_lowercase();
        // OpenSSL pads to whole bytes.
        match hex.strip_prefix('-') {
            Some(magnitude) => format!("-{}", strip_leading_zeros(magnitude)),
            None => strip_leading_zeros(&hex).to_string(),
        }
    }

    fn to_dec_str(&self) -> String {
        checked(BigNumRef::to_dec_str(self)).to_string()
    }

    fn mod_exp(&self, exponent: &Self, modulus: &Self) -> Self {
        let mut result = checked(BigNum::new());
        checked(BigNumRef::mod_exp(
            &mut result,
            self,
            exponent,
            modulus,
            &mut context(),
        ));
        result
    }

    fn gen_below(bound: &Self) -> Self {
        let mut result = checked(BigNum::new());
        checked(bound.rand_range(&mut result));
        result
    }

    fn gen_prime(bits: usize) -> Self {
        let mut result = checked(BigNum::new());
        checked(result.generate_prime(bits as i32, false, None, None));
        result
    }

    fn gen_random(bits: usize) -> Self {
        let mut result = checked(BigNum::new());
        checked(result.rand(bits as i32, MsbOption::MAYBE_ZERO, false));
        result
    }

    fn mod_math(&self, n: &Self) -> Self {
        let mut result = checked(BigNum::new());
        checked(result.nnmod(self, n, &mut context()));
        result
    }

    fn power(&self, k: usize) -> Self {
        let mut result = checked(BigNum::new());
        checked(result.exp(
            self,
            &<Self as BigNumTrait>::from_u32(k as u32),
            &mut context(),
        ));
        result
    }

    fn clone(n: &Self) -> Self {
        checked(BigNumRef::to_owned(n))
    }

    fn rsh(&self, k: usize) -> Self {
        let mut result = checked(BigNum::new());
        checked(result.rshift(self, k as i32));
        result
    }

    fn lsh(&self, k: usize) -> Self {
        let mut result = checked(BigNum::new());
        checked(result.lshift(self, k as i32));
        result
    }

    fn bits(&self) -> usize {
        self.num_bits() as usize
    }

    fn bytes(&self) -> usize {
        self.num_bytes() as usize
    }

    fn is_odd(&self) -> bool {
        self.is_bit_set(0)
    }
}

/// Big endian bytes of `x`, left padded with zeros to `len` bytes. Longer values are
/// returned unpadded.
pub fn to_bytes_be_padded<T: BigNumTrait>(x: &T, len: usize) -> Vec<u8> {
    let bytes = x.to_bytes_be();
    if bytes.len() >= len {
        return bytes;
    }
    let mut padded = vec![0; len - bytes.len()];
    padded.extend_from_slice(&bytes);
    padded
}

fn strip_leading_zeros(hex: &str) -> &str {
    let stripped = hex.trim_start_matches('0');
    if stripped.is_empty() {
        "0"
    } else {
        stripped
    }
}

/// Algorithms built on top of the arithmetic operators.
pub trait BigNumExt: Sized {
    fn ceil_div(&self, k: &Self) -> (Self, Self);
    fn floor_div(&self, k: &Self) -> (Self, Self);
    fn extended_gcd(&self, n: &Self) -> (Self, Self);
    fn mod_inverse(&self, n: &Self) -> Result<Self, Error>;
    fn root(&self, k: usize) -> Result<(Self, bool), Error>;
    fn cube_root(&self) -> Self;
}

impl<T: BigNumTrait> BigNumExt for T
where
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    fn ceil_div(&self, k: &T) -> (T, T) {
        let q = &(&(self + k) - &T::one()) / k;
        let r = &(&q * k) - self;
        (q, r)
    }

    fn floor_div(&self, k: &T) -> (T, T) {
        (self / k, self % k)
    }

    /// Returns `(gcd, t)` with `self * t ≡ gcd (mod n)`.
    fn extended_gcd(&self, n: &T) -> (T, T) {
        let mut t = (T::zero(), T::one());
        let mut r = (T::clone(n), T::clone(self));
        while r.1 != T::zero() {
            let q = &r.0 / &r.1;
            t = (T::clone(&t.1), &t.0 - &(&q * &t.1));
            r = (T::clone(&r.1), &r.0 % &r.1);
        }
        (r.0, t.0)
    }

    fn mod_inverse(&self, n: &T) -> Result<T, Error> {
        let (gcd, t) = self.mod_math(n).extended_gcd(n);
        if gcd != T::one() {
            return Err(BigNumError::NotInvertible.into());
        }
        Ok(t.mod_math(n))
    }

    // Returns a pair (r, is_root), where r is the biggest integer with r^k <= x, and is_root
    // indicates whether we have equality.
    fn root(&self, k: usize) -> Result<(T, bool), Error> {
        if k == 0 {
            return Err(BigNumError::InvalidRootDegree { degree: k }.into());
        }
        Ok(integer_root(self, k))
    }

    /// Cube root rounded to the nearest integer.
    fn cube_root(&self) -> T {
        let (r, exact) = integer_root(self, 3);
        if exact {
            return r;
        }
        let next = &r + &T::one();
        let below = self - &r.power(3);
        let above = &next.power(3) - self;
        if above < below {
            next
        } else {
            r
        }
    }
}

// Binary search for the k-th root of a nonnegative x; k must be positive.
fn integer_root<T>(x: &T, k: usize) -> (T, bool)
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    let one = T::one();
    let mut a = T::zero();
    // r^k <= x implies r < 2^(bits(x)/k + 1).
    let mut b = one.lsh(BigNumTrait::bits(x) / k + 1);
    if b > *x {
        b = T::clone(x);
    }
    while a <= b {
        let mid = (&a + &b).rsh(1);
        match x.cmp(&mid.power(k)) {
            Ordering::Greater => a = &mid + &one,
            Ordering::Less => b = &mid - &one,
            Ordering::Equal => return (mid, true),
        }
    }
    (b, false)
}

/// Chinese remainder reconstruction: the unique `x` modulo the product of `moduli` with
/// `x ≡ residues[i] (mod moduli[i])`. The moduli must be pairwise coprime.
pub fn crt<T>(residues: &[T], moduli: &[T]) -> Result<T, Error>
where
    T: BigNumTrait,
    for<'a1, 'a2> &'a1 T: NumOps<&'a2 T, T>,
{
    ensure!(
        residues.len() == moduli.len() && !moduli.is_empty(),
        "need one modulus per residue"
    );
    let product = moduli.iter().fold(T::one(), |acc, n| &acc * n);
    let mut result = T::zero();
    for (residue, n) in residues.iter().zip(moduli.iter()) {
        let m = &product / n;
        let term = &(residue * &m) * &m.mod_inverse(n)?;
        result = &result + &term;
    }
    Ok(result.mod_math(&product))
}
