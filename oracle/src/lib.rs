//! Black boxes that hold a secret and expose one narrow operation.
//!
//! Every oracle also offers a `verify_*` method which tells whether a candidate matches the
//! secret without ever handing out the secret itself.

#[macro_use]
extern crate failure;

pub mod asymmetric;
pub mod authentication;
pub mod block;
pub mod stream;

use std::collections::HashMap;

use failure::Error;

pub use asymmetric::{RsaDecryptOnce, RsaPaddingOracle, RsaParityOracle, SloppyRsaVerifier};
pub use authentication::{HmacTimingOracle, MacOracle};
pub use block::{
    CommentOracle, EcbOrCbc, EcbPrefixSuffix, EcbSuffix, KeyAsIvOracle, PaddingOracle,
    ProfileOracle,
};
pub use stream::{CtrEditOracle, FixedNonceCtr};

#[derive(Debug, Fail)]
pub enum OracleError {
    #[fail(display = "decrypted text is not ASCII: {:?}", plaintext)]
    NonAscii { plaintext: Vec<u8> },

    #[fail(display = "ciphertext has already been decrypted once")]
    Replay,

    #[fail(display = "input contains the forbidden byte {:#04x}", byte)]
    ForbiddenByte { byte: u8 },

    #[fail(display = "oracle has already been queried")]
    AlreadyUsed,

    #[fail(display = "candidate does not match the secret")]
    WrongSolution,
}

/// A deterministic encryption oracle: equal inputs always yield equal ciphertexts.
pub trait Oracle {
    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, Error>;
}

pub(crate) fn compare<T: PartialEq>(secret: T, candidate: T) -> Result<(), Error> {
    if secret != candidate {
        return Err(OracleError::WrongSolution.into());
    }
    Ok(())
}

pub(crate) fn reject_bytes(input: &[u8], forbidden: &[u8]) -> Result<(), Error> {
    if let Some(&byte) = input
        .iter()
        .find(|&&c| !c.is_ascii() || forbidden.contains(&c))
    {
        return Err(OracleError::ForbiddenByte { byte }.into());
    }
    Ok(())
}

/// Parses `key=value` pairs separated by `sep`. A pair without `=` maps to an empty value and
/// later pairs overwrite earlier ones.
pub fn decode_profile(u: &[u8], sep: u8) -> HashMap<&[u8], &[u8]> {
    let mut p = HashMap::new();
    for pair in u.split(|&x| x == sep) {
        let mut components = pair.splitn(2, |&x| x == b'=');
        if let Some(key) = components.next() {
            p.insert(key, components.next().unwrap_or(&[]));
        }
    }
    p
}

pub(crate) fn has_admin_flag(cleartext: &[u8], sep: u8) -> bool {
    decode_profile(cleartext, sep).get(&b"admin"[..]) == Some(&&b"true"[..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_decoding() {
        let profile = decode_profile(b"email=foo@bar.com&uid=10&role=user", b'&');
        assert_eq!(Some(&&b"foo@bar.com"[..]), profile.get(&b"email"[..]));
        assert_eq!(Some(&&b"10"[..]), profile.get(&b"uid"[..]));
        assert_eq!(Some(&&b"user"[..]), profile.get(&b"role"[..]));
    }

    #[test]
    fn profile_decoding_tolerates_garbage() {
        let profile = decode_profile(b"a=b=c;flag;admin=true", b';');
        assert_eq!(Some(&&b"b=c"[..]), profile.get(&b"a"[..]));
        assert_eq!(Some(&&b""[..]), profile.get(&b"flag"[..]));
        assert!(has_admin_flag(b"a=b=c;flag;admin=true", b';'));
        assert!(!has_admin_flag(b"admin=false", b';'));
    }

    #[test]
    fn forbidden_bytes() {
        assert!(reject_bytes(b"foo@bar.com", b"&=").is_ok());
        let err = reject_bytes(b"foo&role=admin", b"&=").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OracleError>(),
            Some(OracleError::ForbiddenByte { byte: b'&' })
        ));
        assert!(reject_bytes(&[0xc3, 0xa9], b"").is_err());
    }
}
