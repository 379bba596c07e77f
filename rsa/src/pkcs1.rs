//! PKCS#1 v1.5 block formatting.
//!
//! A block is exactly `k` bytes long, `k` being the size of the modulus:
//! `00 || BT || PS || 00 || D` with at least eight padding bytes. Block type 1 pads with `FF`
//! and is used for signatures, block type 2 pads with random nonzero bytes for encryption.

use failure::Error;
use rand::Rng;

use crate::RsaError;

/// DER prefix of a SHA-1 `DigestInfo`.
pub const SHA1_DIGEST_INFO: [u8; 15] = [
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];

const MIN_PADDING: usize = 8;
const SHA1_SIZE: usize = 20;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockType {
    Signature = 1,
    Encryption = 2,
}

pub fn pkcs1_pad(data: &[u8], k: usize, block_type: BlockType) -> Result<Vec<u8>, Error> {
    if data.len() + 3 + MIN_PADDING > k {
        return Err(RsaError::MessageTooLong.into());
    }
    let padding_len = k - 3 - data.len();
    let mut block = Vec::with_capacity(k);
    block.push(0);
    block.push(block_type as u8);
    match block_type {
        BlockType::Signature => block.resize(2 + padding_len, 0xff),
        BlockType::Encryption => {
            let mut rng = rand::thread_rng();
            block.extend((0..padding_len).map(|_| rng.gen_range(1..=255u8)));
        }
    }
    block.push(0);
    block.extend_from_slice(data);
    Ok(block)
}

pub fn pkcs1_unpad(block: &[u8], block_type: BlockType) -> Result<Vec<u8>, Error> {
    if block.len() < 3 + MIN_PADDING || block[0] != 0 || block[1] != block_type as u8 {
        return Err(RsaError::InvalidPadding.into());
    }
    let separator = match block[2..].iter().position(|&b| b == 0) {
        Some(position) => 2 + position,
        None => return Err(RsaError::InvalidPadding.into()),
    };
    let padding = &block[2..separator];
    if padding.len() < MIN_PADDING
        || (block_type == BlockType::Signature && padding.iter().any(|&b| b != 0xff))
    {
        return Err(RsaError::InvalidPadding.into());
    }
    Ok(block[separator + 1..].to_vec())
}

pub(crate) fn signature_block(message: &[u8], k: usize) -> Result<Vec<u8>, Error> {
    let mut data = SHA1_DIGEST_INFO.to_vec();
    data.extend_from_slice(&mac::sha1(message));
    pkcs1_pad(&data, k, BlockType::Signature)
}

/// Reads the digest out of a signature block the careless way: any positive number of `FF`
/// bytes is accepted and nothing checks that the digest ends the block.
pub(crate) fn sloppy_digest(block: &[u8]) -> Option<Vec<u8>> {
    if block.len() < 2 || block[0] != 0 || block[1] != 1 {
        return None;
    }
    let ff_count = block[2..].iter().take_while(|&&b| b == 0xff).count();
    if ff_count == 0 {
        return None;
    }
    let rest = &block[2 + ff_count..];
    let info_len = 1 + SHA1_DIGEST_INFO.len();
    if rest.len() < info_len + SHA1_SIZE || rest[0] != 0 || rest[1..info_len] != SHA1_DIGEST_INFO {
        return None;
    }
    Some(rest[info_len..info_len + SHA1_SIZE].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_padding() {
        let block = pkcs1_pad(b"YELLOW SUBMARINE", 64, BlockType::Encryption).unwrap();
        assert_eq!(64, block.len());
        assert_eq!(&[0u8, 2][..], &block[..2]);
        assert!(block[2..64 - 17].iter().all(|&b| b != 0));
        assert_eq!(
            b"YELLOW SUBMARINE".to_vec(),
            pkcs1_unpad(&block, BlockType::Encryption).unwrap()
        );
        assert!(pkcs1_unpad(&block, BlockType::Signature).is_err());
    }

    #[test]
    fn signature_padding() {
        let block = pkcs1_pad(b"abc", 32, BlockType::Signature).unwrap();
        assert_eq!(&[0u8, 1, 0xff, 0xff][..], &block[..4]);
        assert_eq!(b"abc".to_vec(), pkcs1_unpad(&block, BlockType::Signature).unwrap());
    }

    #[test]
    fn rejects_malformed_blocks() {
        let mut block = pkcs1_pad(b"abc", 32, BlockType::Encryption).unwrap();
        block[5] = 0;
        assert!(pkcs1_unpad(&block, BlockType::Encryption).is_err());
        assert!(pkcs1_unpad(&[0, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1], BlockType::Encryption).is_err());
        assert!(pkcs1_pad(&[0; 22], 32, BlockType::Signature).is_err());
    }

    #[test]
    fn sloppy_parser_ignores_trailing_bytes() {
        let mut block = vec![0, 1, 0xff, 0];
        block.extend_from_slice(&SHA1_DIGEST_INFO);
        block.extend_from_slice(&mac::sha1(b"hi mom"));
        block.extend_from_slice(&[0x42; 30]);
        assert_eq!(Some(mac::sha1(b"hi mom")), sloppy_digest(&block));

        block[2] = 0;
        assert_eq!(None, sloppy_digest(&block));
    }
}
