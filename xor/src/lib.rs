#[macro_use]
extern crate failure;

pub mod analysis;

use failure::Error;

pub use analysis::{
    break_many_time_pad, break_repeating_xor, break_single_byte_xor, estimate_key_size,
    hamming_distance, printable_score, transpose, SingleByteGuess,
};

#[derive(Debug, Fail)]
pub enum XorError {
    #[fail(display = "inputs differ in length: {} != {}", left, right)]
    LengthMismatch { left: usize, right: usize },
}

/// Byte-wise XOR where the right hand side is repeated to cover the left hand side.
pub trait XOR {
    fn xor(&self, _: &Self) -> Vec<u8>;
    fn xor_inplace(&mut self, _: &Self);
}

impl XOR for [u8] {
    fn xor(&self, t: &[u8]) -> Vec<u8> {
        let mut result = self.to_vec();
        result[..].xor_inplace(t);
        result
    }

    fn xor_inplace(&mut self, t: &[u8]) {
        if t.is_empty() {
            return;
        }
        for chunk in self.chunks_mut(t.len()) {
            let len = chunk.len();
            for (c, &d) in chunk.iter_mut().zip(t[..len].iter()) {
                *c ^= d;
            }
        }
    }
}

/// XOR of two buffers of the same length.
pub fn fixed_xor(u: &[u8], v: &[u8]) -> Result<Vec<u8>, Error> {
    if u.len() != v.len() {
        return Err(XorError::LengthMismatch {
            left: u.len(),
            right: v.len(),
        }
        .into());
    }
    Ok(u.xor(v))
}

/// XOR of any number of buffers of the same length.
pub fn fixed_xor_all(inputs: &[&[u8]]) -> Result<Vec<u8>, Error> {
    let (first, rest) = match inputs.split_first() {
        Some(split) => split,
        None => return Ok(Vec::new()),
    };
    rest.iter()
        .try_fold(first.to_vec(), |acc, input| fixed_xor(&acc, input))
}

pub fn cyclic_xor(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.xor(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_xor_rejects_unequal_lengths() {
        let err = fixed_xor(b"abc", b"ab").unwrap_err();
        match err.downcast_ref::<XorError>() {
            Some(XorError::LengthMismatch { left: 3, right: 2 }) => {}
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn fixed_xor_of_three() {
        let result = fixed_xor_all(&[&[1, 2], &[2, 4], &[4, 8]]).unwrap();
        assert_eq!(vec![7, 14], result);
    }

    #[test]
    fn repeating_key_xor() {
        let input = b"Burning 'em, if you ain't quick and nimble\nI go crazy when I hear a cymbal";
        let expected = [
            0x0b, 0x36, 0x37, 0x27, 0x2a, 0x2b, 0x2e, 0x63, 0x62, 0x2c, 0x2e, 0x69, 0x69, 0x2a,
            0x23, 0x69, 0x3a, 0x2a, 0x3c, 0x63, 0x24, 0x20, 0x2d, 0x62, 0x3d, 0x63, 0x34, 0x3c,
            0x2a, 0x26, 0x22, 0x63, 0x24, 0x27, 0x27, 0x65, 0x27, 0x2a, 0x28, 0x2b, 0x2f, 0x20,
            0x43, 0x0a, 0x65, 0x2e, 0x2c, 0x65, 0x2a, 0x31, 0x24, 0x33, 0x3a, 0x65, 0x3e, 0x2b,
            0x20, 0x27, 0x63, 0x0c, 0x69, 0x2b, 0x20, 0x28, 0x31, 0x65, 0x28, 0x63, 0x26, 0x30,
            0x2e, 0x27, 0x28, 0x2f,
        ];
        assert_eq!(&expected[..], &cyclic_xor(input, b"ICE")[..]);
    }
}
