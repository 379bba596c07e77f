//! Statistical attacks on XOR ciphers.
//!
//! Plaintext candidates are ranked with a deliberately crude score: the number of bytes
//! that are ASCII letters or spaces.

use std::ops::RangeInclusive;

use tracing::debug;

use crate::XOR;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SingleByteGuess {
    pub score: usize,
    pub key: u8,
    pub plaintext: Vec<u8>,
}

pub fn printable_score(v: &[u8]) -> usize {
    v.iter()
        .filter(|&&u| u == b' ' || u.is_ascii_alphabetic())
        .count()
}

/// Tries all 256 keys. Among keys with equal score the smallest one wins.
pub fn break_single_byte_xor(input: &[u8]) -> SingleByteGuess {
    let mut best = SingleByteGuess {
        score: printable_score(input),
        key: 0,
        plaintext: input.to_vec(),
    };
    for key in 1u8..=255 {
        let plaintext = input.xor(&[key]);
        let score = printable_score(&plaintext);
        if score > best.score {
            best = SingleByteGuess {
                score,
                key,
                plaintext,
            };
        }
    }
    best
}

pub fn hamming_distance(u: &[u8], v: &[u8]) -> u32 {
    u.iter().zip(v.iter()).map(|(a, b)| (a ^ b).count_ones()).sum()
}

// Average distance between consecutive chunks, normalized by the chunk size. Returns
// `None` if the input does not contain two full chunks.
fn normalized_distance(input: &[u8], keysize: usize) -> Option<f64> {
    let chunks: Vec<&[u8]> = input
        .chunks(keysize)
        .filter(|chunk| chunk.len() == keysize)
        .collect();
    if chunks.len() < 2 {
        return None;
    }
    let total: u32 = chunks
        .windows(2)
        .map(|pair| hamming_distance(pair[0], pair[1]))
        .sum();
    Some(f64::from(total) / (chunks.len() - 1) as f64 / keysize as f64)
}

/// Ranks candidate key sizes, most likely first.
pub fn estimate_key_size(input: &[u8], sizes: RangeInclusive<usize>) -> Vec<usize> {
    let mut distances: Vec<(usize, f64)> = sizes
        .filter(|&keysize| keysize > 0)
        .filter_map(|keysize| normalized_distance(input, keysize).map(|d| (keysize, d)))
        .collect();

    // Stable sort keeps smaller sizes first on equal distances.
    distances.sort_by(|(_, s), (_, t)| s.partial_cmp(t).unwrap_or(std::cmp::Ordering::Equal));
    distances.into_iter().map(|(keysize, _)| keysize).collect()
}

/// Splits `input` into `size` columns; column `i` holds every byte at a position congruent
/// to `i` modulo `size`.
pub fn transpose(input: &[u8], size: usize) -> Vec<Vec<u8>> {
    let mut columns: Vec<Vec<u8>> = (0..size).map(|_| Vec::new()).collect();
    for block in input.chunks(size) {
        for (&u, column) in block.iter().zip(columns.iter_mut()) {
            column.push(u);
        }
    }
    columns
}

/// Returns the recovered key together with the plaintext.
pub fn break_repeating_xor(input: &[u8], keysize: usize) -> (Vec<u8>, Vec<u8>) {
    let key: Vec<u8> = transpose(input, keysize)
        .iter()
        .map(|column| break_single_byte_xor(column).key)
        .collect();
    debug!(keysize, "recovered repeating key");
    let plaintext = input.xor(&key);
    (key, plaintext)
}

/// Breaks repeating-key XOR without knowing the key size: the three best ranked sizes are
/// tried and the most printable result is kept.
pub fn break_repeating_xor_unknown_size(
    input: &[u8],
    sizes: RangeInclusive<usize>,
) -> Option<(Vec<u8>, Vec<u8>)> {
    estimate_key_size(input, sizes)
        .into_iter()
        .take(3)
        .map(|keysize| break_repeating_xor(input, keysize))
        .fold(None, |best: Option<(Vec<u8>, Vec<u8>)>, candidate| match best {
            Some(best) if printable_score(&best.1) >= printable_score(&candidate.1) => Some(best),
            _ => Some(candidate),
        })
}

/// Decrypts ciphertexts that were all XORed with the same keystream. Every ciphertext is
/// truncated to the shortest one, so only that common prefix is recovered.
pub fn break_many_time_pad(ciphertexts: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let size = match ciphertexts.iter().map(|c| c.len()).min() {
        Some(size) if size > 0 => size,
        _ => return ciphertexts.iter().map(|_| Vec::new()).collect(),
    };
    let concatenated: Vec<u8> = ciphertexts
        .iter()
        .flat_map(|c| c[..size].iter().cloned())
        .collect();
    let (_, plaintext) = break_repeating_xor(&concatenated, size);
    plaintext.chunks(size).map(|chunk| chunk.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "It was the best of times, it was the worst of times, it was the age of \
        wisdom, it was the age of foolishness, it was the epoch of belief, it was the epoch of \
        incredulity, it was the season of Light, it was the season of Darkness, it was the spring \
        of hope, it was the winter of despair, we had everything before us, we had nothing before \
        us, we were all going direct to Heaven, we were all going direct the other way. In short, \
        the period was so far like the present period, that some of its noisiest authorities \
        insisted on its being received, for good or for evil, in the superlative degree of \
        comparison only. There were a king with a large jaw and a queen with a plain face, on the \
        throne of England; there were a king with a large jaw and a queen with a fair face, on the \
        throne of France. In both countries it was clearer than crystal to the lords of the State \
        preserves of loaves and fishes, that things in general were settled for ever.";

    #[test]
    fn single_byte_xor() {
        let input = [
            0x1b, 0x37, 0x37, 0x33, 0x31, 0x36, 0x3f, 0x78, 0x15, 0x1b, 0x7f, 0x2b, 0x78, 0x34,
            0x31, 0x33, 0x3d, 0x78, 0x39, 0x78, 0x28, 0x37, 0x2d, 0x36, 0x3c, 0x78, 0x37, 0x3e,
            0x78, 0x3a, 0x39, 0x3b, 0x37, 0x36,
        ];
        let guess = break_single_byte_xor(&input);
        assert_eq!(b'X', guess.key);
        assert_eq!(&b"Cooking MC's like a pound of bacon"[..], &guess.plaintext[..]);
    }

    #[test]
    fn ties_go_to_the_smallest_key() {
        // A zero byte becomes a space or a letter under 53 keys, all scoring 1.
        let guess = break_single_byte_xor(&[0]);
        assert_eq!(b' ', guess.key);
        assert_eq!(1, guess.score);
        assert_eq!(b" ".to_vec(), guess.plaintext);

        let guess = break_single_byte_xor(&[]);
        assert_eq!(0, guess.key);
        assert_eq!(0, guess.score);
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(37, hamming_distance(b"this is a test", b"wokka wokka!!!"));
    }

    #[test]
    fn transpose_columns() {
        let columns = transpose(b"abcdefg", 3);
        assert_eq!(vec![b"adg".to_vec(), b"be".to_vec(), b"cf".to_vec()], columns);
    }

    #[test]
    fn key_size_estimate_finds_a_multiple_of_the_key_length() {
        let ciphertext = TEXT.as_bytes().xor(b"Vanilla");
        let best = estimate_key_size(&ciphertext, 2..=40)[0];
        assert_eq!(0, best % 7);
    }

    #[test]
    fn repeating_xor_with_known_size() {
        let ciphertext = TEXT.as_bytes().xor(b"Vanilla");
        let (key, plaintext) = break_repeating_xor(&ciphertext, 7);
        assert_eq!(b"Vanilla".to_vec(), key);
        assert_eq!(TEXT.as_bytes(), &plaintext[..]);
    }

    #[test]
    fn repeating_xor_with_unknown_size() {
        let ciphertext = TEXT.as_bytes().xor(b"Vanilla");
        let (_, plaintext) = break_repeating_xor_unknown_size(&ciphertext, 2..=40).unwrap();
        assert_eq!(TEXT.as_bytes(), &plaintext[..]);
    }

    #[test]
    fn many_time_pad_keeps_common_prefix() {
        let keystream: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect();
        let texts: Vec<&[u8]> = TEXT.as_bytes().chunks(40).take(20).collect();
        let ciphertexts: Vec<Vec<u8>> = texts.iter().map(|t| t.xor(&keystream)).collect();
        let plaintexts = break_many_time_pad(&ciphertexts);
        assert_eq!(20, plaintexts.len());
        let correct = plaintexts
            .iter()
            .zip(texts.iter())
            .flat_map(|(p, t)| p.iter().zip(t.iter()))
            .filter(|(a, b)| a == b)
            .count();
        // Twenty samples per column are not always enough to pin every key byte.
        assert!(correct * 10 >= 20 * 40 * 9);
    }
}
