use byteorder::{BigEndian, ByteOrder};

use super::Compression;

#[derive(Clone, Copy, Debug)]
pub struct Sha1Core;

impl Compression for Sha1Core {
    type Order = BigEndian;

    const INITIAL_STATE: &'static [u32] =
        &[0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476, 0xc3d2_e1f0];

    fn compress(state: &mut [u32], block: &[u8]) {
        let mut w = [0u32; 80];
        for (word, chunk) in w.iter_mut().zip(block.chunks(4)) {
            *word = BigEndian::read_u32(chunk);
        }
        for i in 16..80 {
            w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
        }

        let (mut a, mut b, mut c) = (state[0], state[1], state[2]);
        let (mut d, mut e) = (state[3], state[4]);
        for (i, &wi) in w.iter().enumerate() {
            let (f, k) = match i {
                0..=19 => ((b & c) | (!b & d), 0x5a82_7999),
                20..=39 => (b ^ c ^ d, 0x6ed9_eba1),
                40..=59 => ((b & c) | (b & d) | (c & d), 0x8f1b_bcdc),
                _ => (b ^ c ^ d, 0xca62_c1d6),
            };
            let temp = a
                .rotate_left(5)
                .wrapping_add(f)
                .wrapping_add(e)
                .wrapping_add(k)
                .wrapping_add(wi);
            e = d;
            d = c;
            c = b.rotate_left(30);
            b = a;
            a = temp;
        }

        for (s, v) in state.iter_mut().zip(&[a, b, c, d, e]) {
            *s = s.wrapping_add(*v);
        }
    }
}
