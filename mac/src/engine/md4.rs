use byteorder::{ByteOrder, LittleEndian};

use super::Compression;

#[derive(Clone, Copy, Debug)]
pub struct Md4Core;

const ROUND_2: u32 = 0x5a82_7999;
const ROUND_3: u32 = 0x6ed9_eba1;

const ORDER_1: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
const ORDER_2: [usize; 16] = [0, 4, 8, 12, 1, 5, 9, 13, 2, 6, 10, 14, 3, 7, 11, 15];
const ORDER_3: [usize; 16] = [0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15];

fn f(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (!x & z)
}

fn g(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (x & z) | (y & z)
}

fn h(x: u32, y: u32, z: u32) -> u32 {
    x ^ y ^ z
}

// One round of 16 operations. Operation `j` updates register a, d, c, b (cycling) from the
// three registers that follow it.
fn round(
    v: &mut [u32; 4],
    x: &[u32; 16],
    func: fn(u32, u32, u32) -> u32,
    order: &[usize; 16],
    shifts: [u32; 4],
    constant: u32,
) {
    for (j, &k) in order.iter().enumerate() {
        let t = (4 - j % 4) % 4;
        v[t] = v[t]
            .wrapping_add(func(v[(t + 1) % 4], v[(t + 2) % 4], v[(t + 3) % 4]))
            .wrapping_add(x[k])
            .wrapping_add(constant)
            .rotate_left(shifts[j % 4]);
    }
}

impl Compression for Md4Core {
    type Order = LittleEndian;

    const INITIAL_STATE: &'static [u32] = &[0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476];

    fn compress(state: &mut [u32], block: &[u8]) {
        let mut x = [0u32; 16];
        for (word, chunk) in x.iter_mut().zip(block.chunks(4)) {
            *word = LittleEndian::read_u32(chunk);
        }

        let mut v = [state[0], state[1], state[2], state[3]];
        round(&mut v, &x, f, &ORDER_1, [3, 7, 11, 19], 0);
        round(&mut v, &x, g, &ORDER_2, [3, 5, 9, 13], ROUND_2);
        round(&mut v, &x, h, &ORDER_3, [3, 9, 11, 15], ROUND_3);

        for (s, r) in state.iter_mut().zip(v.iter()) {
            *s = s.wrapping_add(*r);
        }
    }
}
