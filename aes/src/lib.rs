#[macro_use]
extern crate failure;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use failure::Error;
use openssl::symm::{decrypt, encrypt, Cipher};
use rand::Rng;
use xor::XOR;

pub const BLOCK_SIZE: usize = 16;
pub const NONCE_SIZE: usize = 8;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MODE {
    ECB,
    CBC,
    CTR,
}

/// Byte order of the 64 bit block counter in CTR mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CounterLayout {
    BigEndian,
    LittleEndian,
}

impl Default for CounterLayout {
    fn default() -> Self {
        CounterLayout::BigEndian
    }
}

#[derive(Debug, Fail)]
pub enum AesError {
    #[fail(display = "invalid padding")]
    InvalidPadding,

    #[fail(display = "input length {} not a multiple of {}", length, block_size)]
    InvalidLength { length: usize, block_size: usize },

    #[fail(display = "failed to encrypt block {:?}", block)]
    EncryptionFailed { block: Vec<u8> },

    #[fail(display = "failed to decrypt block {:?}", block)]
    DecryptionFailed { block: Vec<u8> },
}

pub fn pad_inplace(u: &mut Vec<u8>, k: u8) -> Result<(), Error> {
    ensure!(k >= 2, "invalid parameter");

    let p = k - (u.len() % k as usize) as u8;
    for _ in 0..p {
        u.push(p);
    }
    Ok(())
}

pub fn unpad_inplace(u: &mut Vec<u8>, k: u8) -> Result<(), Error> {
    if !padding_valid(u, k)? {
        return Err(AesError::InvalidPadding.into());
    }

    let len_new = u.len() - u[u.len() - 1] as usize;
    u.truncate(len_new);
    Ok(())
}

/// Appends PKCS#7 padding for block size `k`. Aligned input receives a full block of padding.
pub fn pad(u: &[u8], k: u8) -> Result<Vec<u8>, Error> {
    let mut v = u.to_vec();
    pad_inplace(&mut v, k)?;
    Ok(v)
}

pub fn unpad(u: &[u8], k: u8) -> Result<Vec<u8>, Error> {
    let mut v = u.to_vec();
    unpad_inplace(&mut v, k)?;
    Ok(v)
}

pub fn padding_valid(u: &[u8], k: u8) -> Result<bool, Error> {
    ensure!(k >= 2, "invalid parameter");

    if u.is_empty() || u.len() % k as usize != 0 {
        return Ok(false);
    }
    let padding = u[u.len() - 1];
    if !(1 <= padding && padding <= k) {
        return Ok(false);
    }
    Ok(u[u.len() - padding as usize..]
        .iter()
        .all(|&b| b == padding))
}

pub trait Aes128 {
    fn pad(&self) -> Vec<u8>;
    fn padding_valid(&self) -> bool;
    fn unpad(&self) -> Result<Vec<u8>, Error>;
    fn encrypt_block(&self, key: &Self) -> Result<Vec<u8>, Error>;
    fn decrypt_block(&self, key: &Self) -> Result<Vec<u8>, Error>;
    fn encrypt(&self, key: &Self, iv: Option<&Self>, mode: MODE) -> Result<Vec<u8>, Error>;
    fn decrypt(&self, key: &Self, iv: Option<&Self>, mode: MODE) -> Result<Vec<u8>, Error>;
}

impl Aes128 for [u8] {
    fn pad(&self) -> Vec<u8> {
        let p = BLOCK_SIZE - self.len() % BLOCK_SIZE;
        let mut v = self.to_vec();
        v.resize(self.len() + p, p as u8);
        v
    }

    fn padding_valid(&self) -> bool {
        padding_valid(self, BLOCK_SIZE as u8).unwrap_or(false)
    }

    fn unpad(&self) -> Result<Vec<u8>, Error> {
        unpad(self, BLOCK_SIZE as u8)
    }

    fn encrypt_block(&self, key: &[u8]) -> Result<Vec<u8>, Error> {
        ensure!(
            self.len() == BLOCK_SIZE,
            format!("input does not consist of {} bytes", BLOCK_SIZE)
        );

        let mut ciphertext = encrypt(Cipher::aes_128_ecb(), key, None, self)
            .map_err(|_| AesError::EncryptionFailed {
                block: self.to_vec(),
            })?;

        ciphertext.truncate(BLOCK_SIZE);
        Ok(ciphertext)
    }

    fn decrypt_block(&self, key: &[u8]) -> Result<Vec<u8>, Error> {
        ensure!(
            self.len() == BLOCK_SIZE,
            format!("input does not consist of {} bytes", BLOCK_SIZE)
        );

        // OpenSSL insists on valid padding, so we hand it an encrypted padding block as well.
        let dummy_padding = [BLOCK_SIZE as u8; BLOCK_SIZE].encrypt_block(key)?;
        let mut u = self.to_vec();
        u.extend_from_slice(&dummy_padding);
        decrypt(Cipher::aes_128_ecb(), key, None, &u).map_err(|_| {
            AesError::DecryptionFailed {
                block: self.to_vec(),
            }
            .into()
        })
    }

    fn encrypt(&self, key: &[u8], iv: Option<&[u8]>, mode: MODE) -> Result<Vec<u8>, Error> {
        match (mode, iv) {
            (MODE::ECB, None) => encrypt_ecb(self, key, true),
            (MODE::ECB, Some(_)) => bail!("iv not supported for ECB mode"),
            (MODE::CBC, Some(iv)) => encrypt_cbc(self, key, iv, true),
            (MODE::CBC, None) => bail!("iv required for CBC mode"),
            (MODE::CTR, nonce) => encrypt_ctr(
                self,
                key,
                nonce.unwrap_or(&[0; NONCE_SIZE]),
                CounterLayout::default(),
            ),
        }
    }

    fn decrypt(&self, key: &[u8], iv: Option<&[u8]>, mode: MODE) -> Result<Vec<u8>, Error> {
        match (mode, iv) {
            (MODE::ECB, None) => decrypt_ecb(self, key, true),
            (MODE::ECB, Some(_)) => bail!("iv not supported for ECB mode"),
            (MODE::CBC, Some(iv)) => decrypt_cbc(self, key, iv, true),
            (MODE::CBC, None) => bail!("iv required for CBC mode"),
            (MODE::CTR, nonce) => decrypt_ctr(
                self,
                key,
                nonce.unwrap_or(&[0; NONCE_SIZE]),
                CounterLayout::default(),
            ),
        }
    }
}

fn ensure_aligned(u: &[u8]) -> Result<(), Error> {
    if u.len() % BLOCK_SIZE != 0 {
        return Err(AesError::InvalidLength {
            length: u.len(),
            block_size: BLOCK_SIZE,
        }
        .into());
    }
    Ok(())
}

pub fn encrypt_ecb(input: &[u8], key: &[u8], padding: bool) -> Result<Vec<u8>, Error> {
    let u = if padding { input.pad() } else { input.to_vec() };
    ensure_aligned(&u)?;
    let mut ciphertext = Vec::with_capacity(u.len());
    for block in u.chunks(BLOCK_SIZE) {
        ciphertext.extend_from_slice(&block.encrypt_block(key)?);
    }
    Ok(ciphertext)
}

pub fn decrypt_ecb(input: &[u8], key: &[u8], padding: bool) -> Result<Vec<u8>, Error> {
    ensure_aligned(input)?;
    let mut cleartext = Vec::with_capacity(input.len());
    for block in input.chunks(BLOCK_SIZE) {
        cleartext.extend_from_slice(&block.decrypt_block(key)?);
    }
    if padding {
        unpad_inplace(&mut cleartext, BLOCK_SIZE as u8)?;
    }
    Ok(cleartext)
}

pub fn encrypt_cbc(input: &[u8], key: &[u8], iv: &[u8], padding: bool) -> Result<Vec<u8>, Error> {
    ensure!(iv.len() == BLOCK_SIZE, "iv must consist of {} bytes", BLOCK_SIZE);
    let u = if padding { input.pad() } else { input.to_vec() };
    ensure_aligned(&u)?;
    let mut ciphertext = Vec::with_capacity(u.len());
    let mut cur = iv.to_vec();
    for block in u.chunks(BLOCK_SIZE) {
        cur = block.xor(&cur).encrypt_block(key)?;
        ciphertext.extend_from_slice(&cur);
    }
    Ok(ciphertext)
}

/// Without `padding` the decrypted blocks are returned as they are, trailing bytes included.
pub fn decrypt_cbc(input: &[u8], key: &[u8], iv: &[u8], padding: bool) -> Result<Vec<u8>, Error> {
    ensure!(iv.len() == BLOCK_SIZE, "iv must consist of {} bytes", BLOCK_SIZE);
    ensure_aligned(input)?;

    let mut cleartext = Vec::with_capacity(input.len());
    let mut prev = iv;
    for block in input.chunks(BLOCK_SIZE) {
        let cur = block.decrypt_block(key)?.xor(prev);
        cleartext.extend_from_slice(&cur);
        prev = block;
    }
    if padding {
        unpad_inplace(&mut cleartext, BLOCK_SIZE as u8)?;
    }
    Ok(cleartext)
}

fn counter_block(nonce: &[u8], counter: u64, layout: CounterLayout) -> [u8; BLOCK_SIZE] {
    let mut block = [0; BLOCK_SIZE];
    block[..NONCE_SIZE].copy_from_slice(nonce);
    match layout {
        CounterLayout::BigEndian => BigEndian::write_u64(&mut block[NONCE_SIZE..], counter),
        CounterLayout::LittleEndian => LittleEndian::write_u64(&mut block[NONCE_SIZE..], counter),
    }
    block
}

/// The `len` keystream bytes starting at byte `offset` of the stream.
pub fn ctr_keystream(
    key: &[u8],
    nonce: &[u8],
    layout: CounterLayout,
    offset: usize,
    len: usize,
) -> Result<Vec<u8>, Error> {
    ensure!(
        nonce.len() == NONCE_SIZE,
        "nonce must consist of {} bytes",
        NONCE_SIZE
    );
    let first = offset / BLOCK_SIZE;
    let last = (offset + len + BLOCK_SIZE - 1) / BLOCK_SIZE;
    let mut keystream = Vec::with_capacity((last - first) * BLOCK_SIZE);
    for counter in first..last {
        let block = counter_block(nonce, counter as u64, layout);
        keystream.extend_from_slice(&block.encrypt_block(key)?);
    }
    let skip = offset - first * BLOCK_SIZE;
    Ok(keystream[skip..skip + len].to_vec())
}

pub fn encrypt_ctr(
    input: &[u8],
    key: &[u8],
    nonce: &[u8],
    layout: CounterLayout,
) -> Result<Vec<u8>, Error> {
    let keystream = ctr_keystream(key, nonce, layout, 0, input.len())?;
    Ok(input.xor(&keystream))
}

pub fn decrypt_ctr(
    input: &[u8],
    key: &[u8],
    nonce: &[u8],
    layout: CounterLayout,
) -> Result<Vec<u8>, Error> {
    encrypt_ctr(input, key, nonce, layout)
}

pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen()).collect()
}

pub fn random_block() -> Vec<u8> {
    random_bytes(BLOCK_SIZE)
}

pub fn chunks_count(len: usize) -> usize {
    (len + BLOCK_SIZE - 1) / BLOCK_SIZE
}

/// True if two blocks of the ciphertext coincide.
pub fn looks_like_ecb(ciphertext: &[u8]) -> bool {
    let blocks: Vec<&[u8]> = ciphertext.chunks(BLOCK_SIZE).collect();
    blocks
        .iter()
        .enumerate()
        .any(|(i, block)| blocks[i + 1..].contains(block))
}

/// XORs `known ^ desired` into the trailing bytes of block `block_index`.
///
/// In CTR mode this turns the plaintext `known` at that position into `desired`. In CBC mode
/// the change shows up in the following block, while the flipped block decrypts to garbage.
pub fn bitflip(
    ciphertext: &[u8],
    block_index: usize,
    known: &[u8],
    desired: &[u8],
) -> Result<Vec<u8>, Error> {
    ensure!(
        known.len() == desired.len() && desired.len() <= BLOCK_SIZE,
        "known and desired bytes must have equal length of at most {}",
        BLOCK_SIZE
    );
    ensure!(
        block_index < ciphertext.len() / BLOCK_SIZE,
        "block {} out of range",
        block_index
    );
    let end = (block_index + 1) * BLOCK_SIZE;

    let mut result = ciphertext.to_vec();
    result[end - desired.len()..end].xor_inplace(&known.xor(desired));
    Ok(result)
}

pub fn bitflip_with_byte(
    ciphertext: &[u8],
    block_index: usize,
    known: u8,
    desired: &[u8],
) -> Result<Vec<u8>, Error> {
    bitflip(ciphertext, block_index, &vec![known; desired.len()], desired)
}
