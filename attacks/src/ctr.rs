use failure::Error;
use oracle::{CommentOracle, CtrEditOracle, Oracle};
use tracing::debug;
use xor::{break_many_time_pad, XOR};

use crate::ecb::prefix_length;

/// Produces a CTR comment cookie that decodes with `admin=true`.
///
/// Knowing the plaintext at some position is enough to write anything there: we feed zeros
/// and XOR the wanted text into the ciphertext at the same offset. The suffix is cut off.
pub fn ctr_bitflip(oracle: &CommentOracle) -> Result<Vec<u8>, Error> {
    let target = b";admin=true";
    let prefix_len = prefix_length(oracle)?;
    let mut ciphertext = oracle.encrypt(&vec![0; target.len()])?;
    ciphertext.truncate(prefix_len + target.len());
    ciphertext[prefix_len..].xor_inplace(target);
    Ok(ciphertext)
}

/// Decrypts ciphertexts that share one CTR keystream, up to the length of the shortest.
///
/// Columns are broken statistically, so the first column of sentence-like texts, which is
/// dominated by capitals, may come out wrong.
pub fn break_fixed_nonce_ctr(ciphertexts: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let plaintexts = break_many_time_pad(ciphertexts);
    debug!(
        count = plaintexts.len(),
        len = plaintexts.first().map_or(0, |p| p.len()),
        "broke shared keystream"
    );
    plaintexts
}

/// Rewriting the whole text with zeros makes the edit function return the bare keystream.
pub fn break_ctr_edit(oracle: &CtrEditOracle) -> Result<Vec<u8>, Error> {
    let ciphertext = oracle.ciphertext();
    let keystream = oracle.edit(0, &vec![0; ciphertext.len()])?;
    Ok(ciphertext.xor(&keystream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::MODE;

    #[test]
    fn forged_cookie_is_admin() {
        let oracle = CommentOracle::new(MODE::CTR).unwrap();
        let ciphertext = ctr_bitflip(&oracle).unwrap();
        assert!(oracle.is_admin(&ciphertext).unwrap());
    }

    #[test]
    fn edit_leaks_the_text() {
        let secret = b"Now that the party is jumping".to_vec();
        let oracle = CtrEditOracle::new(secret.clone()).unwrap();
        let recovered = break_ctr_edit(&oracle).unwrap();
        assert_eq!(secret, recovered);
        assert!(oracle.verify_solution(&recovered).is_ok());
    }
}
