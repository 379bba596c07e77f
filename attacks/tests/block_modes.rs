use aes::MODE;
use attacks::{
    break_ctr_edit, break_fixed_nonce_ctr, cbc_bitflip, ctr_bitflip, decrypt_ecb_prefix_suffix,
    decrypt_ecb_suffix, detect_mode, forge_admin_profile, padding_oracle_decrypt,
    recover_key_from_iv_equals_key, suffix_length, Outcome,
};
use oracle::{
    CommentOracle, CtrEditOracle, EcbOrCbc, EcbPrefixSuffix, EcbSuffix, FixedNonceCtr,
    KeyAsIvOracle, Oracle, PaddingOracle, ProfileOracle,
};

const EASTER_1916: &[&str] = &[
    "I have met them at close of day",
    "Coming with vivid faces",
    "From counter or desk among grey",
    "Eighteenth-century houses.",
    "I have passed with a nod of the head",
    "Or polite meaningless words,",
    "Or have lingered awhile and said",
    "Polite meaningless words,",
    "And thought before I had done",
    "Of a mocking tale or a gibe",
    "To please a companion",
    "Around the fire at the club,",
    "Being certain that they and I",
    "But lived where motley is worn:",
    "All changed, changed utterly:",
    "A terrible beauty is born.",
    "That woman's days were spent",
    "In ignorant good will,",
    "Her nights in argument",
    "Until her voice grew shrill.",
    "What voice more sweet than hers",
    "When young and beautiful,",
    "She rode to harriers?",
    "This man had kept a school",
    "And rode our winged horse.",
    "This other his helper and friend",
    "Was coming into his force;",
    "He might have won fame in the end,",
    "So sensitive his nature seemed,",
    "So daring and sweet his thought.",
    "This other man I had dreamed",
    "A drunken, vain-glorious lout.",
    "He had done most bitter wrong",
    "To some who are near my heart,",
    "Yet I number him in the song;",
    "He, too, has resigned his part",
    "In the casual comedy;",
    "He, too, has been changed in his turn,",
    "Transformed utterly:",
    "A terrible beauty is born.",
];

fn init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn detects_the_mode_of_each_oracle() {
    init();
    for _ in 0..10 {
        let mut oracle = EcbOrCbc::new();
        let mode = detect_mode(&mut oracle).unwrap();
        assert!(oracle.verify_solution(mode == MODE::ECB).is_ok());
    }
}

#[test]
fn byte_at_a_time_ecb() {
    init();
    let oracle = EcbSuffix::new().unwrap();
    let suffix = decrypt_ecb_suffix(&oracle).unwrap();
    assert!(oracle.verify_suffix(&suffix).is_ok());
    assert!(suffix.starts_with(b"Rollin' in my 5.0"));
}

#[test]
fn byte_at_a_time_ecb_behind_random_prefix() {
    init();
    let oracle = EcbPrefixSuffix::new().unwrap();
    let suffix = decrypt_ecb_prefix_suffix(&oracle).unwrap();
    assert!(oracle.verify_suffix(&suffix).is_ok());
    assert_eq!(suffix.len(), suffix_length(&oracle).unwrap());
}

#[test]
fn cut_and_paste_profile() {
    init();
    let oracle = ProfileOracle::new();
    let ciphertext = forge_admin_profile(&oracle).unwrap();
    assert!(oracle.is_admin(&ciphertext).unwrap());
    assert_eq!(Some(b"admin".to_vec()), oracle.role(&ciphertext).unwrap());
}

#[test]
fn bitflipping_cbc_and_ctr() {
    init();
    let cbc = CommentOracle::new(MODE::CBC).unwrap();
    assert!(cbc.is_admin(&cbc_bitflip(&cbc).unwrap()).unwrap());

    let ctr = CommentOracle::new(MODE::CTR).unwrap();
    assert!(ctr.is_admin(&ctr_bitflip(&ctr).unwrap()).unwrap());
}

#[test]
fn key_reused_as_iv() {
    init();
    let oracle = KeyAsIvOracle::new();
    let key = Outcome::retry(5, || recover_key_from_iv_equals_key(&oracle)).unwrap();
    assert!(oracle.verify_solution(&key).is_ok());
}

#[test]
fn cbc_padding_oracle_decrypts_every_token() {
    init();
    let oracle = PaddingOracle::new().unwrap();
    for _ in 0..5 {
        let (iv, ciphertext) = oracle.encrypt().unwrap();
        let cleartext =
            Outcome::retry(1, || padding_oracle_decrypt(&oracle, &iv, &ciphertext)).unwrap();
        assert!(oracle.verify_solution(&cleartext, &iv, &ciphertext).is_ok());
        assert!(cleartext.starts_with(b"00000"));
    }
}

#[test]
fn fixed_nonce_ctr_is_a_many_time_pad() {
    init();
    let oracle = FixedNonceCtr::new();
    let ciphertexts = EASTER_1916
        .iter()
        .map(|line| oracle.encrypt(line.as_bytes()))
        .collect::<Result<Vec<Vec<u8>>, _>>()
        .unwrap();
    let plaintexts = break_fixed_nonce_ctr(&ciphertexts);

    let size = EASTER_1916.iter().map(|line| line.len()).min().unwrap();
    assert_eq!(EASTER_1916.len(), plaintexts.len());
    let mut correct = 0;
    for (plaintext, line) in plaintexts.iter().zip(EASTER_1916) {
        assert_eq!(size, plaintext.len());
        correct += plaintext
            .iter()
            .zip(line.as_bytes())
            .filter(|(u, v)| u.eq_ignore_ascii_case(v))
            .count();
    }
    assert!(correct * 10 >= EASTER_1916.len() * size * 9);
}

#[test]
fn random_access_ctr_edit() {
    init();
    let secret = EASTER_1916.join("\n").into_bytes();
    let oracle = CtrEditOracle::new(secret).unwrap();
    let recovered = break_ctr_edit(&oracle).unwrap();
    assert!(oracle.verify_solution(&recovered).is_ok());
}
