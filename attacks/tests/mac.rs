use std::time::Duration;

use attacks::{forge_extension, timing_leak_mac, Outcome};
use mac::{Md4Core, Sha1Core};
use oracle::{HmacTimingOracle, MacOracle};

fn init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn sha1_length_extension() {
    init();
    let oracle = MacOracle::<Sha1Core>::new();
    let (message, mac) = oracle.authenticate(b"foo").unwrap();
    assert!(!oracle.is_admin(&message, &mac).unwrap());

    let (forged, forged_mac) = forge_extension(&oracle).unwrap();
    assert!(forged.starts_with(&message));
    assert!(oracle.is_admin(&forged, &forged_mac).unwrap());
}

#[test]
fn md4_length_extension() {
    init();
    let oracle = MacOracle::<Md4Core>::new();
    let (forged, forged_mac) = forge_extension(&oracle).unwrap();
    assert!(forged.ends_with(b";admin=true"));
    assert!(oracle.is_admin(&forged, &forged_mac).unwrap());

    let mut tampered = forged_mac.clone();
    tampered[0] ^= 1;
    assert!(oracle.is_admin(&forged, &tampered).is_err());
}

#[test]
fn hmac_timing_leak() {
    init();
    let oracle = HmacTimingOracle::new(Duration::from_millis(3), 2);
    let file = b"foo.txt";
    assert!(!oracle.check(file, &[0; 20]));
    let signature = Outcome::retry(3, || timing_leak_mac(&oracle, file, 3)).unwrap();
    assert!(oracle.check(file, &signature));
}
