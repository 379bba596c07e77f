use attacks::{
    bleichenbacher, dsa_nonce_brute_force, forge_e3_signature, parity_decrypt,
    recover_key_from_repeated_nonce, rsa_broadcast, unpadded_message_recovery,
};
use bignum::{BigNumTrait, OpensslBigNum as BigNum};
use dsa::{message_hash, DsaParams, DsaPrivate, DsaPublic, Signature};
use oracle::{RsaDecryptOnce, RsaPaddingOracle, RsaParityOracle, SloppyRsaVerifier};
use rsa::{pkcs1_unpad, BlockType, Rsa};
use serialize::from_base64;

const FUNKY: &str = "VGhhdCdzIHdoeSBJIGZvdW5kIHlvdSBkb24ndCBwbGF5IGFyb3VuZCB3aXRoIHRoZSBGdW5r\
                     eSBDb2xkIE1lZGluYQ==";

const DSA_MESSAGE: &[u8] = b"For those that envy a MC it can be hazardous to your health\n\
    So be friendly, a matter of life and death, just like a etch-a-sketch\n";

const DSA_Y: &str = "84ad4719d044495496a3201c8ff484feb45b962e7302e56a392aee4abab3e4bdebf2955b\
                     4736012f21a08084056b19bcd7fee56048e004e44984e2f411788efdc837a0d2e5abb7b5\
                     55039fd243ac01f0fb2ed1dec568280ce678e931868d23eb095fde9d3779191b8c0299d6\
                     e07bbb283e6633451e535c45513b2d33c99ea17";

fn init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn hex(s: &str) -> BigNum {
    <BigNum as BigNumTrait>::from_hex_str(s).unwrap()
}

fn dec(s: &str) -> BigNum {
    <BigNum as BigNumTrait>::from_dec_str(s).unwrap()
}

#[test]
fn e3_broadcast() {
    init();
    let m = <BigNum as BigNumTrait>::from_bytes_be(b"Attack at dawn, bring snacks");
    let keys: Vec<Rsa<BigNum>> = (0..3).map(|_| Rsa::generate(1024)).collect();
    let ciphertexts: Vec<BigNum> = keys.iter().map(|rsa| rsa.encrypt(&m)).collect();
    let moduli: Vec<BigNum> = keys
        .iter()
        .map(|rsa| BigNumTrait::clone(rsa.n()))
        .collect();
    assert_eq!(m, rsa_broadcast(&ciphertexts, &moduli).unwrap());
}

#[test]
fn unpadded_message_oracle() {
    init();
    let mut oracle = RsaDecryptOnce::new(1024);
    let m = <BigNum as BigNumTrait>::from_bytes_be(b"{time: 1356304276, social: '555-55-5555'}");
    let c = oracle.public_key().encrypt(&m);
    assert_eq!(m, oracle.decrypt(&c).unwrap());
    assert!(oracle.decrypt(&c).is_err());
    assert_eq!(m, unpadded_message_recovery(&mut oracle, &c).unwrap());
}

#[test]
fn e3_signature_forgery() {
    init();
    let verifier = SloppyRsaVerifier::new(1024);
    let honest = verifier.sign(b"hi dad").unwrap();
    assert!(verifier.verify(b"hi dad", &honest));
    assert!(!verifier.verify(b"hi mom", &honest));

    let forged = forge_e3_signature(&verifier.public_key(), b"hi mom").unwrap();
    assert!(verifier.verify(b"hi mom", &forged));
}

#[test]
fn parity_oracle() {
    init();
    let oracle = RsaParityOracle::new(1024);
    let message = from_base64(FUNKY).unwrap();
    let c = oracle
        .public_key()
        .encrypt(&<BigNum as BigNumTrait>::from_bytes_be(&message));
    let m = parity_decrypt(&oracle, &c).unwrap();
    assert_eq!(message, BigNumTrait::to_bytes_be(&m));
    assert!(oracle.verify_solution(&c, &m).is_ok());
}

#[test]
fn pkcs1_padding_oracle() {
    init();
    let oracle = RsaPaddingOracle::new(256);
    let c = oracle.encrypt(b"kick it, CC").unwrap();
    let block = bleichenbacher(&oracle, &c).unwrap();
    assert_eq!(&[0, 2][..], &block[..2]);
    let message = pkcs1_unpad(&block, BlockType::Encryption).unwrap();
    assert!(oracle.verify_solution(&c, &message).is_ok());
}

#[test]
fn dsa_key_from_nonce_in_small_range() {
    init();
    let h: BigNum = message_hash(DSA_MESSAGE);
    assert_eq!(hex("d2d0714f014a9784047eaeccf956520045c45265"), h);

    let public = DsaPublic::new(DsaParams::standard().unwrap(), hex(DSA_Y));
    let signature = Signature {
        r: dec("548099063082341131477253921760299949438196259240"),
        s: dec("857042759984254168557880549501802188789837994940"),
    };
    assert!(public.verify(DSA_MESSAGE, &signature));

    let x = dsa_nonce_brute_force(&public, &h, &signature, 0..=1 << 16).unwrap();
    assert_eq!(hex("15fb2873d16b3e129ff76d0918fd7ada54659e49"), x);
}

#[test]
fn dsa_key_from_reused_nonce() {
    init();
    let private = DsaPrivate::<BigNum>::generate(DsaParams::standard().unwrap());
    let public = private.public_key();
    let k = dec("987654321");

    let messages = [
        &b"Listen for me, you better listen for me now."[..],
        &b"Pure black people mon is all I mon know."[..],
    ];
    let mut signed = Vec::new();
    for message in messages.iter() {
        signed.push((message_hash(message), private.sign(message).unwrap()));
        signed.push((message_hash(message), private.sign_with_nonce(message, &k).unwrap()));
    }
    let x = recover_key_from_repeated_nonce(&public, &signed).unwrap();
    assert_eq!(private.x(), &x);
}
