//! Echo with a negotiated group: the initiator proposes (p, g), the peer acknowledges, and
//! only then are public keys exchanged.

use bignum::BigNumTrait;
use bignum::NumBigInt as BigNum;
use failure::Error;
use protocol::{unpack, StateMachine, Value};
use tracing::{debug, info};

use crate::algo::{secret_to_key, DH};
use crate::echo::{agreed, open, Channel};
use crate::DhError;

const ACK: &[u8] = b"ACK";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EchoNgStep {
    Parameters,
    Ack,
    PublicKeyA,
    PublicKeyB,
    Message,
    Response,
    Authenticate,
}

const ECHO_NG_STEPS: &[EchoNgStep] = &[
    EchoNgStep::Parameters,
    EchoNgStep::Ack,
    EchoNgStep::PublicKeyA,
    EchoNgStep::PublicKeyB,
    EchoNgStep::Message,
    EchoNgStep::Response,
    EchoNgStep::Authenticate,
];

#[derive(Default)]
pub struct EchoNg {
    dh: Option<DH<BigNum>>,
    channel: Channel,
}

impl EchoNg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_key(&self) -> Option<&[u8]> {
        self.channel.key()
    }

    /// Whether the session key was derived from `secret`.
    pub fn has_session_secret(&self, secret: &BigNum) -> bool {
        self.channel.key() == Some(&secret_to_key(secret)[..])
    }
}

impl StateMachine for EchoNg {
    type Step = EchoNgStep;

    fn steps() -> &'static [EchoNgStep] {
        ECHO_NG_STEPS
    }

    #[allow(non_snake_case)]
    fn dispatch(&mut self, step: EchoNgStep, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        match step {
            EchoNgStep::Parameters => {
                let dh = DH::<BigNum>::new()?;
                let args = vec![dh.p().clone().into(), dh.g().clone().into()];
                self.dh = Some(dh);
                Ok(args)
            }
            EchoNgStep::Ack => {
                let [p, g] = unpack::<2>(args)?;
                self.dh = Some(DH::with_parameters(p.into_int()?, g.into_int()?));
                Ok(vec![ACK.to_vec().into()])
            }
            EchoNgStep::PublicKeyA => {
                let [ack] = unpack::<1>(args)?;
                if ack.into_bytes()? != ACK {
                    return Err(DhError::MissingAck.into());
                }
                Ok(vec![agreed(&self.dh)?.public_key().clone().into()])
            }
            EchoNgStep::PublicKeyB => {
                let [A] = unpack::<1>(args)?;
                let dh = agreed(&self.dh)?;
                let key = dh.shared_key(&A.into_int()?);
                let B = dh.public_key().clone();
                self.channel.set_key(key);
                Ok(vec![B.into()])
            }
            EchoNgStep::Message => {
                let [B] = unpack::<1>(args)?;
                let key = agreed(&self.dh)?.shared_key(&B.into_int()?);
                self.channel.set_key(key);
                self.channel.start()
            }
            EchoNgStep::Response => self.channel.respond(args),
            EchoNgStep::Authenticate => self.channel.authenticate(args),
        }
    }
}

/// Generator forced onto the responder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForcedGenerator {
    One,
    P,
    PMinusOne,
}

impl ForcedGenerator {
    pub fn generator(self, p: &BigNum) -> BigNum {
        match self {
            ForcedGenerator::One => BigNum::one(),
            ForcedGenerator::P => p.clone(),
            ForcedGenerator::PMinusOne => p - &BigNum::one(),
        }
    }

    /// Every secret the initiator can end up with once the responder uses the forced
    /// generator. With g = p - 1 the responder's public key is 1 or p - 1, so the initiator's
    /// secret is 1 or p - 1 as well.
    pub fn candidate_secrets(self, p: &BigNum) -> Vec<BigNum> {
        match self {
            ForcedGenerator::One => vec![BigNum::one()],
            ForcedGenerator::P => vec![BigNum::zero()],
            ForcedGenerator::PMinusOne => vec![BigNum::one(), p - &BigNum::one()],
        }
    }
}

/// Rewrites the acknowledged group so that the responder computes its public key from a
/// degenerate generator.
pub struct EchoNgMitm {
    forced: ForcedGenerator,
    p: Option<BigNum>,
}

impl EchoNgMitm {
    pub fn new(forced: ForcedGenerator) -> Self {
        EchoNgMitm { forced, p: None }
    }

    pub fn candidate_keys(&self) -> Result<Vec<Vec<u8>>, Error> {
        let p = match self.p {
            Some(ref p) => p,
            None => return Err(DhError::MissingParameters.into()),
        };
        Ok(self
            .forced
            .candidate_secrets(p)
            .iter()
            .map(secret_to_key)
            .collect())
    }

    /// Decrypts a `[ciphertext, iv]` message of the initiator with the first candidate key
    /// that yields valid padding and printable text.
    pub fn recover(&self, args: &[Value]) -> Result<Option<Vec<u8>>, Error> {
        for key in self.candidate_keys()? {
            match open(args.to_vec(), &key) {
                Ok(plaintext) if plaintext.iter().all(|&b| b == b' ' || b.is_ascii_graphic()) => {
                    info!(len = plaintext.len(), "recovered message");
                    return Ok(Some(plaintext));
                }
                _ => continue,
            }
        }
        Ok(None)
    }
}

impl StateMachine for EchoNgMitm {
    type Step = EchoNgStep;

    fn steps() -> &'static [EchoNgStep] {
        ECHO_NG_STEPS
    }

    fn dispatch(&mut self, step: EchoNgStep, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        match step {
            EchoNgStep::Ack => {
                let [p, _] = unpack::<2>(args)?;
                let p = p.into_int()?;
                let g = self.forced.generator(&p);
                debug!(forced = ?self.forced, "replacing generator");
                self.p = Some(p.clone());
                Ok(vec![p.into(), g.into()])
            }
            _ => Ok(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{run_protocol, Node, Relay};

    #[test]
    fn honest_negotiation() {
        let mut a = Node::new(EchoNg::new());
        let mut b = Node::new(EchoNg::new());
        let result = run_protocol(&mut a, &mut b, None, 7).unwrap();
        assert_eq!(vec![Value::Bool(true)], result.args);
    }

    fn attack(forced: ForcedGenerator) {
        let mut a = Node::new(EchoNg::new());
        let mut b = Node::new(EchoNg::new());
        let mut mitm = Relay::new(EchoNgMitm::new(forced));
        let result = run_protocol(&mut a, &mut b, Some(&mut mitm), 5).unwrap();

        let p = BigNum::from_hex_str(crate::NIST_P_HEX).unwrap();
        assert!(forced
            .candidate_secrets(&p)
            .iter()
            .any(|secret| a.machine().has_session_secret(secret)));

        let message = mitm.machine().recover(&result.args).unwrap().unwrap();
        assert!(["lama", "panda", "dolphin"]
            .iter()
            .any(|animal| animal.as_bytes() == &message[..]));
    }

    #[test]
    fn generator_one() {
        attack(ForcedGenerator::One);
    }

    #[test]
    fn generator_p() {
        attack(ForcedGenerator::P);
    }

    #[test]
    fn generator_p_minus_one() {
        attack(ForcedGenerator::PMinusOne);
    }
}
