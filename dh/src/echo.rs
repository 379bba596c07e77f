//! Echo over a Diffie-Hellman session: one side sends an animal name, the other answers
//! "I'm a <animal>", and the first side checks the answer.

use aes::{decrypt_cbc, encrypt_cbc, random_block};
use bignum::BigNumTrait;
use bignum::NumBigInt as BigNum;
use failure::Error;
use protocol::{unpack, StateMachine, Value};
use rand::Rng;
use tracing::debug;

use crate::algo::{secret_to_key, DH};
use crate::DhError;

const ANIMALS: [&str; 3] = ["lama", "panda", "dolphin"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EchoStep {
    Arguments,
    PublicKey,
    Message,
    Response,
    Authenticate,
}

const ECHO_STEPS: &[EchoStep] = &[
    EchoStep::Arguments,
    EchoStep::PublicKey,
    EchoStep::Message,
    EchoStep::Response,
    EchoStep::Authenticate,
];

pub(crate) fn reply_to(message: &[u8]) -> Vec<u8> {
    let mut reply = b"I'm a ".to_vec();
    reply.extend_from_slice(message);
    reply
}

/// Splits `[ciphertext, iv]` and decrypts it.
pub(crate) fn open(args: Vec<Value>, key: &[u8]) -> Result<Vec<u8>, Error> {
    let [ciphertext, iv] = unpack::<2>(args)?;
    decrypt_cbc(&ciphertext.into_bytes()?, key, &iv.into_bytes()?, true)
}

/// The encrypted half of an echo session, shared by both echo variants.
#[derive(Default)]
pub(crate) struct Channel {
    key: Option<Vec<u8>>,
    message: Vec<u8>,
}

impl Channel {
    pub(crate) fn set_key(&mut self, key: Vec<u8>) {
        self.key = Some(key);
    }

    pub(crate) fn key(&self) -> Option<&[u8]> {
        self.key.as_deref()
    }

    fn session_key(&self) -> Result<&[u8], Error> {
        match self.key() {
            Some(key) => Ok(key),
            None => Err(DhError::MissingSessionKey.into()),
        }
    }

    fn send(&self, data: &[u8]) -> Result<Vec<Value>, Error> {
        let iv = random_block();
        let ciphertext = encrypt_cbc(data, self.session_key()?, &iv, true)?;
        Ok(vec![ciphertext.into(), iv.into()])
    }

    pub(crate) fn start(&mut self) -> Result<Vec<Value>, Error> {
        let animal = ANIMALS[rand::thread_rng().gen_range(0..ANIMALS.len())];
        self.message = animal.as_bytes().to_vec();
        self.send(&self.message)
    }

    pub(crate) fn respond(&mut self, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        let message = open(args, self.session_key()?)?;
        self.message = reply_to(&message);
        self.send(&self.message)
    }

    /// A reply that cannot even be decrypted fails authentication.
    pub(crate) fn authenticate(&self, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        let verdict = match open(args, self.session_key()?) {
            Ok(reply) => reply == reply_to(&self.message),
            Err(err) => {
                debug!(%err, "could not decrypt reply");
                false
            }
        };
        Ok(vec![verdict.into()])
    }
}

pub(crate) fn agreed(dh: &Option<DH<BigNum>>) -> Result<&DH<BigNum>, Error> {
    match dh {
        Some(dh) => Ok(dh),
        None => Err(DhError::MissingParameters.into()),
    }
}

#[derive(Default)]
pub struct Echo {
    dh: Option<DH<BigNum>>,
    channel: Channel,
}

impl Echo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_key(&self) -> Option<&[u8]> {
        self.channel.key()
    }
}

impl StateMachine for Echo {
    type Step = EchoStep;

    fn steps() -> &'static [EchoStep] {
        ECHO_STEPS
    }

    #[allow(non_snake_case)]
    fn dispatch(&mut self, step: EchoStep, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        match step {
            EchoStep::Arguments => {
                let dh = DH::<BigNum>::new()?;
                let args = vec![
                    dh.p().clone().into(),
                    dh.g().clone().into(),
                    dh.public_key().clone().into(),
                ];
                self.dh = Some(dh);
                Ok(args)
            }
            EchoStep::PublicKey => {
                let [p, g, A] = unpack::<3>(args)?;
                let dh = DH::with_parameters(p.into_int()?, g.into_int()?);
                self.channel.set_key(dh.shared_key(&A.into_int()?));
                let B = dh.public_key().clone();
                self.dh = Some(dh);
                Ok(vec![B.into()])
            }
            EchoStep::Message => {
                let [B] = unpack::<1>(args)?;
                let key = agreed(&self.dh)?.shared_key(&B.into_int()?);
                self.channel.set_key(key);
                self.channel.start()
            }
            EchoStep::Response => self.channel.respond(args),
            EchoStep::Authenticate => self.channel.authenticate(args),
        }
    }
}

/// Replaces both public keys by p, which makes the shared secret 0 on both sides, and reads
/// the conversation.
#[derive(Default)]
pub struct EchoMitm {
    p: Option<BigNum>,
    intercepted: Vec<Vec<u8>>,
}

impl EchoMitm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intercepted(&self) -> &[Vec<u8>] {
        &self.intercepted
    }

    fn eavesdrop(&mut self, args: &[Value]) -> Result<(), Error> {
        let key = secret_to_key(&BigNum::zero());
        let plaintext = open(args.to_vec(), &key)?;
        debug!(len = plaintext.len(), "intercepted message");
        self.intercepted.push(plaintext);
        Ok(())
    }
}

impl StateMachine for EchoMitm {
    type Step = EchoStep;

    fn steps() -> &'static [EchoStep] {
        ECHO_STEPS
    }

    fn dispatch(&mut self, step: EchoStep, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        match step {
            EchoStep::PublicKey => {
                let [p, g, _] = unpack::<3>(args)?;
                let p = p.into_int()?;
                self.p = Some(p.clone());
                Ok(vec![p.clone().into(), g, p.into()])
            }
            EchoStep::Message => {
                let p = match self.p {
                    Some(ref p) => p.clone(),
                    None => return Err(DhError::MissingParameters.into()),
                };
                Ok(vec![p.into()])
            }
            EchoStep::Response | EchoStep::Authenticate => {
                self.eavesdrop(&args)?;
                Ok(args)
            }
            EchoStep::Arguments => Ok(args),
        }
    }
}
