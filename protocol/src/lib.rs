//! Step-indexed message exchange between protocol participants.
//!
//! A message carries the index of the step the receiver has to run next. Honest nodes answer
//! with the following index, while a relay sitting in the middle forwards its (possibly
//! rewritten) arguments under the index it received.

#[macro_use]
extern crate failure;

use std::convert::TryFrom;
use std::fmt;

use bignum::NumBigInt as BigNum;
use failure::Error;
use tracing::debug;

#[derive(Debug, Fail)]
pub enum ProtocolError {
    #[fail(display = "number of steps must be odd, got {}", nb_steps)]
    EvenStepCount { nb_steps: usize },

    #[fail(display = "no step left at index {}", index)]
    Finished { index: usize },

    #[fail(display = "expected step {}, got step {}", expected, got)]
    OutOfOrder { expected: usize, got: usize },

    #[fail(display = "step {} is not run by this participant", step)]
    UnexpectedStep { step: String },

    #[fail(display = "expected {}, got {}", expected, got)]
    UnexpectedArgument { expected: String, got: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(BigNum),
    Bytes(Vec<u8>),
    Bool(bool),
}

fn unexpected(expected: &str, got: &Value) -> Error {
    ProtocolError::UnexpectedArgument {
        expected: expected.to_owned(),
        got: format!("{:?}", got),
    }
    .into()
}

impl Value {
    pub fn into_int(self) -> Result<BigNum, Error> {
        match self {
            Value::Int(x) => Ok(x),
            other => Err(unexpected("an integer", &other)),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, Error> {
        match self {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(unexpected("bytes", &other)),
        }
    }

    pub fn into_bool(self) -> Result<bool, Error> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(unexpected("a boolean", &other)),
        }
    }
}

impl From<BigNum> for Value {
    fn from(x: BigNum) -> Self {
        Value::Int(x)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Splits the arguments of a step into exactly `N` values.
pub fn unpack<const N: usize>(args: Vec<Value>) -> Result<[Value; N], Error> {
    <[Value; N]>::try_from(args).map_err(|args| {
        ProtocolError::UnexpectedArgument {
            expected: format!("{} arguments", N),
            got: format!("{} arguments", args.len()),
        }
        .into()
    })
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    pub index: usize,
    pub args: Vec<Value>,
}

pub trait Participant {
    /// Runs the step named by `message` (the first step if there is no message yet).
    fn step(&mut self, message: Option<Message>) -> Result<Message, Error>;
}

/// A participant described as a closed list of named steps.
pub trait StateMachine {
    type Step: Copy + fmt::Debug + 'static;

    fn steps() -> &'static [Self::Step];

    fn dispatch(&mut self, step: Self::Step, args: Vec<Value>) -> Result<Vec<Value>, Error>;
}

fn lookup<M: StateMachine>(index: usize) -> Result<M::Step, Error> {
    match M::steps().get(index) {
        Some(&step) => Ok(step),
        None => Err(ProtocolError::Finished { index }.into()),
    }
}

// The first message may carry any index; after that, `cursor` holds the only index accepted.
fn check_cursor(cursor: Option<usize>, index: usize) -> Result<(), Error> {
    match cursor {
        Some(expected) if expected != index => Err(ProtocolError::OutOfOrder {
            expected,
            got: index,
        }
        .into()),
        _ => Ok(()),
    }
}

/// Error for a step that belongs to the other side of the protocol.
pub fn unexpected_step<S: fmt::Debug>(step: S) -> Error {
    ProtocolError::UnexpectedStep {
        step: format!("{:?}", step),
    }
    .into()
}

/// Honest participant. It runs every other step, so after step `i` it waits for `i + 2`.
pub struct Node<M> {
    machine: M,
    cursor: Option<usize>,
}

impl<M> Node<M> {
    pub fn new(machine: M) -> Self {
        Node {
            machine,
            cursor: None,
        }
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }
}

impl<M: StateMachine> Participant for Node<M> {
    fn step(&mut self, message: Option<Message>) -> Result<Message, Error> {
        let Message { index, args } = message.unwrap_or_default();
        check_cursor(self.cursor, index)?;
        let step = lookup::<M>(index)?;
        debug!(index, step = ?step, "running step");
        let args = self.machine.dispatch(step, args)?;
        self.cursor = Some(index + 2);
        Ok(Message {
            index: index + 1,
            args,
        })
    }
}

/// Man in the middle. Its machine sees every message before delivery and returns the
/// arguments to forward; steps it does not care about should hand them back untouched.
///
/// The relay sees both directions, so its cursor moves by one step per message.
pub struct Relay<M> {
    machine: M,
    cursor: Option<usize>,
}

impl<M> Relay<M> {
    pub fn new(machine: M) -> Self {
        Relay {
            machine,
            cursor: None,
        }
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }
}

impl<M: StateMachine> Participant for Relay<M> {
    fn step(&mut self, message: Option<Message>) -> Result<Message, Error> {
        let Message { index, args } = message.unwrap_or_default();
        check_cursor(self.cursor, index)?;
        let step = lookup::<M>(index)?;
        debug!(index, step = ?step, "relaying step");
        let args = self.machine.dispatch(step, args)?;
        self.cursor = Some(index + 1);
        Ok(Message { index, args })
    }
}

/// Alternates `a` and `b`, starting and ending with `a`, for `nb_steps` steps in total.
/// Every message goes through `mitm` if there is one. Returns the output of `a`'s last step.
pub fn run_protocol(
    a: &mut dyn Participant,
    b: &mut dyn Participant,
    mut mitm: Option<&mut dyn Participant>,
    nb_steps: usize,
) -> Result<Message, Error> {
    if nb_steps % 2 == 0 {
        return Err(ProtocolError::EvenStepCount { nb_steps }.into());
    }

    let mut relay = |message: Message| match mitm.as_mut() {
        Some(mitm) => mitm.step(Some(message)),
        None => Ok(message),
    };

    let mut data = None;
    for _ in 0..(nb_steps - 1) / 2 {
        let message = relay(a.step(data)?)?;
        data = Some(relay(b.step(Some(message))?)?);
    }
    a.step(data)
}
