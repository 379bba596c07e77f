#[macro_use]
extern crate failure;

pub mod algo;
pub mod echo;
pub mod echo_ng;

pub use algo::{secret_to_key, DH, G, NIST_P_HEX};
pub use echo::{Echo, EchoMitm, EchoStep};
pub use echo_ng::{EchoNg, EchoNgMitm, EchoNgStep, ForcedGenerator};

#[derive(Debug, Fail)]
pub enum DhError {
    #[fail(display = "group parameters have not been agreed on")]
    MissingParameters,

    #[fail(display = "no session key yet")]
    MissingSessionKey,

    #[fail(display = "peer did not acknowledge the group")]
    MissingAck,
}
