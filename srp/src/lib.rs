//! Secure Remote Password as a five step exchange:
//! `[client_key, server_key, client_proof, server_proof, client_authenticated]`.

#[macro_use]
extern crate failure;

#[allow(non_snake_case)]
pub mod algo;

#[allow(non_snake_case)]
pub mod client;

#[allow(non_snake_case)]
pub mod mitm;

#[allow(non_snake_case)]
pub mod server;

pub use algo::{DefaultUComputer, SimplifiedUComputer, SrpStep, UComputer, SRP};
pub use client::{Client, MaliciousClient, SimplifiedClient};
pub use mitm::{MitmSimpleServer, PasswordOracle};
pub use server::{Server, SimplifiedServer};

#[derive(Debug, Fail)]
pub enum SrpError {
    #[fail(display = "server proof requested before the server key")]
    HandshakeNotStarted,

    #[fail(display = "injected public key is not a multiple of N")]
    NotAMultipleOfN,
}
