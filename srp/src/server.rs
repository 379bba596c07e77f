use std::marker::PhantomData;

use bignum::BigNumTrait;
use failure::Error;
use protocol::{unexpected_step, unpack, StateMachine, Value};
use tracing::{debug, info};

use crate::algo::{
    hash_secret, BigNum, DefaultUComputer, SimplifiedUComputer, SrpStep, UComputer, SRP,
    SRP_STEPS,
};
use crate::SrpError;

struct Handshake {
    A: BigNum,
    b: BigNum,
    u: BigNum,
}

/// Holds the salted verifier of a single registered user.
pub struct ServerBase<U: UComputer> {
    params: SRP,
    identifier: Vec<u8>,
    salt: Vec<u8>,
    v: BigNum,
    handshake: Option<Handshake>,
    computer: PhantomData<U>,
}

pub type Server = ServerBase<DefaultUComputer>;
pub type SimplifiedServer = ServerBase<SimplifiedUComputer>;

impl<U: UComputer> ServerBase<U> {
    pub fn new(identifier: &[u8], password: &[u8]) -> Result<Self, Error> {
        let params = SRP::new_with_k(U::K)?;
        let (salt, v) = params.password_to_verifier(identifier, password);
        Ok(ServerBase {
            params,
            identifier: identifier.to_vec(),
            salt,
            v,
            handshake: None,
            computer: PhantomData,
        })
    }

    fn server_key(&mut self, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        let [identifier, A] = unpack::<2>(args)?;
        if identifier.into_bytes()? != self.identifier {
            // The proof check below fails for a different identifier.
            debug!("unknown identifier");
        }
        let A = A.into_int()?;
        let N = self.params.N();
        let (b, power) = self.params.ephemeral();
        let B = (&(self.params.k() * &self.v) + &power).mod_math(N);
        let u = U::server_u(&A, &B);
        let args = U::encode_server_key(self.salt.clone(), B, u.clone());
        self.handshake = Some(Handshake { A, b, u });
        Ok(args)
    }

    fn server_proof(&mut self, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        let [proof] = unpack::<1>(args)?;
        let Handshake { A, b, u } = match self.handshake.take() {
            Some(handshake) => handshake,
            None => return Err(SrpError::HandshakeNotStarted.into()),
        };
        let N = self.params.N();
        let S = (&A * &self.v.mod_exp(&u, N)).mod_math(N).mod_exp(&b, N);
        let verdict = hash_secret(&S, &self.salt) == proof.into_bytes()?;
        info!(verdict, "checked client proof");
        Ok(vec![verdict.into()])
    }
}

impl<U: UComputer> StateMachine for ServerBase<U> {
    type Step = SrpStep;

    fn steps() -> &'static [SrpStep] {
        SRP_STEPS
    }

    fn dispatch(&mut self, step: SrpStep, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        match step {
            SrpStep::ServerKey => self.server_key(args),
            SrpStep::ServerProof => self.server_proof(args),
            SrpStep::ClientKey | SrpStep::ClientProof | SrpStep::ClientAuthenticated => {
                Err(unexpected_step(step))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, MaliciousClient, SimplifiedClient};
    use protocol::{run_protocol, Node, Participant, ProtocolError};

    fn login<C: StateMachine, S: StateMachine>(client: C, server: S) -> bool {
        let mut client = Node::new(client);
        let mut server = Node::new(server);
        let result = run_protocol(&mut client, &mut server, None, 5).unwrap();
        result.args == vec![Value::Bool(true)]
    }

    #[test]
    fn standard_login() {
        let server = Server::new(b"pablo", b"12345").unwrap();
        assert!(login(Client::new(b"pablo", b"12345").unwrap(), server));
    }

    #[test]
    fn wrong_password() {
        let server = Server::new(b"pablo", b"12345").unwrap();
        assert!(!login(Client::new(b"pablo", b"54321").unwrap(), server));
    }

    #[test]
    fn wrong_identifier() {
        let server = Server::new(b"pablo", b"12345").unwrap();
        assert!(!login(Client::new(b"picasso", b"12345").unwrap(), server));
    }

    #[test]
    fn simplified_login() {
        let server = SimplifiedServer::new(b"picasso", b"password").unwrap();
        assert!(login(
            SimplifiedClient::new(b"picasso", b"password").unwrap(),
            server
        ));
        let server = SimplifiedServer::new(b"picasso", b"password").unwrap();
        assert!(!login(
            SimplifiedClient::new(b"picasso", b"passw0rd").unwrap(),
            server
        ));
    }

    #[test]
    fn zero_key_bypasses_the_password() {
        for multiple in 0..3 {
            let server = Server::new(b"pablo", b"12345").unwrap();
            let client = MaliciousClient::new(b"pablo", multiple).unwrap();
            assert!(login(client, server));
        }
    }

    #[test]
    fn injected_key_must_be_a_multiple_of_n() {
        assert!(MaliciousClient::with_key(b"pablo", BigNum::from_u32(7)).is_err());
    }

    #[test]
    fn proof_before_key() {
        let mut server = Node::new(Server::new(b"pablo", b"12345").unwrap());
        let message = protocol::Message {
            index: 3,
            args: vec![Value::Bytes(Vec::new())],
        };
        assert!(server.step(Some(message)).is_err());

        let message = protocol::Message {
            index: 0,
            args: Vec::new(),
        };
        let err = server.step(Some(message)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::UnexpectedStep { .. })
        ));
    }
}
