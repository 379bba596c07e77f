use bignum::BigNumTrait;
use failure::Error;
use protocol::{unexpected_step, unpack, StateMachine, Value};
use tracing::{debug, info};

use crate::algo::{
    compute_x, hash_secret, BigNum, SimplifiedUComputer, SrpStep, UComputer, SRP, SRP_STEPS,
};
use crate::SrpError;

/// What the fake server learned from one login attempt.
pub struct PasswordOracle {
    g: BigNum,
    N: BigNum,
    identifier: Vec<u8>,
    A: BigNum,
    client_secret: Vec<u8>,
}

impl PasswordOracle {
    pub fn is_password(&self, password_candidate: &[u8]) -> bool {
        self.password_to_client_secret(password_candidate) == self.client_secret
    }

    /// Returns the first word of `dictionary` that reproduces the client's proof.
    pub fn crack<'a, I>(&self, dictionary: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let found = dictionary
            .into_iter()
            .find(|word| self.is_password(word.as_bytes()));
        if let Some(word) = found {
            info!(word, "cracked password");
        }
        found
    }

    fn password_to_client_secret(&self, password_candidate: &[u8]) -> Vec<u8> {
        let N = &self.N;
        let x = compute_x(&[], &self.identifier, password_candidate);

        // With B = g and u = 1 the client computes S = g^(a + x) = A * g^x.
        let S = (&self.A * &self.g.mod_exp(&x, N)).mod_math(N);
        hash_secret(&S, &[])
    }
}

/// Poses as a simplified SRP server and offers salt = "", B = g and u = 1. It accepts every
/// login and keeps what it needs for an offline dictionary attack.
pub struct MitmSimpleServer {
    params: SRP,
    client_key: Option<(Vec<u8>, BigNum)>,
    client_secret: Option<Vec<u8>>,
}

impl MitmSimpleServer {
    pub fn new() -> Result<Self, Error> {
        Ok(MitmSimpleServer {
            params: SRP::new_with_k(SimplifiedUComputer::K)?,
            client_key: None,
            client_secret: None,
        })
    }

    pub fn password_oracle(&self) -> Result<PasswordOracle, Error> {
        match (&self.client_key, &self.client_secret) {
            (Some((identifier, A)), Some(client_secret)) => Ok(PasswordOracle {
                g: self.params.g().clone(),
                N: self.params.N().clone(),
                identifier: identifier.clone(),
                A: A.clone(),
                client_secret: client_secret.clone(),
            }),
            _ => Err(SrpError::HandshakeNotStarted.into()),
        }
    }
}

impl StateMachine for MitmSimpleServer {
    type Step = SrpStep;

    fn steps() -> &'static [SrpStep] {
        SRP_STEPS
    }

    fn dispatch(&mut self, step: SrpStep, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        match step {
            SrpStep::ServerKey => {
                let [identifier, A] = unpack::<2>(args)?;
                self.client_key = Some((identifier.into_bytes()?, A.into_int()?));
                let B = self.params.g().clone();
                Ok(SimplifiedUComputer::encode_server_key(
                    Vec::new(),
                    B,
                    BigNum::one(),
                ))
            }
            SrpStep::ServerProof => {
                let [proof] = unpack::<1>(args)?;
                self.client_secret = Some(proof.into_bytes()?);
                debug!("captured client proof");
                Ok(vec![true.into()])
            }
            SrpStep::ClientKey | SrpStep::ClientProof | SrpStep::ClientAuthenticated => {
                Err(unexpected_step(step))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SimplifiedClient;
    use protocol::{run_protocol, Node};

    const DICTIONARY: &[&str] = &["123456", "12345", "qwerty", "letmein", "password", "dragon"];

    #[test]
    fn dictionary_attack() {
        let mut client = Node::new(SimplifiedClient::new(b"picasso", b"password").unwrap());
        let mut server = Node::new(MitmSimpleServer::new().unwrap());
        let result = run_protocol(&mut client, &mut server, None, 5).unwrap();
        assert_eq!(vec![Value::Bool(true)], result.args);

        let oracle = server.machine().password_oracle().unwrap();
        assert!(!oracle.is_password(b"12345"));
        assert_eq!(Some("password"), oracle.crack(DICTIONARY.iter().cloned()));
    }

    #[test]
    fn password_outside_dictionary() {
        let mut client = Node::new(SimplifiedClient::new(b"pablo", b"correct horse").unwrap());
        let mut server = Node::new(MitmSimpleServer::new().unwrap());
        run_protocol(&mut client, &mut server, None, 5).unwrap();
        let oracle = server.machine().password_oracle().unwrap();
        assert_eq!(None, oracle.crack(DICTIONARY.iter().cloned()));
    }

    #[test]
    fn nothing_captured_yet() {
        assert!(MitmSimpleServer::new().unwrap().password_oracle().is_err());
    }
}
