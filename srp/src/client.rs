use std::marker::PhantomData;

use bignum::BigNumTrait;
use failure::Error;
use protocol::{unexpected_step, unpack, StateMachine, Value};
use tracing::debug;

use crate::algo::{
    compute_x, hash_secret, BigNum, DefaultUComputer, SimplifiedUComputer, SrpStep, UComputer,
    SRP, SRP_STEPS,
};
use crate::SrpError;

pub struct ClientBase<U: UComputer> {
    params: SRP,
    identifier: Vec<u8>,
    password: Vec<u8>,
    a: BigNum,
    A: BigNum,
    computer: PhantomData<U>,
}

pub type Client = ClientBase<DefaultUComputer>;
pub type SimplifiedClient = ClientBase<SimplifiedUComputer>;

impl<U: UComputer> ClientBase<U> {
    pub fn new(identifier: &[u8], password: &[u8]) -> Result<Self, Error> {
        let params = SRP::new_with_k(U::K)?;
        let (a, A) = params.ephemeral();
        Ok(ClientBase {
            params,
            identifier: identifier.to_vec(),
            password: password.to_vec(),
            a,
            A,
            computer: PhantomData,
        })
    }

    fn proof(&self, args: Vec<Value>) -> Result<Vec<u8>, Error> {
        let (salt, B, u) = U::decode_server_key(args, &self.A)?;
        let N = self.params.N();
        let g = self.params.g();
        let k = self.params.k();
        let x = compute_x(&salt, &self.identifier, &self.password);
        let base = (&B - &(k * &g.mod_exp(&x, N))).mod_math(N);
        let S = base.mod_exp(&(&self.a + &(&u * &x)), N);
        Ok(hash_secret(&S, &salt))
    }
}

fn authenticated(args: Vec<Value>) -> Result<Vec<Value>, Error> {
    let [verdict] = unpack::<1>(args)?;
    let verdict = verdict.into_bool()?;
    debug!(verdict, "login finished");
    Ok(vec![verdict.into()])
}

impl<U: UComputer> StateMachine for ClientBase<U> {
    type Step = SrpStep;

    fn steps() -> &'static [SrpStep] {
        SRP_STEPS
    }

    fn dispatch(&mut self, step: SrpStep, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        match step {
            SrpStep::ClientKey => Ok(vec![
                self.identifier.clone().into(),
                self.A.clone().into(),
            ]),
            SrpStep::ClientProof => Ok(vec![self.proof(args)?.into()]),
            SrpStep::ClientAuthenticated => authenticated(args),
            SrpStep::ServerKey | SrpStep::ServerProof => Err(unexpected_step(step)),
        }
    }
}

/// Logs in without the password by sending a multiple of N as A, which forces the server's
/// shared secret to zero.
pub struct MaliciousClient {
    identifier: Vec<u8>,
    A: BigNum,
}

impl MaliciousClient {
    pub fn new(identifier: &[u8], multiple: u32) -> Result<Self, Error> {
        let params = SRP::new()?;
        let A = params.N() * &BigNum::from_u32(multiple);
        Self::with_key(identifier, A)
    }

    /// Uses an arbitrary injected key, which must be a multiple of N.
    pub fn with_key(identifier: &[u8], A: BigNum) -> Result<Self, Error> {
        let params = SRP::new()?;
        if A.mod_math(params.N()) != BigNum::zero() {
            return Err(SrpError::NotAMultipleOfN.into());
        }
        Ok(MaliciousClient {
            identifier: identifier.to_vec(),
            A,
        })
    }
}

impl StateMachine for MaliciousClient {
    type Step = SrpStep;

    fn steps() -> &'static [SrpStep] {
        SRP_STEPS
    }

    fn dispatch(&mut self, step: SrpStep, args: Vec<Value>) -> Result<Vec<Value>, Error> {
        match step {
            SrpStep::ClientKey => Ok(vec![
                self.identifier.clone().into(),
                self.A.clone().into(),
            ]),
            SrpStep::ClientProof => {
                let [salt, _] = unpack::<2>(args)?;
                Ok(vec![hash_secret(&BigNum::zero(), &salt.into_bytes()?).into()])
            }
            SrpStep::ClientAuthenticated => authenticated(args),
            SrpStep::ServerKey | SrpStep::ServerProof => Err(unexpected_step(step)),
        }
    }
}
