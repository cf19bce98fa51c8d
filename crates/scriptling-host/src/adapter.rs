//! Bridge between host hook points and the dispatch engine.
//!
//! A host implements [`HookAdapter`] once per host version. The adapter turns
//! whatever the host's interception point hands it into a [`Payload`]; the
//! engine never sees host types.

use scriptling_events::{EVENT_CONTRACT_VERSION, EventContext, Payload};
use thiserror::Error;

use crate::dispatch::DispatchEngine;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    #[error("hook adapter targets event contract v{found}, this host provides v{expected}")]
    ContractMismatch { expected: u32, found: u32 },
}

pub trait HookAdapter {
    /// Raw signal produced by the host's interception point
    type Signal;

    /// Event contract version the adapter was written against
    fn contract_version(&self) -> u32;

    fn translate(&self, signal: Self::Signal) -> Payload;
}

/// A dispatch engine fronted by a host adapter
pub struct Hooks<A: HookAdapter> {
    adapter: A,
    engine: DispatchEngine,
}

impl<A: HookAdapter> Hooks<A> {
    pub fn new(adapter: A, engine: DispatchEngine) -> Result<Self, HookError> {
        let found = adapter.contract_version();
        if found != EVENT_CONTRACT_VERSION {
            return Err(HookError::ContractMismatch {
                expected: EVENT_CONTRACT_VERSION,
                found,
            });
        }
        Ok(Self { adapter, engine })
    }

    /// Translate a host signal and dispatch it.
    ///
    /// The host applies `is_cancelled()` and reads back the payload and
    /// return slot from the returned context. Script faults never surface
    /// here.
    pub fn signal(&mut self, signal: A::Signal) -> EventContext {
        let payload = self.adapter.translate(signal);
        self.engine.dispatch(payload)
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut DispatchEngine {
        &mut self.engine
    }

    pub fn into_engine(self) -> DispatchEngine {
        self.engine
    }
}
