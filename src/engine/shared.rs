//! Thread-safe handle for running the engine as a service.
//!
//! Writers are serialized behind one lock, so every mutation (position slot,
//! market counters, funding, collateral) lands as a single unit. Readers take
//! the shared side and never see a half-applied call.

use super::core::Engine;
use crate::collateral::{CollateralLedger, InMemoryCollateral};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug)]
pub struct SharedEngine<C: CollateralLedger = InMemoryCollateral> {
    inner: Arc<RwLock<Engine<C>>>,
}

impl<C: CollateralLedger> Clone for SharedEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CollateralLedger> SharedEngine<C> {
    pub fn new(engine: Engine<C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// Runs `f` with exclusive access.
    pub fn write<R>(&self, f: impl FnOnce(&mut Engine<C>) -> R) -> R {
        // engine calls commit only after their last fallible step, so a panic
        // mid-call cannot leave partial state behind the poisoned lock
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Runs `f` against a consistent snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&Engine<C>) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}
