//! Admin ownership: market listing and price updates are owner-only.

use super::core::Engine;
use super::results::EngineError;
use crate::collateral::CollateralLedger;
use crate::events::{EventPayload, OwnershipTransferredEvent};
use crate::types::Address;

impl<C: CollateralLedger> Engine<C> {
    /// Current owner, or `None` once ownership has been renounced.
    pub fn owner(&self) -> Option<Address> {
        if self.owner.is_zero() {
            None
        } else {
            Some(self.owner)
        }
    }

    pub(super) fn require_owner(&self, caller: Address) -> Result<(), EngineError> {
        if self.owner.is_zero() || caller != self.owner {
            tracing::warn!(%caller, "admin call rejected");
            return Err(EngineError::Unauthorized(caller));
        }
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<(), EngineError> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(EngineError::InvalidOwner(new_owner));
        }
        self.set_owner(new_owner);
        Ok(())
    }

    /// Leaves the engine without an owner. Admin calls are rejected from then on.
    pub fn renounce_ownership(&mut self, caller: Address) -> Result<(), EngineError> {
        self.require_owner(caller)?;
        self.set_owner(Address::ZERO);
        Ok(())
    }

    fn set_owner(&mut self, new_owner: Address) {
        let previous_owner = self.owner;
        self.owner = new_owner;
        tracing::info!(%previous_owner, %new_owner, "ownership transferred");
        self.emit_event(EventPayload::OwnershipTransferred(OwnershipTransferredEvent {
            previous_owner,
            new_owner,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::super::core::fixtures::*;
    use super::*;
    use crate::types::Price;
    use rust_decimal_macros::dec;

    #[test]
    fn transfer_moves_admin_rights() {
        let mut engine = engine();
        let new_owner = Address::from_low_u64(0xbeef);

        engine.transfer_ownership(owner(), new_owner).unwrap();
        assert_eq!(engine.owner(), Some(new_owner));

        let result = engine.update_price(owner(), token(), Price::new_unchecked(dec!(6)));
        assert_eq!(result, Err(EngineError::Unauthorized(owner())));
        assert!(engine.update_price(new_owner, token(), Price::new_unchecked(dec!(6))).is_ok());
    }

    #[test]
    fn non_owner_cannot_transfer() {
        let mut engine = engine();
        let result = engine.transfer_ownership(trader(), trader());
        assert_eq!(result, Err(EngineError::Unauthorized(trader())));
        assert_eq!(engine.owner(), Some(owner()));
    }

    #[test]
    fn transfer_to_zero_rejected() {
        let mut engine = engine();
        assert_eq!(
            engine.transfer_ownership(owner(), Address::ZERO),
            Err(EngineError::InvalidOwner(Address::ZERO))
        );
    }

    #[test]
    fn renounce_locks_admin_calls() {
        let mut engine = engine();
        engine.renounce_ownership(owner()).unwrap();
        assert_eq!(engine.owner(), None);

        let result = engine.update_price(owner(), token(), Price::new_unchecked(dec!(6)));
        assert!(matches!(result, Err(EngineError::Unauthorized(_))));
        assert!(engine.transfer_ownership(owner(), trader()).is_err());
    }
}
