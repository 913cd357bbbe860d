//! Oracle operations. Writes are owner-only, reads enforce staleness.

use super::core::Engine;
use super::results::EngineError;
use crate::collateral::CollateralLedger;
use crate::events::{EventPayload, PriceUpdatedEvent, TokenSupportedEvent};
use crate::oracle::PriceData;
use crate::types::{Address, Price};

impl<C: CollateralLedger> Engine<C> {
    pub fn add_supported_token(
        &mut self,
        caller: Address,
        token: Address,
        initial_price: Price,
        decimals: u32,
    ) -> Result<(), EngineError> {
        self.require_owner(caller)?;
        self.oracle
            .add_supported_token(token, initial_price, decimals, self.current_time)?;

        tracing::info!(%token, price = %initial_price, decimals, "token supported");
        self.emit_event(EventPayload::TokenSupported(TokenSupportedEvent {
            token,
            initial_price,
            decimals,
        }));
        Ok(())
    }

    /// Overwrites the token's price and stamps it with the engine clock.
    pub fn update_price(&mut self, caller: Address, token: Address, new_price: Price) -> Result<(), EngineError> {
        self.require_owner(caller)?;
        let previous = self.oracle.update_price(token, new_price, self.current_time)?;

        tracing::debug!(%token, old = %previous.price, new = %new_price, "price updated");
        self.emit_event(EventPayload::PriceUpdated(PriceUpdatedEvent {
            token,
            old_price: previous.price,
            new_price,
        }));
        Ok(())
    }

    pub fn get_price(&self, token: Address) -> Result<Price, EngineError> {
        Ok(self.oracle.get_price(token, self.current_time)?)
    }

    pub fn get_latest_price_data(&self, token: Address) -> Result<PriceData, EngineError> {
        Ok(self.oracle.get_latest_price_data(token, self.current_time)?)
    }

    pub fn supported_tokens(&self) -> Vec<Address> {
        self.oracle.supported_tokens()
    }
}
