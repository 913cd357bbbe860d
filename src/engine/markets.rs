//! Market registry. Append-only: markets are never removed or re-parameterized.

use super::core::Engine;
use super::results::EngineError;
use crate::collateral::CollateralLedger;
use crate::events::{EventPayload, MarketCreatedEvent};
use crate::market::{Market, MarketParams};
use crate::oracle::OracleError;
use crate::types::Address;

impl<C: CollateralLedger> Engine<C> {
    pub fn create_market(&mut self, caller: Address, params: MarketParams) -> Result<&Market, EngineError> {
        self.require_owner(caller)?;

        let token = params.token;
        if self.markets.contains_key(&token) {
            return Err(EngineError::MarketExists(token));
        }
        if !self.oracle.is_supported(token) {
            return Err(OracleError::UnknownToken(token).into());
        }

        let market = Market::new(&params, self.config.default_max_position_size, self.current_time)?;
        let max_leverage = market.max_leverage;

        tracing::info!(
            %token,
            %max_leverage,
            threshold = %market.liquidation_threshold,
            min_size = %market.min_position_size,
            max_size = %market.max_position_size,
            "market created"
        );
        self.markets.insert(token, market);
        self.emit_event(EventPayload::MarketCreated(MarketCreatedEvent { token, max_leverage }));

        self.markets.get(&token).ok_or(EngineError::UnknownMarket(token))
    }

    pub fn get_market(&self, token: Address) -> Option<&Market> {
        self.markets.get(&token)
    }

    pub fn markets(&self) -> Vec<&Market> {
        let mut markets: Vec<&Market> = self.markets.values().collect();
        markets.sort_by_key(|m| m.token);
        markets
    }
}
