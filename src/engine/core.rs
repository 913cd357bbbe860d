// 8.0 engine/core.rs: main engine. holds the oracle, markets, positions and the
// collateral ledger. deterministic: time only moves through set_time/advance_time.

use super::results::EngineError;
use crate::collateral::{CollateralLedger, InMemoryCollateral};
use crate::config::{ConfigError, EngineConfig};
use crate::events::{Event, EventId, EventPayload};
use crate::funding::{accrue_funding_state, strategy_for, FundingAccrual, FundingState, FundingStrategy};
use crate::market::Market;
use crate::oracle::PriceOracle;
use crate::position::Position;
use crate::types::{Address, Quote, Timestamp};
use std::collections::HashMap;

/** 8.1: main engine struct. all state lives here */
#[derive(Debug)]
pub struct Engine<C: CollateralLedger = InMemoryCollateral> {
    pub(super) config: EngineConfig,
    // zero once ownership is renounced
    pub(super) owner: Address,
    pub(super) oracle: PriceOracle,
    pub(super) markets: HashMap<Address, Market>,
    // keyed by (trader, token). a missing entry is a closed slot
    pub(super) positions: HashMap<(Address, Address), Position>,
    pub(super) collateral: C,
    pub(super) funding_strategy: Box<dyn FundingStrategy>,
    // residual margin kept by the protocol. negative when payouts exceeded seized margin
    pub(super) protocol_balance: Quote,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) current_time: Timestamp,
}

impl<C: CollateralLedger> Engine<C> {
    pub fn new(config: EngineConfig, owner: Address, collateral: C) -> Result<Self, EngineError> {
        config.validate()?;
        if owner.is_zero() {
            return Err(EngineError::InvalidOwner(owner));
        }
        if collateral.decimals() != config.collateral_decimals {
            return Err(ConfigError::Invalid {
                field: "collateral_decimals",
                reason: format!(
                    "ledger uses {} decimals, config expects {}",
                    collateral.decimals(),
                    config.collateral_decimals
                ),
            }
            .into());
        }

        let funding_strategy = strategy_for(&config.funding);
        tracing::info!(
            %owner,
            custody = %config.custody_account,
            funding = funding_strategy.name(),
            "engine initialized"
        );

        Ok(Self {
            oracle: PriceOracle::new(config.max_price_age_secs),
            config,
            owner,
            markets: HashMap::new(),
            positions: HashMap::new(),
            collateral,
            funding_strategy,
            protocol_balance: Quote::zero(),
            events: Vec::new(),
            next_event_id: 1,
            current_time: Timestamp::from_millis(0),
        })
    }

    /// Swaps the funding model, e.g. for a custom strategy not covered by config.
    pub fn with_funding_strategy(mut self, strategy: Box<dyn FundingStrategy>) -> Self {
        self.funding_strategy = strategy;
        self
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis().saturating_add(millis));
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    pub fn collateral(&self) -> &C {
        &self.collateral
    }

    // direct ledger access for funding accounts outside the engine's flows
    pub fn collateral_mut(&mut self) -> &mut C {
        &mut self.collateral
    }

    pub fn custody_account(&self) -> Address {
        self.config.custody_account
    }

    pub fn protocol_balance(&self) -> Quote {
        self.protocol_balance
    }

    pub fn funding_strategy_name(&self) -> &'static str {
        self.funding_strategy.name()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    // funding state the market would have if accrued right now. nothing is written
    pub(super) fn pending_funding(&self, market: &Market) -> (FundingState, FundingAccrual) {
        let rate = self
            .funding_strategy
            .rate(market.total_long_positions, market.total_short_positions);
        accrue_funding_state(
            &market.funding,
            rate,
            market.total_long_positions,
            market.total_short_positions,
            self.current_time,
        )
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        tracing::debug!(event_id = event.id.0, kind = event.payload.kind(), "event emitted");

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}

#[cfg(test)]
pub(super) mod fixtures {
    use super::*;
    use crate::market::MarketParams;
    use crate::types::Price;
    use rust_decimal_macros::dec;

    pub fn owner() -> Address {
        Address::from_low_u64(0x0a)
    }

    pub fn token() -> Address {
        Address::from_low_u64(0x1001)
    }

    pub fn trader() -> Address {
        Address::from_low_u64(0xb0b)
    }

    pub fn keeper() -> Address {
        Address::from_low_u64(0x11c)
    }

    pub const START: i64 = 1_700_000_000;

    /// One market at 5.5, trader holding 10,000 and custody seeded with liquidity.
    pub fn engine_with(config: EngineConfig) -> Engine {
        let mut engine = Engine::new(config, owner(), InMemoryCollateral::usdc()).unwrap();
        engine.set_time(Timestamp::from_secs(START));
        engine
            .add_supported_token(owner(), token(), Price::new_unchecked(dec!(5.5)), 18)
            .unwrap();
        engine
            .create_market(owner(), MarketParams::new(token(), 100, 80, Quote::new(dec!(0.05))))
            .unwrap();
        let custody = engine.custody_account();
        engine.collateral_mut().mint(trader(), Quote::new(dec!(10000))).unwrap();
        engine.collateral_mut().mint(custody, Quote::new(dec!(1_000_000))).unwrap();
        engine
    }

    pub fn engine() -> Engine {
        engine_with(EngineConfig::without_funding())
    }

    pub fn move_price(engine: &mut Engine, percent: i64) {
        let current = engine.oracle().last_recorded(token()).unwrap().price;
        let next = current.percent_move(percent).unwrap();
        engine.update_price(owner(), token(), next).unwrap();
    }
}
