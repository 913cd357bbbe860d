//! Market configuration and state.
//!
//! A market holds the trading parameters for one token and the aggregate
//! counters of every live position on it. Parameters are fixed at creation;
//! only the counters and funding state move afterwards.

use crate::funding::FundingState;
use crate::types::{Address, Leverage, Percent, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parameters supplied when registering a market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketParams {
    pub token: Address,
    pub max_leverage: u32,
    /// Whole percent of margin lost before a position can be liquidated.
    pub liquidation_threshold: u32,
    pub min_position_size: Quote,
    /// Falls back to the engine default when not given.
    pub max_position_size: Option<Quote>,
    pub is_active: bool,
}

impl MarketParams {
    pub fn new(token: Address, max_leverage: u32, liquidation_threshold: u32, min_position_size: Quote) -> Self {
        Self {
            token,
            max_leverage,
            liquidation_threshold,
            min_position_size,
            max_position_size: None,
            is_active: true,
        }
    }

    pub fn with_max_position_size(mut self, max: Quote) -> Self {
        self.max_position_size = Some(max);
        self
    }

    // listed but not yet open for new positions
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub token: Address,
    pub is_active: bool,
    pub max_leverage: Leverage,
    pub liquidation_threshold: Percent,
    pub min_position_size: Quote,
    pub max_position_size: Quote,
    /// Signed hourly rate last applied. Positive means longs pay.
    pub funding_rate: Decimal,
    pub total_long_positions: Quote,
    pub total_short_positions: Quote,
    pub open_interest: Quote,
    pub last_funding_update: Timestamp,
    pub funding: FundingState,
    pub created_at: Timestamp,
}

impl Market {
    /// Validates params and builds an empty market.
    pub fn new(params: &MarketParams, default_max_size: Quote, timestamp: Timestamp) -> Result<Self, MarketError> {
        if params.max_leverage > crate::config::MAX_LEVERAGE {
            return Err(MarketError::InvalidParams(format!(
                "max leverage {}x above protocol limit {}x",
                params.max_leverage,
                crate::config::MAX_LEVERAGE
            )));
        }
        let max_leverage = Leverage::new(params.max_leverage)
            .ok_or_else(|| MarketError::InvalidParams("max leverage must be at least 1x".to_string()))?;

        let liquidation_threshold = Percent::new(params.liquidation_threshold).ok_or_else(|| {
            MarketError::InvalidParams(format!(
                "liquidation threshold {} outside (0, 100]",
                params.liquidation_threshold
            ))
        })?;

        let max_position_size = params.max_position_size.unwrap_or(default_max_size);
        if params.min_position_size.is_negative() {
            return Err(MarketError::InvalidParams("min position size is negative".to_string()));
        }
        if !max_position_size.is_positive() || params.min_position_size > max_position_size {
            return Err(MarketError::InvalidParams(format!(
                "position size bounds [{}, {}] are empty",
                params.min_position_size, max_position_size
            )));
        }

        Ok(Self {
            token: params.token,
            is_active: params.is_active,
            max_leverage,
            liquidation_threshold,
            min_position_size: params.min_position_size,
            max_position_size,
            funding_rate: Decimal::ZERO,
            total_long_positions: Quote::zero(),
            total_short_positions: Quote::zero(),
            open_interest: Quote::zero(),
            last_funding_update: timestamp,
            funding: FundingState::new(timestamp),
            created_at: timestamp,
        })
    }

    pub fn validate_leverage(&self, leverage: u32) -> Result<Leverage, MarketError> {
        match Leverage::new(leverage) {
            Some(lev) if lev <= self.max_leverage => Ok(lev),
            _ => Err(MarketError::InvalidLeverage {
                leverage,
                max: self.max_leverage.value(),
            }),
        }
    }

    pub fn validate_size(&self, size: Quote) -> Result<(), MarketError> {
        if size < self.min_position_size || size > self.max_position_size {
            return Err(MarketError::PositionSizeOutOfBounds {
                size,
                min: self.min_position_size,
                max: self.max_position_size,
            });
        }
        Ok(())
    }

    pub fn side_total(&self, side: Side) -> Quote {
        match side {
            Side::Long => self.total_long_positions,
            Side::Short => self.total_short_positions,
        }
    }

    /// Adds a freshly opened position's size to its side and to open interest.
    pub fn record_open(&mut self, side: Side, size: Quote) {
        match side {
            Side::Long => self.total_long_positions = self.total_long_positions.add(size),
            Side::Short => self.total_short_positions = self.total_short_positions.add(size),
        }
        self.open_interest = self.total_long_positions.add(self.total_short_positions);
    }

    /// Removes a closed or liquidated position's size.
    pub fn record_close(&mut self, side: Side, size: Quote) {
        match side {
            Side::Long => self.total_long_positions = self.total_long_positions.sub(size),
            Side::Short => self.total_short_positions = self.total_short_positions.sub(size),
        }
        debug_assert!(!self.total_long_positions.is_negative() && !self.total_short_positions.is_negative());
        self.open_interest = self.total_long_positions.add(self.total_short_positions);
    }

    pub fn apply_funding(&mut self, state: FundingState) {
        self.funding_rate = state.current_rate;
        self.last_funding_update = state.last_update;
        self.funding = state;
    }

    /// Long minus short. Positive means longs are the crowded side.
    pub fn net_open_interest(&self) -> Quote {
        self.total_long_positions.sub(self.total_short_positions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    #[error("Invalid market params: {0}")]
    InvalidParams(String),

    #[error("Invalid leverage: {leverage}x not within 1x..={max}x")]
    InvalidLeverage { leverage: u32, max: u32 },

    #[error("Position size {size} outside [{min}, {max}]")]
    PositionSizeOutOfBounds { size: Quote, min: Quote, max: Quote },
}
