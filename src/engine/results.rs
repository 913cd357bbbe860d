// 8.0.2: result types and errors for engine operations.

use crate::collateral::CollateralError;
use crate::config::ConfigError;
use crate::fixed::FixedPointError;
use crate::funding::FundingIndex;
use crate::market::MarketError;
use crate::oracle::OracleError;
use crate::types::{Address, ArithmeticOverflow, Price, Quote, Side};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseResult {
    pub trader: Address,
    pub token: Address,
    pub side: Side,
    pub closed_size: Quote,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub funding_paid: Quote,
    pub payout: Quote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationResult {
    pub trader: Address,
    pub token: Address,
    pub liquidator: Address,
    pub closed_size: Quote,
    pub exit_price: Price,
    pub loss: Quote,
    pub margin_seized: Quote,
    pub liquidator_reward: Quote,
    pub protocol_retained: Quote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingResult {
    pub token: Address,
    pub funding_rate: Decimal,
    pub hours: Decimal,
    /// None when nothing moved (no time passed, zero rate or one-sided interest).
    pub paying_side: Option<Side>,
    pub long_index: FundingIndex,
    pub short_index: FundingIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Caller {0} is not the owner")]
    Unauthorized(Address),

    #[error("Invalid owner {0}")]
    InvalidOwner(Address),

    #[error("Market for {0} already exists")]
    MarketExists(Address),

    #[error("Market for {0} not found")]
    UnknownMarket(Address),

    #[error("Market for {0} is not active")]
    MarketInactive(Address),

    #[error("No open position for {trader} on {token}")]
    PositionNotFound { trader: Address, token: Address },

    #[error("Position already open for {trader} on {token}")]
    PositionAlreadyOpen { trader: Address, token: Address },

    #[error("Invalid margin {0}")]
    InvalidMargin(Quote),

    #[error("Cannot liquidate: loss {loss} below threshold {threshold}")]
    CannotLiquidate { loss: Quote, threshold: Quote },

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Collateral(#[from] CollateralError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    FixedPoint(#[from] FixedPointError),

    #[error(transparent)]
    Overflow(#[from] ArithmeticOverflow),
}
