// 12.0 api.rs: caller-facing surface. commands and queries carry fixed-point
// integers (collateral at 6 decimals, prices at the token's oracle decimals),
// views encode back the same way. Decimal never crosses this boundary.

use crate::collateral::{CollateralError, CollateralLedger};
use crate::config::{BASE_FUNDING_RATE, LIQUIDATION_THRESHOLD, MAINTENANCE_MARGIN_RATE, MAX_LEVERAGE};
use crate::engine::{CloseResult, Engine, EngineError, FundingResult, LiquidationResult};
use crate::fixed::{from_decimal, from_decimal_signed, to_decimal, FixedPointError};
use crate::liquidation::LiquidationStatus;
use crate::market::{Market, MarketError, MarketParams};
use crate::oracle::{OracleError, PriceData};
use crate::position::Position;
use crate::types::{Address, Price, Quote, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Precision used for rates in views.
pub const RATE_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineCommand {
    AddSupportedToken {
        token: Address,
        initial_price: u128,
        decimals: u32,
    },
    UpdatePrice {
        token: Address,
        new_price: u128,
    },
    CreateMarket {
        token: Address,
        max_leverage: u32,
        liquidation_threshold: u32,
        min_position_size: u128,
        max_position_size: Option<u128>,
    },
    OpenPosition {
        token: Address,
        is_long: bool,
        margin: u128,
        leverage: u32,
    },
    ClosePosition {
        token: Address,
    },
    LiquidatePosition {
        trader: Address,
        token: Address,
    },
    AccrueFunding {
        token: Address,
    },
    TransferOwnership {
        new_owner: Address,
    },
    RenounceOwnership,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineQuery {
    GetMarket { token: Address },
    GetMarkets,
    GetPosition { trader: Address, token: Address },
    GetPositions { trader: Address },
    GetUnrealizedPnl { trader: Address, token: Address },
    GetPrice { token: Address },
    GetLatestPriceData { token: Address },
    GetPositionHealth { trader: Address, token: Address },
    GetSupportedTokens,
    GetConstants,
    GetOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiResponse {
    Done,
    Market(MarketView),
    Markets(Vec<MarketView>),
    Position(PositionView),
    Positions(Vec<PositionView>),
    Closed(CloseView),
    Liquidated(LiquidationView),
    Funding(FundingView),
    UnrealizedPnl(PnlView),
    Price { price: u128 },
    PriceData(PriceDataView),
    Health(HealthView),
    SupportedTokens(Vec<Address>),
    Constants(ConstantsView),
    Owner(Option<Address>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketView {
    pub token: Address,
    pub is_active: bool,
    pub max_leverage: u32,
    pub liquidation_threshold: u32,
    pub min_position_size: u128,
    pub max_position_size: u128,
    /// Signed hourly rate at 18 decimals.
    pub funding_rate: i128,
    pub total_long_positions: u128,
    pub total_short_positions: u128,
    pub open_interest: u128,
    pub last_funding_update: i64,
}

/// Position slot as stored. A closed slot comes back with every field zeroed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub trader: Address,
    pub token: Address,
    pub is_long: bool,
    pub size: u128,
    pub margin: u128,
    pub entry_price: u128,
    pub liquidation_price: u128,
    pub leverage: u32,
    pub last_update_timestamp: i64,
}

/// PnL as magnitude plus direction. `pnl` alone is the legacy unsigned encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnlView {
    pub pnl: u128,
    pub is_profit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseView {
    pub exit_price: u128,
    pub realized_pnl: PnlView,
    pub funding_paid: i128,
    pub payout: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationView {
    pub trader: Address,
    pub liquidator: Address,
    pub exit_price: u128,
    pub margin_seized: u128,
    pub liquidator_reward: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingView {
    pub token: Address,
    pub funding_rate: i128,
    /// None when nothing accrued.
    pub longs_pay: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDataView {
    pub price: u128,
    /// Unix seconds.
    pub timestamp: i64,
    pub decimals: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthView {
    pub liquidatable: bool,
    pub loss: u128,
    pub threshold: u128,
    pub buffer: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantsView {
    pub max_leverage: u32,
    pub liquidation_threshold: u32,
    pub maintenance_margin_rate: u128,
    pub base_funding_rate: u128,
    pub collateral_decimals: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    InvalidOwner,
    InvalidLeverage,
    InvalidParams,
    MarketExists,
    UnknownMarket,
    MarketInactive,
    PositionNotFound,
    PositionAlreadyOpen,
    PositionSizeOutOfBounds,
    InvalidMargin,
    CannotLiquidate,
    UnknownToken,
    TokenAlreadySupported,
    PriceStale,
    InvalidPrice,
    InvalidDecimals,
    InsufficientCollateral,
    TransferRejected,
    InvalidAmount,
    InvalidConfig,
    InvalidFixedPoint,
    ArithmeticOverflow,
}

impl ErrorCode {
    /// Revert reason string callers match on.
    pub fn reason(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Ownable: caller is not the owner",
            ErrorCode::InvalidOwner => "Ownable: new owner is the zero address",
            ErrorCode::InvalidLeverage => "Invalid leverage",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::MarketExists => "Market exists",
            ErrorCode::UnknownMarket => "Market not found",
            ErrorCode::MarketInactive => "Market not active",
            ErrorCode::PositionNotFound => "No position",
            ErrorCode::PositionAlreadyOpen => "Position exists",
            ErrorCode::PositionSizeOutOfBounds => "Invalid position size",
            ErrorCode::InvalidMargin => "Invalid margin",
            ErrorCode::CannotLiquidate => "Cannot liquidate",
            ErrorCode::UnknownToken => "Token not supported",
            ErrorCode::TokenAlreadySupported => "Token already supported",
            ErrorCode::PriceStale => "Price too old",
            ErrorCode::InvalidPrice => "Invalid price",
            ErrorCode::InvalidDecimals => "Invalid decimals",
            ErrorCode::InsufficientCollateral => "Insufficient balance",
            ErrorCode::TransferRejected => "Transfer failed",
            ErrorCode::InvalidAmount => "Invalid amount",
            ErrorCode::InvalidConfig => "Invalid config",
            ErrorCode::InvalidFixedPoint => "Invalid fixed-point value",
            ErrorCode::ArithmeticOverflow => "Arithmetic overflow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn reason(&self) -> &'static str {
        self.code.reason()
    }
}

impl From<&EngineError> for ErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::Unauthorized(_) => ErrorCode::Unauthorized,
            EngineError::InvalidOwner(_) => ErrorCode::InvalidOwner,
            EngineError::MarketExists(_) => ErrorCode::MarketExists,
            EngineError::UnknownMarket(_) => ErrorCode::UnknownMarket,
            EngineError::MarketInactive(_) => ErrorCode::MarketInactive,
            EngineError::PositionNotFound { .. } => ErrorCode::PositionNotFound,
            EngineError::PositionAlreadyOpen { .. } => ErrorCode::PositionAlreadyOpen,
            EngineError::InvalidMargin(_) => ErrorCode::InvalidMargin,
            EngineError::CannotLiquidate { .. } => ErrorCode::CannotLiquidate,
            EngineError::Market(MarketError::InvalidParams(_)) => ErrorCode::InvalidParams,
            EngineError::Market(MarketError::InvalidLeverage { .. }) => ErrorCode::InvalidLeverage,
            EngineError::Market(MarketError::PositionSizeOutOfBounds { .. }) => ErrorCode::PositionSizeOutOfBounds,
            EngineError::Oracle(OracleError::UnknownToken(_)) => ErrorCode::UnknownToken,
            EngineError::Oracle(OracleError::TokenAlreadySupported(_)) => ErrorCode::TokenAlreadySupported,
            EngineError::Oracle(OracleError::PriceStale { .. }) => ErrorCode::PriceStale,
            EngineError::Oracle(OracleError::InvalidPrice(_)) => ErrorCode::InvalidPrice,
            EngineError::Oracle(OracleError::InvalidDecimals(_)) => ErrorCode::InvalidDecimals,
            EngineError::Collateral(CollateralError::InsufficientCollateral { .. }) => {
                ErrorCode::InsufficientCollateral
            }
            EngineError::Collateral(CollateralError::TransferRejected { .. }) => ErrorCode::TransferRejected,
            EngineError::Collateral(CollateralError::InvalidAmount(_)) => ErrorCode::InvalidAmount,
            EngineError::Config(_) => ErrorCode::InvalidConfig,
            EngineError::FixedPoint(_) => ErrorCode::InvalidFixedPoint,
            EngineError::Overflow(_) => ErrorCode::ArithmeticOverflow,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self {
            code: ErrorCode::from(&err),
            message: err.to_string(),
        }
    }
}

impl From<FixedPointError> for ApiError {
    fn from(err: FixedPointError) -> Self {
        EngineError::from(err).into()
    }
}

impl From<OracleError> for ApiError {
    fn from(err: OracleError) -> Self {
        EngineError::from(err).into()
    }
}

// 12.1: boundary encoding helpers

fn encode_price(price: Decimal, decimals: u32) -> Result<u128, FixedPointError> {
    from_decimal(price.max(Decimal::ZERO), decimals)
}

fn decode_price(token: Address, raw: u128, decimals: u32) -> Result<Price, ApiError> {
    let value = to_decimal(raw, decimals)?;
    Ok(Price::new(value).ok_or(OracleError::InvalidPrice(token))?)
}

fn encode_pnl(pnl: Quote, decimals: u32) -> Result<PnlView, FixedPointError> {
    Ok(PnlView {
        pnl: from_decimal(pnl.abs().value(), decimals)?,
        is_profit: !pnl.is_negative(),
    })
}

impl MarketView {
    pub fn encode(market: &Market, collateral_decimals: u32) -> Result<Self, FixedPointError> {
        Ok(Self {
            token: market.token,
            is_active: market.is_active,
            max_leverage: market.max_leverage.value(),
            liquidation_threshold: market.liquidation_threshold.value(),
            min_position_size: from_decimal(market.min_position_size.value(), collateral_decimals)?,
            max_position_size: from_decimal(market.max_position_size.value(), collateral_decimals)?,
            funding_rate: from_decimal_signed(market.funding_rate, RATE_DECIMALS)?,
            total_long_positions: from_decimal(market.total_long_positions.value(), collateral_decimals)?,
            total_short_positions: from_decimal(market.total_short_positions.value(), collateral_decimals)?,
            open_interest: from_decimal(market.open_interest.value(), collateral_decimals)?,
            last_funding_update: market.last_funding_update.as_secs(),
        })
    }
}

impl PositionView {
    pub fn closed(trader: Address, token: Address) -> Self {
        Self {
            trader,
            token,
            is_long: false,
            size: 0,
            margin: 0,
            entry_price: 0,
            liquidation_price: 0,
            leverage: 0,
            last_update_timestamp: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.size != 0
    }

    pub fn encode(position: &Position, collateral_decimals: u32, price_decimals: u32) -> Result<Self, FixedPointError> {
        Ok(Self {
            trader: position.trader,
            token: position.token,
            is_long: position.is_long(),
            size: from_decimal(position.size.value(), collateral_decimals)?,
            margin: from_decimal(position.margin.value(), collateral_decimals)?,
            entry_price: encode_price(position.entry_price.value(), price_decimals)?,
            liquidation_price: encode_price(position.liquidation_price, price_decimals)?,
            leverage: position.leverage.value(),
            last_update_timestamp: position.last_update_timestamp.as_secs(),
        })
    }
}

impl PriceDataView {
    pub fn encode(data: &PriceData) -> Result<Self, FixedPointError> {
        Ok(Self {
            price: encode_price(data.price.value(), data.decimals)?,
            timestamp: data.timestamp.as_secs(),
            decimals: data.decimals,
        })
    }
}

impl HealthView {
    pub fn encode(status: &LiquidationStatus, collateral_decimals: u32) -> Result<Self, FixedPointError> {
        let (liquidatable, loss, threshold, buffer) = match status {
            LiquidationStatus::Healthy { loss, threshold, buffer } => (false, *loss, *threshold, *buffer),
            LiquidationStatus::Liquidatable { loss, threshold } => (true, *loss, *threshold, Quote::zero()),
        };
        Ok(Self {
            liquidatable,
            loss: from_decimal(loss.value(), collateral_decimals)?,
            threshold: from_decimal(threshold.value(), collateral_decimals)?,
            buffer: from_decimal(buffer.value(), collateral_decimals)?,
        })
    }
}

impl ConstantsView {
    pub fn current(collateral_decimals: u32) -> Result<Self, FixedPointError> {
        Ok(Self {
            max_leverage: MAX_LEVERAGE,
            liquidation_threshold: LIQUIDATION_THRESHOLD,
            maintenance_margin_rate: from_decimal(MAINTENANCE_MARGIN_RATE, RATE_DECIMALS)?,
            base_funding_rate: from_decimal(BASE_FUNDING_RATE, RATE_DECIMALS)?,
            collateral_decimals,
        })
    }
}

impl CloseView {
    fn encode(result: &CloseResult, collateral_decimals: u32, price_decimals: u32) -> Result<Self, FixedPointError> {
        Ok(Self {
            exit_price: encode_price(result.exit_price.value(), price_decimals)?,
            realized_pnl: encode_pnl(result.realized_pnl, collateral_decimals)?,
            funding_paid: from_decimal_signed(result.funding_paid.value(), collateral_decimals)?,
            payout: from_decimal(result.payout.value(), collateral_decimals)?,
        })
    }
}

impl LiquidationView {
    fn encode(result: &LiquidationResult, collateral_decimals: u32, price_decimals: u32) -> Result<Self, FixedPointError> {
        Ok(Self {
            trader: result.trader,
            liquidator: result.liquidator,
            exit_price: encode_price(result.exit_price.value(), price_decimals)?,
            margin_seized: from_decimal(result.margin_seized.value(), collateral_decimals)?,
            liquidator_reward: from_decimal(result.liquidator_reward.value(), collateral_decimals)?,
        })
    }
}

impl FundingView {
    fn encode(result: &FundingResult) -> Result<Self, FixedPointError> {
        Ok(Self {
            token: result.token,
            funding_rate: from_decimal_signed(result.funding_rate, RATE_DECIMALS)?,
            longs_pay: result.paying_side.map(|side| side.is_long()),
        })
    }
}

// 12.2: dispatch

impl<C: CollateralLedger> Engine<C> {
    fn price_decimals(&self, token: Address) -> Result<u32, OracleError> {
        self.oracle().decimals(token).ok_or(OracleError::UnknownToken(token))
    }

    fn decode_quote(&self, raw: u128) -> Result<Quote, FixedPointError> {
        to_decimal(raw, self.config().collateral_decimals).map(Quote::new)
    }

    /// Runs a state-changing command on behalf of `caller`.
    pub fn execute(&mut self, caller: Address, command: EngineCommand) -> Result<ApiResponse, ApiError> {
        let collateral_decimals = self.config().collateral_decimals;

        match command {
            EngineCommand::AddSupportedToken {
                token,
                initial_price,
                decimals,
            } => {
                let price = decode_price(token, initial_price, decimals)?;
                self.add_supported_token(caller, token, price, decimals)?;
                Ok(ApiResponse::Done)
            }
            EngineCommand::UpdatePrice { token, new_price } => {
                let price = decode_price(token, new_price, self.price_decimals(token)?)?;
                self.update_price(caller, token, price)?;
                Ok(ApiResponse::Done)
            }
            EngineCommand::CreateMarket {
                token,
                max_leverage,
                liquidation_threshold,
                min_position_size,
                max_position_size,
            } => {
                let mut params =
                    MarketParams::new(token, max_leverage, liquidation_threshold, self.decode_quote(min_position_size)?);
                if let Some(max) = max_position_size {
                    params = params.with_max_position_size(self.decode_quote(max)?);
                }
                let market = self.create_market(caller, params)?;
                Ok(ApiResponse::Market(MarketView::encode(market, collateral_decimals)?))
            }
            EngineCommand::OpenPosition {
                token,
                is_long,
                margin,
                leverage,
            } => {
                let margin = self.decode_quote(margin)?;
                let position = self.open_position(caller, token, Side::from_is_long(is_long), margin, leverage)?;
                let view = PositionView::encode(&position, collateral_decimals, self.price_decimals(token)?)?;
                Ok(ApiResponse::Position(view))
            }
            EngineCommand::ClosePosition { token } => {
                let result = self.close_position(caller, token)?;
                let view = CloseView::encode(&result, collateral_decimals, self.price_decimals(token)?)?;
                Ok(ApiResponse::Closed(view))
            }
            EngineCommand::LiquidatePosition { trader, token } => {
                let result = self.liquidate_position(caller, trader, token)?;
                let view = LiquidationView::encode(&result, collateral_decimals, self.price_decimals(token)?)?;
                Ok(ApiResponse::Liquidated(view))
            }
            EngineCommand::AccrueFunding { token } => {
                let result = self.accrue_funding(token)?;
                Ok(ApiResponse::Funding(FundingView::encode(&result)?))
            }
            EngineCommand::TransferOwnership { new_owner } => {
                self.transfer_ownership(caller, new_owner)?;
                Ok(ApiResponse::Done)
            }
            EngineCommand::RenounceOwnership => {
                self.renounce_ownership(caller)?;
                Ok(ApiResponse::Done)
            }
        }
    }

    /// Read-only queries. Never mutates, not even funding state.
    pub fn query(&self, query: EngineQuery) -> Result<ApiResponse, ApiError> {
        let collateral_decimals = self.config().collateral_decimals;

        match query {
            EngineQuery::GetMarket { token } => {
                let market = self.get_market(token).ok_or(EngineError::UnknownMarket(token))?;
                Ok(ApiResponse::Market(MarketView::encode(market, collateral_decimals)?))
            }
            EngineQuery::GetMarkets => {
                let views = self
                    .markets()
                    .into_iter()
                    .map(|m| MarketView::encode(m, collateral_decimals))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ApiResponse::Markets(views))
            }
            EngineQuery::GetPosition { trader, token } => {
                let view = match self.get_position(trader, token) {
                    Some(position) => {
                        PositionView::encode(position, collateral_decimals, self.price_decimals(token)?)?
                    }
                    None => PositionView::closed(trader, token),
                };
                Ok(ApiResponse::Position(view))
            }
            EngineQuery::GetPositions { trader } => {
                let views = self
                    .positions_of(trader)
                    .into_iter()
                    .map(|p| {
                        let decimals = self.price_decimals(p.token)?;
                        Ok(PositionView::encode(p, collateral_decimals, decimals)?)
                    })
                    .collect::<Result<Vec<_>, ApiError>>()?;
                Ok(ApiResponse::Positions(views))
            }
            EngineQuery::GetUnrealizedPnl { trader, token } => {
                let pnl = self.get_unrealized_pnl(trader, token)?;
                Ok(ApiResponse::UnrealizedPnl(encode_pnl(pnl, collateral_decimals)?))
            }
            EngineQuery::GetPrice { token } => {
                let data = self.get_latest_price_data(token)?;
                Ok(ApiResponse::Price {
                    price: PriceDataView::encode(&data)?.price,
                })
            }
            EngineQuery::GetLatestPriceData { token } => {
                let data = self.get_latest_price_data(token)?;
                Ok(ApiResponse::PriceData(PriceDataView::encode(&data)?))
            }
            EngineQuery::GetPositionHealth { trader, token } => {
                let status = self.position_health(trader, token)?;
                Ok(ApiResponse::Health(HealthView::encode(&status, collateral_decimals)?))
            }
            EngineQuery::GetSupportedTokens => Ok(ApiResponse::SupportedTokens(self.supported_tokens())),
            EngineQuery::GetConstants => Ok(ApiResponse::Constants(ConstantsView::current(collateral_decimals)?)),
            EngineQuery::GetOwner => Ok(ApiResponse::Owner(self.owner())),
        }
    }
}
