// 5.0: funding. the side carrying more open interest pays the other side over time.
// 5.0 has the strategy seam and config. 5.1 has the index accrual logic.
//
// each side keeps two indices per unit of notional: what it has paid and what it
// has received. both only ever go up, positions snapshot them at open and settle
// the difference at close, so closing early or late never skips accrued funding.

use crate::types::{ArithmeticOverflow, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingMode {
    Disabled,
    Imbalance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingConfig {
    pub mode: FundingMode,
    // rate per hour charged when open interest is entirely one-sided
    pub base_rate_per_hour: Decimal,
    pub max_rate_per_hour: Decimal,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            mode: FundingMode::Imbalance,
            base_rate_per_hour: crate::config::BASE_FUNDING_RATE,
            max_rate_per_hour: dec!(0.001),
        }
    }
}

/// Decides the signed hourly funding rate for a market. Positive means longs pay.
pub trait FundingStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn rate(&self, long_open_interest: Quote, short_open_interest: Quote) -> Decimal;
}

/// Funding switched off. Indices never move.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFunding;

impl FundingStrategy for NoFunding {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn rate(&self, _long: Quote, _short: Quote) -> Decimal {
        Decimal::ZERO
    }
}

/// base_rate * (long - short) / (long + short), clamped to max_rate.
#[derive(Debug, Clone)]
pub struct ImbalanceFunding {
    pub base_rate_per_hour: Decimal,
    pub max_rate_per_hour: Decimal,
}

impl FundingStrategy for ImbalanceFunding {
    fn name(&self) -> &'static str {
        "imbalance"
    }

    fn rate(&self, long: Quote, short: Quote) -> Decimal {
        let total = long.value() + short.value();
        if total.is_zero() {
            return Decimal::ZERO;
        }
        let skew = (long.value() - short.value()) / total;
        let rate = self.base_rate_per_hour * skew;
        rate.max(-self.max_rate_per_hour).min(self.max_rate_per_hour)
    }
}

pub fn strategy_for(config: &FundingConfig) -> Box<dyn FundingStrategy> {
    match config.mode {
        FundingMode::Disabled => Box::new(NoFunding),
        FundingMode::Imbalance => Box::new(ImbalanceFunding {
            base_rate_per_hour: config.base_rate_per_hour,
            max_rate_per_hour: config.max_rate_per_hour,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FundingIndex {
    pub paid: Decimal,
    pub received: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingState {
    pub long_index: FundingIndex,
    pub short_index: FundingIndex,
    // last applied signed hourly rate
    pub current_rate: Decimal,
    pub last_update: Timestamp,
}

impl FundingState {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            long_index: FundingIndex::default(),
            short_index: FundingIndex::default(),
            current_rate: Decimal::ZERO,
            last_update: timestamp,
        }
    }

    pub fn index(&self, side: Side) -> FundingIndex {
        match side {
            Side::Long => self.long_index,
            Side::Short => self.short_index,
        }
    }
}

/// What one accrual step moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingAccrual {
    pub rate: Decimal,
    pub hours: Decimal,
    pub paying_side: Option<Side>,
    pub paid_per_unit: Decimal,
    pub received_per_unit: Decimal,
}

impl FundingAccrual {
    pub fn is_empty(&self) -> bool {
        self.paying_side.is_none()
    }
}

// 5.1: returns the advanced state instead of mutating so callers can commit it
// together with the rest of an operation.
pub fn accrue_funding_state(
    state: &FundingState,
    rate: Decimal,
    long_open_interest: Quote,
    short_open_interest: Quote,
    now: Timestamp,
) -> (FundingState, FundingAccrual) {
    let hours = if now > state.last_update {
        state.last_update.elapsed_hours(&now)
    } else {
        Decimal::ZERO
    };

    let mut next = state.clone();
    next.current_rate = rate;
    next.last_update = now.max(state.last_update);

    let idle = FundingAccrual {
        rate,
        hours,
        paying_side: None,
        paid_per_unit: Decimal::ZERO,
        received_per_unit: Decimal::ZERO,
    };

    if hours.is_zero() || rate.is_zero() || long_open_interest.is_zero() || short_open_interest.is_zero() {
        return (next, idle);
    }

    let (payer, payer_oi, receiver_oi) = if rate > Decimal::ZERO {
        (Side::Long, long_open_interest, short_open_interest)
    } else {
        (Side::Short, short_open_interest, long_open_interest)
    };

    let paid_per_unit = rate.abs() * hours;
    // receivers split exactly what payers hand over
    let received_per_unit = paid_per_unit * payer_oi.value() / receiver_oi.value();

    match payer {
        Side::Long => {
            next.long_index.paid += paid_per_unit;
            next.short_index.received += received_per_unit;
        }
        Side::Short => {
            next.short_index.paid += paid_per_unit;
            next.long_index.received += received_per_unit;
        }
    }

    (
        next,
        FundingAccrual {
            rate,
            hours,
            paying_side: Some(payer),
            paid_per_unit,
            received_per_unit,
        },
    )
}

// 5.2: net funding a position owes since its snapshot. negative means it is owed.
pub fn funding_owed(size: Quote, entry: FundingIndex, current: FundingIndex) -> Result<Quote, ArithmeticOverflow> {
    let paid = current.paid - entry.paid;
    let received = current.received - entry.received;
    size.checked_mul(paid - received).ok_or(ArithmeticOverflow)
}
