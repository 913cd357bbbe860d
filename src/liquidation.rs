//! Liquidation eligibility and proceeds.
//!
//! A position becomes liquidatable once its loss (price pnl net of funding)
//! reaches the market's threshold fraction of the posted margin. The margin is
//! then kept by the protocol, minus a reward for whoever triggered it.

use crate::funding::FundingIndex;
use crate::position::Position;
use crate::types::{ArithmeticOverflow, Percent, Price, Quote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidationStatus {
    Healthy {
        /// Current loss. Zero when the position is in profit.
        loss: Quote,
        threshold: Quote,
        /// How much more loss the position can take before it is liquidatable.
        buffer: Quote,
    },
    Liquidatable {
        loss: Quote,
        threshold: Quote,
    },
}

impl LiquidationStatus {
    pub fn is_liquidatable(&self) -> bool {
        matches!(self, LiquidationStatus::Liquidatable { .. })
    }

    pub fn loss(&self) -> Quote {
        match self {
            LiquidationStatus::Healthy { loss, .. } | LiquidationStatus::Liquidatable { loss, .. } => *loss,
        }
    }
}

/// Loss level at which a margin becomes liquidatable.
pub fn loss_threshold(margin: Quote, liquidation_threshold: Percent) -> Quote {
    margin.mul(liquidation_threshold.as_fraction())
}

pub fn evaluate_liquidation(
    position: &Position,
    current_price: Price,
    current_index: FundingIndex,
    liquidation_threshold: Percent,
) -> Result<LiquidationStatus, ArithmeticOverflow> {
    let net_pnl = position.net_pnl(current_price, current_index)?;
    let loss = net_pnl.negate().floor_at_zero();
    let threshold = loss_threshold(position.margin, liquidation_threshold);

    if loss >= threshold {
        Ok(LiquidationStatus::Liquidatable { loss, threshold })
    } else {
        Ok(LiquidationStatus::Healthy {
            loss,
            threshold,
            buffer: threshold.sub(loss),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationProceeds {
    pub liquidator_reward: Quote,
    pub protocol_retained: Quote,
}

// reward is rounded down so the split never pays out more than the margin
pub fn split_liquidated_margin(margin: Quote, reward_fraction: Decimal, collateral_decimals: u32) -> LiquidationProceeds {
    let liquidator_reward = margin.mul(reward_fraction).round_down(collateral_decimals).min(margin);
    LiquidationProceeds {
        liquidator_reward,
        protocol_retained: margin.sub(liquidator_reward),
    }
}
