// 11.0: every state change produces an event. used for audit trails and for
// telling closes apart from liquidations. the EventPayload enum lists all event types.

use crate::types::{Address, Leverage, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Oracle events
    TokenSupported(TokenSupportedEvent),
    PriceUpdated(PriceUpdatedEvent),

    // Market events
    MarketCreated(MarketCreatedEvent),
    FundingAccrued(FundingAccruedEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),
    PositionLiquidated(PositionLiquidatedEvent),

    // Admin events
    OwnershipTransferred(OwnershipTransferredEvent),
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::TokenSupported(_) => "TokenSupported",
            EventPayload::PriceUpdated(_) => "PriceUpdated",
            EventPayload::MarketCreated(_) => "MarketCreated",
            EventPayload::FundingAccrued(_) => "FundingAccrued",
            EventPayload::PositionOpened(_) => "PositionOpened",
            EventPayload::PositionClosed(_) => "PositionClosed",
            EventPayload::PositionLiquidated(_) => "PositionLiquidated",
            EventPayload::OwnershipTransferred(_) => "OwnershipTransferred",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSupportedEvent {
    pub token: Address,
    pub initial_price: Price,
    pub decimals: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdatedEvent {
    pub token: Address,
    pub old_price: Price,
    pub new_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketCreatedEvent {
    pub token: Address,
    pub max_leverage: Leverage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingAccruedEvent {
    pub token: Address,
    pub funding_rate: Decimal,
    pub hours: Decimal,
    pub paying_side: Side,
    pub paid_per_unit: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub trader: Address,
    pub token: Address,
    pub side: Side,
    pub size: Quote,
    pub margin: Quote,
    pub leverage: Leverage,
    pub entry_price: Price,
    pub liquidation_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub trader: Address,
    pub token: Address,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub funding_paid: Quote,
    pub collateral_returned: Quote,
    pub close_reason: CloseReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLiquidatedEvent {
    pub trader: Address,
    pub token: Address,
    pub liquidator: Address,
    pub exit_price: Price,
    pub loss: Quote,
    pub margin_seized: Quote,
    pub liquidator_reward: Quote,
    pub close_reason: CloseReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    UserClosed,
    Liquidation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipTransferredEvent {
    pub previous_owner: Address,
    pub new_owner: Address,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn liquidation_is_distinct_from_close() {
        let closed = EventPayload::PositionClosed(PositionClosedEvent {
            trader: Address::from_low_u64(1),
            token: Address::from_low_u64(2),
            exit_price: Price::new_unchecked(dec!(5.5)),
            realized_pnl: Quote::zero(),
            funding_paid: Quote::zero(),
            collateral_returned: Quote::new(dec!(1000)),
            close_reason: CloseReason::UserClosed,
        });
        let liquidated = EventPayload::PositionLiquidated(PositionLiquidatedEvent {
            trader: Address::from_low_u64(1),
            token: Address::from_low_u64(2),
            liquidator: Address::from_low_u64(3),
            exit_price: Price::new_unchecked(dec!(2.75)),
            loss: Quote::new(dec!(5000)),
            margin_seized: Quote::new(dec!(1000)),
            liquidator_reward: Quote::new(dec!(50)),
            close_reason: CloseReason::Liquidation,
        });

        assert_eq!(closed.kind(), "PositionClosed");
        assert_eq!(liquidated.kind(), "PositionLiquidated");
    }

    #[test]
    fn event_serializes_with_payload_tag() {
        let event = Event::new(
            EventId(7),
            Timestamp::from_secs(1),
            EventPayload::OwnershipTransferred(OwnershipTransferredEvent {
                previous_owner: Address::ZERO,
                new_owner: Address::from_low_u64(9),
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("OwnershipTransferred"));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, EventId(7));
    }
}
