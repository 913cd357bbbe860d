// 4.0: open position tracking. one slot per (trader, token).
// pnl = size * (current - entry) / entry, signed by side.
// 4.3 has the close settlement at the bottom.

use crate::funding::{funding_owed, FundingIndex};
use crate::types::{Address, ArithmeticOverflow, Leverage, Percent, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub trader: Address,
    pub token: Address,
    pub side: Side,
    /// Notional exposure. Always margin * leverage.
    pub size: Quote,
    pub margin: Quote,
    pub entry_price: Price,
    /// Fixed at open. Zero for a 1x long with a 100% threshold.
    pub liquidation_price: Decimal,
    pub leverage: Leverage,
    pub entry_funding: FundingIndex,
    pub opened_at: Timestamp,
    pub last_update_timestamp: Timestamp,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        trader: Address,
        token: Address,
        side: Side,
        margin: Quote,
        leverage: Leverage,
        entry_price: Price,
        liquidation_threshold: Percent,
        entry_funding: FundingIndex,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            trader,
            token,
            side,
            size: notional_size(margin, leverage),
            margin,
            entry_price,
            liquidation_price: calculate_liquidation_price(entry_price, leverage, side, liquidation_threshold),
            leverage,
            entry_funding,
            opened_at: timestamp,
            last_update_timestamp: timestamp,
        }
    }

    pub fn is_long(&self) -> bool {
        self.side.is_long()
    }

    // 4.1: paper gains/losses at the given price
    pub fn unrealized_pnl(&self, current_price: Price) -> Result<Quote, ArithmeticOverflow> {
        calculate_unrealized_pnl(self.side, self.size, self.entry_price, current_price)
    }

    pub fn pending_funding(&self, current_index: FundingIndex) -> Result<Quote, ArithmeticOverflow> {
        funding_owed(self.size, self.entry_funding, current_index)
    }

    // 4.2: pnl after funding. this vs the threshold decides liquidation
    pub fn net_pnl(&self, current_price: Price, current_index: FundingIndex) -> Result<Quote, ArithmeticOverflow> {
        self.unrealized_pnl(current_price)?
            .checked_sub(self.pending_funding(current_index)?)
            .ok_or(ArithmeticOverflow)
    }

    pub fn equity(&self, current_price: Price, current_index: FundingIndex) -> Result<Quote, ArithmeticOverflow> {
        self.margin
            .checked_add(self.net_pnl(current_price, current_index)?)
            .ok_or(ArithmeticOverflow)
    }
}

pub fn notional_size(margin: Quote, leverage: Leverage) -> Quote {
    margin.mul(leverage.as_decimal())
}

// 4.3: the pnl formula. proportional move applied to notional keeps units in collateral.
// a tiny entry price with a large move can leave Decimal's range
pub fn calculate_unrealized_pnl(
    side: Side,
    size: Quote,
    entry_price: Price,
    current_price: Price,
) -> Result<Quote, ArithmeticOverflow> {
    let move_ratio = current_price
        .value()
        .checked_sub(entry_price.value())
        .and_then(|delta| delta.checked_div(entry_price.value()))
        .ok_or(ArithmeticOverflow)?;
    size.checked_mul(move_ratio * side.sign()).ok_or(ArithmeticOverflow)
}

// 4.4: price where the loss reaches threshold% of margin.
// long: p0 * (1 - t/lev), short: p0 * (1 + t/lev)
pub fn calculate_liquidation_price(
    entry_price: Price,
    leverage: Leverage,
    side: Side,
    liquidation_threshold: Percent,
) -> Decimal {
    let adverse_move = liquidation_threshold.as_fraction() / leverage.as_decimal();
    let liq_price = match side {
        Side::Long => entry_price.value() * (Decimal::ONE - adverse_move),
        Side::Short => entry_price.value() * (Decimal::ONE + adverse_move),
    };
    liq_price.max(Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseSettlement {
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub funding_paid: Quote,
    /// What the trader gets back. Never negative.
    pub payout: Quote,
    /// margin - payout. positive when the trader lost, negative when the pool paid out profit.
    pub protocol_delta: Quote,
}

pub fn settle_close(
    position: &Position,
    exit_price: Price,
    current_index: FundingIndex,
    collateral_decimals: u32,
) -> Result<CloseSettlement, ArithmeticOverflow> {
    let realized_pnl = position.unrealized_pnl(exit_price)?;
    let funding_paid = position.pending_funding(current_index)?;
    let payout = position
        .margin
        .checked_add(realized_pnl)
        .and_then(|equity| equity.checked_sub(funding_paid))
        .ok_or(ArithmeticOverflow)?
        .floor_at_zero()
        .round_down(collateral_decimals);

    Ok(CloseSettlement {
        exit_price,
        realized_pnl,
        funding_paid,
        payout,
        protocol_delta: position.margin.sub(payout),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_position(side: Side) -> Position {
        Position::open(
            Address::from_low_u64(7),
            Address::from_low_u64(1),
            side,
            Quote::new(dec!(1000)),
            Leverage::new(10).unwrap(),
            Price::new_unchecked(dec!(5.5)),
            Percent::new(80).unwrap(),
            FundingIndex::default(),
            Timestamp::from_millis(0),
        )
    }

    #[test]
    fn size_is_margin_times_leverage() {
        let pos = test_position(Side::Long);
        assert_eq!(pos.size.value(), dec!(10000));
        assert_eq!(pos.size, notional_size(pos.margin, pos.leverage));
    }

    #[test]
    fn unrealized_pnl_long_profit() {
        let pos = test_position(Side::Long);
        let pnl = pos.unrealized_pnl(Price::new_unchecked(dec!(6.05))).unwrap(); // +10%
        assert_eq!(pnl.value(), dec!(1000));
    }

    #[test]
    fn unrealized_pnl_long_loss() {
        let pos = test_position(Side::Long);
        let pnl = pos.unrealized_pnl(Price::new_unchecked(dec!(4.95))).unwrap(); // -10%
        assert_eq!(pnl.value(), dec!(-1000));
    }

    #[test]
    fn unrealized_pnl_short_profit() {
        let pos = test_position(Side::Short);
        let pnl = pos.unrealized_pnl(Price::new_unchecked(dec!(4.95))).unwrap();
        assert_eq!(pnl.value(), dec!(1000));
    }

    #[test]
    fn pnl_zero_at_entry() {
        let pos = test_position(Side::Short);
        assert!(pos.unrealized_pnl(pos.entry_price).unwrap().is_zero());
    }

    #[test]
    fn liquidation_price_long_and_short() {
        let long = test_position(Side::Long);
        // 5.5 * (1 - 0.8 / 10)
        assert_eq!(long.liquidation_price, dec!(5.06));

        let short = test_position(Side::Short);
        assert_eq!(short.liquidation_price, dec!(5.94));
    }

    #[test]
    fn liquidation_price_never_negative() {
        let price = calculate_liquidation_price(
            Price::new_unchecked(dec!(2)),
            Leverage::new(1).unwrap(),
            Side::Long,
            Percent::new(100).unwrap(),
        );
        assert_eq!(price, Decimal::ZERO);
    }

    #[test]
    fn equity_with_funding() {
        let pos = test_position(Side::Long);
        let index = FundingIndex {
            paid: dec!(0.001),
            received: Decimal::ZERO,
        };
        // 10000 * 0.001 owed
        assert_eq!(pos.pending_funding(index).unwrap().value(), dec!(10));
        let equity = pos.equity(Price::new_unchecked(dec!(6.05)), index).unwrap();
        assert_eq!(equity.value(), dec!(1990));
    }

    #[test]
    fn close_at_entry_returns_margin() {
        let pos = test_position(Side::Long);
        let settlement = settle_close(&pos, pos.entry_price, FundingIndex::default(), 6).unwrap();
        assert_eq!(settlement.payout, pos.margin);
        assert!(settlement.protocol_delta.is_zero());
    }

    #[test]
    fn close_payout_floored_at_zero() {
        let pos = test_position(Side::Long);
        // -50% on 10x is a 5000 loss against 1000 margin
        let settlement = settle_close(&pos, Price::new_unchecked(dec!(2.75)), FundingIndex::default(), 6).unwrap();
        assert_eq!(settlement.realized_pnl.value(), dec!(-5000));
        assert!(settlement.payout.is_zero());
        assert_eq!(settlement.protocol_delta.value(), dec!(1000));
    }

    #[test]
    fn close_payout_rounds_down_to_collateral_precision() {
        let pos = test_position(Side::Long);
        // 10000 * (5.51 - 5.5) / 5.5 = 18.1818...
        let settlement = settle_close(&pos, Price::new_unchecked(dec!(5.51)), FundingIndex::default(), 6).unwrap();
        assert_eq!(settlement.payout.value(), dec!(1018.181818));
        assert_eq!(settlement.protocol_delta.value(), dec!(-18.181818));
    }

    #[test]
    fn pnl_beyond_decimal_range_is_an_error() {
        // 1e-18 entry, 1e5 exit: the move ratio alone is 1e23
        let pos = Position::open(
            Address::from_low_u64(7),
            Address::from_low_u64(1),
            Side::Long,
            Quote::new(dec!(10000)),
            Leverage::new(100).unwrap(),
            Price::new_unchecked(dec!(0.000000000000000001)),
            Percent::new(80).unwrap(),
            FundingIndex::default(),
            Timestamp::from_millis(0),
        );
        let exit = Price::new_unchecked(dec!(100000));

        assert_eq!(pos.unrealized_pnl(exit), Err(ArithmeticOverflow));
        assert_eq!(pos.net_pnl(exit, FundingIndex::default()), Err(ArithmeticOverflow));
        assert_eq!(settle_close(&pos, exit, FundingIndex::default(), 6), Err(ArithmeticOverflow));
        assert!(pos.unrealized_pnl(pos.entry_price).unwrap().is_zero());
    }
}
