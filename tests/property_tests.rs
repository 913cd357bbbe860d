//! Property-based tests for the position accounting engine.
//!
//! Uses proptest to check sizing, pnl and liquidation rules across random
//! margins, leverages and price moves.

use perps_ledger::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn owner() -> Address {
    Address::from_low_u64(0x0a)
}

fn token() -> Address {
    Address::from_low_u64(0xa1)
}

fn trader() -> Address {
    Address::from_low_u64(0xb0b)
}

fn keeper() -> Address {
    Address::from_low_u64(0x11c)
}

fn setup(entry: Decimal, liquidation_threshold: u32) -> Engine {
    let mut engine = Engine::new(EngineConfig::without_funding(), owner(), InMemoryCollateral::usdc()).unwrap();
    engine.set_time(Timestamp::from_secs(1_700_000_000));
    engine
        .add_supported_token(owner(), token(), Price::new_unchecked(entry), 18)
        .unwrap();
    engine
        .create_market(
            owner(),
            MarketParams::new(token(), 100, liquidation_threshold, Quote::new(dec!(0.05))),
        )
        .unwrap();
    let custody = engine.custody_account();
    engine.collateral_mut().mint(custody, Quote::new(dec!(1_000_000))).unwrap();
    engine.collateral_mut().mint(trader(), Quote::new(dec!(10000))).unwrap();
    engine
}

fn move_price(engine: &mut Engine, percent: i64) {
    let current = engine.oracle().last_recorded(token()).unwrap().price;
    engine
        .update_price(owner(), token(), current.percent_move(percent).unwrap())
        .unwrap();
}

// prices the deployment listed; a whole-percent move of any of them is exact
fn entry_price_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![Just(dec!(5.5)), Just(dec!(3.75)), Just(dec!(2.25)), Just(dec!(1.5))]
}

fn margin_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000).prop_map(Decimal::from)
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

proptest! {
    /// Notional is always margin * leverage.
    #[test]
    fn size_is_margin_times_leverage(
        margin in margin_strategy(),
        leverage in 1u32..=100,
        side in side_strategy(),
    ) {
        let mut engine = setup(dec!(5.5), 80);
        let position = engine
            .open_position(trader(), token(), side, Quote::new(margin), leverage)
            .unwrap();

        prop_assert_eq!(position.size.value(), margin * Decimal::from(leverage));
        prop_assert_eq!(position.margin.value(), margin);
        prop_assert_eq!(position.leverage.value(), leverage);
    }

    /// Closing at the entry price returns exactly the margin.
    #[test]
    fn round_trip_at_entry_price_returns_margin(
        entry in entry_price_strategy(),
        margin in margin_strategy(),
        leverage in 1u32..=100,
        side in side_strategy(),
    ) {
        let mut engine = setup(entry, 80);
        let before = engine.collateral().balance_of(trader());

        engine
            .open_position(trader(), token(), side, Quote::new(margin), leverage)
            .unwrap();
        let result = engine.close_position(trader(), token()).unwrap();

        prop_assert!(result.realized_pnl.is_zero());
        prop_assert_eq!(result.payout.value(), margin);
        prop_assert_eq!(engine.collateral().balance_of(trader()), before);
        prop_assert!(engine.protocol_balance().is_zero());
    }

    /// A favourable move is profit, an adverse one is loss, whatever the side.
    #[test]
    fn pnl_sign_follows_direction(
        entry in entry_price_strategy(),
        margin in margin_strategy(),
        leverage in 1u32..=100,
        side in side_strategy(),
        percent in 1i64..=50,
    ) {
        let mut engine = setup(entry, 80);
        engine
            .open_position(trader(), token(), side, Quote::new(margin), leverage)
            .unwrap();

        let favourable = if side.is_long() { percent } else { -percent };
        move_price(&mut engine, favourable);
        let pnl = engine.get_unrealized_pnl(trader(), token()).unwrap();
        prop_assert!(pnl.is_positive());

        let expected = margin * Decimal::from(leverage) * Decimal::from(percent) / dec!(100);
        prop_assert_eq!(pnl.value(), expected);
    }

    /// Liquidatable exactly when leverage * adverse% reaches the threshold.
    #[test]
    fn liquidation_matches_threshold(
        entry in entry_price_strategy(),
        margin in margin_strategy(),
        leverage in 1u32..=100,
        threshold in 1u32..=100,
        side in side_strategy(),
        percent in 0i64..=99,
    ) {
        let mut engine = setup(entry, threshold);
        engine
            .open_position(trader(), token(), side, Quote::new(margin), leverage)
            .unwrap();

        let adverse = if side.is_long() { -percent } else { percent };
        move_price(&mut engine, adverse);

        let expected = i64::from(leverage) * percent >= i64::from(threshold);
        let health = engine.position_health(trader(), token()).unwrap();
        prop_assert_eq!(health.is_liquidatable(), expected);

        let liquidated = engine.liquidate_position(keeper(), trader(), token());
        prop_assert_eq!(liquidated.is_ok(), expected);
        prop_assert_eq!(engine.get_position(trader(), token()).is_none(), expected);
    }

    /// Once liquidatable, a further adverse move keeps it liquidatable.
    #[test]
    fn liquidation_is_monotonic(
        margin in margin_strategy(),
        leverage in 2u32..=100,
        side in side_strategy(),
        first in 0i64..=49,
        further in 0i64..=49,
    ) {
        let mut engine = setup(dec!(5.5), 80);
        engine
            .open_position(trader(), token(), side, Quote::new(margin), leverage)
            .unwrap();

        let direction = if side.is_long() { -1 } else { 1 };
        move_price(&mut engine, direction * first);
        let before = engine.position_health(trader(), token()).unwrap();
        move_price(&mut engine, direction * further);
        let after = engine.position_health(trader(), token()).unwrap();

        prop_assert!(after.loss() >= before.loss());
        if before.is_liquidatable() {
            prop_assert!(after.is_liquidatable());
        }
    }

    /// The stored liquidation price sits on the adverse side of entry.
    #[test]
    fn liquidation_price_is_adverse(
        entry in entry_price_strategy(),
        leverage in 1u32..=100,
        threshold in 1u32..=100,
        side in side_strategy(),
    ) {
        let mut engine = setup(entry, threshold);
        let position = engine
            .open_position(trader(), token(), side, Quote::new(dec!(100)), leverage)
            .unwrap();

        prop_assert!(position.liquidation_price >= Decimal::ZERO);
        match side {
            Side::Long => {
                prop_assert!(position.liquidation_price < entry);
            }
            Side::Short => {
                prop_assert!(position.liquidation_price > entry);
            }
        }
    }

    /// Leverage outside [1, max] never opens a position or moves collateral.
    #[test]
    fn invalid_leverage_rejected(leverage in prop_oneof![Just(0u32), 101u32..10_000]) {
        let mut engine = setup(dec!(5.5), 80);
        let result = engine.open_position(trader(), token(), Side::Long, Quote::new(dec!(1000)), leverage);

        let rejected = matches!(result, Err(EngineError::Market(MarketError::InvalidLeverage { .. })));
        prop_assert!(rejected);
        prop_assert!(engine.get_position(trader(), token()).is_none());
        prop_assert_eq!(engine.collateral().balance_of(trader()).value(), dec!(10000));
    }
}
