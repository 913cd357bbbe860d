//! Liquidation execution. Any caller may liquidate any position once its loss
//! reaches the market threshold.

use super::core::Engine;
use super::results::{EngineError, LiquidationResult};
use crate::collateral::CollateralLedger;
use crate::events::{CloseReason, EventPayload, PositionLiquidatedEvent};
use crate::liquidation::{evaluate_liquidation, split_liquidated_margin, LiquidationStatus};
use crate::types::Address;

impl<C: CollateralLedger> Engine<C> {
    /// Force-closes `trader`'s position. The margin is seized, `liquidator` is
    /// paid its reward out of it and the protocol keeps the rest.
    pub fn liquidate_position(
        &mut self,
        liquidator: Address,
        trader: Address,
        token: Address,
    ) -> Result<LiquidationResult, EngineError> {
        let position = self
            .positions
            .get(&(trader, token))
            .ok_or(EngineError::PositionNotFound { trader, token })?;
        let market = self.markets.get(&token).ok_or(EngineError::UnknownMarket(token))?;

        let exit_price = self.oracle.get_price(token, self.current_time)?;
        let (funding, accrual) = self.pending_funding(market);
        let status = evaluate_liquidation(
            position,
            exit_price,
            funding.index(position.side),
            market.liquidation_threshold,
        )?;

        let loss = match status {
            LiquidationStatus::Liquidatable { loss, .. } => loss,
            LiquidationStatus::Healthy { loss, threshold, .. } => {
                tracing::warn!(%liquidator, %trader, %token, %loss, %threshold, "liquidation rejected");
                return Err(EngineError::CannotLiquidate { loss, threshold });
            }
        };

        let (side, size, margin) = (position.side, position.size, position.margin);
        let proceeds = split_liquidated_margin(
            margin,
            self.config.liquidator_reward_fraction,
            self.config.collateral_decimals,
        );

        if proceeds.liquidator_reward.is_positive() {
            self.collateral
                .transfer(self.config.custody_account, liquidator, proceeds.liquidator_reward)?;
        }

        self.commit_funding(token, funding, accrual);
        if let Some(market) = self.markets.get_mut(&token) {
            market.record_close(side, size);
        }
        self.positions.remove(&(trader, token));
        self.protocol_balance = self.protocol_balance.add(proceeds.protocol_retained);

        tracing::info!(
            %liquidator,
            %trader,
            %token,
            exit = %exit_price,
            %loss,
            reward = %proceeds.liquidator_reward,
            "position liquidated"
        );
        self.emit_event(EventPayload::PositionLiquidated(PositionLiquidatedEvent {
            trader,
            token,
            liquidator,
            exit_price,
            loss,
            margin_seized: margin,
            liquidator_reward: proceeds.liquidator_reward,
            close_reason: CloseReason::Liquidation,
        }));

        Ok(LiquidationResult {
            trader,
            token,
            liquidator,
            closed_size: size,
            exit_price,
            loss,
            margin_seized: margin,
            liquidator_reward: proceeds.liquidator_reward,
            protocol_retained: proceeds.protocol_retained,
        })
    }

    /// Health of an open position at the current price, funding accrued to now.
    pub fn position_health(&self, trader: Address, token: Address) -> Result<LiquidationStatus, EngineError> {
        let position = self
            .positions
            .get(&(trader, token))
            .ok_or(EngineError::PositionNotFound { trader, token })?;
        let market = self.markets.get(&token).ok_or(EngineError::UnknownMarket(token))?;

        let price = self.oracle.get_price(token, self.current_time)?;
        let (funding, _) = self.pending_funding(market);
        Ok(evaluate_liquidation(
            position,
            price,
            funding.index(position.side),
            market.liquidation_threshold,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::core::fixtures::*;
    use super::*;
    use crate::collateral::CollateralError;
    use crate::events::EventPayload;
    use crate::types::{Quote, Side};
    use rust_decimal_macros::dec;

    fn open_long_10x(engine: &mut crate::engine::Engine) {
        engine
            .open_position(trader(), token(), Side::Long, Quote::new(dec!(1000)), 10)
            .unwrap();
    }

    #[test]
    fn healthy_position_cannot_be_liquidated() {
        let mut engine = engine();
        open_long_10x(&mut engine);
        move_price(&mut engine, -5);

        let result = engine.liquidate_position(keeper(), trader(), token());
        assert_eq!(
            result,
            Err(EngineError::CannotLiquidate {
                loss: Quote::new(dec!(500)),
                threshold: Quote::new(dec!(800)),
            })
        );
        assert!(result.unwrap_err().to_string().starts_with("Cannot liquidate"));
        assert!(engine.get_position(trader(), token()).is_some());
    }

    #[test]
    fn deep_loss_is_liquidated() {
        let mut engine = engine();
        open_long_10x(&mut engine);
        move_price(&mut engine, -50);

        let result = engine.liquidate_position(keeper(), trader(), token()).unwrap();
        assert_eq!(result.margin_seized.value(), dec!(1000));
        assert_eq!(result.liquidator_reward.value(), dec!(50));
        assert_eq!(result.protocol_retained.value(), dec!(950));

        assert!(engine.get_position(trader(), token()).is_none());
        assert!(engine.get_market(token()).unwrap().open_interest.is_zero());
        assert_eq!(engine.collateral().balance_of(keeper()).value(), dec!(50));
        assert_eq!(engine.collateral().balance_of(trader()).value(), dec!(9000));
        assert_eq!(engine.protocol_balance().value(), dec!(950));
    }

    #[test]
    fn liquidation_event_is_distinct() {
        let mut engine = engine();
        open_long_10x(&mut engine);
        move_price(&mut engine, -50);
        engine.liquidate_position(keeper(), trader(), token()).unwrap();

        match &engine.events().last().unwrap().payload {
            EventPayload::PositionLiquidated(event) => {
                assert_eq!(event.liquidator, keeper());
                assert_eq!(event.close_reason, CloseReason::Liquidation);
            }
            other => panic!("expected liquidation event, got {}", other.kind()),
        }
    }

    #[test]
    fn liquidatable_from_threshold_crossing() {
        let mut engine = engine();
        open_long_10x(&mut engine);

        // -7%: 700 loss, still healthy
        move_price(&mut engine, -7);
        let health = engine.position_health(trader(), token()).unwrap();
        assert!(!health.is_liquidatable());

        // 5.5 * 0.93 * 0.98 = 5.0127 sits below the 5.06 liquidation price
        move_price(&mut engine, -2);
        assert!(engine.position_health(trader(), token()).unwrap().is_liquidatable());
        assert!(engine.liquidate_position(keeper(), trader(), token()).is_ok());
    }

    #[test]
    fn short_liquidated_on_rally() {
        let mut engine = engine();
        engine
            .open_position(trader(), token(), Side::Short, Quote::new(dec!(1000)), 10)
            .unwrap();
        move_price(&mut engine, 9);
        assert!(engine.liquidate_position(keeper(), trader(), token()).is_ok());
    }

    #[test]
    fn missing_position_rejected() {
        let mut engine = engine();
        let result = engine.liquidate_position(keeper(), trader(), token());
        assert!(matches!(result, Err(EngineError::PositionNotFound { .. })));
    }

    #[test]
    fn failed_reward_transfer_rolls_back() {
        let mut engine = engine();
        open_long_10x(&mut engine);
        move_price(&mut engine, -50);
        let custody = engine.custody_account();
        engine.collateral_mut().freeze(custody);

        let result = engine.liquidate_position(keeper(), trader(), token());
        assert!(matches!(
            result,
            Err(EngineError::Collateral(CollateralError::TransferRejected { .. }))
        ));
        assert!(engine.get_position(trader(), token()).is_some());
        assert!(engine.protocol_balance().is_zero());
    }

    #[test]
    fn self_liquidation_allowed() {
        let mut engine = engine();
        open_long_10x(&mut engine);
        move_price(&mut engine, -50);
        let result = engine.liquidate_position(trader(), trader(), token()).unwrap();
        assert_eq!(result.liquidator, trader());
        assert_eq!(engine.collateral().balance_of(trader()).value(), dec!(9050));
    }
}
