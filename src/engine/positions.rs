//! Position ledger: open and close, plus the read side.
//!
//! Each mutating call works on owned copies until the collateral transfer has
//! gone through, then commits market counters, funding state and the position
//! slot together. A failed transfer leaves the engine exactly as it was.

use super::core::Engine;
use super::results::{CloseResult, EngineError};
use crate::collateral::CollateralLedger;
use crate::events::{CloseReason, EventPayload, PositionClosedEvent, PositionOpenedEvent};
use crate::position::{notional_size, settle_close, Position};
use crate::types::{Address, Quote, Side};

impl<C: CollateralLedger> Engine<C> {
    /// Opens a position at the current oracle price, pulling `margin` into custody.
    pub fn open_position(
        &mut self,
        trader: Address,
        token: Address,
        side: Side,
        margin: Quote,
        leverage: u32,
    ) -> Result<Position, EngineError> {
        let market = self.markets.get(&token).ok_or(EngineError::UnknownMarket(token))?;
        if !market.is_active {
            return Err(EngineError::MarketInactive(token));
        }

        let leverage = market.validate_leverage(leverage)?;
        if !margin.is_positive() || margin.round_down(self.config.collateral_decimals) != margin {
            return Err(EngineError::InvalidMargin(margin));
        }
        if self.positions.contains_key(&(trader, token)) {
            return Err(EngineError::PositionAlreadyOpen { trader, token });
        }

        let size = notional_size(margin, leverage);
        market.validate_size(size)?;

        let entry_price = self.oracle.get_price(token, self.current_time)?;
        let (funding, accrual) = self.pending_funding(market);
        let position = Position::open(
            trader,
            token,
            side,
            margin,
            leverage,
            entry_price,
            market.liquidation_threshold,
            funding.index(side),
            self.current_time,
        );

        // last fallible step
        self.collateral.transfer(trader, self.config.custody_account, margin)?;

        self.commit_funding(token, funding, accrual);
        if let Some(market) = self.markets.get_mut(&token) {
            market.record_open(side, size);
        }
        self.positions.insert((trader, token), position.clone());

        tracing::info!(
            %trader,
            %token,
            ?side,
            %margin,
            %leverage,
            %size,
            entry = %entry_price,
            liquidation = %position.liquidation_price,
            "position opened"
        );
        self.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
            trader,
            token,
            side,
            size,
            margin,
            leverage,
            entry_price,
            liquidation_price: position.liquidation_price,
        }));

        Ok(position)
    }

    /// Closes the caller's position at the current price and pays out
    /// `max(0, margin + pnl - funding)`.
    pub fn close_position(&mut self, trader: Address, token: Address) -> Result<CloseResult, EngineError> {
        let position = self
            .positions
            .get(&(trader, token))
            .ok_or(EngineError::PositionNotFound { trader, token })?;
        let market = self.markets.get(&token).ok_or(EngineError::UnknownMarket(token))?;

        let exit_price = self.oracle.get_price(token, self.current_time)?;
        let (funding, accrual) = self.pending_funding(market);
        let settlement = settle_close(
            position,
            exit_price,
            funding.index(position.side),
            self.config.collateral_decimals,
        )?;
        let (side, size) = (position.side, position.size);

        if settlement.payout.is_positive() {
            self.collateral
                .transfer(self.config.custody_account, trader, settlement.payout)?;
        }

        self.commit_funding(token, funding, accrual);
        if let Some(market) = self.markets.get_mut(&token) {
            market.record_close(side, size);
        }
        self.positions.remove(&(trader, token));
        self.protocol_balance = self.protocol_balance.add(settlement.protocol_delta);

        tracing::info!(
            %trader,
            %token,
            exit = %exit_price,
            pnl = %settlement.realized_pnl,
            funding = %settlement.funding_paid,
            payout = %settlement.payout,
            "position closed"
        );
        self.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
            trader,
            token,
            exit_price,
            realized_pnl: settlement.realized_pnl,
            funding_paid: settlement.funding_paid,
            collateral_returned: settlement.payout,
            close_reason: CloseReason::UserClosed,
        }));

        Ok(CloseResult {
            trader,
            token,
            side,
            closed_size: size,
            exit_price,
            realized_pnl: settlement.realized_pnl,
            funding_paid: settlement.funding_paid,
            payout: settlement.payout,
        })
    }

    pub fn get_position(&self, trader: Address, token: Address) -> Option<&Position> {
        self.positions.get(&(trader, token))
    }

    /// All open positions for a trader, ordered by token.
    pub fn positions_of(&self, trader: Address) -> Vec<&Position> {
        let mut positions: Vec<&Position> = self.positions.values().filter(|p| p.trader == trader).collect();
        positions.sort_by_key(|p| p.token);
        positions
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Signed price pnl at the current oracle price. Funding is not included.
    pub fn get_unrealized_pnl(&self, trader: Address, token: Address) -> Result<Quote, EngineError> {
        let position = self
            .positions
            .get(&(trader, token))
            .ok_or(EngineError::PositionNotFound { trader, token })?;
        let price = self.oracle.get_price(token, self.current_time)?;
        Ok(position.unrealized_pnl(price)?)
    }
}
