//! Funding accrual. Runs ahead of every open, close and liquidation on a
//! market, and on demand through `accrue_funding` for keepers.

use super::core::Engine;
use super::results::{EngineError, FundingResult};
use crate::collateral::CollateralLedger;
use crate::events::{EventPayload, FundingAccruedEvent};
use crate::funding::{FundingAccrual, FundingState};
use crate::types::Address;

impl<C: CollateralLedger> Engine<C> {
    /// Brings the market's funding indices up to the engine clock.
    pub fn accrue_funding(&mut self, token: Address) -> Result<FundingResult, EngineError> {
        let market = self.markets.get(&token).ok_or(EngineError::UnknownMarket(token))?;
        let (funding, accrual) = self.pending_funding(market);

        let result = FundingResult {
            token,
            funding_rate: accrual.rate,
            hours: accrual.hours,
            paying_side: accrual.paying_side,
            long_index: funding.long_index,
            short_index: funding.short_index,
        };
        self.commit_funding(token, funding, accrual);
        Ok(result)
    }

    pub(super) fn commit_funding(&mut self, token: Address, funding: FundingState, accrual: FundingAccrual) {
        let Some(market) = self.markets.get_mut(&token) else {
            return;
        };
        market.apply_funding(funding);

        let Some(paying_side) = accrual.paying_side else {
            return;
        };
        tracing::debug!(
            %token,
            rate = %accrual.rate,
            hours = %accrual.hours,
            ?paying_side,
            "funding accrued"
        );
        self.emit_event(EventPayload::FundingAccrued(FundingAccruedEvent {
            token,
            funding_rate: accrual.rate,
            hours: accrual.hours,
            paying_side,
            paid_per_unit: accrual.paid_per_unit,
        }));
    }
}
