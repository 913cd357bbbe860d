// 8.0: core accounting engine. coordinates the oracle, market registry, position
// ledger, funding and liquidation checks, and moves collateral through the ledger.
// every mutating call is all-or-nothing: validate, transfer, then commit.

mod core;
mod funding;
mod liquidations;
mod markets;
mod ownership;
mod positions;
mod pricing;
mod results;
mod shared;

pub use core::Engine;
pub use results::{CloseResult, EngineError, FundingResult, LiquidationResult};
pub use shared::SharedEngine;
