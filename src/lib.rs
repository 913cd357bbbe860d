// perps-ledger: perpetual position accounting engine.
// margin, pnl and liquidation bookkeeping for isolated single-slot positions.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Address, Side, Price, Quote, Leverage, Percent, Timestamp
//   2.x  fixed.rs: fixed-point integer <-> Decimal boundary
//   3.x  market.rs: market params, counters, leverage/size validation
//   4.x  position.rs: position struct, pnl, liquidation price, close settlement
//   5.x  funding.rs: funding strategies, paid/received index accrual
//   6.x  liquidation.rs: eligibility, liquidator reward split
//   7.x  config.rs: protocol constants, engine settings, env presets, TOML
//   8.x  engine/: core engine: ownership, pricing, markets, positions, funding, liquidations
//   9.x  oracle.rs: latest price per token with staleness
//   9.2  collateral.rs: collateral ledger trait + in-memory USDC-like ledger
//   11.x events.rs: state transition events for audit
//   12.x api.rs: fixed-point command/query surface and error codes

// core accounting modules
pub mod engine;
pub mod events;
pub mod fixed;
pub mod funding;
pub mod liquidation;
pub mod market;
pub mod position;
pub mod types;

// integration modules
pub mod api;
pub mod collateral;
pub mod config;
pub mod oracle;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use funding::*;
pub use liquidation::*;
pub use market::*;
pub use position::*;
pub use types::*;
pub use api::{ApiError, ApiResponse, EngineCommand, EngineQuery, ErrorCode};
pub use collateral::{CollateralError, CollateralLedger, InMemoryCollateral};
pub use config::{ConfigError, EngineConfig, Environment};
pub use oracle::{OracleError, PriceData, PriceOracle};
