//! Perpetual position ledger simulation.
//!
//! Replays the testnet deployment (four tokens, one market each, funded
//! custody), then runs the open / close / liquidate lifecycle and a
//! deterministic oracle walk with a keeper sweeping for liquidations.
//!
//! Usage: `perps-sim [config.toml]`. Log level via `RUST_LOG`.

use perps_ledger::*;
use rust_decimal_macros::dec;
use std::error::Error;
use tracing_subscriber::EnvFilter;

const E18: u128 = 1_000_000_000_000_000_000;
const USDC: u128 = 1_000_000;

// step between oracle updates, as the deployment's price bot did
const ORACLE_INTERVAL_MS: i64 = 15_000;
const MAX_MOVE_PERCENT: i64 = 20;
const WALK_STEPS: usize = 40;

struct Deployment {
    engine: Engine,
    owner: Address,
    keeper: Address,
    tokens: Vec<(&'static str, Address)>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            tracing::info!(%path, "loaded config");
            EngineConfig::from_toml_str(&text)?
        }
        None => EngineConfig::testnet(),
    };

    println!("Perpetual Position Ledger Simulation\n");

    let mut deployment = deploy(config)?;
    scenario_1_lifecycle(&mut deployment)?;
    scenario_2_liquidation(&mut deployment)?;
    scenario_3_oracle_walk(&mut deployment)?;
    summary(&deployment);

    println!("\nAll simulations completed successfully.");
    Ok(())
}

/// Owner lists the tokens and markets, custody gets pool liquidity.
fn deploy(config: EngineConfig) -> Result<Deployment, Box<dyn Error>> {
    let owner = Address::from_low_u64(0xde91_0e);
    let keeper = Address::from_low_u64(0x6ee9_e6);
    let mut engine = Engine::new(config, owner, InMemoryCollateral::usdc())?;
    engine.set_time(Timestamp::from_secs(1_700_000_000));

    let listings = [
        ("AIT1", 0xa1u64, 550u128),
        ("AIT2", 0xa2, 375),
        ("AIT3", 0xa3, 225),
        ("AIT4", 0xa4, 150),
    ];

    let mut tokens = Vec::new();
    for (symbol, id, cents) in listings {
        let token = Address::from_low_u64(id);
        engine.execute(
            owner,
            EngineCommand::AddSupportedToken {
                token,
                initial_price: cents * E18 / 100,
                decimals: 18,
            },
        )?;
        engine.execute(
            owner,
            EngineCommand::CreateMarket {
                token,
                max_leverage: 100,
                liquidation_threshold: 80,
                // 0.05 USDC
                min_position_size: 50_000,
                max_position_size: None,
            },
        )?;
        tracing::info!(symbol, %token, "listed");
        tokens.push((symbol, token));
    }

    let custody = engine.custody_account();
    engine.collateral_mut().mint(custody, Quote::new(dec!(1_000_000)))?;

    println!("  Deployed {} markets, custody {} funded\n", tokens.len(), custody);
    Ok(Deployment {
        engine,
        owner,
        keeper,
        tokens,
    })
}

fn fund_trader(engine: &mut Engine, id: u64) -> Result<Address, CollateralError> {
    let trader = Address::from_low_u64(id);
    engine.collateral_mut().mint(trader, Quote::new(dec!(10000)))?;
    Ok(trader)
}

fn set_price_percent(d: &mut Deployment, token: Address, percent: i64) -> Result<Price, Box<dyn Error>> {
    let current = d
        .engine
        .oracle()
        .last_recorded(token)
        .ok_or(OracleError::UnknownToken(token))?
        .price;
    let next = current.percent_move(percent).ok_or(OracleError::InvalidPrice(token))?;
    d.engine.update_price(d.owner, token, next)?;
    Ok(next)
}

/// Open 1000 USDC at 10x, price up 10%, close in profit.
fn scenario_1_lifecycle(d: &mut Deployment) -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Open, Move, Close\n");

    let (_, token) = d.tokens[0];
    let trader = fund_trader(&mut d.engine, 0x7001)?;

    d.engine.execute(
        trader,
        EngineCommand::OpenPosition {
            token,
            is_long: true,
            margin: 1000 * USDC,
            leverage: 10,
        },
    )?;
    if let Some(position) = d.engine.get_position(trader, token) {
        println!(
            "  Long {} notional @ {}, liquidation at {}",
            position.size, position.entry_price, position.liquidation_price
        );
    }

    d.engine.advance_time(ORACLE_INTERVAL_MS);
    let price = set_price_percent(d, token, 10)?;
    let pnl = d.engine.get_unrealized_pnl(trader, token)?;
    println!("  Price -> {}, unrealized pnl {}", price, pnl);

    let result = d.engine.close_position(trader, token)?;
    println!(
        "  Closed: payout {}, trader balance {}\n",
        result.payout,
        d.engine.collateral().balance_of(trader)
    );
    Ok(())
}

/// Small adverse move is rejected, a 50% drop gets liquidated.
fn scenario_2_liquidation(d: &mut Deployment) -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Liquidation\n");

    let (_, token) = d.tokens[1];
    let trader = fund_trader(&mut d.engine, 0x7002)?;
    d.engine.open_position(trader, token, Side::Long, Quote::new(dec!(1000)), 10)?;

    d.engine.advance_time(ORACLE_INTERVAL_MS);
    set_price_percent(d, token, -5)?;
    match d.engine.liquidate_position(d.keeper, trader, token) {
        Err(err) => println!("  -5%: {}", ApiError::from(err).reason()),
        Ok(_) => println!("  -5%: unexpectedly liquidated"),
    }

    d.engine.advance_time(ORACLE_INTERVAL_MS);
    set_price_percent(d, token, -50)?;
    let result = d.engine.liquidate_position(d.keeper, trader, token)?;
    println!(
        "  -50% more: liquidated, margin {} seized, keeper reward {}\n",
        result.margin_seized, result.liquidator_reward
    );
    Ok(())
}

// xorshift64. deterministic so runs are reproducible
struct Walk(u64);

impl Walk {
    fn next_percent(&mut self) -> i64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x % (2 * MAX_MOVE_PERCENT as u64 + 1)) as i64 - MAX_MOVE_PERCENT
    }
}

/// Oracle bot walks every price up to +/-20% per step. Traders hold positions
/// across all markets and a keeper sweeps for liquidations after each step.
fn scenario_3_oracle_walk(d: &mut Deployment) -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Oracle Walk ({} steps)\n", WALK_STEPS);

    let mut traders = Vec::new();
    for (i, (_, token)) in d.tokens.clone().into_iter().enumerate() {
        for (j, leverage) in [2u32, 5].into_iter().enumerate() {
            let trader = fund_trader(&mut d.engine, 0x8000 + (i * 2 + j) as u64)?;
            let side = if j == 0 { Side::Long } else { Side::Short };
            d.engine.open_position(trader, token, side, Quote::new(dec!(500)), leverage)?;
            traders.push((trader, token));
        }
    }

    let mut walk = Walk(0x9e37_79b9_7f4a_7c15);
    let mut liquidations = 0usize;

    for _ in 0..WALK_STEPS {
        d.engine.advance_time(ORACLE_INTERVAL_MS);
        for (_, token) in d.tokens.clone() {
            let percent = walk.next_percent();
            set_price_percent(d, token, percent)?;
            d.engine.accrue_funding(token)?;
        }

        for &(trader, token) in &traders {
            if d.engine.get_position(trader, token).is_none() {
                continue;
            }
            if d.engine.position_health(trader, token)?.is_liquidatable() {
                d.engine.liquidate_position(d.keeper, trader, token)?;
                liquidations += 1;
            }
        }
    }

    let mut closed = 0usize;
    for &(trader, token) in &traders {
        if d.engine.get_position(trader, token).is_some() {
            d.engine.close_position(trader, token)?;
            closed += 1;
        }
    }

    println!("  {} liquidated during the walk, {} closed at the end\n", liquidations, closed);
    Ok(())
}

fn summary(d: &Deployment) {
    let engine = &d.engine;
    println!("Summary\n");
    for (symbol, token) in &d.tokens {
        if let Some(market) = engine.get_market(*token) {
            let price = engine
                .oracle()
                .last_recorded(*token)
                .map(|data| data.price.to_string())
                .unwrap_or_default();
            println!(
                "  {}: price {}, open interest {}, funding rate {}",
                symbol, price, market.open_interest, market.funding_rate
            );
        }
    }
    println!("  Protocol balance: {}", engine.protocol_balance());
    println!("  Custody balance: {}", engine.collateral().balance_of(engine.custody_account()));
    println!("  Keeper rewards: {}", engine.collateral().balance_of(d.keeper));
    println!("  Events recorded: {}", engine.events().len());
    println!("  Clock: {}", engine.time().to_rfc3339());
}
