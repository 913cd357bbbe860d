// 9.2 collateral.rs: the external fungible ledger the engine moves margin through.
// USDC-like: 6 decimals, all-or-nothing transfers. the engine only talks to the
// CollateralLedger trait. InMemoryCollateral backs tests and the sim binary.

use crate::types::{Address, Quote};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollateralError {
    #[error("Insufficient collateral: {owner} has {available}, needs {requested}")]
    InsufficientCollateral {
        owner: Address,
        requested: Quote,
        available: Quote,
    },

    #[error("Transfer from {from} to {to} rejected by collateral ledger")]
    TransferRejected { from: Address, to: Address },

    #[error("Invalid transfer amount {0}")]
    InvalidAmount(Quote),
}

/// Fungible asset ledger. A failed transfer must leave every balance untouched.
pub trait CollateralLedger: fmt::Debug + Send + Sync {
    fn decimals(&self) -> u32;

    fn balance_of(&self, owner: Address) -> Quote;

    fn transfer(&mut self, from: Address, to: Address, amount: Quote) -> Result<(), CollateralError>;
}

// a completed transfer, kept for reconciliation in tests and the sim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub from: Address,
    pub to: Address,
    pub amount: Quote,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCollateral {
    decimals: u32,
    balances: HashMap<Address, Quote>,
    // accounts whose outgoing transfers fail, e.g. a blacklisted holder
    frozen: HashSet<Address>,
    history: Vec<TransferRecord>,
}

impl InMemoryCollateral {
    pub fn new(decimals: u32) -> Self {
        Self {
            decimals,
            ..Self::default()
        }
    }

    pub fn usdc() -> Self {
        Self::new(crate::config::COLLATERAL_DECIMALS)
    }

    /// Credits fresh collateral. Amounts are truncated to ledger precision.
    pub fn mint(&mut self, to: Address, amount: Quote) -> Result<(), CollateralError> {
        if amount.is_negative() {
            return Err(CollateralError::InvalidAmount(amount));
        }
        let amount = amount.round_down(self.decimals);
        let balance = self.balances.entry(to).or_default();
        *balance = balance.add(amount);
        Ok(())
    }

    pub fn freeze(&mut self, owner: Address) {
        self.frozen.insert(owner);
    }

    pub fn unfreeze(&mut self, owner: Address) {
        self.frozen.remove(&owner);
    }

    pub fn total_supply(&self) -> Quote {
        self.balances.values().sum()
    }

    pub fn history(&self) -> &[TransferRecord] {
        &self.history
    }
}

impl CollateralLedger for InMemoryCollateral {
    fn decimals(&self) -> u32 {
        self.decimals
    }

    fn balance_of(&self, owner: Address) -> Quote {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    fn transfer(&mut self, from: Address, to: Address, amount: Quote) -> Result<(), CollateralError> {
        if amount.is_negative() || amount.round_down(self.decimals) != amount {
            return Err(CollateralError::InvalidAmount(amount));
        }
        if self.frozen.contains(&from) {
            return Err(CollateralError::TransferRejected { from, to });
        }

        let available = self.balance_of(from);
        if available < amount {
            return Err(CollateralError::InsufficientCollateral {
                owner: from,
                requested: amount,
                available,
            });
        }

        if amount.is_zero() {
            return Ok(());
        }

        self.balances.insert(from, available.sub(amount));
        let to_balance = self.balances.entry(to).or_default();
        *to_balance = to_balance.add(amount);
        self.history.push(TransferRecord { from, to, amount });
        Ok(())
    }
}
