// 9.0 oracle.rs: latest price per token with staleness and decimals metadata.
// leaf dependency. reads are open, writes go through the engine's owner check.

use crate::types::{Address, Price, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Latest price entry for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceData {
    pub price: Price,
    pub timestamp: Timestamp,
    /// Fixed-point precision callers use when encoding this price.
    pub decimals: u32,
}

impl PriceData {
    pub fn age_secs(&self, now: Timestamp) -> i64 {
        (now.as_millis() - self.timestamp.as_millis()).div_euclid(1000)
    }

    pub fn is_stale(&self, now: Timestamp, max_age_secs: i64) -> bool {
        now.as_millis() - self.timestamp.as_millis() > max_age_secs.saturating_mul(1000)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Token {0} is not supported by the oracle")]
    UnknownToken(Address),

    #[error("Token {0} is already supported")]
    TokenAlreadySupported(Address),

    #[error("Price too old: {token} last updated {age_secs}s ago (max {max_age_secs}s)")]
    PriceStale {
        token: Address,
        age_secs: i64,
        max_age_secs: i64,
    },

    #[error("Invalid price for token {0}")]
    InvalidPrice(Address),

    #[error("Unsupported price precision: {0} decimals")]
    InvalidDecimals(u32),
}

/// In-engine oracle: one slot per token, overwritten on every update.
#[derive(Debug, Clone)]
pub struct PriceOracle {
    feeds: HashMap<Address, PriceData>,
    max_age_secs: i64,
}

impl PriceOracle {
    pub fn new(max_age_secs: i64) -> Self {
        Self {
            feeds: HashMap::new(),
            max_age_secs,
        }
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    /// Registers a token once with its starting price.
    pub fn add_supported_token(
        &mut self,
        token: Address,
        initial_price: Price,
        decimals: u32,
        now: Timestamp,
    ) -> Result<(), OracleError> {
        if self.feeds.contains_key(&token) {
            return Err(OracleError::TokenAlreadySupported(token));
        }
        if decimals > crate::fixed::MAX_DECIMALS {
            return Err(OracleError::InvalidDecimals(decimals));
        }
        self.feeds.insert(
            token,
            PriceData {
                price: initial_price,
                timestamp: now,
                decimals,
            },
        );
        Ok(())
    }

    /// Overwrites price and timestamp. Returns the previous entry.
    pub fn update_price(
        &mut self,
        token: Address,
        new_price: Price,
        now: Timestamp,
    ) -> Result<PriceData, OracleError> {
        let entry = self
            .feeds
            .get_mut(&token)
            .ok_or(OracleError::UnknownToken(token))?;
        let previous = *entry;
        entry.price = new_price;
        entry.timestamp = now;
        Ok(previous)
    }

    pub fn get_price(&self, token: Address, now: Timestamp) -> Result<Price, OracleError> {
        self.get_latest_price_data(token, now).map(|data| data.price)
    }

    /// Latest entry, rejected outright when older than the configured max age.
    pub fn get_latest_price_data(
        &self,
        token: Address,
        now: Timestamp,
    ) -> Result<PriceData, OracleError> {
        let data = self
            .feeds
            .get(&token)
            .ok_or(OracleError::UnknownToken(token))?;

        if data.is_stale(now, self.max_age_secs) {
            return Err(OracleError::PriceStale {
                token,
                age_secs: data.age_secs(now),
                max_age_secs: self.max_age_secs,
            });
        }

        Ok(*data)
    }

    /// Last recorded entry with no staleness check. Never use it for pricing positions.
    pub fn last_recorded(&self, token: Address) -> Option<PriceData> {
        self.feeds.get(&token).copied()
    }

    pub fn decimals(&self, token: Address) -> Option<u32> {
        self.feeds.get(&token).map(|data| data.decimals)
    }

    pub fn is_supported(&self, token: Address) -> bool {
        self.feeds.contains_key(&token)
    }

    pub fn supported_tokens(&self) -> Vec<Address> {
        let mut tokens: Vec<Address> = self.feeds.keys().copied().collect();
        tokens.sort();
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn token() -> Address {
        Address::from_low_u64(0xa1)
    }

    fn oracle_with_token() -> PriceOracle {
        let mut oracle = PriceOracle::new(60);
        oracle
            .add_supported_token(token(), Price::new_unchecked(dec!(5.5)), 18, Timestamp::from_secs(1000))
            .unwrap();
        oracle
    }

    #[test]
    fn add_and_read_price() {
        let oracle = oracle_with_token();
        let data = oracle.get_latest_price_data(token(), Timestamp::from_secs(1030)).unwrap();
        assert_eq!(data.price.value(), dec!(5.5));
        assert_eq!(data.decimals, 18);
        assert_eq!(data.timestamp, Timestamp::from_secs(1000));
    }

    #[test]
    fn add_twice_rejected() {
        let mut oracle = oracle_with_token();
        let result = oracle.add_supported_token(
            token(),
            Price::new_unchecked(dec!(1)),
            18,
            Timestamp::from_secs(0),
        );
        assert_eq!(result, Err(OracleError::TokenAlreadySupported(token())));
    }

    #[test]
    fn update_unknown_token_rejected() {
        let mut oracle = PriceOracle::new(60);
        let result = oracle.update_price(token(), Price::new_unchecked(dec!(1)), Timestamp::from_secs(0));
        assert_eq!(result, Err(OracleError::UnknownToken(token())));
    }

    #[test]
    fn update_overwrites_price_and_timestamp() {
        let mut oracle = oracle_with_token();
        let previous = oracle
            .update_price(token(), Price::new_unchecked(dec!(6.05)), Timestamp::from_secs(1050))
            .unwrap();
        assert_eq!(previous.price.value(), dec!(5.5));

        let data = oracle.get_latest_price_data(token(), Timestamp::from_secs(1100)).unwrap();
        assert_eq!(data.price.value(), dec!(6.05));
        assert_eq!(data.timestamp, Timestamp::from_secs(1050));
    }

    #[test]
    fn staleness_is_a_hard_error() {
        let oracle = oracle_with_token();

        // exactly at max age is still fresh
        assert!(oracle.get_price(token(), Timestamp::from_secs(1060)).is_ok());

        let result = oracle.get_price(token(), Timestamp::from_secs(1061));
        assert!(matches!(
            result,
            Err(OracleError::PriceStale { age_secs: 61, max_age_secs: 60, .. })
        ));
    }

    #[test]
    fn stale_error_message_matches_revert_reason() {
        let oracle = oracle_with_token();
        let err = oracle.get_price(token(), Timestamp::from_secs(5000)).unwrap_err();
        assert!(err.to_string().starts_with("Price too old"));
        // raw entry is still there for display
        assert_eq!(oracle.last_recorded(token()).unwrap().price.value(), dec!(5.5));
    }

    #[test]
    fn rejects_excessive_decimals() {
        let mut oracle = PriceOracle::new(60);
        let result = oracle.add_supported_token(token(), Price::new_unchecked(dec!(1)), 30, Timestamp::from_secs(0));
        assert_eq!(result, Err(OracleError::InvalidDecimals(30)));
    }

    #[test]
    fn lists_supported_tokens() {
        let mut oracle = oracle_with_token();
        let other = Address::from_low_u64(0x02);
        oracle
            .add_supported_token(other, Price::new_unchecked(dec!(3.75)), 18, Timestamp::from_secs(0))
            .unwrap();
        assert_eq!(oracle.supported_tokens(), vec![other, token()]);
        assert!(oracle.is_supported(other));
        assert_eq!(oracle.decimals(other), Some(18));
    }
}
