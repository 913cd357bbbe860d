// 7.0 config.rs: all settings in one place. protocol constants, staleness, custody,
// liquidation reward, funding. presets per environment and TOML loading.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::funding::{FundingConfig, FundingMode};
use crate::types::{Address, Quote};

// protocol constants published on the contract surface
pub const MAX_LEVERAGE: u32 = 100;
pub const LIQUIDATION_THRESHOLD: u32 = 80;
pub const MAINTENANCE_MARGIN_RATE: Decimal = dec!(0.05);
pub const BASE_FUNDING_RATE: Decimal = dec!(0.0001);

/// USDC-like collateral precision.
pub const COLLATERAL_DECIMALS: u32 = 6;

/** 7.1: engine settings. everything the engine needs beyond per-market params */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // events kept in memory before the oldest are drained
    pub max_events: usize,
    // oracle prices older than this are rejected
    pub max_price_age_secs: i64,
    pub collateral_decimals: u32,
    // account holding all posted margin
    pub custody_account: Address,
    // cap applied when a market is created without an explicit max size
    pub default_max_position_size: Quote,
    // cut of a liquidated margin paid to whoever triggers the liquidation
    pub liquidator_reward_fraction: Decimal,
    pub funding: FundingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            max_price_age_secs: 3600,
            collateral_decimals: COLLATERAL_DECIMALS,
            custody_account: Address::from_low_u64(0x0ea5_4939),
            default_max_position_size: Quote::new(dec!(1_000_000)),
            liquidator_reward_fraction: dec!(0.05),
            funding: FundingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn testnet() -> Self {
        Self {
            max_price_age_secs: 300,
            default_max_position_size: Quote::new(dec!(100_000)),
            ..Self::default()
        }
    }

    pub fn mainnet_conservative() -> Self {
        Self {
            max_price_age_secs: 60,
            liquidator_reward_fraction: dec!(0.025),
            ..Self::default()
        }
    }

    // deterministic replays and unit tests: no funding drift
    pub fn without_funding() -> Self {
        let mut config = Self::default();
        config.funding.mode = FundingMode::Disabled;
        config
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_events == 0 {
            return Err(ConfigError::Invalid {
                field: "max_events",
                reason: "must keep at least one event".to_string(),
            });
        }

        if self.max_price_age_secs <= 0 {
            return Err(ConfigError::Invalid {
                field: "max_price_age_secs",
                reason: "must be positive".to_string(),
            });
        }

        if self.collateral_decimals > crate::fixed::MAX_DECIMALS {
            return Err(ConfigError::Invalid {
                field: "collateral_decimals",
                reason: format!("at most {} decimals", crate::fixed::MAX_DECIMALS),
            });
        }

        if self.custody_account.is_zero() {
            return Err(ConfigError::Invalid {
                field: "custody_account",
                reason: "custody cannot be the zero address".to_string(),
            });
        }

        if !self.default_max_position_size.is_positive() {
            return Err(ConfigError::Invalid {
                field: "default_max_position_size",
                reason: "must be positive".to_string(),
            });
        }

        if self.liquidator_reward_fraction < Decimal::ZERO || self.liquidator_reward_fraction > Decimal::ONE {
            return Err(ConfigError::Invalid {
                field: "liquidator_reward_fraction",
                reason: "must be between 0 and 1".to_string(),
            });
        }

        if self.funding.base_rate_per_hour < Decimal::ZERO || self.funding.max_rate_per_hour < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "funding",
                reason: "rates must be non-negative".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("could not parse config: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> EngineConfig {
        match self {
            Environment::Development => EngineConfig::default(),
            Environment::Testnet => EngineConfig::testnet(),
            Environment::Mainnet => EngineConfig::mainnet_conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Testnet.config().validate().is_ok());
        assert!(Environment::Mainnet.config().validate().is_ok());
        assert_eq!(Environment::Mainnet.config().max_price_age_secs, 60);
    }

    #[test]
    fn test_invalid_reward_fraction() {
        let config = EngineConfig {
            liquidator_reward_fraction: dec!(1.5),
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "liquidator_reward_fraction", .. })
        ));
    }

    #[test]
    fn test_invalid_staleness() {
        let config = EngineConfig {
            max_price_age_secs: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_custody_rejected() {
        let config = EngineConfig {
            custody_account: Address::ZERO,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "custody_account", .. })
        ));
    }

    #[test]
    fn test_toml_partial_override() {
        let text = r#"
            max_price_age_secs = 120
            liquidator_reward_fraction = "0.1"

            [funding]
            mode = "disabled"
            base_rate_per_hour = "0"
            max_rate_per_hour = "0"
        "#;
        let config = EngineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.max_price_age_secs, 120);
        assert_eq!(config.liquidator_reward_fraction, dec!(0.1));
        assert_eq!(config.funding.mode, FundingMode::Disabled);
        // untouched fields keep their defaults
        assert_eq!(config.collateral_decimals, COLLATERAL_DECIMALS);
    }

    #[test]
    fn test_toml_rejects_garbage() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_events = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::testnet();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_price_age_secs, config.max_price_age_secs);
        assert_eq!(back.custody_account, config.custody_account);
    }
}
