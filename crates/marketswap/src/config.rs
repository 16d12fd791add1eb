use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::token::{Address, TokenEntry, TokenRegistry};

/// Immutable chain identity and token registry, injected at startup.
///
/// The widget never mutates this after construction; everything the
/// orchestrator needs to know about the deployment lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(rename = "chainId")]
    pub chain_id: u64,

    #[serde(rename = "rpcUrl")]
    pub rpc_url: String,

    /// The marketplace contract — spender for every approval and
    /// counter-party for every swap.
    pub marketplace: Address,

    /// The reference stablecoin; always the spent asset when buying.
    pub stablecoin: Address,

    pub tokens: TokenRegistry,
}

impl ChainConfig {
    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize config to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Enforce registry invariants: unique addresses, and the stablecoin
    /// must itself be a registered token.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.tokens.addresses_unique() {
            return Err(Error::Config("duplicate token address".to_string()));
        }
        if self.tokens.get(&self.stablecoin).is_none() {
            return Err(Error::Config(format!(
                "stablecoin {} is not in the token registry",
                self.stablecoin
            )));
        }
        Ok(())
    }

    /// Tokens offered on the sell side (everything but the stablecoin).
    pub fn sellable(&self) -> Vec<&TokenEntry> {
        self.tokens
            .entries()
            .iter()
            .filter(|t| t.address != self.stablecoin)
            .collect()
    }

    /// Decimals for a registered token (fixed at 18 for this deployment).
    pub fn decimals(&self, token: &Address) -> u32 {
        self.tokens.get(token).map(|t| t.decimals as u32).unwrap_or(18)
    }

    /// The Kinto deployment this widget originally shipped against.
    pub fn kinto() -> Self {
        let usdc = Address::new("0xcBcc3AF21CAE5Ba7a284bDe8a857b04190CcD29D");
        Self {
            chain_id: 7887,
            rpc_url: "https://rpc.kinto-rpc.com/".to_string(),
            marketplace: Address::new("0x7FE6BA5ee1122DA581CC38a805796472613C214B"),
            stablecoin: usdc.clone(),
            tokens: TokenRegistry::new(vec![
                TokenEntry {
                    symbol: "USDC".to_string(),
                    address: usdc,
                    decimals: 18,
                },
                TokenEntry {
                    symbol: "SRC".to_string(),
                    address: Address::new("0x28B9786677F2261487494581a73EE724eD2db1f2"),
                    decimals: 18,
                },
                TokenEntry {
                    symbol: "LDT".to_string(),
                    address: Address::new("0x5AA66fEf2fFd6c59cB6630a186423a480a064906"),
                    decimals: 18,
                },
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinto_config_valid() {
        let config = ChainConfig::kinto();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain_id, 7887);
        assert_eq!(config.tokens.entries().len(), 3);
        assert_eq!(config.sellable().len(), 2);
        assert!(config
            .sellable()
            .iter()
            .all(|t| t.address != config.stablecoin));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "chainId": 7887,
            "rpcUrl": "https://rpc.kinto-rpc.com/",
            "marketplace": "0x7fe6ba5ee1122da581cc38a805796472613c214b",
            "stablecoin": "0xaaa1",
            "tokens": [
                { "symbol": "USDC", "address": "0xaaa1", "decimals": 18 },
                { "symbol": "SRC", "address": "0xbbb2", "decimals": 18 }
            ]
        }"#;
        let config = ChainConfig::from_json(json).unwrap();
        assert_eq!(config.stablecoin, Address::new("0xAAA1"));
        assert_eq!(config.tokens.symbol(&Address::new("0xbbb2")), "SRC");
    }

    #[test]
    fn test_validate_rejects_unregistered_stablecoin() {
        let json = r#"{
            "chainId": 1,
            "rpcUrl": "http://localhost",
            "marketplace": "0x1",
            "stablecoin": "0xmissing",
            "tokens": [
                { "symbol": "SRC", "address": "0xbbb2", "decimals": 18 }
            ]
        }"#;
        assert!(ChainConfig::from_json(json).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_addresses() {
        let json = r#"{
            "chainId": 1,
            "rpcUrl": "http://localhost",
            "marketplace": "0x1",
            "stablecoin": "0xaaa1",
            "tokens": [
                { "symbol": "USDC", "address": "0xaaa1", "decimals": 18 },
                { "symbol": "ALSO", "address": "0xAAA1", "decimals": 18 }
            ]
        }"#;
        assert!(ChainConfig::from_json(json).is_err());
    }
}
