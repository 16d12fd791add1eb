use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// An EVM address, normalized to lowercase hex at construction so lookups
/// and comparisons are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Normalize on the way in, same as `Address::new`.
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}

impl Address {
    pub fn new(address: &str) -> Self {
        Self(address.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// A registered token the marketplace trades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

/// The static set of tokens known to the widget, loaded at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenRegistry {
    entries: Vec<TokenEntry>,
}

impl TokenRegistry {
    pub fn new(entries: Vec<TokenEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[TokenEntry] {
        &self.entries
    }

    /// Look up a token by address.
    pub fn get(&self, address: &Address) -> Option<&TokenEntry> {
        self.entries.iter().find(|t| &t.address == address)
    }

    /// Display symbol for an address, falling back to the raw address for
    /// anything unregistered.
    pub fn symbol(&self, address: &Address) -> String {
        self.get(address)
            .map(|t| t.symbol.clone())
            .unwrap_or_else(|| address.to_string())
    }

    /// Addresses are unique within a registry.
    pub fn addresses_unique(&self) -> bool {
        for (i, entry) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|t| t.address == entry.address) {
                return false;
            }
        }
        true
    }
}
