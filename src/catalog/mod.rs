//! Price catalog
//!
//! Read-only mapping from ticker symbol to price. Injected into the tools
//! behind the `PriceCatalog` trait so tests can supply their own.

use crate::error::AgentError;
use crate::Result;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Trait for a price data source
pub trait PriceCatalog: Send + Sync {
    /// Price for a symbol, `None` when the symbol is not listed
    fn get(&self, symbol: &str) -> Option<Decimal>;

    /// All entries in listing order
    fn entries(&self) -> Vec<(String, Decimal)>;

    /// Price for a symbol, zero when the symbol is not listed.
    ///
    /// Zero is ambiguous for a free asset; use [`PriceCatalog::get`] when
    /// the difference matters.
    fn lookup(&self, symbol: &str) -> Decimal {
        self.get(symbol).unwrap_or(Decimal::ZERO)
    }

    fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }
}

/// Uppercase, trimmed form used for every catalog key
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// In-process catalog fixed at construction time
#[derive(Debug, Clone)]
pub struct StaticCatalog {
    entries: Vec<(String, Decimal)>,
}

impl StaticCatalog {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let mut listed: Vec<(String, Decimal)> = Vec::new();

        for (symbol, price) in entries {
            let symbol = normalize_symbol(symbol.as_ref());
            // Later entries win, listing position stays with the first
            match listed.iter_mut().find(|(s, _)| *s == symbol) {
                Some(existing) => existing.1 = price,
                None => listed.push((symbol, price)),
            }
        }

        Self { entries: listed }
    }

    /// Parse `SYMBOL=PRICE` pairs separated by commas, e.g. `MSFT=200.3,AAPL=100.4`
    pub fn parse(spec: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (symbol, price) = pair.split_once('=').ok_or_else(|| {
                AgentError::ConfigError(format!("Catalog entry '{}' is not SYMBOL=PRICE", pair))
            })?;

            let symbol = symbol.trim();
            if symbol.is_empty() {
                return Err(AgentError::ConfigError(format!(
                    "Catalog entry '{}' has an empty symbol",
                    pair
                )));
            }

            let price = Decimal::from_str(price.trim()).map_err(|e| {
                AgentError::ConfigError(format!("Invalid price in catalog entry '{}': {}", pair, e))
            })?;

            if price.is_sign_negative() {
                return Err(AgentError::ConfigError(format!(
                    "Negative price in catalog entry '{}'",
                    pair
                )));
            }

            entries.push((symbol.to_string(), price));
        }

        if entries.is_empty() {
            return Err(AgentError::ConfigError("Catalog is empty".to_string()));
        }

        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new([
            ("MSFT", Decimal::new(2003, 1)),
            ("AAPL", Decimal::new(1004, 1)),
            ("AMZN", Decimal::new(1500, 1)),
            ("RIL", Decimal::new(876, 1)),
        ])
    }
}

impl PriceCatalog for StaticCatalog {
    fn get(&self, symbol: &str) -> Option<Decimal> {
        let symbol = normalize_symbol(symbol);
        self.entries
            .iter()
            .find(|(s, _)| *s == symbol)
            .map(|(_, price)| *price)
    }

    fn entries(&self) -> Vec<(String, Decimal)> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_symbols() {
        let catalog = StaticCatalog::default();
        for (symbol, price) in catalog.entries() {
            assert_eq!(catalog.lookup(&symbol), price);
        }
        assert_eq!(catalog.lookup("AAPL"), Decimal::new(1004, 1));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = StaticCatalog::default();
        assert_eq!(catalog.lookup("aapl"), Decimal::new(1004, 1));
        assert_eq!(catalog.lookup(" Msft "), Decimal::new(2003, 1));
    }

    #[test]
    fn test_unknown_symbol_is_zero() {
        let catalog = StaticCatalog::default();
        assert_eq!(catalog.lookup("GOOG"), Decimal::ZERO);
        assert_eq!(catalog.lookup(""), Decimal::ZERO);
        assert!(catalog.get("GOOG").is_none());
        assert!(!catalog.contains("GOOG"));
    }

    #[test]
    fn test_entries_keep_listing_order() {
        let catalog = StaticCatalog::default();
        let symbols: Vec<String> = catalog.entries().into_iter().map(|(s, _)| s).collect();
        assert_eq!(symbols, vec!["MSFT", "AAPL", "AMZN", "RIL"]);
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = StaticCatalog::parse("tsla=250.5, AAPL=100.4,").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup("TSLA"), Decimal::new(2505, 1));
    }

    #[test]
    fn test_parse_rejects_bad_entries() {
        assert!(StaticCatalog::parse("AAPL").is_err());
        assert!(StaticCatalog::parse("AAPL=abc").is_err());
        assert!(StaticCatalog::parse("=10").is_err());
        assert!(StaticCatalog::parse("AAPL=-1").is_err());
        assert!(StaticCatalog::parse(" , ").is_err());
    }

    #[test]
    fn test_duplicate_symbol_overrides_price() {
        let catalog = StaticCatalog::new([("aapl", Decimal::ONE), ("AAPL", Decimal::TEN)]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup("AAPL"), Decimal::TEN);
    }
}
