//! Instrument identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("symbol must not be empty")]
    Empty,
    #[error("symbol '{0}' contains whitespace")]
    Whitespace(String),
}

/// An instrument identifier as configured by the user.
///
/// Brokers often use mixed-case suffixes (`XAUUSDm`), and the terminal
/// treats names case-sensitively, so the configured spelling is kept for
/// terminal requests. Equality, hashing and display all use the upper-case
/// form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    name: String,
    key: String,
}

impl Symbol {
    /// Build a symbol from a configured name. Surrounding whitespace is trimmed.
    ///
    /// Use [`Symbol::parse`] for untrusted input; this constructor accepts
    /// anything, including the empty string.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        let key = name.to_uppercase();
        Self { name, key }
    }

    /// Validating constructor used for configuration and user input.
    pub fn parse(name: &str) -> Result<Self, SymbolError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(SymbolError::Whitespace(trimmed.to_string()));
        }
        Ok(Self::new(trimmed))
    }

    /// Name to send to the terminal (configured spelling).
    pub fn terminal_name(&self) -> &str {
        &self.name
    }

    /// Upper-case comparison key.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Case-insensitive match against a raw token.
    pub fn matches(&self, token: &str) -> bool {
        self.key == token.trim().to_uppercase()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.name
    }
}
