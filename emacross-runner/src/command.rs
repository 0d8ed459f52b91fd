//! Chat command grammar.
//!
//! One command exists: `/price [SYMBOL]`. Group chats append the bot's
//! username (`/price@EmaCrossBot`), which is accepted too. Parsing is pure so
//! it can be tested without the network loop.

use emacross_core::domain::Symbol;

/// A recognized chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Current mid price. `symbol` is the raw argument token when exactly one
    /// was given.
    Price { symbol: Option<String> },
}

/// Lower-cased whitespace tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn is_price_keyword(token: &str) -> bool {
    match token.strip_prefix("/price") {
        Some("") => true,
        Some(rest) => rest.len() > 1 && rest.starts_with('@'),
        None => false,
    }
}

impl Command {
    /// Recognize a command in raw message text; `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let tokens = tokenize(text);
        let (head, args) = tokens.split_first()?;
        if !is_price_keyword(head) {
            return None;
        }
        let symbol = match args {
            [one] => Some(one.clone()),
            _ => None,
        };
        Some(Command::Price { symbol })
    }
}

/// Pick the symbol a `/price` query refers to: the monitored symbol matching
/// `token`, otherwise the first monitored symbol. `None` only when nothing is
/// monitored.
pub fn resolve_symbol<'a>(token: Option<&str>, symbols: &'a [Symbol]) -> Option<&'a Symbol> {
    token
        .and_then(|t| symbols.iter().find(|s| s.matches(t)))
        .or_else(|| symbols.first())
}

pub fn price_reply(symbol: &Symbol, price: f64) -> String {
    format!("Current price of {symbol} is {price:.2}")
}

pub fn price_failure_reply(symbol: &Symbol) -> String {
    format!("Failed to fetch current price of {symbol}.")
}
