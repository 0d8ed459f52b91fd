//! In-process fakes for the terminal and the chat channel.

#![allow(dead_code)]

pub mod bridge;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use emacross_core::data::{DataError, MarketDataSource, TerminalInfo};
use emacross_core::domain::{Bar, Quote, Symbol, Timeframe};
use emacross_core::notify::{
    InboundMessage, NotificationChannel, NotifyError, UpdateBatch, UpdateCursor,
};

// ─── Bar series ──────────────────────────────────────────────────────

pub fn bars(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            symbol: Symbol::new(symbol),
            open_time: base + chrono::Duration::hours(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            tick_volume: 100,
        })
        .collect()
}

/// Steady decline, then a spike on the last bar: the fast EMA crosses above.
pub fn golden_cross(symbol: &str, n: usize) -> Vec<Bar> {
    let mut closes: Vec<f64> = (0..n - 1).map(|i| 200.0 - i as f64).collect();
    closes.push(1000.0);
    bars(symbol, &closes)
}

/// Steady rise, then a crash on the last bar: the fast EMA crosses below.
pub fn death_cross(symbol: &str, n: usize) -> Vec<Bar> {
    let mut closes: Vec<f64> = (0..n - 1).map(|i| 1000.0 + i as f64).collect();
    closes.push(1.0);
    bars(symbol, &closes)
}

/// Steady rise with no cross at the end.
pub fn trending(symbol: &str, n: usize) -> Vec<Bar> {
    let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
    bars(symbol, &closes)
}

pub fn gmt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(y, mo, d, h, mi, s)
        .unwrap()
}

// ─── Fake terminal ───────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeMarket {
    series: Mutex<HashMap<(Symbol, Timeframe), Vec<Bar>>>,
    failing: Mutex<Vec<(Symbol, Timeframe)>>,
    quotes: Mutex<HashMap<Symbol, Quote>>,
    quote_errors: AtomicBool,
    refuse_connect: AtomicBool,
    pub fetches: AtomicUsize,
    pub last_count: AtomicUsize,
}

impl FakeMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bars(&self, symbol: &str, timeframe: Timeframe, bars: Vec<Bar>) {
        self.series
            .lock()
            .unwrap()
            .insert((Symbol::new(symbol), timeframe), bars);
    }

    pub fn fail_fetch(&self, symbol: &str, timeframe: Timeframe) {
        self.failing
            .lock()
            .unwrap()
            .push((Symbol::new(symbol), timeframe));
    }

    pub fn set_quote(&self, symbol: &str, bid: f64, ask: f64) {
        self.quotes
            .lock()
            .unwrap()
            .insert(Symbol::new(symbol), Quote::new(bid, ask));
    }

    pub fn fail_quotes(&self) {
        self.quote_errors.store(true, Ordering::SeqCst);
    }

    pub fn refuse_connect(&self) {
        self.refuse_connect.store(true, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl MarketDataSource for FakeMarket {
    fn name(&self) -> &str {
        "fake"
    }

    fn connect(&self) -> Result<TerminalInfo, DataError> {
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(DataError::Unreachable("connection refused".into()));
        }
        Ok(TerminalInfo {
            terminal: "FakeTerminal".into(),
            version: Some("1.0".into()),
        })
    }

    fn fetch_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        _from: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<Bar>, DataError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.last_count.store(count, Ordering::SeqCst);
        let key = (symbol.clone(), timeframe);
        if self.failing.lock().unwrap().contains(&key) {
            return Err(DataError::Unreachable("bridge timed out".into()));
        }
        let series = self.series.lock().unwrap();
        let bars = series.get(&key).cloned().unwrap_or_default();
        let start = bars.len().saturating_sub(count);
        Ok(bars[start..].to_vec())
    }

    fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>, DataError> {
        if self.quote_errors.load(Ordering::SeqCst) {
            return Err(DataError::Unreachable("bridge down".into()));
        }
        Ok(self.quotes.lock().unwrap().get(symbol).copied())
    }
}

// ─── Recording channel ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub chat_id: String,
    pub text: String,
}

pub struct RecordingChannel {
    chat: String,
    sent: Mutex<Vec<Sent>>,
    inbox: Mutex<VecDeque<Result<Vec<InboundMessage>, NotifyError>>>,
    seen_cursors: Mutex<Vec<UpdateCursor>>,
    fail_sends: AtomicBool,
    pub send_attempts: AtomicUsize,
}

impl RecordingChannel {
    pub fn new(chat: &str) -> Self {
        Self {
            chat: chat.into(),
            sent: Mutex::new(Vec::new()),
            inbox: Mutex::new(VecDeque::new()),
            seen_cursors: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            send_attempts: AtomicUsize::new(0),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.text).collect()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Queue one poll result made of `(update_id, chat_id, text)` triples.
    pub fn push_batch(&self, messages: &[(i64, Option<&str>, Option<&str>)]) {
        let batch = messages
            .iter()
            .map(|(id, chat, text)| InboundMessage {
                update_id: *id,
                chat_id: chat.map(str::to_string),
                text: text.map(str::to_string),
            })
            .collect();
        self.inbox.lock().unwrap().push_back(Ok(batch));
    }

    pub fn push_poll_error(&self) {
        self.inbox
            .lock()
            .unwrap()
            .push_back(Err(NotifyError::Transport("connection reset".into())));
    }

    pub fn seen_cursors(&self) -> Vec<UpdateCursor> {
        self.seen_cursors.lock().unwrap().clone()
    }
}

impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn default_chat(&self) -> &str {
        &self.chat
    }

    fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                status: 429,
                description: "Too Many Requests".into(),
            });
        }
        self.sent.lock().unwrap().push(Sent {
            chat_id: chat_id.into(),
            text: text.into(),
        });
        Ok(())
    }

    fn poll_updates(
        &self,
        cursor: UpdateCursor,
        _timeout: Duration,
    ) -> Result<UpdateBatch, NotifyError> {
        self.seen_cursors.lock().unwrap().push(cursor);
        let next = self.inbox.lock().unwrap().pop_front();
        match next {
            Some(Ok(messages)) => {
                let mut next_cursor = cursor;
                for m in &messages {
                    next_cursor.advance_past(m.update_id);
                }
                Ok(UpdateBatch {
                    messages,
                    next_cursor,
                })
            }
            Some(Err(e)) => Err(e),
            None => {
                // Stand-in for an empty long-poll.
                std::thread::sleep(Duration::from_millis(5));
                Ok(UpdateBatch {
                    messages: Vec::new(),
                    next_cursor: cursor,
                })
            }
        }
    }
}
