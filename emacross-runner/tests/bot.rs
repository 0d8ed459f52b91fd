//! Integration tests for the bot supervisor: handshake, threads, shutdown.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use emacross_runner::{Bot, BotConfig, BotError, CancelToken, ManualClock};

use common::{gmt, FakeMarket, RecordingChannel};

const CONFIG: &str = r#"
[market]
symbols = ["XAUUSDm", "BTCUSDm"]
fast_timeframe = "M30"
slow_timeframe = "H1"

[ema]
fast_period = 21
slow_period = 50

[telegram]
bot_token = "123:abc"
chat_id = "-1001"
"#;

fn bot(market: Arc<FakeMarket>, channel: Arc<RecordingChannel>) -> Bot {
    let config = BotConfig::from_toml(CONFIG).unwrap().validate().unwrap();
    let clock = Arc::new(ManualClock::new(gmt(2024, 3, 15, 11, 0, 2)));
    Bot::with_parts(config, market, channel, clock)
}

#[test]
fn failed_handshake_is_fatal() {
    let market = Arc::new(FakeMarket::new());
    market.refuse_connect();
    let channel = Arc::new(RecordingChannel::new("-1001"));

    let err = bot(market.clone(), channel.clone())
        .start(CancelToken::new())
        .err()
        .unwrap();

    assert!(matches!(err, BotError::Initialization(_)));
    assert!(err.to_string().contains("connection refused"));
    assert_eq!(market.fetch_count(), 0);
    assert!(channel.seen_cursors().is_empty());
}

#[test]
fn running_bot_answers_commands_and_shuts_down() {
    let market = Arc::new(FakeMarket::new());
    market.set_quote("BTCUSDm", 60000.0, 60010.0);
    let channel = Arc::new(RecordingChannel::new("-1001"));
    channel.push_batch(&[(1, Some("-1001"), Some("/price btcusdm"))]);

    let handle = bot(market.clone(), channel.clone())
        .start(CancelToken::new())
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while channel.sent().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    handle.shutdown().unwrap();

    assert_eq!(
        channel.texts(),
        vec!["Current price of BTCUSDM is 60005.00"]
    );
    // Next candle close is half an hour away on the manual clock.
    assert_eq!(market.fetch_count(), 0);
}

#[test]
fn external_cancel_ends_join() {
    let market = Arc::new(FakeMarket::new());
    let channel = Arc::new(RecordingChannel::new("-1001"));
    let cancel = CancelToken::new();

    let handle = bot(market, channel).start(cancel.clone()).unwrap();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
    });

    let start = Instant::now();
    handle.join().unwrap();
    canceller.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn loops_are_built_from_config() {
    let market = Arc::new(FakeMarket::new());
    let channel = Arc::new(RecordingChannel::new("-1001"));
    let bot = bot(market, channel);

    let alerts = bot.alert_loop().unwrap();
    assert_eq!(alerts.settings().symbols.len(), 2);
    assert_eq!(alerts.settings().bars_per_fetch, 150);
    assert_eq!(alerts.state().len(), 4);
    assert_eq!(alerts.next_wake().unwrap(), gmt(2024, 3, 15, 11, 30, 2));
}
