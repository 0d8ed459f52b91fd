//! EMACross CLI: run the alert bot and inspect its view of the market.
//!
//! Commands:
//! - `run`: start the alert loop and the command loop until killed
//! - `check`: validate the config and handshake with the terminal
//! - `scan`: one dry-run polling cycle; prints crossovers, sends nothing
//! - `price`: print the current mid price of a monitored symbol
//! - `next-close`: print upcoming candle closes on the broker clock

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use emacross_core::schedule::{next_close, next_wake};
use emacross_runner::{
    format_alert, price_failure_reply, price_reply, resolve_symbol, AlertLoop, AlertSettings, Bot,
    BotConfig, BotError, CancelToken,
};

#[derive(Parser)]
#[command(
    name = "emacross",
    version,
    about = "EMACross: EMA crossover alerts for a trading terminal, delivered to Telegram"
)]
struct Cli {
    /// Path to the TOML config. Defaults to <config dir>/emacross/emacross.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot: alert loop and command loop.
    Run,
    /// Validate the config and handshake with the terminal.
    Check,
    /// Run one polling cycle without sending alerts.
    Scan,
    /// Print the current mid price of a monitored symbol.
    Price {
        /// Symbol to query. Defaults to the first configured symbol.
        symbol: Option<String>,
    },
    /// Print the next candle close for each configured timeframe.
    NextClose,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;

    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Run => run_bot(config),
        Commands::Check => run_check(config),
        Commands::Scan => run_scan(config),
        Commands::Price { symbol } => run_price(config, symbol.as_deref()),
        Commands::NextClose => run_next_close(config),
    }
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to initialize logging: {e}"))
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("emacross").join("emacross.toml"))
        .unwrap_or_else(|| PathBuf::from("emacross.toml"))
}

fn load_config(path: Option<PathBuf>) -> Result<BotConfig> {
    let path = path.unwrap_or_else(default_config_path);
    let config = BotConfig::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    info!(
        path = %path.display(),
        symbols = config.market.symbols.len(),
        "config loaded"
    );
    Ok(config)
}

fn run_bot(config: BotConfig) -> Result<()> {
    let bot = Bot::from_config(config)?;
    let handle = bot.start(CancelToken::new())?;
    handle.join()?;
    Ok(())
}

fn run_check(config: BotConfig) -> Result<()> {
    let bot = Bot::from_config(config)?;
    let terminal = bot.market().connect().map_err(BotError::Initialization)?;
    println!("Config OK");
    println!(
        "Terminal: {} ({})",
        terminal.terminal,
        terminal.version.as_deref().unwrap_or("unknown version")
    );
    let symbols: Vec<String> = bot
        .config()
        .market
        .symbols
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("Symbols: {}", symbols.join(", "));
    let [fast, slow] = bot.config().timeframes();
    println!(
        "Timeframes: {fast}, {slow}  EMA {}/{}",
        bot.config().ema.fast_period,
        bot.config().ema.slow_period
    );
    Ok(())
}

fn run_scan(config: BotConfig) -> Result<()> {
    let bot = Bot::from_config(config)?;
    bot.market().connect().map_err(BotError::Initialization)?;

    let mut settings = AlertSettings::from_config(bot.config())?;
    settings.dry_run = true;
    let mut alerts = AlertLoop::new(
        bot.market().clone(),
        bot.channel().clone(),
        bot.clock().clone(),
        settings,
    );

    let report = alerts.poll_once();
    let now = bot.clock().now();
    for d in &report.detections {
        println!("{}", format_alert(d.signal, &d.symbol, d.timeframe, now));
    }
    println!(
        "Checked {} pairs, skipped {}, {} crossover(s)",
        report.pairs_checked,
        report.pairs_skipped,
        report.detections.len()
    );
    Ok(())
}

fn run_price(config: BotConfig, symbol: Option<&str>) -> Result<()> {
    let bot = Bot::from_config(config)?;
    let symbol = resolve_symbol(symbol, &bot.config().market.symbols)
        .ok_or_else(|| anyhow!("no symbols configured"))?;
    let line = match bot.quote_source().quote(symbol)? {
        Some(quote) if quote.is_valid() => price_reply(symbol, quote.mid()),
        _ => price_failure_reply(symbol),
    };
    println!("{line}");
    Ok(())
}

fn run_next_close(config: BotConfig) -> Result<()> {
    let bot = Bot::from_config(config)?;
    let now = bot.clock().now();
    println!("Broker time: {}", now.format("%Y-%m-%d %H:%M:%S %:z"));
    let timeframes = bot.config().timeframes();
    for tf in timeframes {
        println!(
            "{:>4}: {}",
            tf.label(),
            next_close(tf, now).format("%Y-%m-%d %H:%M:%S")
        );
    }
    let wake = next_wake(&timeframes, now, bot.config().settle_delay())?;
    println!("Next poll: {}", wake.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}
