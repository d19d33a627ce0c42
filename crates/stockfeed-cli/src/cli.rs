//! CLI argument definitions for stockfeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Fetch quotes through the provider chain |
//! | `health` | Probe every provider |
//! | `breakers` | Show or reset circuit breakers |
//!
//! Circuit breaker state lives in memory for one process. `breakers` starts
//! from a fresh orchestrator, so every circuit reports Closed and `--reset`
//! only validates the provider name. Long-running embedders keep one
//! orchestrator and call its reset API instead.
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | TOML settings file |
//! | `--log-level` | `warn` | Log filter when `RUST_LOG` is unset |
//! | `--log-json` | `false` | JSON log lines on stderr |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! stockfeed quote AAPL MSFT --pretty
//! stockfeed --config stockfeed.toml quote RELIANCE
//! stockfeed health
//! stockfeed breakers --reset alphavantage
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Multi-provider stock quote CLI with fallback, caching and circuit breaking.
#[derive(Debug, Parser)]
#[command(name = "stockfeed", author, version, about)]
pub struct Cli {
    /// TOML settings file. `STOCKFEED__*` environment variables override it.
    #[arg(long, global = true, env = "STOCKFEED_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch latest quote(s) for one or more symbols.
    ///
    ///   stockfeed quote AAPL
    ///   stockfeed quote AAPL MSFT GOOGL --pretty
    Quote(QuoteArgs),

    /// Probe every configured provider concurrently.
    Health,

    /// Show circuit breaker state per provider.
    ///
    /// Breaker state is held in memory by the running process only. A fresh
    /// invocation always starts with every circuit Closed.
    Breakers(BreakersArgs),
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// One or more market symbols (e.g., AAPL, MSFT, RELIANCE).
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct BreakersArgs {
    /// Force the named provider's breaker closed before reporting.
    ///
    /// Affects this process only; fails if no such provider is configured.
    #[arg(long, value_name = "PROVIDER")]
    pub reset: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["stockfeed", "quote", "aapl", "msft", "--pretty"])
            .expect("valid invocation");

        assert!(cli.pretty);
        match cli.command {
            Command::Quote(args) => assert_eq!(args.symbols, vec!["aapl", "msft"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn breakers_help_states_state_is_per_process() {
        let mut command = Cli::command();
        let help = command
            .find_subcommand_mut("breakers")
            .expect("breakers subcommand")
            .render_long_help()
            .to_string();

        assert!(help.contains("running process only"), "{help}");
        assert!(help.contains("Affects this process only"), "{help}");
    }

    #[test]
    fn quote_requires_a_symbol() {
        assert!(Cli::try_parse_from(["stockfeed", "quote"]).is_err());
    }
}
