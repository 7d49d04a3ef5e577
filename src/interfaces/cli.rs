//! Command-line surface of the `remittance-engine` binary.
//!
//! Every engine setting can also come from the environment; flags win.

use crate::config::{EngineConfig, MAX_IDEMPOTENCY_TTL_HOURS, MAX_QUOTE_VALIDITY_MINUTES};
use crate::domain::money::CurrencyCode;
use crate::infrastructure::providers::StaticRateTable;
use crate::logging::LogFormat;
use clap::Parser;
use rust_decimal::Decimal;
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Wallet and cross-currency remittance engine.
///
/// Replays a CSV scenario of user registrations, deposits and remittances,
/// then prints every wallet as CSV on stdout.
#[derive(Parser, Debug)]
#[command(name = "remittance-engine", author, version, about, long_about = None)]
pub struct Cli {
    /// Scenario CSV file
    pub input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// How long a quote can be used after it is issued.
    #[arg(
        long,
        env = "QUOTE_VALIDITY_MINUTES",
        default_value_t = 5,
        value_parser = clap::value_parser!(i64).range(1..=MAX_QUOTE_VALIDITY_MINUTES)
    )]
    pub quote_validity_minutes: i64,

    /// Fee charged on every remittance, as a percentage of the send amount.
    #[arg(
        long,
        env = "TRANSACTION_FEE_PERCENTAGE",
        default_value = "2.5",
        value_parser = parse_fee_percentage
    )]
    pub fee_percentage: Decimal,

    /// How long a stored idempotent response is replayed.
    #[arg(
        long,
        env = "IDEMPOTENCY_KEY_EXPIRY_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=MAX_IDEMPOTENCY_TTL_HOURS)
    )]
    pub idempotency_ttl_hours: i64,

    /// Exchange rate as `FROM:TO=RATE`. Repeatable; replaces the defaults.
    #[arg(
        long = "rate",
        value_name = "FROM:TO=RATE",
        value_parser = parse_rate,
        default_values = ["CLP:PEN=0.0043", "PEN:CLP=232.55813953"]
    )]
    pub rates: Vec<RateSpec>,

    /// Probability that the simulated payout provider accepts a request.
    #[arg(long, default_value_t = 0.95)]
    pub provider_success_rate: f64,

    /// Simulated provider latency range in milliseconds, as `MIN..MAX`.
    #[arg(long, value_name = "MIN..MAX", value_parser = parse_latency, default_value = "100..500")]
    pub provider_latency_ms: RangeInclusive<u64>,

    /// Default log filter, used when `RUST_LOG` is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            quote_validity_minutes: self.quote_validity_minutes,
            fee_percentage: self.fee_percentage,
            idempotency_ttl_hours: self.idempotency_ttl_hours,
        }
    }

    pub fn rate_table(&self) -> StaticRateTable {
        self.rates.iter().fold(StaticRateTable::new(), |table, rate| {
            table.with_rate(rate.from.clone(), rate.to.clone(), rate.rate)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateSpec {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: Decimal,
}

fn parse_rate(value: &str) -> Result<RateSpec, String> {
    let (pair, rate) = value
        .split_once('=')
        .ok_or_else(|| format!("expected FROM:TO=RATE, got `{value}`"))?;
    let (from, to) = pair
        .split_once(':')
        .ok_or_else(|| format!("expected FROM:TO, got `{pair}`"))?;
    let rate: Decimal = rate
        .trim()
        .parse()
        .map_err(|e| format!("invalid rate `{rate}`: {e}"))?;
    if rate <= Decimal::ZERO {
        return Err(format!("rate must be positive, got {rate}"));
    }
    Ok(RateSpec {
        from: from.trim().parse().map_err(|e| format!("{e}"))?,
        to: to.trim().parse().map_err(|e| format!("{e}"))?,
        rate,
    })
}

fn parse_fee_percentage(value: &str) -> Result<Decimal, String> {
    let fee: Decimal = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid fee percentage `{value}`: {e}"))?;
    if fee < Decimal::ZERO || fee > Decimal::ONE_HUNDRED {
        return Err(format!("fee percentage must be between 0 and 100, got {fee}"));
    }
    Ok(fee)
}

fn parse_latency(value: &str) -> Result<RangeInclusive<u64>, String> {
    let (min, max) = value
        .split_once("..")
        .ok_or_else(|| format!("expected MIN..MAX, got `{value}`"))?;
    let min: u64 = min.trim().parse().map_err(|e| format!("invalid minimum: {e}"))?;
    let max: u64 = max.trim().parse().map_err(|e| format!("invalid maximum: {e}"))?;
    if min > max {
        return Err(format!("empty latency range {min}..{max}"));
    }
    Ok(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rust_decimal_macros::dec;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["remittance-engine", "scenario.csv"]).unwrap();
        assert_eq!(cli.rates.len(), 2);
        assert_eq!(cli.provider_latency_ms, 100..=500);
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert!(cli.db_path.is_none());

        let config = cli.engine_config();
        assert_eq!(config.fee_percentage, dec!(2.5));
        assert_eq!(config.quote_validity_minutes, 5);
        assert_eq!(config.idempotency_ttl_hours, 24);
    }

    #[test]
    fn test_explicit_rates_replace_defaults() {
        let cli = Cli::try_parse_from([
            "remittance-engine",
            "scenario.csv",
            "--rate",
            "usd:clp=950",
            "--fee-percentage",
            "0",
            "--provider-latency-ms",
            "0..0",
        ])
        .unwrap();
        assert_eq!(
            cli.rates,
            vec![RateSpec {
                from: "USD".parse().unwrap(),
                to: "CLP".parse().unwrap(),
                rate: dec!(950),
            }]
        );
        assert_eq!(cli.engine_config().fee_percentage, Decimal::ZERO);
        assert_eq!(cli.provider_latency_ms, 0..=0);
    }

    #[test]
    fn test_engine_limits_are_accepted() {
        let cli = Cli::try_parse_from([
            "remittance-engine",
            "scenario.csv",
            "--quote-validity-minutes",
            "525600",
            "--idempotency-ttl-hours",
            "8760",
            "--fee-percentage",
            "100",
        ])
        .unwrap();
        assert!(cli.engine_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        for args in [
            ["--rate", "CLP-PEN=1"],
            ["--rate", "CLP:PEN=-1"],
            ["--rate", "CLP:PEN=abc"],
            ["--provider-latency-ms", "500..100"],
            ["--provider-latency-ms", "fast"],
            ["--quote-validity-minutes", "0"],
            ["--quote-validity-minutes", "-5"],
            ["--quote-validity-minutes", "153722867280912930"],
            ["--idempotency-ttl-hours", "0"],
            ["--idempotency-ttl-hours", "9223372036854775807"],
            ["--fee-percentage", "-1"],
            ["--fee-percentage", "150"],
        ] {
            let result = Cli::try_parse_from(
                ["remittance-engine", "scenario.csv"].into_iter().chain(args),
            );
            assert!(result.is_err(), "{args:?} should be rejected");
        }
    }
}
