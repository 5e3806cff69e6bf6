/// `LogMeter` - windowed access log statistics
///
/// Copyright (C) 2026 Daniel Freiermuth
///
/// This program is free software: you can redistribute it and/or modify
/// it under the terms of the GNU General Public License as published by
/// the Free Software Foundation, either version 3 of the License, or
/// (at your option) any later version.
///
/// This program is distributed in the hope that it will be useful,
/// but WITHOUT ANY WARRANTY; without even the implied warranty of
/// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
/// GNU General Public License for more details.
///
/// You should have received a copy of the GNU General Public License
/// along with this program.  If not, see <https://www.gnu.org/licenses/>.
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use logmeter::config::AccessLogConfig;
use logmeter::core::aggregate::{reducer_from_name, AggregationSpec, ConstraintSet};
use logmeter::parser::record::FieldValue;
use logmeter::provider::AccessLogProvider;
use logmeter::status::StatusClient;

#[derive(Parser, Debug)]
#[command(name = "logmeter")]
#[command(author = "Daniel Freiermuth")]
#[command(version)]
#[command(about = "Compute windowed statistics from web server access logs", long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the current time window and print one JSON row per group
    Stats {
        /// Logical key identifying this source in the output
        #[arg(long, default_value = "access_log")]
        key: String,

        /// Comma-separated fields to group by
        #[arg(long, value_delimiter = ',', default_value = "request_method")]
        group_by: Vec<String>,

        /// Statistic as NAME=REDUCER, e.g. requests=count or mean_us=avg:time_us
        #[arg(long = "stat", value_name = "NAME=REDUCER")]
        stats: Vec<String>,

        /// Filter as comma-separated FIELD=VALUE pairs, AND-combined;
        /// repeat the flag for OR alternatives
        #[arg(long = "filter", value_name = "FIELD=VALUE,..")]
        filters: Vec<String>,

        /// Keep running, recomputing once per window granularity
        #[arg(long)]
        follow: bool,
    },

    /// Fetch the server status page and print it as JSON
    Status {
        /// Server name attached to the snapshot
        #[arg(long, default_value = "server")]
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize logger with millisecond precision timestamps
    // Set RUST_LOG environment variable to override (e.g., RUST_LOG=debug)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!(
        "LogMeter starting up (version {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let args = Args::parse();
    let config = AccessLogConfig::load(&args.config)?;

    match args.command {
        Command::Stats {
            key,
            group_by,
            stats,
            filters,
            follow,
        } => {
            let spec = build_spec(group_by, &stats, &filters)?;
            let window_minutes = config.window_minutes;
            let mut provider = AccessLogProvider::new(config)?;

            loop {
                let rows = provider.stats(&key, &spec)?;
                for row in &rows {
                    println!("{}", serde_json::to_string(row)?);
                }
                if !follow {
                    break;
                }
                std::thread::sleep(Duration::from_secs(u64::from(window_minutes) * 60));
            }
        }
        Command::Status { name } => {
            let status_config = config
                .status
                .context("no status section in the configuration")?;
            let mut client = StatusClient::new(status_config);
            let snapshot = client.get(&name)?;
            println!("{}", serde_json::to_string_pretty(snapshot)?);
        }
    }

    Ok(())
}

fn build_spec(
    group_by: Vec<String>,
    stats: &[String],
    filters: &[String],
) -> anyhow::Result<AggregationSpec> {
    let mut spec = AggregationSpec {
        group_by,
        ..AggregationSpec::default()
    };

    if stats.is_empty() {
        spec.stats
            .insert("requests".to_string(), reducer_from_name("count")?);
    }
    for stat in stats {
        let (name, reducer) = stat
            .split_once('=')
            .with_context(|| format!("bad --stat {stat:?}; expected NAME=REDUCER"))?;
        spec.stats
            .insert(name.to_string(), reducer_from_name(reducer)?);
    }

    for filter in filters {
        let mut set = ConstraintSet::new();
        for pair in filter.split(',') {
            let (field, value) = pair
                .split_once('=')
                .with_context(|| format!("bad --filter {pair:?}; expected FIELD=VALUE"))?;
            set.insert(field.to_string(), FieldValue::Str(value.to_string()));
        }
        spec.filters.push(set);
    }

    Ok(spec)
}
