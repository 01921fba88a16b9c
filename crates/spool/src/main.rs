//! spool: post spreadsheet rows to Threads on a schedule.
//!
//! Subcommands select the posting schedule:
//! - `batch`: drain unposted rows now
//! - `schedule`: post one row immediately, then one every fixed interval
//! - `daily_window`: once per day, at a random instant inside a window
//! - `daily_at`: once per day at a fixed time, jittered
//! - `daily_multi_at`: several daily times, each independently jittered

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spool_scheduler::{TimeOfDay, Window, parse_times, parse_timezone};
use spool_sheets::{ServiceAccountKey, SheetsClient, resolve_key_path};
use spool_threads::ThreadsClient;

use spool::runner::Runner;

#[derive(Parser)]
#[command(name = "spool")]
#[command(about = "Post spreadsheet rows to Threads on a schedule", long_about = None)]
struct Cli {
    /// Threads user id the posts are published as
    #[arg(long, env = "THREADS_USER_ID")]
    user_id: String,

    /// Threads API access token
    #[arg(long, env = "THREADS_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Spreadsheet URL or bare id
    #[arg(long, env = "SHEET_URL")]
    sheet: String,

    /// Worksheet tab name (defaults to the first sheet)
    #[arg(long, env = "SHEET_TAB")]
    tab: Option<String>,

    /// Service account key file (falls back to GOOGLE_APPLICATION_CREDENTIALS,
    /// then the gspread default path)
    #[arg(long, env = "GSPREAD_SERVICE_ACCOUNT_FILE")]
    service_account: Option<PathBuf>,

    /// IANA timezone all schedules are computed in
    #[arg(long, env = "SPOOL_TZ", default_value = "Asia/Tokyo")]
    tz: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
enum Commands {
    /// Drain unposted rows now
    Batch {
        /// Stop after this many rows (0 = unbounded)
        #[arg(long, default_value = "0")]
        max_per_run: usize,
    },

    /// Post one row immediately, then one every fixed interval
    Schedule {
        /// Minutes between firings
        #[arg(long, default_value = "120")]
        interval_min: u64,
    },

    /// Post once per day at a random instant inside a window
    DailyWindow {
        /// Window as HH:MM-HH:MM
        #[arg(long)]
        window: String,
    },

    /// Post once per day at a fixed time with jitter
    DailyAt {
        /// Time as HH:MM (hours >= 24 mean the next day)
        #[arg(long)]
        time: String,

        /// Jitter in minutes around the target
        #[arg(long, default_value = "30")]
        jitter_min: u32,
    },

    /// Post at several daily times, each independently jittered
    DailyMultiAt {
        /// Comma-separated HH:MM list
        #[arg(long)]
        times: String,

        /// Jitter in minutes around each target
        #[arg(long, default_value = "30")]
        jitter_min: u32,
    },
}

/// Configuration problems terminate immediately, with the same exit status
/// clap uses for a missing flag.
fn config_bail(message: impl std::fmt::Display) -> ! {
    eprintln!("{message}");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "spool=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let tz = match parse_timezone(&cli.tz) {
        Ok(tz) => tz,
        Err(err) => config_bail(err),
    };

    let key_path = resolve_key_path(cli.service_account.clone());
    let key = match ServiceAccountKey::from_file(&key_path) {
        Ok(key) => key,
        Err(err) => config_bail(err),
    };

    let runner = Runner {
        sheets: SheetsClient::new(key),
        threads: ThreadsClient::new(cli.user_id.clone(), cli.access_token.clone()),
        sheet_ref: cli.sheet.clone(),
        worksheet: cli.tab.clone(),
        tz,
    };

    match cli.command {
        Commands::Batch { max_per_run } => runner
            .run_batch(max_per_run)
            .await
            .map_err(|e| miette::miette!("{}", e))?,

        Commands::Schedule { interval_min } => runner.run_interval(interval_min).await,

        Commands::DailyWindow { window } => {
            let window = match Window::parse(&window) {
                Ok(window) => window,
                Err(err) => config_bail(err),
            };
            runner.run_daily_window(window).await
        }

        Commands::DailyAt { time, jitter_min } => {
            let time = match TimeOfDay::parse(&time) {
                Ok(time) => time,
                Err(err) => config_bail(err),
            };
            runner.run_daily_at(time, jitter_min).await
        }

        Commands::DailyMultiAt { times, jitter_min } => {
            let times = match parse_times(&times) {
                Ok(times) => times,
                Err(err) => config_bail(err),
            };
            runner.run_daily_multi_at(times, jitter_min).await
        }
    }

    Ok(())
}
