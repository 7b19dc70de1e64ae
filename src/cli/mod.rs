use crate::config::Config;
use crate::error::{Result, VigiaError};
use crate::fetch::BulletinFetcher;
use crate::ingest;
use crate::matcher::{self, BackfillCase, BackfillRange, ProgressPhase};
use crate::sources::SOURCES;
use crate::store::{BulletinStore, SearchMode};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "vigia", version, about = "Court bulletin ingestion and watch-list matching")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for reports
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch, parse and store all bulletin sources for a date
    Ingest {
        /// Publication date, YYYY-MM-DD
        date: NaiveDate,
    },
    /// Run watch-list matching over ingested entries
    #[command(subcommand)]
    Match(MatchCommands),
    /// Replay the archive for a user's monitored cases
    Backfill {
        /// User whose monitored cases to replay
        #[arg(long)]
        user: String,
        /// How far back to scan
        #[arg(long, value_enum, default_value_t = RangeArg::All)]
        range: RangeArg,
    },
    /// List the configured bulletin sources
    Sources,
    /// Manage watch-list entries
    #[command(subcommand)]
    Watch(WatchCommands),
    /// Map a raw court-name spelling to its canonical name
    AliasAdd {
        raw: String,
        canonical: String,
    },
    /// Read or write configuration values
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Debug, Subcommand)]
enum MatchCommands {
    /// Exact case-number matching for one date
    Cases { date: NaiveDate },
    /// Name matching for one date
    Names {
        date: NaiveDate,
        /// Stamp created alerts as historical (suppresses live notification)
        #[arg(long)]
        historical: bool,
    },
}

#[derive(Debug, Subcommand)]
enum WatchCommands {
    /// Watch a (case number, court) pair
    AddCase {
        #[arg(long)]
        user: String,
        case_number: String,
        court: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Watch a party name
    AddName {
        #[arg(long)]
        user: String,
        name: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Exact)]
        mode: ModeArg,
    },
    /// List a user's watch-list and alerts
    List {
        #[arg(long)]
        user: String,
    },
    /// Remove a monitored case by id
    RemoveCase { id: i64 },
    /// Remove a monitored name by id
    RemoveName { id: i64 },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    Get { key: String },
    Set { key: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RangeArg {
    All,
    #[value(name = "90days")]
    Last90Days,
}

impl From<RangeArg> for BackfillRange {
    fn from(arg: RangeArg) -> Self {
        match arg {
            RangeArg::All => BackfillRange::All,
            RangeArg::Last90Days => BackfillRange::Last90Days,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Exact,
    Variations,
    Fuzzy,
}

impl From<ModeArg> for SearchMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Exact => SearchMode::Exact,
            ModeArg::Variations => SearchMode::Variations,
            ModeArg::Fuzzy => SearchMode::Fuzzy,
        }
    }
}

impl Cli {
    pub async fn run() -> Result<()> {
        env_logger::init();
        let cli = Cli::parse();
        let config = Config::load()?;

        match cli.command {
            Commands::Ingest { date } => {
                let store = open_store(&config).await?;
                let fetcher =
                    BulletinFetcher::new(config.fetch.timeout, &config.fetch.user_agent)?;
                let report = ingest::ingest(
                    &store,
                    &fetcher,
                    &config.fetch.base_url,
                    date,
                    Duration::from_millis(config.fetch.throttle_ms),
                )
                .await?;
                emit(&report, cli.format, |r| {
                    println!(
                        "{} {}: {}/{} sources ok, {} new entries",
                        "ingest".green().bold(),
                        r.date,
                        r.successful,
                        r.total_sources,
                        r.total_entries
                    );
                    for source in &r.sources {
                        let status = if source.error.is_some() {
                            "failed".red()
                        } else if source.skipped {
                            "skipped".yellow()
                        } else if source.found {
                            "ok".green()
                        } else {
                            "not published".normal()
                        };
                        println!(
                            "  {:<4} {:<40} {} ({} entries)",
                            source.source_code, source.source_name, status, source.inserted_entries
                        );
                    }
                })
            }
            Commands::Match(MatchCommands::Cases { date }) => {
                let store = open_store(&config).await?;
                let report = matcher::match_case_numbers(&store, date).await?;
                emit(&report, cli.format, |r| {
                    println!(
                        "{} {}: {} entries vs {} monitored cases, {} matches, {} new alerts",
                        "match cases".green().bold(),
                        r.date,
                        r.total_new_entries,
                        r.total_monitored_cases,
                        r.matches_found,
                        r.alerts_created
                    );
                })
            }
            Commands::Match(MatchCommands::Names { date, historical }) => {
                let store = open_store(&config).await?;
                let report = matcher::match_names(&store, date, historical).await?;
                emit(&report, cli.format, |r| {
                    println!(
                        "{} {}: {} entries vs {} monitored names, {} matches, {} new alerts",
                        "match names".green().bold(),
                        r.date,
                        r.total_entries,
                        r.total_monitored_names,
                        r.matches_found,
                        r.alerts_created
                    );
                })
            }
            Commands::Backfill { user, range } => {
                let store = open_store(&config).await?;
                let cases = store.monitored_cases_for_user(&user).await?;
                if cases.is_empty() {
                    return Err(VigiaError::NotFound(format!(
                        "No monitored cases for user {}",
                        user
                    )));
                }
                let tuples: Vec<BackfillCase> = cases
                    .into_iter()
                    .map(|c| BackfillCase {
                        user_id: c.user_id,
                        monitored_case_id: c.id,
                        case_number: c.case_number,
                        court: c.court,
                    })
                    .collect();

                let bar = ProgressBar::new(tuples.len() as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg}\n{bar:40.cyan/blue} {pos}/{len}")
                        .unwrap()
                        .progress_chars("█▓░"),
                );
                let report = matcher::match_historical_batch(
                    &store,
                    tuples,
                    range.into(),
                    |event| match event.phase {
                        ProgressPhase::Searching => {
                            bar.set_message(format!(
                                "searching {} ({})",
                                event.case_number, event.court
                            ));
                        }
                        ProgressPhase::CreatingAlerts => {
                            bar.inc(1);
                        }
                    },
                )
                .await?;
                bar.finish_and_clear();
                emit(&report, cli.format, |r| {
                    println!(
                        "{}: {} cases scanned, {} matches, {} new alerts",
                        "backfill".green().bold(),
                        r.total_cases,
                        r.total_matches_found,
                        r.total_alerts_created
                    );
                })
            }
            Commands::Sources => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Code", "Name", "Region"]);
                for source in SOURCES {
                    table.add_row(vec![source.code, source.name, source.region]);
                }
                println!("{table}");
                Ok(())
            }
            Commands::Watch(command) => run_watch(command, &config).await,
            Commands::AliasAdd { raw, canonical } => {
                let store = open_store(&config).await?;
                store.add_alias(&raw, &canonical).await?;
                println!("alias added: {} -> {}", raw, canonical);
                Ok(())
            }
            Commands::Config(ConfigCommands::Get { key }) => {
                match config.get(&key) {
                    Some(value) => println!("{}", value),
                    None => println!("(not set)"),
                }
                Ok(())
            }
            Commands::Config(ConfigCommands::Set { key, value }) => {
                let mut config = config;
                config.set(&key, &value)?;
                println!("{} = {}", key, value);
                Ok(())
            }
        }
    }
}

async fn run_watch(command: WatchCommands, config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    match command {
        WatchCommands::AddCase {
            user,
            case_number,
            court,
            label,
        } => {
            let id = store
                .add_monitored_case(&user, &case_number, &court, label.as_deref())
                .await?;
            println!("monitored case {} added", id);
        }
        WatchCommands::AddName { user, name, mode } => {
            let id = store.add_monitored_name(&user, &name, mode.into()).await?;
            println!("monitored name {} added", id);
        }
        WatchCommands::List { user } => {
            let cases = store.monitored_cases_for_user(&user).await?;
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Id", "Case number", "Court", "Label"]);
            for case in &cases {
                table.add_row(vec![
                    case.id.to_string(),
                    case.case_number.clone(),
                    case.court.clone(),
                    case.label.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");

            let names: Vec<_> = store
                .list_monitored_names()
                .await?
                .into_iter()
                .filter(|n| n.user_id == user)
                .collect();
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Id", "Name", "Mode"]);
            for name in &names {
                table.add_row(vec![
                    name.id.to_string(),
                    name.full_name.clone(),
                    name.search_mode.as_str().to_string(),
                ]);
            }
            println!("{table}");

            let alerts = store.alerts_for_user(&user).await?;
            println!(
                "{} alerts total ({} historical)",
                alerts.len(),
                alerts.iter().filter(|a| a.historical).count()
            );
        }
        WatchCommands::RemoveCase { id } => {
            if store.remove_monitored_case(id).await? {
                println!("monitored case {} removed", id);
            } else {
                return Err(VigiaError::NotFound(format!("monitored case {}", id)));
            }
        }
        WatchCommands::RemoveName { id } => {
            if store.remove_monitored_name(id).await? {
                println!("monitored name {} removed", id);
            } else {
                return Err(VigiaError::NotFound(format!("monitored name {}", id)));
            }
        }
    }
    Ok(())
}

async fn open_store(config: &Config) -> Result<BulletinStore> {
    BulletinStore::new(config.store_path()?).await
}

fn emit<T: Serialize>(report: &T, format: OutputFormat, table: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
            Ok(())
        }
        OutputFormat::Table => {
            table(report);
            Ok(())
        }
    }
}
