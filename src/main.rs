mod config;
mod db;
mod error;
mod fetch;
mod harvest;
mod parser;
mod records;

use std::time::Instant;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use config::Settings;
use db::FoodStore;
use fetch::HttpSource;
use harvest::Harvester;

#[derive(Parser)]
#[command(name = "tbca_harvest", about = "TBCA food composition harvester")]
struct Cli {
    /// SQLite database path (overrides TBCA_DATABASE)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the food and food_components tables
    Init,
    /// Scrape the food list and every food's detail page into the database
    Run {
        /// Max food list rows to visit (default: all)
        #[arg(short = 'n', long, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
        limit: Option<usize>,
        /// Food list URL (overrides TBCA_LIST_URL)
        #[arg(long)]
        url: Option<String>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show stored row counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load()?;
    if let Some(db) = cli.database {
        settings.database = Some(db);
    }

    let result = match cli.command {
        Commands::Init => {
            let db_config = settings.database_config()?;
            FoodStore::open(&db_config)?;
            println!("Schema ready in {}", db_config.connection());
            Ok(())
        }
        Commands::Run { limit, url, json } => {
            if let Some(u) = url {
                settings.list_url = u;
            }
            let db_config = settings.database_config()?;
            let source_config = settings.source_config()?;
            let store = FoodStore::open(&db_config)?;
            let source = HttpSource::new(&settings.http_settings())?;

            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg} (eta {eta})")?
                    .progress_chars("=> "),
            );

            let harvester = Harvester::new(source, store, source_config)
                .with_limit(limit)
                .with_progress(pb.clone());
            let report = harvester.run().await?;
            pb.finish_and_clear();

            if !report.is_clean() {
                tracing::warn!("Run finished with skipped rows or failures");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.no_rows {
                println!("No rows found in the food list. Nothing saved.");
            } else {
                println!(
                    "Foods:      {} seen ({} new, {} already stored)",
                    report.foods_seen, report.foods_inserted, report.foods_existing
                );
                println!(
                    "Components: {} new, {} already stored",
                    report.components_inserted, report.components_existing
                );
                println!("Malformed:  {} rows skipped", report.malformed_rows);
                if !report.failures.is_empty() {
                    println!("\n--- Failures ({}) ---", report.failures.len());
                    for f in &report.failures {
                        println!(
                            "  {} [{:?}]: {}",
                            f.food_code.as_deref().unwrap_or("-"),
                            f.stage,
                            f.error
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let store = FoodStore::open(&settings.database_config()?)?;
            let s = store.stats()?;
            println!("Foods:      {}", s.foods);
            println!("Components: {}", s.components);
            println!("No detail:  {}", s.foods_without_components);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_limit_must_be_positive() {
        assert!(Cli::try_parse_from(["tbca_harvest", "run", "--limit", "0"]).is_err());
        match Cli::try_parse_from(["tbca_harvest", "run", "-n", "5"]).unwrap().command {
            Commands::Run { limit, .. } => assert_eq!(limit, Some(5)),
            _ => panic!("expected run"),
        }
    }
}
