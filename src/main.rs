mod db;
mod export;
mod fetch;
mod parser;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use regex::Regex;

const PRODUCT_PATTERN: &str = r"^https://www\.jumbo\.com/producten/([A-Za-z0-9][A-Za-z0-9-]*)$";

#[derive(Parser)]
#[command(name = "jumbo_scraper", about = "Jumbo product price & nutrition tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a product page URL for tracking
    Add {
        /// Full product URL, e.g. https://www.jumbo.com/producten/<slug>
        url: String,
    },
    /// Fetch a snapshot of every tracked product page
    Fetch {
        /// Max products to fetch (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract records from snapshots that have none yet
    Process {
        /// Max snapshots to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Fetch + process in one pipeline
    Run {
        /// Max products to capture
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show captured records, newest first
    History {
        /// Filter by product slug
        #[arg(short, long)]
        product: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show capture statistics
    Stats,
    /// Export the dataset to CSV or JSON
    Export {
        /// Output file path
        #[arg(short, long)]
        out: PathBuf,
        /// Output format: csv or json
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
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

    let result = match cli.command {
        Commands::Add { url } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let slug = product_slug(&url)?;
            let inserted = db::insert_product(&conn, &url, &slug)?;
            if inserted > 0 {
                println!("Tracking {}", slug);
            } else {
                println!("Already tracking {}", slug);
            }
            Ok(())
        }
        Commands::Fetch { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let products = db::fetch_products(&conn, limit)?;
            if products.is_empty() {
                println!("No tracked products. Run 'add <url>' first.");
                return Ok(());
            }
            println!("Fetching {} product pages (streaming to DB)...", products.len());
            let stats = fetch::fetch_pages_streaming(&conn, products).await?;
            println!(
                "Done: {} fetched ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let snapshots = db::fetch_unprocessed(&conn, limit)?;
            if snapshots.is_empty() {
                println!("No unprocessed snapshots. Run 'fetch' first.");
                return Ok(());
            }
            println!("Processing {} snapshots...", snapshots.len());
            let counts = process_snapshots(&conn, &snapshots)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let products = db::fetch_products(&conn, limit)?;
            if products.is_empty() {
                println!("No tracked products. Run 'add <url>' first.");
                return Ok(());
            }

            // Phase 1: Fetch (streaming to DB)
            let t_fetch = Instant::now();
            println!("Pipeline: fetching {} product pages...", products.len());
            let stats = fetch::fetch_pages_streaming(&conn, products).await?;
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                stats.total, stats.ok, stats.errors, t_fetch.elapsed().as_secs_f64()
            );

            // Phase 2: Process
            let snapshots = db::fetch_unprocessed(&conn, None)?;
            if snapshots.is_empty() {
                println!("Nothing to process (all fetches failed).");
                return Ok(());
            }
            println!("Processing {} snapshots...", snapshots.len());
            let counts = process_snapshots(&conn, &snapshots)?;
            counts.print();
            Ok(())
        }
        Commands::History { product, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_history(&conn, product.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No captures yet.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<28} | {:>8} | {:>8} | {:>12} | {:<20} | {}",
                "#", "Product", "Price", "Weight", "Per unit", "Captured", "Facts"
            );
            println!("{}", "-".repeat(98));

            for (i, r) in rows.iter().enumerate() {
                let name = truncate(r.title.as_deref().unwrap_or(&r.slug), 28);
                println!(
                    "{:>3} | {:<28} | {:>8} | {:>8} | {:>12} | {:<20} | {}",
                    i + 1,
                    name,
                    r.price.as_deref().unwrap_or("-"),
                    r.weight.as_deref().unwrap_or("-"),
                    r.price_per_unit.as_deref().unwrap_or("-"),
                    truncate(&r.captured_at, 20),
                    if r.has_facts { "yes" } else { "-" },
                );
            }

            println!("\n{} captures", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Products:     {}", s.products);
            println!("Snapshots:    {}", s.snapshots);
            println!("Fetch errors: {}", s.errors);
            println!("Captures:     {}", s.captures);
            println!("With facts:   {}", s.with_facts);
            Ok(())
        }
        Commands::Export { out, format } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let count = export::export(&conn, &out, &format)?;
            println!("Exported {} records to {}", count, out.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    records: usize,
    with_facts: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} records ({} with nutrition facts, {} without).",
            self.records,
            self.with_facts,
            self.records - self.with_facts,
        );
    }
}

fn process_snapshots(
    conn: &rusqlite::Connection,
    snapshots: &[db::Snapshot],
) -> Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(snapshots.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        records: 0,
        with_facts: 0,
    };

    for chunk in snapshots.chunks(500) {
        let rows: Vec<_> = chunk.par_iter().map(parser::process_snapshot).collect();

        counts.records += rows.len();
        counts.with_facts += rows.iter().filter(|r| r.energy.is_some()).count();
        db::save_captures(conn, &rows)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

/// Derive the product slug from a Jumbo product URL.
fn product_slug(url: &str) -> Result<String> {
    let re = Regex::new(PRODUCT_PATTERN)?;
    match re.captures(url).and_then(|c| c.get(1)) {
        Some(m) => Ok(m.as_str().to_string()),
        None => bail!("Not a Jumbo product URL: {}", url),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
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
    fn slug_from_product_url() {
        let slug =
            product_slug("https://www.jumbo.com/producten/jumbo-scharrelkip-filet-800g-515026BAK")
                .unwrap();
        assert_eq!(slug, "jumbo-scharrelkip-filet-800g-515026BAK");
    }

    #[test]
    fn non_product_urls_are_rejected() {
        assert!(product_slug("https://www.jumbo.com/aanbiedingen").is_err());
        assert!(product_slug("https://example.com/producten/kip").is_err());
    }
}
