use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::SnapshotRow;

const CONCURRENCY: usize = 4;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const USER_AGENT: &str = "Mozilla/5.0";

/// Fetch stats returned after completion.
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Fetch product pages concurrently, saving each snapshot to DB as it
/// arrives. A failed fetch produces an error snapshot, never a crash.
pub async fn fetch_pages_streaming(
    conn: &Connection,
    products: Vec<(i64, String, String)>,
) -> Result<FetchStats> {
    let client = Arc::new(
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?,
    );
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = products.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send snapshots, main loop saves to DB
    let (tx, mut rx) = tokio::sync::mpsc::channel::<SnapshotRow>(CONCURRENCY * 2);

    for (product_id, url, slug) in products {
        let client = Arc::clone(&client);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let row = fetch_with_retry(&client, product_id, &url, &slug).await;
            let _ = tx.send(row).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;

    let mut insert_stmt = conn.prepare(
        "INSERT INTO snapshots (product_id, url, slug, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    while let Some(row) = rx.recv().await {
        if row.error.is_some() {
            errors += 1;
        } else {
            ok += 1;
        }

        insert_stmt.execute(rusqlite::params![
            row.product_id, row.url, row.slug, row.html, row.status, row.error, row.latency_ms,
        ])?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(FetchStats { total, ok, errors })
}

async fn fetch_with_retry(
    client: &reqwest::Client,
    product_id: i64,
    url: &str,
    slug: &str,
) -> SnapshotRow {
    for attempt in 0..=MAX_RETRIES {
        let row = fetch_one(client, product_id, url, slug).await;

        let should_retry = matches!(
            row.status,
            Some(429) | Some(500) | Some(502) | Some(503)
        ) || (row.status.is_none() && row.error.is_some());

        if !should_retry || attempt == MAX_RETRIES {
            return row;
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Retrying {} (attempt {}/{}), backing off {:.1}s",
            slug,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    fetch_one(client, product_id, url, slug).await
}

async fn fetch_one(
    client: &reqwest::Client,
    product_id: i64,
    url: &str,
    slug: &str,
) -> SnapshotRow {
    let start = Instant::now();
    let response = client.get(url).send().await;
    let elapsed = start.elapsed().as_millis() as i64;

    match response {
        Ok(resp) => {
            let status = resp.status().as_u16() as i32;
            if !resp.status().is_success() {
                return SnapshotRow {
                    product_id,
                    url: url.to_string(),
                    slug: slug.to_string(),
                    html: None,
                    status: Some(status),
                    error: Some(format!("HTTP {}", status)),
                    latency_ms: Some(elapsed),
                };
            }
            match resp.text().await {
                Ok(body) => SnapshotRow {
                    product_id,
                    url: url.to_string(),
                    slug: slug.to_string(),
                    html: Some(body),
                    status: Some(status),
                    error: None,
                    latency_ms: Some(elapsed),
                },
                Err(e) => SnapshotRow {
                    product_id,
                    url: url.to_string(),
                    slug: slug.to_string(),
                    html: None,
                    status: Some(status),
                    error: Some(e.to_string()),
                    latency_ms: Some(elapsed),
                },
            }
        }
        Err(e) => SnapshotRow {
            product_id,
            url: url.to_string(),
            slug: slug.to_string(),
            html: None,
            status: None,
            error: Some(e.to_string()),
            latency_ms: Some(elapsed),
        },
    }
}
