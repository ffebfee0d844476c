pub mod facts;
pub mod record;
pub mod scalars;

use chrono::Utc;
use scraper::Html;

use crate::db::{CaptureRow, Snapshot};

pub const SUPERMARKET: &str = "Jumbo";

/// One-shot pipeline over a stored snapshot: parse the HTML, run the two
/// extractors (independent, order-irrelevant), then assemble. Extraction
/// is best-effort and never fails; the timestamp is taken at assembly.
pub fn process_snapshot(snap: &Snapshot) -> CaptureRow {
    let doc = Html::parse_document(&snap.html);
    let scalars = scalars::extract_scalars(&doc);
    let facts = facts::extract_facts(&doc);
    let rec = record::assemble(scalars, facts, SUPERMARKET, Utc::now());
    to_capture_row(snap, rec)
}

fn to_capture_row(snap: &Snapshot, rec: record::Record) -> CaptureRow {
    let (energy, fats, carbs, fibers, protein, salt) = match rec.facts {
        Some(f) => (
            Some(f.energy),
            Some(f.fats),
            Some(f.carbs),
            Some(f.fibers),
            Some(f.protein),
            Some(f.salt),
        ),
        None => (None, None, None, None, None, None),
    };

    CaptureRow {
        snapshot_id: snap.snapshot_id,
        slug: snap.slug.clone(),
        title: rec.title,
        price: rec.price,
        weight: rec.weight,
        supermarket: rec.supermarket,
        price_per_unit: rec.price_per_unit,
        image_url: rec.image_url,
        captured_at: rec.captured_at.to_rfc3339(),
        energy,
        fats,
        carbs,
        fibers,
        protein,
        salt,
    }
}

// ── Tests ──
