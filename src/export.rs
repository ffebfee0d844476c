use std::io::Write;
use std::path::Path;

use anyhow::{bail, Result};
use rusqlite::Connection;
use tracing::info;

use crate::db;

/// Fixed dataset header. The six nutrition columns are always present in
/// the schema; a capture without facts leaves them blank (CSV) or drops
/// the keys (JSON).
const COLUMNS: [&str; 13] = [
    "title", "price", "weight", "supermarket", "price_per_unit", "image_url", "date",
    "energy", "fats", "carbs", "fibers", "protein", "salt",
];

pub fn export(conn: &Connection, out: &Path, format: &str) -> Result<usize> {
    let rows = db::fetch_all_captures(conn)?;
    let mut file = std::fs::File::create(out)?;

    match format {
        "csv" => write_csv(&mut file, &rows)?,
        "json" => write_json(&mut file, &rows)?,
        other => bail!("Unknown export format '{}' (expected csv or json)", other),
    }

    info!("Exported {} records to {}", rows.len(), out.display());
    Ok(rows.len())
}

fn write_csv(w: &mut impl Write, rows: &[db::CaptureRow]) -> Result<()> {
    writeln!(w, "{}", COLUMNS.join(","))?;
    for r in rows {
        let cells = [
            r.title.as_deref(),
            r.price.as_deref(),
            r.weight.as_deref(),
            Some(r.supermarket.as_str()),
            r.price_per_unit.as_deref(),
            r.image_url.as_deref(),
            Some(r.captured_at.as_str()),
            r.energy.as_deref(),
            r.fats.as_deref(),
            r.carbs.as_deref(),
            r.fibers.as_deref(),
            r.protein.as_deref(),
            r.salt.as_deref(),
        ];
        let line: Vec<String> = cells
            .iter()
            .map(|c| csv_escape(c.unwrap_or("")))
            .collect();
        writeln!(w, "{}", line.join(","))?;
    }
    Ok(())
}

fn write_json(w: &mut impl Write, rows: &[db::CaptureRow]) -> Result<()> {
    let objects: Vec<serde_json::Value> = rows.iter().map(capture_to_json).collect();
    serde_json::to_writer_pretty(&mut *w, &objects)?;
    writeln!(w)?;
    Ok(())
}

fn capture_to_json(r: &db::CaptureRow) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert("title".into(), r.title.clone().into());
    obj.insert("price".into(), r.price.clone().into());
    obj.insert("weight".into(), r.weight.clone().into());
    obj.insert("supermarket".into(), r.supermarket.clone().into());
    obj.insert("price_per_unit".into(), r.price_per_unit.clone().into());
    obj.insert("image_url".into(), r.image_url.clone().into());
    obj.insert("date".into(), r.captured_at.clone().into());
    // All six or none; checking one column is enough.
    if r.energy.is_some() {
        obj.insert("energy".into(), r.energy.clone().into());
        obj.insert("fats".into(), r.fats.clone().into());
        obj.insert("carbs".into(), r.carbs.clone().into());
        obj.insert("fibers".into(), r.fibers.clone().into());
        obj.insert("protein".into(), r.protein.clone().into());
        obj.insert("salt".into(), r.salt.clone().into());
    }
    serde_json::Value::Object(obj)
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn row(with_facts: bool) -> db::CaptureRow {
        db::CaptureRow {
            snapshot_id: 1,
            slug: "kip".into(),
            title: Some("Jumbo Scharrelkip Filet, 800g".into()),
            price: Some("€ 8,49".into()),
            weight: Some("800 g".into()),
            supermarket: "Jumbo".into(),
            price_per_unit: Some("€ 10,61/kg".into()),
            image_url: None,
            captured_at: "2026-08-30T12:00:00+00:00".into(),
            energy: with_facts.then(|| "485 kJ".to_string()),
            fats: with_facts.then(|| "1,2 g".to_string()),
            carbs: with_facts.then(|| "0 g".to_string()),
            fibers: with_facts.then(|| "0 g".to_string()),
            protein: with_facts.then(|| "23 g".to_string()),
            salt: with_facts.then(|| "0,14 g".to_string()),
        }
    }

    #[test]
    fn csv_keeps_the_full_header_and_blanks_missing_cells() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[row(false)]).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        let data = lines.next().unwrap();
        // Comma inside the title is quoted; the six fact cells are empty.
        assert!(data.starts_with("\"Jumbo Scharrelkip Filet, 800g\""));
        assert!(data.ends_with(",,,,,,"));
    }

    #[test]
    fn json_omits_fact_keys_without_facts() {
        let v = capture_to_json(&row(false));
        assert!(v.get("energy").is_none());
        assert_eq!(v["supermarket"], "Jumbo");
        assert_eq!(v["image_url"], serde_json::Value::Null);
    }

    #[test]
    fn json_includes_all_six_fact_keys_with_facts() {
        let v = capture_to_json(&row(true));
        for key in ["energy", "fats", "carbs", "fibers", "protein", "salt"] {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(v["salt"], "0,14 g");
    }

    #[test]
    fn csv_escape_doubles_quotes() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
