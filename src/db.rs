use anyhow::Result;
use rusqlite::Connection;

const DB_PATH: &str = "data/jumbo.sqlite";

pub fn connect() -> Result<Connection> {
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS products (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            slug       TEXT NOT NULL,
            added_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS snapshots (
            id         INTEGER PRIMARY KEY,
            product_id INTEGER NOT NULL REFERENCES products(id),
            url        TEXT NOT NULL,
            slug       TEXT NOT NULL,
            html       TEXT,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_snapshots_slug ON snapshots(slug);

        -- One capture per snapshot. The six nutrition columns are either
        -- all NULL or all set; extraction never writes a partial block.
        CREATE TABLE IF NOT EXISTS captures (
            id             INTEGER PRIMARY KEY,
            snapshot_id    INTEGER UNIQUE NOT NULL REFERENCES snapshots(id),
            slug           TEXT NOT NULL,
            title          TEXT,
            price          TEXT,
            weight         TEXT,
            supermarket    TEXT NOT NULL,
            price_per_unit TEXT,
            image_url      TEXT,
            captured_at    TEXT NOT NULL,
            energy         TEXT,
            fats           TEXT,
            carbs          TEXT,
            fibers         TEXT,
            protein        TEXT,
            salt           TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_captures_slug ON captures(slug);
        ",
    )?;
    Ok(())
}

// ── Product queue ──

pub fn insert_product(conn: &Connection, url: &str, slug: &str) -> Result<usize> {
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO products (url, slug) VALUES (?1, ?2)")?;
    Ok(stmt.execute(rusqlite::params![url, slug])?)
}

/// Every registered product is a fetch candidate on every run; a capture
/// is a point-in-time observation, not a one-off visit.
pub fn fetch_products(conn: &Connection, limit: Option<usize>) -> Result<Vec<(i64, String, String)>> {
    let sql = match limit {
        Some(n) => format!("SELECT id, url, slug FROM products ORDER BY id LIMIT {}", n),
        None => "SELECT id, url, slug FROM products ORDER BY id".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Fetching ──

pub struct SnapshotRow {
    pub product_id: i64,
    pub url: String,
    pub slug: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

// ── Processing ──

pub struct Snapshot {
    pub snapshot_id: i64,
    pub slug: String,
    pub url: String,
    pub html: String,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<Snapshot>> {
    let sql = format!(
        "SELECT s.id, s.slug, s.url, s.html
         FROM snapshots s
         LEFT JOIN captures c ON c.snapshot_id = s.id
         WHERE s.html IS NOT NULL AND c.id IS NULL
         ORDER BY s.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Snapshot {
                snapshot_id: row.get(0)?,
                slug: row.get(1)?,
                url: row.get(2)?,
                html: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Captured records ──

pub struct CaptureRow {
    pub snapshot_id: i64,
    pub slug: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub weight: Option<String>,
    pub supermarket: String,
    pub price_per_unit: Option<String>,
    pub image_url: Option<String>,
    pub captured_at: String,
    pub energy: Option<String>,
    pub fats: Option<String>,
    pub carbs: Option<String>,
    pub fibers: Option<String>,
    pub protein: Option<String>,
    pub salt: Option<String>,
}

pub fn save_captures(conn: &Connection, rows: &[CaptureRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO captures
             (snapshot_id, slug, title, price, weight, supermarket, price_per_unit,
              image_url, captured_at, energy, fats, carbs, fibers, protein, salt)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
        )?;
        for r in rows {
            stmt.execute(rusqlite::params![
                r.snapshot_id, r.slug, r.title, r.price, r.weight, r.supermarket,
                r.price_per_unit, r.image_url, r.captured_at, r.energy, r.fats,
                r.carbs, r.fibers, r.protein, r.salt,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn fetch_all_captures(conn: &Connection) -> Result<Vec<CaptureRow>> {
    let mut stmt = conn.prepare(
        "SELECT snapshot_id, slug, title, price, weight, supermarket, price_per_unit,
                image_url, captured_at, energy, fats, carbs, fibers, protein, salt
         FROM captures ORDER BY captured_at, id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CaptureRow {
                snapshot_id: row.get(0)?,
                slug: row.get(1)?,
                title: row.get(2)?,
                price: row.get(3)?,
                weight: row.get(4)?,
                supermarket: row.get(5)?,
                price_per_unit: row.get(6)?,
                image_url: row.get(7)?,
                captured_at: row.get(8)?,
                energy: row.get(9)?,
                fats: row.get(10)?,
                carbs: row.get(11)?,
                fibers: row.get(12)?,
                protein: row.get(13)?,
                salt: row.get(14)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── History ──

pub struct HistoryRow {
    pub slug: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub weight: Option<String>,
    pub price_per_unit: Option<String>,
    pub captured_at: String,
    pub has_facts: bool,
}

pub fn fetch_history(
    conn: &Connection,
    slug: Option<&str>,
    limit: usize,
) -> Result<Vec<HistoryRow>> {
    let (where_clause, params): (&str, Vec<Box<dyn rusqlite::types::ToSql>>) = match slug {
        Some(s) => (" WHERE slug = ?1", vec![Box::new(s.to_string()) as Box<dyn rusqlite::types::ToSql>]),
        None => ("", Vec::new()),
    };

    let sql = format!(
        "SELECT slug, title, price, weight, price_per_unit, captured_at,
                energy IS NOT NULL
         FROM captures{}
         ORDER BY captured_at DESC, id DESC
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(HistoryRow {
                slug: row.get(0)?,
                title: row.get(1)?,
                price: row.get(2)?,
                weight: row.get(3)?,
                price_per_unit: row.get(4)?,
                captured_at: row.get(5)?,
                has_facts: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub products: usize,
    pub snapshots: usize,
    pub errors: usize,
    pub captures: usize,
    pub with_facts: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let products: usize = conn.query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?;
    let snapshots: usize = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |r| r.get(0))?;
    let errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM snapshots WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let captures: usize = conn.query_row("SELECT COUNT(*) FROM captures", [], |r| r.get(0))?;
    let with_facts: usize = conn.query_row(
        "SELECT COUNT(*) FROM captures WHERE energy IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        products,
        snapshots,
        errors,
        captures,
        with_facts,
    })
}
