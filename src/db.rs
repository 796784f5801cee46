use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            kind       TEXT NOT NULL CHECK(kind IN ('index','subpage')),
            title      TEXT NOT NULL DEFAULT '',
            category   TEXT NOT NULL,
            section    TEXT NOT NULL,
            language   TEXT NOT NULL,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_visited ON pages(visited);

        CREATE TABLE IF NOT EXISTS page_data (
            id           INTEGER PRIMARY KEY,
            page_id      INTEGER NOT NULL REFERENCES pages(id),
            url          TEXT NOT NULL,
            html         TEXT,
            status       INTEGER,
            error        TEXT,
            latency_ms   INTEGER,
            scraped_at   TEXT NOT NULL DEFAULT (datetime('now')),
            processed_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_page ON page_data(page_id);

        CREATE TABLE IF NOT EXISTS dhamma_content (
            id                 INTEGER PRIMARY KEY,
            title              TEXT NOT NULL,
            speaker            TEXT,
            content_type       TEXT CHECK(content_type IN ('audio','video','ebook','other')),
            format             TEXT,
            file_url           TEXT UNIQUE NOT NULL,
            file_size_estimate INTEGER,
            duration_estimate  INTEGER,
            language           TEXT NOT NULL DEFAULT 'myanmar',
            category           TEXT,
            tags               TEXT,
            description        TEXT,
            date_recorded      TEXT,
            location           TEXT,
            collection         TEXT,
            source_page        TEXT NOT NULL,
            scraped_date       TEXT NOT NULL,
            created_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_content_type ON dhamma_content(content_type);
        CREATE INDEX IF NOT EXISTS idx_speaker ON dhamma_content(speaker);
        CREATE INDEX IF NOT EXISTS idx_category ON dhamma_content(category);
        CREATE INDEX IF NOT EXISTS idx_language ON dhamma_content(language);
        CREATE INDEX IF NOT EXISTS idx_source_page ON dhamma_content(source_page);
        ",
    )?;
    Ok(())
}

// ── Crawl queue ──

pub struct PageRow {
    pub url: String,
    pub kind: String,
    pub title: String,
    pub category: String,
    pub section: String,
    pub language: String,
}

pub fn insert_pages(conn: &Connection, pages: &[PageRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO pages (url, kind, title, category, section, language)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for p in pages {
            count += stmt.execute(rusqlite::params![
                p.url, p.kind, p.title, p.category, p.section, p.language,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn page_id(conn: &Connection, url: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM pages WHERE url = ?1", [url], |r| r.get(0))
        .optional()?;
    Ok(id)
}

pub struct QueuedPage {
    pub id: i64,
    pub url: String,
    pub title: String,
}

pub fn fetch_unvisited(conn: &Connection, limit: Option<usize>) -> Result<Vec<QueuedPage>> {
    let sql = format!(
        "SELECT id, url, title FROM pages WHERE visited = 0 ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(QueuedPage {
                id: row.get(0)?,
                url: row.get(1)?,
                title: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct PageDataRow {
    pub page_id: i64,
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

/// Store one fetch result and mark its page visited.
pub fn save_page_data(conn: &Connection, row: &PageDataRow) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO page_data (page_id, url, html, status, error, latency_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![row.page_id, row.url, row.html, row.status, row.error, row.latency_ms],
    )?;
    tx.execute(
        "UPDATE pages SET visited = 1, visited_at = datetime('now') WHERE id = ?1",
        [row.page_id],
    )?;
    tx.commit()?;
    Ok(())
}

// ── Processing ──

pub struct ScrapedPage {
    pub page_data_id: i64,
    pub url: String,
    pub kind: String,
    /// Anchor text from the index page (empty for index pages).
    pub title: String,
    pub section: String,
    pub language: String,
    pub html: String,
    pub scraped_at: String,
}

pub fn fetch_unprocessed(conn: &Connection, limit: Option<usize>) -> Result<Vec<ScrapedPage>> {
    let sql = format!(
        "SELECT pd.id, pd.url, p.kind, p.title, p.section, p.language,
                pd.html, pd.scraped_at
         FROM page_data pd
         JOIN pages p ON p.id = pd.page_id
         WHERE pd.html IS NOT NULL AND pd.processed_at IS NULL
         ORDER BY pd.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(ScrapedPage {
                page_data_id: row.get(0)?,
                url: row.get(1)?,
                kind: row.get(2)?,
                title: row.get(3)?,
                section: row.get(4)?,
                language: row.get(5)?,
                html: row.get(6)?,
                scraped_at: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Content ──

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ContentRow {
    pub id: Option<i64>,
    pub title: String,
    pub speaker: Option<String>,
    pub content_type: String,
    pub format: Option<String>,
    pub file_url: String,
    pub file_size_estimate: Option<i64>,
    pub duration_estimate: Option<i64>,
    pub language: String,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub description: Option<String>,
    pub date_recorded: Option<String>,
    pub location: Option<String>,
    pub collection: Option<String>,
    pub source_page: String,
    pub scraped_date: String,
}

const CONTENT_COLUMNS: &str = "id, title, speaker, content_type, format, file_url,
    file_size_estimate, duration_estimate, language, category, tags, description,
    date_recorded, location, collection, source_page, scraped_date";

fn content_from_row(row: &rusqlite::Row) -> rusqlite::Result<ContentRow> {
    Ok(ContentRow {
        id: row.get(0)?,
        title: row.get(1)?,
        speaker: row.get(2)?,
        content_type: row.get(3)?,
        format: row.get(4)?,
        file_url: row.get(5)?,
        file_size_estimate: row.get(6)?,
        duration_estimate: row.get(7)?,
        language: row.get(8)?,
        category: row.get(9)?,
        tags: row.get(10)?,
        description: row.get(11)?,
        date_recorded: row.get(12)?,
        location: row.get(13)?,
        collection: row.get(14)?,
        source_page: row.get(15)?,
        scraped_date: row.get(16)?,
    })
}

/// Insert content rows (duplicates by file_url are skipped) and mark the pages processed.
pub fn save_content(conn: &Connection, rows: &[ContentRow], page_data_ids: &[i64]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO dhamma_content
             (title, speaker, content_type, format, file_url, file_size_estimate,
              duration_estimate, language, category, tags, description, date_recorded,
              location, collection, source_page, scraped_date)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
        )?;
        for c in rows {
            count += stmt.execute(rusqlite::params![
                c.title, c.speaker, c.content_type, c.format, c.file_url,
                c.file_size_estimate, c.duration_estimate, c.language, c.category,
                c.tags, c.description, c.date_recorded, c.location, c.collection,
                c.source_page, c.scraped_date,
            ])?;
        }

        let mut done = tx.prepare("UPDATE page_data SET processed_at = datetime('now') WHERE id = ?1")?;
        for id in page_data_ids {
            done.execute([id])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

#[derive(Debug, Clone, Default)]
pub struct ContentFilters {
    pub content_type: Option<String>,
    pub speaker: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl ContentFilters {
    fn where_clause(&self, params: &mut Vec<Box<dyn rusqlite::types::ToSql>>) -> String {
        let mut conditions = Vec::new();

        if let Some(t) = &self.content_type {
            params.push(Box::new(t.clone()));
            conditions.push(format!("content_type = ?{}", params.len()));
        }
        if let Some(s) = &self.speaker {
            params.push(Box::new(format!("%{}%", s)));
            conditions.push(format!("speaker LIKE ?{}", params.len()));
        }
        if let Some(c) = &self.category {
            params.push(Box::new(format!("%{}%", c)));
            conditions.push(format!("category LIKE ?{}", params.len()));
        }
        if let Some(l) = &self.language {
            params.push(Box::new(l.clone()));
            conditions.push(format!("language = ?{}", params.len()));
        }
        if let Some(d) = &self.date_from {
            params.push(Box::new(d.clone()));
            conditions.push(format!("date_recorded >= ?{}", params.len()));
        }
        if let Some(d) = &self.date_to {
            params.push(Box::new(d.clone()));
            conditions.push(format!("date_recorded <= ?{}", params.len()));
        }

        conditions.join(" AND ")
    }
}

pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub total_pages: usize,
    pub current_page: usize,
}

/// Newest first, 1-based pages.
pub fn browse(
    conn: &Connection,
    filters: &ContentFilters,
    page: usize,
    per_page: usize,
) -> Result<Paginated<ContentRow>> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let conditions = filters.where_clause(&mut params);
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions)
    };
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();

    let total: usize = conn.query_row(
        &format!("SELECT COUNT(*) FROM dhamma_content{}", where_clause),
        param_refs.as_slice(),
        |r| r.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM dhamma_content{} ORDER BY id DESC LIMIT {} OFFSET {}",
        CONTENT_COLUMNS,
        where_clause,
        per_page,
        (page - 1) * per_page
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(param_refs.as_slice(), content_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated {
        items,
        total,
        total_pages: total.div_ceil(per_page),
        current_page: page,
    })
}

/// Free-text match over title, speaker, description and tags.
pub fn search(
    conn: &Connection,
    query: &str,
    filters: &ContentFilters,
    limit: usize,
) -> Result<Vec<ContentRow>> {
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(format!("%{}%", query))];
    let mut where_clause =
        "(title LIKE ?1 OR speaker LIKE ?1 OR description LIKE ?1 OR tags LIKE ?1)".to_string();
    let extra = filters.where_clause(&mut params);
    if !extra.is_empty() {
        where_clause.push_str(" AND ");
        where_clause.push_str(&extra);
    }

    let sql = format!(
        "SELECT {} FROM dhamma_content WHERE {} ORDER BY title LIMIT {}",
        CONTENT_COLUMNS, where_clause, limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), content_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_content(conn: &Connection, id: i64) -> Result<Option<ContentRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM dhamma_content WHERE id = ?1", CONTENT_COLUMNS),
            [id],
            content_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn all_content(conn: &Connection) -> Result<Vec<ContentRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM dhamma_content ORDER BY id", CONTENT_COLUMNS))?;
    let rows = stmt
        .query_map([], content_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Fields left as `None` are not touched.
#[derive(Debug, Clone, Default)]
pub struct ContentUpdate {
    pub title: Option<String>,
    pub speaker: Option<String>,
    pub content_type: Option<String>,
    pub language: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub description: Option<String>,
    pub date_recorded: Option<String>,
    pub location: Option<String>,
}

impl ContentUpdate {
    fn assignments(&self) -> Vec<(&'static str, &String)> {
        [
            ("title", &self.title),
            ("speaker", &self.speaker),
            ("content_type", &self.content_type),
            ("language", &self.language),
            ("category", &self.category),
            ("tags", &self.tags),
            ("description", &self.description),
            ("date_recorded", &self.date_recorded),
            ("location", &self.location),
        ]
        .into_iter()
        .filter_map(|(col, v)| v.as_ref().map(|v| (col, v)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().is_empty()
    }
}

/// Returns whether a row was changed.
pub fn update_content(conn: &Connection, id: i64, update: &ContentUpdate) -> Result<bool> {
    let assignments = update.assignments();
    if assignments.is_empty() {
        return Ok(false);
    }

    let set_clause = assignments
        .iter()
        .enumerate()
        .map(|(i, (col, _))| format!("{} = ?{}", col, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE dhamma_content SET {} WHERE id = ?{}",
        set_clause,
        assignments.len() + 1
    );

    let mut params: Vec<&dyn rusqlite::types::ToSql> =
        assignments.iter().map(|(_, v)| *v as &dyn rusqlite::types::ToSql).collect();
    params.push(&id);
    let changed = conn.execute(&sql, params.as_slice())?;
    Ok(changed > 0)
}

pub fn speakers(conn: &Connection) -> Result<Vec<(String, usize)>> {
    let mut stmt = conn.prepare(
        "SELECT speaker, COUNT(*) AS n FROM dhamma_content
         WHERE speaker IS NOT NULL AND speaker != ''
         GROUP BY speaker
         ORDER BY n DESC, speaker",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn categories(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT category FROM dhamma_content
         WHERE category IS NOT NULL AND category != ''
         ORDER BY category",
    )?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Quality ──

pub fn ids_missing_speaker(conn: &Connection) -> Result<Vec<(i64, String)>> {
    id_title_rows(
        conn,
        "SELECT id, title FROM dhamma_content WHERE speaker IS NULL OR speaker = '' ORDER BY id",
    )
}

pub fn ids_short_title(conn: &Connection) -> Result<Vec<(i64, String)>> {
    id_title_rows(
        conn,
        "SELECT id, title FROM dhamma_content WHERE LENGTH(TRIM(title)) < 3 ORDER BY id",
    )
}

pub fn ids_local_file_url(conn: &Connection) -> Result<Vec<(i64, String)>> {
    id_title_rows(
        conn,
        "SELECT id, title FROM dhamma_content WHERE file_url LIKE 'file://%' ORDER BY id",
    )
}

/// (title, ids) for every title used by more than one row.
pub fn duplicate_titles(conn: &Connection) -> Result<Vec<(String, Vec<i64>)>> {
    let mut stmt = conn.prepare(
        "SELECT title, GROUP_CONCAT(id) FROM dhamma_content
         WHERE title != ''
         GROUP BY title
         HAVING COUNT(*) > 1
         ORDER BY title",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let title: String = row.get(0)?;
            let ids: String = row.get(1)?;
            Ok((title, ids))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows
        .into_iter()
        .map(|(title, ids)| {
            let mut ids: Vec<i64> = ids.split(',').filter_map(|s| s.parse().ok()).collect();
            ids.sort_unstable();
            (title, ids)
        })
        .collect())
}

fn id_title_rows(conn: &Connection, sql: &str) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct CleanCounts {
    pub invalid: usize,
    pub duplicate_titles: usize,
}

/// Drop rows with blank titles or local file URLs, then keep only the lowest id per title
/// (case-insensitive).
pub fn clean(conn: &Connection) -> Result<CleanCounts> {
    let tx = conn.unchecked_transaction()?;
    let invalid = tx.execute(
        "DELETE FROM dhamma_content WHERE TRIM(title) = '' OR file_url LIKE 'file://%'",
        [],
    )?;
    let duplicate_titles = tx.execute(
        "DELETE FROM dhamma_content WHERE id NOT IN (
             SELECT MIN(id) FROM dhamma_content GROUP BY LOWER(TRIM(title))
         )",
        [],
    )?;
    tx.commit()?;
    Ok(CleanCounts {
        invalid,
        duplicate_titles,
    })
}

// ── Stats ──

#[derive(Debug, serde::Serialize)]
pub struct Stats {
    pub pages: usize,
    pub visited: usize,
    pub fetch_errors: usize,
    pub processed: usize,
    pub total_content: usize,
    pub by_type: Vec<(String, usize)>,
    pub by_language: Vec<(String, usize)>,
    pub by_source_page: Vec<(String, usize)>,
    pub top_speakers: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let pages: usize = conn.query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))?;
    let visited: usize =
        conn.query_row("SELECT COUNT(*) FROM pages WHERE visited = 1", [], |r| r.get(0))?;
    let fetch_errors: usize = conn.query_row(
        "SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let processed: usize = conn.query_row(
        "SELECT COUNT(*) FROM page_data WHERE processed_at IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let total_content: usize =
        conn.query_row("SELECT COUNT(*) FROM dhamma_content", [], |r| r.get(0))?;

    let mut top_speakers = speakers(conn)?;
    top_speakers.truncate(10);

    Ok(Stats {
        pages,
        visited,
        fetch_errors,
        processed,
        total_content,
        by_type: group_count(conn, "content_type")?,
        by_language: group_count(conn, "language")?,
        by_source_page: group_count(conn, "source_page")?,
        top_speakers,
    })
}

/// `column` is always a literal from this module.
fn group_count(conn: &Connection, column: &str) -> Result<Vec<(String, usize)>> {
    let sql = format!(
        "SELECT COALESCE({col}, 'unknown'), COUNT(*) AS n FROM dhamma_content
         GROUP BY {col} ORDER BY n DESC",
        col = column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Tests ──
