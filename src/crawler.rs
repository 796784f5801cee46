use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{self, QueuedPage};
use crate::fetch::Fetcher;

pub struct CrawlStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Fetch pages one at a time with a fixed pause between requests, saving each result as it arrives.
pub async fn crawl_pages(
    conn: &Connection,
    fetcher: &Fetcher,
    pages: Vec<QueuedPage>,
    delay: Duration,
) -> Result<CrawlStats> {
    let total = pages.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")?
            .progress_chars("=> "),
    );

    let mut ok = 0usize;
    let mut errors = 0usize;

    for (i, page) in pages.into_iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        pb.set_message(page.title.clone());

        let row = fetcher.fetch_page(page.id, &page.url).await;
        match &row.error {
            Some(e) => {
                warn!("Failed {}: {}", page.url, e);
                errors += 1;
            }
            None => ok += 1,
        }
        db::save_page_data(conn, &row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} pages ({} ok, {} errors)", total, ok, errors);

    Ok(CrawlStats { total, ok, errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ScrapeConfig;

    #[test]
    fn empty_queue_is_a_no_op() {
        let conn = db::tests::memory_db();
        let fetcher = Fetcher::new(&ScrapeConfig::default()).unwrap();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let stats = rt
            .block_on(crawl_pages(&conn, &fetcher, Vec::new(), Duration::ZERO))
            .unwrap();
        assert_eq!((stats.total, stats.ok, stats.errors), (0, 0, 0));
    }
}
