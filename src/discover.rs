use std::collections::HashSet;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{self, PageRow};
use crate::fetch::Fetcher;
use crate::parser::html::PageDocument;
use crate::parser::media;
use crate::settings::CategoryTarget;

/// Hrefs containing any of these are site navigation, not teacher pages.
const NAV_MARKERS: &[&str] = &[
    "mailto:",
    "index.htm",
    "contact.htm",
    "facebook.com",
    "Suggestion",
    "usefullinks",
    "live.htm",
    "news",
    "Contribute",
    // other category indexes
    "InEnglish.htm",
    "InMyanmar.htm",
];

pub struct DiscoverStats {
    pub targets: usize,
    pub failed: usize,
    pub queued: usize,
}

/// (url, title) of every teacher subpage linked from an index page.
pub fn parse_subpage_links(html: &str, page_url: &str) -> Vec<(String, String)> {
    let doc = PageDocument::parse(html);
    let mut seen = HashSet::new();

    doc.links
        .into_iter()
        .filter(|link| link.href.ends_with(".htm"))
        .filter(|link| !NAV_MARKERS.iter().any(|m| link.href.contains(m)))
        .filter(|link| link.text.chars().count() > 3)
        .filter_map(|link| {
            let url = media::resolve_url(&link.href, page_url);
            if url == page_url || !seen.insert(url.clone()) {
                return None;
            }
            Some((url, media::clean_title(&link.text)))
        })
        .collect()
}

/// Fetch each index page, store it for processing, and queue its subpages.
pub async fn discover(
    conn: &Connection,
    fetcher: &Fetcher,
    targets: &[CategoryTarget],
) -> Result<DiscoverStats> {
    let mut stats = DiscoverStats {
        targets: targets.len(),
        failed: 0,
        queued: 0,
    };

    for target in targets {
        let index = PageRow {
            url: target.url.clone(),
            kind: "index".to_string(),
            title: String::new(),
            category: target.key.clone(),
            section: target.section.as_str().to_string(),
            language: target.language.clone(),
        };
        db::insert_pages(conn, std::slice::from_ref(&index))?;
        let Some(page_id) = db::page_id(conn, &target.url)? else {
            continue;
        };

        info!("Fetching index {} ({})", target.key, target.url);
        let row = fetcher.fetch_page(page_id, &target.url).await;
        let html = row.html.clone();
        db::save_page_data(conn, &row)?;

        let Some(html) = html else {
            warn!(
                "Index {} failed: {}",
                target.key,
                row.error.as_deref().unwrap_or("no body")
            );
            stats.failed += 1;
            continue;
        };

        let subpages: Vec<PageRow> = parse_subpage_links(&html, &target.url)
            .into_iter()
            .map(|(url, title)| PageRow {
                url,
                kind: "subpage".to_string(),
                title,
                category: target.key.clone(),
                section: target.section.as_str().to_string(),
                language: target.language.clone(),
            })
            .collect();
        let new = db::insert_pages(conn, &subpages)?;
        info!("{}: {} subpages ({} new)", target.key, subpages.len(), new);
        stats.queued += new;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_URL: &str = "https://www.dhammadownload.com/AudioInMyanmar.htm";

    #[test]
    fn index_fixture_subpages() {
        let html = std::fs::read_to_string("tests/fixtures/audio_myanmar_index.htm").unwrap();
        let links = parse_subpage_links(&html, INDEX_URL);
        let urls: Vec<&str> = links.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.dhammadownload.com/MogokSayadaw.htm",
                "https://www.dhammadownload.com/UJotika.htm",
                "https://www.dhammadownload.com/Pa-Auk-Sayadaw.htm",
            ]
        );
        assert_eq!(links[0].1, "Mogok Sayadaw");
        assert_eq!(links[2].1, "၁၄၁။ ဖားအောက်ဆရာတော် (တောရ)");
    }

    #[test]
    fn self_links_and_short_text_are_skipped() {
        let html = r#"<a href="AudioInMyanmar.htm">Audio in Myanmar</a>
            <a href="Abc.htm">Abc</a>
            <a href="Teacher.htm">Some Teacher</a>"#;
        let links = parse_subpage_links(html, "https://www.dhammadownload.com/Other.htm");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].0, "https://www.dhammadownload.com/Teacher.htm");
    }

    #[test]
    fn discover_queues_nothing_without_targets() {
        let conn = db::tests::memory_db();
        let fetcher = Fetcher::new(&crate::settings::ScrapeConfig::default()).unwrap();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let stats = rt.block_on(discover(&conn, &fetcher, &[])).unwrap();
        assert_eq!((stats.targets, stats.queued), (0, 0));
    }
}
