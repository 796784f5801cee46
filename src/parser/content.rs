use std::collections::HashSet;

use super::html::PageDocument;
use super::media::{self, ContentType};
use crate::db::{ContentRow, ScrapedPage};
use crate::settings::Section;

const MIN_DESCRIPTION_CHARS: usize = 10;
const MAX_DESCRIPTION_CHARS: usize = 1000;

/// One row per distinct media link on the page.
///
/// Typed pages keep only their own media type; abhidhamma pages (and pages
/// with an unknown section) keep everything.
pub fn extract(page: &ScrapedPage, doc: &PageDocument, speaker: Option<&str>) -> Vec<ContentRow> {
    let section = Section::parse(&page.section);
    let wanted = match section {
        Some(Section::Audio) => Some(ContentType::Audio),
        Some(Section::Video) => Some(ContentType::Video),
        Some(Section::Ebook) => Some(ContentType::Ebook),
        Some(Section::Abhidhamma) | None => None,
    };

    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for link in &doc.links {
        let file_url = media::resolve_url(&link.href, &page.url);
        let Some(kind) = media::media_type(&file_url) else {
            continue;
        };
        if wanted.is_some_and(|w| w != kind) {
            continue;
        }
        if !seen.insert(file_url.clone()) {
            continue;
        }

        let title = match media::clean_title(&link.text) {
            t if t.is_empty() => media::clean_title(&media::file_stem(&file_url)),
            t => t,
        };
        let context_len = link.context.chars().count();
        let description = (MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS)
            .contains(&context_len)
            .then(|| link.context.clone());

        rows.push(ContentRow {
            title,
            speaker: speaker.map(str::to_string),
            content_type: kind.as_str().to_string(),
            format: media::file_format(&file_url),
            language: page.language.clone(),
            category: section.map(|s| s.display_name().to_string()),
            description,
            date_recorded: media::parse_recorded_date(&link.context),
            location: media::parse_location(&link.context),
            collection: link.collection.clone(),
            source_page: page.url.clone(),
            scraped_date: page.scraped_at.clone(),
            file_url,
            ..Default::default()
        });
    }

    rows
}
