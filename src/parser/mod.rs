pub mod content;
pub mod html;
pub mod media;
pub mod speaker;

use crate::db::{ContentRow, ScrapedPage};
use html::PageDocument;
use speaker::SpeakerCandidate;

pub struct ExtractedPage {
    pub page_data_id: i64,
    /// Only subpages get a speaker; index pages list many teachers.
    pub speaker: Option<SpeakerCandidate>,
    pub content: Vec<ContentRow>,
}

/// HTML → document → speaker → content rows.
pub fn process_page(page: &ScrapedPage) -> ExtractedPage {
    let doc = PageDocument::parse(&page.html);

    let speaker = (page.kind == "subpage")
        .then(|| speaker::extract_speaker(&doc.context(&page.url, &page.title)));
    let name = speaker.clone().and_then(SpeakerCandidate::into_name);

    let content = content::extract(page, &doc, name.as_deref());

    ExtractedPage {
        page_data_id: page.page_data_id,
        speaker,
        content,
    }
}

// ── Tests ──
