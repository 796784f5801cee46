use std::sync::LazyLock;

use regex::Regex;
use url::Url;

const MAX_TITLE_CHARS: usize = 500;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wma", "wav", "m4a", "ogg"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "wmv", "avi", "mov", "mkv", "flv"];
const EBOOK_EXTENSIONS: &[&str] = &["pdf", "epub", "doc", "docx"];

static DATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(\d{4}[-/]\d{1,2}[-/]\d{1,2})\b",
        r"\b(\d{1,2}\s*[-/]\s*\d{1,2}\s*[-/]\s*\d{2,4})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});
static PLACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:at\s+)?([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*,?\s*(?:Singapore|Australia|Malaysia|Myanmar|USA|UK))\b",
    )
    .unwrap()
});
static CENTRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(BBT|BDMS|BSV)[,\s]+\w+").unwrap());
static DISC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:MP[34]\s+)?Disc\s*(\d+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Audio,
    Video,
    Ebook,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Audio => "audio",
            ContentType::Video => "video",
            ContentType::Ebook => "ebook",
        }
    }
}

/// Lowercased extension of the URL path, ignoring query and fragment.
pub fn file_format(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

pub fn media_type(url: &str) -> Option<ContentType> {
    let ext = file_format(url)?;
    let ext = ext.as_str();
    if AUDIO_EXTENSIONS.contains(&ext) {
        Some(ContentType::Audio)
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some(ContentType::Video)
    } else if EBOOK_EXTENSIONS.contains(&ext) {
        Some(ContentType::Ebook)
    } else {
        None
    }
}

/// File name without extension, for links with no anchor text.
pub fn file_stem(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.rsplit_once('.').map(|(s, _)| s).unwrap_or(file);
    stem.replace("%20", " ")
}

/// Resolve `href` against the page it appeared on. Unparseable input is returned as-is.
pub fn resolve_url(href: &str, base: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Collapse whitespace and cap at 500 chars.
pub fn clean_title(title: &str) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_TITLE_CHARS).collect::<String>().trim_end().to_string()
}

pub fn parse_recorded_date(text: &str) -> Option<String> {
    DATE_RES
        .iter()
        .find_map(|re| re.captures(text))
        .map(|caps| caps[1].split_whitespace().collect())
}

pub fn parse_location(text: &str) -> Option<String> {
    if let Some(caps) = PLACE_RE.captures(text) {
        return Some(caps[1].to_string());
    }
    CENTRE_RE.find(text).map(|m| m.as_str().to_string())
}

/// "MP3 Disc 4" -> "Disc 4".
pub fn parse_disc(text: &str) -> Option<String> {
    DISC_RE.captures(text).map(|caps| format!("Disc {}", &caps[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(media_type("https://x.org/a/talk.MP3"), Some(ContentType::Audio));
        assert_eq!(media_type("https://x.org/a/talk.mp4?dl=1"), Some(ContentType::Video));
        assert_eq!(media_type("book.epub"), Some(ContentType::Ebook));
        assert_eq!(media_type("https://x.org/page.htm"), None);
        assert_eq!(media_type("https://x.org/no-extension"), None);
        assert_eq!(file_format("https://x.org/a.b/talk.WMA").as_deref(), Some("wma"));
    }

    #[test]
    fn resolves_relative_links() {
        let base = "https://www.dhammadownload.com/MogokSayadaw.htm";
        assert_eq!(
            resolve_url("mp3/Mogok/01.mp3", base),
            "https://www.dhammadownload.com/mp3/Mogok/01.mp3"
        );
        assert_eq!(
            resolve_url("/File/x.pdf", base),
            "https://www.dhammadownload.com/File/x.pdf"
        );
        assert_eq!(resolve_url("http://other.org/a.mp3", base), "http://other.org/a.mp3");
        assert_eq!(resolve_url("a.mp3", "not a url"), "a.mp3");
    }

    #[test]
    fn stem_and_title() {
        assert_eq!(file_stem("https://x.org/mp3/Anatta%20Talk.mp3"), "Anatta Talk");
        assert_eq!(clean_title("  Anatta \n\t talk  "), "Anatta talk");
        assert_eq!(clean_title(&"x".repeat(600)).len(), 500);
    }

    #[test]
    fn parses_dates() {
        assert_eq!(parse_recorded_date("Talk (2005-03-12)").as_deref(), Some("2005-03-12"));
        assert_eq!(parse_recorded_date("Recorded 12/3/2005 at BBT").as_deref(), Some("12/3/2005"));
        assert_eq!(parse_recorded_date("Recorded 12 - 3 - 05").as_deref(), Some("12-3-05"));
        assert_eq!(parse_recorded_date("Talk number 12"), None);
    }

    #[test]
    fn parses_locations() {
        assert_eq!(
            parse_location("Recorded at Yangon, Myanmar in 2005").as_deref(),
            Some("Yangon, Myanmar")
        );
        assert_eq!(parse_location("Retreat BDMS, Kuching").as_deref(), Some("BDMS, Kuching"));
        assert_eq!(parse_location("plain text"), None);
    }

    #[test]
    fn parses_discs() {
        assert_eq!(parse_disc("MP3 Disc 4 : talks").as_deref(), Some("Disc 4"));
        assert_eq!(parse_disc("disc12").as_deref(), Some("Disc 12"));
        assert_eq!(parse_disc("Discourse"), None);
    }
}
