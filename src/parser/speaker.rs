use std::iter;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

const MAX_NAME_CHARS: usize = 100;
const MIN_NAME_CHARS: usize = 3;
const MAX_CAPTURE_CHARS: usize = 50;

/// A name is a run of words that each start with an uppercase or uncased letter.
/// Lowercase words ("in", "at") end the run, so trailing context never leaks into the name.
const NAME: &str = r"([\p{Lu}\p{Lo}][\p{L}\p{M}.']*(?: [\p{Lu}\p{Lo}][\p{L}\p{M}.']*)*)";

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{M}\s.\-]").unwrap());
static NUMBER_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\d\s]+[။.]*").unwrap());
static PAREN_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\(.+\)$").unwrap());
static MYANMAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{Myanmar}").unwrap());

static HONORIFIC_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(?i:venerable|ven\.?|sayadaw|ashin|u)\s+",
        r"\b(?i:dr)\.?\s+",
        r"\b(?i:professor)\s+",
    ]
    .iter()
    .map(|prefix| Regex::new(&format!("{prefix}{NAME}")).unwrap())
    .collect()
});

static LABEL_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(?i:by)\s+",
        r"\b(?i:speaker):\s*",
        r"\b(?i:teacher):\s*",
        r"\b(?i:taught\s+by)\s+",
    ]
    .iter()
    .map(|prefix| Regex::new(&format!("{prefix}{NAME}")).unwrap())
    .collect()
});

// Longest honorific first: "ဆရာတော်" is a suffix of the first entry.
static MYANMAR_HONORIFIC_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"ပါမောက္ခချုပ်ဆရာတော်ကြီး\s*[\p{Myanmar}\s]{1,100}",
        r"ဘဒ္ဒန္တ\s*[\p{Myanmar}\s]{1,100}",
        r"ဒေါက်တာ\s*[\p{Myanmar}\s]{1,100}",
        r"ဆရာတော်\s*[\p{Myanmar}\s]{1,50}",
        r"ဦး\s*[\p{Myanmar}\s]{1,50}",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static DATE_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}|\d{2}/\d{2}").unwrap());
static FILE_WORD_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(mp3|video|audio|download)").unwrap());

static INVALID_NAME_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\d+$",
        r"(?i)^(mp3|video|audio|download|file|htm|html)$",
        r"^\d{4}(-\d{2}){0,2}$",
        r"(?i)^(page|content|media|link|website)$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static MEDIA_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-mp3|-video|-ebook").unwrap());
static UPPER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\p{Lu})").unwrap());
static URL_STEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(.+)\.html?$").unwrap());
static CAMEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\p{Ll})(\p{Lu})").unwrap());

/// Everything the extractor may look at for one subpage.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub source_url: String,
    /// Anchor text of the index-page link that led here.
    pub subpage_title: String,
    pub page_title: String,
    /// H1/H2/H3 texts in document order.
    pub headings: Vec<String>,
    pub body_first_line: String,
}

impl PageContext {
    /// Page title, headings, then the first body line; blanks skipped.
    fn prominent_texts(&self) -> impl Iterator<Item = &str> {
        iter::once(self.page_title.as_str())
            .chain(self.headings.iter().map(String::as_str))
            .chain(iter::once(self.body_first_line.as_str()))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    ShortCircuitMyanmarTitle,
    HonorificPattern,
    LabelPattern,
    ExtendedMyanmarHonorific,
    BroadMyanmarFallback,
    PlausibleTextFallback,
    SubpageTitleHeuristic,
    UrlHeuristic,
    TerminalFallback,
}

impl Strategy {
    /// Evaluation order. `TerminalFallback` is applied separately since it never fails.
    pub const CHAIN: [Strategy; 8] = [
        Strategy::ShortCircuitMyanmarTitle,
        Strategy::HonorificPattern,
        Strategy::LabelPattern,
        Strategy::ExtendedMyanmarHonorific,
        Strategy::BroadMyanmarFallback,
        Strategy::PlausibleTextFallback,
        Strategy::SubpageTitleHeuristic,
        Strategy::UrlHeuristic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::ShortCircuitMyanmarTitle => "myanmar_title",
            Strategy::HonorificPattern => "honorific",
            Strategy::LabelPattern => "label",
            Strategy::ExtendedMyanmarHonorific => "myanmar_honorific",
            Strategy::BroadMyanmarFallback => "myanmar_text",
            Strategy::PlausibleTextFallback => "plausible_text",
            Strategy::SubpageTitleHeuristic => "subpage_title",
            Strategy::UrlHeuristic => "url",
            Strategy::TerminalFallback => "terminal",
        }
    }

    /// Prominent-text strategies must pass `is_valid_speaker_name`.
    fn validates(self) -> bool {
        matches!(
            self,
            Strategy::HonorificPattern
                | Strategy::LabelPattern
                | Strategy::ExtendedMyanmarHonorific
                | Strategy::BroadMyanmarFallback
                | Strategy::PlausibleTextFallback
        )
    }

    /// Cleaned candidates in the order they should be tried.
    pub fn candidates(self, ctx: &PageContext) -> Vec<String> {
        match self {
            Strategy::ShortCircuitMyanmarTitle => myanmar_title(&ctx.subpage_title).into_iter().collect(),
            Strategy::HonorificPattern => ctx.prominent_texts().filter_map(honorific_name).collect(),
            Strategy::LabelPattern => ctx.prominent_texts().filter_map(labelled_name).collect(),
            Strategy::ExtendedMyanmarHonorific => {
                ctx.prominent_texts().filter_map(myanmar_honorific_name).collect()
            }
            Strategy::BroadMyanmarFallback => ctx.prominent_texts().filter_map(myanmar_text).collect(),
            Strategy::PlausibleTextFallback => ctx.prominent_texts().filter_map(plausible_text).collect(),
            Strategy::SubpageTitleHeuristic => subpage_title_name(&ctx.subpage_title).into_iter().collect(),
            Strategy::UrlHeuristic => url_name(&ctx.source_url).into_iter().collect(),
            Strategy::TerminalFallback => vec![terminal_name(&ctx.subpage_title)],
        }
    }
}

/// A speaker guess tagged with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerCandidate {
    pub name: String,
    pub strategy: Strategy,
}

impl SpeakerCandidate {
    /// `None` when even the terminal fallback cleaned down to nothing.
    pub fn into_name(self) -> Option<String> {
        if self.name.is_empty() {
            None
        } else {
            Some(self.name)
        }
    }
}

/// Best-guess speaker for a subpage. Total: always returns, at worst via `TerminalFallback`.
pub fn extract_speaker(ctx: &PageContext) -> SpeakerCandidate {
    for strategy in Strategy::CHAIN {
        let accepted = strategy
            .candidates(ctx)
            .into_iter()
            .find(|name| !strategy.validates() || is_valid_speaker_name(name));
        if let Some(name) = accepted {
            debug!(strategy = strategy.as_str(), speaker = %name, url = %ctx.source_url, "speaker extracted");
            return SpeakerCandidate { name, strategy };
        }
    }

    let name = terminal_name(&ctx.subpage_title);
    debug!(speaker = %name, url = %ctx.source_url, "speaker fell back to subpage title");
    SpeakerCandidate {
        name,
        strategy: Strategy::TerminalFallback,
    }
}

/// Collapse whitespace, keep letters/marks/spaces/`.`/`-`, trim, cap at 100 chars. Idempotent.
pub fn clean_speaker_name(name: &str) -> String {
    let kept = DISALLOWED_RE.replace_all(name, "");
    let collapsed = WS_RE.replace_all(&kept, " ");
    let truncated: String = collapsed.trim().chars().take(MAX_NAME_CHARS).collect();
    truncated.trim_end().to_string()
}

pub fn is_valid_speaker_name(name: &str) -> bool {
    let len = name.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len) {
        return false;
    }
    let trimmed = name.trim();
    !INVALID_NAME_RES.iter().any(|re| re.is_match(trimmed))
}

fn has_myanmar_block(text: &str) -> bool {
    text.chars().any(|c| ('\u{1000}'..='\u{109F}').contains(&c))
}

/// Drop a "၁၄၁။ " style numbering prefix and a trailing "(...)".
fn strip_title_affixes(title: &str) -> String {
    let without_prefix = NUMBER_PREFIX_RE.replace(title, "");
    PAREN_SUFFIX_RE.replace(&without_prefix, "").trim().to_string()
}

fn normalize_ws(text: &str) -> String {
    WS_RE.replace_all(text, " ").trim().to_string()
}

fn non_empty(name: String) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Tiers without validation still refuse names that clean down below the minimum length.
fn long_enough(name: String) -> Option<String> {
    if name.chars().count() < MIN_NAME_CHARS {
        None
    } else {
        Some(name)
    }
}

// ── Strategies ──

fn myanmar_title(subpage_title: &str) -> Option<String> {
    if !has_myanmar_block(subpage_title) {
        return None;
    }
    Some(clean_speaker_name(&strip_title_affixes(subpage_title)))
}

/// Cut a captured name back to the last word boundary within `MAX_CAPTURE_CHARS`.
/// A single word longer than that is cut mid-word.
fn bounded_capture(name: &str) -> String {
    if name.chars().count() <= MAX_CAPTURE_CHARS {
        return name.to_string();
    }
    let mut kept = String::new();
    for word in name.split(' ') {
        let extra = if kept.is_empty() { 0 } else { 1 };
        if kept.chars().count() + extra + word.chars().count() > MAX_CAPTURE_CHARS {
            break;
        }
        if extra == 1 {
            kept.push(' ');
        }
        kept.push_str(word);
    }
    if kept.is_empty() {
        name.chars().take(MAX_CAPTURE_CHARS).collect()
    } else {
        kept
    }
}

fn first_name_capture(patterns: &[Regex], text: &str) -> Option<(String, String)> {
    patterns.iter().find_map(|re| {
        re.captures_iter(text).find_map(|caps| {
            let whole = caps.get(0)?.as_str();
            let name = bounded_capture(caps.get(1)?.as_str().trim());
            if name.chars().count() >= MIN_NAME_CHARS {
                Some((whole.to_string(), name))
            } else {
                None
            }
        })
    })
}

fn honorific_name(text: &str) -> Option<String> {
    let text = normalize_ws(text);
    let (whole, name) = first_name_capture(&HONORIFIC_RES, &text)?;
    let honorific = whole.split(' ').next().unwrap_or_default();
    non_empty(clean_speaker_name(&format!("{} {}", honorific, name)))
}

fn labelled_name(text: &str) -> Option<String> {
    let text = normalize_ws(text);
    let (_, name) = first_name_capture(&LABEL_RES, &text)?;
    non_empty(clean_speaker_name(&name))
}

fn myanmar_honorific_name(text: &str) -> Option<String> {
    let text = normalize_ws(text);
    MYANMAR_HONORIFIC_RES
        .iter()
        .find_map(|re| re.find(&text))
        .and_then(|m| non_empty(clean_speaker_name(m.as_str())))
}

fn myanmar_text(text: &str) -> Option<String> {
    if !MYANMAR_RE.is_match(text) {
        return None;
    }
    non_empty(clean_speaker_name(text))
}

fn plausible_text(text: &str) -> Option<String> {
    let text = normalize_ws(text);
    let len = text.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len)
        || DATE_LIKE_RE.is_match(&text)
        || FILE_WORD_PREFIX_RE.is_match(&text)
    {
        return None;
    }
    non_empty(clean_speaker_name(&text))
}

/// "MogokSayadaw-mp3" -> "Mogok Sayadaw".
fn subpage_title_name(subpage_title: &str) -> Option<String> {
    let stripped = MEDIA_SUFFIX_RE.replace_all(subpage_title, "");
    let spaced = UPPER_RE.replace_all(&stripped, " ${1}");
    let readable = spaced.trim();
    let len = readable.chars().count();
    if !(MIN_NAME_CHARS..MAX_NAME_CHARS).contains(&len) {
        return None;
    }
    long_enough(clean_speaker_name(readable))
}

/// ".../Dr-Nandamalabhivamsa.htm" -> "Dr Nandamalabhivamsa".
fn url_name(source_url: &str) -> Option<String> {
    let url = Url::parse(source_url).ok()?;
    let segment = urlencoding::decode(url.path_segments()?.last()?).ok()?;
    let caps = URL_STEM_RE.captures(&segment)?;
    let stem = caps[1].replace('-', " ");
    let readable = CAMEL_RE.replace_all(&stem, "${1} ${2}");
    let readable = readable.trim();
    let len = readable.chars().count();
    if !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len) {
        return None;
    }
    long_enough(clean_speaker_name(readable))
}

fn terminal_name(subpage_title: &str) -> String {
    clean_speaker_name(&strip_title_affixes(subpage_title))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PageContext {
        PageContext::default()
    }

    #[test]
    fn myanmar_title_short_circuits() {
        let c = PageContext {
            subpage_title: "၁၄၁။ ဆရာတော် မိုးကုတ်ဆရာတော် (မြန်မာ)".into(),
            page_title: "Dr. Nandamalabhivamsa - Biography".into(),
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::ShortCircuitMyanmarTitle);
        assert_eq!(s.name, "ဆရာတော် မိုးကုတ်ဆရာတော်");
    }

    #[test]
    fn honorific_in_page_title() {
        let c = PageContext {
            page_title: "Dr. Nandamalabhivamsa - Biography".into(),
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::HonorificPattern);
        assert_eq!(s.name, "Dr. Nandamalabhivamsa");
    }

    #[test]
    fn honorific_keeps_nested_titles() {
        let c = PageContext {
            headings: vec!["Dhamma talks of Sayadaw U Tejaniya, 2010".into()],
            ..ctx()
        };
        assert_eq!(extract_speaker(&c).name, "Sayadaw U Tejaniya");
    }

    #[test]
    fn label_in_heading_stops_before_date() {
        let c = PageContext {
            headings: vec!["Taught by Mogok Sayadaw in 2005".into()],
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::LabelPattern);
        assert_eq!(s.name, "Mogok Sayadaw");
    }

    #[test]
    fn label_with_colon() {
        let c = PageContext {
            body_first_line: "Teacher: Bhikkhu Bodhi".into(),
            ..ctx()
        };
        assert_eq!(extract_speaker(&c).name, "Bhikkhu Bodhi");
    }

    #[test]
    fn myanmar_honorific_in_heading() {
        let c = PageContext {
            page_title: "Dhamma Download".into(),
            headings: vec!["ဒေါက်တာ နန္ဒမာလာဘိဝံသ ၏ တရားတော်များ".into()],
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::ExtendedMyanmarHonorific);
        assert!(s.name.starts_with("ဒေါက်တာ"));
    }

    #[test]
    fn plausible_title_accepted() {
        let c = PageContext {
            page_title: "Bhikkhu Bodhi Dhamma Talks".into(),
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::PlausibleTextFallback);
        assert_eq!(s.name, "Bhikkhu Bodhi Dhamma Talks");
    }

    #[test]
    fn rejected_candidate_moves_to_next_text() {
        let c = PageContext {
            page_title: "Content".into(),
            headings: vec!["Mogok Dhamma".into()],
            ..ctx()
        };
        assert_eq!(extract_speaker(&c).name, "Mogok Dhamma");
    }

    #[test]
    fn bare_year_is_invalid() {
        assert!(!is_valid_speaker_name("2024"));
        assert!(!is_valid_speaker_name("2024-01-15"));
        assert!(!is_valid_speaker_name("12345"));
        assert!(!is_valid_speaker_name("MP3"));
        assert!(!is_valid_speaker_name("Website"));
        assert!(!is_valid_speaker_name("U"));
        assert!(is_valid_speaker_name("Mogok Sayadaw"));
    }

    #[test]
    fn year_title_falls_through_to_subpage_title() {
        let c = PageContext {
            page_title: "2024".into(),
            subpage_title: "MogokSayadaw-mp3".into(),
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::SubpageTitleHeuristic);
        assert_eq!(s.name, "Mogok Sayadaw");
    }

    #[test]
    fn url_fallback() {
        let c = PageContext {
            source_url: "https://example.com/Dr-Nandamalabhivamsa.htm".into(),
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::UrlHeuristic);
        assert_eq!(s.name, "Dr Nandamalabhivamsa");
    }

    #[test]
    fn url_fallback_splits_camel_case() {
        assert_eq!(
            url_name("https://www.dhammadownload.com/PaukTawYaSayadaw.html").as_deref(),
            Some("Pauk Taw Ya Sayadaw")
        );
        assert_eq!(url_name("https://www.dhammadownload.com/"), None);
    }

    #[test]
    fn url_fallback_decodes_percent_escapes() {
        assert_eq!(
            url_name("https://www.dhammadownload.com/Mogok%20Sayadaw.htm?x=1#top").as_deref(),
            Some("Mogok Sayadaw")
        );
        assert_eq!(
            url_name(
                "https://www.dhammadownload.com/%E1%80%99%E1%80%AD%E1%80%AF%E1%80%B8%E1%80%80%E1%80%AF%E1%80%90%E1%80%BA%E1%80%86%E1%80%9B%E1%80%AC%E1%80%90%E1%80%B1%E1%80%AC%E1%80%BA.htm"
            )
            .as_deref(),
            Some("မိုးကုတ်ဆရာတော်")
        );
        assert_eq!(url_name("not a url"), None);
    }

    #[test]
    fn long_honorific_name_is_cut_at_a_word_boundary() {
        let c = PageContext {
            page_title: "Dhamma talks 2010 by Venerable Ledi Sayadaw Aggamahapandita Bhaddanta Nyanadhaja Mahathera".into(),
            subpage_title: "LediSayadaw-mp3".into(),
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::HonorificPattern);
        assert_eq!(s.name, "Venerable Ledi Sayadaw Aggamahapandita Bhaddanta Nyanadhaja");
    }

    #[test]
    fn captured_names_stay_within_fifty_chars() {
        assert_eq!(bounded_capture("Mogok Sayadaw"), "Mogok Sayadaw");
        let long = "Ab ".repeat(30);
        let cut = bounded_capture(long.trim());
        assert!(cut.chars().count() <= 50);
        assert!(!cut.ends_with(' '));
        assert_eq!(bounded_capture(&"A".repeat(60)).chars().count(), 50);
    }

    #[test]
    fn myanmar_text_without_honorific_uses_broad_fallback() {
        let heading = "မဟာစည် တရားတော်များ";
        let c = PageContext {
            page_title: "2024".into(),
            headings: vec![heading.into()],
            subpage_title: "Mahasi-mp3".into(),
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::BroadMyanmarFallback);
        assert_eq!(s.name, heading);
    }

    #[test]
    fn terminal_fallback_when_nothing_matches() {
        let c = PageContext {
            subpage_title: "12 (x)".into(),
            source_url: "https://www.dhammadownload.com/42.htm".into(),
            ..ctx()
        };
        let s = extract_speaker(&c);
        assert_eq!(s.strategy, Strategy::TerminalFallback);
        assert_eq!(s.clone().into_name(), None);
        assert_eq!(s.name, "");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let long = "Bhante ".repeat(30);
        let inputs = [
            "  Ven.  Sayadaw\tU  Pandita (1921) ",
            "Ashin & Ñāṇa - *Bodhi*",
            "ဆရာတော်   ဦးဇောတိက ၂၀၀၅",
            long.as_str(),
        ];
        for input in inputs {
            let once = clean_speaker_name(input);
            assert_eq!(clean_speaker_name(&once), once, "input: {:?}", input);
            assert!(once.chars().count() <= 100);
        }
        assert_eq!(clean_speaker_name("Ashin & Ñāṇa"), "Ashin Ñāṇa");
    }

    #[test]
    fn extraction_is_total() {
        let weird = ["", " ", "()", "၁၂၃", "日本語の講話", "🙏🙏🙏", "-mp3", "a"];
        for title in weird {
            for text in weird {
                let c = PageContext {
                    source_url: text.into(),
                    subpage_title: title.into(),
                    page_title: text.into(),
                    headings: vec![text.into(), title.into()],
                    body_first_line: text.into(),
                };
                let s = extract_speaker(&c);
                assert!(s.name.chars().count() <= 100);
                assert_eq!(clean_speaker_name(&s.name), s.name);
            }
        }
    }

    #[test]
    fn long_myanmar_title_is_truncated() {
        let c = PageContext {
            subpage_title: "ဆရာတော် ".repeat(40),
            ..ctx()
        };
        assert_eq!(extract_speaker(&c).name.chars().count(), 100);
    }
}
