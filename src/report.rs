use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use url::Url;

use crate::db::{self, ContentRow};
use crate::parser::media;
use crate::quality::{self, IssueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleScript {
    Myanmar,
    English,
    Mixed,
    Other,
}

impl TitleScript {
    pub fn of(title: &str) -> Self {
        let myanmar = title.chars().any(|c| ('\u{1000}'..='\u{109F}').contains(&c));
        let latin = title.chars().any(|c| c.is_ascii_alphabetic());
        match (myanmar, latin) {
            (true, true) => TitleScript::Mixed,
            (true, false) => TitleScript::Myanmar,
            (false, true) => TitleScript::English,
            (false, false) => TitleScript::Other,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TitleScript::Myanmar => "myanmar",
            TitleScript::English => "english",
            TitleScript::Mixed => "mixed",
            TitleScript::Other => "other",
        }
    }
}

#[derive(Serialize)]
pub struct Analytics {
    pub stats: db::Stats,
    pub title_scripts: BTreeMap<TitleScript, usize>,
    pub extensions: Vec<(String, usize)>,
    pub domains: Vec<(String, usize)>,
    pub with_speaker: usize,
    pub distinct_speakers: usize,
    /// Speakers with more than one content type.
    pub multi_type_speakers: usize,
    pub issues: Vec<(IssueKind, usize)>,
}

pub fn analyze(conn: &Connection) -> Result<Analytics> {
    let stats = db::get_stats(conn)?;
    let rows = db::all_content(conn)?;
    let issues = quality::count_by_kind(&quality::quality_issues(conn)?);
    Ok(analyze_rows(stats, &rows, issues))
}

fn analyze_rows(stats: db::Stats, rows: &[ContentRow], issues: Vec<(IssueKind, usize)>) -> Analytics {
    let mut title_scripts = BTreeMap::new();
    let mut extensions: HashMap<String, usize> = HashMap::new();
    let mut domains: HashMap<String, usize> = HashMap::new();
    let mut speaker_types: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut with_speaker = 0;

    for row in rows {
        *title_scripts.entry(TitleScript::of(&row.title)).or_insert(0) += 1;
        if let Some(ext) = media::file_format(&row.file_url) {
            *extensions.entry(ext).or_insert(0) += 1;
        }
        if let Some(host) = Url::parse(&row.file_url).ok().and_then(|u| u.host_str().map(str::to_string)) {
            *domains.entry(host).or_insert(0) += 1;
        }
        if let Some(speaker) = row.speaker.as_deref().filter(|s| !s.is_empty()) {
            with_speaker += 1;
            speaker_types.entry(speaker).or_default().insert(row.content_type.as_str());
        }
    }

    Analytics {
        stats,
        title_scripts,
        extensions: sorted_counts(extensions),
        domains: sorted_counts(domains),
        with_speaker,
        distinct_speakers: speaker_types.len(),
        multi_type_speakers: speaker_types.values().filter(|t| t.len() > 1).count(),
        issues,
    }
}

/// Highest count first, ties by name.
fn sorted_counts(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut v: Vec<_> = counts.into_iter().collect();
    v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn table(out: &mut String, header: &str, rows: &[(String, usize)]) {
    let _ = writeln!(out, "| {} | Count |", header);
    let _ = writeln!(out, "|---|---|");
    for (name, n) in rows {
        let _ = writeln!(out, "| {} | {} |", name, n);
    }
    out.push('\n');
}

pub fn render_markdown(a: &Analytics, generated_at: DateTime<Utc>) -> String {
    let total = a.stats.total_content;
    let mut out = String::new();

    out.push_str("# Dhamma Catalog Analytics\n\n");
    let _ = writeln!(out, "Generated: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));

    out.push_str("## Overview\n\n");
    let _ = writeln!(out, "- Total items: {}", total);
    let _ = writeln!(
        out,
        "- Pages queued: {} ({} fetched, {} failed)",
        a.stats.pages, a.stats.visited, a.stats.fetch_errors
    );
    let _ = writeln!(out, "- Pages processed: {}\n", a.stats.processed);
    table(&mut out, "Content type", &a.stats.by_type);
    table(&mut out, "Language", &a.stats.by_language);

    out.push_str("## Title script\n\n");
    let scripts: Vec<(String, usize)> = a
        .title_scripts
        .iter()
        .map(|(s, n)| (s.as_str().to_string(), *n))
        .collect();
    table(&mut out, "Script", &scripts);

    out.push_str("## Files\n\n");
    table(&mut out, "Extension", &a.extensions);
    table(&mut out, "Domain", &a.domains);

    out.push_str("## Speakers\n\n");
    let _ = writeln!(
        out,
        "- Items with a speaker: {} ({:.1}%)",
        a.with_speaker,
        percent(a.with_speaker, total)
    );
    let _ = writeln!(out, "- Distinct speakers: {}", a.distinct_speakers);
    let _ = writeln!(out, "- Speakers across several content types: {}\n", a.multi_type_speakers);
    table(&mut out, "Top speaker", &a.stats.top_speakers);

    out.push_str("## Quality\n\n");
    let issues: Vec<(String, usize)> = a
        .issues
        .iter()
        .map(|(k, n)| (k.as_str().to_string(), *n))
        .collect();
    table(&mut out, "Issue", &issues);

    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    #[serde(flatten)]
    analytics: &'a Analytics,
}

/// Machine-readable form of the same analytics.
pub fn render_json(a: &Analytics, generated_at: DateTime<Utc>) -> Result<String> {
    let report = JsonReport {
        generated_at: generated_at.to_rfc3339(),
        analytics: a,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{content, memory_db};
    use chrono::TimeZone;

    #[test]
    fn detects_title_script() {
        assert_eq!(TitleScript::of("ဝိပဿနာ"), TitleScript::Myanmar);
        assert_eq!(TitleScript::of("Anatta talk"), TitleScript::English);
        assert_eq!(TitleScript::of("Disc 1 ဝိပဿနာ"), TitleScript::Mixed);
        assert_eq!(TitleScript::of("01-02"), TitleScript::Other);
    }

    #[test]
    fn report_sections() {
        let conn = memory_db();
        let mut video = content("ဝိပဿနာ", Some("Mogok Sayadaw"), "https://cdn.example.org/v.mp4");
        video.content_type = "video".into();
        let rows = vec![
            content("Anatta", Some("Mogok Sayadaw"), "https://www.dhammadownload.com/a.mp3"),
            content("Dukkha", None, "https://www.dhammadownload.com/b.mp3"),
            video,
        ];
        db::save_content(&conn, &rows, &[]).unwrap();

        let a = analyze(&conn).unwrap();
        assert_eq!(a.with_speaker, 2);
        assert_eq!(a.distinct_speakers, 1);
        assert_eq!(a.multi_type_speakers, 1);
        assert_eq!(a.extensions[0], ("mp3".to_string(), 2));
        assert_eq!(a.domains[0], ("www.dhammadownload.com".to_string(), 2));
        assert_eq!(a.title_scripts.get(&TitleScript::Myanmar), Some(&1));

        let when = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let md = render_markdown(&a, when);
        assert!(md.contains("Generated: 2024-05-01 10:00:00 UTC"));
        assert!(md.contains("- Total items: 3"));
        assert!(md.contains("| missing_speaker | 1 |"));
        assert!(md.contains("Items with a speaker: 2 (66.7%)"));
    }

    #[test]
    fn json_report_mirrors_analytics() {
        let conn = memory_db();
        let rows = vec![
            content("Anatta", Some("Mogok Sayadaw"), "https://www.dhammadownload.com/a.mp3"),
            content("ဝိပဿနာ", None, "https://www.dhammadownload.com/b.mp3"),
        ];
        db::save_content(&conn, &rows, &[]).unwrap();

        let a = analyze(&conn).unwrap();
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let v: serde_json::Value = serde_json::from_str(&render_json(&a, when).unwrap()).unwrap();
        assert_eq!(v["generated_at"], "2024-05-01T10:00:00+00:00");
        assert_eq!(v["stats"]["total_content"], 2);
        assert_eq!(v["with_speaker"], 1);
        assert_eq!(v["title_scripts"]["myanmar"], 1);
        assert_eq!(v["title_scripts"]["english"], 1);
        assert_eq!(v["extensions"][0][0], "mp3");
        assert_eq!(v["issues"][0][0], "missing_speaker");
    }
}
