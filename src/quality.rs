use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

use crate::db;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingSpeaker,
    EmptyTitle,
    DuplicateTitle,
    InvalidUrl,
}

impl IssueKind {
    pub const ALL: [IssueKind; 4] = [
        IssueKind::MissingSpeaker,
        IssueKind::EmptyTitle,
        IssueKind::DuplicateTitle,
        IssueKind::InvalidUrl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::MissingSpeaker => "missing_speaker",
            IssueKind::EmptyTitle => "empty_title",
            IssueKind::DuplicateTitle => "duplicate_title",
            IssueKind::InvalidUrl => "invalid_url",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub description: String,
    pub suggested_fix: String,
    pub content_id: i64,
}

/// Every issue in the catalog, one per affected row.
pub fn quality_issues(conn: &Connection) -> Result<Vec<QualityIssue>> {
    let mut issues = Vec::new();

    for (id, title) in db::ids_missing_speaker(conn)? {
        issues.push(QualityIssue {
            kind: IssueKind::MissingSpeaker,
            severity: Severity::Medium,
            description: format!("No speaker for \"{}\"", title),
            suggested_fix: "Set the speaker from the source page or file name".to_string(),
            content_id: id,
        });
    }

    for (id, title) in db::ids_short_title(conn)? {
        issues.push(QualityIssue {
            kind: IssueKind::EmptyTitle,
            severity: Severity::High,
            description: format!("Title too short: \"{}\"", title),
            suggested_fix: "Use a descriptive title".to_string(),
            content_id: id,
        });
    }

    for (title, ids) in db::duplicate_titles(conn)? {
        for id in &ids {
            issues.push(QualityIssue {
                kind: IssueKind::DuplicateTitle,
                severity: Severity::Low,
                description: format!("\"{}\" is shared by {} items", title, ids.len()),
                suggested_fix: "Add a disc or part number to tell them apart".to_string(),
                content_id: *id,
            });
        }
    }

    for (id, title) in db::ids_local_file_url(conn)? {
        issues.push(QualityIssue {
            kind: IssueKind::InvalidUrl,
            severity: Severity::High,
            description: format!("Local file URL for \"{}\"", title),
            suggested_fix: "Replace with the public download URL or remove".to_string(),
            content_id: id,
        });
    }

    Ok(issues)
}

/// (kind, count) for every kind, including zero counts.
pub fn count_by_kind(issues: &[QualityIssue]) -> Vec<(IssueKind, usize)> {
    IssueKind::ALL
        .iter()
        .map(|&kind| (kind, issues.iter().filter(|i| i.kind == kind).count()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{content, memory_db};

    #[test]
    fn issues_cover_every_kind() {
        let conn = memory_db();
        let rows = vec![
            content("Anatta", Some("Mogok Sayadaw"), "https://x.org/1.mp3"),
            content("Anatta", Some("Mogok Sayadaw"), "https://x.org/2.mp3"),
            content("Dukkha", None, "https://x.org/3.mp3"),
            content("ab", Some("U Pandita"), "file:///tmp/4.mp3"),
        ];
        db::save_content(&conn, &rows, &[]).unwrap();

        let issues = quality_issues(&conn).unwrap();
        let counts = count_by_kind(&issues);
        assert_eq!(
            counts,
            vec![
                (IssueKind::MissingSpeaker, 1),
                (IssueKind::EmptyTitle, 1),
                (IssueKind::DuplicateTitle, 2),
                (IssueKind::InvalidUrl, 1),
            ]
        );

        let missing = issues.iter().find(|i| i.kind == IssueKind::MissingSpeaker).unwrap();
        assert_eq!(missing.content_id, 3);
        assert_eq!(missing.severity, Severity::Medium);
        assert!(issues
            .iter()
            .filter(|i| i.kind == IssueKind::DuplicateTitle)
            .all(|i| i.severity == Severity::Low));
    }

    #[test]
    fn clean_catalog_has_no_issues() {
        let conn = memory_db();
        let rows = vec![content("Anatta", Some("Mogok Sayadaw"), "https://x.org/1.mp3")];
        db::save_content(&conn, &rows, &[]).unwrap();
        assert!(quality_issues(&conn).unwrap().is_empty());
    }

    #[test]
    fn serializes_kind_as_snake_case() {
        let json = serde_json::to_string(&IssueKind::MissingSpeaker).unwrap();
        assert_eq!(json, "\"missing_speaker\"");
    }
}
