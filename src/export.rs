use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::db::ContentRow;

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "ID")]
    id: Option<i64>,
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Speaker")]
    speaker: Option<&'a str>,
    #[serde(rename = "Content Type")]
    content_type: &'a str,
    #[serde(rename = "File URL")]
    file_url: &'a str,
    #[serde(rename = "File Size Estimate")]
    file_size_estimate: Option<i64>,
    #[serde(rename = "Duration Estimate")]
    duration_estimate: Option<i64>,
    #[serde(rename = "Language")]
    language: &'a str,
    #[serde(rename = "Category")]
    category: Option<&'a str>,
    #[serde(rename = "Tags")]
    tags: Option<&'a str>,
    #[serde(rename = "Description")]
    description: Option<&'a str>,
    #[serde(rename = "Date Recorded")]
    date_recorded: Option<&'a str>,
    #[serde(rename = "Source Page")]
    source_page: &'a str,
    #[serde(rename = "Scraped Date")]
    scraped_date: &'a str,
}

impl<'a> From<&'a ContentRow> for CsvRow<'a> {
    fn from(c: &'a ContentRow) -> Self {
        CsvRow {
            id: c.id,
            title: &c.title,
            speaker: c.speaker.as_deref(),
            content_type: &c.content_type,
            file_url: &c.file_url,
            file_size_estimate: c.file_size_estimate,
            duration_estimate: c.duration_estimate,
            language: &c.language,
            category: c.category.as_deref(),
            tags: c.tags.as_deref(),
            description: c.description.as_deref(),
            date_recorded: c.date_recorded.as_deref(),
            source_page: &c.source_page,
            scraped_date: &c.scraped_date,
        }
    }
}

/// Write the catalog as CSV. Returns the number of records.
pub fn write_csv<W: Write>(rows: &[ContentRow], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(CsvRow::from(row))?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::content;

    fn csv_string(rows: &[ContentRow]) -> String {
        let mut buf = Vec::new();
        write_csv(rows, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn headers_and_quoting() {
        let mut row = content("Anatta, part 1", Some("Mogok Sayadaw"), "https://x.org/a.mp3");
        row.id = Some(4);
        let csv = csv_string(&[row]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,Title,Speaker,Content Type,File URL,File Size Estimate,Duration Estimate,\
             Language,Category,Tags,Description,Date Recorded,Source Page,Scraped Date"
        );
        let record = lines.next().unwrap();
        assert!(record.starts_with("4,\"Anatta, part 1\",Mogok Sayadaw,audio,https://x.org/a.mp3,,,myanmar,"));
    }

    #[test]
    fn myanmar_text_survives() {
        let row = content("ဝိပဿနာ", None, "https://x.org/b.mp3");
        let csv = csv_string(&[row]);
        assert!(csv.contains("ဝိပဿနာ"));
    }

    #[test]
    fn empty_catalog_writes_nothing() {
        let mut buf = Vec::new();
        assert_eq!(write_csv(&[], &mut buf).unwrap(), 0);
    }
}
