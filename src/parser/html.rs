use scraper::{ElementRef, Html, Node, Selector};

use super::media::parse_disc;
use super::speaker::PageContext;

/// An `<a href>` with its anchor text and the text of its parent element.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    pub href: String,
    pub text: String,
    pub context: String,
    /// Last "Disc N" marker seen before the link in document order.
    pub collection: Option<String>,
}

/// The parts of a page the extractors look at.
#[derive(Debug, Clone, Default)]
pub struct PageDocument {
    pub title: String,
    pub headings: Vec<String>,
    pub body_first_line: String,
    pub links: Vec<PageLink>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// Element text with whitespace runs collapsed.
fn element_text(el: ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

impl PageDocument {
    pub fn parse(html: &str) -> Self {
        let doc = Html::parse_document(html);

        let title = doc
            .select(&selector("title"))
            .next()
            .map(element_text)
            .unwrap_or_default();

        let headings = doc
            .select(&selector("h1, h2, h3"))
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();

        // Literal first line of the body text. Usually blank, since most bodies open with a newline.
        let body_first_line = doc
            .select(&selector("body"))
            .next()
            .and_then(|body| {
                body.text()
                    .collect::<String>()
                    .lines()
                    .next()
                    .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            })
            .unwrap_or_default();

        // Walk the tree in document order so disc headings carry over to the links below them.
        let mut collection = None;
        let mut links = Vec::new();
        for node in doc.tree.root().descendants() {
            match node.value() {
                Node::Text(text) => {
                    if let Some(disc) = parse_disc(text) {
                        collection = Some(disc);
                    }
                }
                Node::Element(el) if el.name() == "a" => {
                    let Some(href) = el.attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
                        continue;
                    };
                    let Some(a) = ElementRef::wrap(node) else {
                        continue;
                    };
                    let context = a
                        .parent()
                        .and_then(ElementRef::wrap)
                        .map(element_text)
                        .unwrap_or_default();
                    links.push(PageLink {
                        href: href.to_string(),
                        text: element_text(a),
                        context,
                        collection: collection.clone(),
                    });
                }
                _ => {}
            }
        }

        PageDocument {
            title,
            headings,
            body_first_line,
            links,
        }
    }

    pub fn context(&self, source_url: &str, subpage_title: &str) -> PageContext {
        PageContext {
            source_url: source_url.to_string(),
            subpage_title: subpage_title.to_string(),
            page_title: self.title.clone(),
            headings: self.headings.clone(),
            body_first_line: self.body_first_line.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::speaker::{extract_speaker, Strategy};

    const PAGE: &str = r#"<html><head><title>
        Dhamma Talks by Sayadaw U Jotika
    </title></head>
    <body>
      <div>Welcome to   Dhamma Download</div>
      <h1>Sayadaw U Jotika</h1>
      <h3></h3>
      <h2>Talks  in English</h2>
      <p>Disc 1 : <a href="mp3/jotika/01.mp3">Anatta   talk</a> (Yangon, Myanmar)</p>
      <p>MP3 Disc 2</p>
      <a href="">empty</a>
      <div><a href="mp3/jotika/02.mp3">Dukkha</a></div>
      <a name="anchor">no href</a>
    </body></html>"#;

    #[test]
    fn parses_prominent_text() {
        let doc = PageDocument::parse(PAGE);
        assert_eq!(doc.title, "Dhamma Talks by Sayadaw U Jotika");
        assert_eq!(doc.headings, vec!["Sayadaw U Jotika", "Talks in English"]);
        assert!(doc.body_first_line.is_empty());
    }

    #[test]
    fn body_first_line_is_the_literal_first_line() {
        let doc = PageDocument::parse(
            "<html><body>Teacher: Bhikkhu  Bodhi<br>\n<div>Home | Audio</div></body></html>",
        );
        assert_eq!(doc.body_first_line, "Teacher: Bhikkhu Bodhi");
    }

    #[test]
    fn nav_text_after_leading_newline_is_not_a_candidate() {
        let doc = PageDocument::parse(
            "<html><head><title>2024</title></head><body>\n<div>Home | Audio | Video</div><p>talks</p></body></html>",
        );
        assert!(doc.body_first_line.is_empty());

        let s = extract_speaker(&doc.context(
            "https://www.dhammadownload.com/MogokSayadaw.htm",
            "MogokSayadaw-mp3",
        ));
        assert_eq!(s.strategy, Strategy::SubpageTitleHeuristic);
        assert_eq!(s.name, "Mogok Sayadaw");
    }

    #[test]
    fn collects_links_with_parent_text() {
        let doc = PageDocument::parse(PAGE);
        assert_eq!(doc.links.len(), 2);
        let link = &doc.links[0];
        assert_eq!(link.href, "mp3/jotika/01.mp3");
        assert_eq!(link.text, "Anatta talk");
        assert_eq!(link.context, "Disc 1 : Anatta talk (Yangon, Myanmar)");
        assert_eq!(link.collection.as_deref(), Some("Disc 1"));
    }

    #[test]
    fn disc_marker_carries_to_following_links() {
        let doc = PageDocument::parse(PAGE);
        assert_eq!(doc.links[1].href, "mp3/jotika/02.mp3");
        assert_eq!(doc.links[1].collection.as_deref(), Some("Disc 2"));
    }

    #[test]
    fn context_carries_page_fields() {
        let doc = PageDocument::parse(PAGE);
        let ctx = doc.context("https://www.dhammadownload.com/UJotika.htm", "Sayadaw U Jotika");
        assert_eq!(ctx.page_title, doc.title);
        assert_eq!(ctx.headings.len(), 2);
        assert_eq!(ctx.subpage_title, "Sayadaw U Jotika");
    }

    #[test]
    fn garbage_input_yields_empty_document() {
        let doc = PageDocument::parse("<<<not html");
        assert!(doc.title.is_empty());
        assert!(doc.links.is_empty());
    }
}
