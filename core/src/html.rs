use lazy_static::lazy_static;
use scraper::{Html, Selector};

lazy_static! {
    static ref BODY: Selector = Selector::parse("body").expect("valid selector");
    static ref TITLE: Selector = Selector::parse("title").expect("valid selector");
}

/// Elements whose text never contributes to the indexed body.
const SKIPPED_ELEMENTS: &[&str] = &["a", "script", "style", "noscript", "template"];

/// Reduces an HTML document to the plain text of its body, with anchors
/// removed and whitespace collapsed to single spaces.
pub fn clean_html(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Some(body) = doc.select(&BODY).next() else {
        return String::new();
    };
    let mut out = String::with_capacity(html.len() / 2);
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let skipped = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if skipped {
            continue;
        }
        out.push_str(text);
        out.push(' ');
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the document's `<title>`, trimmed; empty when absent.
pub fn extract_title(html: &str) -> String {
    let doc = Html::parse_document(html);
    doc.select(&TITLE)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
