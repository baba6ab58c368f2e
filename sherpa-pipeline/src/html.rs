//! HTML-to-text conversion for model prompts.

use scraper::{ElementRef, Html, Selector};

const INVISIBLE: [&str; 5] = ["script", "style", "noscript", "template", "head"];

const BLOCKS: [&str; 19] = [
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table", "article",
    "section", "header", "footer", "blockquote", "pre",
];

fn compact_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract `<title>` text.
pub fn title_from_html(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()
        .map(|el| compact_ws(&el.text().collect::<String>()))?;
    (!title.is_empty()).then_some(title)
}

/// Visible text, one line per block element, whitespace collapsed inside
/// each line. Entities are decoded by the parser.
pub fn text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut out = String::new();
    for node in root.descendants() {
        if let Some(el) = ElementRef::wrap(node) {
            let name = el.value().name();
            if name == "br" || BLOCKS.contains(&name) {
                out.push('\n');
            }
            continue;
        }
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| INVISIBLE.contains(&e.name()))
        });
        if !hidden {
            let text: &str = text;
            out.push_str(text);
        }
    }

    out.lines()
        .map(compact_ws)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_scripts_and_styles() {
        let html = r#"<html><head><title> Rust &amp; Co </title><style>p{color:red}</style>
            <script>var x = "<p>";</script></head>
            <body><h1>Release</h1><p>Rust   1.90 is <b>out</b>.</p><div>Read more</div>
            <noscript>enable js</noscript></body></html>"#;
        assert_eq!(title_from_html(html).as_deref(), Some("Rust & Co"));
        let text = text_from_html(html);
        assert!(!text.contains("color:red"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("enable js"));
        assert!(text.contains("Release\nRust 1.90 is out.\nRead more"), "{text}");
    }

    #[test]
    fn bare_angle_brackets_and_entities_survive() {
        let text = text_from_html("<p>if a < b and c > d then stop</p><p>x &#8217; y &mdash; z</p>");
        assert_eq!(text, "if a < b and c > d then stop\nx \u{2019} y \u{2014} z");
    }

    #[test]
    fn missing_title_is_none() {
        assert_eq!(title_from_html("<p>no head</p>"), None);
        assert_eq!(title_from_html("<title>  </title>"), None);
    }
}
