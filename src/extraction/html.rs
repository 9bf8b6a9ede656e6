//! HTML text extraction.
//!
//! Walks the parsed DOM collecting visible text while skipping subtrees
//! matched by the configured removal lists, then collapses whitespace runs.

use std::sync::OnceLock;

use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node};
use tracing::debug;

use super::ExtractedBlock;
use crate::config::HtmlStripConfig;

/// Extracts the visible text of an HTML page as one normalized block.
///
/// Subtrees whose element matches a configured tag name, or a configured
/// (tag, class) pair, are dropped wholesale. Runs of spaces collapse to a
/// single space and runs of newlines to a single newline.
pub fn extract_html(body: &[u8], strip: &HtmlStripConfig) -> ExtractedBlock {
    let markup = String::from_utf8_lossy(body);
    let document = Html::parse_document(&markup);

    let mut raw = String::new();
    collect_text(document.root_element(), strip, &mut raw);

    ExtractedBlock::new(normalize_whitespace(&raw))
}

fn collect_text(element: ElementRef<'_>, strip: &HtmlStripConfig, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if should_strip(child_element.value(), strip) {
                debug!(tag = child_element.value().name(), "dropping stripped element");
                continue;
            }
            collect_text(child_element, strip, out);
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
}

fn should_strip(element: &Element, strip: &HtmlStripConfig) -> bool {
    let name = element.name();
    if strip.tags.iter().any(|tag| tag.eq_ignore_ascii_case(name)) {
        return true;
    }
    strip.tag_classes.iter().any(|(tag, class)| {
        tag.eq_ignore_ascii_case(name) && element.classes().any(|candidate| candidate == class)
    })
}

fn normalize_whitespace(text: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static NEWLINES: OnceLock<Regex> = OnceLock::new();

    let spaces = SPACES.get_or_init(|| Regex::new(r"[ \t]+").expect("static pattern"));
    let newlines = NEWLINES.get_or_init(|| Regex::new(r"\s*\n\s*").expect("static pattern"));

    let collapsed = spaces.replace_all(text, " ");
    let collapsed = newlines.replace_all(&collapsed, "\n");
    collapsed.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_config() -> HtmlStripConfig {
        HtmlStripConfig {
            tags: vec!["script".to_string(), "style".to_string()],
            tag_classes: vec![("div".to_string(), "sidebar".to_string())],
        }
    }

    #[test]
    fn strips_configured_tags() {
        let body = b"<html><body><script>bad</script><p>Thesis intro should be concise.</p></body></html>";
        let block = extract_html(body, &strip_config());
        assert_eq!(block.text, "Thesis intro should be concise.");
    }

    #[test]
    fn strips_tag_class_pairs() {
        let body = b"<html><body>\
            <div class=\"sidebar\">menu junk</div>\
            <div class=\"content\">Keep this text.</div>\
            </body></html>";
        let block = extract_html(body, &strip_config());
        assert_eq!(block.text, "Keep this text.");
    }

    #[test]
    fn collapses_whitespace_runs() {
        let body = b"<html><body><p>spaced    out</p>\n\n\n<p>lines</p></body></html>";
        let block = extract_html(body, &strip_config());
        assert!(!block.text.contains("  "), "double space in {:?}", block.text);
        assert!(!block.text.contains("\n\n"), "double newline in {:?}", block.text);
    }

    #[test]
    fn keeps_unlisted_classes() {
        let body = b"<html><body><div class=\"other\">visible</div></body></html>";
        let block = extract_html(body, &strip_config());
        assert_eq!(block.text, "visible");
    }

    #[test]
    fn nested_stripped_subtrees_disappear() {
        let body = b"<html><body><div class=\"sidebar\"><p>inner <b>junk</b></p></div><p>kept</p></body></html>";
        let block = extract_html(body, &strip_config());
        assert_eq!(block.text, "kept");
    }

    #[test]
    fn empty_page_yields_empty_text() {
        let block = extract_html(b"<html><body></body></html>", &strip_config());
        assert!(block.text.is_empty());
    }
}
