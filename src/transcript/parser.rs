//! Timedtext caption parsing
//!
//! The caption endpoint returns XML of the form
//! `<transcript><text start="0.5" dur="1.2">Hello &amp;amp; welcome</text>...</transcript>`.
//! Text is entity-escaped once by XML and often a second time by the
//! provider, and may carry inline markup such as `<i>`. Both layers are
//! removed here.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::TranscriptSegment;
use crate::error::{AppError, Result};

static TEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("text").expect("valid selector"));

/// Parse a timedtext document into ordered segments.
///
/// An empty body is reported the way an XML parser would ("no element
/// found"); callers treat that as "no captions".
pub fn parse_timedtext(xml: &str) -> Result<Vec<TranscriptSegment>> {
    if xml.trim().is_empty() {
        return Err(AppError::UnknownRetrieval(
            "no element found: empty caption response".to_string(),
        ));
    }

    let document = Html::parse_fragment(xml);
    let mut segments = Vec::new();

    for element in document.select(&TEXT_SELECTOR) {
        let raw: String = element.text().collect();
        let text = clean_caption_text(&raw);
        if text.is_empty() {
            continue;
        }

        let attr = |name: &str| {
            element
                .value()
                .attr(name)
                .and_then(|value| value.parse::<f64>().ok())
                .unwrap_or(0.0)
        };

        segments.push(TranscriptSegment {
            text,
            start: attr("start"),
            duration: attr("dur"),
        });
    }

    if segments.is_empty() && !xml.contains("<text") {
        return Err(AppError::UnknownRetrieval(
            "no element found: caption response had no text elements".to_string(),
        ));
    }

    Ok(segments)
}

/// Undo the provider's second escaping layer and drop inline tags
fn clean_caption_text(raw: &str) -> String {
    let mut text = raw.to_string();

    // First pass decodes entities, second strips the markup they revealed
    for _ in 0..2 {
        if !text.contains('&') && !text.contains('<') {
            break;
        }
        text = Html::parse_fragment(&text).root_element().text().collect();
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
