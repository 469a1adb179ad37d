//! Splits a full NACE document into one [`Segment`] per top-level section.
//!
//! A segment starts at a `# Section <LETTER> <dash>` heading and runs up to
//! the next one. Lines before the first heading are discarded. Lines are
//! trimmed; their order and line breaks are kept.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Segment;

static SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^# Section [A-Z][ \t]*[–—-]").expect("segment pattern compiles"));

/// Dash separators tried in order when deriving a segment name.
const SEPARATORS: [char; 3] = ['–', '—', '-'];

/// Name of a section heading: the text before its first dash separator.
fn segment_name(heading: &str) -> String {
    SEPARATORS
        .iter()
        .find_map(|sep| heading.split_once(*sep))
        .map(|(name, _)| name.trim().to_string())
        .unwrap_or_else(|| heading.trim().to_string())
}

/// Cut `text` into section segments, in document order.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for raw in text.split('\n') {
        let line = raw.trim();
        if SEGMENT_RE.is_match(line) {
            if let Some((name, lines)) = current.take() {
                segments.push(Segment {
                    name,
                    content: lines.join("\n"),
                });
            }
            current = Some((segment_name(line), vec![line]));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }

    if let Some((name, lines)) = current {
        segments.push(Segment {
            name,
            content: lines.join("\n"),
        });
    }

    segments
}
