//! NACE taxonomy document parser.
//!
//! Reconstructs the four-level NACE hierarchy (section → division → group →
//! class) from the semi-structured markdown rendering of the classification
//! and emits one [`ClassificationRecord`] per class.
//!
//! # Algorithm
//!
//! A single forward pass over trimmed lines. Each line is matched against
//! the heading patterns in the fixed order section → division → group →
//! class, producing a [`LineMatch`]. A [`ParseState`] carrying the current
//! section, division, and group is folded over those matches:
//!
//! 1. Blank and purely numeric lines are skipped.
//! 2. A section heading resets the current section and scans up to
//!    [`DESCRIPTION_WINDOW`] lines for `"This section includes"`.
//! 3. A division heading resets the current division the same way.
//! 4. A group heading is accepted only when its two-digit prefix equals the
//!    current division code. Otherwise it is ignored.
//! 5. A class heading repairs the division and group from its own code when
//!    they disagree, then emits a record if a section is open, collecting
//!    included/excluded activities from the next [`ACTIVITY_WINDOW`] lines.
//! 6. Output is sorted by class code.
//!
//! The parser never fails. Lines it cannot place are dropped.
//!
//! # Example
//!
//! ```rust
//! use nace_core::parser::parse;
//!
//! let text = "# Section A – Agriculture\n01 Crop production\n01.1 Non-perennial crops\n01.11 Growing of cereals\n";
//! let records = parse(text);
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].group_code, "01.1");
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::{Activity, Ancestor, ClassificationRecord};

/// Lines scanned after a heading (counting the heading) for its description.
pub const DESCRIPTION_WINDOW: usize = 10;

/// Lines joined into one sliding window when looking for a marker.
const DESCRIPTION_SPAN: usize = 3;

/// Lines scanned after a class heading (counting the heading) for activities.
pub const ACTIVITY_WINDOW: usize = 50;

pub const SECTION_MARKER: &str = "This section includes";
pub const DIVISION_MARKER: &str = "This division includes";
pub const GROUP_MARKER: &str = "This group includes";
pub const CLASS_INCLUDES_MARKER: &str = "This class includes:";
pub const CLASS_EXCLUDES_MARKER: &str = "This class excludes:";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^# Section ([A-Z])\s*[–—-]\s*(.+)$").expect("section pattern compiles")
});
// Code headings may carry any markdown heading level, so a stray `# 10 Facts`
// line is read as division 10.
static DIVISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:#{1,6}\s*)?([0-9]{2})\s+(.+)$").expect("division pattern compiles")
});
static GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:#{1,6}\s*)?([0-9]{2}\.[0-9])\s+(.+)$").expect("group pattern compiles")
});
static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:#{1,6}\s*)?([0-9]{2}\.[0-9]{2})\s+(.+)$").expect("class pattern compiles")
});

/// Outcome of matching one trimmed line against the heading patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMatch<'a> {
    Section { code: &'a str, name: &'a str },
    Division { code: &'a str, name: &'a str },
    Group { code: &'a str, name: &'a str },
    Class { code: &'a str, name: &'a str },
    NoMatch,
}

/// Match a trimmed line against the heading patterns.
///
/// Patterns are tried in the order section, division, group, class. The
/// numeric formats are mutually exclusive so at most one can fire.
pub fn match_line(line: &str) -> LineMatch<'_> {
    let captures = |re: &Regex| {
        re.captures(line).and_then(|c| {
            let code = c.get(1)?.as_str();
            let name = c.get(2)?.as_str();
            Some((code, name))
        })
    };

    if let Some((code, name)) = captures(&SECTION_RE) {
        LineMatch::Section { code, name }
    } else if let Some((code, name)) = captures(&DIVISION_RE) {
        LineMatch::Division { code, name }
    } else if let Some((code, name)) = captures(&GROUP_RE) {
        LineMatch::Group { code, name }
    } else if let Some((code, name)) = captures(&CLASS_RE) {
        LineMatch::Class { code, name }
    } else {
        LineMatch::NoMatch
    }
}

/// Look for `marker` in the lines following `heading` and return the rest
/// of the marker's line, trimmed.
///
/// Windows of three consecutive lines starting at `heading + 1` up to (but
/// excluding) `heading + window` are searched in order. Returns `None` when
/// no window contains the marker.
pub fn scan_description(
    lines: &[&str],
    heading: usize,
    window: usize,
    marker: &str,
) -> Option<String> {
    let end = (heading + window).min(lines.len());
    for j in (heading + 1)..end {
        let span_end = (j + DESCRIPTION_SPAN).min(lines.len());
        let text = lines[j..span_end].join("\n");
        if let Some(pos) = text.find(marker) {
            let rest = &text[pos + marker.len()..];
            let line = rest.split('\n').next().unwrap_or_default();
            return Some(line.trim().to_string());
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Includes,
    Excludes,
}

/// Collect the included and excluded activities listed after a class
/// heading.
///
/// Scans from `heading + 1` up to (but excluding) `heading + window`, and
/// stops early at the next class heading or at any line starting with `#`.
/// Blank lines are skipped without ending the scan.
pub fn parse_activities(
    lines: &[&str],
    heading: usize,
    window: usize,
) -> (Vec<Activity>, Vec<Activity>) {
    let mut included: Vec<Activity> = Vec::new();
    let mut excluded: Vec<Activity> = Vec::new();
    let mut mode: Option<Mode> = None;

    let end = (heading + window).min(lines.len());
    for raw in lines.iter().take(end).skip(heading + 1) {
        let line = raw.trim();

        if is_class_heading(line) || line.starts_with('#') {
            break;
        }

        if line.contains(CLASS_INCLUDES_MARKER) {
            mode = Some(Mode::Includes);
        } else if line.contains(CLASS_EXCLUDES_MARKER) {
            mode = Some(Mode::Excludes);
        } else if line.is_empty() {
            continue;
        }

        let list = match mode {
            Some(Mode::Includes) => &mut included,
            Some(Mode::Excludes) => &mut excluded,
            None => continue,
        };

        if line.starts_with('-') {
            let text = line
                .trim_start_matches(['-', ' '])
                .trim_end_matches(':');
            list.push(Activity::new(text));
        } else if line.starts_with('*') {
            // Only the latest activity of this mode can own a sub-activity.
            if let Some(owner) = list.last_mut().filter(|a| !a.activity.is_empty()) {
                let text = line.trim_start_matches(['*', ' ']).trim();
                owner.subactivities.push(text.to_string());
            }
        }
    }

    (included, excluded)
}

/// True when `line` is a class heading whose code token is five characters.
fn is_class_heading(line: &str) -> bool {
    CLASS_RE.is_match(line) && line.split_whitespace().next().map(str::len) == Some(5)
}

/// Accumulator threaded through the line fold.
#[derive(Debug, Default)]
pub struct ParseState {
    section: Ancestor,
    division: Ancestor,
    group: Ancestor,
    seen: HashSet<String>,
    records: Vec<ClassificationRecord>,
}

impl ParseState {
    /// Apply the line at `index` and return the updated state.
    pub fn apply(mut self, lines: &[&str], index: usize) -> Self {
        let line = lines[index].trim();
        if line.is_empty() || line.chars().all(|c| c.is_ascii_digit()) {
            return self;
        }

        match match_line(line) {
            LineMatch::Section { code, name } => {
                self.section = Ancestor::new(code, name);
                if let Some(desc) = scan_description(lines, index, DESCRIPTION_WINDOW, SECTION_MARKER)
                {
                    self.section.description = desc;
                }
            }
            LineMatch::Division { code, name } => {
                self.division = Ancestor::new(code, name);
                if let Some(desc) =
                    scan_description(lines, index, DESCRIPTION_WINDOW, DIVISION_MARKER)
                {
                    self.division.description = desc;
                }
            }
            LineMatch::Group { code, name } => {
                if code[..2] != self.division.code {
                    debug!(
                        group = code,
                        division = %self.division.code,
                        "group heading outside current division, ignored"
                    );
                    return self;
                }
                self.group = Ancestor::new(code, name);
                if let Some(desc) = scan_description(lines, index, DESCRIPTION_WINDOW, GROUP_MARKER)
                {
                    self.group.description = desc;
                }
            }
            LineMatch::Class { code, name } => {
                if !self.seen.contains(code) {
                    self.apply_class(lines, index, code, name);
                }
            }
            LineMatch::NoMatch => {}
        }

        self
    }

    fn apply_class(&mut self, lines: &[&str], index: usize, code: &str, name: &str) {
        let division_code = &code[..2];
        let group_code = &code[..4];

        if self.division.code != division_code {
            debug!(class = code, "division recovered from class code");
            self.division = Ancestor::code_only(division_code);
        }
        if self.group.code != group_code {
            debug!(class = code, "group recovered from class code");
            self.group = Ancestor::code_only(group_code);
        }

        if self.section.code.is_empty() {
            debug!(class = code, "class outside any section, dropped");
            return;
        }

        let mut record = ClassificationRecord::from_ancestors(
            &self.section,
            &self.division,
            &self.group,
            code,
            name,
        );
        let (included, excluded) = parse_activities(lines, index, ACTIVITY_WINDOW);
        record.included_activities = included;
        record.excluded_activities = excluded;

        self.records.push(record);
        self.seen.insert(code.to_string());
    }

    /// Finish the pass: records sorted by class code.
    pub fn finish(self) -> Vec<ClassificationRecord> {
        let mut records = self.records;
        records.sort_by(|a, b| a.class_code.cmp(&b.class_code));
        records
    }
}

/// Parse a NACE markdown document into leaf class records.
///
/// Deterministic and infallible: malformed or inconsistent lines are
/// skipped. The result is sorted by `class_code` and contains each class
/// code at most once.
pub fn parse(text: &str) -> Vec<ClassificationRecord> {
    let lines: Vec<&str> = text.split('\n').collect();
    (0..lines.len())
        .fold(ParseState::default(), |state, i| state.apply(&lines, i))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Section A – Agriculture
This section includes farming activities.
01 Crop production
This division includes growing of crops.
01.1 Growing of non-perennial crops
01.11 Growing of cereals
This class includes:
- Growing of wheat
* Winter wheat
This class excludes:
- Growing of sugar cane
01.12 Growing of rice
";

    fn codes(records: &[ClassificationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.class_code.as_str()).collect()
    }

    #[test]
    fn test_end_to_end_sample() {
        let records = parse(SAMPLE);
        assert_eq!(codes(&records), vec!["01.11", "01.12"]);

        for r in &records {
            assert_eq!(r.section_code, "A");
            assert_eq!(r.section_name, "Agriculture");
            assert_eq!(r.division_code, "01");
            assert_eq!(r.group_code, "01.1");
        }

        let cereals = &records[0];
        assert_eq!(cereals.class_name, "Growing of cereals");
        assert_eq!(cereals.included_activities.len(), 1);
        assert_eq!(cereals.included_activities[0].activity, "Growing of wheat");
        assert_eq!(cereals.included_activities[0].subactivities, vec!["Winter wheat"]);
        assert_eq!(cereals.excluded_activities.len(), 1);
        assert_eq!(cereals.excluded_activities[0].activity, "Growing of sugar cane");
        assert!(cereals.excluded_activities[0].subactivities.is_empty());

        let rice = &records[1];
        assert!(rice.included_activities.is_empty());
        assert!(rice.excluded_activities.is_empty());
    }

    #[test]
    fn test_descriptions_scanned() {
        let records = parse(SAMPLE);
        let r = &records[0];
        assert_eq!(r.section_description, "farming activities.");
        assert_eq!(r.division_name, "Crop production");
        assert_eq!(r.division_description, "growing of crops.");
        assert_eq!(r.group_name, "Growing of non-perennial crops");
        assert_eq!(r.group_description, "");
        assert_eq!(r.class_description, "");
    }

    #[test]
    fn test_group_description_scanned() {
        let text = "# Section A - Agriculture\n01 Crops\n01.1 Cereals\n\nThis group includes the growing of grain.\n01.11 Wheat\n";
        let records = parse(text);
        assert_eq!(records[0].group_description, "the growing of grain.");
    }

    #[test]
    fn test_code_headings_accept_any_heading_level() {
        for line in ["# 10 Facts", "### 10 Facts", "###### 10 Facts", "10 Facts"] {
            assert_eq!(
                match_line(line),
                LineMatch::Division { code: "10", name: "Facts" },
                "{}",
                line
            );
        }
        assert_eq!(match_line("####### 10 Facts"), LineMatch::NoMatch);
        assert_eq!(
            match_line("## 10.71 Manufacture of bread"),
            LineMatch::Class { code: "10.71", name: "Manufacture of bread" }
        );

        // A heading-level division line resets the open division.
        let text = "# Section C - Manufacturing\n10 Food products\n# 11 Beverages\n10.1 Meat\n10.11 Processing of meat\n";
        let records = parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].division_code, "10");
        assert_eq!(records[0].division_name, "");
        assert_eq!(records[0].group_code, "10.1");
        assert_eq!(records[0].group_name, "");
    }

    #[test]
    fn test_match_line_priority() {
        assert_eq!(
            match_line("# Section B — Mining and quarrying"),
            LineMatch::Section { code: "B", name: "Mining and quarrying" }
        );
        assert_eq!(
            match_line("# Section C-Manufacturing"),
            LineMatch::Section { code: "C", name: "Manufacturing" }
        );
        assert_eq!(
            match_line("05 Mining of coal"),
            LineMatch::Division { code: "05", name: "Mining of coal" }
        );
        assert_eq!(
            match_line("###### 05.1 Mining of hard coal"),
            LineMatch::Group { code: "05.1", name: "Mining of hard coal" }
        );
        assert_eq!(
            match_line("05.10 Mining of hard coal"),
            LineMatch::Class { code: "05.10", name: "Mining of hard coal" }
        );
        assert_eq!(match_line("123 Main Street"), LineMatch::NoMatch);
        assert_eq!(match_line("05.101 Too precise"), LineMatch::NoMatch);
        assert_eq!(match_line("Section A – lowercase marker"), LineMatch::NoMatch);
    }

    #[test]
    fn test_heading_prefixes_accepted() {
        let text = "# Section A – Agriculture\n###### 01 Crop production\n###### 01.1 Cereals\n###### 01.11 Wheat\n";
        let records = parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].division_name, "Crop production");
        assert_eq!(records[0].group_name, "Cereals");
    }

    #[test]
    fn test_numeric_lines_skipped() {
        let text = "# Section A – Agriculture\n01 Crops\n42\n01.1 Cereals\n01.11 Wheat\n";
        let records = parse(text);
        assert_eq!(records[0].division_name, "Crops");
        assert_eq!(records[0].group_name, "Cereals");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(parse(SAMPLE), parse(SAMPLE));
    }

    #[test]
    fn test_output_sorted_by_class_code() {
        let text = "\
# Section A – Agriculture
02 Forestry
02.1 Silviculture
02.10 Silviculture and other forestry activities
01 Crop production
01.1 Non-perennial crops
01.13 Growing of vegetables
01.11 Growing of cereals
";
        let records = parse(text);
        assert_eq!(codes(&records), vec!["01.11", "01.13", "02.10"]);
    }

    #[test]
    fn test_duplicate_class_emitted_once() {
        let text = "\
# Section A – Agriculture
01 Crop production
01.1 Non-perennial crops
01.11 Growing of cereals
This class includes:
- Wheat
01.11 Growing of cereals again
This class includes:
- Barley
";
        let records = parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].class_name, "Growing of cereals");
        assert_eq!(records[0].included_activities[0].activity, "Wheat");
    }

    #[test]
    fn test_class_before_any_section_dropped() {
        let text = "\
01 Crop production
01.1 Non-perennial crops
01.11 Growing of cereals
# Section A – Agriculture
01.12 Growing of rice
";
        let records = parse(text);
        assert_eq!(codes(&records), vec!["01.12"]);
        assert_eq!(records[0].division_name, "Crop production");
    }

    #[test]
    fn test_orphan_class_can_be_emitted_later() {
        let text = "01.11 Early\n# Section A – Agriculture\n01.11 Growing of cereals\n";
        let records = parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].class_name, "Growing of cereals");
    }

    #[test]
    fn test_group_outside_division_ignored() {
        let text = "\
# Section A – Agriculture
01 Crop production
02.1 Stray group
01.11 Growing of cereals
";
        let records = parse(text);
        assert_eq!(records[0].group_code, "01.1");
        assert_eq!(records[0].group_name, "");
    }

    #[test]
    fn test_missing_division_recovered_from_class() {
        let text = "\
# Section A – Agriculture
01 Crop production
01.1 Non-perennial crops
01.11 Growing of cereals
02.10 Silviculture
";
        let records = parse(text);
        let forestry = &records[1];
        assert_eq!(forestry.division_code, "02");
        assert_eq!(forestry.division_name, "");
        assert_eq!(forestry.division_description, "");
        assert_eq!(forestry.group_code, "02.1");
        assert_eq!(forestry.group_name, "");
    }

    #[test]
    fn test_hierarchy_consistency() {
        let text = "\
# Section A – Agriculture
01 Crop production
01.1 Non-perennial crops
01.11 Cereals
01.2 Perennial crops
01.21 Grapes
03.11 Marine fishing
# Section B – Mining
05 Coal
05.10 Hard coal
";
        let records = parse(text);
        assert_eq!(records.len(), 4);
        for r in &records {
            assert!(r.group_code.starts_with(&r.division_code));
            assert_eq!(&r.class_code[..4], r.group_code);
        }
        let sections: Vec<&str> = records.iter().map(|r| r.section_code.as_str()).collect();
        assert_eq!(sections, vec!["A", "A", "A", "B"]);
    }

    #[test]
    fn test_subactivity_without_activity_in_mode_dropped() {
        let text = "\
# Section A – Agriculture
01 Crop production
01.1 Non-perennial crops
01.11 Growing of cereals
This class includes:
- Growing of wheat
This class excludes:
* Orphan detail
- Growing of rice
* Paddy rice
";
        let records = parse(text);
        let r = &records[0];
        assert!(r.included_activities[0].subactivities.is_empty());
        assert_eq!(r.excluded_activities.len(), 1);
        assert_eq!(r.excluded_activities[0].subactivities, vec!["Paddy rice"]);
    }

    #[test]
    fn test_bullets_before_mode_ignored() {
        let lines = vec!["01.11 Cereals", "- No mode yet", "This class includes:", "- Wheat"];
        let (inc, exc) = parse_activities(&lines, 0, ACTIVITY_WINDOW);
        assert_eq!(inc, vec![Activity::new("Wheat")]);
        assert!(exc.is_empty());
    }

    #[test]
    fn test_activity_text_stripped() {
        let lines = vec![
            "01.11 Cereals",
            "This class includes:",
            "- growing of cereals such as:",
            "  *   wheat  ",
        ];
        let (inc, _) = parse_activities(&lines, 0, ACTIVITY_WINDOW);
        assert_eq!(inc[0].activity, "growing of cereals such as");
        assert_eq!(inc[0].subactivities, vec!["wheat"]);
    }

    #[test]
    fn test_empty_activity_takes_no_subactivities() {
        let lines = vec!["01.11 Cereals", "This class includes:", "-", "* detail"];
        let (inc, _) = parse_activities(&lines, 0, ACTIVITY_WINDOW);
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].activity, "");
        assert!(inc[0].subactivities.is_empty());
    }

    #[test]
    fn test_activity_scan_stops_at_next_class_and_heading() {
        let lines = vec![
            "01.11 Cereals",
            "This class includes:",
            "- Wheat",
            "01.12 Rice",
            "- Rice",
        ];
        let (inc, _) = parse_activities(&lines, 0, ACTIVITY_WINDOW);
        assert_eq!(inc.len(), 1);

        let lines = vec!["01.11 Cereals", "This class includes:", "- Wheat", "# Section B – Mining", "- Coal"];
        let (inc, _) = parse_activities(&lines, 0, ACTIVITY_WINDOW);
        assert_eq!(inc.len(), 1);
    }

    #[test]
    fn test_blank_lines_do_not_end_scan() {
        let lines = vec!["01.11 Cereals", "", "This class includes:", "", "", "- Wheat"];
        let (inc, _) = parse_activities(&lines, 0, ACTIVITY_WINDOW);
        assert_eq!(inc.len(), 1);
    }

    #[test]
    fn test_activity_window_is_bounded() {
        let mut lines = vec!["01.11 Cereals", "This class includes:"];
        lines.extend(std::iter::repeat("unrelated text").take(47));
        lines.push("- Inside window");
        lines.push("- Outside window");
        assert_eq!(lines[49], "- Inside window");

        let (inc, _) = parse_activities(&lines, 0, ACTIVITY_WINDOW);
        assert_eq!(inc, vec![Activity::new("Inside window")]);
    }

    #[test]
    fn test_far_bullets_not_leaked_through_parse() {
        let mut text = String::from(
            "# Section A – Agriculture\n01 Crops\n01.1 Cereals\n01.11 Wheat\nThis class includes:\n- Wheat\n",
        );
        for _ in 0..60 {
            text.push_str("filler line\n");
        }
        text.push_str("- Leaked bullet\n");
        let records = parse(&text);
        assert_eq!(records[0].included_activities, vec![Activity::new("Wheat")]);
    }

    #[test]
    fn test_scan_description_window() {
        let mut lines = vec!["# Section A – Agriculture"];
        lines.extend(std::iter::repeat("filler").take(8));
        lines.push("This section includes late text.");
        // Marker at index 9 is reachable through the window starting at 7.
        assert_eq!(
            scan_description(&lines, 0, DESCRIPTION_WINDOW, SECTION_MARKER).as_deref(),
            Some("late text.")
        );

        let mut far = vec!["# Section A – Agriculture"];
        far.extend(std::iter::repeat("filler").take(12));
        far.push("This section includes unreachable text.");
        assert_eq!(scan_description(&far, 0, DESCRIPTION_WINDOW, SECTION_MARKER), None);
    }

    #[test]
    fn test_scan_description_stops_at_end_of_line() {
        let lines = vec!["01 Crops", "This division includes: growing", "01.1 Cereals"];
        assert_eq!(
            scan_description(&lines, 0, DESCRIPTION_WINDOW, DIVISION_MARKER).as_deref(),
            Some(": growing")
        );
    }

    #[test]
    fn test_crlf_input() {
        let text = SAMPLE.replace('\n', "\r\n");
        let records = parse(&text);
        assert_eq!(codes(&records), vec!["01.11", "01.12"]);
        assert_eq!(records[0].section_description, "farming activities.");
        assert_eq!(records[0].included_activities[0].subactivities, vec!["Winter wheat"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n   \n").is_empty());
    }
}
