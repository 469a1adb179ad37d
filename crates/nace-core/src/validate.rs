//! Cardinality checks for a parsed NACE Rev. 2 taxonomy.
//!
//! The complete classification has 21 sections, 88 divisions, 272 groups,
//! and 615 classes. [`ValidationReport`] counts what a parse produced at
//! every level and renders the diagnostic breakdown; [`validate`] prints it
//! and reports whether the class total is complete.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::models::ClassificationRecord;

pub const EXPECTED_CLASSES: usize = 615;
pub const EXPECTED_SECTIONS: usize = 21;
pub const EXPECTED_DIVISIONS: usize = 88;
pub const EXPECTED_GROUPS: usize = 272;

/// Number of codes listed per level in the printed preview.
const PREVIEW: usize = 5;

/// Counts of a parsed record set at every hierarchy level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub total: usize,
    pub sections: BTreeSet<String>,
    pub divisions: BTreeSet<String>,
    pub groups: BTreeSet<String>,
    pub classes: BTreeSet<String>,
    /// Leaf records per section code, ordered by section code.
    pub per_section: BTreeMap<String, usize>,
}

impl ValidationReport {
    pub fn from_records(records: &[ClassificationRecord]) -> Self {
        let mut report = Self {
            total: records.len(),
            sections: BTreeSet::new(),
            divisions: BTreeSet::new(),
            groups: BTreeSet::new(),
            classes: BTreeSet::new(),
            per_section: BTreeMap::new(),
        };

        for r in records {
            report.sections.insert(r.section_code.clone());
            report.divisions.insert(r.division_code.clone());
            report.groups.insert(r.group_code.clone());
            report.classes.insert(r.class_code.clone());
            *report.per_section.entry(r.section_code.clone()).or_insert(0) += 1;
        }

        report
    }

    /// True when the class total matches the expected 615.
    ///
    /// Section, division, and group counts are reported but do not decide
    /// validity.
    pub fn is_valid(&self) -> bool {
        self.total == EXPECTED_CLASSES
    }

    pub fn sections_ok(&self) -> bool {
        self.sections.len() == EXPECTED_SECTIONS
    }

    pub fn divisions_ok(&self) -> bool {
        self.divisions.len() == EXPECTED_DIVISIONS
    }

    pub fn groups_ok(&self) -> bool {
        self.groups.len() == EXPECTED_GROUPS
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total activities extracted: {}", self.total)?;
        writeln!(f, "Expected activities: {}", EXPECTED_CLASSES)?;
        writeln!(f)?;
        writeln!(f, "Breakdown:")?;
        writeln!(
            f,
            "Sections: {} / {} - {}",
            self.sections.len(),
            EXPECTED_SECTIONS,
            join_codes(self.sections.iter())
        )?;
        writeln!(
            f,
            "Divisions: {} / {} - First {}: {}",
            self.divisions.len(),
            EXPECTED_DIVISIONS,
            PREVIEW,
            join_codes(self.divisions.iter().take(PREVIEW))
        )?;
        writeln!(
            f,
            "Groups: {} / {} - First {}: {}",
            self.groups.len(),
            EXPECTED_GROUPS,
            PREVIEW,
            join_codes(self.groups.iter().take(PREVIEW))
        )?;
        writeln!(
            f,
            "Classes: {} / {} - First {}: {}",
            self.classes.len(),
            EXPECTED_CLASSES,
            PREVIEW,
            join_codes(self.classes.iter().take(PREVIEW))
        )?;
        writeln!(f)?;
        writeln!(f, "Classes per section:")?;
        for (section, count) in &self.per_section {
            writeln!(f, "Section {}: {} classes", section, count)?;
        }
        Ok(())
    }
}

fn join_codes<'a>(codes: impl Iterator<Item = &'a String>) -> String {
    codes.map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Print the diagnostic report for `records` and return whether the class
/// total is complete.
pub fn validate(records: &[ClassificationRecord]) -> bool {
    let report = ValidationReport::from_records(records);
    print!("{}", report);
    report.is_valid()
}
