//! Core data models for the NACE Rev. 2 taxonomy.
//!
//! A parsed taxonomy is a flat list of [`ClassificationRecord`]s, one per
//! leaf class, each carrying its denormalized ancestor chain. Section,
//! division, and group levels only exist as fields on those records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Code, name, and scanned description of one hierarchy level.
///
/// The parser keeps one of these for the current section, division, and
/// group while it walks the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
    pub code: String,
    pub name: String,
    pub description: String,
}

impl Ancestor {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    /// An ancestor known only by its code, recovered from a class code.
    pub fn code_only(code: impl Into<String>) -> Self {
        Self::new(code, "")
    }
}

/// An included or excluded activity listed under a class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub activity: String,
    #[serde(default)]
    pub subactivities: Vec<String>,
}

impl Activity {
    pub fn new(activity: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            subactivities: Vec::new(),
        }
    }
}

/// One leaf-level NACE class with its full ancestor chain.
///
/// `class_code` is the natural unique key (`DD.DD`). `group_code` is always
/// the first four characters of it and `division_code` the first two.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub section_code: String,
    pub section_name: String,
    pub section_description: String,
    pub division_code: String,
    pub division_name: String,
    pub division_description: String,
    pub group_code: String,
    pub group_name: String,
    pub group_description: String,
    pub class_code: String,
    pub class_name: String,
    pub class_description: String,
    pub included_activities: Vec<Activity>,
    pub excluded_activities: Vec<Activity>,
}

impl ClassificationRecord {
    /// Seed a record from the current ancestors and the class heading.
    pub fn from_ancestors(
        section: &Ancestor,
        division: &Ancestor,
        group: &Ancestor,
        class_code: &str,
        class_name: &str,
    ) -> Self {
        Self {
            section_code: section.code.clone(),
            section_name: section.name.clone(),
            section_description: section.description.clone(),
            division_code: division.code.clone(),
            division_name: division.name.clone(),
            division_description: division.description.clone(),
            group_code: group.code.clone(),
            group_name: group.name.clone(),
            group_description: group.description.clone(),
            class_code: class_code.to_string(),
            class_name: class_name.to_string(),
            class_description: String::new(),
            included_activities: Vec::new(),
            excluded_activities: Vec::new(),
        }
    }

    /// Render the record as a markdown document.
    ///
    /// This is the text indexed for keyword search, embedded for semantic
    /// search, and handed to the language model as classification context.
    pub fn to_document(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("## {} {}\n\n", self.class_code, self.class_name));
        out.push_str(&format!(
            "Section {} – {}\n",
            self.section_code, self.section_name
        ));
        push_description(&mut out, &self.section_description);
        push_level(&mut out, "Division", &self.division_code, &self.division_name);
        push_description(&mut out, &self.division_description);
        push_level(&mut out, "Group", &self.group_code, &self.group_name);
        push_description(&mut out, &self.group_description);
        if !self.class_description.is_empty() {
            out.push_str(&format!("\n{}\n", self.class_description));
        }
        push_activities(&mut out, "This class includes:", &self.included_activities);
        push_activities(&mut out, "This class excludes:", &self.excluded_activities);
        out
    }

    /// SHA-256 of [`to_document`](Self::to_document), hex encoded.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_document().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn push_level(out: &mut String, label: &str, code: &str, name: &str) {
    if name.is_empty() {
        out.push_str(&format!("{} {}\n", label, code));
    } else {
        out.push_str(&format!("{} {} {}\n", label, code, name));
    }
}

fn push_description(out: &mut String, description: &str) {
    if !description.is_empty() {
        out.push_str(&format!("  {}\n", description));
    }
}

fn push_activities(out: &mut String, heading: &str, activities: &[Activity]) {
    if activities.is_empty() {
        return;
    }
    out.push_str(&format!("\n{}\n", heading));
    for a in activities {
        out.push_str(&format!("- {}\n", a.activity));
        for sub in &a.subactivities {
            out.push_str(&format!("  * {}\n", sub));
        }
    }
}

/// A top-level section of the source document, as cut by the segmenter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub content: String,
}

impl Segment {
    /// File name for writing this segment to disk.
    ///
    /// `"# Section A"` becomes `section_a.md`.
    pub fn file_name(&self) -> String {
        let stem = self
            .name
            .trim_start_matches('#')
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();
        format!("{}.md", stem)
    }
}
