use std::collections::HashSet;

use nace_core::validate::{EXPECTED_CLASSES, EXPECTED_DIVISIONS, EXPECTED_GROUPS, EXPECTED_SECTIONS};
use nace_core::{parse, segment, validate, ValidationReport};

/// Build a document with the full NACE Rev. 2 shape: 21 sections, 88
/// divisions, 272 groups, 615 classes.
fn canonical_document() -> String {
    let mut doc = String::from("NACE Rev. 2\nStatistical classification of economic activities\n\n");
    let mut current_section = None;
    let mut group_index = 0usize;

    for division in 1..=EXPECTED_DIVISIONS {
        let section_idx = (division - 1) * EXPECTED_SECTIONS / EXPECTED_DIVISIONS;
        let letter = (b'A' + section_idx as u8) as char;
        if current_section != Some(letter) {
            current_section = Some(letter);
            doc.push_str(&format!("# Section {} – Section {} activities\n", letter, letter));
            doc.push_str(&format!("This section includes activities of kind {}.\n\n", letter));
        }

        doc.push_str(&format!("###### {:02} Division {:02}\n", division, division));
        doc.push_str(&format!("This division includes division {:02} work.\n\n", division));

        let groups = if division <= 8 { 4 } else { 3 };
        for g in 1..=groups {
            let group_code = format!("{:02}.{}", division, g);
            doc.push_str(&format!("{} Group {}\n", group_code, group_code));

            let classes = if group_index < 71 { 3 } else { 2 };
            group_index += 1;
            for c in 1..=classes {
                let class_code = format!("{}{}", group_code, c);
                doc.push_str(&format!("{} Class {}\n", class_code, class_code));
                doc.push_str("This class includes:\n");
                doc.push_str(&format!("- Primary activity of {}:\n", class_code));
                doc.push_str("* first detail\n* second detail\n");
                doc.push_str("This class excludes:\n");
                doc.push_str(&format!("- Unrelated activity near {}\n\n", class_code));
            }
        }
    }

    doc
}

#[test]
fn test_canonical_document_validates() {
    let records = parse(&canonical_document());
    assert_eq!(records.len(), EXPECTED_CLASSES);
    assert!(validate(&records));

    let report = ValidationReport::from_records(&records);
    assert!(report.sections_ok());
    assert!(report.divisions_ok());
    assert!(report.groups_ok());
    assert_eq!(report.per_section.values().sum::<usize>(), EXPECTED_CLASSES);
}

#[test]
fn test_canonical_records_are_consistent() {
    let records = parse(&canonical_document());

    let mut seen = HashSet::new();
    for r in &records {
        assert!(seen.insert(r.class_code.clone()), "duplicate {}", r.class_code);
        assert!(r.group_code.starts_with(&r.division_code));
        assert_eq!(&r.class_code[..4], r.group_code);
        assert!(!r.section_code.is_empty());
        assert_eq!(r.division_name, format!("Division {}", r.division_code));
        assert_eq!(r.group_name, format!("Group {}", r.group_code));
        assert_eq!(r.included_activities.len(), 1);
        assert_eq!(r.included_activities[0].subactivities.len(), 2);
        assert_eq!(r.excluded_activities.len(), 1);
    }

    assert!(records.windows(2).all(|w| w[0].class_code <= w[1].class_code));
}

#[test]
fn test_incomplete_document_fails() {
    let mut records = parse(&canonical_document());
    records.pop();
    assert!(!validate(&records));
}

#[test]
fn test_canonical_parse_deterministic() {
    let doc = canonical_document();
    assert_eq!(parse(&doc), parse(&doc));
}

#[test]
fn test_segments_cover_every_section() {
    let doc = canonical_document();
    let segments = segment(&doc);
    assert_eq!(segments.len(), EXPECTED_SECTIONS);

    let reparsed: usize = segments.iter().map(|s| parse(&s.content).len()).sum();
    assert_eq!(reparsed, EXPECTED_CLASSES);
}
