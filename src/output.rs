//! Report rendering
//!
//! Text output keeps the sectioned layout operators of the upload pruning
//! command are used to; JSON output wraps the structured report.

use std::fmt::Write;

use serde::Serialize;

use crate::models::{Action, PruneReport};

/// Verbosity at which full path listings are printed
pub const VERBOSE: u8 = 2;

#[derive(Serialize)]
struct JsonOut<'a, T: Serialize> {
    ok: bool,
    data: &'a T,
}

pub fn render_json(report: &PruneReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonOut {
        ok: true,
        data: report,
    })
}

fn section(out: &mut String, title: &str) {
    out.push_str("\n\n");
    out.push_str(&"#".repeat(79));
    out.push('\n');
    out.push_str(title);
    out.push('\n');
}

pub fn render_text(report: &PruneReport, verbosity: u8) -> String {
    let verbose = verbosity >= VERBOSE;
    let mut out = String::new();

    section(&mut out, "File fields:");
    for fields in &report.file_fields {
        let _ = writeln!(out, "{}: {}", fields.record_type, fields.attributes.join(", "));
    }
    for key in &report.downgraded {
        let _ = writeln!(out, "{key}: cannot be emptied, missing files are only reported");
    }
    out.push('\n');

    section(&mut out, &format!("Known media files: {}", report.known_count));
    let _ = writeln!(out, "Found media files: {}", report.existing_count);
    if !report.shared_paths.is_empty() {
        let _ = writeln!(
            out,
            "Media files referenced more than once: {}",
            report.shared_paths.len()
        );
        if verbose {
            for shared in &report.shared_paths {
                let owners: Vec<String> = shared
                    .owners
                    .iter()
                    .map(|o| format!("{} of {}", o.key, o.id))
                    .collect();
                let _ = writeln!(out, "{} ({})", shared.path, owners.join(", "));
            }
        }
    }

    section(
        &mut out,
        &format!("Media files not in file system: {}", report.missing_count),
    );
    for action in report.record_actions() {
        let _ = writeln!(out, "{}", describe(action));
    }
    for group in &report.missing {
        let _ = writeln!(out, "{}: {}", group.key, group.count);
        if verbose {
            let _ = writeln!(out, "{}", group.paths.join("\n"));
            out.push('\n');
        }
    }

    section(
        &mut out,
        &format!("Media files not in DB: {}", report.orphan_count),
    );
    if report.orphans_deleted {
        for action in report.file_actions() {
            let _ = writeln!(out, "{}", describe(action));
        }
    } else if verbose && !report.orphans.is_empty() {
        let _ = writeln!(out, "{}", report.orphans.join("\n"));
    }

    out
}

/// One log line per applied action
pub fn describe(action: &Action) -> String {
    match action {
        Action::Blanked {
            record_type,
            attribute,
            id,
            path,
        } => format!("Emptying {record_type}.{attribute} of {id} ({path})"),
        Action::DeletedRecord {
            record_type,
            attribute,
            id,
            path,
        } => format!("Deleting {record_type} of {id} because of invalid {attribute} ({path})"),
        Action::DeletedFile { path } => format!("Deleting {path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeKey, MissingGroup, RecordId, RecordTypeFields};
    use chrono::Utc;

    fn report() -> PruneReport {
        PruneReport {
            started_at: Utc::now(),
            completed_at: Utc::now(),
            file_fields: vec![RecordTypeFields {
                record_type: "Document".to_string(),
                attributes: vec!["file".to_string(), "cover".to_string()],
            }],
            downgraded: vec![],
            known_count: 3,
            existing_count: 2,
            shared_paths: vec![],
            missing_count: 2,
            missing: vec![MissingGroup {
                key: AttributeKey::new("Document", "cover"),
                count: 1,
                paths: vec!["c.jpg".to_string()],
            }],
            orphan_count: 1,
            orphans: vec!["orphan.pdf".to_string()],
            orphans_deleted: false,
            actions: vec![Action::Blanked {
                record_type: "Document".to_string(),
                attribute: "file".to_string(),
                id: RecordId::from("2"),
                path: "b.pdf".to_string(),
            }],
        }
    }

    #[test]
    fn test_text_sections_and_counts() {
        let text = render_text(&report(), 1);
        assert_eq!(text.matches(&"#".repeat(79)).count(), 4);
        assert!(text.contains("Document: file, cover"));
        assert!(text.contains("Known media files: 3"));
        assert!(text.contains("Found media files: 2"));
        assert!(text.contains("Media files not in file system: 2"));
        assert!(text.contains("Emptying Document.file of 2 (b.pdf)"));
        assert!(text.contains("Document.cover: 1"));
        assert!(text.contains("Media files not in DB: 1"));
        assert!(!text.contains("c.jpg"));
        assert!(!text.contains("orphan.pdf"));
    }

    #[test]
    fn test_verbose_text_lists_paths() {
        let text = render_text(&report(), VERBOSE);
        assert!(text.contains("c.jpg"));
        assert!(text.contains("orphan.pdf"));
    }

    #[test]
    fn test_deleted_orphans_are_listed() {
        let mut report = report();
        report.orphans_deleted = true;
        report.actions.push(Action::DeletedFile {
            path: "orphan.pdf".to_string(),
        });
        let text = render_text(&report, 1);
        assert!(text.contains("Deleting orphan.pdf"));
    }

    #[test]
    fn test_json_wraps_report() {
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&report()).unwrap()).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["data"]["knownCount"], 3);
        assert_eq!(json["data"]["missing"][0]["recordType"], "Document");
        assert_eq!(json["data"]["missing"][0]["attribute"], "cover");
        assert_eq!(json["data"]["actions"][0]["kind"], "blanked");
    }
}
