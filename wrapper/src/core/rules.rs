//! Rule-based verification of a change set against step constraints.
//!
//! These checks are deliberately coarse string/set matching. The forbidden
//! keyword table in particular is a known-weak heuristic that both over- and
//! under-triggers; its literal behavior is part of the contract.

use std::collections::BTreeSet;

/// Relative prefix of the tool's own state directory. Changes under it never
/// count against a step's allowed files.
pub const STATE_DIR_PREFIX: &str = ".wrapper/";

/// Accumulated outcome of the rule layer. Errors block, warnings do not.
#[derive(Debug, Clone, Default)]
pub struct RuleReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RuleReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Drop paths under the state directory from a changed-file set.
pub fn without_state_paths(changed: &BTreeSet<String>) -> BTreeSet<String> {
    changed
        .iter()
        .filter(|path| !path.starts_with(STATE_DIR_PREFIX))
        .cloned()
        .collect()
}

/// Every changed file must be a member of `allowed`. An empty allowed list
/// means the step may not change anything at all.
pub fn check_allowed_files(
    changed: &BTreeSet<String>,
    allowed: &[String],
    report: &mut RuleReport,
) {
    if allowed.is_empty() {
        if !changed.is_empty() {
            let listing: Vec<&str> = changed.iter().map(String::as_str).collect();
            report.add_error(format!(
                "No files should be modified, but found changes in: {}",
                listing.join(", ")
            ));
        }
        return;
    }

    let allowed_set: BTreeSet<&str> = allowed.iter().map(String::as_str).collect();
    let disallowed: Vec<&str> = changed
        .iter()
        .map(String::as_str)
        .filter(|path| !allowed_set.contains(path))
        .collect();
    if !disallowed.is_empty() {
        report.add_error(format!(
            "Modified files not in allowed list: {}",
            disallowed.join(", ")
        ));
    }
}

/// New directories are reported but never block.
pub fn check_new_directories(new_dirs: &BTreeSet<String>, report: &mut RuleReport) {
    if !new_dirs.is_empty() {
        let listing: Vec<&str> = new_dirs.iter().map(String::as_str).collect();
        report.add_warning(format!("New directories created: {}", listing.join(", ")));
    }
}

/// Keyword table keyed by substrings of a forbidden item's normalized text.
const PATTERN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "ui",
        &["<div", "<button", "useState", "className=", "render("],
    ),
    (
        "http",
        &[
            "app.get(",
            "app.post(",
            "@Get(",
            "@Post(",
            "router.get",
            "express()",
        ],
    ),
    (
        "database",
        &[
            "CREATE TABLE",
            "SELECT * FROM",
            "INSERT INTO",
            ".query(",
            "prisma.",
        ],
    ),
];

/// Scan the diff, case-insensitively, for tokens associated with each
/// forbidden item's keywords.
pub fn check_forbidden_patterns(diff: &str, forbidden: &[String], report: &mut RuleReport) {
    let diff_lower = diff.to_lowercase();
    for item in forbidden {
        let item_lower = item.to_lowercase();
        for (keyword, patterns) in PATTERN_KEYWORDS {
            if !item_lower.contains(keyword) {
                continue;
            }
            for pattern in *patterns {
                if diff_lower.contains(&pattern.to_lowercase()) {
                    report.add_error(format!(
                        "Forbidden pattern detected ({item}): found '{pattern}' in diff"
                    ));
                }
            }
        }
    }
}

/// Canned remediation sentence for a recognized rule error.
pub fn repair_hint(error: &str) -> Option<&'static str> {
    if error.contains("not in allowed list") {
        Some("Revert changes to disallowed files")
    } else if error.contains("Forbidden pattern") {
        Some("Remove forbidden code patterns")
    } else if error.contains("No files should be modified") {
        Some("Revert all changes (this was a verification-only step)")
    } else {
        None
    }
}
