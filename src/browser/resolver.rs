//! Reference tokens (`[ref=eN]`) and their validation against the latest snapshot.
//!
//! The checks run in a fixed order and each one has its own message, so the model can
//! tell "take a snapshot" apart from "take a fresh snapshot" and from "malformed token".

use crate::browser::outcome::Outcome;
use crate::dom::snapshot::REF_ATTRIBUTE;
use regex::Regex;
use std::sync::OnceLock;

pub const SNAPSHOT_REQUIRED: &str = "You need to run the `getSnapshot` tool first.";
pub const BLANK_REFERENCE: &str = "Element reference cannot be empty.";
pub const REFERENCE_NOT_FOUND: &str =
    "The ref you provided is not found in the snapshot, get new page state with `getSnapshot`";
pub const MALFORMED_REFERENCE: &str = "Invalid reference format. Expected format: [ref=eNUMBER]";

fn ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[ref=(e\d+)\]").expect("reference pattern is valid"))
}

/// A validated reference: the token as given and the bare id inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementReference {
    pub token: String,
    pub id: String,
}

impl ElementReference {
    /// Page-scoped selector that matches the element the snapshot tagged with this id.
    pub fn selector(&self) -> String {
        format!("[{}=\"{}\"]", REF_ATTRIBUTE, self.id)
    }
}

/// An element reference bound to a live locator on the current page.
#[derive(Debug, Clone)]
pub struct ResolvedElement<L> {
    pub reference: ElementReference,
    pub selector: String,
    pub locator: L,
}

/// Run the snapshot-dependent checks, in order, for `token`.
pub fn validate_reference(
    last_snapshot: Option<&str>,
    token: &str,
) -> Result<ElementReference, Outcome> {
    let snapshot = last_snapshot.ok_or_else(|| Outcome::error(SNAPSHOT_REQUIRED))?;

    if token.trim().is_empty() {
        return Err(Outcome::error(BLANK_REFERENCE));
    }

    if !snapshot.contains(token) {
        return Err(Outcome::error(REFERENCE_NOT_FOUND));
    }

    let trimmed = token.trim();
    let trimmed = trimmed.strip_prefix("[ref=").unwrap_or(trimmed);
    let id = trimmed.strip_suffix(']').unwrap_or(trimmed).trim();
    if id.is_empty() {
        return Err(Outcome::error(MALFORMED_REFERENCE));
    }

    Ok(ElementReference {
        token: token.to_string(),
        id: id.to_string(),
    })
}

/// Every reference id present in a snapshot, in order of appearance.
pub fn snapshot_refs(snapshot: &str) -> Vec<String> {
    ref_pattern()
        .captures_iter(snapshot)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
