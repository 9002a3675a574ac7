//! Which committee a user belongs to, and what that lets them see.
//!
//! Users carry the committee they were assigned as free text ("Tuni AMC",
//! a committee code, or the full committee name). Every visibility decision
//! goes through [`resolve_committee_id`] first; JD users skip it entirely.

use tracing::warn;

use crate::db::models::{Committee, Receipt, User};

const COMMITTEE_SUFFIXES: [&str; 2] = [" agricultural market committee", " amc"];

/// Lowercase, collapse whitespace and strip the trailing "AMC" /
/// "Agricultural Market Committee" so "Tuni AMC" and
/// "Tuni Agricultural Market Committee" compare equal.
fn committee_stem(name: &str) -> String {
    let mut stem = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    for suffix in COMMITTEE_SUFFIXES {
        if let Some(stripped) = stem.strip_suffix(suffix) {
            stem = stripped.trim_end().to_string();
            break;
        }
    }
    stem
}

/// Find the committee a user's assignment refers to.
///
/// Exact name wins over exact code, which wins over a stem match.
pub fn resolve_committee<'a>(user: &User, committees: &'a [Committee]) -> Option<&'a Committee> {
    let assigned = user.committee.as_deref()?.trim();
    if assigned.is_empty() {
        return None;
    }

    committees
        .iter()
        .find(|c| c.name.trim().eq_ignore_ascii_case(assigned))
        .or_else(|| {
            committees
                .iter()
                .find(|c| c.code.trim().eq_ignore_ascii_case(assigned))
        })
        .or_else(|| {
            let stem = committee_stem(assigned);
            committees.iter().find(|c| committee_stem(&c.name) == stem)
        })
}

pub fn resolve_committee_id(user: &User, committees: &[Committee]) -> Option<String> {
    resolve_committee(user, committees).map(|c| c.id.clone())
}

pub fn visible_committees(user: &User, committees: &[Committee]) -> Vec<Committee> {
    if user.role.is_district_wide() {
        return committees.to_vec();
    }

    match resolve_committee(user, committees) {
        Some(committee) => vec![committee.clone()],
        None => {
            warn!(
                "User {} has committee {:?} but no matching committee found",
                user.username, user.committee
            );
            Vec::new()
        }
    }
}

pub fn visible_receipts(user: &User, committees: &[Committee], receipts: Vec<Receipt>) -> Vec<Receipt> {
    if user.role.is_district_wide() {
        return receipts;
    }

    let Some(committee_id) = resolve_committee_id(user, committees) else {
        warn!(
            "User {} has no valid committee, returning no receipts",
            user.username
        );
        return Vec::new();
    };

    receipts
        .into_iter()
        .filter(|r| r.committee_id == committee_id)
        .collect()
}

pub fn can_view_committee(user: &User, committees: &[Committee], committee_id: &str) -> bool {
    if user.role.is_district_wide() {
        return committees.iter().any(|c| c.id == committee_id);
    }
    resolve_committee_id(user, committees).as_deref() == Some(committee_id)
}
