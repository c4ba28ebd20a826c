//! Listed-vs-returned reconciliation
//!
//! Pure set arithmetic, no I/O: listed ∩ returned become child records,
//! listed − returned − failed become not-found markers.

use crate::api::ChildDetail;
use crate::types::{ChildRef, JsonValue};
use std::collections::{HashMap, HashSet};

/// Outcome of reconciling one parent's children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Listed children with their returned payload
    pub found: Vec<(ChildRef, JsonValue)>,
    /// Listed children absent from every successful detail batch
    pub missing: Vec<ChildRef>,
    /// Returned details whose ID was never listed
    pub unlisted: usize,
}

/// Reconcile listed children against returned details
///
/// IDs in `failed` belong to detail batches that errored; they are neither
/// found nor missing and must be reported by the caller.
pub fn reconcile(
    listed: &[ChildRef],
    returned: Vec<ChildDetail>,
    failed: &HashSet<String>,
) -> Reconciliation {
    let listed_ids: HashSet<&str> = listed.iter().map(|c| c.id.as_str()).collect();

    let mut unlisted = 0;
    let mut payloads: HashMap<String, JsonValue> = HashMap::with_capacity(returned.len());
    for detail in returned {
        if !listed_ids.contains(detail.id.as_str()) {
            unlisted += 1;
            continue;
        }
        payloads.entry(detail.id).or_insert(detail.payload);
    }

    let mut found = Vec::with_capacity(payloads.len());
    let mut missing = Vec::new();
    for child in listed {
        if let Some(payload) = payloads.remove(&child.id) {
            found.push((child.clone(), payload));
        } else if !failed.contains(&child.id) {
            missing.push(child.clone());
        }
    }

    Reconciliation {
        found,
        missing,
        unlisted,
    }
}
