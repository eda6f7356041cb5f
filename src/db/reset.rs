//! Shared pieces of the dialect-aware reset routine.

use std::collections::{BTreeMap, BTreeSet};

/// Order `tables` so every table appears before any table it references
/// (children first), given `edges` as (child, parent) pairs from live
/// foreign-key introspection. Tables stuck in a reference cycle are
/// appended in their incoming order; callers only run this while
/// constraint enforcement is disabled, so that fallback is safe.
pub(crate) fn dependency_order(
    tables: &[String],
    edges: &[(String, String)],
) -> Vec<String> {
    let known: BTreeSet<&str> = tables.iter().map(String::as_str).collect();

    // parent -> children still waiting to be emitted
    let mut children_of: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (child, parent) in edges {
        if child == parent {
            continue; // self-reference never blocks emission
        }
        if known.contains(child.as_str()) && known.contains(parent.as_str()) {
            children_of
                .entry(parent.as_str())
                .or_default()
                .insert(child.as_str());
        }
    }

    let mut remaining: Vec<&str> = tables.iter().map(String::as_str).collect();
    let mut ordered: Vec<String> = Vec::with_capacity(tables.len());

    while !remaining.is_empty() {
        let emit_idx = remaining.iter().position(|t| {
            children_of
                .get(t)
                .map(|kids| kids.iter().all(|k| !remaining.contains(k)))
                .unwrap_or(true)
        });
        match emit_idx {
            Some(i) => ordered.push(remaining.remove(i).to_string()),
            None => {
                // cycle: emit the rest as-is
                ordered.extend(remaining.drain(..).map(String::from));
            }
        }
    }
    ordered
}
