//! Order-insensitive checklist verification.

use crate::error::{HarnessError, HarnessResult};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// Verifies that every key in `required` has a matching projected item in
/// `observed`, in any order.
///
/// `projection` maps each observed item to a comparison key. Matching is
/// multiset-based: duplicates among `required` need matching duplicates in
/// the observed collection. Missing keys fail with `MissingRequired`
/// regardless of `allow_extras`; when `allow_extras` is false, projected
/// keys outside `required` fail with `UnexpectedExtra`. Both failures
/// report the full difference.
///
/// This is how race-exposed non-determinism ("did the message land before
/// the pagination cut line or not") becomes a declared variable
/// (`allow_extras = true`) instead of a flaky exact-order assertion.
/// Ordering of the server's history pagination is not under test here.
pub fn verify_checklist<T, K, P>(
    observed: &[T],
    projection: P,
    required: &[K],
    allow_extras: bool,
) -> HarnessResult<()>
where
    K: Eq + Hash + Display,
    P: Fn(&T) -> K,
{
    let mut remaining: HashMap<K, usize> = HashMap::new();
    for item in observed {
        *remaining.entry(projection(item)).or_insert(0) += 1;
    }

    let mut missing = Vec::new();
    for key in required {
        match remaining.get_mut(key) {
            Some(count) if *count > 0 => *count -= 1,
            _ => missing.push(key.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(HarnessError::MissingRequired { missing });
    }

    if !allow_extras {
        let mut extra: Vec<String> = remaining
            .iter()
            .filter(|(_, count)| **count > 0)
            .flat_map(|(key, count)| std::iter::repeat_with(|| key.to_string()).take(*count))
            .collect();
        if !extra.is_empty() {
            extra.sort();
            return Err(HarnessError::UnexpectedExtra { extra });
        }
    }

    Ok(())
}
