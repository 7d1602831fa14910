//! # Containment and Existence
//!
//! `contains(big, pattern)` decides whether every part of `pattern` appears
//! in `big`:
//!
//! | Pattern | Rule |
//! |---------|------|
//! | object | each pattern key exists in `big` and its value is contained in big's value |
//! | array | each scalar element occurs in `big`; each nested element is contained in some nested element of `big` |
//! | scalar | equal under the total order |
//!
//! The root kinds must match and `big` must have at least as many elements
//! or pairs as `pattern`, otherwise the answer is `false` without further
//! inspection. A scalar root is only contained in a scalar root or in an
//! array holding that scalar.
//!
//! Object patterns are probed in their sorted key order with one lower-bound
//! cursor into `big`, so the combined search is a merge rather than
//! repeated full binary searches. Nested array patterns are matched against
//! the nested elements of `big`, collected once per array on first need.
//!
//! Recursion follows the depth of the pattern, which is bounded by the size
//! of the query value rather than by stored data.

use bytes::Bytes;
use eyre::{bail, Result};
use tracing::debug;

use crate::compare::compare_keys;
use crate::error::ContractError;
use crate::format::{Container, EntryTag};
use crate::jsonb::Jsonb;
use crate::value::Value;

pub fn contains(big: &Jsonb, pattern: &Jsonb) -> bool {
    let (b, p) = (big.container(), pattern.container());
    if b.kind() != p.kind() || b.len() < p.len() {
        return false;
    }
    if b.is_scalar() && !p.is_scalar() {
        return false;
    }
    deep_contains(b, p)
}

/// `contains` with the arguments swapped.
pub fn contained(small: &Jsonb, big: &Jsonb) -> bool {
    contains(big, small)
}

/// Like [`contains`], but mismatched root kinds are a caller error.
pub fn contains_strict(big: &Jsonb, pattern: &Jsonb) -> Result<bool> {
    if big.kind() != pattern.kind() {
        debug!(big = %big.kind(), pattern = %pattern.kind(), "jsonb containment root mismatch");
        bail!(ContractError::RootKindMismatch {
            big: big.kind(),
            pattern: pattern.kind(),
        });
    }
    Ok(contains(big, pattern))
}

fn deep_contains(big: &Container, pattern: &Container) -> bool {
    debug_assert_eq!(big.kind(), pattern.kind());
    if big.is_object() {
        object_contains(big, pattern)
    } else {
        array_contains(big, pattern)
    }
}

fn object_contains(big: &Container, pattern: &Container) -> bool {
    if pattern.len() > big.len() {
        return false;
    }

    let mut cursor = 0;
    for i in 0..pattern.len() {
        let key = pattern.key_slot(i);
        let Some(found) = big.find_key(pattern.payload(&key), Some(&mut cursor)) else {
            return false;
        };
        let wanted = pattern.value_slot(i);

        let matched = match (found.tag, wanted.tag) {
            (EntryTag::Nested, EntryTag::Nested) => {
                let (inner_big, inner_pattern) = (big.nested(&found), pattern.nested(&wanted));
                inner_big.kind() == inner_pattern.kind()
                    && deep_contains(&inner_big, &inner_pattern)
            }
            (EntryTag::Nested, _) | (_, EntryTag::Nested) => false,
            _ => big.read(&found) == pattern.read(&wanted),
        };
        if !matched {
            return false;
        }
    }
    true
}

fn array_contains(big: &Container, pattern: &Container) -> bool {
    let mut nested_big: Option<Vec<Container>> = None;

    for i in 0..pattern.len() {
        let wanted = pattern.element_slot(i);

        if wanted.tag != EntryTag::Nested {
            if big.find_scalar(&pattern.read(&wanted)).is_none() {
                return false;
            }
            continue;
        }

        let candidates = nested_big.get_or_insert_with(|| {
            (0..big.len())
                .map(|j| big.element_slot(j))
                .filter(|slot| slot.tag == EntryTag::Nested)
                .map(|slot| big.nested(&slot))
                .collect()
        });
        if candidates.is_empty() {
            return false;
        }

        let inner_pattern = pattern.nested(&wanted);
        let found = candidates.iter().any(|candidate| {
            candidate.kind() == inner_pattern.kind() && deep_contains(candidate, &inner_pattern)
        });
        if !found {
            return false;
        }
    }
    true
}

/// True when `key` is a key of an object root, or a string element of an
/// array root.
pub fn exists(jb: &Jsonb, key: impl AsRef<[u8]>) -> bool {
    probe(jb.container(), key.as_ref(), None)
}

pub fn exists_any<K: AsRef<[u8]>>(jb: &Jsonb, keys: impl IntoIterator<Item = K>) -> bool {
    let keys = sorted_keys(keys);
    let mut cursor = 0;
    keys.iter().any(|key| probe(jb.container(), key, Some(&mut cursor)))
}

pub fn exists_all<K: AsRef<[u8]>>(jb: &Jsonb, keys: impl IntoIterator<Item = K>) -> bool {
    let keys = sorted_keys(keys);
    let mut cursor = 0;
    keys.iter().all(|key| probe(jb.container(), key, Some(&mut cursor)))
}

fn sorted_keys<K: AsRef<[u8]>>(keys: impl IntoIterator<Item = K>) -> Vec<Bytes> {
    let mut keys: Vec<Bytes> = keys
        .into_iter()
        .map(|k| Bytes::copy_from_slice(k.as_ref()))
        .collect();
    keys.sort_by(|a, b| compare_keys(a, b));
    keys.dedup();
    keys
}

fn probe(container: &Container, key: &[u8], cursor: Option<&mut usize>) -> bool {
    if container.is_object() {
        container.find_key(key, cursor).is_some()
    } else {
        container
            .find_scalar(&Value::String(Bytes::copy_from_slice(key)))
            .is_some()
    }
}
