//! # Field and Element Lookup
//!
//! Random access into an encoded container without materializing siblings.
//!
//! | Container | Probe | Algorithm |
//! |-----------|-------|-----------|
//! | object | key | binary search over key entries by `(length, bytes)` |
//! | array | position | O(1) slot resolution, negative positions count from the end |
//! | array | scalar value | linear scan comparing tags and payloads |
//!
//! ## Lower-Bound Cursor
//!
//! [`lookup_key_with_cursor`] starts its search at `*cursor` and leaves the
//! cursor one past the matched pair, or at the insertion point on a miss.
//! Probing a sorted batch of keys with one cursor therefore only searches
//! the remaining suffix each time.
//!
//! Results are owned `Value`s. A nested container comes back as
//! `Value::Binary` sharing the buffer, so a lookup never copies more than a
//! numeric payload.
//!
//! [`locate_key`] and [`locate_index`] return the matched [`Slot`] instead:
//! the entry's tag and its byte range within the root buffer, padding
//! excluded.
//!
//! Key lookup on an array and positional access on an object are caller
//! contract errors (`ContractError::NotAnObject` / `NotAnArray`).

use bytes::Bytes;
use eyre::{bail, Result};
use std::cmp::Ordering;
use tracing::debug;

use crate::builder::decode;
use crate::compare::compare_keys;
use crate::error::ContractError;
use crate::format::{Container, EntryTag, Slot};
use crate::jsonb::Jsonb;
use crate::value::Value;

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Key(Bytes),
    Index(i64),
}

impl PathStep {
    pub fn key(key: impl AsRef<[u8]>) -> Self {
        PathStep::Key(Bytes::copy_from_slice(key.as_ref()))
    }
}

impl From<&str> for PathStep {
    fn from(key: &str) -> Self {
        PathStep::key(key)
    }
}

impl From<i64> for PathStep {
    fn from(index: i64) -> Self {
        PathStep::Index(index)
    }
}

impl Container {
    /// Locates the value slot paired with `key`. With a cursor, the search
    /// starts at `*cursor` and the cursor is moved past the match, or to the
    /// insertion point on a miss.
    pub(crate) fn find_key(&self, key: &[u8], cursor: Option<&mut usize>) -> Option<Slot> {
        debug_assert!(self.is_object());
        let mut lo = cursor.as_deref().map_or(0, |c| (*c).min(self.len()));
        let mut hi = self.len();

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let slot = self.key_slot(mid);
            match compare_keys(self.payload(&slot), key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    if let Some(cursor) = cursor {
                        *cursor = mid + 1;
                    }
                    return Some(self.value_slot(mid));
                }
            }
        }

        if let Some(cursor) = cursor {
            *cursor = lo;
        }
        None
    }

    /// Linear scan of an array for a scalar element equal to `needle`.
    /// Containers never match.
    pub(crate) fn find_scalar(&self, needle: &Value) -> Option<Slot> {
        debug_assert!(self.is_array());
        (0..self.len()).map(|i| self.element_slot(i)).find(|slot| {
            match (slot.tag, needle) {
                (EntryTag::Null, Value::Null) => true,
                (EntryTag::True, Value::Bool(true)) => true,
                (EntryTag::False, Value::Bool(false)) => true,
                (EntryTag::String, Value::String(s)) => self.payload(slot) == &s[..],
                (EntryTag::Numeric, Value::Number(n)) => self.read_number(slot) == *n,
                _ => false,
            }
        })
    }

    /// Resolves a possibly negative position to an element slot.
    pub(crate) fn index_slot(&self, index: i64) -> Option<Slot> {
        debug_assert!(self.is_array());
        let len = self.len() as i64;
        let resolved = if index < 0 { len + index } else { index };
        if (0..len).contains(&resolved) {
            Some(self.element_slot(resolved as usize))
        } else {
            None
        }
    }

    fn require_object(&self) -> Result<()> {
        if !self.is_object() {
            debug!(kind = %self.kind(), "jsonb key lookup on a non-object");
            bail!(ContractError::NotAnObject(self.kind()));
        }
        Ok(())
    }

    fn require_array(&self) -> Result<()> {
        if !self.is_array() {
            debug!(kind = %self.kind(), "jsonb positional access on a non-array");
            bail!(ContractError::NotAnArray(self.kind()));
        }
        Ok(())
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Value>> {
        self.require_object()?;
        Ok(self
            .find_key(key.as_ref(), None)
            .map(|slot| self.read(&slot)))
    }

    pub fn get_with_cursor(
        &self,
        key: impl AsRef<[u8]>,
        cursor: &mut usize,
    ) -> Result<Option<Value>> {
        self.require_object()?;
        Ok(self
            .find_key(key.as_ref(), Some(cursor))
            .map(|slot| self.read(&slot)))
    }

    pub fn get_index(&self, index: i64) -> Result<Option<Value>> {
        self.require_array()?;
        Ok(self.index_slot(index).map(|slot| self.read(&slot)))
    }

    /// Arrays: the first element equal to the scalar `needle`. Objects: the
    /// value stored under `needle` when it is a string.
    pub fn find(&self, needle: &Value) -> Option<Value> {
        let slot = if self.is_array() {
            self.find_scalar(needle)
        } else {
            match needle {
                Value::String(key) => self.find_key(key, None),
                _ => None,
            }
        };
        slot.map(|slot| self.read(&slot))
    }

    /// Keys of an object in stored (sorted) order.
    pub fn keys(&self) -> Result<Vec<Bytes>> {
        self.require_object()?;
        Ok((0..self.len())
            .map(|i| self.read_key(&self.key_slot(i)))
            .collect())
    }
}

pub fn lookup_key(jb: &Jsonb, key: impl AsRef<[u8]>) -> Result<Option<Value>> {
    jb.container().get(key)
}

pub fn lookup_key_with_cursor(
    jb: &Jsonb,
    key: impl AsRef<[u8]>,
    cursor: &mut usize,
) -> Result<Option<Value>> {
    jb.container().get_with_cursor(key, cursor)
}

pub fn get_index(jb: &Jsonb, index: i64) -> Result<Option<Value>> {
    jb.container().get_index(index)
}

pub fn locate_key(jb: &Jsonb, key: impl AsRef<[u8]>) -> Result<Option<Slot>> {
    let container = jb.container();
    container.require_object()?;
    Ok(container.find_key(key.as_ref(), None))
}

pub fn locate_index(jb: &Jsonb, index: i64) -> Result<Option<Slot>> {
    let container = jb.container();
    container.require_array()?;
    Ok(container.index_slot(index))
}

pub fn lookup_value(jb: &Jsonb, needle: &Value) -> Option<Value> {
    jb.container().find(needle)
}

pub fn object_keys(jb: &Jsonb) -> Result<Vec<Bytes>> {
    jb.container().keys()
}

pub fn array_len(jb: &Jsonb) -> Result<usize> {
    jb.container().require_array()?;
    Ok(jb.len())
}

/// Follows `path` through nested containers. A step whose kind does not
/// match the container it is applied to, a missing key and an out-of-range
/// position all yield `None`. The empty path yields the whole document.
pub fn get_path(jb: &Jsonb, path: &[PathStep]) -> Option<Value> {
    let Some((last, prefix)) = path.split_last() else {
        return Some(decode(jb));
    };
    if jb.is_scalar() {
        return None;
    }

    let mut current = jb.container().clone();
    for step in prefix {
        let slot = step_slot(&current, step)?;
        if slot.tag != EntryTag::Nested {
            return None;
        }
        current = current.nested(&slot);
    }

    step_slot(&current, last).map(|slot| current.read(&slot))
}

fn step_slot(container: &Container, step: &PathStep) -> Option<Slot> {
    match step {
        PathStep::Key(key) if container.is_object() => container.find_key(key, None),
        PathStep::Index(index) if container.is_array() => container.index_slot(*index),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode;
    use crate::format::ContainerKind;

    #[test]
    fn locate_returns_payload_range() {
        let jb = encode(&Value::object([
            ("name", Value::from("ada")),
            ("n", Value::from(7)),
            ("tags", Value::array([Value::from("x")])),
        ]))
        .unwrap();

        let name = locate_key(&jb, "name").unwrap().unwrap();
        assert_eq!(name.tag, EntryTag::String);
        assert_eq!(&jb.as_bytes()[name.start..name.end], b"ada");
        assert_eq!(name.len(), 3);

        let n = locate_key(&jb, "n").unwrap().unwrap();
        assert_eq!(n.tag, EntryTag::Numeric);
        assert_eq!(n.start % 4, 0);
        assert_eq!(n.len(), 16);

        let tags = locate_key(&jb, "tags").unwrap().unwrap();
        assert_eq!(tags.tag, EntryTag::Nested);
        let nested = Jsonb::new(jb.as_bytes()[tags.start..tags.end].to_vec());
        assert!(nested.is_err());

        assert_eq!(locate_key(&jb, "missing").unwrap(), None);
        assert!(locate_index(&jb, 0).is_err());
    }

    #[test]
    fn locate_index_resolves_negative_positions() {
        let jb = tens();
        let last = locate_index(&jb, -1).unwrap().unwrap();
        assert_eq!(last.index, 2);
        assert_eq!(last.tag, EntryTag::Numeric);
        assert_eq!(locate_index(&jb, 3).unwrap(), None);
        assert!(locate_key(&jb, "a").is_err());
    }

    fn tens() -> Jsonb {
        encode(&Value::array([
            Value::from(10),
            Value::from(20),
            Value::from(30),
        ]))
        .unwrap()
    }

    #[test]
    fn negative_index_counts_from_end() {
        let jb = tens();
        assert_eq!(get_index(&jb, -1).unwrap(), Some(Value::from(30)));
        assert_eq!(get_index(&jb, -3).unwrap(), Some(Value::from(10)));
        assert_eq!(get_index(&jb, 3).unwrap(), None);
        assert_eq!(get_index(&jb, -4).unwrap(), None);
    }

    #[test]
    fn key_lookup_on_array_is_contract_error() {
        let err = lookup_key(&tens(), "a").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContractError>(),
            Some(&ContractError::NotAnObject(ContainerKind::Array))
        );
    }

    #[test]
    fn index_on_object_is_contract_error() {
        let jb = encode(&Value::object([("a", Value::Null)])).unwrap();
        let err = get_index(&jb, 0).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContractError>(),
            Some(&ContractError::NotAnArray(ContainerKind::Object))
        );
    }

    #[test]
    fn key_lookup_matches_length_then_bytes() {
        let jb = encode(&Value::object([
            ("b", Value::from(1)),
            ("aa", Value::from(2)),
            ("a", Value::from(3)),
        ]))
        .unwrap();
        assert_eq!(lookup_key(&jb, "aa").unwrap(), Some(Value::from(2)));
        assert_eq!(lookup_key(&jb, "a").unwrap(), Some(Value::from(3)));
        assert_eq!(lookup_key(&jb, "c").unwrap(), None);
        assert_eq!(lookup_key(&jb, "").unwrap(), None);
    }

    #[test]
    fn cursor_moves_past_hits_and_to_insertion_point_on_miss() {
        let jb = encode(&Value::object([
            ("a", Value::from(1)),
            ("c", Value::from(3)),
            ("e", Value::from(5)),
        ]))
        .unwrap();

        let mut cursor = 0;
        assert_eq!(
            lookup_key_with_cursor(&jb, "a", &mut cursor).unwrap(),
            Some(Value::from(1))
        );
        assert_eq!(cursor, 1);
        assert_eq!(lookup_key_with_cursor(&jb, "d", &mut cursor).unwrap(), None);
        assert_eq!(cursor, 2);
        assert_eq!(
            lookup_key_with_cursor(&jb, "e", &mut cursor).unwrap(),
            Some(Value::from(5))
        );
        assert_eq!(cursor, 3);
        // keys before the cursor are no longer searched
        assert_eq!(lookup_key_with_cursor(&jb, "a", &mut cursor).unwrap(), None);
    }

    #[test]
    fn nested_value_is_returned_opaque() {
        let jb = encode(&Value::object([(
            "inner",
            Value::array([Value::from(1), Value::from(2)]),
        )]))
        .unwrap();
        match lookup_key(&jb, "inner").unwrap() {
            Some(Value::Binary(bytes)) => {
                let c = Container::open(bytes);
                assert!(c.is_array());
                assert_eq!(c.get_index(1).unwrap(), Some(Value::from(2)));
            }
            other => panic!("expected opaque nested value, got {:?}", other),
        }
    }

    #[test]
    fn scalar_scan_matches_by_type_and_value() {
        let jb = encode(&Value::array([
            Value::from(false),
            Value::string("x"),
            Value::Number("2.50".parse().unwrap()),
            Value::array([Value::Null]),
        ]))
        .unwrap();

        assert!(lookup_value(&jb, &Value::from(false)).is_some());
        assert!(lookup_value(&jb, &Value::from(true)).is_none());
        assert!(lookup_value(&jb, &Value::string("x")).is_some());
        assert!(lookup_value(&jb, &Value::Number("2.5".parse().unwrap())).is_some());
        assert!(lookup_value(&jb, &Value::Null).is_none());
    }

    #[test]
    fn lookup_value_on_object_probes_keys() {
        let jb = encode(&Value::object([("k", Value::from(7))])).unwrap();
        assert_eq!(lookup_value(&jb, &Value::string("k")), Some(Value::from(7)));
        assert_eq!(lookup_value(&jb, &Value::from(7)), None);
    }

    #[test]
    fn path_follows_keys_and_indices() {
        let jb = encode(&Value::object([(
            "a",
            Value::array([Value::Null, Value::object([("b", Value::from("deep"))])]),
        )]))
        .unwrap();

        let path = [PathStep::from("a"), PathStep::from(-1), PathStep::from("b")];
        assert_eq!(get_path(&jb, &path), Some(Value::from("deep")));
        assert_eq!(get_path(&jb, &[PathStep::from("a"), PathStep::from("b")]), None);
        assert_eq!(
            get_path(&jb, &[PathStep::from("a"), PathStep::from(0), PathStep::from(0)]),
            None
        );
        assert_eq!(get_path(&jb, &[]), Some(decode(&jb)));
    }

    #[test]
    fn keys_and_length() {
        let obj = encode(&Value::object([("bb", Value::Null), ("a", Value::Null)])).unwrap();
        assert_eq!(object_keys(&obj).unwrap(), vec![&b"a"[..], &b"bb"[..]]);
        assert!(array_len(&obj).is_err());
        assert_eq!(array_len(&tens()).unwrap(), 3);
    }
}
