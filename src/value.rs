//! # In-Memory Jsonb Tree
//!
//! `Value` is the materialized form of a jsonb document. Trees are built by
//! callers through the constructors below or by [`TreeBuilder`] from an event
//! stream, and are turned into a buffer by [`encode`].
//!
//! ## Shape Invariants
//!
//! | Node | Invariant |
//! |------|-----------|
//! | `ObjectData` | pairs sorted by `(key length, key bytes)`, keys distinct, once finalized |
//! | `ArrayData` with `scalar` | exactly one element, root only |
//! | `Value::Binary` | bytes start with a nested container header (no version bit) |
//!
//! Objects are transiently unsorted while a builder accumulates pairs or after
//! [`ObjectData::insert`]; [`ObjectData::finalize`] restores the invariant.
//!
//! ## Size Estimate
//!
//! Every container carries `size`, an upper bound of its serialized length
//! including the entry its parent spends on it and worst-case alignment
//! padding. The encoder reserves this many bytes up front and asserts the
//! output never exceeds it.
//!
//! [`TreeBuilder`]: crate::builder::TreeBuilder
//! [`encode`]: crate::encoder::encode

use bytes::Bytes;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use tracing::trace;

use crate::compare::{compare, compare_keys};
use crate::config::{CONTAINER_OVERHEAD, ENTRY_SIZE, MAX_PADDING, NUMERIC_SIZE};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Decimal),
    String(Bytes),
    Array(ArrayData),
    Object(ObjectData),
    /// Still-encoded nested container surfaced by skip-nested iteration.
    Binary(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
    Binary,
}

impl Value {
    pub fn string(s: impl AsRef<[u8]>) -> Self {
        Value::String(Bytes::copy_from_slice(s.as_ref()))
    }

    pub fn number(n: impl Into<Decimal>) -> Self {
        Value::Number(n.into())
    }

    pub fn array(elems: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(ArrayData::from_elems(elems))
    }

    /// Builds a finalized object; later duplicates of a key win.
    pub fn object<K: AsRef<[u8]>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut data = ObjectData::new();
        for (key, value) in pairs {
            data.insert(key, value);
        }
        data.finalize();
        Value::Object(data)
    }

    /// Wraps a bare scalar so it can be encoded as a root container.
    pub fn scalar_root(scalar: Value) -> Self {
        Value::Array(ArrayData::scalar(scalar))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
            Value::Binary(_) => ValueKind::Binary,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_array(&self) -> Option<&ArrayData> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectData> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Upper bound of the bytes this value occupies inside a parent
    /// container, entry included.
    pub fn size(&self) -> usize {
        match self {
            Value::Null | Value::Bool(_) => ENTRY_SIZE,
            Value::Number(_) => ENTRY_SIZE + MAX_PADDING + NUMERIC_SIZE,
            Value::String(s) => ENTRY_SIZE + s.len(),
            Value::Binary(b) => ENTRY_SIZE + MAX_PADDING + b.len(),
            Value::Array(a) => a.size,
            Value::Object(o) => o.size,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(Decimal::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Decimal::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Number(Decimal::from(v))
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Bytes::from(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[derive(Debug, Clone)]
pub struct ArrayData {
    pub(crate) elems: Vec<Value>,
    pub(crate) scalar: bool,
    pub(crate) size: usize,
}

impl ArrayData {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elems: Vec::with_capacity(capacity),
            scalar: false,
            size: CONTAINER_OVERHEAD,
        }
    }

    pub fn from_elems(elems: impl IntoIterator<Item = Value>) -> Self {
        let mut data = Self::new();
        for elem in elems {
            data.push(elem);
        }
        data
    }

    pub fn scalar(value: Value) -> Self {
        assert!(
            value.is_scalar(),
            "scalar wrapper must hold a scalar, got {:?}",
            value.kind()
        );
        let mut data = Self::with_capacity(1);
        data.push(value);
        data.scalar = true;
        data
    }

    pub fn push(&mut self, value: Value) {
        assert!(!self.scalar, "scalar wrapper holds exactly one element");
        self.size += value.size();
        self.elems.push(value);
    }

    pub fn elems(&self) -> &[Value] {
        &self.elems
    }

    pub fn into_elems(self) -> Vec<Value> {
        self.elems
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn is_scalar(&self) -> bool {
        self.scalar
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for ArrayData {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Pair {
    pub key: Bytes,
    pub value: Value,
    pub(crate) order: usize,
}

impl Pair {
    pub fn key_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.key).ok()
    }

    fn size(&self) -> usize {
        ENTRY_SIZE + self.key.len() + self.value.size()
    }
}

#[derive(Debug, Clone)]
pub struct ObjectData {
    pub(crate) pairs: Vec<Pair>,
    pub(crate) size: usize,
    next_order: usize,
}

impl ObjectData {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(capacity),
            size: CONTAINER_OVERHEAD,
            next_order: 0,
        }
    }

    /// Appends a pair without restoring key order. Call [`finalize`] before
    /// encoding or looking up keys.
    ///
    /// [`finalize`]: ObjectData::finalize
    pub fn insert(&mut self, key: impl AsRef<[u8]>, value: Value) {
        self.push_pair(Bytes::copy_from_slice(key.as_ref()), value);
    }

    pub(crate) fn push_pair(&mut self, key: Bytes, value: Value) {
        let pair = Pair {
            key,
            value,
            order: self.next_order,
        };
        self.next_order += 1;
        self.size += pair.size();
        self.pairs.push(pair);
    }

    /// Sorts pairs by `(key length, key bytes)` and keeps only the most
    /// recently inserted pair of every duplicated key.
    pub fn finalize(&mut self) {
        if self.pairs.len() < 2 {
            return;
        }

        self.pairs.sort_by(|a, b| {
            compare_keys(&a.key, &b.key).then_with(|| b.order.cmp(&a.order))
        });

        let before = self.pairs.len();
        self.pairs.dedup_by(|later, kept| later.key == kept.key);

        if self.pairs.len() != before {
            self.size = CONTAINER_OVERHEAD + self.pairs.iter().map(Pair::size).sum::<usize>();
            trace!(
                dropped = before - self.pairs.len(),
                pairs = self.pairs.len(),
                "deduplicated object keys"
            );
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.pairs
            .windows(2)
            .all(|w| compare_keys(&w[0].key, &w[1].key) == Ordering::Less)
    }

    /// Binary search over finalized pairs.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&Value> {
        let key = key.as_ref();
        self.pairs
            .binary_search_by(|p| compare_keys(&p.key, key))
            .ok()
            .map(|i| &self.pairs[i].value)
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<Pair> {
        self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for ObjectData {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ArrayData {
    fn eq(&self, other: &Self) -> bool {
        self.elems.len() == other.elems.len()
            && self.elems.iter().zip(&other.elems).all(|(a, b)| a == b)
    }
}

impl PartialEq for ObjectData {
    fn eq(&self, other: &Self) -> bool {
        self.pairs.len() == other.pairs.len()
            && self
                .pairs
                .iter()
                .zip(&other.pairs)
                .all(|(a, b)| a.key == b.key && a.value == b.value)
    }
}
