//! # Index Term Decomposition
//!
//! Flattens a document into the terms a secondary index stores for it.
//! Every object key and every scalar produces one entry:
//!
//! | Source | `term` | `category` |
//! |--------|--------|------------|
//! | object key | key bytes | `NormalKey` |
//! | string | string bytes | `NormalKey` |
//! | number | normalized decimal text (`1.50` becomes `1.5`) | `NormalKey` |
//! | bool | `true` / `false` | `NormalKey` |
//! | null | none | `NullKey` |
//! | empty root container | none | `EmptyItem` |
//!
//! `in_array` is set for scalars that are direct elements of an array. The
//! scalar wrapper of a scalar root does not count as an array, so
//! `"x"` and `["x"]` produce distinguishable terms.
//!
//! Entries come out in document order; deduplication is left to the index.

use bytes::Bytes;
use smallvec::SmallVec;

use crate::config::INLINE_DEPTH;
use crate::event::{walk, Event};
use crate::iter::JsonbIterator;
use crate::jsonb::Jsonb;
use crate::value::{ArrayData, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum NullCategory {
    NormalKey = 0,
    NullKey = 1,
    EmptyItem = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub term: Option<Bytes>,
    pub category: NullCategory,
    pub in_array: bool,
}

impl IndexEntry {
    fn normal(term: Bytes, in_array: bool) -> Self {
        Self {
            term: Some(term),
            category: NullCategory::NormalKey,
            in_array,
        }
    }

    fn marker(category: NullCategory, in_array: bool) -> Self {
        Self {
            term: None,
            category,
            in_array,
        }
    }
}

#[derive(Default)]
struct TermCollector {
    in_array: SmallVec<[bool; INLINE_DEPTH]>,
    entries: Vec<IndexEntry>,
}

impl TermCollector {
    fn accept(&mut self, event: Event<&Value>) {
        match event {
            Event::BeginArray { len, scalar } => {
                if self.in_array.is_empty() && len == 0 {
                    self.entries.push(IndexEntry::marker(NullCategory::EmptyItem, true));
                }
                self.in_array.push(!scalar);
            }
            Event::BeginObject { len } => {
                if self.in_array.is_empty() && len == 0 {
                    self.entries.push(IndexEntry::marker(NullCategory::EmptyItem, false));
                }
                self.in_array.push(false);
            }
            Event::EndArray | Event::EndObject => {
                self.in_array.pop();
            }
            Event::Key(key) => self.entries.push(IndexEntry::normal(key, false)),
            Event::Elem(value) => {
                let in_array = self.in_array.last().copied().unwrap_or(false);
                self.scalar(value, in_array);
            }
            Event::Value(value) => self.scalar(value, false),
        }
    }

    fn scalar(&mut self, value: &Value, in_array: bool) {
        let entry = match value {
            Value::Null => IndexEntry::marker(NullCategory::NullKey, in_array),
            Value::Bool(true) => IndexEntry::normal(Bytes::from_static(b"true"), in_array),
            Value::Bool(false) => IndexEntry::normal(Bytes::from_static(b"false"), in_array),
            Value::String(s) => IndexEntry::normal(s.clone(), in_array),
            Value::Number(n) => {
                IndexEntry::normal(Bytes::from(n.normalize().to_string()), in_array)
            }
            Value::Binary(b) => {
                for event in JsonbIterator::open(b.clone()) {
                    self.accept(event.as_ref());
                }
                return;
            }
            Value::Array(_) | Value::Object(_) => {
                unreachable!("nested trees arrive as begin/end runs")
            }
        };
        self.entries.push(entry);
    }
}

/// Index terms of an encoded document.
pub fn decompose_for_index(jb: &Jsonb) -> Vec<IndexEntry> {
    let mut collector = TermCollector::default();
    for event in jb.iter() {
        collector.accept(event.as_ref());
    }
    collector.entries
}

/// Index terms of a tree, identical to decomposing its encoding.
pub fn decompose_value(value: &Value) -> Vec<IndexEntry> {
    let mut collector = TermCollector::default();
    match value {
        Value::Array(_) | Value::Object(_) => walk(value, |event, _| collector.accept(event)),
        Value::Binary(b) => {
            for event in JsonbIterator::open(b.clone()) {
                collector.accept(event.as_ref());
            }
        }
        scalar => {
            let root = Value::Array(ArrayData::scalar(scalar.clone()));
            walk(&root, |event, _| collector.accept(event));
        }
    }
    collector.entries
}
