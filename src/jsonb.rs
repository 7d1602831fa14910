//! # Root Jsonb Buffer
//!
//! `Jsonb` is an immutable, cheaply clonable handle to one encoded root
//! container. It is the type record glue stores and passes around; every
//! read-side operation of the codec is reachable from it.
//!
//! ## Boundary Validation
//!
//! [`Jsonb::new`] checks the root header once when bytes enter the codec
//! from storage:
//!
//! | Check | Error |
//! |-------|-------|
//! | at least one header word | `ContractError::TooShort` |
//! | version bit set, exactly one kind bit | `ContractError::UnsupportedFormat` |
//! | entries array fits in the buffer | `ContractError::TooShort` |
//!
//! Everything below the root header is trusted: nested headers and entries
//! written by this codec's encoder are only checked by `debug_assert!`.
//!
//! ## Ordering and Hashing
//!
//! `Jsonb` implements `Ord` through the buffer comparator and `Hash` by
//! feeding every iteration event to the hasher. Numbers are hashed in their
//! normalized form so that `1.0` and `1` (equal under `Ord`) hash alike.

use bytes::Bytes;
use eyre::{ensure, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::builder::decode;
use crate::compare::compare_encoded;
use crate::config::HEADER_SIZE;
use crate::contains;
use crate::error::ContractError;
use crate::event::Event;
use crate::format::{read_u32, Container, ContainerKind, Header};
use crate::iter::JsonbIterator;
use crate::lookup::{self, PathStep};
use crate::value::Value;

#[derive(Clone)]
pub struct Jsonb {
    root: Container,
}

impl Jsonb {
    /// Wraps bytes read from storage, validating the root header.
    pub fn new(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        ensure!(data.len() >= HEADER_SIZE, ContractError::TooShort(data.len()));

        let word = read_u32(&data, 0);
        let header = match Header::try_parse(word) {
            Some(header) if header.versioned => header,
            _ => {
                debug!(header = word, "rejected jsonb root header");
                return Err(ContractError::UnsupportedFormat(word).into());
            }
        };
        ensure!(
            header.data_start() <= data.len(),
            ContractError::TooShort(data.len())
        );

        Ok(Self {
            root: Container::open(data),
        })
    }

    pub(crate) fn from_encoded(data: Bytes) -> Self {
        Self {
            root: Container::open(data),
        }
    }

    pub fn container(&self) -> &Container {
        &self.root
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.root.bytes()
    }

    pub fn to_bytes(&self) -> Bytes {
        self.root.bytes().clone()
    }

    pub fn kind(&self) -> ContainerKind {
        self.root.kind()
    }

    /// True for a bare scalar wrapped as a one-element root array.
    pub fn is_scalar(&self) -> bool {
        self.root.is_scalar()
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn iter(&self) -> JsonbIterator {
        JsonbIterator::new(self.root.clone())
    }

    /// Materializes the whole document. A scalar root comes back bare.
    pub fn to_value(&self) -> Value {
        decode(self)
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Value>> {
        lookup::lookup_key(self, key)
    }

    pub fn get_index(&self, index: i64) -> Result<Option<Value>> {
        lookup::get_index(self, index)
    }

    pub fn get_path(&self, path: &[PathStep]) -> Option<Value> {
        lookup::get_path(self, path)
    }

    pub fn contains(&self, pattern: &Jsonb) -> bool {
        contains::contains(self, pattern)
    }

    pub fn exists(&self, key: impl AsRef<[u8]>) -> bool {
        contains::exists(self, key)
    }
}

impl PartialEq for Jsonb {
    fn eq(&self, other: &Self) -> bool {
        compare_encoded(self, other) == Ordering::Equal
    }
}

impl Eq for Jsonb {}

impl PartialOrd for Jsonb {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Jsonb {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_encoded(self, other)
    }
}

impl Hash for Jsonb {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut iter = self.iter();
        // a scalar root is equal to the bare scalar, so its wrapper is not hashed
        let unwrap = self.is_scalar();
        while let Some(event) = iter.next_event(false) {
            match event {
                Event::BeginArray { len, .. } if !unwrap => {
                    state.write_u8(0);
                    state.write_usize(len);
                }
                Event::BeginObject { len } => {
                    state.write_u8(1);
                    state.write_usize(len);
                }
                Event::Key(key) => {
                    state.write_u8(2);
                    key.hash(state);
                }
                Event::Elem(value) | Event::Value(value) => hash_scalar(&value, state),
                Event::EndArray if !unwrap => state.write_u8(3),
                Event::EndObject => state.write_u8(4),
                _ => {}
            }
        }
    }
}

fn hash_scalar<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => state.write_u8(5),
        Value::Bool(b) => {
            state.write_u8(6);
            b.hash(state);
        }
        Value::Number(n) => {
            state.write_u8(7);
            n.normalize().serialize().hash(state);
        }
        Value::String(s) => {
            state.write_u8(8);
            s.hash(state);
        }
        Value::Array(_) | Value::Object(_) | Value::Binary(_) => {
            unreachable!("full iteration yields only scalars")
        }
    }
}

impl fmt::Debug for Jsonb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Jsonb").field(&self.to_value()).finish()
    }
}

impl TryFrom<Bytes> for Jsonb {
    type Error = eyre::Report;

    fn try_from(data: Bytes) -> Result<Self> {
        Jsonb::new(data)
    }
}

impl TryFrom<&Value> for Jsonb {
    type Error = eyre::Report;

    fn try_from(value: &Value) -> Result<Self> {
        crate::encoder::encode(value)
    }
}
