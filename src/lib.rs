//! # TurDB Jsonb - Binary Container Codec
//!
//! Encoding, lookup, ordering and containment for TurDB's `jsonb` column
//! type. A document is stored as one contiguous buffer that can be probed
//! in place:
//!
//! - **Random access**: object keys are binary-searchable and array elements
//!   resolve in O(1) directly on the encoded bytes
//! - **Total order**: buffers compare without being decoded into trees
//! - **Containment**: `@>`-style subset tests over two buffers
//! - **Lazy iteration**: nested containers can be skipped as opaque slices
//!
//! ## Quick Start
//!
//! ```ignore
//! use turdb_jsonb::{encode, Value};
//!
//! let doc = encode(&Value::object([
//!     ("name", Value::from("ada")),
//!     ("langs", Value::array([Value::from("en"), Value::from("fr")])),
//! ]))?;
//!
//! assert_eq!(doc.get("name")?, Some(Value::from("ada")));
//! assert!(doc.contains(&encode(&Value::object([("name", Value::from("ada"))]))?));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Containment │ Comparator │ Index terms       │
//! ├──────────────┴────────────┴──────────────────┤
//! │        Lookup         │   Buffer iterator     │
//! ├───────────────────────┼──────────────────────┤
//! │  Encoder (walk ──>)   │  Builder (<── events) │
//! ├───────────────────────┴──────────────────────┤
//! │   Value tree   │   Container format (u32 LE)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The encoder, builder, iterator and index decomposition share one event
//! vocabulary ([`Event`]). Every traversal keeps per-depth state in an
//! explicit frame stack, so document depth never grows the call stack.
//!
//! ## Module Overview
//!
//! - [`value`]: in-memory tree, object finalization
//! - [`format`]: header/entry layout and the read-side `Container` view
//! - [`encoder`]: tree to buffer
//! - [`iter`]: pull iterator over a buffer
//! - [`builder`]: events to tree, full decode
//! - [`lookup`]: key, position, value and path access
//! - [`compare`]: total order over trees and buffers
//! - [`contains`]: containment and key existence
//! - [`index`]: secondary-index term extraction

pub mod builder;
pub mod compare;
pub mod config;
pub mod contains;
pub mod encoder;
pub mod error;
pub mod event;
pub mod format;
pub mod index;
pub mod iter;
pub mod jsonb;
pub mod lookup;
pub mod value;


pub use builder::{decode, decode_container, TreeBuilder};
pub use compare::{compare, compare_encoded, compare_keys, type_rank};
pub use contains::{contained, contains, contains_strict, exists, exists_all, exists_any};
pub use encoder::encode;
pub use error::ContractError;
pub use event::{walk, Event};
pub use format::{Container, ContainerKind, EntryTag, Slot};
pub use index::{decompose_for_index, decompose_value, IndexEntry, NullCategory};
pub use iter::{decode_root, JsonbIterator};
pub use jsonb::Jsonb;
pub use lookup::{
    array_len, get_index, get_path, locate_index, locate_key, lookup_key, lookup_key_with_cursor,
    lookup_value, object_keys, PathStep,
};
pub use value::{ArrayData, ObjectData, Pair, Value, ValueKind};
