//! # Tree to Buffer Encoder
//!
//! The encoder consumes [`walk`] events for a tree and appends the container
//! format described in [`format`](crate::format) to one output buffer.
//!
//! ## Level Frames
//!
//! Each open container owns one frame on an explicit stack:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `begin` | output position before alignment padding, used to size the container |
//! | `entries` | output position of entry 0 |
//! | `data` | output position of the data section |
//! | `index` | next element or pair to write |
//! | `last_end` | cumulative end offset of the previous sibling |
//!
//! On begin, the header and a zeroed entries array are reserved immediately
//! because the element count is already known. Scalar payloads are appended
//! to the data cursor as their events arrive and their entry is written at
//! once. A nested container's length is only known at its end event, so the
//! parent's entry for that slot is written there, after the child's bytes.

use bytes::Bytes;
use eyre::{bail, Result};
use smallvec::SmallVec;
use tracing::trace;

use crate::compare::compare_keys;
use crate::config::{
    align_up, ENTRY_END_MASK, ENTRY_FLAG_FIRST, ENTRY_SIZE, ENTRY_TAG_SHIFT, HEADER_FLAG_VERSION,
    HEADER_SIZE, INLINE_DEPTH, MAX_CONTAINER_LEN, MAX_DATA_SIZE,
};
use crate::error::ContractError;
use crate::event::{walk, Event};
use crate::format::{read_u32, Container, ContainerKind, EntryTag, Header};
use crate::jsonb::Jsonb;
use crate::value::{ArrayData, Value};

struct LevelFrame {
    kind: ContainerKind,
    count: usize,
    begin: usize,
    entries: usize,
    data: usize,
    index: usize,
    last_end: usize,
    last_key: Option<(usize, usize)>,
}

struct Encoder {
    buf: Vec<u8>,
    levels: SmallVec<[LevelFrame; INLINE_DEPTH]>,
    max_depth: usize,
    error: Option<ContractError>,
}

impl Encoder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            levels: SmallVec::new(),
            max_depth: 0,
            error: None,
        }
    }

    fn fail(&mut self, error: ContractError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn pad(&mut self) {
        let aligned = align_up(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    fn accept(&mut self, event: Event<&Value>, level: usize) {
        match event {
            Event::BeginArray { len, scalar } => {
                self.begin(ContainerKind::Array, len, scalar, level)
            }
            Event::BeginObject { len } => self.begin(ContainerKind::Object, len, false, level),
            Event::Elem(value) => {
                let slot = self.top().index;
                self.put_value(value, slot);
                self.top().index += 1;
            }
            Event::Key(key) => {
                let slot = self.top().index * 2;
                let start = self.buf.len();
                self.buf.extend_from_slice(&key);
                self.check_key_order(start);
                self.put_entry(slot, EntryTag::String, start);
            }
            Event::Value(value) => {
                let slot = self.top().index * 2 + 1;
                self.put_value(value, slot);
                self.top().index += 1;
            }
            Event::EndArray | Event::EndObject => self.end(),
        }
    }

    fn top(&mut self) -> &mut LevelFrame {
        self.levels
            .last_mut()
            .unwrap_or_else(|| panic!("jsonb encoder received an event outside any container"))
    }

    fn begin(&mut self, kind: ContainerKind, len: usize, scalar: bool, level: usize) {
        debug_assert_eq!(level, self.levels.len());
        if len > MAX_CONTAINER_LEN {
            self.fail(ContractError::TooLarge {
                what: "container length",
                actual: len,
                max: MAX_CONTAINER_LEN,
            });
        }

        let begin = self.buf.len();
        self.pad();

        let header = Header {
            kind,
            scalar,
            versioned: level == 0,
            count: len,
        };
        self.buf.extend_from_slice(&header.to_word().to_le_bytes());
        let entries = self.buf.len();
        self.buf.resize(entries + header.entry_count() * ENTRY_SIZE, 0);
        let data = self.buf.len();

        self.levels.push(LevelFrame {
            kind,
            count: len,
            begin,
            entries,
            data,
            index: 0,
            last_end: 0,
            last_key: None,
        });
        self.max_depth = self.max_depth.max(self.levels.len());
    }

    fn end(&mut self) {
        let frame = self
            .levels
            .pop()
            .unwrap_or_else(|| panic!("jsonb encoder received an unbalanced end event"));
        assert_eq!(
            frame.index, frame.count,
            "jsonb {} closed after {} of {} children",
            frame.kind, frame.index, frame.count
        );

        if self.levels.is_empty() {
            return;
        }

        let parent = self.top();
        let slot = match parent.kind {
            ContainerKind::Array => parent.index,
            ContainerKind::Object => parent.index * 2 + 1,
        };
        self.put_entry(slot, EntryTag::Nested, frame.begin);
        self.top().index += 1;
    }

    fn put_value(&mut self, value: &Value, slot: usize) {
        let start = self.buf.len();
        let tag = match value {
            Value::Null => EntryTag::Null,
            Value::Bool(true) => EntryTag::True,
            Value::Bool(false) => EntryTag::False,
            Value::String(s) => {
                self.buf.extend_from_slice(s);
                EntryTag::String
            }
            Value::Number(n) => {
                self.pad();
                self.buf.extend_from_slice(&n.serialize());
                EntryTag::Numeric
            }
            Value::Binary(b) if Header::parse(read_u32(b, 0)).scalar => {
                // a scalar wrapper is only valid at the root
                let wrapper = Container::open(b.clone());
                let scalar = wrapper.read(&wrapper.element_slot(0));
                self.put_value(&scalar, slot);
                return;
            }
            Value::Binary(b) => {
                self.pad();
                let at = self.buf.len();
                self.buf.extend_from_slice(b);
                // nested regions never carry the root version bit
                let word = read_u32(&self.buf, at) & !HEADER_FLAG_VERSION;
                self.buf[at..at + 4].copy_from_slice(&word.to_le_bytes());
                EntryTag::Nested
            }
            Value::Array(_) | Value::Object(_) => {
                unreachable!("walk delivers nested trees as begin/end runs")
            }
        };
        self.put_entry(slot, tag, start);
    }

    /// Writes the entry for `slot`, whose payload (padding included) spans
    /// from `start` to the current end of the output.
    fn put_entry(&mut self, slot: usize, tag: EntryTag, start: usize) {
        let out_len = self.buf.len();
        let frame = self.top();
        let end = frame.last_end + (out_len - start);
        debug_assert_eq!(end, out_len - frame.data);
        frame.last_end = end;
        let at = frame.entries + slot * ENTRY_SIZE;

        if end > MAX_DATA_SIZE {
            self.fail(ContractError::TooLarge {
                what: "container data size",
                actual: end,
                max: MAX_DATA_SIZE,
            });
        }

        let mut word = (tag.bits() << ENTRY_TAG_SHIFT) | (end as u32 & ENTRY_END_MASK);
        if slot == 0 {
            word |= ENTRY_FLAG_FIRST;
        }
        self.buf[at..at + ENTRY_SIZE].copy_from_slice(&word.to_le_bytes());
    }

    fn check_key_order(&mut self, start: usize) {
        let end = self.buf.len();
        let previous = self.top().last_key.replace((start, end));
        if let Some((p_start, p_end)) = previous {
            let ordered = compare_keys(&self.buf[p_start..p_end], &self.buf[start..end]).is_lt();
            if !ordered {
                self.fail(ContractError::UnfinalizedObject);
            }
        }
    }

    fn finish(self) -> Result<(Vec<u8>, usize)> {
        if let Some(error) = self.error {
            bail!(error);
        }
        assert!(
            self.levels.is_empty(),
            "jsonb encoder finished with {} open containers",
            self.levels.len()
        );
        Ok((self.buf, self.max_depth))
    }
}

/// Serializes a tree into a root buffer.
///
/// Bare scalars are wrapped in a one-element scalar array. A `Value::Binary`
/// root is copied and re-stamped as a root container.
pub fn encode(value: &Value) -> Result<Jsonb> {
    match value {
        Value::Array(_) | Value::Object(_) => {}
        Value::Binary(b) => return encode_binary_root(b),
        scalar => return encode(&Value::Array(ArrayData::scalar(scalar.clone()))),
    }

    let estimate = value.size();
    let mut encoder = Encoder::with_capacity(estimate);
    walk(value, |event, level| encoder.accept(event, level));
    let (buf, depth) = encoder.finish()?;

    assert!(
        buf.len() <= estimate,
        "jsonb encoder wrote {} bytes, estimate was {}",
        buf.len(),
        estimate
    );
    trace!(bytes = buf.len(), estimate, depth, "encoded jsonb");

    Ok(Jsonb::from_encoded(Bytes::from(buf)))
}

fn encode_binary_root(nested: &Bytes) -> Result<Jsonb> {
    let mut buf = nested.to_vec();
    let header = Header::parse(read_u32(&buf, 0));
    let word = Header {
        versioned: true,
        ..header
    }
    .to_word();
    buf[..HEADER_SIZE].copy_from_slice(&word.to_le_bytes());
    Ok(Jsonb::from_encoded(Bytes::from(buf)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HEADER_FLAG_ARRAY, HEADER_FLAG_OBJECT, HEADER_FLAG_SCALAR};
    use crate::value::ObjectData;

    fn word(bytes: &[u8], at: usize) -> u32 {
        read_u32(bytes, at)
    }

    #[test]
    fn encodes_flat_array_layout() {
        let jb =
            encode(&Value::array([Value::Bool(false), Value::string("hi"), Value::Null])).unwrap();
        let bytes = jb.as_bytes();

        assert_eq!(word(bytes, 0), HEADER_FLAG_VERSION | HEADER_FLAG_ARRAY | 3);
        assert_eq!(word(bytes, 4), ENTRY_FLAG_FIRST | (2 << ENTRY_TAG_SHIFT));
        assert_eq!(word(bytes, 8), 2);
        assert_eq!(word(bytes, 12), (4 << ENTRY_TAG_SHIFT) | 2);
        assert_eq!(&bytes[16..], b"hi");
    }

    #[test]
    fn nested_container_is_aligned_and_unversioned() {
        let jb = encode(&Value::object([("a", Value::object([("b", Value::from(1))]))])).unwrap();
        let bytes = jb.as_bytes();

        assert_eq!(word(bytes, 0), HEADER_FLAG_VERSION | HEADER_FLAG_OBJECT | 1);
        // data starts at 12: key "a" then 3 bytes padding, nested header at 16
        assert_eq!(bytes[12], b'a');
        assert_eq!(&bytes[13..16], &[0, 0, 0]);
        assert_eq!(word(bytes, 16), HEADER_FLAG_OBJECT | 1);

        let value_entry = word(bytes, 8);
        assert_eq!(value_entry >> ENTRY_TAG_SHIFT, 5);
        assert_eq!((value_entry & ENTRY_END_MASK) as usize, bytes.len() - 12);
    }

    #[test]
    fn bare_scalar_root_is_wrapped() {
        let jb = encode(&Value::from(7)).unwrap();
        assert_eq!(
            word(jb.as_bytes(), 0),
            HEADER_FLAG_VERSION | HEADER_FLAG_ARRAY | HEADER_FLAG_SCALAR | 1
        );
    }

    #[test]
    fn empty_containers_are_header_only() {
        assert_eq!(encode(&Value::array(Vec::new())).unwrap().as_bytes().len(), 4);
        assert_eq!(
            encode(&Value::Object(ObjectData::new())).unwrap().as_bytes().len(),
            4
        );
    }

    #[test]
    fn unfinalized_object_is_a_contract_error() {
        let mut obj = ObjectData::new();
        obj.insert("b", Value::Null);
        obj.insert("a", Value::Null);
        let err = encode(&Value::Object(obj)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ContractError>(),
            Some(&ContractError::UnfinalizedObject)
        );
    }

    #[test]
    fn binary_element_is_copied_verbatim() {
        let inner = encode(&Value::array([Value::from(1), Value::from(2)])).unwrap();
        let nested = crate::lookup::get_index(&inner, 0).unwrap();
        assert_eq!(nested, Some(Value::from(1)));

        let outer = encode(&Value::object([("x", Value::array([Value::Null]))])).unwrap();
        let binary = crate::lookup::lookup_key(&outer, "x").unwrap().unwrap();
        assert!(matches!(binary, Value::Binary(_)));

        let rebuilt = encode(&Value::array([binary.clone()])).unwrap();
        let direct = encode(&Value::array([Value::array([Value::Null])])).unwrap();
        assert_eq!(rebuilt.as_bytes(), direct.as_bytes());
    }

    #[test]
    fn nested_scalar_root_binary_is_unwrapped() {
        let one = encode(&Value::from(1)).unwrap();
        let word = encode(&Value::from("w")).unwrap();
        let outer = encode(&Value::object([
            ("a", Value::Binary(one.to_bytes())),
            ("b", Value::Binary(word.to_bytes())),
        ]))
        .unwrap();
        let expected = Value::object([("a", Value::from(1)), ("b", Value::from("w"))]);
        let direct = encode(&expected).unwrap();
        assert_eq!(outer.as_bytes(), direct.as_bytes());
        assert_eq!(crate::builder::decode(&outer), expected);

        let in_array = encode(&Value::array([Value::Binary(one.to_bytes())])).unwrap();
        assert!(!in_array.is_scalar());
        let plain = encode(&Value::array([Value::from(1)])).unwrap();
        assert_eq!(in_array.as_bytes(), plain.as_bytes());
    }

    #[test]
    fn binary_root_gets_version_bit() {
        let outer = encode(&Value::object([("x", Value::array([Value::Null]))])).unwrap();
        let binary = crate::lookup::lookup_key(&outer, "x").unwrap().unwrap();
        let root = encode(&binary).unwrap();
        let direct = encode(&Value::array([Value::Null])).unwrap();
        assert_eq!(root.as_bytes(), direct.as_bytes());
    }

    #[test]
    fn output_never_exceeds_estimate() {
        let tree = Value::array([
            Value::string("x"),
            Value::from(1),
            Value::object([("k", Value::array([Value::from(2), Value::string("yy")]))]),
        ]);
        let jb = encode(&tree).unwrap();
        assert!(jb.as_bytes().len() <= tree.size());
    }
}
