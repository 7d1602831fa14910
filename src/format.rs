//! # Jsonb Binary Format
//!
//! Read-side view of one encoded container. Every read is an explicit
//! little-endian load of a fixed-width field at a computed offset; nothing is
//! reinterpreted in place.
//!
//! ## Container Layout
//!
//! ```text
//! +----------+------------------------------+---------------------------+
//! | Header   | Entries                      | Data                      |
//! | (u32)    | [u32; n] or [u32; 2n]        | [u8; ...]                 |
//! +----------+------------------------------+---------------------------+
//!
//! Header (4 bytes):
//!   Bit 31:    Version (root container only)
//!   Bit 30:    Array
//!   Bit 29:    Object
//!   Bit 28:    Scalar wrapper (root array of one bare scalar)
//!   Bits 27-0: Element count (array) or pair count (object)
//!
//! Entry (4 bytes):
//!   Bit 31:    First entry of the container
//!   Bits 30-28: Tag (0=string, 1=numeric, 2=false, 3=true, 4=null, 5=nested)
//!   Bits 27-0: Cumulative end offset into the data section
//! ```
//!
//! Object entries interleave keys and values: `key0, value0, key1, value1...`
//! Element `i` occupies `[end(i-1), end(i))` of the data section, element 0
//! starts at 0. Numbers and nested containers begin at the next 4-byte
//! boundary inside that range; the skipped bytes are zero padding.
//!
//! ## Performance Characteristics
//!
//! | Operation      | Time Complexity |
//! |----------------|-----------------|
//! | len()          | O(1)            |
//! | slot(i)        | O(1)            |
//! | read(slot)     | O(1) + copy of numeric payload |

use bytes::Bytes;
use rust_decimal::Decimal;
use std::fmt;

use crate::config::{
    align_up, ENTRY_END_MASK, ENTRY_SIZE, ENTRY_TAG_MASK, ENTRY_TAG_SHIFT, HEADER_COUNT_MASK,
    HEADER_FLAG_ARRAY, HEADER_FLAG_OBJECT, HEADER_FLAG_SCALAR, HEADER_FLAG_VERSION,
    HEADER_KIND_MASK, HEADER_SIZE, NUMERIC_SIZE, TAG_BOOL_FALSE, TAG_BOOL_TRUE, TAG_NESTED,
    TAG_NULL, TAG_NUMERIC, TAG_STRING,
};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Array,
    Object,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Array => f.write_str("array"),
            ContainerKind::Object => f.write_str("object"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: ContainerKind,
    pub scalar: bool,
    pub versioned: bool,
    pub count: usize,
}

impl Header {
    /// Returns `None` when the kind bits name neither or both container kinds.
    pub fn try_parse(word: u32) -> Option<Self> {
        let kind = match word & HEADER_KIND_MASK {
            HEADER_FLAG_ARRAY => ContainerKind::Array,
            HEADER_FLAG_OBJECT => ContainerKind::Object,
            _ => return None,
        };
        let scalar = word & HEADER_FLAG_SCALAR != 0;
        let count = (word & HEADER_COUNT_MASK) as usize;
        if scalar && (kind != ContainerKind::Array || count != 1) {
            return None;
        }
        Some(Self {
            kind,
            scalar,
            versioned: word & HEADER_FLAG_VERSION != 0,
            count,
        })
    }

    pub fn parse(word: u32) -> Self {
        Self::try_parse(word)
            .unwrap_or_else(|| panic!("corrupted jsonb container header {:#010x}", word))
    }

    pub fn to_word(self) -> u32 {
        let mut word = self.count as u32 & HEADER_COUNT_MASK;
        word |= match self.kind {
            ContainerKind::Array => HEADER_FLAG_ARRAY,
            ContainerKind::Object => HEADER_FLAG_OBJECT,
        };
        if self.scalar {
            word |= HEADER_FLAG_SCALAR;
        }
        if self.versioned {
            word |= HEADER_FLAG_VERSION;
        }
        word
    }

    pub fn entry_count(&self) -> usize {
        match self.kind {
            ContainerKind::Array => self.count,
            ContainerKind::Object => self.count * 2,
        }
    }

    pub fn data_start(&self) -> usize {
        HEADER_SIZE + self.entry_count() * ENTRY_SIZE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTag {
    String,
    Numeric,
    False,
    True,
    Null,
    Nested,
}

impl EntryTag {
    pub fn from_bits(bits: u32) -> Self {
        match bits {
            TAG_STRING => EntryTag::String,
            TAG_NUMERIC => EntryTag::Numeric,
            TAG_BOOL_FALSE => EntryTag::False,
            TAG_BOOL_TRUE => EntryTag::True,
            TAG_NULL => EntryTag::Null,
            TAG_NESTED => EntryTag::Nested,
            other => panic!("unknown jsonb entry tag {}", other),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            EntryTag::String => TAG_STRING,
            EntryTag::Numeric => TAG_NUMERIC,
            EntryTag::False => TAG_BOOL_FALSE,
            EntryTag::True => TAG_BOOL_TRUE,
            EntryTag::Null => TAG_NULL,
            EntryTag::Nested => TAG_NESTED,
        }
    }

    pub fn is_aligned(self) -> bool {
        matches!(self, EntryTag::Numeric | EntryTag::Nested)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry(pub u32);

impl Entry {
    pub fn tag(self) -> EntryTag {
        EntryTag::from_bits((self.0 & ENTRY_TAG_MASK) >> ENTRY_TAG_SHIFT)
    }

    pub fn end(self) -> usize {
        (self.0 & ENTRY_END_MASK) as usize
    }
}

/// Location of one entry's payload, relative to the container start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    pub tag: EntryTag,
    pub start: usize,
    pub end: usize,
}

impl Slot {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    debug_assert!(
        offset + 4 <= data.len(),
        "jsonb read at {} past end of {} byte buffer",
        offset,
        data.len()
    );
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// One encoded container, root or nested, sharing the underlying buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Container {
    data: Bytes,
    header: Header,
}

impl Container {
    /// Opens a container produced by this codec. Corrupted headers panic.
    pub fn open(data: Bytes) -> Self {
        assert!(
            data.len() >= HEADER_SIZE,
            "jsonb container shorter than its header: {} bytes",
            data.len()
        );
        let header = Header::parse(read_u32(&data, 0));
        debug_assert!(
            header.data_start() <= data.len(),
            "jsonb entries exceed container of {} bytes",
            data.len()
        );
        Self { data, header }
    }

    pub fn kind(&self) -> ContainerKind {
        self.header.kind
    }

    pub fn is_array(&self) -> bool {
        self.header.kind == ContainerKind::Array
    }

    pub fn is_object(&self) -> bool {
        self.header.kind == ContainerKind::Object
    }

    pub fn is_scalar(&self) -> bool {
        self.header.scalar
    }

    /// Element count for arrays, pair count for objects.
    pub fn len(&self) -> usize {
        self.header.count
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub(crate) fn entry(&self, index: usize) -> Entry {
        debug_assert!(index < self.header.entry_count());
        Entry(read_u32(&self.data, HEADER_SIZE + index * ENTRY_SIZE))
    }

    /// Resolves entry `index` (raw entry position, keys included) to its
    /// payload range.
    pub(crate) fn slot(&self, index: usize) -> Slot {
        let entry = self.entry(index);
        let begin = if index == 0 {
            0
        } else {
            self.entry(index - 1).end()
        };
        let end = entry.end();
        let tag = entry.tag();
        let begin = if tag.is_aligned() { align_up(begin) } else { begin };

        let base = self.header.data_start();
        debug_assert!(
            begin <= end && base + end <= self.data.len(),
            "jsonb entry {} range {}..{} outside container of {} bytes",
            index,
            begin,
            end,
            self.data.len()
        );
        Slot {
            index,
            tag,
            start: base + begin,
            end: base + end,
        }
    }

    pub(crate) fn element_slot(&self, i: usize) -> Slot {
        debug_assert!(self.is_array());
        self.slot(i)
    }

    pub(crate) fn key_slot(&self, pair: usize) -> Slot {
        debug_assert!(self.is_object());
        self.slot(pair * 2)
    }

    pub(crate) fn value_slot(&self, pair: usize) -> Slot {
        debug_assert!(self.is_object());
        self.slot(pair * 2 + 1)
    }

    pub(crate) fn payload(&self, slot: &Slot) -> &[u8] {
        &self.data[slot.start..slot.end]
    }

    pub(crate) fn read_key(&self, slot: &Slot) -> Bytes {
        assert!(
            slot.tag == EntryTag::String,
            "jsonb object key entry {} has tag {:?}",
            slot.index,
            slot.tag
        );
        self.data.slice(slot.start..slot.end)
    }

    pub(crate) fn read_number(&self, slot: &Slot) -> Decimal {
        let raw = self.payload(slot);
        assert!(
            raw.len() == NUMERIC_SIZE,
            "jsonb numeric payload of {} bytes",
            raw.len()
        );
        let mut buf = [0u8; NUMERIC_SIZE];
        buf.copy_from_slice(raw);
        Decimal::deserialize(buf)
    }

    /// Materializes one entry. Nested containers come back as
    /// `Value::Binary` sharing this buffer.
    pub(crate) fn read(&self, slot: &Slot) -> Value {
        match slot.tag {
            EntryTag::Null => Value::Null,
            EntryTag::True => Value::Bool(true),
            EntryTag::False => Value::Bool(false),
            EntryTag::String => Value::String(self.data.slice(slot.start..slot.end)),
            EntryTag::Numeric => Value::Number(self.read_number(slot)),
            EntryTag::Nested => Value::Binary(self.data.slice(slot.start..slot.end)),
        }
    }

    pub(crate) fn nested(&self, slot: &Slot) -> Container {
        assert!(
            slot.tag == EntryTag::Nested,
            "jsonb entry {} is not a nested container",
            slot.index
        );
        Container::open(self.data.slice(slot.start..slot.end))
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("kind", &self.header.kind)
            .field("len", &self.header.count)
            .field("scalar", &self.header.scalar)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_word() {
        let header = Header {
            kind: ContainerKind::Object,
            scalar: false,
            versioned: true,
            count: 3,
        };
        assert_eq!(Header::parse(header.to_word()), header);
        assert_eq!(header.to_word(), 0xA000_0003);
    }

    #[test]
    fn header_rejects_both_kind_bits() {
        assert!(Header::try_parse(HEADER_FLAG_ARRAY | HEADER_FLAG_OBJECT).is_none());
        assert!(Header::try_parse(0).is_none());
    }

    #[test]
    fn header_rejects_scalar_object() {
        assert!(Header::try_parse(HEADER_FLAG_OBJECT | HEADER_FLAG_SCALAR | 1).is_none());
        assert!(Header::try_parse(HEADER_FLAG_ARRAY | HEADER_FLAG_SCALAR | 2).is_none());
    }

    #[test]
    fn object_data_starts_after_interleaved_entries() {
        let header = Header::parse(HEADER_FLAG_OBJECT | 2);
        assert_eq!(header.entry_count(), 4);
        assert_eq!(header.data_start(), HEADER_SIZE + 16);
    }

    #[test]
    #[should_panic(expected = "unknown jsonb entry tag")]
    fn unknown_tag_is_fatal() {
        Entry(7 << ENTRY_TAG_SHIFT).tag();
    }

    #[test]
    fn slot_skips_alignment_padding_for_numbers() {
        // ["ab", 1]: string of 2 bytes, then a numeric padded to offset 4
        let mut buf = Vec::new();
        buf.extend((HEADER_FLAG_ARRAY | 2).to_le_bytes());
        buf.extend((crate::config::ENTRY_FLAG_FIRST | 2).to_le_bytes());
        buf.extend(((TAG_NUMERIC << ENTRY_TAG_SHIFT) | 20).to_le_bytes());
        buf.extend(b"ab");
        buf.extend([0, 0]);
        buf.extend(Decimal::from(1).serialize());

        let c = Container::open(Bytes::from(buf));
        let s0 = c.element_slot(0);
        let s1 = c.element_slot(1);
        assert_eq!((s0.start, s0.end), (12, 14));
        assert_eq!((s1.start, s1.end), (16, 32));
        assert_eq!(c.read(&s1), Value::from(1));
    }
}
