//! # Jsonb Format Constants
//!
//! This module centralizes every constant that defines the encoded layout of
//! a jsonb container, grouping interdependent values together and documenting
//! their relationships. The encoder, the iterator and the lookup routines all
//! read these values from here so a layout change cannot drift between the
//! write path and the read path.
//!
//! ## Dependency Graph
//!
//! ```text
//! HEADER_SIZE (4 bytes)  ENTRY_SIZE (4 bytes)
//!       │                      │
//!       └──────────┬───────────┘
//!                  │
//!                  └─> data section start = HEADER_SIZE + n * ENTRY_SIZE
//!                        Always a multiple of PAYLOAD_ALIGN, so alignment
//!                        relative to the data section equals alignment
//!                        relative to the container start.
//!
//! ENTRY_END_MASK (28 bits)
//!       │
//!       ├─> MAX_DATA_SIZE (largest cumulative offset in one container)
//!       │
//!       └─> ENTRY_TAG_SHIFT (tag bits sit directly above the offset)
//!
//! HEADER_COUNT_MASK (28 bits)
//!       │
//!       └─> MAX_CONTAINER_LEN (largest element or pair count)
//! ```
//!
//! ## Critical Invariants
//!
//! These invariants are enforced by compile-time assertions:
//!
//! 1. `HEADER_SIZE` and `ENTRY_SIZE` are multiples of `PAYLOAD_ALIGN`
//! 2. Header flag bits never overlap the count bits
//! 3. Entry tag bits never overlap the offset bits or the first-entry flag
//! 4. `PAYLOAD_ALIGN` is a power of two

// ============================================================================
// CONTAINER HEADER
// The first word of every container, nested or root
// ============================================================================

/// Size of a container header in bytes.
pub const HEADER_SIZE: usize = 4;

/// Low bits of the header holding the element count (arrays) or pair count
/// (objects).
pub const HEADER_COUNT_MASK: u32 = 0x0FFF_FFFF;

/// Marks the root array that wraps a bare scalar.
pub const HEADER_FLAG_SCALAR: u32 = 0x1000_0000;

/// Container is an object.
pub const HEADER_FLAG_OBJECT: u32 = 0x2000_0000;

/// Container is an array.
pub const HEADER_FLAG_ARRAY: u32 = 0x4000_0000;

/// Set on the root header only. Distinguishes this header+entry format from
/// the legacy layout, which never sets the top bit.
pub const HEADER_FLAG_VERSION: u32 = 0x8000_0000;

pub const HEADER_KIND_MASK: u32 = HEADER_FLAG_OBJECT | HEADER_FLAG_ARRAY;

pub const MAX_CONTAINER_LEN: usize = HEADER_COUNT_MASK as usize;

const _: () = assert!(
    (HEADER_FLAG_SCALAR | HEADER_FLAG_OBJECT | HEADER_FLAG_ARRAY | HEADER_FLAG_VERSION)
        & HEADER_COUNT_MASK
        == 0,
    "header flags overlap the count bits"
);

// ============================================================================
// ENTRIES
// One word per array element, two words (key, value) per object pair
// ============================================================================

/// Size of one entry in bytes.
pub const ENTRY_SIZE: usize = 4;

/// Low bits of an entry holding the cumulative end offset into the data
/// section.
pub const ENTRY_END_MASK: u32 = 0x0FFF_FFFF;

pub const ENTRY_TAG_SHIFT: u32 = 28;

pub const ENTRY_TAG_MASK: u32 = 0x7 << ENTRY_TAG_SHIFT;

/// Set on entry 0 of a container, whose end offset is also its absolute
/// length.
pub const ENTRY_FLAG_FIRST: u32 = 0x8000_0000;

pub const TAG_STRING: u32 = 0;
pub const TAG_NUMERIC: u32 = 1;
pub const TAG_BOOL_FALSE: u32 = 2;
pub const TAG_BOOL_TRUE: u32 = 3;
pub const TAG_NULL: u32 = 4;
pub const TAG_NESTED: u32 = 5;

/// Largest data section a single container may address.
pub const MAX_DATA_SIZE: usize = ENTRY_END_MASK as usize;

const _: () = assert!(
    ENTRY_TAG_MASK & ENTRY_END_MASK == 0 && ENTRY_TAG_MASK & ENTRY_FLAG_FIRST == 0,
    "entry tag bits overlap offset or first-entry bits"
);

const _: () = assert!(
    TAG_NESTED << ENTRY_TAG_SHIFT <= ENTRY_TAG_MASK,
    "entry tags do not fit in the tag field"
);

// ============================================================================
// DATA SECTION
// ============================================================================

/// Numbers and nested containers start on this boundary, zero padded.
/// Strings are never padded.
pub const PAYLOAD_ALIGN: usize = 4;

/// Serialized width of a numeric payload (`rust_decimal::Decimal::serialize`).
pub const NUMERIC_SIZE: usize = 16;

const _: () = assert!(
    PAYLOAD_ALIGN.is_power_of_two(),
    "PAYLOAD_ALIGN must be a power of two"
);

const _: () = assert!(
    HEADER_SIZE % PAYLOAD_ALIGN == 0 && ENTRY_SIZE % PAYLOAD_ALIGN == 0,
    "data sections must start aligned"
);

// ============================================================================
// SIZE ESTIMATES
// Upper bounds maintained on trees so the encoder can size its buffer once
// ============================================================================

/// Worst-case padding in front of an aligned payload.
pub const MAX_PADDING: usize = PAYLOAD_ALIGN - 1;

/// Fixed cost of a nested container inside its parent: the parent's entry,
/// alignment padding and the container's own header.
pub const CONTAINER_OVERHEAD: usize = ENTRY_SIZE + MAX_PADDING + HEADER_SIZE;

// ============================================================================
// FRAME STACKS
// ============================================================================

/// Backing capacity of a builder frame when the caller gives no size hint.
pub const DEFAULT_FRAME_CAPACITY: usize = 4;

/// Nesting depth served without spilling the encoder, iterator, builder and
/// comparator frame stacks to the heap. Deeper values grow the stack.
pub const INLINE_DEPTH: usize = 8;

#[inline]
pub const fn align_up(offset: usize) -> usize {
    (offset + MAX_PADDING) & !MAX_PADDING
}
