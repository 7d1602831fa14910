//! # Tree Builder
//!
//! Assembles a `Value` tree from a stream of structural events. Each open
//! container is one frame on an explicit stack:
//!
//! | Event | Effect |
//! |-------|--------|
//! | `BeginArray` / `BeginObject` | push a frame sized from the event's length hint |
//! | `Elem` | append to the top array |
//! | `Key` | stash as the top object's pending key |
//! | `Value` | append `(pending key, value)` to the top object |
//! | `EndArray` / `EndObject` | pop, finalize objects, attach to the new top or return as root |
//!
//! A builder created with [`TreeBuilder::new`] finalizes every object at its
//! end event: pairs are sorted by `(key length, key bytes)` and for each run
//! of equal keys only the pair inserted last survives. Buffers produced by
//! the encoder are already sorted and unique, so [`decode`] uses
//! [`TreeBuilder::presorted`], which only checks the order in debug builds.
//!
//! Events out of order (a `Value` with no `Key`, an `EndObject` closing an
//! array, a scalar wrapper below the root) are internal invariant
//! violations and panic.

use bytes::Bytes;
use smallvec::SmallVec;

use crate::config::{DEFAULT_FRAME_CAPACITY, INLINE_DEPTH};
use crate::event::Event;
use crate::format::Container;
use crate::iter::JsonbIterator;
use crate::jsonb::Jsonb;
use crate::value::{ArrayData, ObjectData, Value};

enum Frame {
    Array {
        data: ArrayData,
        scalar: bool,
    },
    Object {
        data: ObjectData,
        pending_key: Option<Bytes>,
    },
}

pub struct TreeBuilder {
    stack: SmallVec<[Frame; INLINE_DEPTH]>,
    finalize: bool,
}

fn capacity_hint(len: usize) -> usize {
    if len == 0 {
        DEFAULT_FRAME_CAPACITY
    } else {
        len
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            stack: SmallVec::new(),
            finalize: true,
        }
    }

    /// Builder for event streams whose object keys are already sorted and
    /// unique, such as iteration over an encoded buffer.
    pub fn presorted() -> Self {
        Self {
            stack: SmallVec::new(),
            finalize: false,
        }
    }

    /// Feeds every event to a fresh finalizing builder and returns the root.
    pub fn build(events: impl IntoIterator<Item = Event>) -> Option<Value> {
        let mut builder = Self::new();
        events.into_iter().find_map(|event| builder.push(event))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Applies one event. Returns the finished root when its end event
    /// empties the stack.
    pub fn push(&mut self, event: Event) -> Option<Value> {
        match event {
            Event::BeginArray { len, scalar } => {
                assert!(
                    !scalar || (self.stack.is_empty() && len == 1),
                    "scalar array wrapper must be a one-element root"
                );
                self.stack.push(Frame::Array {
                    data: ArrayData::with_capacity(capacity_hint(len)),
                    scalar,
                });
                None
            }
            Event::BeginObject { len } => {
                self.stack.push(Frame::Object {
                    data: ObjectData::with_capacity(capacity_hint(len)),
                    pending_key: None,
                });
                None
            }
            Event::Elem(value) => {
                match self.stack.last_mut() {
                    Some(Frame::Array { data, .. }) => data.push(value),
                    Some(Frame::Object { .. }) => panic!("element event inside an object"),
                    None => panic!("element event outside any container"),
                }
                None
            }
            Event::Key(key) => {
                match self.stack.last_mut() {
                    Some(Frame::Object { pending_key, .. }) => {
                        assert!(pending_key.is_none(), "key event while a key is pending");
                        *pending_key = Some(key);
                    }
                    Some(Frame::Array { .. }) => panic!("key event inside an array"),
                    None => panic!("key event outside any container"),
                }
                None
            }
            Event::Value(value) => {
                self.attach_value(value);
                None
            }
            Event::EndArray => match self.stack.pop() {
                Some(Frame::Array { mut data, scalar }) => {
                    if scalar {
                        assert!(
                            data.len() == 1 && data.elems[0].is_scalar(),
                            "scalar array wrapper must hold one scalar"
                        );
                        data.scalar = true;
                    }
                    self.attach(Value::Array(data))
                }
                Some(Frame::Object { .. }) => panic!("end of array while an object is open"),
                None => panic!("end of array outside any container"),
            },
            Event::EndObject => match self.stack.pop() {
                Some(Frame::Object {
                    mut data,
                    pending_key,
                }) => {
                    assert!(pending_key.is_none(), "object ended with a key but no value");
                    if self.finalize {
                        data.finalize();
                    } else {
                        debug_assert!(data.is_finalized(), "presorted object keys out of order");
                    }
                    self.attach(Value::Object(data))
                }
                Some(Frame::Array { .. }) => panic!("end of object while an array is open"),
                None => panic!("end of object outside any container"),
            },
        }
    }

    fn attach(&mut self, value: Value) -> Option<Value> {
        match self.stack.last_mut() {
            None => return Some(value),
            Some(Frame::Array { data, .. }) => data.push(value),
            Some(Frame::Object { data, pending_key }) => {
                let key = pending_key
                    .take()
                    .unwrap_or_else(|| panic!("container value without a preceding key"));
                data.push_pair(key, value);
            }
        }
        None
    }

    fn attach_value(&mut self, value: Value) {
        match self.stack.last_mut() {
            Some(Frame::Object { data, pending_key }) => {
                let key = pending_key
                    .take()
                    .unwrap_or_else(|| panic!("value event without a preceding key"));
                data.push_pair(key, value);
            }
            Some(Frame::Array { .. }) => panic!("value event inside an array"),
            None => panic!("value event outside any container"),
        }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Materializes an encoded container. Nested containers are expanded, so
/// the result holds no `Value::Binary`.
pub fn decode_container(container: &Container) -> Value {
    let mut builder = TreeBuilder::presorted();
    for event in JsonbIterator::new(container.clone()) {
        if let Some(root) = builder.push(event) {
            return root;
        }
    }
    unreachable!("jsonb iteration ended before its root container closed")
}

/// Materializes a root buffer, unwrapping a scalar root to the bare scalar.
pub fn decode(jb: &Jsonb) -> Value {
    match decode_container(jb.container()) {
        Value::Array(data) if data.is_scalar() => match data.into_elems().pop() {
            Some(scalar) => scalar,
            None => unreachable!("scalar wrapper without an element"),
        },
        other => other,
    }
}
