//! # Buffer Iterator
//!
//! Pull-based, forward-only traversal of an encoded buffer. Each nesting
//! level keeps its own state machine:
//!
//! ```text
//! Start ──> Elem* ──> End          (array)
//! Start ──> (Key ──> Value)* ──> End   (object)
//! ```
//!
//! Levels live on an explicit stack; the parent of a level is the slot below
//! it. Descending into a nested container pushes a level and immediately
//! produces that level's begin event; its end event pops it.
//!
//! With `skip_nested = true` a nested entry is returned as `Value::Binary`
//! sharing the parent buffer and no level is pushed. The opaque region can
//! be opened later with [`JsonbIterator::new`] over
//! `Container::open(bytes)`.
//!
//! Iteration is not restartable. Re-create the iterator from the original
//! `Jsonb`, which only clones a reference-counted handle.

use bytes::Bytes;
use smallvec::SmallVec;

use crate::config::INLINE_DEPTH;
use crate::event::Event;
use crate::format::{Container, ContainerKind, EntryTag};
use crate::jsonb::Jsonb;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Elem,
    Key,
    Value,
}

#[derive(Debug)]
struct Level {
    container: Container,
    state: State,
    index: usize,
}

impl Level {
    fn new(container: Container) -> Self {
        Self {
            container,
            state: State::Start,
            index: 0,
        }
    }
}

#[derive(Debug)]
pub struct JsonbIterator {
    levels: SmallVec<[Level; INLINE_DEPTH]>,
}

impl JsonbIterator {
    pub fn new(container: Container) -> Self {
        let mut levels = SmallVec::new();
        levels.push(Level::new(container));
        Self { levels }
    }

    /// Opens an opaque region returned by skip-nested iteration.
    pub fn open(binary: Bytes) -> Self {
        Self::new(Container::open(binary))
    }

    /// Number of open levels. Zero once the root's end event was returned.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Returns the next event, or `None` once the root container has ended.
    pub fn next_event(&mut self, skip_nested: bool) -> Option<Event> {
        loop {
            let level = self.levels.last_mut()?;

            match level.state {
                State::Start => {
                    let header = level.container.header();
                    return Some(match header.kind {
                        ContainerKind::Array => {
                            level.state = State::Elem;
                            Event::BeginArray {
                                len: header.count,
                                scalar: header.scalar,
                            }
                        }
                        ContainerKind::Object => {
                            level.state = State::Key;
                            Event::BeginObject { len: header.count }
                        }
                    });
                }
                State::Elem => {
                    if level.index >= level.container.len() {
                        self.levels.pop();
                        return Some(Event::EndArray);
                    }
                    let slot = level.container.element_slot(level.index);
                    level.index += 1;

                    if slot.tag == EntryTag::Nested && !skip_nested {
                        let child = level.container.nested(&slot);
                        self.levels.push(Level::new(child));
                        continue;
                    }
                    return Some(Event::Elem(level.container.read(&slot)));
                }
                State::Key => {
                    if level.index >= level.container.len() {
                        self.levels.pop();
                        return Some(Event::EndObject);
                    }
                    let slot = level.container.key_slot(level.index);
                    level.state = State::Value;
                    return Some(Event::Key(level.container.read_key(&slot)));
                }
                State::Value => {
                    let slot = level.container.value_slot(level.index);
                    level.index += 1;
                    level.state = State::Key;

                    if slot.tag == EntryTag::Nested && !skip_nested {
                        let child = level.container.nested(&slot);
                        self.levels.push(Level::new(child));
                        continue;
                    }
                    return Some(Event::Value(level.container.read(&slot)));
                }
            }
        }
    }
}

impl Iterator for JsonbIterator {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.next_event(false)
    }
}

pub fn decode_root(jb: &Jsonb) -> JsonbIterator {
    jb.iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode;
    use crate::value::Value;

    #[test]
    fn skip_nested_surfaces_binary_that_can_be_reopened() {
        let jb = encode(&Value::object([(
            "a",
            Value::object([("b", Value::from(1))]),
        )]))
        .unwrap();

        let mut it = jb.iter();
        assert_eq!(it.next_event(true), Some(Event::BeginObject { len: 1 }));
        assert_eq!(it.next_event(true), Some(Event::Key(Bytes::from_static(b"a"))));
        let binary = match it.next_event(true) {
            Some(Event::Value(Value::Binary(b))) => b,
            other => panic!("expected opaque value, got {:?}", other),
        };
        assert_eq!(it.next_event(true), Some(Event::EndObject));
        assert_eq!(it.next_event(true), None);

        let inner: Vec<Event> = JsonbIterator::open(binary).collect();
        assert_eq!(
            inner,
            vec![
                Event::BeginObject { len: 1 },
                Event::Key(Bytes::from_static(b"b")),
                Event::Value(Value::from(1)),
                Event::EndObject,
            ]
        );
    }

    #[test]
    fn full_iteration_descends_into_nested_containers() {
        let jb = encode(&Value::array([
            Value::from(1),
            Value::array([Value::Null, Value::from(true)]),
            Value::string("z"),
        ]))
        .unwrap();

        let events: Vec<Event> = jb.iter().collect();
        assert_eq!(
            events,
            vec![
                Event::BeginArray { len: 3, scalar: false },
                Event::Elem(Value::from(1)),
                Event::BeginArray { len: 2, scalar: false },
                Event::Elem(Value::Null),
                Event::Elem(Value::Bool(true)),
                Event::EndArray,
                Event::Elem(Value::string("z")),
                Event::EndArray,
            ]
        );
    }

    #[test]
    fn keys_come_out_in_sorted_order_each_followed_by_value() {
        let jb = encode(&Value::object([
            ("ccc", Value::from(3)),
            ("a", Value::from(1)),
            ("bb", Value::from(2)),
        ]))
        .unwrap();

        let events: Vec<Event> = jb.iter().collect();
        let mut keys = Vec::new();
        for pair in events[1..events.len() - 1].chunks(2) {
            match (&pair[0], &pair[1]) {
                (Event::Key(k), Event::Value(_)) => keys.push(k.clone()),
                other => panic!("key not followed by value: {:?}", other),
            }
        }
        assert_eq!(keys, vec![&b"a"[..], &b"bb"[..], &b"ccc"[..]]);
    }

    #[test]
    fn scalar_root_reports_wrapper_flag() {
        let jb = encode(&Value::Null).unwrap();
        let mut it = decode_root(&jb);
        assert_eq!(
            it.next_event(false),
            Some(Event::BeginArray { len: 1, scalar: true })
        );
        assert_eq!(it.next_event(false), Some(Event::Elem(Value::Null)));
        assert_eq!(it.next_event(false), Some(Event::EndArray));
        assert_eq!(it.depth(), 0);
        assert_eq!(it.next_event(false), None);
    }

    #[test]
    fn depth_tracks_descent() {
        let jb = encode(&Value::array([Value::array([Value::array(Vec::new())])])).unwrap();
        let mut it = jb.iter();
        let mut max = 0;
        while it.next_event(false).is_some() {
            max = max.max(it.depth());
        }
        assert_eq!(max, 3);
    }
}
