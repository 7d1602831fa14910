//! # Structural Event Vocabulary
//!
//! The encoder, the builder, the buffer iterator and the index decomposition
//! all speak one sequence of structural events:
//!
//! ```text
//! BeginArray  Elem*          EndArray
//! BeginObject (Key Value)*   EndObject
//! ```
//!
//! A nested container appears in place of an `Elem` or `Value` as its own
//! `Begin .. End` run. Two producers exist: [`walk`] pushes events for a tree
//! into a callback, and [`JsonbIterator`] pulls them from a buffer. Both keep
//! their per-depth state in an explicit frame stack, so nesting depth is
//! bounded by memory rather than by the call stack.
//!
//! [`JsonbIterator`]: crate::iter::JsonbIterator

use bytes::Bytes;
use smallvec::SmallVec;

use crate::config::INLINE_DEPTH;
use crate::value::{ArrayData, ObjectData, Pair, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Event<V = Value> {
    BeginArray { len: usize, scalar: bool },
    BeginObject { len: usize },
    Elem(V),
    Key(Bytes),
    Value(V),
    EndArray,
    EndObject,
}

impl<V> Event<V> {
    pub fn as_ref(&self) -> Event<&V> {
        match self {
            Event::BeginArray { len, scalar } => Event::BeginArray {
                len: *len,
                scalar: *scalar,
            },
            Event::BeginObject { len } => Event::BeginObject { len: *len },
            Event::Elem(v) => Event::Elem(v),
            Event::Key(k) => Event::Key(k.clone()),
            Event::Value(v) => Event::Value(v),
            Event::EndArray => Event::EndArray,
            Event::EndObject => Event::EndObject,
        }
    }

    pub fn is_begin(&self) -> bool {
        matches!(self, Event::BeginArray { .. } | Event::BeginObject { .. })
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Event::EndArray | Event::EndObject)
    }
}

enum WalkFrame<'a> {
    Array { data: &'a ArrayData, next: usize },
    Object { data: &'a ObjectData, next: usize },
}

enum Step<'a> {
    Close(bool),
    Elem(&'a Value),
    Pair(&'a Pair),
}

/// Depth-first push traversal of a container tree. `f` receives every event
/// with the nesting level it belongs to (the root container is level 0).
///
/// Scalars and `Value::Binary` are delivered as `Elem`/`Value`; nested trees
/// are delivered as their own begin/end run.
///
/// # Panics
///
/// Panics if `root` is not an array or object.
pub fn walk<'a, F>(root: &'a Value, mut f: F)
where
    F: FnMut(Event<&'a Value>, usize),
{
    let mut stack: SmallVec<[WalkFrame<'a>; INLINE_DEPTH]> = SmallVec::new();

    match root {
        Value::Array(_) | Value::Object(_) => open(root, 0, &mut stack, &mut f),
        other => panic!("walk requires a container root, got {:?}", other.kind()),
    }

    while !stack.is_empty() {
        let level = stack.len() - 1;
        let Some(frame) = stack.last_mut() else {
            break;
        };

        let step = match frame {
            WalkFrame::Array { data, next } => {
                let data: &'a ArrayData = *data;
                match data.elems.get(*next) {
                    Some(elem) => {
                        *next += 1;
                        Step::Elem(elem)
                    }
                    None => Step::Close(true),
                }
            }
            WalkFrame::Object { data, next } => {
                let data: &'a ObjectData = *data;
                match data.pairs.get(*next) {
                    Some(pair) => {
                        *next += 1;
                        Step::Pair(pair)
                    }
                    None => Step::Close(false),
                }
            }
        };

        match step {
            Step::Close(is_array) => {
                stack.pop();
                f(
                    if is_array {
                        Event::EndArray
                    } else {
                        Event::EndObject
                    },
                    level,
                );
            }
            Step::Elem(elem) => match elem {
                Value::Array(_) | Value::Object(_) => open(elem, level + 1, &mut stack, &mut f),
                scalar => f(Event::Elem(scalar), level),
            },
            Step::Pair(pair) => {
                f(Event::Key(pair.key.clone()), level);
                match &pair.value {
                    Value::Array(_) | Value::Object(_) => {
                        open(&pair.value, level + 1, &mut stack, &mut f)
                    }
                    scalar => f(Event::Value(scalar), level),
                }
            }
        }
    }
}

fn open<'a, F>(
    value: &'a Value,
    level: usize,
    stack: &mut SmallVec<[WalkFrame<'a>; INLINE_DEPTH]>,
    f: &mut F,
) where
    F: FnMut(Event<&'a Value>, usize),
{
    match value {
        Value::Array(data) => {
            f(
                Event::BeginArray {
                    len: data.elems.len(),
                    scalar: data.scalar && level == 0,
                },
                level,
            );
            stack.push(WalkFrame::Array { data, next: 0 });
        }
        Value::Object(data) => {
            f(
                Event::BeginObject {
                    len: data.pairs.len(),
                },
                level,
            );
            stack.push(WalkFrame::Object { data, next: 0 });
        }
        _ => unreachable!("open called on a scalar"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(root: &Value) -> Vec<(Event<Value>, usize)> {
        let mut out = Vec::new();
        walk(root, |event, level| {
            let owned = match event {
                Event::BeginArray { len, scalar } => Event::BeginArray { len, scalar },
                Event::BeginObject { len } => Event::BeginObject { len },
                Event::Elem(v) => Event::Elem(v.clone()),
                Event::Key(k) => Event::Key(k),
                Event::Value(v) => Event::Value(v.clone()),
                Event::EndArray => Event::EndArray,
                Event::EndObject => Event::EndObject,
            };
            out.push((owned, level));
        });
        out
    }

    #[test]
    fn walk_emits_nested_runs_with_levels() {
        let tree = Value::object([(
            "a",
            Value::array([Value::from(1), Value::object([("b", Value::Null)])]),
        )]);

        let events = collect(&tree);
        let levels: Vec<usize> = events.iter().map(|(_, l)| *l).collect();
        assert_eq!(levels, vec![0, 0, 1, 1, 2, 2, 2, 2, 1, 0]);

        assert!(matches!(events[0].0, Event::BeginObject { len: 1 }));
        assert!(matches!(&events[1].0, Event::Key(k) if &k[..] == b"a"));
        assert!(matches!(events[2].0, Event::BeginArray { len: 2, scalar: false }));
        assert!(matches!(events[4].0, Event::BeginObject { len: 1 }));
        assert!(matches!(events[6].0, Event::Value(Value::Null)));
        assert!(matches!(events[9].0, Event::EndObject));
    }

    #[test]
    fn walk_handles_deep_nesting_without_recursion() {
        let mut tree = Value::from(0);
        for _ in 0..10_000 {
            tree = Value::array([tree]);
        }
        let mut max_level = 0;
        let mut ends = 0;
        walk(&tree, |event, level| {
            max_level = max_level.max(level);
            if event.is_end() {
                ends += 1;
            }
        });
        assert_eq!(max_level, 9_999);
        assert_eq!(ends, 10_000);
        std::mem::forget(tree);
    }

    #[test]
    fn scalar_flag_only_reported_at_root() {
        let root = Value::scalar_root(Value::from(true));
        let events = collect(&root);
        assert!(matches!(events[0].0, Event::BeginArray { len: 1, scalar: true }));
        assert!(matches!(events[1].0, Event::Elem(Value::Bool(true))));
    }

    #[test]
    #[should_panic(expected = "walk requires a container root")]
    fn walk_rejects_scalar_root() {
        walk(&Value::Null, |_, _| {});
    }
}
