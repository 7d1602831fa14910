//! # Total Order
//!
//! One ordering over all jsonb values, with a tree variant ([`compare`]) and
//! a buffer variant ([`compare_encoded`]) that always agree.
//!
//! ## Rules
//!
//! | Case | Order |
//! |------|-------|
//! | different types | `Null < String < Number < Bool < Array < Object` |
//! | strings, object keys | shorter first, then bytewise |
//! | numbers | decimal order (`1.0 == 1`) |
//! | bools | `false < true` |
//! | arrays | element-wise over the common prefix, then shorter first |
//! | objects | `(key, value)` pairs in sorted-key order, then shorter first |
//!
//! A root scalar wrapper compares as the scalar it wraps. A `Value::Binary`
//! takes the rank of the container kind in its header and otherwise
//! compares structurally.
//!
//! ## Buffer Comparison
//!
//! The buffer variant runs two skip-nested iterators in lock-step. Scalars
//! are compared where they are read. When both sides surface a nested
//! container at the same position, a pair of sub-iterators over the two
//! opaque regions is pushed on an explicit stack, so equal prefixes are
//! never materialized as trees and depth does not grow the call stack.

use smallvec::{smallvec, SmallVec};
use std::cmp::Ordering;

use crate::builder::decode_container;
use crate::config::INLINE_DEPTH;
use crate::event::Event;
use crate::format::{read_u32, Container, ContainerKind, Header};
use crate::iter::JsonbIterator;
use crate::jsonb::Jsonb;
use crate::value::{Pair, Value};

/// Order of object keys and of string values.
#[inline]
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

const RANK_NULL: u8 = 0;
const RANK_STRING: u8 = 1;
const RANK_NUMBER: u8 = 2;
const RANK_BOOL: u8 = 3;
const RANK_ARRAY: u8 = 4;
const RANK_OBJECT: u8 = 5;

fn container_rank(kind: ContainerKind) -> u8 {
    match kind {
        ContainerKind::Array => RANK_ARRAY,
        ContainerKind::Object => RANK_OBJECT,
    }
}

/// Cross-type rank of a value. Lower ranks sort first.
pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => RANK_NULL,
        Value::String(_) => RANK_STRING,
        Value::Number(_) => RANK_NUMBER,
        Value::Bool(_) => RANK_BOOL,
        Value::Array(_) => RANK_ARRAY,
        Value::Object(_) => RANK_OBJECT,
        Value::Binary(b) => container_rank(Header::parse(read_u32(b, 0)).kind),
    }
}

/// Compares two values of which at most one is a container; containers
/// only ever differ from the other side by rank here.
fn compare_shallow(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::String(x), Value::String(y)) => compare_keys(x, y),
        (Value::Number(x), Value::Number(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => {
            let ord = type_rank(a).cmp(&type_rank(b));
            debug_assert_ne!(ord, Ordering::Equal, "two containers reached shallow compare");
            ord
        }
    }
}

fn unwrap_scalar_root(value: &Value) -> &Value {
    match value {
        Value::Array(data) if data.is_scalar() => &data.elems[0],
        other => other,
    }
}

enum CmpFrame<'a> {
    Array(&'a [Value], &'a [Value], usize),
    Object(&'a [Pair], &'a [Pair], usize),
}

type CmpStack<'a> = SmallVec<[CmpFrame<'a>; INLINE_DEPTH]>;

/// Decides `a` against `b` if possible. Same-kind tree containers are
/// pushed as a new frame and report `Equal` so the caller keeps going.
fn compare_node<'a>(a: &'a Value, b: &'a Value, stack: &mut CmpStack<'a>) -> Ordering {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            stack.push(CmpFrame::Array(&x.elems, &y.elems, 0));
            Ordering::Equal
        }
        (Value::Object(x), Value::Object(y)) => {
            stack.push(CmpFrame::Object(&x.pairs, &y.pairs, 0));
            Ordering::Equal
        }
        (Value::Binary(x), Value::Binary(y)) => {
            compare_containers(&Container::open(x.clone()), &Container::open(y.clone()))
        }
        (Value::Binary(x), tree @ (Value::Array(_) | Value::Object(_))) => {
            compare(&decode_container(&Container::open(x.clone())), tree)
        }
        (tree @ (Value::Array(_) | Value::Object(_)), Value::Binary(y)) => {
            compare(tree, &decode_container(&Container::open(y.clone())))
        }
        _ => compare_shallow(a, b),
    }
}

/// Total order over trees.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    let a = unwrap_scalar_root(a);
    let b = unwrap_scalar_root(b);

    let mut stack: CmpStack<'_> = SmallVec::new();
    let ord = compare_node(a, b, &mut stack);
    if ord != Ordering::Equal {
        return ord;
    }

    while let Some(frame) = stack.last_mut() {
        let next = match frame {
            CmpFrame::Array(xs, ys, i) => {
                let (xs, ys) = (*xs, *ys);
                if *i == xs.len() || *i == ys.len() {
                    Err(xs.len().cmp(&ys.len()))
                } else {
                    *i += 1;
                    Ok((&xs[*i - 1], &ys[*i - 1]))
                }
            }
            CmpFrame::Object(xs, ys, i) => {
                let (xs, ys) = (*xs, *ys);
                if *i == xs.len() || *i == ys.len() {
                    Err(xs.len().cmp(&ys.len()))
                } else {
                    let (x, y) = (&xs[*i], &ys[*i]);
                    *i += 1;
                    let ord = compare_keys(&x.key, &y.key);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                    Ok((&x.value, &y.value))
                }
            }
        };

        let ord = match next {
            Ok((x, y)) => compare_node(x, y, &mut stack),
            Err(ord) => {
                stack.pop();
                ord
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

/// Total order over root buffers. Agrees with [`compare`] on the decoded
/// trees.
pub fn compare_encoded(a: &Jsonb, b: &Jsonb) -> Ordering {
    compare_containers(a.container(), b.container())
}

fn scalar_of(container: &Container) -> Value {
    container.read(&container.element_slot(0))
}

pub(crate) fn compare_containers(a: &Container, b: &Container) -> Ordering {
    match (a.is_scalar(), b.is_scalar()) {
        (true, true) => return compare_shallow(&scalar_of(a), &scalar_of(b)),
        (true, false) => return type_rank(&scalar_of(a)).cmp(&container_rank(b.kind())),
        (false, true) => return container_rank(a.kind()).cmp(&type_rank(&scalar_of(b))),
        (false, false) => {}
    }

    let mut stack: SmallVec<[(JsonbIterator, JsonbIterator); 4]> =
        smallvec![(JsonbIterator::new(a.clone()), JsonbIterator::new(b.clone()))];

    while let Some((left, right)) = stack.last_mut() {
        let (ea, eb) = match (left.next_event(true), right.next_event(true)) {
            (None, None) => {
                stack.pop();
                continue;
            }
            (Some(ea), Some(eb)) => (ea, eb),
            (ea, eb) => unreachable!("jsonb iterators finished out of step: {:?} {:?}", ea, eb),
        };

        let ord = match (ea, eb) {
            (Event::BeginArray { .. }, Event::BeginArray { .. })
            | (Event::BeginObject { .. }, Event::BeginObject { .. })
            | (Event::EndArray, Event::EndArray)
            | (Event::EndObject, Event::EndObject) => Ordering::Equal,
            (Event::BeginArray { .. }, Event::BeginObject { .. }) => Ordering::Less,
            (Event::BeginObject { .. }, Event::BeginArray { .. }) => Ordering::Greater,
            (Event::EndArray | Event::EndObject, _) => Ordering::Less,
            (_, Event::EndArray | Event::EndObject) => Ordering::Greater,
            (Event::Key(x), Event::Key(y)) => compare_keys(&x, &y),
            (Event::Elem(x), Event::Elem(y)) | (Event::Value(x), Event::Value(y)) => {
                match (x, y) {
                    (Value::Binary(x), Value::Binary(y)) => {
                        let (cx, cy) = (Container::open(x), Container::open(y));
                        if cx.kind() == cy.kind() {
                            stack.push((JsonbIterator::new(cx), JsonbIterator::new(cy)));
                            Ordering::Equal
                        } else {
                            container_rank(cx.kind()).cmp(&container_rank(cy.kind()))
                        }
                    }
                    (x, y) => compare_shallow(&x, &y),
                }
            }
            (ea, eb) => unreachable!("jsonb iterators out of step: {:?} {:?}", ea, eb),
        };

        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode;

    fn both(a: &Value, b: &Value) -> Ordering {
        let tree = compare(a, b);
        let buf = compare_encoded(&encode(a).unwrap(), &encode(b).unwrap());
        assert_eq!(tree, buf, "tree and buffer order disagree for {:?} vs {:?}", a, b);
        tree
    }

    #[test]
    fn cross_type_rank_is_pinned() {
        let ladder = [
            Value::Null,
            Value::string("zzzz"),
            Value::from(-1_000_000),
            Value::Bool(false),
            Value::array(Vec::new()),
            Value::Object(Default::default()),
        ];
        for (i, low) in ladder.iter().enumerate() {
            assert_eq!(type_rank(low), i as u8);
            for high in &ladder[i + 1..] {
                assert_eq!(both(low, high), Ordering::Less);
                assert_eq!(both(high, low), Ordering::Greater);
            }
        }
    }

    #[test]
    fn shorter_string_sorts_first() {
        assert_eq!(both(&Value::from("zz"), &Value::from("aaa")), Ordering::Less);
        assert_eq!(both(&Value::from("ab"), &Value::from("ac")), Ordering::Less);
    }

    #[test]
    fn numbers_compare_by_value_not_scale() {
        let one_point_zero = Value::Number("1.0".parse().unwrap());
        assert_eq!(both(&one_point_zero, &Value::from(1)), Ordering::Equal);
        assert_eq!(both(&Value::from(-2), &Value::from(1)), Ordering::Less);
    }

    #[test]
    fn arrays_compare_prefix_then_length() {
        let short = Value::array([Value::from(1), Value::from(2)]);
        let long = Value::array([Value::from(1), Value::from(2), Value::from(0)]);
        let bigger = Value::array([Value::from(1), Value::from(3)]);
        assert_eq!(both(&short, &long), Ordering::Less);
        assert_eq!(both(&long, &bigger), Ordering::Less);
    }

    #[test]
    fn objects_compare_keys_then_values() {
        let a = Value::object([("a", Value::from(1))]);
        let b = Value::object([("b", Value::from(0))]);
        let a2 = Value::object([("a", Value::from(2))]);
        let ab = Value::object([("a", Value::from(1)), ("b", Value::Null)]);
        assert_eq!(both(&a, &b), Ordering::Less);
        assert_eq!(both(&a, &a2), Ordering::Less);
        assert_eq!(both(&a, &ab), Ordering::Less);
    }

    #[test]
    fn nested_containers_compare_structurally() {
        let x = Value::array([Value::object([("k", Value::array([Value::from(1)]))])]);
        let y = Value::array([Value::object([("k", Value::array([Value::from(2)]))])]);
        assert_eq!(both(&x, &y), Ordering::Less);
        assert_eq!(both(&x, &x.clone()), Ordering::Equal);
    }

    #[test]
    fn binary_equals_its_decoded_tree() {
        let outer = encode(&Value::array([Value::array([Value::from(5)])])).unwrap();
        let binary = outer.get_index(0).unwrap().unwrap();
        assert!(matches!(binary, Value::Binary(_)));
        assert_eq!(compare(&binary, &Value::array([Value::from(5)])), Ordering::Equal);
        assert_eq!(compare(&Value::array([Value::from(6)]), &binary), Ordering::Greater);
        assert_eq!(type_rank(&binary), RANK_ARRAY);
    }

    #[test]
    fn scalar_root_compares_as_bare_scalar() {
        assert_eq!(
            compare(&Value::scalar_root(Value::from(3)), &Value::from(3)),
            Ordering::Equal
        );
        assert_eq!(
            both(&Value::from(3), &Value::array([Value::from(3)])),
            Ordering::Less
        );
    }
}
