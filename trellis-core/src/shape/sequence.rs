//! Sequence-shaped nodes.
//!
//! Every mutator follows the same steps:
//!
//! 1. Resolve the incoming values. Converters run here, before the node is
//!    touched, so a failure leaves it as it was.
//! 2. Under the node's edit guard, read the current positions (`before`)
//!    and compute the new ones (`after`).
//! 3. Diff `before` and `after` position by position. Each index whose bound
//!    node changed gets a disown/adopt pair and one change record.
//! 4. Release the guard and report a `length` record first (when the length
//!    changed), then the index records in ascending order, as one batch.
//!
//! The diff compares node identity, not values, and does not detect moves:
//! reversing a sequence of distinct nodes rewrites every index.
//!
//! Sequences may be sparse. Writing past the end or growing `length`
//! leaves holes; a hole has no child, reads as `None` and appears as
//! `NOT_PRESENT` in change records. Positions are kept as a sorted map of
//! bound indices, so holes cost nothing and the work of an operation is
//! proportional to the number of bound elements, not to the length.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Bound, RangeBounds};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::trace;

use super::Structure;
use crate::error::{Error, Result};
use crate::reactive::{Change, Content, Key, Reactive, Slot};
use crate::value::{Kind, Value};

/// Structural wrapper for positional sequences.
pub struct SequenceShape;

impl SequenceShape {
    /// Longest sequence a node may hold. Operations that would go past it
    /// fail with `Error::LengthLimit`.
    pub const MAX_LEN: usize = u32::MAX as usize;
}

impl Structure for SequenceShape {
    fn get(node: &Reactive, key: Key) -> Option<Value> {
        match key.into_position() {
            Key::Length => Some(Value::from(node.len())),
            Key::Index(index) => node.child(index).map(|child| child.get()),
            Key::Name(_) => None,
        }
    }

    fn set(node: &Reactive, key: Key, value: Value) -> Result<()> {
        match key.into_position() {
            Key::Index(index) => node.set_index(index, value),
            Key::Length => match value.as_f64() {
                Some(n) if n >= 0.0 && n.fract() == 0.0 => {
                    if n > SequenceShape::MAX_LEN as f64 {
                        return Err(Error::LengthLimit {
                            requested: n as usize,
                            max: SequenceShape::MAX_LEN,
                        });
                    }
                    node.set_len(n as usize)
                }
                _ => Err(Error::InvalidKey {
                    key: Key::Length,
                    kind: Kind::Sequence,
                }),
            },
            key => Err(Error::InvalidKey {
                key,
                kind: Kind::Sequence,
            }),
        }
    }

    fn delete(node: &Reactive, key: Key) -> Result<Option<Value>> {
        match key.into_position() {
            Key::Index(index) => node.remove(index),
            key => Err(Error::InvalidKey {
                key,
                kind: Kind::Sequence,
            }),
        }
    }
}

/// The bound children of a sequence by index. Indices below `len` without
/// an entry are holes.
#[derive(Clone)]
struct Positions {
    len: usize,
    slots: BTreeMap<usize, Reactive>,
}

impl Positions {
    fn exposed(&self, index: usize) -> Value {
        self.slots.get(&index).map_or(Value::Null, Reactive::get)
    }

    /// Positions at or after `from` moved by `shift`, which the caller
    /// keeps within bounds.
    fn shifted<'a, F>(&'a self, from: usize, shift: F) -> impl Iterator<Item = (usize, Reactive)> + 'a
    where
        F: Fn(usize) -> usize + 'a,
    {
        self.slots
            .range(from..)
            .map(move |(&index, node)| (shift(index), node.clone()))
    }
}

impl Reactive {
    /// Store `value` at `index`, extending the sequence if needed.
    pub fn set_index(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        if index >= SequenceShape::MAX_LEN {
            return Err(Error::LengthLimit {
                requested: index.saturating_add(1),
                max: SequenceShape::MAX_LEN,
            });
        }
        let classifier = self.classifier();
        let resolved = classifier.resolve(value.into())?;

        self.edit_positions(|before| {
            if before.slots.get(&index).is_some_and(|current| current.holds(&resolved)) {
                return Ok((before.clone(), ()));
            }
            let mut after = before.clone();
            after.len = after.len.max(index + 1);
            after.slots.insert(index, Reactive::build(resolved, &classifier));
            Ok((after, ()))
        })
    }

    /// Remove the element at `index`, shifting later elements down.
    ///
    /// Returns `None` when `index` is past the end.
    pub fn remove(&self, index: usize) -> Result<Option<Value>> {
        Ok(self.splice(index..=index, Vec::<Value>::new())?.pop())
    }

    /// Append `values`, returning the new length.
    pub fn push<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<usize> {
        let added = self.build_all(values)?;
        self.edit_positions(|before| {
            let len = grown(before.len, added.len())?;
            let mut after = before.clone();
            after.slots.extend((before.len..).zip(added));
            after.len = len;
            Ok((after, len))
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.edit_positions(|before| {
            let Some(last) = before.len.checked_sub(1) else {
                return Ok((before.clone(), None));
            };
            let removed = before.exposed(last);
            let mut after = before.clone();
            after.slots.remove(&last);
            after.len = last;
            Ok((after, Some(removed)))
        })
    }

    /// Remove and return the first element, shifting the rest down.
    pub fn shift(&self) -> Result<Option<Value>> {
        self.edit_positions(|before| {
            if before.len == 0 {
                return Ok((before.clone(), None));
            }
            let after = Positions {
                len: before.len - 1,
                slots: before.shifted(1, |index| index - 1).collect(),
            };
            Ok((after, Some(before.exposed(0))))
        })
    }

    /// Prepend `values`, returning the new length.
    pub fn unshift<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<usize> {
        let added = self.build_all(values)?;
        self.edit_positions(|before| {
            let count = added.len();
            let len = grown(before.len, count)?;
            let mut slots: BTreeMap<usize, Reactive> = (0..).zip(added).collect();
            slots.extend(before.shifted(0, |index| index + count));
            Ok((Positions { len, slots }, len))
        })
    }

    /// Replace the elements in `range` with `items`, returning the removed
    /// elements (holes as null). The range is clamped to the current length.
    pub fn splice<V: Into<Value>>(
        &self,
        range: impl RangeBounds<usize>,
        items: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Value>> {
        let added = self.build_all(items)?;
        self.edit_positions(|before| {
            let (start, end) = clamp(&range, before.len);
            let count = added.len();
            let len = grown(before.len - (end - start), count)?;

            let removed = (start..end).map(|index| before.exposed(index)).collect();
            let mut slots: BTreeMap<usize, Reactive> = before
                .slots
                .range(..start)
                .map(|(&index, node)| (index, node.clone()))
                .collect();
            slots.extend((start..).zip(added));
            slots.extend(before.shifted(end, |index| index - (end - start) + count));
            Ok((Positions { len, slots }, removed))
        })
    }

    /// Reorder elements with `compare`, which sees exposed values. The sort
    /// is stable and moves holes to the end.
    ///
    /// `compare` must be a total order (for numbers, `f64::total_cmp` rather
    /// than `partial_cmp`) and must not write to this node. If it panics, the
    /// sequence is left as it was and `Error::ComparatorPanicked` is
    /// returned.
    pub fn sort_by<F>(&self, mut compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.edit_positions(|before| {
            let mut present: Vec<(Value, Reactive)> = before
                .slots
                .values()
                .map(|node| (node.get(), node.clone()))
                .collect();
            catch_unwind(AssertUnwindSafe(|| {
                present.sort_by(|a, b| compare(&a.0, &b.0));
            }))
            .map_err(|_| Error::ComparatorPanicked)?;

            let after = Positions {
                len: before.len,
                slots: (0..).zip(present.into_iter().map(|(_, node)| node)).collect(),
            };
            Ok((after, ()))
        })
    }

    /// Reverse the order of the elements.
    pub fn reverse(&self) -> Result<()> {
        self.edit_positions(|before| {
            let last = before.len.saturating_sub(1);
            let after = Positions {
                len: before.len,
                slots: before.shifted(0, |index| last - index).collect(),
            };
            Ok((after, ()))
        })
    }

    /// Bind every index in `range` to one shared node holding `value`.
    /// The range is clamped to the current length.
    pub fn fill(&self, value: impl Into<Value>, range: impl RangeBounds<usize>) -> Result<()> {
        let classifier = self.classifier();
        let filler = Reactive::build(classifier.resolve(value.into())?, &classifier);
        self.edit_positions(|before| {
            let (start, end) = clamp(&range, before.len);
            let mut after = before.clone();
            for index in start..end {
                after.slots.insert(index, filler.clone());
            }
            Ok((after, ()))
        })
    }

    /// Truncate, or grow with holes, to exactly `len` elements.
    pub fn set_len(&self, len: usize) -> Result<()> {
        if len > SequenceShape::MAX_LEN {
            return Err(Error::LengthLimit {
                requested: len,
                max: SequenceShape::MAX_LEN,
            });
        }
        self.edit_positions(|before| {
            let after = Positions {
                len,
                slots: before
                    .slots
                    .range(..len)
                    .map(|(&index, node)| (index, node.clone()))
                    .collect(),
            };
            Ok((after, ()))
        })
    }

    /// Run `edit` against the current positions under the edit guard, commit
    /// its result and report the differences once the guard is released.
    fn edit_positions<T>(
        &self,
        edit: impl FnOnce(&Positions) -> Result<(Positions, T)>,
    ) -> Result<T> {
        let (changes, out) = {
            let _edit = self.edit();
            let before = self.positions()?;
            let (after, out) = edit(&before)?;
            (self.commit(&before, &after), out)
        };
        self.trigger_update(changes);
        Ok(out)
    }

    fn positions(&self) -> Result<Positions> {
        let inner = self.cell.read();
        match inner.content {
            Content::Sequence { len } => Ok(Positions {
                len,
                slots: inner
                    .children
                    .iter()
                    .filter_map(|(key, child)| match key {
                        Key::Index(index) => Some((*index, child.clone())),
                        _ => None,
                    })
                    .collect(),
            }),
            ref other => Err(Error::WrongKind {
                expected: Kind::Sequence,
                found: other.kind(),
            }),
        }
    }

    /// Resolve every value, then build nodes for them. Nothing is built if
    /// any value fails to resolve.
    fn build_all<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Result<Vec<Reactive>> {
        let classifier = self.classifier();
        let resolved = values
            .into_iter()
            .map(|value| classifier.resolve(value.into()))
            .collect::<Result<Vec<_>>>()?;
        Ok(resolved
            .into_iter()
            .map(|value| Reactive::build(value, &classifier))
            .collect())
    }

    /// Rebind every position whose node differs between `before` and
    /// `after`, returning the change records to report.
    fn commit(&self, before: &Positions, after: &Positions) -> Vec<Change> {
        let touched: BTreeSet<usize> = before
            .slots
            .keys()
            .chain(after.slots.keys())
            .copied()
            .collect();
        let rebinds: Vec<(usize, Option<&Reactive>, Option<&Reactive>)> = touched
            .into_iter()
            .filter_map(|index| {
                let old = before.slots.get(&index);
                let new = after.slots.get(&index);
                (!same_node(old, new)).then_some((index, old, new))
            })
            .collect();

        {
            let mut inner = self.cell.write();
            inner.content = Content::Sequence { len: after.len };
            for &(index, _, new) in &rebinds {
                match new {
                    Some(node) => inner.children.insert(Key::Index(index), node.clone()),
                    None => inner.children.shift_remove(&Key::Index(index)),
                };
            }
        }
        // Attach before detaching so a node that only moves keeps its
        // parent entry (and its place in the parent order).
        for &(index, _, new) in &rebinds {
            if let Some(node) = new {
                node.attach_to(self, Key::Index(index));
            }
        }
        for &(index, old, _) in &rebinds {
            if let Some(node) = old {
                node.detach_from(self.id(), &Key::Index(index));
            }
        }
        trace!(
            node = ?self.id(),
            from = before.len,
            to = after.len,
            rebound = rebinds.len(),
            "sequence commit"
        );

        let mut changes = Vec::with_capacity(rebinds.len() + 1);
        if before.len != after.len {
            changes.push(Change::at(
                Key::Length,
                Slot::present(after.len),
                Slot::present(before.len),
            ));
        }
        changes.extend(rebinds.into_iter().map(|(index, old, new)| {
            Change::at(Key::Index(index), Slot::of_node(new), Slot::of_node(old))
        }));
        changes
    }
}

fn same_node(a: Option<&Reactive>, b: Option<&Reactive>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

/// `len + added`, if that stays within `MAX_LEN`.
fn grown(len: usize, added: usize) -> Result<usize> {
    len.checked_add(added)
        .filter(|&total| total <= SequenceShape::MAX_LEN)
        .ok_or(Error::LengthLimit {
            requested: len.saturating_add(added),
            max: SequenceShape::MAX_LEN,
        })
}

/// Resolve `range` against `len` as a `start..end` pair with
/// `start <= end <= len`.
fn clamp(range: &impl RangeBounds<usize>, len: usize) -> (usize, usize) {
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start.saturating_add(1),
        Bound::Unbounded => 0,
    }
    .min(len);
    let end = match range.end_bound() {
        Bound::Included(&end) => end.saturating_add(1),
        Bound::Excluded(&end) => end,
        Bound::Unbounded => len,
    }
    .min(len);
    (start, end.max(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::NOT_PRESENT;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn observed(value: Value) -> (Reactive, Arc<Mutex<Vec<Vec<Change>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let node = Reactive::with_listener(value, move |c| sink.lock().push(c.to_vec())).unwrap();
        (node, seen)
    }

    fn last_batch(seen: &Mutex<Vec<Vec<Change>>>) -> Vec<Change> {
        seen.lock().last().cloned().unwrap_or_default()
    }

    fn length(new: usize, old: usize) -> Change {
        Change::at(Key::Length, Slot::present(new), Slot::present(old))
    }

    fn at(index: usize, new: Slot, old: Slot) -> Change {
        Change::at(Key::Index(index), new, old)
    }

    fn by_number(a: &Value, b: &Value) -> Ordering {
        let key = |v: &Value| v.as_f64().unwrap_or(f64::NAN);
        key(a).total_cmp(&key(b))
    }

    /// Every live child is bound at its own index, and only there.
    fn assert_consistent(node: &Reactive) {
        let len = node.len();
        for (key, child) in node.children() {
            let Key::Index(index) = key else {
                panic!("non-index key {key} on a sequence");
            };
            assert!(index < len, "child at {index} beyond length {len}");
            assert!(child.parent_keys(node).contains(&Key::Index(index)));
        }
    }

    fn values(node: &Reactive) -> Vec<Value> {
        (0..node.len())
            .map(|i| node.get_key(i).unwrap().unwrap_or(Value::Null))
            .collect()
    }

    #[test]
    fn push_reports_length_then_insertions() {
        let (node, seen) = observed(Value::array([1, 2, 3]));

        assert_eq!(node.push([4, 5]).unwrap(), 5);

        assert_eq!(
            last_batch(&seen),
            [
                length(5, 3),
                at(3, Slot::present(4), NOT_PRESENT),
                at(4, Slot::present(5), NOT_PRESENT),
            ]
        );
        assert_consistent(&node);
    }

    #[test]
    fn pop_reports_length_then_removal() {
        let (node, seen) = observed(Value::array(["a", "b"]));

        assert_eq!(node.pop().unwrap(), Some(Value::from("b")));

        assert_eq!(
            last_batch(&seen),
            [length(1, 2), at(1, NOT_PRESENT, Slot::present("b"))]
        );
        assert_consistent(&node);
    }

    #[test]
    fn pop_and_shift_on_empty_do_nothing() {
        let (node, seen) = observed(Value::array::<i32>([]));
        assert_eq!(node.pop().unwrap(), None);
        assert_eq!(node.shift().unwrap(), None);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn shift_rebinds_every_remaining_index() {
        let (node, seen) = observed(Value::array([1, 2, 3]));
        let second = node.child(1usize).unwrap();

        assert_eq!(node.shift().unwrap(), Some(Value::from(1)));

        assert_eq!(
            last_batch(&seen),
            [
                length(2, 3),
                at(0, Slot::present(2), Slot::present(1)),
                at(1, Slot::present(3), Slot::present(2)),
                at(2, NOT_PRESENT, Slot::present(3)),
            ]
        );
        assert_eq!(second.parent_keys(&node), [Key::Index(0)]);
        assert_consistent(&node);
    }

    #[test]
    fn unshift_shifts_bindings_up() {
        let (node, seen) = observed(Value::array([1]));
        let first = node.child(0usize).unwrap();

        assert_eq!(node.unshift([0]).unwrap(), 2);

        assert_eq!(
            last_batch(&seen),
            [
                length(2, 1),
                at(0, Slot::present(0), Slot::present(1)),
                at(1, Slot::present(1), NOT_PRESENT),
            ]
        );
        assert_eq!(first.parent_keys(&node), [Key::Index(1)]);
        assert_consistent(&node);
    }

    #[test]
    fn splice_reports_only_differing_indices() {
        let (node, seen) = observed(Value::array([1, 2, 3, 4]));

        let removed = node.splice(1..3, ["x"]).unwrap();

        assert_eq!(removed, [Value::from(2), Value::from(3)]);
        assert_eq!(values(&node), [Value::from(1), Value::from("x"), Value::from(4)]);
        assert_eq!(
            last_batch(&seen),
            [
                length(3, 4),
                at(1, Slot::present("x"), Slot::present(2)),
                at(2, Slot::present(4), Slot::present(3)),
                at(3, NOT_PRESENT, Slot::present(4)),
            ]
        );
        assert_consistent(&node);
    }

    #[test]
    fn splice_without_size_change_has_no_length_record() {
        let (node, seen) = observed(Value::array([1, 2]));
        node.splice(0..1, [9]).unwrap();
        assert_eq!(last_batch(&seen), [at(0, Slot::present(9), Slot::present(1))]);
    }

    #[test]
    fn splice_clamps_out_of_range_bounds() {
        let (node, seen) = observed(Value::array([1, 2]));
        assert!(node.splice(5..9, Vec::<Value>::new()).unwrap().is_empty());
        assert!(seen.lock().is_empty());
        node.splice(1.., ["end"]).unwrap();
        assert_eq!(values(&node), [Value::from(1), Value::from("end")]);
    }

    #[test]
    fn reverse_rewrites_every_moved_index() {
        let (node, seen) = observed(Value::array([1, 2, 3]));

        node.reverse().unwrap();

        // The middle element keeps its node, so it is not reported.
        assert_eq!(
            last_batch(&seen),
            [
                at(0, Slot::present(3), Slot::present(1)),
                at(2, Slot::present(1), Slot::present(3)),
            ]
        );
        assert_consistent(&node);
    }

    #[test]
    fn sort_by_orders_values_and_keeps_nodes() {
        let (node, _seen) = observed(Value::array([3, 1, 2]));
        let one = node.child(1usize).unwrap();

        node.sort_by(by_number).unwrap();

        assert_eq!(values(&node), [Value::from(1), Value::from(2), Value::from(3)]);
        assert!(node.child(0usize).unwrap().ptr_eq(&one));
        assert_eq!(one.parent_keys(&node), [Key::Index(0)]);
        assert_consistent(&node);
    }

    #[test]
    fn sorted_input_reports_nothing() {
        let (node, seen) = observed(Value::array([1, 2, 3]));
        node.sort_by(by_number).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn sort_moves_holes_last() {
        let (node, _seen) = observed(Value::array([2]));
        node.set_index(2, 1).unwrap();

        node.sort_by(by_number).unwrap();

        assert_eq!(node.len(), 3);
        assert_eq!(values(&node), [Value::from(1), Value::from(2), Value::Null]);
        assert!(node.child(2usize).is_none());
        assert_consistent(&node);
    }

    #[test]
    fn panicking_comparator_leaves_sequence_untouched() {
        let (node, seen) = observed(Value::array([3, 1, 2]));

        let result = node.sort_by(|_, _| panic!("not an order"));

        assert!(matches!(result, Err(Error::ComparatorPanicked)));
        assert_eq!(values(&node), [Value::from(3), Value::from(1), Value::from(2)]);
        assert!(seen.lock().is_empty());
        // The edit guard was released on the way out.
        node.push([4]).unwrap();
    }

    #[test]
    fn fill_shares_one_node() {
        let (node, seen) = observed(Value::array([1, 2, 3, 4]));

        node.fill(Value::object([("k", 0)]), 1..3).unwrap();

        let shared = node.child(1usize).unwrap();
        assert!(node.child(2usize).unwrap().ptr_eq(&shared));
        assert_eq!(shared.parent_keys(&node), [Key::Index(1), Key::Index(2)]);
        assert_eq!(last_batch(&seen).len(), 2);

        // Filling again with the same node changes nothing.
        node.fill(&shared, 1..3).unwrap();
        assert_eq!(seen.lock().len(), 1);
        assert_consistent(&node);
    }

    #[test]
    fn fill_clamps_and_ignores_empty_ranges() {
        let (node, seen) = observed(Value::array([1, 2]));
        node.fill(0, 2..10).unwrap();
        node.fill(0, 1..1).unwrap();
        assert!(seen.lock().is_empty());
        node.fill(0, ..).unwrap();
        assert_eq!(values(&node), [Value::from(0), Value::from(0)]);
    }

    #[test]
    fn set_index_past_the_end_leaves_holes() {
        let (node, seen) = observed(Value::array(["a"]));

        node.set_index(3, "d").unwrap();

        assert_eq!(node.len(), 4);
        assert!(node.child(1usize).is_none());
        assert_eq!(node.get_key(2usize).unwrap(), None);
        assert_eq!(
            last_batch(&seen),
            [length(4, 1), at(3, Slot::present("d"), NOT_PRESENT)]
        );
        assert_consistent(&node);
    }

    #[test]
    fn set_index_with_equal_primitive_is_a_no_op() {
        let (node, seen) = observed(Value::array([1, 2]));
        node.set_index(1, 2).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn far_sparse_writes_stay_cheap() {
        let (node, seen) = observed(Value::array([0]));
        let far = SequenceShape::MAX_LEN - 1;

        node.set_index(far, "end").unwrap();
        node.push(Vec::<Value>::new()).unwrap();
        node.shift().unwrap();

        assert_eq!(node.len(), far);
        assert_eq!(node.children().len(), 1);
        assert_eq!(node.get_key(far - 1).unwrap(), Some(Value::from("end")));
        assert_eq!(seen.lock().len(), 2);
        assert_consistent(&node);
    }

    #[test]
    fn oversized_positions_are_rejected() {
        let (node, seen) = observed(Value::array([1]));
        let max = SequenceShape::MAX_LEN;

        assert!(matches!(
            node.set_index(usize::MAX, 5),
            Err(Error::LengthLimit { .. })
        ));
        assert!(matches!(node.set_index(max, 5), Err(Error::LengthLimit { .. })));
        assert!(matches!(node.set_len(max + 1), Err(Error::LengthLimit { .. })));
        assert!(matches!(
            node.set_key(Key::Length, 1e300),
            Err(Error::LengthLimit { .. })
        ));

        node.set_len(max).unwrap();
        assert!(matches!(node.push([2]), Err(Error::LengthLimit { .. })));
        assert!(matches!(node.unshift([2]), Err(Error::LengthLimit { .. })));
        assert_eq!(node.len(), max);
        assert_eq!(seen.lock().len(), 1);
        assert_consistent(&node);
    }

    #[test]
    fn remove_shifts_down() {
        let (node, seen) = observed(Value::array(["a", "b", "c"]));

        assert_eq!(node.remove(0).unwrap(), Some(Value::from("a")));
        assert_eq!(node.remove(10).unwrap(), None);

        assert_eq!(values(&node), [Value::from("b"), Value::from("c")]);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(last_batch(&seen)[0], length(2, 3));
    }

    #[test]
    fn length_key_truncates_and_grows() {
        let (node, seen) = observed(Value::array([1, 2, 3]));

        node.set_key("length", 1).unwrap();
        assert_eq!(
            last_batch(&seen),
            [
                length(1, 3),
                at(1, NOT_PRESENT, Slot::present(2)),
                at(2, NOT_PRESENT, Slot::present(3)),
            ]
        );

        node.set_key(Key::Length, 3).unwrap();
        assert_eq!(last_batch(&seen), [length(3, 1)]);
        assert_eq!(node.get_key(2usize).unwrap(), None);

        assert!(matches!(
            node.set_key(Key::Length, -1),
            Err(Error::InvalidKey { .. })
        ));
        assert_consistent(&node);
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let (node, _seen) = observed(Value::array([1]));
        assert!(matches!(node.set_key("name", 1), Err(Error::InvalidKey { .. })));
        assert!(matches!(node.set_key("+0", 1), Err(Error::InvalidKey { .. })));
        assert!(matches!(node.set_key("00", 1), Err(Error::InvalidKey { .. })));
        assert!(matches!(node.delete_key(Key::Length), Err(Error::InvalidKey { .. })));
        assert_eq!(node.get_key("name").unwrap(), None);
        assert_eq!(node.get_key("0").unwrap(), Some(Value::from(1)));
    }

    #[test]
    fn mutators_reject_non_sequences() {
        let node = Reactive::new(Value::object([("a", 1)])).unwrap();
        assert!(matches!(
            node.push([1]),
            Err(Error::WrongKind { expected: Kind::Sequence, found: Kind::Object })
        ));
        assert!(matches!(node.pop(), Err(Error::WrongKind { .. })));
        assert!(matches!(node.reverse(), Err(Error::WrongKind { .. })));
    }

    #[test]
    fn failed_push_leaves_sequence_untouched() {
        let (node, seen) = observed(Value::array([1]));
        let bad = Value::Custom(crate::value::Custom::new(std::time::Duration::ZERO));

        assert!(matches!(
            node.push([Value::from(2), bad]),
            Err(Error::UnsupportedValueKind { .. })
        ));
        assert_eq!(node.len(), 1);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn concurrent_pushes_are_all_applied() {
        let node = Reactive::new(Value::array::<i32>([])).unwrap();

        std::thread::scope(|scope| {
            for thread in 0..4 {
                let node = &node;
                scope.spawn(move || {
                    for i in 0..50 {
                        node.push([thread * 100 + i]).unwrap();
                    }
                });
            }
        });

        assert_eq!(node.len(), 200);
        assert_eq!(node.children().len(), 200);
        assert_consistent(&node);
        for (_, child) in node.children() {
            assert_eq!(child.parent_count(), 1);
        }
    }

    #[test]
    fn clamp_handles_every_bound() {
        assert_eq!(clamp(&(..), 4), (0, 4));
        assert_eq!(clamp(&(1..=2), 4), (1, 3));
        assert_eq!(clamp(&(3..1), 4), (3, 3));
        assert_eq!(clamp(&(2..100), 4), (2, 4));
        assert_eq!(
            clamp(&(Bound::Excluded(0), Bound::Unbounded), 4),
            (1, 4)
        );
    }
}
