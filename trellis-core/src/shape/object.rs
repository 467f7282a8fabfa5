//! Object-shaped nodes.

use super::Structure;
use crate::error::Result;
use crate::reactive::{Change, Key, Reactive, Slot, NOT_PRESENT};
use crate::value::Value;

/// Structural wrapper for string-keyed objects. Index and length keys are
/// treated as their property names.
pub struct ObjectShape;

impl Structure for ObjectShape {
    fn get(node: &Reactive, key: Key) -> Option<Value> {
        node.child(key.into_name()).map(|child| child.get())
    }

    fn set(node: &Reactive, key: Key, value: Value) -> Result<()> {
        let key = key.into_name();
        let classifier = node.classifier();
        let resolved = classifier.resolve(value)?;

        let change = {
            let _edit = node.edit();
            let previous = node.child(key.clone());
            if previous.as_ref().is_some_and(|child| child.holds(&resolved)) {
                return Ok(());
            }

            let old = Slot::of_node(previous.as_ref());
            let child = Reactive::build(resolved, &classifier);
            node.bind(key.clone(), child.clone());
            Change::at(key, Slot::of(&child), old)
        };
        node.trigger_update(vec![change]);
        Ok(())
    }

    fn delete(node: &Reactive, key: Key) -> Result<Option<Value>> {
        let key = key.into_name();
        let (change, previous) = {
            let _edit = node.edit();
            let Some(previous) = node.unbind(&key) else {
                return Ok(None);
            };
            (Change::at(key, NOT_PRESENT, Slot::of(&previous)), previous)
        };
        node.trigger_update(vec![change]);
        Ok(Some(previous.get()))
    }
}
