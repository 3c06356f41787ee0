//! Window options tree.
//!
//! Window-open requests carry a loosely typed, nested options record. Nodes
//! are shared (`Rc`), so a record may reference the same sub-object from
//! several places or even contain itself; everything that walks the tree
//! (merging, JSON rendering) tracks the objects it is inside of.

mod merge;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;

use conduit_common::ContentsId;
use serde_json::Value;

pub use merge::{merge_options, VIEW_MARKER_KEY};

/// Nested preferences sub-tree, merged key by key.
pub const WEB_PREFERENCES: &str = "webPreferences";

/// Pre-existing content handle a window should adopt instead of creating one.
pub const WEB_CONTENTS: &str = "webContents";

/// Initial visibility flag.
pub const SHOW: &str = "show";

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<OptionValue>),
    Object(OptionsObject),
    /// Host-side content handle. Never produced from renderer JSON.
    Contents(ContentsId),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&OptionsObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(_) => Self::Object(OptionsObject::from_json(value)),
        }
    }

    fn to_json_within(&self, path: &mut HashSet<usize>) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => {
                Value::Array(items.iter().map(|v| v.to_json_within(path)).collect())
            }
            Self::Object(o) => o.to_json_within(path),
            Self::Contents(id) => Value::from(id.0),
        }
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<OptionsObject> for OptionValue {
    fn from(value: OptionsObject) -> Self {
        Self::Object(value)
    }
}

impl From<ContentsId> for OptionValue {
    fn from(value: ContentsId) -> Self {
        Self::Contents(value)
    }
}

/// Shared handle to one object node of an options tree.
///
/// Cloning the handle aliases the node; equality is identity. Use
/// [`OptionsObject::shallow_clone`] for an independent top level.
#[derive(Clone, Default)]
pub struct OptionsObject(Rc<RefCell<BTreeMap<String, OptionValue>>>);

impl OptionsObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from renderer JSON. Non-object input yields an empty object.
    pub fn from_json(value: &Value) -> Self {
        let object = Self::new();
        if let Value::Object(map) = value {
            let mut entries = object.0.borrow_mut();
            for (key, v) in map {
                entries.insert(key.clone(), OptionValue::from_json(v));
            }
        }
        object
    }

    /// Render as JSON. A reference back to an enclosing object becomes `null`.
    pub fn to_json(&self) -> Value {
        self.to_json_within(&mut HashSet::new())
    }

    fn to_json_within(&self, path: &mut HashSet<usize>) -> Value {
        if !path.insert(self.addr()) {
            return Value::Null;
        }
        let entries = self.entries();
        let map = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json_within(path)))
            .collect();
        path.remove(&self.addr());
        Value::Object(map)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn get(&self, key: &str) -> Option<OptionValue> {
        self.0.borrow().get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.borrow().get(key).and_then(OptionValue::as_bool)
    }

    pub fn get_object(&self, key: &str) -> Option<OptionsObject> {
        self.0.borrow().get(key).and_then(OptionValue::as_object).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.borrow_mut().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<OptionValue> {
        self.0.borrow_mut().remove(key)
    }

    /// The object stored at `key`, replacing any non-object value with a
    /// fresh empty object.
    pub fn ensure_object(&self, key: &str) -> OptionsObject {
        if let Some(existing) = self.get_object(key) {
            return existing;
        }
        let created = OptionsObject::new();
        self.insert(key, created.clone());
        created
    }

    /// Copy of the current entries. Nested objects stay shared.
    pub fn entries(&self) -> Vec<(String, OptionValue)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// New top-level node with the same entries.
    pub fn shallow_clone(&self) -> OptionsObject {
        OptionsObject(Rc::new(RefCell::new(self.0.borrow().clone())))
    }
}

impl PartialEq for OptionsObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for OptionsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OptionsObject").field(&self.to_json()).finish()
    }
}
