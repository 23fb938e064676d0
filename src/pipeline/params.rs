//! Published parameters and change notification.
//!
//! Everything a stage reports (counters, dimensions, reduction results, time
//! series arrays) is written into a [`ParamTable`] under a [`ParamKey`].
//! Writes that change a value mark the key dirty; [`ParamTable::flush`]
//! then notifies listeners once per dirty key, in write order.
//!
//! Listeners run on whichever thread flushes, with the stage lock held. They
//! must not call back into the same stage.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of a published parameter (e.g. `"MIN_VALUE"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey(pub &'static str);

impl ParamKey {
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ParamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Value of a published parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl ParamValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_float_array(&self) -> Option<&[f64]> {
        match self {
            ParamValue::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i64]> {
        match self {
            ParamValue::IntArray(v) => Some(v),
            _ => None,
        }
    }
}

/// Change listener.
pub type ParamListener = Arc<dyn Fn(ParamKey, &ParamValue) + Send + Sync>;

/// Handle returned by [`ParamTable::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct ListenerEntry {
    id: ListenerId,
    filter: Option<ParamKey>,
    listener: ParamListener,
}

/// Last published value of every parameter, plus its listeners.
#[derive(Default)]
pub struct ParamTable {
    values: BTreeMap<ParamKey, ParamValue>,
    dirty: Vec<ParamKey>,
    listeners: Vec<ListenerEntry>,
    next_listener: u64,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value. Returns `true` (and marks the key dirty) if it changed.
    pub fn set(&mut self, key: ParamKey, value: ParamValue) -> bool {
        if self.values.get(&key) == Some(&value) {
            return false;
        }
        self.values.insert(key, value);
        self.mark_dirty(key);
        true
    }

    pub fn set_int(&mut self, key: ParamKey, value: i64) -> bool {
        self.set(key, ParamValue::Int(value))
    }

    pub fn set_float(&mut self, key: ParamKey, value: f64) -> bool {
        self.set(key, ParamValue::Float(value))
    }

    pub fn set_bool(&mut self, key: ParamKey, value: bool) -> bool {
        self.set(key, ParamValue::Int(value as i64))
    }

    pub fn set_text(&mut self, key: ParamKey, value: impl Into<String>) -> bool {
        self.set(key, ParamValue::Text(value.into()))
    }

    pub fn set_float_array(&mut self, key: ParamKey, value: Vec<f64>) -> bool {
        self.set(key, ParamValue::FloatArray(value))
    }

    pub fn set_int_array(&mut self, key: ParamKey, value: Vec<i64>) -> bool {
        self.set(key, ParamValue::IntArray(value))
    }

    /// Mark a key dirty without changing it, so the next flush republishes it.
    pub fn touch(&mut self, key: ParamKey) {
        if self.values.contains_key(&key) {
            self.mark_dirty(key);
        }
    }

    fn mark_dirty(&mut self, key: ParamKey) {
        if !self.dirty.contains(&key) {
            self.dirty.push(key);
        }
    }

    pub fn get(&self, key: ParamKey) -> Option<&ParamValue> {
        self.values.get(&key)
    }

    pub fn get_int(&self, key: ParamKey) -> Option<i64> {
        self.get(key).and_then(ParamValue::as_i64)
    }

    pub fn get_float(&self, key: ParamKey) -> Option<f64> {
        self.get(key).and_then(ParamValue::as_f64)
    }

    /// Keys written since the last flush.
    pub fn pending(&self) -> &[ParamKey] {
        &self.dirty
    }

    /// Register a listener for every key.
    pub fn subscribe(&mut self, listener: ParamListener) -> ListenerId {
        self.add_listener(None, listener)
    }

    /// Register a listener for a single key.
    pub fn subscribe_to(&mut self, key: ParamKey, listener: ParamListener) -> ListenerId {
        self.add_listener(Some(key), listener)
    }

    fn add_listener(&mut self, filter: Option<ParamKey>, listener: ParamListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(ListenerEntry {
            id,
            filter,
            listener,
        });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Notify listeners of every dirty key. Returns the number of keys flushed.
    pub fn flush(&mut self) -> usize {
        let dirty = std::mem::take(&mut self.dirty);
        for key in &dirty {
            let Some(value) = self.values.get(key) else {
                continue;
            };
            for entry in &self.listeners {
                if entry.filter.map_or(true, |f| f == *key) {
                    (entry.listener)(*key, value);
                }
            }
        }
        dirty.len()
    }

    /// Snapshot of all values.
    pub fn snapshot(&self) -> BTreeMap<ParamKey, ParamValue> {
        self.values.clone()
    }
}

impl std::fmt::Debug for ParamTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamTable")
            .field("values", &self.values.len())
            .field("dirty", &self.dirty)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
