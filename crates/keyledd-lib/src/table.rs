//! Binding table: (input device, indicator) → binding.

use std::collections::HashMap;

use crate::binding::{Binding, InputId};
use crate::indicator::Indicator;

/// Lookup key: which indicator on which opened input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub input: InputId,
    pub indicator: Indicator,
}

impl BindingKey {
    pub fn new(input: InputId, indicator: Indicator) -> Self {
        BindingKey { input, indicator }
    }
}

/// Resolved bindings, built once at startup and read-only afterwards.
///
/// Iteration yields bindings in declaration order.
#[derive(Debug, Default)]
pub struct BindingTable {
    bindings: Vec<Binding>,
    index: HashMap<BindingKey, usize>,
}

impl BindingTable {
    /// Insert a binding. Returns the binding back if its key is already taken.
    pub(crate) fn insert(&mut self, binding: Binding) -> Result<(), Binding> {
        let key = BindingKey::new(binding.input, binding.indicator);
        if self.index.contains_key(&key) {
            return Err(binding);
        }
        self.index.insert(key, self.bindings.len());
        self.bindings.push(binding);
        Ok(())
    }

    pub fn get(&self, key: BindingKey) -> Option<&Binding> {
        self.index.get(&key).map(|&i| &self.bindings[i])
    }

    pub fn lookup(&self, input: InputId, indicator: Indicator) -> Option<&Binding> {
        self.get(BindingKey::new(input, indicator))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<'a> IntoIterator for &'a BindingTable {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
