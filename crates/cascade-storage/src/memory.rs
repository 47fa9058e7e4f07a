//! In-memory map implementations
//!
//! Used for transient deltas and for graphs that do not outlive the process.
//! All data is lost when the map is dropped.

use crate::provider::{union_replacing, EntryVisitor, Maplet, MultiMaplet, SetVisitor};
use crate::Result;
use cascade_model::SymbolId;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// In-memory [`Maplet`]
#[derive(Debug, Clone)]
pub struct TransientMaplet<V> {
    map: HashMap<SymbolId, V>,
}

impl<V> TransientMaplet<V> {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<V> Default for TransientMaplet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync> Maplet<V> for TransientMaplet<V> {
    fn contains_key(&self, key: SymbolId) -> Result<bool> {
        Ok(self.map.contains_key(&key))
    }

    fn get(&self, key: SymbolId) -> Result<Option<V>> {
        Ok(self.map.get(&key).cloned())
    }

    fn put(&mut self, key: SymbolId, value: V) -> Result<()> {
        self.map.insert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: SymbolId) -> Result<()> {
        self.map.remove(&key);
        Ok(())
    }

    fn for_each_entry(&self, visit: &mut EntryVisitor<'_, V>) -> Result<()> {
        for (key, value) in &self.map {
            visit(*key, value)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.map.clear();
        Ok(())
    }

    fn flush(&mut self, _memory_caches_only: bool) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.map.clear();
        Ok(())
    }
}

/// In-memory [`MultiMaplet`]
#[derive(Debug, Clone)]
pub struct TransientMultiMaplet<V> {
    map: HashMap<SymbolId, HashSet<V>>,
}

impl<V> TransientMultiMaplet<V> {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Borrowing lookup, for callers that own the map directly
    pub fn values(&self, key: SymbolId) -> Option<&HashSet<V>> {
        self.map.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &HashSet<V>)> {
        self.map.iter().map(|(key, values)| (*key, values))
    }
}

impl<V> Default for TransientMultiMaplet<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Eq + Hash + Clone + Send + Sync> MultiMaplet<V> for TransientMultiMaplet<V> {
    fn contains_key(&self, key: SymbolId) -> Result<bool> {
        Ok(self.map.contains_key(&key))
    }

    fn get(&self, key: SymbolId) -> Result<Option<HashSet<V>>> {
        Ok(self.map.get(&key).cloned())
    }

    fn put_values(&mut self, key: SymbolId, values: HashSet<V>) -> Result<()> {
        union_replacing(self.map.entry(key).or_default(), values);
        Ok(())
    }

    fn replace(&mut self, key: SymbolId, values: HashSet<V>) -> Result<()> {
        self.map.insert(key, values);
        Ok(())
    }

    fn remove(&mut self, key: SymbolId) -> Result<()> {
        self.map.remove(&key);
        Ok(())
    }

    fn remove_value(&mut self, key: SymbolId, value: &V) -> Result<()> {
        if let Some(values) = self.map.get_mut(&key) {
            values.remove(value);
        }
        Ok(())
    }

    fn for_each_entry(&self, visit: &mut SetVisitor<'_, V>) -> Result<()> {
        for (key, values) in &self.map {
            visit(*key, values)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.map.clear();
        Ok(())
    }

    fn flush(&mut self, _memory_caches_only: bool) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.map.clear();
        Ok(())
    }
}
