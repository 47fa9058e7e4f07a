//! Map contracts the dependency graph is stored in
//!
//! A graph is a handful of maps keyed by [`SymbolId`]: single-valued
//! ([`Maplet`]) or set-valued ([`MultiMaplet`]). Each map is either transient
//! (see [`crate::memory`]) or persistent (see [`crate::redb_storage`]).

use crate::Result;
use cascade_model::SymbolId;
use std::collections::HashSet;
use std::hash::Hash;

/// Callback for [`Maplet::for_each_entry`]
pub type EntryVisitor<'a, V> = dyn FnMut(SymbolId, &V) -> Result<()> + 'a;

/// Callback for [`MultiMaplet::for_each_entry`]
pub type SetVisitor<'a, V> = dyn FnMut(SymbolId, &HashSet<V>) -> Result<()> + 'a;

/// Key to single value map
pub trait Maplet<V: Clone>: Send + Sync {
    fn contains_key(&self, key: SymbolId) -> Result<bool>;

    fn get(&self, key: SymbolId) -> Result<Option<V>>;

    /// Insert or overwrite
    fn put(&mut self, key: SymbolId, value: V) -> Result<()>;

    fn remove(&mut self, key: SymbolId) -> Result<()>;

    /// Visit each live entry exactly once, in no particular order
    fn for_each_entry(&self, visit: &mut EntryVisitor<'_, V>) -> Result<()>;

    /// Drop every entry
    fn clear(&mut self) -> Result<()>;

    /// Drop in-memory caches; with `memory_caches_only == false` also make
    /// pending writes durable
    fn flush(&mut self, memory_caches_only: bool) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Copy every entry of `other` into this map
    fn put_all(&mut self, other: &dyn Maplet<V>) -> Result<()> {
        other.for_each_entry(&mut |key, value| self.put(key, value.clone()))
    }

    fn keys(&self) -> Result<Vec<SymbolId>> {
        let mut keys = Vec::new();
        self.for_each_entry(&mut |key, _| {
            keys.push(key);
            Ok(())
        })?;
        Ok(keys)
    }
}

/// Key to set of values map
///
/// Adding a value equal to one already in the set replaces it, so for values
/// compared by identity the newest content wins.
pub trait MultiMaplet<V: Eq + Hash + Clone>: Send + Sync {
    fn contains_key(&self, key: SymbolId) -> Result<bool>;

    fn get(&self, key: SymbolId) -> Result<Option<HashSet<V>>>;

    /// Union a single value into the set under `key`
    fn put(&mut self, key: SymbolId, value: V) -> Result<()> {
        self.put_values(key, HashSet::from([value]))
    }

    /// Union `values` into the set under `key`
    fn put_values(&mut self, key: SymbolId, values: HashSet<V>) -> Result<()>;

    /// Set the values under `key` to exactly `values`
    fn replace(&mut self, key: SymbolId, values: HashSet<V>) -> Result<()>;

    fn remove(&mut self, key: SymbolId) -> Result<()>;

    /// Remove one value from the set under `key`
    fn remove_value(&mut self, key: SymbolId, value: &V) -> Result<()>;

    /// Visit each live entry exactly once, in no particular order
    fn for_each_entry(&self, visit: &mut SetVisitor<'_, V>) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    fn flush(&mut self, memory_caches_only: bool) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Union every entry of `other` into this map
    fn put_all(&mut self, other: &dyn MultiMaplet<V>) -> Result<()> {
        other.for_each_entry(&mut |key, values| self.put_values(key, values.clone()))
    }

    /// Overwrite the entries of this map with those of `other`
    fn replace_all(&mut self, other: &dyn MultiMaplet<V>) -> Result<()> {
        other.for_each_entry(&mut |key, values| self.replace(key, values.clone()))
    }

    fn keys(&self) -> Result<Vec<SymbolId>> {
        let mut keys = Vec::new();
        self.for_each_entry(&mut |key, _| {
            keys.push(key);
            Ok(())
        })?;
        Ok(keys)
    }
}

/// Union `values` into `set`, replacing equal elements
pub(crate) fn union_replacing<V: Eq + Hash>(set: &mut HashSet<V>, values: HashSet<V>) {
    for value in values {
        set.replace(value);
    }
}
