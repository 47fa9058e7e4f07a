//! redb-backed persistent maps
//!
//! One database file holds every map of a graph, one table per map, plus the
//! interned symbol names. Keys are raw symbol ids; values are bincode-encoded.
//! Each write is its own committed transaction.

use crate::provider::{union_replacing, EntryVisitor, Maplet, MultiMaplet, SetVisitor};
use crate::{Result, StorageError};
use cascade_model::SymbolId;
use parking_lot::Mutex;
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SYMBOLS_TABLE: TableDefinition<u32, &str> = TableDefinition::new("symbols");

/// Database file shared by the maps of one graph
#[derive(Clone)]
pub struct GraphDatabase {
    db: Arc<Database>,
    path: PathBuf,
}

impl GraphDatabase {
    /// Create or open the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(SYMBOLS_TABLE)?;
        }
        write_txn.commit()?;

        tracing::debug!(path = %path.display(), "opened graph database");
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn maplet<V>(&self, name: &str) -> Result<RedbMaplet<V>>
    where
        V: Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        let table = Table::create(self.db.clone(), name)?;
        Ok(RedbMaplet {
            table,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn multi_maplet<V>(&self, name: &str) -> Result<RedbMultiMaplet<V>>
    where
        V: Serialize + DeserializeOwned + Eq + Hash + Clone + Send + Sync,
    {
        let table = Table::create(self.db.clone(), name)?;
        Ok(RedbMultiMaplet {
            table,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Interned names saved by [`GraphDatabase::store_symbols`]
    pub fn load_symbols(&self) -> Result<Vec<(u32, String)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SYMBOLS_TABLE)?;

        let mut entries = Vec::new();
        for entry in table.iter()? {
            let (id, name) = entry?;
            entries.push((id.value(), name.value().to_string()));
        }
        Ok(entries)
    }

    /// Save interned names; ids already stored are overwritten
    pub fn store_symbols(&self, entries: &[(u32, String)]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SYMBOLS_TABLE)?;
            for (id, name) in entries {
                table.insert(*id, name.as_str())?;
            }
        }
        write_txn.commit()?;
        tracing::debug!(count = entries.len(), "stored symbol table");
        Ok(())
    }
}

/// One named table holding bincode-encoded values
struct Table {
    db: Arc<Database>,
    name: String,
    closed: bool,
}

impl Table {
    fn create(db: Arc<Database>, name: &str) -> Result<Self> {
        let table = Self {
            db,
            name: name.to_string(),
            closed: false,
        };

        let write_txn = table.db.begin_write()?;
        {
            write_txn.open_table(table.definition())?;
        }
        write_txn.commit()?;

        Ok(table)
    }

    fn definition(&self) -> TableDefinition<'_, u32, &'static [u8]> {
        TableDefinition::new(&self.name)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(StorageError::Closed(self.name.clone()));
        }
        Ok(())
    }

    fn read<V: DeserializeOwned>(&self, key: SymbolId) -> Result<Option<V>> {
        self.ensure_open()?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.definition())?;

        let data = table.get(key.0)?.map(|bytes| bytes.value().to_vec());
        match data {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, key: SymbolId) -> Result<bool> {
        self.ensure_open()?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.definition())?;
        Ok(table.get(key.0)?.is_some())
    }

    fn write<V: Serialize>(&self, key: SymbolId, value: &V) -> Result<()> {
        self.ensure_open()?;
        let bytes = bincode::serialize(value)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(self.definition())?;
            table.insert(key.0, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, key: SymbolId) -> Result<()> {
        self.ensure_open()?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(self.definition())?;
            table.remove(key.0)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Decoded snapshot of every entry
    fn entries<V: DeserializeOwned>(&self) -> Result<Vec<(SymbolId, V)>> {
        self.ensure_open()?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.definition())?;

        let raw: Vec<(u32, Vec<u8>)> = table
            .iter()?
            .map(|r| r.map(|(k, v)| (k.value(), v.value().to_vec())))
            .collect::<std::result::Result<_, _>>()?;

        let mut entries = Vec::with_capacity(raw.len());
        for (key, bytes) in raw {
            entries.push((SymbolId(key), bincode::deserialize(&bytes)?));
        }
        Ok(entries)
    }

    fn clear(&self) -> Result<()> {
        self.ensure_open()?;
        let write_txn = self.db.begin_write()?;
        {
            write_txn.delete_table(self.definition())?;
            write_txn.open_table(self.definition())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// Persistent [`Maplet`] with a read cache
pub struct RedbMaplet<V> {
    table: Table,
    cache: Mutex<HashMap<SymbolId, Option<V>>>,
}

impl<V> Maplet<V> for RedbMaplet<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn contains_key(&self, key: SymbolId) -> Result<bool> {
        if let Some(cached) = self.cache.lock().get(&key) {
            return Ok(cached.is_some());
        }
        self.table.contains(key)
    }

    fn get(&self, key: SymbolId) -> Result<Option<V>> {
        if let Some(cached) = self.cache.lock().get(&key) {
            return Ok(cached.clone());
        }
        let value: Option<V> = self.table.read(key)?;
        self.cache.lock().insert(key, value.clone());
        Ok(value)
    }

    fn put(&mut self, key: SymbolId, value: V) -> Result<()> {
        self.table.write(key, &value)?;
        self.cache.get_mut().insert(key, Some(value));
        Ok(())
    }

    fn remove(&mut self, key: SymbolId) -> Result<()> {
        self.table.delete(key)?;
        self.cache.get_mut().insert(key, None);
        Ok(())
    }

    fn for_each_entry(&self, visit: &mut EntryVisitor<'_, V>) -> Result<()> {
        for (key, value) in self.table.entries::<V>()? {
            visit(key, &value)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.table.clear()?;
        self.cache.get_mut().clear();
        Ok(())
    }

    fn flush(&mut self, memory_caches_only: bool) -> Result<()> {
        tracing::debug!(table = %self.table.name, memory_caches_only, "flushing map");
        self.cache.get_mut().clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.cache.get_mut().clear();
        self.table.closed = true;
        Ok(())
    }
}

/// Persistent [`MultiMaplet`] with a read cache
pub struct RedbMultiMaplet<V> {
    table: Table,
    cache: Mutex<HashMap<SymbolId, Option<HashSet<V>>>>,
}

impl<V> RedbMultiMaplet<V>
where
    V: Serialize + DeserializeOwned + Eq + Hash + Clone + Send + Sync,
{
    fn store(&mut self, key: SymbolId, values: HashSet<V>) -> Result<()> {
        self.table.write(key, &values)?;
        self.cache.get_mut().insert(key, Some(values));
        Ok(())
    }
}

impl<V> MultiMaplet<V> for RedbMultiMaplet<V>
where
    V: Serialize + DeserializeOwned + Eq + Hash + Clone + Send + Sync,
{
    fn contains_key(&self, key: SymbolId) -> Result<bool> {
        if let Some(cached) = self.cache.lock().get(&key) {
            return Ok(cached.is_some());
        }
        self.table.contains(key)
    }

    fn get(&self, key: SymbolId) -> Result<Option<HashSet<V>>> {
        if let Some(cached) = self.cache.lock().get(&key) {
            return Ok(cached.clone());
        }
        let values: Option<HashSet<V>> = self.table.read(key)?;
        self.cache.lock().insert(key, values.clone());
        Ok(values)
    }

    fn put_values(&mut self, key: SymbolId, values: HashSet<V>) -> Result<()> {
        let mut current = self.get(key)?.unwrap_or_default();
        union_replacing(&mut current, values);
        self.store(key, current)
    }

    fn replace(&mut self, key: SymbolId, values: HashSet<V>) -> Result<()> {
        self.store(key, values)
    }

    fn remove(&mut self, key: SymbolId) -> Result<()> {
        self.table.delete(key)?;
        self.cache.get_mut().insert(key, None);
        Ok(())
    }

    fn remove_value(&mut self, key: SymbolId, value: &V) -> Result<()> {
        if let Some(mut current) = self.get(key)? {
            if current.remove(value) {
                self.store(key, current)?;
            }
        }
        Ok(())
    }

    fn for_each_entry(&self, visit: &mut SetVisitor<'_, V>) -> Result<()> {
        for (key, values) in self.table.entries::<HashSet<V>>()? {
            visit(key, &values)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.table.clear()?;
        self.cache.get_mut().clear();
        Ok(())
    }

    fn flush(&mut self, memory_caches_only: bool) -> Result<()> {
        tracing::debug!(table = %self.table.name, memory_caches_only, "flushing multimap");
        self.cache.get_mut().clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.cache.get_mut().clear();
        self.table.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_maplet_crud() {
        let dir = tempdir().unwrap();
        let db = GraphDatabase::open(dir.path().join("test.redb")).unwrap();
        let mut map = db.maplet::<SymbolId>("class_to_source").unwrap();

        map.put(SymbolId(1), SymbolId(100)).unwrap();
        assert_eq!(map.get(SymbolId(1)).unwrap(), Some(SymbolId(100)));
        assert!(map.contains_key(SymbolId(1)).unwrap());

        map.remove(SymbolId(1)).unwrap();
        assert_eq!(map.get(SymbolId(1)).unwrap(), None);
        assert!(!map.contains_key(SymbolId(1)).unwrap());
    }

    #[test]
    fn test_multimaplet_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            let db = GraphDatabase::open(&path).unwrap();
            let mut map = db.multi_maplet::<SymbolId>("class_to_subclasses").unwrap();
            map.put(SymbolId(1), SymbolId(2)).unwrap();
            map.put(SymbolId(1), SymbolId(3)).unwrap();
            map.remove_value(SymbolId(1), &SymbolId(2)).unwrap();
        }

        {
            let db = GraphDatabase::open(&path).unwrap();
            let map = db.multi_maplet::<SymbolId>("class_to_subclasses").unwrap();
            assert_eq!(map.get(SymbolId(1)).unwrap(), Some(HashSet::from([SymbolId(3)])));
        }
    }

    #[test]
    fn test_flush_drops_cache_only() {
        let dir = tempdir().unwrap();
        let db = GraphDatabase::open(dir.path().join("test.redb")).unwrap();
        let mut map = db.multi_maplet::<SymbolId>("deps").unwrap();

        map.put(SymbolId(5), SymbolId(6)).unwrap();
        map.flush(true).unwrap();

        assert_eq!(map.get(SymbolId(5)).unwrap(), Some(HashSet::from([SymbolId(6)])));
        assert_eq!(map.keys().unwrap(), vec![SymbolId(5)]);
    }

    #[test]
    fn test_clear_and_close() {
        let dir = tempdir().unwrap();
        let db = GraphDatabase::open(dir.path().join("test.redb")).unwrap();
        let mut map = db.maplet::<SymbolId>("m").unwrap();

        map.put(SymbolId(1), SymbolId(2)).unwrap();
        map.clear().unwrap();
        assert!(map.keys().unwrap().is_empty());

        map.close().unwrap();
        assert!(matches!(map.get(SymbolId(1)), Err(StorageError::Closed(_))));
    }

    #[test]
    fn test_symbols_round_trip() {
        let dir = tempdir().unwrap();
        let db = GraphDatabase::open(dir.path().join("test.redb")).unwrap();

        db.store_symbols(&[(1, "a/B".to_string()), (2, "/src/a/B.java".to_string())])
            .unwrap();
        let mut loaded = db.load_symbols().unwrap();
        loaded.sort();
        assert_eq!(loaded, vec![(1, "a/B".to_string()), (2, "/src/a/B.java".to_string())]);
    }
}
