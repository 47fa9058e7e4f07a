//! The long-lived dependency graph

use crate::callbacks::{record_class, ClassfileAnalyzer, ImportQueue};
use crate::delta::Delta;
use crate::differential::{Differential, IncrementalRequest, Propagation};
use crate::integrate;
use crate::maps::GraphMaps;
use crate::{GraphConfig, Result};
use cascade_model::{ClassDescriptor, SymbolId, SymbolTable};
use cascade_storage::{GraphDatabase, MultiMaplet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct GraphState {
    maps: GraphMaps,
    database: Option<GraphDatabase>,
    imports: ImportQueue,
    closed: bool,
}

/// Symbol-level dependency graph kept across compilation sessions.
///
/// Every operation takes the graph lock, so differentiating and integrating
/// deltas against one graph never interleave.
pub struct DependencyGraph {
    state: Mutex<GraphState>,
    symbols: Arc<SymbolTable>,
    config: Option<GraphConfig>,
    next_delta: AtomicU64,
}

impl DependencyGraph {
    /// A graph that lives only as long as this value
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(GraphState {
                maps: GraphMaps::transient(),
                database: None,
                imports: ImportQueue::default(),
                closed: false,
            }),
            symbols: Arc::new(SymbolTable::new()),
            config: None,
            next_delta: AtomicU64::new(0),
        }
    }

    /// Open or create the persistent graph described by `config`
    pub fn open(config: GraphConfig) -> Result<Self> {
        let database = GraphDatabase::open(config.database_path())?;
        let symbols = Arc::new(SymbolTable::from_entries(database.load_symbols()?));
        let maps = GraphMaps::persistent(&database)?;
        tracing::debug!(path = %database.path().display(), symbols = symbols.len(), "Opened dependency graph");

        Ok(Self {
            state: Mutex::new(GraphState {
                maps,
                database: Some(database),
                imports: ImportQueue::default(),
                closed: false,
            }),
            symbols,
            config: Some(config),
            next_delta: AtomicU64::new(0),
        })
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    /// Start a compilation round
    pub fn create_delta(&self) -> Result<Delta> {
        let _state = self.state.lock();

        match &self.config {
            Some(config) if !config.transient_delta => {
                let index = self.next_delta.fetch_add(1, Ordering::Relaxed);
                let dir = config.delta_dir().join(index.to_string());
                if dir.exists() {
                    std::fs::remove_dir_all(&dir)?;
                }
                let database = GraphDatabase::open(dir.join(&config.database_file))?;
                let maps = GraphMaps::persistent(&database)?;
                tracing::debug!(dir = %dir.display(), "Created persistent delta");
                Ok(Delta::new(maps, self.symbols.clone(), Some(dir)))
            }
            _ => Ok(Delta::new(GraphMaps::transient(), self.symbols.clone(), None)),
        }
    }

    /// Accept `delta` as the result of a full rebuild
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn differentiate_on_rebuild(&self, delta: &mut Delta) -> Result<()> {
        let _state = self.state.lock();
        delta.rebuild = true;
        delta.differentiated = true;
        Ok(())
    }

    /// Record removed files and hierarchy changes of `delta` without
    /// computing affected files
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn differentiate_on_non_incremental_make(
        &self,
        delta: &mut Delta,
        removed: &[PathBuf],
        files_to_compile: &[PathBuf],
    ) -> Result<()> {
        let state = self.state.lock();
        delta.differentiated = true;
        delta.removed_files = removed.to_vec();
        delta.drain_imports()?;
        delta.compensate_removed_content(files_to_compile)?;

        Differential::easy(&state.maps, &delta.maps, &mut delta.changes, &self.symbols).run(removed)?;
        Ok(())
    }

    /// Work out which files besides those compiled must be recompiled
    #[tracing::instrument(level = "debug", skip_all, fields(files = request.files_to_compile.len()))]
    pub fn differentiate_on_incremental_make(
        &self,
        delta: &mut Delta,
        request: &IncrementalRequest<'_>,
    ) -> Result<Propagation> {
        let state = self.state.lock();
        delta.differentiated = true;
        delta.removed_files = request.removed.clone();
        delta.drain_imports()?;
        delta.compensate_removed_content(&request.files_to_compile)?;

        let propagation = Differential::incremental(&state.maps, &delta.maps, &mut delta.changes, &self.symbols, request)
            .run(&request.removed)?;
        if propagation == Propagation::FullRebuildRequired {
            tracing::debug!("Propagation requires a full rebuild");
        }
        Ok(propagation)
    }

    /// Merge a differentiated delta. The delta is closed even if merging fails.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn integrate(&self, mut delta: Delta) -> Result<()> {
        let mut state = self.state.lock();
        let merged = integrate::merge(&mut state.maps, &mut delta);
        let closed = delta.close();
        merged?;
        closed
    }

    pub fn get_classes(&self, source_file: &Path) -> Result<Option<HashSet<ClassDescriptor>>> {
        let Some(id) = self.symbols.lookup(&source_file.to_string_lossy()) else {
            return Ok(None);
        };
        self.state.lock().maps.classes_of(id)
    }

    /// Record a class compiled outside of any delta
    pub fn associate(&self, class_file: &str, source_file: &Path, analyzer: &dyn ClassfileAnalyzer) -> Result<()> {
        let mut state = self.state.lock();
        record_class(&mut state.maps, &self.symbols, class_file, source_file, analyzer)
    }

    /// Queue imports of a class compiled outside of any delta; applied on the next flush
    pub fn register_imports(&self, class_name: &str, imports: &[String], static_imports: &[String]) {
        self.state.lock().imports.push(class_name, imports, static_imports);
    }

    /// Drop every recorded class and edge
    pub fn clean(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.imports = ImportQueue::default();
        state.maps.clear()?;
        tracing::debug!("Cleaned dependency graph");
        Ok(())
    }

    pub fn flush(&self, memory_caches_only: bool) -> Result<()> {
        let mut state = self.state.lock();
        let GraphState { maps, imports, database, .. } = &mut *state;
        imports.drain(maps, &self.symbols)?;
        maps.flush(memory_caches_only)?;
        if !memory_caches_only {
            if let Some(database) = database {
                database.store_symbols(&self.symbols.entries())?;
            }
        }
        Ok(())
    }

    /// Persist the symbol table and release storage. Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        if let Some(database) = &state.database {
            database.store_symbols(&self.symbols.entries())?;
        }
        state.maps.close()
    }

    /// Ordered dump of all edge maps with names resolved
    pub fn snapshot(&self) -> Result<GraphSnapshot> {
        let state = self.state.lock();
        let maps = &state.maps;
        let name = |id: SymbolId| self.symbols.name(id);

        let mut snapshot = GraphSnapshot::default();
        for (key, values) in collect_sets(maps.class_to_subclasses.as_ref())? {
            let values = values.into_iter().map(name).collect::<std::result::Result<_, _>>()?;
            snapshot.class_to_subclasses.insert(name(key)?, values);
        }
        for (key, values) in collect_sets(maps.class_to_class_dependency.as_ref())? {
            let values = values.into_iter().map(name).collect::<std::result::Result<_, _>>()?;
            snapshot.class_to_class_dependency.insert(name(key)?, values);
        }
        for (key, classes) in collect_sets(maps.source_file_to_classes.as_ref())? {
            let values = classes
                .into_iter()
                .map(|class| name(class.name))
                .collect::<std::result::Result<_, _>>()?;
            snapshot.source_file_to_classes.insert(name(key)?, values);
        }

        let mut sources = Vec::new();
        maps.class_to_source_file.for_each_entry(&mut |class, file| {
            sources.push((class, *file));
            Ok(())
        })?;
        for (class, file) in sources {
            snapshot.class_to_source_file.insert(name(class)?, name(file)?);
        }

        Ok(snapshot)
    }
}

fn collect_sets<V: Eq + Hash + Clone>(map: &dyn MultiMaplet<V>) -> Result<Vec<(SymbolId, HashSet<V>)>> {
    let mut entries = Vec::new();
    map.for_each_entry(&mut |key, values| {
        entries.push((key, values.clone()));
        Ok(())
    })?;
    Ok(entries)
}

/// Name-resolved, ordered copy of a graph's edge maps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub class_to_subclasses: BTreeMap<String, BTreeSet<String>>,
    pub class_to_class_dependency: BTreeMap<String, BTreeSet<String>>,
    pub source_file_to_classes: BTreeMap<String, BTreeSet<String>>,
    pub class_to_source_file: BTreeMap<String, String>,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
