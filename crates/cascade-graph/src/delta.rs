//! Per-round delta graph

use crate::callbacks::{record_class, Backend, ClassfileAnalyzer, ImportQueue};
use crate::maps::{file_id, GraphMaps};
use crate::Result;
use cascade_model::{ClassDescriptor, SymbolId, SymbolTable};
use cascade_storage::{MultiMaplet, TransientMultiMaplet};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What propagation learned about the round, consumed by integration
#[derive(Default)]
pub(crate) struct ChangeLog {
    pub changed_classes: HashSet<SymbolId>,
    pub changed_files: HashSet<SymbolId>,
    pub deleted_classes: HashSet<ClassDescriptor>,
    /// superclass -> subclasses that started extending it
    pub added_supers: TransientMultiMaplet<SymbolId>,
    /// superclass -> subclasses that stopped extending it
    pub removed_supers: TransientMultiMaplet<SymbolId>,
}

impl ChangeLog {
    pub fn register_added_super(&mut self, subclass: SymbolId, superclass: SymbolId) -> Result<()> {
        self.added_supers.put(superclass, subclass)?;
        Ok(())
    }

    pub fn register_removed_super(&mut self, subclass: SymbolId, superclass: SymbolId) -> Result<()> {
        self.removed_supers.put(superclass, subclass)?;
        Ok(())
    }
}

/// Graph of the classes compiled in one round.
///
/// Created by [`crate::DependencyGraph::create_delta`], filled through
/// [`Backend`], differentiated once against the main graph and then either
/// integrated or dropped. Closing releases its storage.
pub struct Delta {
    pub(crate) maps: GraphMaps,
    pub(crate) symbols: Arc<SymbolTable>,
    pub(crate) changes: ChangeLog,
    pub(crate) removed_files: Vec<PathBuf>,
    pub(crate) imports: ImportQueue,
    pub(crate) differentiated: bool,
    pub(crate) rebuild: bool,
    /// Scratch storage directory, deleted on close
    dir: Option<PathBuf>,
    closed: bool,
}

impl Delta {
    pub(crate) fn new(maps: GraphMaps, symbols: Arc<SymbolTable>, dir: Option<PathBuf>) -> Self {
        Self {
            maps,
            symbols,
            changes: ChangeLog::default(),
            removed_files: Vec::new(),
            imports: ImportQueue::default(),
            differentiated: false,
            rebuild: false,
            dir,
            closed: false,
        }
    }

    pub fn is_differentiated(&self) -> bool {
        self.differentiated
    }

    /// Classes compiled from `source_file` this round
    pub fn get_classes(&self, source_file: &Path) -> Result<Option<HashSet<ClassDescriptor>>> {
        let Some(id) = self.symbols.lookup(&source_file.to_string_lossy()) else {
            return Ok(None);
        };
        self.maps.classes_of(id)
    }

    /// Give every file in `files` that produced no classes an empty entry,
    /// so its previous classes are diffed as removed
    pub(crate) fn compensate_removed_content(&mut self, files: &[PathBuf]) -> Result<()> {
        for file in files {
            let id = file_id(&self.symbols, file);
            if !self.maps.source_file_to_classes.contains_key(id)? {
                tracing::debug!(file = %file.display(), "Compiled file produced no classes");
                self.maps.source_file_to_classes.replace(id, HashSet::new())?;
            }
        }
        Ok(())
    }

    pub(crate) fn drain_imports(&mut self) -> Result<()> {
        self.imports.drain(&mut self.maps, &self.symbols)
    }

    /// Release storage and remove the scratch directory. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut maps = std::mem::replace(&mut self.maps, GraphMaps::transient());
        let closed = maps.close();
        drop(maps);

        if let Some(dir) = self.dir.take() {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        closed
    }
}

impl Backend for Delta {
    fn associate(&mut self, class_file: &str, source_file: &Path, analyzer: &dyn ClassfileAnalyzer) -> Result<()> {
        record_class(&mut self.maps, &self.symbols, class_file, source_file, analyzer)
    }

    fn register_imports(&mut self, class_name: &str, imports: &[String], static_imports: &[String]) {
        self.imports.push(class_name, imports, static_imports);
    }
}

impl Drop for Delta {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "Failed to close delta");
        }
    }
}
