//! The four edge maps making up one graph instance

use crate::Result;
use cascade_model::{ClassDescriptor, SymbolId, SymbolTable};
use cascade_storage::{GraphDatabase, Maplet, MultiMaplet, TransientMaplet, TransientMultiMaplet};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const SUBCLASSES_TABLE: &str = "class_to_subclasses";
const DEPENDENCIES_TABLE: &str = "class_to_class";
const SOURCE_TO_CLASSES_TABLE: &str = "source_to_classes";
const CLASS_TO_SOURCE_TABLE: &str = "class_to_source";

/// Edge maps of a graph, main or delta.
///
/// Invariant: every class in `class_to_source_file` has an entry, possibly
/// empty, in `source_file_to_classes` under its file.
pub struct GraphMaps {
    /// superclass -> direct subclasses
    pub class_to_subclasses: Box<dyn MultiMaplet<SymbolId>>,
    /// class -> classes whose code uses it
    pub class_to_class_dependency: Box<dyn MultiMaplet<SymbolId>>,
    pub source_file_to_classes: Box<dyn MultiMaplet<ClassDescriptor>>,
    pub class_to_source_file: Box<dyn Maplet<SymbolId>>,
}

impl GraphMaps {
    pub fn transient() -> Self {
        Self {
            class_to_subclasses: Box::new(TransientMultiMaplet::new()),
            class_to_class_dependency: Box::new(TransientMultiMaplet::new()),
            source_file_to_classes: Box::new(TransientMultiMaplet::new()),
            class_to_source_file: Box::new(TransientMaplet::new()),
        }
    }

    pub fn persistent(db: &GraphDatabase) -> Result<Self> {
        Ok(Self {
            class_to_subclasses: Box::new(db.multi_maplet(SUBCLASSES_TABLE)?),
            class_to_class_dependency: Box::new(db.multi_maplet(DEPENDENCIES_TABLE)?),
            source_file_to_classes: Box::new(db.multi_maplet(SOURCE_TO_CLASSES_TABLE)?),
            class_to_source_file: Box::new(db.maplet(CLASS_TO_SOURCE_TABLE)?),
        })
    }

    /// Descriptor of `name` as recorded in this graph
    pub fn repr_by_name(&self, name: SymbolId) -> Result<Option<ClassDescriptor>> {
        let Some(source) = self.class_to_source_file.get(name)? else {
            return Ok(None);
        };
        let classes = self.source_file_to_classes.get(source)?.unwrap_or_default();
        Ok(classes.into_iter().find(|c| c.name == name))
    }

    pub fn source_of(&self, class: SymbolId) -> Result<Option<SymbolId>> {
        Ok(self.class_to_source_file.get(class)?)
    }

    pub fn classes_of(&self, source: SymbolId) -> Result<Option<HashSet<ClassDescriptor>>> {
        Ok(self.source_file_to_classes.get(source)?)
    }

    pub fn dependents_of(&self, class: SymbolId) -> Result<HashSet<SymbolId>> {
        Ok(self.class_to_class_dependency.get(class)?.unwrap_or_default())
    }

    pub fn subclasses_of(&self, class: SymbolId) -> Result<HashSet<SymbolId>> {
        Ok(self.class_to_subclasses.get(class)?.unwrap_or_default())
    }

    /// `root` and every class transitively below it
    pub fn all_subclasses(&self, root: SymbolId) -> Result<HashSet<SymbolId>> {
        let mut seen = HashSet::from([root]);
        let mut stack = vec![root];
        while let Some(class) = stack.pop() {
            for sub in self.subclasses_of(class)? {
                if seen.insert(sub) {
                    stack.push(sub);
                }
            }
        }
        Ok(seen)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.class_to_subclasses.clear()?;
        self.class_to_class_dependency.clear()?;
        self.source_file_to_classes.clear()?;
        self.class_to_source_file.clear()?;
        Ok(())
    }

    pub fn flush(&mut self, memory_caches_only: bool) -> Result<()> {
        self.class_to_subclasses.flush(memory_caches_only)?;
        self.class_to_class_dependency.flush(memory_caches_only)?;
        self.source_file_to_classes.flush(memory_caches_only)?;
        self.class_to_source_file.flush(memory_caches_only)?;
        Ok(())
    }

    /// Close every map; all four are attempted even if one fails
    pub fn close(&mut self) -> Result<()> {
        let results = [
            self.class_to_subclasses.close(),
            self.class_to_class_dependency.close(),
            self.source_file_to_classes.close(),
            self.class_to_source_file.close(),
        ];
        for result in results {
            result?;
        }
        Ok(())
    }
}

/// Intern a source file path
pub(crate) fn file_id(symbols: &SymbolTable, path: &Path) -> SymbolId {
    symbols.intern(&path.to_string_lossy())
}

pub(crate) fn file_path(symbols: &SymbolTable, id: SymbolId) -> Result<PathBuf> {
    Ok(PathBuf::from(symbols.name(id)?))
}
