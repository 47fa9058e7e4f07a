//! Compiler callbacks populating a graph

use crate::maps::{file_id, GraphMaps};
use crate::Result;
use cascade_model::{internal_name, ClassDescriptor, SymbolId, SymbolTable, UsageRecord};
use std::path::Path;

/// Produces the descriptor of one compiled class
pub trait ClassfileAnalyzer {
    /// `None` when the output is not a class worth recording
    fn analyze(&self, class_file: SymbolId, symbols: &SymbolTable) -> Option<ClassDescriptor>;
}

/// An already built descriptor analyzes to itself
impl ClassfileAnalyzer for ClassDescriptor {
    fn analyze(&self, class_file: SymbolId, _symbols: &SymbolTable) -> Option<ClassDescriptor> {
        Some(self.clone().with_class_file(class_file))
    }
}

/// Receiver of compiler output for one compilation round
pub trait Backend {
    /// Record one compiled class and the source file it came from
    fn associate(&mut self, class_file: &str, source_file: &Path, analyzer: &dyn ClassfileAnalyzer) -> Result<()>;

    /// Record the imports of `class_name` (dotted). Applied once the class
    /// itself is known, see [`ImportQueue`].
    fn register_imports(&mut self, class_name: &str, imports: &[String], static_imports: &[String]);
}

/// Add `class` to `maps`: class to source, source to classes, one subclass
/// edge per supertype and one dependency edge per usage of a class declared
/// in another file.
pub(crate) fn record_class(
    maps: &mut GraphMaps,
    symbols: &SymbolTable,
    class_file: &str,
    source_file: &Path,
    analyzer: &dyn ClassfileAnalyzer,
) -> Result<()> {
    let class_file = symbols.intern(class_file);
    let Some(class) = analyzer.analyze(class_file, symbols) else {
        return Ok(());
    };
    let source = file_id(symbols, source_file);
    let name = class.name;
    tracing::debug!(class = ?name, source = %source_file.display(), "Associating class");

    maps.class_to_source_file.put(name, source)?;

    for sup in class.supers() {
        maps.class_to_subclasses.put(sup, name)?;
    }

    for usage in &class.usages {
        let owner = usage.owner();
        if owner == name {
            continue;
        }
        match maps.class_to_source_file.get(owner)? {
            Some(owner_source) if owner_source == source => {}
            _ => maps.class_to_class_dependency.put(owner, name)?,
        }
    }

    maps.source_file_to_classes.put(source, class)?;
    Ok(())
}

/// Imports waiting for their class to be recorded
#[derive(Debug, Clone)]
pub(crate) struct PendingImport {
    class_name: String,
    imports: Vec<String>,
}

/// Queue of import registrations, drained in order before propagation
#[derive(Debug, Default)]
pub(crate) struct ImportQueue {
    pending: Vec<PendingImport>,
}

impl ImportQueue {
    /// Queue imports of `class_name`; static imports are reduced to their owning type
    pub fn push(&mut self, class_name: &str, imports: &[String], static_imports: &[String]) {
        let mut all = imports.to_vec();
        all.extend(static_imports.iter().map(|import| match import.rsplit_once('.') {
            Some((owner, _)) => owner.to_string(),
            None => import.clone(),
        }));
        self.pending.push(PendingImport {
            class_name: class_name.to_string(),
            imports: all,
        });
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record every queued import as a dependency edge, and as a class usage
    /// of the importing class when its descriptor is known
    pub fn drain(&mut self, maps: &mut GraphMaps, symbols: &SymbolTable) -> Result<()> {
        for pending in std::mem::take(&mut self.pending) {
            let root = symbols.intern(&internal_name(&pending.class_name));
            let source = maps.source_of(root)?;

            for import in &pending.imports {
                if import.ends_with('*') {
                    continue;
                }
                let imported = symbols.intern(&internal_name(import));
                tracing::debug!(class = ?root, import = %import, "Registering import");
                maps.class_to_class_dependency.put(imported, root)?;

                let Some(source) = source else {
                    continue;
                };
                if let Some(repr) = maps.repr_by_name(root)? {
                    if let Some(updated) = repr.adding_usage(UsageRecord::class(imported)) {
                        maps.source_file_to_classes.put(source, updated)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_model::{Access, OBJECT_CLASS};
    use std::collections::HashSet;

    #[test]
    fn test_associate_records_cross_file_dependencies_only() {
        let symbols = SymbolTable::new();
        let mut maps = GraphMaps::transient();
        let (a, b, object) = (symbols.intern("p/A"), symbols.intern("p/B"), symbols.intern(OBJECT_CLASS));

        let class_a = ClassDescriptor::new(a, Access::PUBLIC, object);
        let class_b = ClassDescriptor::new(b, Access::PUBLIC, a).with_usage(UsageRecord::class(a));
        record_class(&mut maps, &symbols, "p/A.class", Path::new("A.java"), &class_a).unwrap();
        record_class(&mut maps, &symbols, "p/B.class", Path::new("B.java"), &class_b).unwrap();

        assert_eq!(maps.dependents_of(a).unwrap(), HashSet::from([b]));
        assert_eq!(maps.subclasses_of(a).unwrap(), HashSet::from([b]));
        assert_eq!(maps.repr_by_name(b).unwrap().map(|c| c.class_file), Some(symbols.intern("p/B.class")));

        // same file: no edge
        let inner = symbols.intern("p/A$Inner");
        let class_inner = ClassDescriptor::new(inner, Access::empty(), object).with_usage(UsageRecord::class(a));
        record_class(&mut maps, &symbols, "p/A$Inner.class", Path::new("A.java"), &class_inner).unwrap();
        assert!(!maps.dependents_of(a).unwrap().contains(&inner));
    }

    #[test]
    fn test_imports_drain_into_edges_and_usages() {
        let symbols = SymbolTable::new();
        let mut maps = GraphMaps::transient();
        let (user, object) = (symbols.intern("p/User"), symbols.intern(OBJECT_CLASS));
        let class = ClassDescriptor::new(user, Access::PUBLIC, object);
        record_class(&mut maps, &symbols, "p/User.class", Path::new("User.java"), &class).unwrap();

        let mut queue = ImportQueue::default();
        queue.push(
            "p.User",
            &["q.Lib".to_string(), "r.*".to_string()],
            &["s.Consts.VALUE".to_string()],
        );
        queue.drain(&mut maps, &symbols).unwrap();
        assert!(queue.is_empty());

        let lib = symbols.intern("q/Lib");
        let consts = symbols.intern("s/Consts");
        assert_eq!(maps.dependents_of(lib).unwrap(), HashSet::from([user]));
        assert_eq!(maps.dependents_of(consts).unwrap(), HashSet::from([user]));
        assert!(symbols.lookup("r/*").is_none());

        let repr = maps.repr_by_name(user).unwrap().unwrap();
        assert!(repr.usages.contains(&UsageRecord::class(lib)));
        assert!(repr.usages.contains(&UsageRecord::class(consts)));
    }
}
