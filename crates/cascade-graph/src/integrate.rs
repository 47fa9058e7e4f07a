//! Merging a differentiated delta into the main graph

use crate::delta::{ChangeLog, Delta};
use crate::maps::GraphMaps;
use crate::{GraphError, Result};
use cascade_model::{ClassDescriptor, SymbolId, UsageRecord};
use cascade_storage::{MultiMaplet, TransientMultiMaplet};
use std::collections::HashSet;

/// Commit `delta` into `main`.
///
/// Classes of removed files and deleted classes are purged first; the
/// classes they used are collected in a trash map (used class -> user) so
/// their dependency edges can be recomputed at the end.
pub(crate) fn merge(main: &mut GraphMaps, delta: &mut Delta) -> Result<()> {
    if !delta.differentiated {
        return Err(GraphError::NotDifferentiated);
    }
    delta.drain_imports()?;

    let symbols = delta.symbols.clone();
    let changes = &mut delta.changes;
    for class in &changes.deleted_classes {
        changes.changed_classes.remove(&class.name);
    }

    let mut trash = TransientMultiMaplet::new();

    for file in &delta.removed_files {
        let Some(id) = symbols.lookup(&file.to_string_lossy()) else {
            continue;
        };
        for class in main.classes_of(id)?.unwrap_or_default() {
            if delta.maps.class_to_source_file.contains_key(class.name)? {
                // Moved into a file compiled this round: only its outgoing
                // edges go stale, subclasses and dependants stay.
                tracing::debug!(class = ?class.name, file = %file.display(), "Class moved out of removed file");
                for sup in class.supers() {
                    changes.register_removed_super(class.name, sup)?;
                }
                trash_usages(main, class.name, Some(&class.usages), &mut trash)?;
                continue;
            }
            cleanup_removed_class(main, changes, &class, &mut trash)?;
        }
        main.source_file_to_classes.remove(id)?;
        tracing::debug!(file = %file.display(), "Removed source file from graph");
    }

    if delta.rebuild {
        tracing::debug!("Replacing graph with rebuilt delta");
        main.clear()?;
        main.class_to_subclasses.put_all(delta.maps.class_to_subclasses.as_ref())?;
        main.class_to_source_file.put_all(delta.maps.class_to_source_file.as_ref())?;
        main.source_file_to_classes.replace_all(delta.maps.source_file_to_classes.as_ref())?;
    } else {
        let deleted: Vec<ClassDescriptor> = changes.deleted_classes.iter().cloned().collect();
        for class in &deleted {
            cleanup_removed_class(main, changes, class, &mut trash)?;
        }

        merge_subclasses(main, changes)?;

        for &class in &changes.changed_classes {
            trash_usages(main, class, None, &mut trash)?;
            match delta.maps.source_of(class)? {
                Some(file) => main.class_to_source_file.put(class, file)?,
                None => main.class_to_source_file.remove(class)?,
            }
        }

        for &file in &changes.changed_files {
            match delta.maps.classes_of(file)? {
                Some(classes) => main.source_file_to_classes.replace(file, classes)?,
                None => main.source_file_to_classes.remove(file)?,
            }
        }
    }

    merge_dependencies(main, &delta.maps, &trash)
}

fn cleanup_removed_class(
    main: &mut GraphMaps,
    changes: &mut ChangeLog,
    class: &ClassDescriptor,
    trash: &mut TransientMultiMaplet<SymbolId>,
) -> Result<()> {
    tracing::debug!(class = ?class.name, "Cleaning up removed class");
    for sup in class.supers() {
        changes.register_removed_super(class.name, sup)?;
    }
    trash_usages(main, class.name, Some(&class.usages), trash)?;

    main.class_to_class_dependency.remove(class.name)?;
    main.class_to_subclasses.remove(class.name)?;
    main.class_to_source_file.remove(class.name)?;
    Ok(())
}

/// Record that `class` no longer uses what its stored usages point to
fn trash_usages(
    main: &GraphMaps,
    class: SymbolId,
    usages: Option<&HashSet<UsageRecord>>,
    trash: &mut TransientMultiMaplet<SymbolId>,
) -> Result<()> {
    let stored;
    let usages = match usages {
        Some(usages) => usages,
        None => match main.repr_by_name(class)? {
            Some(repr) => {
                stored = repr.usages;
                &stored
            }
            None => return Ok(()),
        },
    };

    for usage in usages {
        trash.put(usage.owner(), class)?;
    }
    Ok(())
}

fn merge_subclasses(main: &mut GraphMaps, changes: &ChangeLog) -> Result<()> {
    let mut supers: HashSet<SymbolId> = changes.added_supers.keys()?.into_iter().collect();
    supers.extend(changes.removed_supers.keys()?);

    for sup in supers {
        let added = changes.added_supers.values(sup).cloned().unwrap_or_default();
        let removed = changes.removed_supers.values(sup).cloned().unwrap_or_default();

        let mut subclasses = main.subclasses_of(sup)?;
        subclasses.retain(|sub| !removed.contains(sub));
        subclasses.extend(added);

        if subclasses.is_empty() {
            main.class_to_subclasses.remove(sup)?;
        } else {
            main.class_to_subclasses.replace(sup, subclasses)?;
        }
    }
    Ok(())
}

/// Rewrite the dependants of every class that lost a user or gained one,
/// writing back only sets that actually changed
fn merge_dependencies(main: &mut GraphMaps, delta: &GraphMaps, trash: &TransientMultiMaplet<SymbolId>) -> Result<()> {
    let mut classes: HashSet<SymbolId> = trash.keys()?.into_iter().collect();
    classes.extend(delta.class_to_class_dependency.keys()?);

    for class in classes {
        let now = delta.dependents_of(class)?;
        let to_remove = trash.values(class).cloned().unwrap_or_default();

        if !to_remove.is_empty() {
            let current = main.dependents_of(class)?;
            if !current.is_empty() {
                let mut next: HashSet<SymbolId> = current.difference(&to_remove).copied().collect();
                next.extend(now);
                if next != current {
                    if next.is_empty() {
                        main.class_to_class_dependency.remove(class)?;
                    } else {
                        main.class_to_class_dependency.replace(class, next)?;
                    }
                }
                continue;
            }
        }

        if !now.is_empty() {
            main.class_to_class_dependency.put_values(class, now)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{record_class, Backend};
    use cascade_model::{Access, SymbolTable, OBJECT_CLASS};
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn test_merge_requires_differentiation() {
        let mut main = GraphMaps::transient();
        let mut delta = Delta::new(GraphMaps::transient(), Arc::new(SymbolTable::new()), None);
        assert!(matches!(merge(&mut main, &mut delta), Err(GraphError::NotDifferentiated)));
    }

    #[test]
    fn test_changed_usages_rewrite_dependants() {
        let symbols = Arc::new(SymbolTable::new());
        let (a, b, user) = (symbols.intern("p/A"), symbols.intern("p/B"), symbols.intern("p/User"));
        let object = symbols.intern(OBJECT_CLASS);

        let mut main = GraphMaps::transient();
        let before = ClassDescriptor::new(user, Access::PUBLIC, object).with_usage(UsageRecord::class(a));
        record_class(&mut main, &symbols, "", Path::new("User.java"), &before).unwrap();

        let mut delta = Delta::new(GraphMaps::transient(), symbols.clone(), None);
        let after = ClassDescriptor::new(user, Access::PUBLIC, object).with_usage(UsageRecord::class(b));
        delta.associate("", Path::new("User.java"), &after).unwrap();
        delta.changes.changed_classes.insert(user);
        delta.changes.changed_files.insert(symbols.intern("User.java"));
        delta.differentiated = true;

        merge(&mut main, &mut delta).unwrap();

        assert!(main.dependents_of(a).unwrap().is_empty());
        assert_eq!(main.dependents_of(b).unwrap(), HashSet::from([user]));
        assert!(!main.class_to_class_dependency.contains_key(a).unwrap());
    }

    #[test]
    fn test_subclass_edges_follow_registered_supers() {
        let symbols = Arc::new(SymbolTable::new());
        let (base, other, sub) = (symbols.intern("p/Base"), symbols.intern("p/Other"), symbols.intern("p/Sub"));

        let mut main = GraphMaps::transient();
        main.class_to_subclasses.put(base, sub).unwrap();

        let mut changes = ChangeLog::default();
        changes.register_removed_super(sub, base).unwrap();
        changes.register_added_super(sub, other).unwrap();
        merge_subclasses(&mut main, &changes).unwrap();

        assert!(!main.class_to_subclasses.contains_key(base).unwrap());
        assert_eq!(main.subclasses_of(other).unwrap(), HashSet::from([sub]));
    }
}
