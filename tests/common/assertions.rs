use cascade::graph::Propagation;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Files reported by an incremental propagation; panics on a full rebuild
pub fn affected(propagation: &Propagation) -> BTreeSet<PathBuf> {
    propagation
        .affected()
        .cloned()
        .unwrap_or_else(|| panic!("Expected incremental propagation, got {propagation:?}"))
}

pub fn files(names: &[&str]) -> BTreeSet<PathBuf> {
    names.iter().map(PathBuf::from).collect()
}

/// Assert every file of `expected` was reported
pub fn assert_affects(propagation: &Propagation, expected: &[&str]) {
    let affected = affected(propagation);
    for file in files(expected) {
        assert!(
            affected.contains(&file),
            "Expected {} to be affected, got {affected:?}",
            file.display()
        );
    }
}

pub fn assert_spares(propagation: &Propagation, spared: &[&str]) {
    let affected = affected(propagation);
    for file in files(spared) {
        assert!(
            !affected.contains(&file),
            "Expected {} not to be affected, got {affected:?}",
            file.display()
        );
    }
}
