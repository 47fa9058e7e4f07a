//! Interned symbol names

use crate::ModelError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Qualified name of the root object type; an array is a subtype of it.
pub const OBJECT_CLASS: &str = "java/lang/Object";

/// Interfaces every array type implements.
pub const ARRAY_SUPERTYPES: [&str; 3] = [OBJECT_CLASS, "java/lang/Cloneable", "java/io/Serializable"];

/// Name of instance initializers.
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Unique identifier for an interned name (class, member, or file path)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl SymbolId {
    /// Pre-interned empty string.
    pub const EMPTY: SymbolId = SymbolId(0);

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
struct Interned {
    by_name: HashMap<String, SymbolId>,
    names: Vec<String>,
}

/// Maps names to small integer ids and back.
///
/// Interning takes `&self` so a single table can be shared by the main graph,
/// its deltas and the compiler callbacks.
pub struct SymbolTable {
    inner: RwLock<Interned>,
}

impl SymbolTable {
    /// Create a table holding only the empty name.
    pub fn new() -> Self {
        let mut interned = Interned::default();
        interned.by_name.insert(String::new(), SymbolId::EMPTY);
        interned.names.push(String::new());
        Self {
            inner: RwLock::new(interned),
        }
    }

    /// Rebuild a table from previously exported `(id, name)` pairs.
    ///
    /// Ids that were never exported are filled with unreachable placeholders so
    /// that every restored id keeps its value.
    pub fn from_entries(entries: impl IntoIterator<Item = (u32, String)>) -> Self {
        let table = Self::new();
        {
            let mut inner = table.inner.write();
            for (id, name) in entries {
                let index = id as usize;
                if index == 0 {
                    continue;
                }
                while inner.names.len() <= index {
                    inner.names.push(String::new());
                }
                inner.by_name.insert(name.clone(), SymbolId(id));
                inner.names[index] = name;
            }
        }
        table
    }

    /// Intern `name`, returning its id
    pub fn intern(&self, name: &str) -> SymbolId {
        if let Some(id) = self.inner.read().by_name.get(name) {
            return *id;
        }

        let mut inner = self.inner.write();
        if let Some(id) = inner.by_name.get(name) {
            return *id;
        }
        let id = SymbolId(inner.names.len() as u32);
        inner.names.push(name.to_string());
        inner.by_name.insert(name.to_string(), id);
        id
    }

    /// Look up an already interned name without interning it
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Resolve an id back to its name
    pub fn name(&self, id: SymbolId) -> Result<String, ModelError> {
        self.inner
            .read()
            .names
            .get(id.0 as usize)
            .cloned()
            .ok_or(ModelError::UnknownSymbol(id))
    }

    /// Package part of the interned qualified name `id`
    pub fn package_of(&self, id: SymbolId) -> Result<String, ModelError> {
        let name = self.name(id)?;
        Ok(package_name(&name).to_string())
    }

    /// Export every non-empty `(id, name)` pair, ordered by id.
    pub fn entries(&self) -> Vec<(u32, String)> {
        self.inner
            .read()
            .names
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, name)| (index as u32, name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Package of a `/`-separated qualified class name (`""` for the default package).
pub fn package_name(qualified: &str) -> &str {
    match qualified.rfind('/') {
        Some(index) => &qualified[..index],
        None => "",
    }
}

/// Convert a dotted source-level name (`a.b.C`) into its internal form (`a/b/C`).
pub fn internal_name(dotted: &str) -> String {
    dotted.replace('.', "/")
}
