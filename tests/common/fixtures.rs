use cascade::graph::{Backend, ConstantAffection, ConstantAffectionResolver, Delta, DependencyGraph, IncrementalRequest, Propagation};
use cascade::model::{
    Access, ClassDescriptor, ConstantValue, FieldDescriptor, MethodDescriptor, Primitive, SymbolId, SymbolTable,
    TypeRef, OBJECT_CLASS,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Source files and their classes for one compilation
pub type Sources = Vec<(&'static str, Vec<ClassDescriptor>)>;

/// A graph plus helpers to describe classes and run compilation rounds
pub struct Project {
    pub graph: DependencyGraph,
    pub symbols: Arc<SymbolTable>,
}

impl Project {
    pub fn in_memory() -> Self {
        Self::with_graph(DependencyGraph::in_memory())
    }

    pub fn with_graph(graph: DependencyGraph) -> Self {
        let symbols = graph.symbols().clone();
        Self { graph, symbols }
    }

    pub fn id(&self, name: &str) -> SymbolId {
        self.symbols.intern(name)
    }

    /// Public class `name` extending `super_name`
    pub fn class(&self, name: &str, super_name: &str) -> ClassDescriptor {
        self.class_with(name, Access::PUBLIC, super_name)
    }

    pub fn class_with(&self, name: &str, access: Access, super_name: &str) -> ClassDescriptor {
        ClassDescriptor::new(self.id(name), access, self.id(super_name))
    }

    /// `java/lang/Object` itself. Its superclass is not a class, so
    /// hierarchy walks end here instead of at an unresolved name.
    pub fn object(&self) -> ClassDescriptor {
        let mut object = self.plain_class(OBJECT_CLASS);
        object.super_class = TypeRef::Primitive(Primitive::Void);
        object
    }

    pub fn plain_class(&self, name: &str) -> ClassDescriptor {
        self.class(name, OBJECT_CLASS)
    }

    pub fn method(&self, name: &str, access: Access, return_type: TypeRef) -> MethodDescriptor {
        MethodDescriptor::new(self.id(name), access, vec![], return_type)
    }

    pub fn field(&self, name: &str, access: Access) -> FieldDescriptor {
        FieldDescriptor::new(self.id(name), access, int())
    }

    pub fn constant(&self, name: &str, access: Access, value: i64) -> FieldDescriptor {
        self.field(name, access | Access::STATIC | Access::FINAL)
            .with_value(ConstantValue::Integer(value))
    }

    /// Feed `sources` into a fresh delta
    pub fn compile(&self, sources: &Sources) -> Delta {
        let mut delta = self.graph.create_delta().unwrap();
        for (file, classes) in sources {
            for class in classes {
                delta.associate("", &PathBuf::from(file), class).unwrap();
            }
        }
        delta
    }

    /// Full build of `sources`, integrated into the graph
    pub fn build(&self, sources: Sources) {
        let mut delta = self.compile(&sources);
        self.graph.differentiate_on_rebuild(&mut delta).unwrap();
        self.graph.integrate(delta).unwrap();
    }

    /// Incremental round recompiling `sources` after deleting `removed`
    pub fn round(&self, sources: Sources, removed: &[&str]) -> (Delta, Propagation) {
        self.round_with(sources, removed, None)
    }

    pub fn round_with(
        &self,
        sources: Sources,
        removed: &[&str],
        resolver: Option<&dyn ConstantAffectionResolver>,
    ) -> (Delta, Propagation) {
        let mut delta = self.compile(&sources);
        let files = sources.iter().map(|(file, _)| PathBuf::from(file)).collect();
        let mut request =
            IncrementalRequest::new(files).with_removed(removed.iter().map(PathBuf::from).collect());
        if let Some(resolver) = resolver {
            request = request.with_resolver(resolver);
        }
        let propagation = self.graph.differentiate_on_incremental_make(&mut delta, &request).unwrap();
        (delta, propagation)
    }

    /// Incremental round that is integrated right away
    pub fn commit(&self, sources: Sources, removed: &[&str]) -> Propagation {
        let (delta, propagation) = self.round(sources, removed);
        self.graph.integrate(delta).unwrap();
        propagation
    }
}

pub fn int() -> TypeRef {
    TypeRef::Primitive(Primitive::Int)
}

pub fn long() -> TypeRef {
    TypeRef::Primitive(Primitive::Long)
}

/// A request as seen by a resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverCall {
    pub owner: String,
    pub field: String,
    pub is_removed: bool,
    pub access_changed: bool,
}

/// Resolver answering every request the same way; `None` drops the sender
pub struct FixedResolver {
    answer: Option<ConstantAffection>,
    pub calls: Mutex<Vec<ResolverCall>>,
}

impl FixedResolver {
    pub fn answering(answer: ConstantAffection) -> Self {
        Self {
            answer: Some(answer),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ConstantAffectionResolver for FixedResolver {
    fn request(
        &self,
        owner: &str,
        field: &str,
        _access: Access,
        is_removed: bool,
        access_changed: bool,
    ) -> oneshot::Receiver<ConstantAffection> {
        self.calls.lock().unwrap().push(ResolverCall {
            owner: owner.to_string(),
            field: field.to_string(),
            is_removed,
            access_changed,
        });

        let (tx, rx) = oneshot::channel();
        if let Some(answer) = &self.answer {
            let _ = tx.send(answer.clone());
        }
        rx
    }
}

/// Resolver answering from a task spawned on the ambient tokio runtime
pub struct SpawningResolver {
    answer: ConstantAffection,
}

impl SpawningResolver {
    pub fn answering(answer: ConstantAffection) -> Self {
        Self { answer }
    }
}

impl ConstantAffectionResolver for SpawningResolver {
    fn request(
        &self,
        _owner: &str,
        _field: &str,
        _access: Access,
        _is_removed: bool,
        _access_changed: bool,
    ) -> oneshot::Receiver<ConstantAffection> {
        let (tx, rx) = oneshot::channel();
        let answer = self.answer.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            let _ = tx.send(answer);
        });
        rx
    }
}
