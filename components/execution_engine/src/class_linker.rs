//! Class and method lookup
//!
//! The engine never loads classes itself. It asks a [`ClassLinker`] and
//! reports failures to a [`ResolutionErrorHandler`]. [`ClassRegistry`] is the
//! in-memory linker the tests and the command line tool use.

use crate::error::VmError;
use crate::method::Method;
use bytecode_system::BytecodeChunk;
use core_types::{ClassId, MethodId};
use jit_compiler::VirtualResolver;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

/// A loaded class
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Class id
    pub id: ClassId,
    /// Name, for diagnostics
    pub name: String,
    /// Superclass; only the root has none
    pub superclass: Option<ClassId>,
    /// Declared method -> this class's implementation of it
    pub overrides: HashMap<MethodId, MethodId>,
    /// Methods declared by this class, in index order
    pub methods: Vec<MethodId>,
}

/// Receives resolution failures
pub trait ResolutionErrorHandler: Send + Sync {
    /// `caller` referenced a class that does not exist
    fn class_not_found(&self, caller: MethodId, class: ClassId);

    /// `caller` referenced a method that does not exist
    fn method_not_found(&self, caller: MethodId, method: MethodId);
}

/// Handler that logs failures; the engine then throws the matching error
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingErrorHandler;

impl ResolutionErrorHandler for LoggingErrorHandler {
    fn class_not_found(&self, caller: MethodId, class: ClassId) {
        warn!(%caller, %class, "class resolution failed");
    }

    fn method_not_found(&self, caller: MethodId, method: MethodId) {
        warn!(%caller, %method, "method resolution failed");
    }
}

/// Class and method metadata interface
pub trait ClassLinker: Send + Sync {
    /// Resolve a class referenced by `caller`
    fn get_class(
        &self,
        caller: MethodId,
        class: ClassId,
        on_error: &dyn ResolutionErrorHandler,
    ) -> Option<Arc<ClassDef>>;

    /// Resolve a method referenced by `caller`
    fn get_method(
        &self,
        caller: MethodId,
        method: MethodId,
        on_error: &dyn ResolutionErrorHandler,
    ) -> Option<Arc<Method>>;

    /// Look up a method without a referencing context
    fn find_method(&self, method: MethodId) -> Option<Arc<Method>>;

    /// Implementation of `declared` for receivers of class `receiver`
    fn resolve_virtual(&self, declared: MethodId, receiver: ClassId) -> Option<MethodId>;

    /// Whether `class` is `ancestor` or inherits from it
    fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> bool;

    /// Every method, in id order
    fn methods(&self) -> Vec<Arc<Method>>;
}

/// Adapts a linker to the compiler's resolver interface
pub(crate) struct LinkerResolver<'a>(pub &'a dyn ClassLinker);

impl VirtualResolver for LinkerResolver<'_> {
    fn resolve_virtual(&self, declared: MethodId, receiver: ClassId) -> Option<MethodId> {
        self.0.resolve_virtual(declared, receiver)
    }
}

const BUILTIN_CLASSES: [(ClassId, &str, Option<ClassId>); 9] = [
    (ClassId::OBJECT, "Object", None),
    (ClassId::THROWABLE, "Throwable", Some(ClassId::OBJECT)),
    (ClassId::ARITHMETIC_EXCEPTION, "ArithmeticException", Some(ClassId::THROWABLE)),
    (ClassId::CLASS_CAST_EXCEPTION, "ClassCastException", Some(ClassId::THROWABLE)),
    (ClassId::NULL_POINTER_EXCEPTION, "NullPointerException", Some(ClassId::THROWABLE)),
    (ClassId::STACK_OVERFLOW_ERROR, "StackOverflowError", Some(ClassId::THROWABLE)),
    (ClassId::NO_SUCH_METHOD_ERROR, "NoSuchMethodError", Some(ClassId::THROWABLE)),
    (ClassId::ILLEGAL_ARGUMENT_EXCEPTION, "IllegalArgumentException", Some(ClassId::THROWABLE)),
    (ClassId::NO_CLASS_DEF_FOUND_ERROR, "NoClassDefFoundError", Some(ClassId::THROWABLE)),
];

/// In-memory class registry
///
/// Built single-threaded, then shared read-only.
///
/// # Examples
///
/// ```
/// use bytecode_system::{BytecodeChunk, Opcode};
/// use core_types::{ClassId, MethodId};
/// use execution_engine::{ClassLinker, ClassRegistry};
///
/// let mut registry = ClassRegistry::new();
/// registry.define_class(ClassId(20), "Main", Some(ClassId::OBJECT)).unwrap();
/// let mut chunk = BytecodeChunk::new(0, 0);
/// chunk.emit(Opcode::LdaInt(1));
/// chunk.emit(Opcode::Return);
/// registry.define_method(MethodId(1), ClassId(20), "main", chunk).unwrap();
///
/// assert!(registry.find_method(MethodId(1)).is_some());
/// assert!(registry.is_subclass(ClassId(20), ClassId::OBJECT));
/// ```
#[derive(Debug)]
pub struct ClassRegistry {
    classes: HashMap<ClassId, Arc<ClassDef>>,
    methods: BTreeMap<MethodId, Arc<Method>>,
}

impl ClassRegistry {
    /// Registry holding the builtin classes
    pub fn new() -> Self {
        let classes = BUILTIN_CLASSES
            .iter()
            .map(|&(id, name, superclass)| {
                let def = ClassDef {
                    id,
                    name: name.to_string(),
                    superclass,
                    overrides: HashMap::new(),
                    methods: Vec::new(),
                };
                (id, Arc::new(def))
            })
            .collect();
        Self {
            classes,
            methods: BTreeMap::new(),
        }
    }

    /// Define a class
    pub fn define_class(
        &mut self,
        id: ClassId,
        name: impl Into<String>,
        superclass: Option<ClassId>,
    ) -> Result<(), VmError> {
        if self.classes.contains_key(&id) {
            return Err(VmError::DuplicateClass(id));
        }
        if let Some(superclass) = superclass {
            if !self.classes.contains_key(&superclass) {
                return Err(VmError::UnknownClass(superclass));
            }
        }
        let def = ClassDef {
            id,
            name: name.into(),
            superclass,
            overrides: HashMap::new(),
            methods: Vec::new(),
        };
        self.classes.insert(id, Arc::new(def));
        Ok(())
    }

    /// Define a method of `class`.
    ///
    /// The chunk's operands are checked here so the interpreter never
    /// indexes outside a frame.
    pub fn define_method(
        &mut self,
        id: MethodId,
        class: ClassId,
        name: impl Into<String>,
        chunk: BytecodeChunk,
    ) -> Result<Arc<Method>, VmError> {
        if self.methods.contains_key(&id) {
            return Err(VmError::DuplicateMethod(id));
        }
        chunk
            .check_operands()
            .map_err(|source| VmError::InvalidChunk { method: id, source })?;
        let def = self.class_mut(class)?;
        let index = def.methods.len() as u32;
        def.methods.push(id);
        let method = Arc::new(Method::new(id, class, index, name, chunk));
        self.methods.insert(id, Arc::clone(&method));
        Ok(method)
    }

    /// Make `implementation` the target of virtual calls to `declared` on
    /// receivers of `class` and its subclasses
    pub fn override_method(
        &mut self,
        class: ClassId,
        declared: MethodId,
        implementation: MethodId,
    ) -> Result<(), VmError> {
        for id in [declared, implementation] {
            if !self.methods.contains_key(&id) {
                return Err(VmError::UnknownMethod(id));
            }
        }
        self.class_mut(class)?
            .overrides
            .insert(declared, implementation);
        Ok(())
    }

    /// Look up a class
    pub fn class(&self, id: ClassId) -> Option<&Arc<ClassDef>> {
        self.classes.get(&id)
    }

    fn class_mut(&mut self, id: ClassId) -> Result<&mut ClassDef, VmError> {
        self.classes
            .get_mut(&id)
            .map(Arc::make_mut)
            .ok_or(VmError::UnknownClass(id))
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassLinker for ClassRegistry {
    fn get_class(
        &self,
        caller: MethodId,
        class: ClassId,
        on_error: &dyn ResolutionErrorHandler,
    ) -> Option<Arc<ClassDef>> {
        let found = self.classes.get(&class).cloned();
        if found.is_none() {
            on_error.class_not_found(caller, class);
        }
        found
    }

    fn get_method(
        &self,
        caller: MethodId,
        method: MethodId,
        on_error: &dyn ResolutionErrorHandler,
    ) -> Option<Arc<Method>> {
        let found = self.methods.get(&method).cloned();
        if found.is_none() {
            on_error.method_not_found(caller, method);
        }
        found
    }

    fn find_method(&self, method: MethodId) -> Option<Arc<Method>> {
        self.methods.get(&method).cloned()
    }

    fn resolve_virtual(&self, declared: MethodId, receiver: ClassId) -> Option<MethodId> {
        let owner = self.methods.get(&declared)?.class();
        let mut current = Some(receiver);
        while let Some(id) = current {
            let class = self.classes.get(&id)?;
            if let Some(implementation) = class.overrides.get(&declared) {
                return Some(*implementation);
            }
            if id == owner {
                return Some(declared);
            }
            current = class.superclass;
        }
        None
    }

    fn is_subclass(&self, class: ClassId, ancestor: ClassId) -> bool {
        let mut current = Some(class);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.classes.get(&id).and_then(|c| c.superclass);
        }
        false
    }

    fn methods(&self) -> Vec<Arc<Method>> {
        self.methods.values().cloned().collect()
    }
}
