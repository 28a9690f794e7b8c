//! Type descriptors supplied by the debug-info collaborator.
//!
//! A `TypeDescriptor` carries the fully-qualified type name, a coarse kind
//! tag, the physical layout (size and fields), and for object types the
//! superclass chain used by cascading rules. Identity is by name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Kind of type for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// Boolean scalar
    Bool,
    /// Single byte character
    Char,
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
    /// Floating point (4 or 8 bytes)
    Float,
    /// Pointer (has pointee)
    Pointer,
    /// Reference (has pointee, displayed like a pointer)
    Reference,
    /// Plain record with fields
    Struct,
    /// Class instance carrying a class pointer in its first word
    Object,
    /// Fixed-size array (has element)
    Array,
}

/// Field information for record types
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name; base-class subobjects use the base class name
    pub name: String,
    /// Field type
    pub ty: Arc<TypeDescriptor>,
    /// Byte offset from the start of the record
    pub offset: u64,
}

impl Field {
    /// Create a field
    pub fn new(name: impl Into<String>, ty: &Arc<TypeDescriptor>, offset: u64) -> Self {
        Self {
            name: name.into(),
            ty: Arc::clone(ty),
            offset,
        }
    }
}

/// Runtime type descriptor
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    byte_size: u64,
    /// Pointee for pointers/references, element for arrays
    inner: Option<Arc<TypeDescriptor>>,
    element_count: u64,
    fields: Vec<Field>,
    /// Superclasses, nearest first
    superclasses: Vec<String>,
}

impl TypeDescriptor {
    /// Create a scalar type
    pub fn scalar(name: impl Into<String>, kind: TypeKind, byte_size: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            byte_size,
            inner: None,
            element_count: 0,
            fields: Vec::new(),
            superclasses: Vec::new(),
        }
    }

    /// `int` (4 bytes, signed)
    pub fn int() -> Arc<Self> {
        Arc::new(Self::scalar("int", TypeKind::Signed, 4))
    }

    /// `unsigned long` (8 bytes)
    pub fn unsigned_long() -> Arc<Self> {
        Arc::new(Self::scalar("unsigned long", TypeKind::Unsigned, 8))
    }

    /// `char`
    pub fn char_type() -> Arc<Self> {
        Arc::new(Self::scalar("char", TypeKind::Char, 1))
    }

    /// `bool`
    pub fn bool_type() -> Arc<Self> {
        Arc::new(Self::scalar("bool", TypeKind::Bool, 1))
    }

    /// `double`
    pub fn double() -> Arc<Self> {
        Arc::new(Self::scalar("double", TypeKind::Float, 8))
    }

    /// Pointer to `pointee`
    pub fn pointer_to(pointee: &Arc<TypeDescriptor>) -> Arc<Self> {
        let name = if pointee.name.ends_with('*') {
            format!("{}*", pointee.name)
        } else {
            format!("{} *", pointee.name)
        };
        Arc::new(Self {
            name,
            kind: TypeKind::Pointer,
            byte_size: 8,
            inner: Some(Arc::clone(pointee)),
            element_count: 0,
            fields: Vec::new(),
            superclasses: Vec::new(),
        })
    }

    /// Reference to `pointee`
    pub fn reference_to(pointee: &Arc<TypeDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            name: format!("{} &", pointee.name),
            kind: TypeKind::Reference,
            byte_size: 8,
            inner: Some(Arc::clone(pointee)),
            element_count: 0,
            fields: Vec::new(),
            superclasses: Vec::new(),
        })
    }

    /// Fixed-size array of `count` elements
    pub fn array_of(element: &Arc<TypeDescriptor>, count: u64) -> Arc<Self> {
        Arc::new(Self {
            name: format!("{} [{}]", element.name, count),
            kind: TypeKind::Array,
            byte_size: element.byte_size * count,
            inner: Some(Arc::clone(element)),
            element_count: count,
            fields: Vec::new(),
            superclasses: Vec::new(),
        })
    }

    /// Plain record
    pub fn record(name: impl Into<String>, byte_size: u64, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Struct,
            byte_size,
            inner: None,
            element_count: 0,
            fields,
            superclasses: Vec::new(),
        }
    }

    /// Class instance type; first word is the class pointer
    pub fn object(name: impl Into<String>, byte_size: u64, fields: Vec<Field>) -> Self {
        Self {
            kind: TypeKind::Object,
            ..Self::record(name, byte_size, fields)
        }
    }

    /// Attach the superclass chain (nearest first)
    pub fn with_superclasses<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.superclasses = chain.into_iter().map(Into::into).collect();
        self
    }

    /// Same layout under another name (typedefs such as `id`)
    pub fn renamed(&self, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            ..self.clone()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Pointee of a pointer or reference
    pub fn pointee(&self) -> Option<&Arc<TypeDescriptor>> {
        if self.is_pointer_like() {
            self.inner.as_ref()
        } else {
            None
        }
    }

    /// Element type of an array
    pub fn element(&self) -> Option<&Arc<TypeDescriptor>> {
        if self.kind == TypeKind::Array {
            self.inner.as_ref()
        } else {
            None
        }
    }

    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Superclass names, nearest first
    pub fn superclasses(&self) -> &[String] {
        &self.superclasses
    }

    pub fn is_pointer_like(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer | TypeKind::Reference)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Bool | TypeKind::Char | TypeKind::Signed | TypeKind::Unsigned | TypeKind::Float
        )
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Object | TypeKind::Array)
    }

    /// `char [N]`, rendered as a string
    pub fn is_char_array(&self) -> bool {
        self.element().is_some_and(|e| e.kind == TypeKind::Char)
    }

    /// Pointer whose pointee carries a class pointer
    pub fn is_object_pointer(&self) -> bool {
        self.pointee().is_some_and(|p| p.kind == TypeKind::Object)
    }

    /// Successive pointees: `T **` yields `T *`, then `T`
    pub fn pointee_chain(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> + '_ {
        std::iter::successors(self.pointee(), |ty| ty.pointee())
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
