//! Value handles produced by the expression evaluator / memory collaborators.
//!
//! A `Value` is a cheap, clonable handle onto an immutable node: name, type,
//! optional load address, decoded contents and a weak back-reference to the
//! value it was reached from. The parent link exists only to print
//! expression paths such as `str12->mutable`; it never keeps a parent alive.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{FormatterError, FormatterResult};
use crate::target::Target;
use crate::types::{TypeDescriptor, TypeKind};

/// Decoded scalar contents
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Char(u8),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Scalar {
    /// Bit pattern as an unsigned integer (floats use their IEEE bits)
    pub fn as_u64(&self) -> u64 {
        match *self {
            Scalar::Bool(b) => u64::from(b),
            Scalar::Char(c) => u64::from(c),
            Scalar::Signed(v) => v as u64,
            Scalar::Unsigned(v) => v,
            Scalar::Float(v) => v.to_bits(),
        }
    }

    /// Numeric value as a signed integer (floats truncate)
    pub fn as_i64(&self) -> i64 {
        match *self {
            Scalar::Signed(v) => v,
            Scalar::Float(v) => v as i64,
            other => other.as_u64() as i64,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Char(c) => write!(f, "'{}'", escape_byte(*c)),
            Scalar::Signed(v) => write!(f, "{}", v),
            Scalar::Unsigned(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Decoded contents of a value
#[derive(Debug, Clone)]
pub enum ValueData {
    Scalar(Scalar),
    /// Pointer or reference; 0 is null
    Pointer(u64),
    /// Physical fields (records) or elements (arrays), in layout order
    Aggregate(Vec<Value>),
}

#[derive(Debug)]
struct ValueInner {
    name: String,
    ty: Arc<TypeDescriptor>,
    address: Option<u64>,
    data: ValueData,
    parent: Weak<ValueInner>,
}

/// Opaque handle to a typed, located runtime datum
#[derive(Debug, Clone)]
pub struct Value {
    inner: Arc<ValueInner>,
}

/// Identity used to key per-value caches
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueId {
    address: Option<u64>,
    type_name: String,
    /// Only used for values without an address
    path: Option<String>,
}

impl ValueId {
    pub fn address(&self) -> Option<u64> {
        self.address
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl Value {
    fn from_parts(
        name: String,
        ty: Arc<TypeDescriptor>,
        address: Option<u64>,
        data: ValueData,
        parent: Weak<ValueInner>,
    ) -> Self {
        Self {
            inner: Arc::new(ValueInner {
                name,
                ty,
                address,
                data,
                parent,
            }),
        }
    }

    /// Create a detached value (no address, no parent)
    pub fn new(name: impl Into<String>, ty: &Arc<TypeDescriptor>, data: ValueData) -> Self {
        Self::from_parts(name.into(), Arc::clone(ty), None, data, Weak::new())
    }

    /// Detached scalar
    pub fn scalar(name: impl Into<String>, ty: &Arc<TypeDescriptor>, scalar: Scalar) -> Self {
        Self::new(name, ty, ValueData::Scalar(scalar))
    }

    /// Detached pointer holding `target`
    pub fn pointer(name: impl Into<String>, ty: &Arc<TypeDescriptor>, target: u64) -> Self {
        Self::new(name, ty, ValueData::Pointer(target))
    }

    /// Detached aggregate
    pub fn aggregate(name: impl Into<String>, ty: &Arc<TypeDescriptor>, fields: Vec<Value>) -> Self {
        Self::new(name, ty, ValueData::Aggregate(fields))
    }

    /// `char [N]` holding `bytes` (no terminator added)
    pub fn char_array(name: impl Into<String>, bytes: &[u8]) -> Self {
        let char_ty = TypeDescriptor::char_type();
        let ty = TypeDescriptor::array_of(&char_ty, bytes.len() as u64);
        let elements = bytes
            .iter()
            .enumerate()
            .map(|(i, b)| Value::scalar(format!("[{}]", i), &char_ty, Scalar::Char(*b)))
            .collect();
        Self::aggregate(name, &ty, elements)
    }

    /// Same value located at `address`
    pub fn with_address(&self, address: u64) -> Self {
        Self::from_parts(
            self.inner.name.clone(),
            Arc::clone(&self.inner.ty),
            Some(address),
            self.inner.data.clone(),
            self.inner.parent.clone(),
        )
    }

    /// Same value reached from `parent`
    pub fn with_parent(&self, parent: &Value) -> Self {
        Self::from_parts(
            self.inner.name.clone(),
            Arc::clone(&self.inner.ty),
            self.inner.address,
            self.inner.data.clone(),
            Arc::downgrade(&parent.inner),
        )
    }

    /// Same value, linked to whatever `other` was reached from
    pub fn with_parent_of(&self, other: &Value) -> Self {
        Self::from_parts(
            self.inner.name.clone(),
            Arc::clone(&self.inner.ty),
            self.inner.address,
            self.inner.data.clone(),
            other.inner.parent.clone(),
        )
    }

    /// Same contents viewed as `ty`; only valid between layout-compatible
    /// types such as two pointer types
    pub fn retyped(&self, ty: &Arc<TypeDescriptor>) -> Self {
        Self::from_parts(
            self.inner.name.clone(),
            Arc::clone(ty),
            self.inner.address,
            self.inner.data.clone(),
            self.inner.parent.clone(),
        )
    }

    /// Same value under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::from_parts(
            name.into(),
            Arc::clone(&self.inner.ty),
            self.inner.address,
            self.inner.data.clone(),
            self.inner.parent.clone(),
        )
    }

    /// Decode a value of type `ty` from `bytes` loaded at `address`
    pub fn decode(
        name: impl Into<String>,
        ty: &Arc<TypeDescriptor>,
        address: u64,
        bytes: &[u8],
    ) -> FormatterResult<Self> {
        let name = name.into();
        let size = ty.byte_size() as usize;
        if bytes.len() < size {
            return Err(FormatterError::MemoryRead { address, len: size });
        }

        let data = match ty.kind() {
            TypeKind::Bool => ValueData::Scalar(Scalar::Bool(bytes[0] != 0)),
            TypeKind::Char => ValueData::Scalar(Scalar::Char(bytes[0])),
            TypeKind::Signed => ValueData::Scalar(Scalar::Signed(read_signed(bytes, size))),
            TypeKind::Unsigned => ValueData::Scalar(Scalar::Unsigned(read_unsigned(bytes, size))),
            TypeKind::Float => {
                let v = if size == 4 {
                    f64::from(f32::from_bits(read_unsigned(bytes, 4) as u32))
                } else {
                    f64::from_bits(read_unsigned(bytes, 8))
                };
                ValueData::Scalar(Scalar::Float(v))
            }
            TypeKind::Pointer | TypeKind::Reference => {
                ValueData::Pointer(read_unsigned(bytes, size.min(8)))
            }
            TypeKind::Struct | TypeKind::Object => {
                let mut fields = Vec::with_capacity(ty.fields().len());
                for field in ty.fields() {
                    let start = field.offset as usize;
                    let end = start + field.ty.byte_size() as usize;
                    let slice = bytes.get(start..end).ok_or(FormatterError::MemoryRead {
                        address: address + field.offset,
                        len: field.ty.byte_size() as usize,
                    })?;
                    fields.push(Self::decode(
                        field.name.clone(),
                        &field.ty,
                        address + field.offset,
                        slice,
                    )?);
                }
                ValueData::Aggregate(fields)
            }
            TypeKind::Array => {
                let element = ty.element().ok_or_else(|| {
                    FormatterError::invalid_value(&name, "array type without element type")
                })?;
                let stride = element.byte_size();
                let mut elements = Vec::with_capacity(ty.element_count() as usize);
                for i in 0..ty.element_count() {
                    let start = (i * stride) as usize;
                    elements.push(Self::decode(
                        format!("[{}]", i),
                        element,
                        address + i * stride,
                        &bytes[start..start + stride as usize],
                    )?);
                }
                ValueData::Aggregate(elements)
            }
        };

        Ok(Self::from_parts(
            name,
            Arc::clone(ty),
            Some(address),
            data,
            Weak::new(),
        ))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn type_descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.inner.ty
    }

    pub fn type_name(&self) -> &str {
        self.inner.ty.name()
    }

    /// Load address, if the value lives in target memory
    pub fn address(&self) -> Option<u64> {
        self.inner.address
    }

    pub fn data(&self) -> &ValueData {
        &self.inner.data
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self.inner.data {
            ValueData::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Address held by a pointer or reference
    pub fn pointer_target(&self) -> Option<u64> {
        match self.inner.data {
            ValueData::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// Scalar bits or pointer target
    pub fn as_u64(&self) -> Option<u64> {
        match self.inner.data {
            ValueData::Scalar(s) => Some(s.as_u64()),
            ValueData::Pointer(p) => Some(p),
            ValueData::Aggregate(_) => None,
        }
    }

    pub fn parent(&self) -> Option<Value> {
        self.inner.parent.upgrade().map(|inner| Value { inner })
    }

    /// Number of physical children
    pub fn child_count(&self) -> usize {
        match &self.inner.data {
            ValueData::Aggregate(fields) => fields.len(),
            _ => 0,
        }
    }

    /// Physical child at `index`
    pub fn child_at(&self, index: usize) -> Option<Value> {
        match &self.inner.data {
            ValueData::Aggregate(fields) => fields.get(index).map(|f| f.with_parent(self)),
            _ => None,
        }
    }

    /// Physical children, each linked back to this value
    pub fn children(&self) -> Vec<Value> {
        match &self.inner.data {
            ValueData::Aggregate(fields) => fields.iter().map(|f| f.with_parent(self)).collect(),
            _ => Vec::new(),
        }
    }

    /// Physical child by name
    pub fn field_named(&self, name: &str) -> Option<Value> {
        match &self.inner.data {
            ValueData::Aggregate(fields) => fields
                .iter()
                .find(|f| f.name() == name)
                .map(|f| f.with_parent(self)),
            _ => None,
        }
    }

    /// Follow a pointer or reference through `target`
    pub fn dereference(&self, target: &dyn Target) -> FormatterResult<Value> {
        let pointee = self.inner.ty.pointee().ok_or_else(|| {
            FormatterError::invalid_value(self.name(), "not a pointer or reference")
        })?;
        let address = self.pointer_target().unwrap_or(0);
        if address == 0 {
            return Err(FormatterError::MemoryRead {
                address: 0,
                len: pointee.byte_size() as usize,
            });
        }
        let value = target.value_at(&format!("*{}", self.name()), pointee, address)?;
        Ok(value.with_parent(self))
    }

    /// Raw bytes backing this value
    pub fn raw_bytes(&self, target: &dyn Target) -> FormatterResult<Vec<u8>> {
        if let Some(address) = self.inner.address {
            return target.read_memory(address, self.inner.ty.byte_size() as usize);
        }
        let size = self.inner.ty.byte_size() as usize;
        Ok(match &self.inner.data {
            ValueData::Scalar(s) => s.as_u64().to_le_bytes()[..size.min(8)].to_vec(),
            ValueData::Pointer(p) => p.to_le_bytes().to_vec(),
            ValueData::Aggregate(fields) => {
                let mut bytes = Vec::with_capacity(size);
                for field in fields {
                    bytes.extend(field.raw_bytes(target)?);
                }
                bytes
            }
        })
    }

    /// Bytes of a `char [N]` up to the first NUL
    pub fn c_string_bytes(&self) -> Option<Vec<u8>> {
        if !self.inner.ty.is_char_array() {
            return None;
        }
        let ValueData::Aggregate(elements) = &self.inner.data else {
            return None;
        };
        Some(
            elements
                .iter()
                .filter_map(|e| match e.as_scalar() {
                    Some(Scalar::Char(c)) => Some(c),
                    _ => None,
                })
                .take_while(|c| *c != 0)
                .collect(),
        )
    }

    /// Cache identity: address + type, or path + type for detached values
    pub fn id(&self) -> ValueId {
        ValueId {
            address: self.inner.address,
            type_name: self.type_name().to_string(),
            path: match self.inner.address {
                Some(_) => None,
                None => Some(self.expression_path()),
            },
        }
    }

    /// Expression that reaches this value, e.g. `list->next` or `pair.first`
    pub fn expression_path(&self) -> String {
        let Some(parent) = self.parent() else {
            return self.name().to_string();
        };
        if parent.type_descriptor().is_pointer_like() {
            // Dereference, pointer arithmetic, or a synthetic child of the pointer
            return if self.name().starts_with('*') {
                format!("*{}", parent.expression_path())
            } else if self.name().starts_with('[') {
                format!("{}{}", parent.expression_path(), self.name())
            } else {
                format!("{}->{}", parent.expression_path(), self.name())
            };
        }
        if let Some(grand) = parent
            .parent()
            .filter(|g| g.type_descriptor().is_pointer_like())
        {
            return format!("{}->{}", grand.expression_path(), self.name());
        }
        if self.name().starts_with('[') {
            format!("{}{}", parent.expression_path(), self.name())
        } else {
            format!("{}.{}", parent.expression_path(), self.name())
        }
    }
}

fn read_unsigned(bytes: &[u8], size: usize) -> u64 {
    let mut buf = [0u8; 8];
    let n = size.min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

fn read_signed(bytes: &[u8], size: usize) -> i64 {
    let raw = read_unsigned(bytes, size);
    match size {
        1 => raw as u8 as i8 as i64,
        2 => raw as u16 as i16 as i64,
        4 => raw as u32 as i32 as i64,
        _ => raw as i64,
    }
}

/// Escape one byte for display inside quotes; non-ASCII becomes `\xNN`
pub fn escape_byte(byte: u8) -> String {
    match byte {
        b'"' => "\\\"".to_string(),
        b'\\' => "\\\\".to_string(),
        b'\n' => "\\n".to_string(),
        b'\t' => "\\t".to_string(),
        b'\r' => "\\r".to_string(),
        0x20..=0x7e => (byte as char).to_string(),
        other => format!("\\x{:02x}", other),
    }
}

/// Quote and escape a byte string, e.g. `"caf\xc3\xa9"`
pub fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for b in bytes {
        out.push_str(&escape_byte(*b));
    }
    out.push('"');
    out
}
