//! CFString-style string objects.
//!
//! Object layout (64-bit, little endian):
//!
//! ```text
//! +0   isa
//! +8   info byte
//! +16  inline:      u32 length, chars at +20   (explicit length)
//!                   u8 length,  chars at +17   (pascal)
//!      out-of-line: buffer pointer; u64 length at +24 when explicit,
//!                   otherwise the buffer starts with a length byte
//! ```
//!
//! Lengths count characters; unicode strings store UTF-16LE.

use std::sync::Arc;

use super::{SyntheticProvider, ProviderFactory};
use crate::error::{FormatterError, FormatterResult};
use crate::target::Target;
use crate::types::TypeDescriptor;
use crate::value::{quote_bytes, Scalar, Value};

const INFO_OFFSET: u64 = 8;
const CONTENTS_OFFSET: u64 = 16;

const FLAG_MUTABLE: u8 = 0x01;
const FLAG_HAS_LENGTH_BYTE: u8 = 0x04;
const FLAG_UNICODE: u8 = 0x10;
const MASK_NOT_INLINE: u8 = 0x60;

/// Longest string decoded, in characters
const MAX_LENGTH: u64 = 1 << 20;

const PROVIDER_NAME: &str = "cfstring";

/// Decoded string header and contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfStringContents {
    pub mutable: bool,
    pub inline: bool,
    pub explicit_length: bool,
    pub unicode: bool,
    /// UTF-8 bytes of the contents
    pub bytes: Vec<u8>,
}

/// Decode the string object at `address`
pub fn read_cfstring(target: &dyn Target, address: u64) -> FormatterResult<CfStringContents> {
    let info_address = offset(address, INFO_OFFSET)?;
    let info = target
        .read_memory(info_address, 1)?
        .first()
        .copied()
        .ok_or(FormatterError::MemoryRead {
            address: info_address,
            len: 1,
        })?;

    let mutable = info & FLAG_MUTABLE != 0;
    let explicit_length = info & FLAG_HAS_LENGTH_BYTE == 0;
    let unicode = info & FLAG_UNICODE != 0;
    let inline = info & MASK_NOT_INLINE == 0;

    let contents = offset(address, CONTENTS_OFFSET)?;
    let (length, chars) = match (inline, explicit_length) {
        (true, true) => (read_u32(target, contents)?, offset(contents, 4)?),
        (true, false) => (read_u8(target, contents)?, offset(contents, 1)?),
        (false, true) => (target.read_u64(offset(contents, 8)?)?, target.read_u64(contents)?),
        (false, false) => {
            let buffer = target.read_u64(contents)?;
            (read_u8(target, buffer)?, offset(buffer, 1)?)
        }
    };

    if length > MAX_LENGTH {
        return Err(FormatterError::provider(
            PROVIDER_NAME,
            format!("implausible length {} at 0x{:x}", length, address),
        ));
    }

    let bytes = if unicode {
        let raw = target.read_memory(chars, (length * 2) as usize)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units).into_bytes()
    } else {
        target.read_memory(chars, length as usize)?
    };

    Ok(CfStringContents {
        mutable,
        inline,
        explicit_length,
        unicode,
        bytes,
    })
}

/// `base + delta`, failing when it leaves the address space
fn offset(base: u64, delta: u64) -> FormatterResult<u64> {
    base.checked_add(delta).ok_or(FormatterError::MemoryRead {
        address: base,
        len: delta as usize,
    })
}

fn read_u8(target: &dyn Target, address: u64) -> FormatterResult<u64> {
    let bytes = target.read_memory(address, 1)?;
    bytes
        .first()
        .map(|b| u64::from(*b))
        .ok_or(FormatterError::MemoryRead { address, len: 1 })
}

fn read_u32(target: &dyn Target, address: u64) -> FormatterResult<u64> {
    let bytes = target.read_memory(address, 4)?;
    let word: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(FormatterError::MemoryRead { address, len: 4 })?;
    Ok(u64::from(u32::from_le_bytes(word)))
}

/// Address of the string object behind `value` (a pointer or the object itself)
fn object_address(value: &Value) -> FormatterResult<u64> {
    let address = if value.type_descriptor().is_pointer_like() {
        value.pointer_target()
    } else {
        value.address()
    };
    match address {
        Some(a) if a != 0 => Ok(a),
        _ => Err(FormatterError::provider(
            PROVIDER_NAME,
            format!("'{}' does not reference a string object", value.expression_path()),
        )),
    }
}

/// Native summary: `@"contents"`
pub fn cfstring_summary(value: &Value, target: &dyn Target) -> FormatterResult<String> {
    let contents = read_cfstring(target, object_address(value)?)?;
    Ok(format!("@{}", quote_bytes(&contents.bytes)))
}

const CHILD_NAMES: [&str; 4] = ["mutable", "inline", "explicit", "content"];

/// Presents a string object as `{mutable, inline, explicit, content}`
pub struct CfStringProvider {
    value: Value,
    contents: Option<CfStringContents>,
}

impl CfStringProvider {
    pub fn create(value: &Value) -> Box<dyn SyntheticProvider> {
        Box::new(Self {
            value: value.clone(),
            contents: None,
        })
    }

    pub fn factory() -> ProviderFactory {
        ProviderFactory::native(PROVIDER_NAME, Self::create)
    }

    fn flag(&self, name: &str, set: bool) -> Value {
        let int: Arc<TypeDescriptor> = TypeDescriptor::int();
        Value::scalar(name, &int, Scalar::Signed(i64::from(set))).with_parent(&self.value)
    }
}

impl SyntheticProvider for CfStringProvider {
    fn update(&mut self, target: &dyn Target) -> FormatterResult<()> {
        self.contents = None;
        let address = object_address(&self.value)?;
        self.contents = Some(read_cfstring(target, address)?);
        Ok(())
    }

    fn child_count(&self) -> usize {
        if self.contents.is_some() {
            CHILD_NAMES.len()
        } else {
            0
        }
    }

    fn child_at(&self, index: usize, _target: &dyn Target) -> FormatterResult<Value> {
        let contents = self
            .contents
            .as_ref()
            .ok_or(FormatterError::Index { index, count: 0 })?;
        match index {
            0 => Ok(self.flag("mutable", contents.mutable)),
            1 => Ok(self.flag("inline", contents.inline)),
            2 => Ok(self.flag("explicit", contents.explicit_length)),
            3 => Ok(Value::char_array("content", &contents.bytes).with_parent(&self.value)),
            _ => Err(FormatterError::Index {
                index,
                count: CHILD_NAMES.len(),
            }),
        }
    }

    fn index_of_child_named(&self, name: &str) -> Option<usize> {
        CHILD_NAMES.iter().position(|n| *n == name)
    }
}
