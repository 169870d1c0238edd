//! Binary buffers shared between host and script
//!
//! An [`ArrayBuffer`] is a fixed-size byte store. A [`BufferView`] is a window
//! onto one, optionally typed. Both sides of the bridge share the same backing
//! store; nothing is copied when a buffer crosses.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{HostError, HostResult};
use crate::object::ObjectId;

fn check_range(what: &str, offset: usize, length: usize, size: usize) -> HostResult<()> {
    if offset > size {
        return Err(HostError::Range(format!(
            "{} offset {} exceeds size {}",
            what, offset, size
        )));
    }
    if length > size - offset {
        return Err(HostError::Range(format!(
            "{} length {} at offset {} exceeds size {}",
            what, length, offset, size
        )));
    }
    Ok(())
}

// ============================================================================
// ArrayBuffer
// ============================================================================

struct BufferInner {
    id: ObjectId,
    bytes: RwLock<Vec<u8>>,
}

/// Fixed-size byte store
#[derive(Clone)]
pub struct ArrayBuffer(Arc<BufferInner>);

impl ArrayBuffer {
    /// Zero-filled buffer of `size` bytes
    pub fn new(size: usize) -> Self {
        Self::from_vec(vec![0; size])
    }

    /// Buffer owning `bytes`
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        ArrayBuffer(Arc::new(BufferInner {
            id: ObjectId::next(),
            bytes: RwLock::new(bytes),
        }))
    }

    /// Identity
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.0.bytes.read().len()
    }

    /// Is the buffer empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the contents
    pub fn get_bytes(&self) -> Vec<u8> {
        self.0.bytes.read().clone()
    }

    /// Copy `length` bytes at `offset` into `dest[dest_index..]`
    pub fn read(
        &self,
        offset: usize,
        length: usize,
        dest: &mut [u8],
        dest_index: usize,
    ) -> HostResult<usize> {
        let bytes = self.0.bytes.read();
        check_range("buffer", offset, length, bytes.len())?;
        check_range("destination", dest_index, length, dest.len())?;
        dest[dest_index..dest_index + length].copy_from_slice(&bytes[offset..offset + length]);
        Ok(length)
    }

    /// Copy `length` bytes from `src[src_index..]` into the buffer at `offset`
    pub fn write(
        &self,
        src: &[u8],
        src_index: usize,
        length: usize,
        offset: usize,
    ) -> HostResult<usize> {
        let mut bytes = self.0.bytes.write();
        check_range("buffer", offset, length, bytes.len())?;
        check_range("source", src_index, length, src.len())?;
        bytes[offset..offset + length].copy_from_slice(&src[src_index..src_index + length]);
        Ok(length)
    }

    /// Borrow the contents
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.0.bytes.read())
    }

    /// Same backing store?
    pub fn ptr_eq(&self, other: &ArrayBuffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ArrayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArrayBuffer({} bytes{})", self.len(), self.0.id)
    }
}

// ============================================================================
// Views
// ============================================================================

/// Element interpretation of a [`BufferView`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Untyped byte window
    DataView,
    /// `Int8Array`
    Int8,
    /// `Uint8Array`
    UInt8,
    /// `Int16Array`
    Int16,
    /// `Uint16Array`
    UInt16,
    /// `Int32Array`
    Int32,
    /// `Uint32Array`
    UInt32,
    /// `Float32Array`
    Float32,
    /// `Float64Array`
    Float64,
}

impl ViewKind {
    /// Element size in bytes
    pub fn element_size(self) -> usize {
        match self {
            ViewKind::DataView | ViewKind::Int8 | ViewKind::UInt8 => 1,
            ViewKind::Int16 | ViewKind::UInt16 => 2,
            ViewKind::Int32 | ViewKind::UInt32 | ViewKind::Float32 => 4,
            ViewKind::Float64 => 8,
        }
    }

    /// Script constructor name
    pub fn name(self) -> &'static str {
        match self {
            ViewKind::DataView => "DataView",
            ViewKind::Int8 => "Int8Array",
            ViewKind::UInt8 => "Uint8Array",
            ViewKind::Int16 => "Int16Array",
            ViewKind::UInt16 => "Uint16Array",
            ViewKind::Int32 => "Int32Array",
            ViewKind::UInt32 => "Uint32Array",
            ViewKind::Float32 => "Float32Array",
            ViewKind::Float64 => "Float64Array",
        }
    }
}

/// Window of `length` bytes at `offset` within an [`ArrayBuffer`]
#[derive(Clone)]
pub struct BufferView {
    buffer: ArrayBuffer,
    offset: usize,
    length: usize,
    kind: ViewKind,
}

impl BufferView {
    /// View over `buffer[offset..offset + length]`
    pub fn new(buffer: &ArrayBuffer, offset: usize, length: usize, kind: ViewKind) -> HostResult<Self> {
        check_range("view", offset, length, buffer.len())?;
        if length % kind.element_size() != 0 {
            return Err(HostError::Range(format!(
                "view length {} is not a multiple of {}",
                length,
                kind.element_size()
            )));
        }
        Ok(BufferView {
            buffer: buffer.clone(),
            offset,
            length,
            kind,
        })
    }

    /// View over the whole buffer
    pub fn whole(buffer: &ArrayBuffer, kind: ViewKind) -> HostResult<Self> {
        Self::new(buffer, 0, buffer.len(), kind)
    }

    /// Backing buffer
    pub fn buffer(&self) -> &ArrayBuffer {
        &self.buffer
    }

    /// Byte offset within the buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size in bytes
    pub fn byte_length(&self) -> usize {
        self.length
    }

    /// Number of elements
    pub fn element_count(&self) -> usize {
        self.length / self.kind.element_size()
    }

    /// Element interpretation
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// Copy of the viewed bytes
    pub fn get_bytes(&self) -> Vec<u8> {
        self.buffer
            .with_bytes(|b| b[self.offset..self.offset + self.length].to_vec())
    }

    /// Copy `length` bytes at view-relative `offset` into `dest[dest_index..]`
    pub fn read(
        &self,
        offset: usize,
        length: usize,
        dest: &mut [u8],
        dest_index: usize,
    ) -> HostResult<usize> {
        check_range("view", offset, length, self.length)?;
        self.buffer.read(self.offset + offset, length, dest, dest_index)
    }

    /// Copy `length` bytes from `src[src_index..]` into the view at `offset`
    pub fn write(
        &self,
        src: &[u8],
        src_index: usize,
        length: usize,
        offset: usize,
    ) -> HostResult<usize> {
        check_range("view", offset, length, self.length)?;
        self.buffer.write(src, src_index, length, self.offset + offset)
    }

    /// Element at `index`, widened to f64 (little-endian)
    pub fn get_element(&self, index: usize) -> HostResult<f64> {
        let size = self.kind.element_size();
        let mut raw = [0u8; 8];
        self.read(Self::element_offset(index, size)?, size, &mut raw, 0)?;
        Ok(match self.kind {
            ViewKind::DataView | ViewKind::UInt8 => raw[0] as f64,
            ViewKind::Int8 => raw[0] as i8 as f64,
            ViewKind::Int16 => i16::from_le_bytes([raw[0], raw[1]]) as f64,
            ViewKind::UInt16 => u16::from_le_bytes([raw[0], raw[1]]) as f64,
            ViewKind::Int32 => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
            ViewKind::UInt32 => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
            ViewKind::Float32 => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
            ViewKind::Float64 => f64::from_le_bytes(raw),
        })
    }

    /// Store `value` at `index`. Integral kinds wrap modulo their width.
    pub fn set_element(&self, index: usize, value: f64) -> HostResult<()> {
        let size = self.kind.element_size();
        let offset = Self::element_offset(index, size)?;
        let wrapped = wrap_integral(value);
        let raw: Vec<u8> = match self.kind {
            ViewKind::DataView | ViewKind::UInt8 | ViewKind::Int8 => vec![wrapped as u8],
            ViewKind::Int16 | ViewKind::UInt16 => (wrapped as u16).to_le_bytes().to_vec(),
            ViewKind::Int32 | ViewKind::UInt32 => (wrapped as u32).to_le_bytes().to_vec(),
            ViewKind::Float32 => (value as f32).to_le_bytes().to_vec(),
            ViewKind::Float64 => value.to_le_bytes().to_vec(),
        };
        self.write(&raw, 0, size, offset).map(|_| ())
    }

    fn element_offset(index: usize, size: usize) -> HostResult<usize> {
        index
            .checked_mul(size)
            .ok_or_else(|| HostError::Range(format!("element index {} out of range", index)))
    }
}

/// Truncate toward zero and reduce modulo 2^64; NaN and infinities become 0
fn wrap_integral(value: f64) -> u64 {
    if !value.is_finite() {
        return 0;
    }
    let truncated = value.trunc();
    if truncated.abs() < 9_223_372_036_854_775_808.0 {
        return truncated as i64 as u64;
    }
    truncated.rem_euclid(18_446_744_073_709_551_616.0) as u64
}

impl PartialEq for BufferView {
    fn eq(&self, other: &Self) -> bool {
        self.buffer.ptr_eq(&other.buffer)
            && self.offset == other.offset
            && self.length == other.length
            && self.kind == other.kind
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({:?}, {}..{})",
            self.kind.name(),
            self.buffer,
            self.offset,
            self.offset + self.length
        )
    }
}
