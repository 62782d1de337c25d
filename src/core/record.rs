// Reusable per-record staging buffer: null bitmap, fixed region, and variable-length region.
//
// The variable region is append-only between calls to `reset`. Every set of a variable-length
// field appends a new payload; payloads written for a previous record stay in the buffer (and
// are serialized with the next record) until `reset` clears them. Callers reusing a buffer
// across records must call `reset` before setting the fields of each record.
use std::sync::Arc;

use crate::core::error::{Error, ErrorKind, FormatError, SchemaError};
use crate::core::field_type::FieldType;

pub const VAR_LEN_PREFIX: usize = 4;

/// Type and fixed-region offset of one field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LayoutSlot {
    pub field_type: FieldType,
    pub offset: usize,
}

/// Shape of a record built from one schema. Two layouts are equal only when every field has
/// the same type at the same offset, so a buffer never passes as another schema's record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecordLayout {
    slots: Arc<[LayoutSlot]>,
    fixed_len: usize,
}

impl RecordLayout {
    pub fn new(field_types: impl IntoIterator<Item = FieldType>) -> Self {
        let mut fixed_len = 0;
        let slots = field_types
            .into_iter()
            .map(|field_type| {
                let slot = LayoutSlot {
                    field_type,
                    offset: fixed_len,
                };
                fixed_len += field_type.inline_size();
                slot
            })
            .collect();
        Self { slots, fixed_len }
    }

    pub fn num_fields(&self) -> usize {
        self.slots.len()
    }

    pub fn fixed_len(&self) -> usize {
        self.fixed_len
    }

    pub fn null_bytes(&self) -> usize {
        self.slots.len().div_ceil(8)
    }

    pub fn slot(&self, index: usize) -> Option<LayoutSlot> {
        self.slots.get(index).copied()
    }
}

#[derive(Clone, Debug)]
pub struct RecordBuffer {
    layout: RecordLayout,
    nulls: Vec<u8>,
    fixed: Vec<u8>,
    var: Vec<u8>,
}

impl RecordBuffer {
    pub(crate) fn new(layout: RecordLayout) -> Self {
        Self {
            nulls: vec![0u8; layout.null_bytes()],
            fixed: vec![0u8; layout.fixed_len()],
            var: Vec::new(),
            layout,
        }
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Drops variable-length payloads and clears null flags. Fixed-width bytes are kept, so
    /// every field is logically undefined until it is set or nulled again.
    pub fn reset(&mut self) {
        self.var.clear();
        self.nulls.fill(0);
    }

    pub fn var_len(&self) -> usize {
        self.var.len()
    }

    /// Size of the record body as it is written to a container.
    pub fn encoded_len(&self) -> usize {
        self.nulls.len() + self.fixed.len() + self.var.len()
    }

    pub(crate) fn parts(&self) -> (&[u8], &[u8], &[u8]) {
        (&self.nulls, &self.fixed, &self.var)
    }

    /// Replaces the whole record with a decoded body, reusing the existing allocations.
    pub(crate) fn load(&mut self, nulls: &[u8], fixed: &[u8], var: &[u8]) -> Result<(), Error> {
        if nulls.len() != self.nulls.len() || fixed.len() != self.fixed.len() {
            return Err(Error::new(ErrorKind::Format(FormatError::CorruptRecord))
                .with_message("record body does not match schema layout"));
        }
        self.nulls.copy_from_slice(nulls);
        self.fixed.copy_from_slice(fixed);
        self.var.clear();
        self.var.extend_from_slice(var);
        Ok(())
    }

    pub(crate) fn is_null(&self, index: usize) -> Result<bool, Error> {
        self.check_index(index)?;
        Ok(self.nulls[index / 8] & (1 << (index % 8)) != 0)
    }

    pub(crate) fn set_null_flag(&mut self, index: usize, null: bool) -> Result<(), Error> {
        self.check_index(index)?;
        let mask = 1u8 << (index % 8);
        if null {
            self.nulls[index / 8] |= mask;
        } else {
            self.nulls[index / 8] &= !mask;
        }
        Ok(())
    }

    pub(crate) fn fixed_slot(&self, offset: usize, len: usize) -> Result<&[u8], Error> {
        offset
            .checked_add(len)
            .and_then(|end| self.fixed.get(offset..end))
            .ok_or_else(layout_mismatch)
    }

    pub(crate) fn fixed_slot_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8], Error> {
        offset
            .checked_add(len)
            .and_then(|end| self.fixed.get_mut(offset..end))
            .ok_or_else(layout_mismatch)
    }

    pub(crate) fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], Error> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.fixed_slot(offset, N)?);
        Ok(out)
    }

    pub(crate) fn write_array<const N: usize>(
        &mut self,
        offset: usize,
        bytes: [u8; N],
    ) -> Result<(), Error> {
        self.fixed_slot_mut(offset, N)?.copy_from_slice(&bytes);
        Ok(())
    }

    /// Appends a length-prefixed payload to the variable region and returns its offset.
    pub(crate) fn push_var(&mut self, payload: &[u8]) -> Result<u32, Error> {
        let too_large = || {
            Error::new(ErrorKind::Usage)
                .with_message("variable-length region exceeds 4 GiB")
                .with_hint("Call reset() on the record buffer before filling each record.")
        };
        let offset = u32::try_from(self.var.len()).map_err(|_| too_large())?;
        let len = u32::try_from(payload.len()).map_err(|_| too_large())?;
        let end = self.var.len() + VAR_LEN_PREFIX + payload.len();
        if u32::try_from(end).is_err() {
            return Err(too_large());
        }
        self.var.extend_from_slice(&len.to_le_bytes());
        self.var.extend_from_slice(payload);
        Ok(offset)
    }

    pub(crate) fn var_at(&self, offset: u32) -> Result<&[u8], Error> {
        let start = offset as usize;
        let prefix_end = start + VAR_LEN_PREFIX;
        let prefix = self.var.get(start..prefix_end).ok_or_else(dangling_var)?;
        let mut len = [0u8; VAR_LEN_PREFIX];
        len.copy_from_slice(prefix);
        let end = prefix_end
            .checked_add(u32::from_le_bytes(len) as usize)
            .ok_or_else(dangling_var)?;
        self.var.get(prefix_end..end).ok_or_else(dangling_var)
    }

    fn check_index(&self, index: usize) -> Result<(), Error> {
        if index >= self.layout.num_fields() {
            return Err(layout_mismatch());
        }
        Ok(())
    }
}

fn layout_mismatch() -> Error {
    Error::new(ErrorKind::Schema(SchemaError::Mismatch))
        .with_message("field slot is outside the record layout")
}

fn dangling_var() -> Error {
    Error::new(ErrorKind::Format(FormatError::CorruptRecord))
        .with_message("variable-length reference out of range")
}
