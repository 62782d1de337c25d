// Schema column descriptor with typed, coercing setters and getters over a record buffer.
use std::borrow::Cow;

use time::{Date, PrimitiveDateTime};

use crate::core::error::{Error, ErrorKind, FieldError, FormatError, SchemaError};
use crate::core::field_type::{FieldType, MAX_FIXED_STRING_LEN, is_binary, is_float};
use crate::core::record::{LayoutSlot, RecordBuffer};
use crate::core::value::{
    Value, date_from_julian, datetime_from_unix, datetime_to_unix, not_convertible,
};

pub const MAX_SCALE: u8 = 15;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Slot {
    pub index: usize,
    pub offset: usize,
}

/// One column of a [`Schema`](crate::core::schema::Schema).
///
/// Descriptors are built standalone and become usable against records once added to a schema,
/// which assigns the field's position in the null bitmap and its offset in the fixed region.
/// `FixedString` values are NUL-padded on disk, so setters reject text containing NUL.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    field_type: FieldType,
    max_len: Option<u32>,
    scale: Option<u8>,
    nullable: bool,
    slot: Option<Slot>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            max_len: None,
            scale: None,
            nullable: true,
            slot: None,
        }
    }

    /// Maximum length in characters of a `VarString` value; longer values are truncated.
    pub fn with_max_len(mut self, max_len: u32) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Digits after the decimal point when a float field is read as text.
    pub fn with_scale(mut self, scale: u8) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn max_len(&self) -> Option<u32> {
        self.max_len
    }

    pub fn scale(&self) -> Option<u8> {
        self.scale
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Bytes this field occupies in the fixed region of a record.
    pub fn byte_size(&self) -> usize {
        self.field_type.inline_size()
    }

    pub fn index(&self) -> Option<usize> {
        self.slot.map(|slot| slot.index)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::new(ErrorKind::Schema(SchemaError::InvalidName))
                .with_message("field name must not be empty"));
        }
        if let FieldType::FixedString(len) = self.field_type {
            if len == 0 || len > MAX_FIXED_STRING_LEN {
                return Err(invalid_type(format!(
                    "string size must be within 1..={MAX_FIXED_STRING_LEN}, got {len}"
                )));
            }
        }
        match (self.field_type, self.max_len) {
            (_, None) => {}
            (FieldType::VarString, Some(0)) => {
                return Err(invalid_type("v_string max length must be positive"));
            }
            (FieldType::VarString, Some(_)) => {}
            (other, Some(_)) => {
                return Err(invalid_type(format!(
                    "max length is not supported for {}",
                    other.tag()
                )));
            }
        }
        if let Some(scale) = self.scale {
            if !is_float(self.field_type) {
                return Err(invalid_type(format!(
                    "scale is not supported for {}",
                    self.field_type.tag()
                )));
            }
            if scale > MAX_SCALE {
                return Err(invalid_type(format!(
                    "scale must be at most {MAX_SCALE}, got {scale}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn bind(&mut self, slot: Slot) {
        self.slot = Some(slot);
    }

    pub fn set_from_bool(&self, record: &mut RecordBuffer, value: bool) -> Result<(), Error> {
        self.set_value(record, Value::Bool(value))
    }

    pub fn set_from_int32(&self, record: &mut RecordBuffer, value: i32) -> Result<(), Error> {
        self.set_value(record, Value::Int(i64::from(value)))
    }

    pub fn set_from_int64(&self, record: &mut RecordBuffer, value: i64) -> Result<(), Error> {
        self.set_value(record, Value::Int(value))
    }

    pub fn set_from_double(&self, record: &mut RecordBuffer, value: f64) -> Result<(), Error> {
        self.set_value(record, Value::Float64(value))
    }

    pub fn set_from_string(&self, record: &mut RecordBuffer, value: &str) -> Result<(), Error> {
        self.set_value(record, Value::Text(Cow::Borrowed(value)))
    }

    /// The only setter accepted by binary fields.
    pub fn set_from_bytes(&self, record: &mut RecordBuffer, value: &[u8]) -> Result<(), Error> {
        self.set_value(record, Value::Bytes(Cow::Borrowed(value)))
    }

    pub fn set_null(&self, record: &mut RecordBuffer) -> Result<(), Error> {
        let slot = self.bound_slot(record).map_err(|err| err.with_field(&self.name))?;
        if !self.nullable {
            return Err(Error::new(ErrorKind::Field(FieldError::NotNullable))
                .with_message("field does not accept null")
                .with_field(&self.name));
        }
        record.set_null_flag(slot.index, true)
    }

    pub fn set_value(&self, record: &mut RecordBuffer, value: Value<'_>) -> Result<(), Error> {
        self.store(record, &value)
            .map_err(|err| err.with_field(&self.name))
    }

    pub fn get_value<'r>(&self, record: &'r RecordBuffer) -> Result<Option<Value<'r>>, Error> {
        self.load(record).map_err(|err| err.with_field(&self.name))
    }

    pub fn get_as_bool(&self, record: &RecordBuffer) -> Result<Option<bool>, Error> {
        self.get_with(record, |value| value.to_bool())
    }

    /// Integers wider than `i32` saturate at the `i32` bounds.
    pub fn get_as_int32(&self, record: &RecordBuffer) -> Result<Option<i32>, Error> {
        self.get_with(record, |value| {
            value
                .to_i64()
                .map(|value| value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
        })
    }

    pub fn get_as_int64(&self, record: &RecordBuffer) -> Result<Option<i64>, Error> {
        self.get_with(record, |value| value.to_i64())
    }

    pub fn get_as_double(&self, record: &RecordBuffer) -> Result<Option<f64>, Error> {
        self.get_with(record, |value| value.to_f64())
    }

    /// Text form of the value. Binary fields fail with `FieldError::NotConvertible`.
    pub fn get_as_string<'r>(
        &self,
        record: &'r RecordBuffer,
    ) -> Result<Option<Cow<'r, str>>, Error> {
        let scale = self.scale;
        self.get_with(record, |value| match value {
            Value::Text(text) => Ok(text),
            other => other
                .to_text(scale)
                .map(|text| Cow::Owned(text.into_owned())),
        })
    }

    pub fn get_as_wide_string(&self, record: &RecordBuffer) -> Result<Option<Vec<u16>>, Error> {
        Ok(self
            .get_as_string(record)?
            .map(|text| text.encode_utf16().collect()))
    }

    /// Raw payload of a binary field; other field types fail with `FieldError::NotConvertible`.
    pub fn get_as_bytes<'r>(&self, record: &'r RecordBuffer) -> Result<Option<&'r [u8]>, Error> {
        if !is_binary(self.field_type) {
            return Err(not_convertible(self.field_type.tag(), "bytes").with_field(&self.name));
        }
        self.get_with(record, |value| match value {
            Value::Bytes(Cow::Borrowed(bytes)) => Ok(bytes),
            other => Err(not_convertible(other.kind_name(), "bytes")),
        })
    }

    pub fn get_as_date(&self, record: &RecordBuffer) -> Result<Option<Date>, Error> {
        self.get_with(record, |value| value.to_date())
    }

    pub fn get_as_datetime(
        &self,
        record: &RecordBuffer,
    ) -> Result<Option<PrimitiveDateTime>, Error> {
        self.get_with(record, |value| value.to_datetime())
    }

    fn get_with<'r, T>(
        &self,
        record: &'r RecordBuffer,
        convert: impl FnOnce(Value<'r>) -> Result<T, Error>,
    ) -> Result<Option<T>, Error> {
        let value = self.load(record).map_err(|err| err.with_field(&self.name))?;
        value
            .map(convert)
            .transpose()
            .map_err(|err| err.with_field(&self.name))
    }

    fn slot(&self) -> Result<Slot, Error> {
        self.slot.ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("field is not part of a schema")
                .with_field(&self.name)
        })
    }

    /// Slot of this field, checked against the record's layout: the record must come from a
    /// schema holding this field's type at the same index and offset.
    fn bound_slot(&self, record: &RecordBuffer) -> Result<Slot, Error> {
        let slot = self.slot()?;
        let expected = LayoutSlot {
            field_type: self.field_type,
            offset: slot.offset,
        };
        if record.layout().slot(slot.index) != Some(expected) {
            return Err(Error::new(ErrorKind::Schema(SchemaError::Mismatch))
                .with_message("record buffer was not created from this field's schema"));
        }
        Ok(slot)
    }

    fn store(&self, record: &mut RecordBuffer, value: &Value<'_>) -> Result<(), Error> {
        let Slot { index, offset } = self.bound_slot(record)?;
        match self.field_type {
            FieldType::Bool => {
                record.write_array(offset, [u8::from(value.to_bool()?)])?;
            }
            FieldType::Int16 => {
                let value = value.to_i64()?.clamp(i64::from(i16::MIN), i64::from(i16::MAX));
                record.write_array(offset, (value as i16).to_le_bytes())?;
            }
            FieldType::Int32 => {
                let value = value.to_i64()?.clamp(i64::from(i32::MIN), i64::from(i32::MAX));
                record.write_array(offset, (value as i32).to_le_bytes())?;
            }
            FieldType::Int64 => {
                record.write_array(offset, value.to_i64()?.to_le_bytes())?;
            }
            FieldType::Float32 => {
                let value = match value {
                    Value::Float32(value) => *value,
                    other => other.to_f64()? as f32,
                };
                record.write_array(offset, value.to_le_bytes())?;
            }
            FieldType::Float64 => {
                record.write_array(offset, value.to_f64()?.to_le_bytes())?;
            }
            FieldType::FixedString(len) => {
                let text = value.to_text(None)?;
                if text.contains('\0') {
                    return Err(Error::new(ErrorKind::Field(FieldError::NotConvertible))
                        .with_message("fixed-width strings cannot hold NUL characters"));
                }
                let bytes = truncate_bytes(&text, len as usize);
                let slot = record.fixed_slot_mut(offset, len as usize)?;
                slot.fill(0);
                slot[..bytes.len()].copy_from_slice(bytes);
            }
            FieldType::VarString => {
                let text = value.to_text(None)?;
                let text = truncate_chars(&text, self.max_len);
                let var_offset = record.push_var(text.as_bytes())?;
                record.write_array(offset, var_offset.to_le_bytes())?;
            }
            FieldType::VarBinary | FieldType::Blob => {
                let var_offset = record.push_var(value.as_bytes()?)?;
                record.write_array(offset, var_offset.to_le_bytes())?;
            }
            FieldType::Date => {
                let date = value.to_date()?;
                record.write_array(offset, date.to_julian_day().to_le_bytes())?;
            }
            FieldType::DateTime => {
                let seconds = datetime_to_unix(value.to_datetime()?);
                record.write_array(offset, seconds.to_le_bytes())?;
            }
        }
        record.set_null_flag(index, false)
    }

    fn load<'r>(&self, record: &'r RecordBuffer) -> Result<Option<Value<'r>>, Error> {
        let Slot { index, offset } = self.bound_slot(record)?;
        if record.is_null(index)? {
            return Ok(None);
        }
        let value = match self.field_type {
            FieldType::Bool => Value::Bool(record.read_array::<1>(offset)?[0] != 0),
            FieldType::Int16 => {
                Value::Int(i64::from(i16::from_le_bytes(record.read_array(offset)?)))
            }
            FieldType::Int32 => {
                Value::Int(i64::from(i32::from_le_bytes(record.read_array(offset)?)))
            }
            FieldType::Int64 => Value::Int(i64::from_le_bytes(record.read_array(offset)?)),
            FieldType::Float32 => Value::Float32(f32::from_le_bytes(record.read_array(offset)?)),
            FieldType::Float64 => Value::Float64(f64::from_le_bytes(record.read_array(offset)?)),
            FieldType::FixedString(len) => {
                let slot = record.fixed_slot(offset, len as usize)?;
                let end = slot.iter().rposition(|byte| *byte != 0).map_or(0, |pos| pos + 1);
                Value::Text(Cow::Borrowed(utf8(&slot[..end])?))
            }
            FieldType::VarString => {
                let var_offset = u32::from_le_bytes(record.read_array(offset)?);
                Value::Text(Cow::Borrowed(utf8(record.var_at(var_offset)?)?))
            }
            FieldType::VarBinary | FieldType::Blob => {
                let var_offset = u32::from_le_bytes(record.read_array(offset)?);
                Value::Bytes(Cow::Borrowed(record.var_at(var_offset)?))
            }
            FieldType::Date => {
                Value::Date(date_from_julian(i32::from_le_bytes(record.read_array(offset)?))?)
            }
            FieldType::DateTime => {
                Value::DateTime(datetime_from_unix(i64::from_le_bytes(record.read_array(offset)?))?)
            }
        };
        Ok(Some(value))
    }
}

fn invalid_type(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Schema(SchemaError::InvalidType)).with_message(message)
}

fn utf8(bytes: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(bytes).map_err(|err| {
        Error::new(ErrorKind::Format(FormatError::CorruptRecord))
            .with_message("string field is not valid UTF-8")
            .with_source(err)
    })
}

fn truncate_bytes(text: &str, max: usize) -> &[u8] {
    let mut end = max.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text.as_bytes()[..end]
}

fn truncate_chars(text: &str, max: Option<u32>) -> &str {
    let Some(max) = max else {
        return text;
    };
    match text.char_indices().nth(max as usize) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
