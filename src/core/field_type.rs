// Closed set of storable field types, their on-disk footprints, and type predicates.
use crate::core::error::{Error, ErrorKind, SchemaError};

/// Inline width of a variable-length field: a `u32` offset into the record's variable region.
pub const VAR_REF_LEN: usize = 4;
pub const MAX_FIXED_STRING_LEN: u32 = u16::MAX as u32;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FieldType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    FixedString(u32),
    VarString,
    VarBinary,
    Date,
    DateTime,
    Blob,
}

impl FieldType {
    /// Bytes the value itself occupies inline; 0 for variable-length kinds.
    pub fn fixed_size(self) -> usize {
        match self {
            FieldType::Bool => 1,
            FieldType::Int16 => 2,
            FieldType::Int32 => 4,
            FieldType::Int64 => 8,
            FieldType::Float32 => 4,
            FieldType::Float64 => 8,
            FieldType::FixedString(len) => len as usize,
            FieldType::VarString | FieldType::VarBinary | FieldType::Blob => 0,
            FieldType::Date => 4,
            FieldType::DateTime => 8,
        }
    }

    /// Bytes reserved in the fixed region, including the offset slot of variable-length kinds.
    pub fn inline_size(self) -> usize {
        if self.is_variable() {
            VAR_REF_LEN
        } else {
            self.fixed_size()
        }
    }

    pub fn is_variable(self) -> bool {
        matches!(
            self,
            FieldType::VarString | FieldType::VarBinary | FieldType::Blob
        )
    }

    pub fn tag(self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Float32 => "float",
            FieldType::Float64 => "double",
            FieldType::FixedString(_) => "string",
            FieldType::VarString => "v_string",
            FieldType::VarBinary => "v_binary",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Blob => "blob",
        }
    }

    /// Inverse of [`FieldType::tag`]; `size` carries the width of `string` columns.
    pub fn from_tag(tag: &str, size: Option<u32>) -> Result<Self, Error> {
        let field_type = match tag {
            "bool" => FieldType::Bool,
            "int16" => FieldType::Int16,
            "int32" => FieldType::Int32,
            "int64" => FieldType::Int64,
            "float" => FieldType::Float32,
            "double" => FieldType::Float64,
            "string" => {
                let len = size.ok_or_else(|| {
                    Error::new(ErrorKind::Schema(SchemaError::InvalidType))
                        .with_message("string type requires a size")
                })?;
                FieldType::FixedString(len)
            }
            "v_string" => FieldType::VarString,
            "v_binary" => FieldType::VarBinary,
            "date" => FieldType::Date,
            "datetime" => FieldType::DateTime,
            "blob" => FieldType::Blob,
            other => {
                return Err(Error::new(ErrorKind::Schema(SchemaError::InvalidType))
                    .with_message(format!("unknown field type tag `{other}`")));
            }
        };
        Ok(field_type)
    }
}

pub fn is_binary(field_type: FieldType) -> bool {
    matches!(field_type, FieldType::VarBinary | FieldType::Blob)
}

pub fn is_float(field_type: FieldType) -> bool {
    matches!(field_type, FieldType::Float32 | FieldType::Float64)
}
