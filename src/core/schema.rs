// Ordered field list, record layout, and the canonical metadata blob stored in container headers.
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind, FormatError, SchemaError};
use crate::core::field::{FieldDescriptor, Slot};
use crate::core::field_type::FieldType;
use crate::core::record::{RecordBuffer, RecordLayout};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    layout: RecordLayout,
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaMeta {
    fields: Vec<FieldMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldMeta {
    name: String,
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<u8>,
    #[serde(default = "default_nullable")]
    nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: impl IntoIterator<Item = FieldDescriptor>) -> Result<Self, Error> {
        let mut schema = Self::new();
        for field in fields {
            schema.add_field(field)?;
        }
        Ok(schema)
    }

    /// Appends a field and returns its index. Names are unique ignoring case.
    pub fn add_field(&mut self, mut field: FieldDescriptor) -> Result<usize, Error> {
        field.validate().map_err(|err| err.with_field(field.name()))?;
        let folded = field.name().to_lowercase();
        if self
            .fields
            .iter()
            .any(|existing| existing.name().to_lowercase() == folded)
        {
            return Err(Error::new(ErrorKind::Schema(SchemaError::DuplicateName))
                .with_message("field name already used (names are case-insensitive)")
                .with_field(field.name()));
        }

        let index = self.fields.len();
        field.bind(Slot {
            index,
            offset: self.layout.fixed_len(),
        });
        self.fields.push(field);
        self.layout = RecordLayout::new(self.fields.iter().map(|field| field.field_type()));
        Ok(index)
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> Result<&FieldDescriptor, Error> {
        self.fields.get(index).ok_or_else(|| {
            Error::new(ErrorKind::Schema(SchemaError::IndexOutOfRange)).with_message(format!(
                "field index {index} out of range (num fields: {})",
                self.fields.len()
            ))
        })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        let folded = name.to_lowercase();
        self.fields
            .iter()
            .position(|field| field.name().to_lowercase() == folded)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index_of(name).map(|index| &self.fields[index])
    }

    pub fn fixed_len(&self) -> usize {
        self.layout.fixed_len()
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn create_record(&self) -> RecordBuffer {
        RecordBuffer::new(self.layout.clone())
    }

    pub(crate) fn ensure_not_empty(&self) -> Result<(), Error> {
        if self.fields.is_empty() {
            return Err(Error::new(ErrorKind::Schema(SchemaError::Empty))
                .with_message("schema has no fields"));
        }
        Ok(())
    }

    /// Compact JSON description of every field, in declared order.
    pub fn to_metadata(&self) -> Result<Vec<u8>, Error> {
        let meta = SchemaMeta {
            fields: self
                .fields
                .iter()
                .map(|field| FieldMeta {
                    name: field.name().to_string(),
                    type_tag: field.field_type().tag().to_string(),
                    size: match field.field_type() {
                        FieldType::FixedString(len) => Some(len),
                        _ => field.max_len(),
                    },
                    scale: field.scale(),
                    nullable: field.is_nullable(),
                })
                .collect(),
        };
        serde_json::to_vec(&meta).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode schema metadata")
                .with_source(err)
        })
    }

    /// Parses a metadata blob; any malformed or invalid content is `FormatError::CorruptHeader`.
    pub fn from_metadata(bytes: &[u8]) -> Result<Self, Error> {
        let corrupt = |message: &str| {
            Error::new(ErrorKind::Format(FormatError::CorruptHeader))
                .with_message(message.to_string())
        };
        let meta: SchemaMeta = serde_json::from_slice(bytes)
            .map_err(|err| corrupt("malformed schema metadata").with_source(err))?;

        let mut schema = Schema::new();
        for field in meta.fields {
            let descriptor = descriptor_from_meta(field)
                .map_err(|err| corrupt("invalid field in schema metadata").with_source(err))?;
            schema
                .add_field(descriptor)
                .map_err(|err| corrupt("invalid field in schema metadata").with_source(err))?;
        }
        if schema.is_empty() {
            return Err(corrupt("schema metadata has no fields"));
        }
        Ok(schema)
    }
}

fn descriptor_from_meta(meta: FieldMeta) -> Result<FieldDescriptor, Error> {
    let field_type = FieldType::from_tag(&meta.type_tag, meta.size)?;
    let mut field = FieldDescriptor::new(meta.name, field_type).with_nullable(meta.nullable);
    match (field_type, meta.size) {
        (FieldType::FixedString(_), _) | (_, None) => {}
        (FieldType::VarString, Some(max_len)) => field = field.with_max_len(max_len),
        (other, Some(_)) => {
            return Err(Error::new(ErrorKind::Schema(SchemaError::InvalidType))
                .with_message(format!("size is not supported for {}", other.tag())));
        }
    }
    if let Some(scale) = meta.scale {
        field = field.with_scale(scale);
    }
    Ok(field)
}
