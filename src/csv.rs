//! Purpose: Export container records as RFC 4180 CSV text.
//! Exports: `rfc4180_escape`, `format_float`, `ExportOptions`, `CsvExporter`, `export_container`.
//! Role: Read-path consumer of the core; walks records through schema field descriptors only.
//! Invariants: Rows are emitted in `HeaderRow -> DataRows* -> Done` order; other orders fail.
//! Invariants: Binary cells are always empty; null cells are bare empty cells.
//! Invariants: Floats are rendered with `%g` semantics at the configured significant digits.
use std::io::Write;

use crate::core::error::{Error, ErrorKind};
use crate::core::field_type::{is_binary, is_float};
use crate::core::reader::ContainerReader;
use crate::core::record::RecordBuffer;
use crate::core::schema::Schema;

pub const DEFAULT_FLOAT_DIGITS: usize = 15;
pub const MAX_FLOAT_DIGITS: usize = 17;

/// Quotes `text` when it is empty or contains a comma, newline, or double quote.
pub fn rfc4180_escape(text: &str) -> String {
    if !text.is_empty() && !text.contains([',', '\n', '"']) {
        return text.to_string();
    }
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Renders `value` like C's `%.{digits}g`.
pub fn format_float(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let digits = digits.max(1);
    let scientific = format!("{:.*e}", digits - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= digits as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (digits as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.')
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExportOptions {
    pub float_digits: usize,
    pub header: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            float_digits: DEFAULT_FLOAT_DIGITS,
            header: true,
        }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> Result<(), Error> {
        if !(DEFAULT_FLOAT_DIGITS..=MAX_FLOAT_DIGITS).contains(&self.float_digits) {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "float digits must be within {DEFAULT_FLOAT_DIGITS}..={MAX_FLOAT_DIGITS}, got {}",
                self.float_digits
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportState {
    HeaderRow,
    DataRows,
    Done,
}

pub struct CsvExporter<W: Write> {
    out: W,
    options: ExportOptions,
    state: ExportState,
    rows: u64,
    line: String,
}

impl<W: Write> CsvExporter<W> {
    pub fn new(out: W, options: ExportOptions) -> Result<Self, Error> {
        options.validate()?;
        let state = if options.header {
            ExportState::HeaderRow
        } else {
            ExportState::DataRows
        };
        Ok(Self {
            out,
            options,
            state,
            rows: 0,
            line: String::new(),
        })
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn write_header(&mut self, schema: &Schema) -> Result<(), Error> {
        self.expect_state(ExportState::HeaderRow, "header row must come before any data row")?;
        self.line.clear();
        for (index, field) in schema.fields().iter().enumerate() {
            if index != 0 {
                self.line.push(',');
            }
            self.line.push_str(&rfc4180_escape(field.name()));
        }
        self.emit_line()?;
        self.state = ExportState::DataRows;
        Ok(())
    }

    pub fn write_record(&mut self, schema: &Schema, record: &RecordBuffer) -> Result<(), Error> {
        self.expect_state(ExportState::DataRows, "data rows must follow the header row")?;
        self.line.clear();
        for (index, field) in schema.fields().iter().enumerate() {
            if index != 0 {
                self.line.push(',');
            }
            let field_type = field.field_type();
            if is_binary(field_type) {
                continue;
            }
            if is_float(field_type) {
                if let Some(value) = field.get_as_double(record)? {
                    self.line
                        .push_str(&format_float(value, self.options.float_digits));
                }
            } else if let Some(text) = field.get_as_string(record)? {
                self.line.push_str(&rfc4180_escape(&text));
            }
        }
        self.emit_line()?;
        self.rows += 1;
        Ok(())
    }

    /// Flushes the output and returns the number of data rows written.
    pub fn finish(&mut self) -> Result<u64, Error> {
        if self.state == ExportState::Done {
            return Err(Error::new(ErrorKind::Usage).with_message("export already finished"));
        }
        self.out.flush().map_err(io_error)?;
        self.state = ExportState::Done;
        Ok(self.rows)
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn expect_state(&self, expected: ExportState, message: &str) -> Result<(), Error> {
        if self.state != expected {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("{message} (state: {:?})", self.state)));
        }
        Ok(())
    }

    fn emit_line(&mut self) -> Result<(), Error> {
        self.line.push('\n');
        self.out.write_all(self.line.as_bytes()).map_err(io_error)
    }
}

/// Writes every remaining record of `reader` to `out` and returns the number of data rows.
pub fn export_container<W: Write>(
    reader: &mut ContainerReader,
    out: W,
    options: ExportOptions,
) -> Result<u64, Error> {
    let schema = reader.schema().clone();
    let mut exporter = CsvExporter::new(out, options)?;
    if options.header {
        exporter.write_header(&schema)?;
    }
    while let Some(record) = reader.read_record()? {
        exporter.write_record(&schema, record)?;
    }
    let rows = exporter.finish()?;
    tracing::debug!(path = %reader.path().display(), rows, "exported container");
    Ok(rows)
}

fn io_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("failed to write csv output")
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{CsvExporter, ExportOptions, ExportState, format_float, rfc4180_escape};
    use crate::core::error::ErrorKind;
    use crate::core::field::FieldDescriptor;
    use crate::core::field_type::FieldType;
    use crate::core::schema::Schema;

    #[test]
    fn escaping_table() {
        let cases = [
            ("hello", "hello"),
            ("", "\"\""),
            ("a,b", "\"a,b\""),
            ("he said \"hi\"", "\"he said \"\"hi\"\"\""),
            ("line1\nline2", "\"line1\nline2\""),
        ];
        for (input, expected) in cases {
            assert_eq!(rfc4180_escape(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn floats_use_general_notation() {
        let cases = [
            (3.14, "3.14"),
            (0.1 + 0.2, "0.3"),
            (100.0, "100"),
            (-2.5, "-2.5"),
            (1234567890123456.0, "1.23456789012346e+15"),
            (0.0001, "0.0001"),
            (0.00001234, "1.234e-05"),
            (123456789012345.0, "123456789012345"),
            (1.0 / 3.0, "0.333333333333333"),
            (0.0, "0"),
            (f64::INFINITY, "inf"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_float(value, 15), expected, "value {value}");
        }
        assert_eq!(format_float(0.1 + 0.2, 17), "0.30000000000000004");
    }

    fn schema() -> Schema {
        Schema::from_fields([
            FieldDescriptor::new("Number", FieldType::Float64),
            FieldDescriptor::new("English", FieldType::VarString),
            FieldDescriptor::new("Raw", FieldType::VarBinary),
            FieldDescriptor::new("Count", FieldType::Int32),
        ])
        .expect("schema")
    }

    #[test]
    fn rows_follow_schema_order_and_omit_binary() {
        let schema = schema();
        let mut record = schema.create_record();
        let mut exporter =
            CsvExporter::new(Vec::new(), ExportOptions::default()).expect("exporter");
        exporter.write_header(&schema).expect("header");

        record.reset();
        schema.field(0).expect("f").set_from_int32(&mut record, 7).expect("set");
        schema.field(1).expect("f").set_from_string(&mut record, "seven, ok").expect("set");
        schema.field(2).expect("f").set_from_bytes(&mut record, b"secret").expect("set");
        schema.field(3).expect("f").set_null(&mut record).expect("set");
        exporter.write_record(&schema, &record).expect("row");

        record.reset();
        schema.field(0).expect("f").set_from_double(&mut record, 0.5).expect("set");
        schema.field(1).expect("f").set_from_string(&mut record, "").expect("set");
        schema.field(2).expect("f").set_from_bytes(&mut record, b"").expect("set");
        schema.field(3).expect("f").set_from_int32(&mut record, -1).expect("set");
        exporter.write_record(&schema, &record).expect("row");

        assert_eq!(exporter.finish().expect("finish"), 2);
        let text = String::from_utf8(exporter.into_inner()).expect("utf8");
        assert_eq!(
            text,
            "Number,English,Raw,Count\n7,\"seven, ok\",,\n0.5,\"\",,-1\n"
        );
    }

    #[test]
    fn state_machine_rejects_out_of_order_calls() {
        let schema = schema();
        let record = schema.create_record();
        let mut exporter =
            CsvExporter::new(Vec::new(), ExportOptions::default()).expect("exporter");
        assert_eq!(exporter.state(), ExportState::HeaderRow);
        let err = exporter.write_record(&schema, &record).expect_err("no header yet");
        assert_eq!(err.kind(), ErrorKind::Usage);

        exporter.write_header(&schema).expect("header");
        let err = exporter.write_header(&schema).expect_err("header twice");
        assert_eq!(err.kind(), ErrorKind::Usage);

        exporter.finish().expect("finish");
        assert_eq!(exporter.state(), ExportState::Done);
        assert_eq!(exporter.finish().expect_err("twice").kind(), ErrorKind::Usage);
    }

    #[test]
    fn options_are_validated() {
        let options = ExportOptions {
            float_digits: 6,
            header: true,
        };
        let err = CsvExporter::new(Vec::new(), options).err().expect("digits");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let options = ExportOptions {
            float_digits: 15,
            header: false,
        };
        let exporter = CsvExporter::new(Vec::new(), options).expect("exporter");
        assert_eq!(exporter.state(), ExportState::DataRows);
    }
}
