// Append-only container writer: header + schema metadata, then one frame per record.
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::core::error::{Error, ErrorKind, SchemaError};
use crate::core::field::FieldDescriptor;
use crate::core::format::{ContainerHeader, HEADER_LEN, RECORD_COUNT_OFFSET};
use crate::core::frame;
use crate::core::record::RecordBuffer;
use crate::core::schema::Schema;

/// Writes records to a new container file.
///
/// `close` flushes buffered frames and stores the final record count in the header. Dropping
/// an unclosed writer closes it too, but any failure at that point is only logged; call
/// `close` explicitly to observe it.
pub struct ContainerWriter {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    schema: Schema,
    records: u64,
    bytes_written: u64,
}

impl ContainerWriter {
    pub fn create(path: impl AsRef<Path>, schema: Schema) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        schema.ensure_not_empty()?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|err| io_error(&path, err))?;
        file.try_lock_exclusive().map_err(|err| {
            io_error(&path, err)
                .with_message("container is locked by another writer")
                .with_hint("Only one writer may hold a container open at a time.")
        })?;
        file.set_len(0).map_err(|err| io_error(&path, err))?;

        let metadata = schema.to_metadata()?;
        let header = ContainerHeader::new(&metadata)?;
        let mut out = BufWriter::new(file);
        out.write_all(&header.encode())
            .and_then(|_| out.write_all(&metadata))
            .map_err(|err| io_error(&path, err))?;

        tracing::debug!(
            path = %path.display(),
            fields = schema.num_fields(),
            "created container"
        );

        Ok(Self {
            path,
            out: Some(out),
            schema,
            records: 0,
            bytes_written: (HEADER_LEN + metadata.len()) as u64,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_fields(&self) -> usize {
        self.schema.num_fields()
    }

    pub fn field(&self, index: usize) -> Result<&FieldDescriptor, Error> {
        self.schema.field(index)
    }

    pub fn num_records(&self) -> u64 {
        self.records
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes the record's current contents, including every variable-length payload it
    /// holds. Records filled without a preceding `reset` carry stale payloads along.
    pub fn append_record(&mut self, record: &RecordBuffer) -> Result<(), Error> {
        if record.layout() != self.schema.layout() {
            return Err(Error::new(ErrorKind::Schema(SchemaError::Mismatch))
                .with_message("record buffer was not created from this container's schema")
                .with_path(&self.path));
        }
        let Some(out) = self.out.as_mut() else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("container writer is closed")
                .with_path(&self.path));
        };
        let written = frame::write_frame(out, record)
            .map_err(|err| err.with_path(&self.path).with_record(self.records))?;
        self.records += 1;
        self.bytes_written += written as u64;
        Ok(())
    }

    /// Flushes pending frames and finalizes the header. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<(), Error> {
        let Some(out) = self.out.take() else {
            return Ok(());
        };
        finalize(out, self.records).map_err(|err| io_error(&self.path, err))?;
        tracing::debug!(
            path = %self.path.display(),
            records = self.records,
            bytes = self.bytes_written,
            "closed container"
        );
        Ok(())
    }
}

impl Drop for ContainerWriter {
    fn drop(&mut self) {
        if self.out.is_none() {
            return;
        }
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "implicit container close failed");
        }
    }
}

fn finalize(out: BufWriter<File>, records: u64) -> io::Result<()> {
    let mut file = out.into_inner().map_err(|err| err.into_error())?;
    file.seek(SeekFrom::Start(RECORD_COUNT_OFFSET))?;
    file.write_all(&records.to_le_bytes())?;
    file.flush()?;
    file.unlock()
}

fn io_error(path: &Path, err: io::Error) -> Error {
    Error::new(ErrorKind::Io).with_path(path).with_source(err)
}
