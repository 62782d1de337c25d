// Forward-only container reader that decodes each frame into one reused record buffer.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind, FormatError};
use crate::core::field::FieldDescriptor;
use crate::core::format::{ContainerHeader, HEADER_LEN};
use crate::core::frame;
use crate::core::record::RecordBuffer;
use crate::core::schema::Schema;

pub struct ContainerReader {
    path: PathBuf,
    input: BufReader<File>,
    schema: Schema,
    header: ContainerHeader,
    record: RecordBuffer,
    scratch: Vec<u8>,
    records_read: u64,
    finished: bool,
    failed: Option<ErrorKind>,
}

impl ContainerReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;
        let mut input = BufReader::new(file);

        let mut buf = [0u8; HEADER_LEN];
        read_header_bytes(&mut input, &mut buf).map_err(|err| err.with_path(&path))?;
        let header = ContainerHeader::decode(&buf).map_err(|err| err.with_path(&path))?;

        let mut metadata = vec![0u8; header.meta_len as usize];
        read_header_bytes(&mut input, &mut metadata).map_err(|err| err.with_path(&path))?;
        header
            .verify_metadata(&metadata)
            .map_err(|err| err.with_path(&path))?;
        let schema = Schema::from_metadata(&metadata).map_err(|err| err.with_path(&path))?;

        tracing::debug!(
            path = %path.display(),
            fields = schema.num_fields(),
            records = ?header.known_record_count(),
            "opened container"
        );

        let record = schema.create_record();
        Ok(Self {
            path,
            input,
            schema,
            header,
            record,
            scratch: Vec::new(),
            records_read: 0,
            finished: false,
            failed: None,
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

    /// Record count stored by the writer's `close`; `None` if the writer never closed.
    pub fn num_records(&self) -> Option<u64> {
        self.header.known_record_count()
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes the next record. `Ok(None)` marks the end of the stream and is returned again
    /// on every later call. After an error every later call fails with the same kind, so a
    /// corrupt stream never reads as a clean end.
    pub fn read_record(&mut self) -> Result<Option<&RecordBuffer>, Error> {
        if let Some(kind) = self.failed {
            return Err(Error::new(kind)
                .with_message(format!("reader failed at record {}", self.records_read))
                .with_hint("Reopen the container to read it again.")
                .with_path(&self.path));
        }
        if self.finished {
            return Ok(None);
        }
        match self.advance() {
            Ok(true) => Ok(Some(&self.record)),
            Ok(false) => {
                self.finished = true;
                tracing::debug!(
                    path = %self.path.display(),
                    records = self.records_read,
                    "reached end of container"
                );
                Ok(None)
            }
            Err(err) => {
                self.failed = Some(err.kind());
                Err(err.with_path(&self.path).with_record(self.records_read))
            }
        }
    }

    /// Loads the next frame into the record buffer; `false` at the end of the stream.
    fn advance(&mut self) -> Result<bool, Error> {
        let expected = self.header.known_record_count();
        if expected == Some(self.records_read) {
            return Ok(false);
        }
        if !frame::read_frame(&mut self.input, &mut self.scratch)? {
            if let Some(expected) = expected {
                return Err(Error::new(ErrorKind::Format(FormatError::CorruptRecord))
                    .with_message(format!(
                        "container ended after {} of {expected} records",
                        self.records_read
                    )));
            }
            return Ok(false);
        }
        frame::decode_frame(&self.scratch, &mut self.record)?;
        self.records_read += 1;
        Ok(true)
    }
}

fn read_header_bytes<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<(), Error> {
    input.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::new(ErrorKind::Format(FormatError::CorruptHeader))
                .with_message("file ends inside the header")
        } else {
            Error::new(ErrorKind::Io).with_source(err)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::ContainerReader;
    use crate::core::error::{ErrorKind, FormatError};
    use crate::core::field::FieldDescriptor;
    use crate::core::field_type::FieldType;
    use crate::core::format::{HEADER_LEN, RECORD_COUNT_OFFSET, UNKNOWN_RECORD_COUNT};
    use crate::core::schema::Schema;
    use crate::core::writer::ContainerWriter;
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};
    use std::path::Path;

    fn write_numbers(path: &Path, count: i32) {
        let schema = Schema::from_fields([
            FieldDescriptor::new("N", FieldType::Int32),
            FieldDescriptor::new("Label", FieldType::VarString),
        ])
        .expect("schema");
        let mut writer = ContainerWriter::create(path, schema).expect("create");
        let mut record = writer.schema().create_record();
        for n in 0..count {
            record.reset();
            writer.field(0).expect("n").set_from_int32(&mut record, n).expect("set");
            writer
                .field(1)
                .expect("label")
                .set_from_string(&mut record, &format!("#{n}"))
                .expect("set");
            writer.append_record(&record).expect("append");
        }
        writer.close().expect("close");
    }

    #[test]
    fn reads_until_end_of_stream() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("numbers.rcf");
        write_numbers(&path, 4);

        let mut reader = ContainerReader::open(&path).expect("open");
        assert_eq!(reader.num_fields(), 2);
        assert_eq!(reader.num_records(), Some(4));
        let schema = reader.schema().clone();
        let mut seen = Vec::new();
        while let Some(record) = reader.read_record().expect("read") {
            let n = schema.field(0).expect("n").get_as_int32(record).expect("get");
            seen.push(n.expect("not null"));
        }
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert!(reader.read_record().expect("again").is_none());
        assert_eq!(reader.records_read(), 4);
    }

    #[test]
    fn unfinalized_container_scans_to_eof() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("crashed.rcf");
        write_numbers(&path, 2);
        let mut file = OpenOptions::new().write(true).open(&path).expect("open");
        file.seek(SeekFrom::Start(RECORD_COUNT_OFFSET)).expect("seek");
        file.write_all(&UNKNOWN_RECORD_COUNT.to_le_bytes()).expect("write");
        drop(file);

        let mut reader = ContainerReader::open(&path).expect("open");
        assert_eq!(reader.num_records(), None);
        let mut count = 0;
        while reader.read_record().expect("read").is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn truncated_body_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("short.rcf");
        write_numbers(&path, 3);
        let len = std::fs::metadata(&path).expect("meta").len();
        let file = OpenOptions::new().write(true).open(&path).expect("open");
        file.set_len(len - 3).expect("truncate");
        drop(file);

        let mut reader = ContainerReader::open(&path).expect("open");
        assert!(reader.read_record().expect("first").is_some());
        assert!(reader.read_record().expect("second").is_some());
        let err = reader.read_record().err().expect("third is torn");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptRecord));
    }

    #[test]
    fn torn_tail_of_unfinalized_container_stays_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("torn.rcf");
        write_numbers(&path, 2);
        let mut file = OpenOptions::new().write(true).open(&path).expect("open");
        file.seek(SeekFrom::Start(RECORD_COUNT_OFFSET)).expect("seek");
        file.write_all(&UNKNOWN_RECORD_COUNT.to_le_bytes()).expect("write");
        let len = file.metadata().expect("meta").len();
        file.set_len(len - 3).expect("truncate");
        drop(file);

        let mut reader = ContainerReader::open(&path).expect("open");
        assert!(reader.read_record().expect("first").is_some());
        let err = reader.read_record().err().expect("second is torn");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptRecord));
        assert_eq!(err.record(), Some(1));
        for _ in 0..2 {
            let err = reader.read_record().err().expect("failure is sticky");
            assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptRecord));
        }
        assert_eq!(reader.records_read(), 1);
    }

    #[test]
    fn corrupt_header_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.rcf");
        write_numbers(&path, 1);
        let mut file = OpenOptions::new().write(true).open(&path).expect("open");
        file.seek(SeekFrom::Start(HEADER_LEN as u64 + 2)).expect("seek");
        file.write_all(b"#").expect("write");
        drop(file);

        let err = ContainerReader::open(&path).err().expect("corrupt");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptHeader));

        std::fs::write(&path, b"RCF").expect("write");
        let err = ContainerReader::open(&path).err().expect("short");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptHeader));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ContainerReader::open(dir.path().join("absent.rcf"))
            .err()
            .expect("missing");
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
