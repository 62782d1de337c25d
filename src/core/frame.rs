// Record frame layout: u32 body length, then null bitmap, fixed region, variable region.
use std::io::{self, Read, Write};

use crate::core::error::{Error, ErrorKind, FormatError};
use crate::core::record::RecordBuffer;

pub const FRAME_LEN_PREFIX: usize = 4;
pub const MAX_BODY_LEN: usize = 256 * 1024 * 1024;

pub fn body_len(record: &RecordBuffer) -> Result<u32, Error> {
    let len = record.encoded_len();
    if len > MAX_BODY_LEN {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("record body of {len} bytes exceeds max {MAX_BODY_LEN}"))
            .with_hint("Call reset() on the record buffer before filling each record."));
    }
    Ok(len as u32)
}

/// Writes one frame and returns the number of bytes written.
pub fn write_frame<W: Write>(out: &mut W, record: &RecordBuffer) -> Result<usize, Error> {
    let len = body_len(record)?;
    let (nulls, fixed, var) = record.parts();
    let write = |out: &mut W| -> io::Result<()> {
        out.write_all(&len.to_le_bytes())?;
        out.write_all(nulls)?;
        out.write_all(fixed)?;
        out.write_all(var)
    };
    write(out).map_err(|err| Error::new(ErrorKind::Io).with_source(err))?;
    Ok(FRAME_LEN_PREFIX + len as usize)
}

/// Reads the next frame body into `scratch`. Returns `false` on a clean end of stream.
pub fn read_frame<R: Read>(input: &mut R, scratch: &mut Vec<u8>) -> Result<bool, Error> {
    let Some(prefix) = read_prefix(input)? else {
        return Ok(false);
    };
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_BODY_LEN {
        return Err(corrupt("record length exceeds max"));
    }
    scratch.clear();
    scratch.resize(len, 0);
    input.read_exact(scratch).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            corrupt("truncated record body")
        } else {
            Error::new(ErrorKind::Io).with_source(err)
        }
    })?;
    Ok(true)
}

pub fn decode_frame(body: &[u8], record: &mut RecordBuffer) -> Result<(), Error> {
    let fixed_len = record.layout().fixed_len();
    let null_bytes = record.layout().null_bytes();
    if body.len() < null_bytes + fixed_len {
        return Err(corrupt("record body shorter than fixed layout"));
    }
    let (nulls, rest) = body.split_at(null_bytes);
    let (fixed, var) = rest.split_at(fixed_len);
    record.load(nulls, fixed, var)
}

fn read_prefix<R: Read>(input: &mut R) -> Result<Option<[u8; FRAME_LEN_PREFIX]>, Error> {
    let mut buf = [0u8; FRAME_LEN_PREFIX];
    let mut filled = 0;
    while filled < FRAME_LEN_PREFIX {
        match input.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(corrupt("truncated record length")),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::new(ErrorKind::Io).with_source(err)),
        }
    }
    Ok(Some(buf))
}

fn corrupt(message: &str) -> Error {
    Error::new(ErrorKind::Format(FormatError::CorruptRecord)).with_message(message)
}

#[cfg(test)]
mod tests {
    use super::{FRAME_LEN_PREFIX, decode_frame, read_frame, write_frame};
    use crate::core::error::{ErrorKind, FormatError};
    use crate::core::field_type::FieldType;
    use crate::core::record::{RecordBuffer, RecordLayout};
    use std::io::Cursor;

    fn layout() -> RecordLayout {
        RecordLayout::new([FieldType::Int32, FieldType::VarString])
    }

    #[test]
    fn frame_survives_write_and_read() {
        let mut record = RecordBuffer::new(layout());
        record.write_array(0, 41i32.to_le_bytes()).expect("fixed");
        let offset = record.push_var(b"forty-one").expect("var");
        record.write_array(4, offset.to_le_bytes()).expect("ref");
        record.set_null_flag(1, true).expect("null");

        let mut bytes = Vec::new();
        let written = write_frame(&mut bytes, &record).expect("write");
        assert_eq!(written, bytes.len());
        assert_eq!(written, FRAME_LEN_PREFIX + record.encoded_len());

        let mut input = Cursor::new(bytes);
        let mut scratch = Vec::new();
        assert!(read_frame(&mut input, &mut scratch).expect("read"));
        let mut decoded = RecordBuffer::new(layout());
        decode_frame(&scratch, &mut decoded).expect("decode");
        assert_eq!(decoded.read_array::<4>(0).expect("fixed"), 41i32.to_le_bytes());
        assert_eq!(decoded.var_at(offset).expect("var"), b"forty-one");
        assert!(decoded.is_null(1).expect("null"));

        assert!(!read_frame(&mut input, &mut scratch).expect("eof"));
    }

    #[test]
    fn truncated_frames_are_corrupt() {
        let record = RecordBuffer::new(layout());
        let mut bytes = Vec::new();
        write_frame(&mut bytes, &record).expect("write");

        let mut scratch = Vec::new();
        let err = read_frame(&mut Cursor::new(&bytes[..2]), &mut scratch).expect_err("prefix");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptRecord));

        let err = read_frame(&mut Cursor::new(&bytes[..bytes.len() - 1]), &mut scratch)
            .expect_err("body");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptRecord));
    }

    #[test]
    fn short_body_is_rejected_on_decode() {
        let mut record = RecordBuffer::new(layout());
        let err = decode_frame(&[0u8; 4], &mut record).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Format(FormatError::CorruptRecord));
    }
}
