// Typed field values and the cross-type coercions applied by field setters and getters.
use std::borrow::Cow;

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::core::error::{Error, ErrorKind, FieldError, FormatError};

#[derive(Clone, Debug, PartialEq)]
pub enum Value<'a> {
    Bool(bool),
    Int(i64),
    Float32(f32),
    Float64(f64),
    Text(Cow<'a, str>),
    Date(Date),
    DateTime(PrimitiveDateTime),
    Bytes(Cow<'a, [u8]>),
}

impl<'a> Value<'a> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float32(_) | Value::Float64(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Bytes(_) => "bytes",
        }
    }

    pub fn to_bool(&self) -> Result<bool, Error> {
        match self {
            Value::Bool(value) => Ok(*value),
            Value::Int(value) => Ok(*value != 0),
            Value::Float32(value) => Ok(*value != 0.0),
            Value::Float64(value) => Ok(*value != 0.0),
            Value::Text(text) => parse_bool(text),
            Value::Date(_) | Value::DateTime(_) | Value::Bytes(_) => {
                Err(not_convertible(self.kind_name(), "bool"))
            }
        }
    }

    pub fn to_i64(&self) -> Result<i64, Error> {
        match self {
            Value::Bool(value) => Ok(i64::from(*value)),
            Value::Int(value) => Ok(*value),
            Value::Float32(value) => float_to_i64(f64::from(*value)),
            Value::Float64(value) => float_to_i64(*value),
            Value::Text(text) => parse_i64(text),
            Value::Date(_) | Value::DateTime(_) | Value::Bytes(_) => {
                Err(not_convertible(self.kind_name(), "integer"))
            }
        }
    }

    pub fn to_f64(&self) -> Result<f64, Error> {
        match self {
            Value::Bool(value) => Ok(if *value { 1.0 } else { 0.0 }),
            Value::Int(value) => Ok(*value as f64),
            Value::Float32(value) => Ok(f64::from(*value)),
            Value::Float64(value) => Ok(*value),
            Value::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| not_convertible_text(text, "float")),
            Value::Date(_) | Value::DateTime(_) | Value::Bytes(_) => {
                Err(not_convertible(self.kind_name(), "float"))
            }
        }
    }

    /// Canonical text form; `scale` fixes the digits after the decimal point of floats.
    pub fn to_text(&self, scale: Option<u8>) -> Result<Cow<'_, str>, Error> {
        let text = match self {
            Value::Bool(true) => Cow::Borrowed("true"),
            Value::Bool(false) => Cow::Borrowed("false"),
            Value::Int(value) => Cow::Owned(value.to_string()),
            Value::Float32(value) => Cow::Owned(match scale {
                Some(scale) => format!("{:.*}", usize::from(scale), value),
                None => value.to_string(),
            }),
            Value::Float64(value) => Cow::Owned(match scale {
                Some(scale) => format!("{:.*}", usize::from(scale), value),
                None => value.to_string(),
            }),
            Value::Text(text) => Cow::Borrowed(text.as_ref()),
            Value::Date(date) => Cow::Owned(format_date(*date)),
            Value::DateTime(datetime) => Cow::Owned(format_datetime(*datetime)),
            Value::Bytes(_) => return Err(not_convertible("bytes", "text")),
        };
        Ok(text)
    }

    pub fn to_date(&self) -> Result<Date, Error> {
        match self {
            Value::Date(date) => Ok(*date),
            Value::DateTime(datetime) => Ok(datetime.date()),
            Value::Text(text) => parse_date(text.trim()),
            Value::Bool(_)
            | Value::Int(_)
            | Value::Float32(_)
            | Value::Float64(_)
            | Value::Bytes(_) => Err(not_convertible(self.kind_name(), "date")),
        }
    }

    pub fn to_datetime(&self) -> Result<PrimitiveDateTime, Error> {
        match self {
            Value::Date(date) => Ok(date.midnight()),
            Value::DateTime(datetime) => Ok(*datetime),
            Value::Text(text) => parse_datetime(text.trim()),
            Value::Bool(_)
            | Value::Int(_)
            | Value::Float32(_)
            | Value::Float64(_)
            | Value::Bytes(_) => Err(not_convertible(self.kind_name(), "datetime")),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], Error> {
        match self {
            Value::Bytes(bytes) => Ok(bytes.as_ref()),
            _ => Err(not_convertible(self.kind_name(), "bytes")),
        }
    }

    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Bool(value) => Value::Bool(value),
            Value::Int(value) => Value::Int(value),
            Value::Float32(value) => Value::Float32(value),
            Value::Float64(value) => Value::Float64(value),
            Value::Text(text) => Value::Text(Cow::Owned(text.into_owned())),
            Value::Date(date) => Value::Date(date),
            Value::DateTime(datetime) => Value::DateTime(datetime),
            Value::Bytes(bytes) => Value::Bytes(Cow::Owned(bytes.into_owned())),
        }
    }
}

pub(crate) fn not_convertible(from: &str, to: &str) -> Error {
    Error::new(ErrorKind::Field(FieldError::NotConvertible))
        .with_message(format!("cannot convert {from} to {to}"))
}

fn not_convertible_text(text: &str, to: &str) -> Error {
    Error::new(ErrorKind::Field(FieldError::NotConvertible))
        .with_message(format!("cannot parse {text:?} as {to}"))
}

/// Truncates toward zero; out-of-range values saturate at the `i64` bounds.
fn float_to_i64(value: f64) -> Result<i64, Error> {
    if value.is_nan() {
        return Err(not_convertible("NaN", "integer"));
    }
    Ok(value.trunc() as i64)
}

fn parse_i64(text: &str) -> Result<i64, Error> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| not_convertible_text(text, "integer"))?;
    float_to_i64(value)
}

fn parse_bool(text: &str) -> Result<bool, Error> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        Ok(false)
    } else {
        Err(not_convertible_text(text, "bool"))
    }
}

pub(crate) fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub(crate) fn format_datetime(datetime: PrimitiveDateTime) -> String {
    format!(
        "{} {:02}:{:02}:{:02}",
        format_date(datetime.date()),
        datetime.hour(),
        datetime.minute(),
        datetime.second()
    )
}

fn parse_date(text: &str) -> Result<Date, Error> {
    let mut parts = text.splitn(3, '-');
    let (Some(year), Some(month), Some(day)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(not_convertible_text(text, "date"));
    };
    let year = year
        .parse::<i32>()
        .map_err(|_| not_convertible_text(text, "date"))?;
    let month = month
        .parse::<u8>()
        .ok()
        .and_then(|month| Month::try_from(month).ok())
        .ok_or_else(|| not_convertible_text(text, "date"))?;
    let day = day
        .parse::<u8>()
        .map_err(|_| not_convertible_text(text, "date"))?;
    Date::from_calendar_date(year, month, day)
        .map_err(|err| not_convertible_text(text, "date").with_source(err))
}

fn parse_datetime(text: &str) -> Result<PrimitiveDateTime, Error> {
    let Some((date, time)) = text.split_once([' ', 'T']) else {
        return Ok(parse_date(text)?.midnight());
    };
    let date = parse_date(date)?;
    let mut parts = time.splitn(3, ':');
    let (Some(hour), Some(minute), Some(second)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(not_convertible_text(text, "datetime"));
    };
    let parse = |part: &str| {
        part.parse::<u8>()
            .map_err(|_| not_convertible_text(text, "datetime"))
    };
    let time = Time::from_hms(parse(hour)?, parse(minute)?, parse(second)?)
        .map_err(|err| not_convertible_text(text, "datetime").with_source(err))?;
    Ok(PrimitiveDateTime::new(date, time))
}

pub(crate) fn date_from_julian(day: i32) -> Result<Date, Error> {
    Date::from_julian_day(day).map_err(|err| {
        Error::new(ErrorKind::Format(FormatError::CorruptRecord))
            .with_message("date out of range")
            .with_source(err)
    })
}

pub(crate) fn datetime_from_unix(seconds: i64) -> Result<PrimitiveDateTime, Error> {
    let datetime = OffsetDateTime::from_unix_timestamp(seconds).map_err(|err| {
        Error::new(ErrorKind::Format(FormatError::CorruptRecord))
            .with_message("datetime out of range")
            .with_source(err)
    })?;
    Ok(PrimitiveDateTime::new(datetime.date(), datetime.time()))
}

pub(crate) fn datetime_to_unix(datetime: PrimitiveDateTime) -> i64 {
    datetime.assume_utc().unix_timestamp()
}
