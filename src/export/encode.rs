use polars::prelude::*;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Render one frame as delimited text, with or without the header row.
pub fn frame_to_csv(df: &mut DataFrame, header: bool) -> AppResult<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::with_capacity(df.height() * 32);
    CsvWriter::new(&mut buf)
        .include_header(header)
        .finish(df)
        .map_err(|e| AppError::read("convert_error", format!("csv encode: {}", e)))?;
    Ok(buf)
}

/// Serialize a frame as one JSON array of row objects, keys in column order.
pub fn frame_to_json(df: &DataFrame) -> AppResult<Vec<u8>> {
    serde_json::to_vec(&Rows(df)).map_err(|e| AppError::read("convert_error", format!("json encode: {}", e)))
}

pub(crate) fn any_to_json(av: AnyValue<'_>) -> Value {
    match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::Bool(v),
        AnyValue::String(v) => Value::String(v.to_string()),
        AnyValue::StringOwned(v) => Value::String(v.to_string()),
        AnyValue::Int8(v) => Value::from(v),
        AnyValue::Int16(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt8(v) => Value::from(v),
        AnyValue::UInt16(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => float_to_json(v as f64),
        AnyValue::Float64(v) => float_to_json(v),
        // Temporal, decimal and nested values keep their display form
        other => Value::String(other.to_string()),
    }
}

fn float_to_json(v: f64) -> Value {
    serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

struct Rows<'a>(&'a DataFrame);

struct Row<'a> {
    df: &'a DataFrame,
    idx: usize,
}

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.height()))?;
        for idx in 0..self.0.height() {
            seq.serialize_element(&Row { df: self.0, idx })?;
        }
        seq.end()
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let cols = self.df.get_columns();
        let mut map = serializer.serialize_map(Some(cols.len()))?;
        for col in cols {
            let v = col.get(self.idx).map(any_to_json).map_err(<S::Error as serde::ser::Error>::custom)?;
            map.serialize_entry(col.name().as_str(), &v)?;
        }
        map.end()
    }
}
