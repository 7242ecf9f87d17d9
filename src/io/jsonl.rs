//! JSON Lines codec for stream elements.
//!
//! Used in two places: durable reservoirs are persisted as one element per
//! line, and the loopback transport ships elements across its "wire" one
//! encoded line at a time.

use crate::value::Value;
use anyhow::{Context, Result};
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Encode one element as a single JSON line (without the trailing newline).
///
/// # Errors
/// Serialization failure.
pub fn encode_line(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("encode element")
}

/// Decode one line produced by [`encode_line`].
///
/// # Errors
/// The line is not a valid encoded element.
pub fn decode_line(line: &str) -> Result<Value> {
    serde_json::from_str(line).with_context(|| format!("decode element: {line}"))
}

/// Read a JSONL file of elements. Empty and whitespace-only lines are skipped.
///
/// # Errors
/// The file cannot be opened or read, or a line fails to decode. Errors name
/// the offending line number.
pub fn read_values(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = BufReader::new(f);
    let mut out = Vec::new();
    for (i, line) in rdr.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let v = decode_line(&line)
            .with_context(|| format!("parse JSONL line {} in {}", i + 1, path.display()))?;
        out.push(v);
    }
    Ok(out)
}

/// Write elements as a JSONL file, creating parent directories as needed.
///
/// # Returns
/// The number of elements written.
///
/// # Errors
/// The file or its directories cannot be created, or an element fails to
/// serialize.
pub fn write_values(path: impl AsRef<Path>, data: &[Value]) -> Result<usize> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    for (i, item) in data.iter().enumerate() {
        serde_json::to_writer(&mut w, item)
            .with_context(|| format!("serialize item #{} to {}", i, path.display()))?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::Host;
    use crate::value::ErrorValue;

    #[test]
    fn file_preserves_every_kind() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/r.jsonl");
        let data = vec![
            Value::Null,
            Value::float(1.5),
            Value::float(f64::INFINITY),
            Value::float(f64::NEG_INFINITY),
            Value::float(f64::NAN),
            Value::tuple([Value::Int(1), Value::from("a")]),
            Value::list([Value::Bool(true)]),
            Value::Error(ErrorValue::new("boom").on_host(Host::new("n1"))),
        ];
        assert_eq!(write_values(&path, &data)?, 8);
        assert_eq!(read_values(&path)?, data);
        Ok(())
    }

    #[test]
    fn non_finite_floats_are_words_on_the_wire() -> Result<()> {
        assert_eq!(encode_line(&Value::float(f64::INFINITY))?, r#"{"Float":"inf"}"#);
        assert_eq!(decode_line(r#"{"Float":"nan"}"#)?, Value::float(f64::NAN));
        assert_eq!(decode_line(r#"{"Float":2}"#)?, Value::float(2.0));
        assert!(decode_line(r#"{"Float":"lots"}"#).is_err());
        Ok(())
    }

    #[test]
    fn bad_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"Int\":1}\n\nnot json\n").unwrap();
        let err = read_values(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }
}
