//! Delimited-table parser for GTFS schedule files.
//!
//! Record splitting is delegated to the `csv` crate (quoted fields may
//! embed the delimiter, newlines, and doubled-quote escapes); every field
//! is then coerced into a tagged scalar exactly once, so downstream stages
//! never re-infer types from strings.

use thiserror::Error;

/// A single table cell, typed at parse time.
///
/// A non-empty field that fully parses as a decimal number becomes
/// [`Field::Number`]; anything else is kept as [`Field::Text`] with
/// surrounding quote characters stripped.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Number(f64),
    Text(String),
}

/// One parsed record: an ordered sequence of typed fields. Positional
/// meaning is assigned per source table by the loader's column layouts.
pub type RawRow = Vec<Field>;

impl Field {
    fn coerce(raw: &str) -> Self {
        let candidate = raw.trim();
        if !candidate.is_empty() {
            if let Ok(n) = candidate.parse::<f64>() {
                return Field::Number(n);
            }
        }
        Field::Text(raw.trim_matches('"').to_string())
    }

    /// Numeric view of the field, if it coerced to a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Field::Number(n) => Some(*n),
            Field::Text(_) => None,
        }
    }

    /// Text view of the field, if it stayed textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Field::Number(_) => None,
            Field::Text(t) => Some(t),
        }
    }

    /// Whether the field carries a usable value: non-zero for numbers,
    /// non-empty for text. Used for optional identifiers (parent station,
    /// trip id) and for the stop-sequence checks.
    pub fn is_truthy(&self) -> bool {
        match self {
            Field::Number(n) => *n != 0.0,
            Field::Text(t) => !t.is_empty(),
        }
    }

    /// Canonical string form, used wherever a field serves as a lookup key
    /// (stop ids, route ids, trip ids) or as display text. Integral numbers
    /// render without a fractional part, so a numeric id in one table still
    /// matches the same id in another.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Field::Text(t) => f.write_str(t),
        }
    }
}

/// A table record the tokenizer could not process. Parsing errors abort
/// the whole run: the output graph is only meaningful over a complete feed.
#[derive(Debug, Error)]
#[error("malformed record {record} in the {table} table: {source}")]
pub struct ParseError {
    pub table: &'static str,
    pub record: u64,
    #[source]
    pub source: csv::Error,
}

/// Parses delimited text into typed rows.
///
/// The header row and the empty trailing row produced by a final newline
/// are excluded. Records may be ragged; positional lookups on short rows
/// simply come back empty downstream.
///
/// # Errors
///
/// Returns a [`ParseError`] if a record cannot be tokenized. The `table`
/// name is only used for error context.
pub fn parse_table(
    text: &str,
    delimiter: u8,
    table: &'static str,
) -> Result<Vec<RawRow>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|source| ParseError {
            table,
            record: i as u64 + 1,
            source,
        })?;
        rows.push(record.iter().map(Field::coerce).collect());
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Field {
        Field::Text(s.to_string())
    }

    #[test]
    fn test_header_and_trailing_newline_excluded() {
        let rows = parse_table("stop_id,stop_name\n1,Main\n2,Depot\n", b',', "stops").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Field::Number(1.0), text("Main")]);
    }

    #[test]
    fn test_empty_input_yields_no_rows() {
        let rows = parse_table("", b',', "stops").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_quoted_field_with_embedded_delimiter() {
        let rows = parse_table("h1,h2,h3\na,\"b,c\",d\n", b',', "stops").unwrap();
        assert_eq!(rows[0], vec![text("a"), text("b,c"), text("d")]);
    }

    #[test]
    fn test_doubled_quote_is_literal_quote() {
        let rows = parse_table("h1,h2,h3\na,\"b\"\"c\",d\n", b',', "stops").unwrap();
        assert_eq!(rows[0], vec![text("a"), text("b\"c"), text("d")]);
    }

    #[test]
    fn test_quoted_field_with_embedded_newline() {
        let rows = parse_table("h1,h2\n\"two\nlines\",x\n", b',', "stops").unwrap();
        assert_eq!(rows[0], vec![text("two\nlines"), text("x")]);
    }

    #[test]
    fn test_numeric_coercion() {
        let rows = parse_table("a,b,c,d\n50.08,-14.4,1e2,07:30:00\n", b',', "stops").unwrap();
        assert_eq!(
            rows[0],
            vec![
                Field::Number(50.08),
                Field::Number(-14.4),
                Field::Number(100.0),
                text("07:30:00"),
            ]
        );
    }

    #[test]
    fn test_empty_field_stays_text() {
        let rows = parse_table("a,b\n,x\n", b',', "stops").unwrap();
        assert_eq!(rows[0][0], text(""));
    }

    #[test]
    fn test_alternate_delimiter() {
        let rows = parse_table("a;b\n1;x\n", b';', "stops").unwrap();
        assert_eq!(rows[0], vec![Field::Number(1.0), text("x")]);
    }

    #[test]
    fn test_degenerate_quoting_terminates() {
        // An unterminated quote must not hang the tokenizer; the csv state
        // machine consumes the remainder as one field.
        let rows = parse_table("a,b\nx,\"unterminated\n", b',', "stops").unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_round_trip_without_quoting() {
        let original = vec![
            vec!["r1a".to_string(), "1".to_string()],
            vec!["r2a".to_string(), "2.5".to_string()],
        ];

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(["col_a", "col_b"]).unwrap();
        for row in &original {
            writer.write_record(row).unwrap();
        }
        let serialized = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        let rows = parse_table(&serialized, b',', "stops").unwrap();
        assert_eq!(rows.len(), original.len());
        assert_eq!(rows[0], vec![Field::Text("r1a".into()), Field::Number(1.0)]);
        assert_eq!(rows[1], vec![Field::Text("r2a".into()), Field::Number(2.5)]);
    }

    #[test]
    fn test_key_matches_across_numeric_and_display_forms() {
        assert_eq!(Field::Number(1001.0).key(), "1001");
        assert_eq!(Field::Number(10.5).key(), "10.5");
        assert_eq!(Field::Text("U321Z1".into()).key(), "U321Z1");
    }

    #[test]
    fn test_truthiness() {
        assert!(Field::Number(3.0).is_truthy());
        assert!(!Field::Number(0.0).is_truthy());
        assert!(Field::Text("x".into()).is_truthy());
        assert!(!Field::Text("".into()).is_truthy());
    }
}
