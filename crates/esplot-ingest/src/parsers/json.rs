//! JSON channel-file parser
//!
//! Document shape:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "metadata": { "timestamp": "2024-01-01T00:00:00Z", "SCR": 3.5 },
//!   "x": { "id": "time", "label": "Time", "unit": "s", "values": [0.0, 0.01] },
//!   "series": [{ "id": "V1", "label": "Voltage", "unit": "pu", "values": [1.0, 0.99] }]
//! }
//! ```
//!
//! The schema version is checked before anything else, so a future format
//! is reported as unsupported rather than malformed.

use crate::error::{ParseError, RecordHint};
use crate::parsers::{ChannelFileParser, SourceFile};
use esplot_model::{
    is_supported_schema_version, ChannelFile, ChannelFileContent, ChannelFileContentSerie,
    ChannelFileMetadata, ChannelId, MetadataValue,
};
use serde_json::error::Category;
use serde_json::{Map, Value};

/// Parser for `.json` channel files
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonChannelFileParser;

impl ChannelFileParser for JsonChannelFileParser {
    fn name(&self) -> &'static str {
        "json"
    }

    fn parse(&self, source: &SourceFile) -> Result<ChannelFile, ParseError> {
        let path = source.path.as_str();
        let document: Value =
            serde_json::from_slice(&source.bytes).map_err(|e| syntax_error(path, &e))?;
        let root = document.as_object().ok_or_else(|| {
            ParseError::malformed(path, RecordHint::Unspecified, "document is not an object")
        })?;

        let schema_version = schema_version(path, root)?;
        let metadata = metadata(path, root.get("metadata"))?;
        let x = serie(path, root.get("x"), "x")?;

        let series = match root.get("series") {
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .enumerate()
                .map(|(i, item)| serie(path, Some(item), &format!("series[{i}]")))
                .collect::<Result<Vec<_>, _>>()?,
            Some(Value::Array(_)) => {
                return Err(field_error(path, "series", "must not be empty"));
            }
            _ => return Err(field_error(path, "series", "expected an array")),
        };

        let content = ChannelFileContent::new(schema_version, metadata, x, series).map_err(|e| {
            let hint = e
                .series_hint()
                .map_or(RecordHint::Unspecified, |id| RecordHint::Series(id.to_string()));
            ParseError::malformed(path, hint, e.to_string())
        })?;

        Ok(ChannelFile::new(path, content))
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }
}

fn syntax_error(path: &str, err: &serde_json::Error) -> ParseError {
    match err.classify() {
        Category::Eof => ParseError::truncated(
            path,
            format!(
                "unexpected end of input at line {}, column {}",
                err.line(),
                err.column()
            ),
        ),
        _ => ParseError::malformed(
            path,
            RecordHint::Position {
                line: err.line(),
                column: err.column(),
            },
            err.to_string(),
        ),
    }
}

fn field_error(path: &str, field: &str, message: &str) -> ParseError {
    ParseError::malformed(path, RecordHint::Field(field.to_string()), message)
}

fn schema_version(path: &str, root: &Map<String, Value>) -> Result<u32, ParseError> {
    let declared = root
        .get("schemaVersion")
        .and_then(Value::as_i64)
        .ok_or_else(|| field_error(path, "schemaVersion", "expected an integer"))?;

    match u32::try_from(declared) {
        Ok(version) if is_supported_schema_version(version) => Ok(version),
        _ => Err(ParseError::UnsupportedSchemaVersion {
            path: path.to_string(),
            version: declared,
        }),
    }
}

fn metadata(path: &str, value: Option<&Value>) -> Result<ChannelFileMetadata, ParseError> {
    let Some(Value::Object(entries)) = value else {
        return Err(field_error(path, "metadata", "expected an object"));
    };

    let timestamp = entries
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| field_error(path, "metadata.timestamp", "expected a string"))?;

    let mut metadata = ChannelFileMetadata::new(timestamp);
    for (key, value) in entries.iter().filter(|(k, _)| k.as_str() != "timestamp") {
        let scalar = match value {
            Value::Bool(b) => MetadataValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(MetadataValue::Number).ok_or_else(|| {
                field_error(path, &format!("metadata.{key}"), "number out of range")
            })?,
            Value::String(s) => MetadataValue::Text(s.clone()),
            _ => {
                return Err(field_error(
                    path,
                    &format!("metadata.{key}"),
                    "expected a string, number or boolean",
                ));
            }
        };
        metadata = metadata.with(key.clone(), scalar);
    }
    Ok(metadata)
}

fn serie(
    path: &str,
    value: Option<&Value>,
    field: &str,
) -> Result<ChannelFileContentSerie, ParseError> {
    let Some(Value::Object(entries)) = value else {
        return Err(field_error(path, field, "expected an object"));
    };

    let text = |name: &str| {
        entries
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| field_error(path, &format!("{field}.{name}"), "expected a string"))
    };

    let id = ChannelId::new(text("id")?)
        .map_err(|e| field_error(path, &format!("{field}.id"), &e.to_string()))?;
    let label = text("label")?;
    let unit = text("unit")?;

    let values_field = format!("{field}.values");
    let Some(Value::Array(raw)) = entries.get("values") else {
        return Err(field_error(path, &values_field, "expected an array of numbers"));
    };
    let values = raw
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_f64().ok_or_else(|| {
                field_error(path, &format!("{values_field}[{i}]"), "expected a number")
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ChannelFileContentSerie::new(id, label, unit, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use esplot_test_utils::channel_file_json;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PATH: &str = "/data/run.json";

    fn parse_value(value: &Value) -> Result<ChannelFile, ParseError> {
        parse_bytes(serde_json::to_vec(value).unwrap())
    }

    fn parse_bytes(bytes: impl Into<Vec<u8>>) -> Result<ChannelFile, ParseError> {
        JsonChannelFileParser.parse(&SourceFile::new(PATH, bytes))
    }

    #[test]
    fn parses_valid_document() {
        let file = parse_value(&channel_file_json(1, &["V1", "P1"], 4)).unwrap();

        assert_eq!(file.path(), PATH);
        let content = file.content();
        assert_eq!(content.schema_version(), 1);
        assert_eq!(content.x().len(), 4);
        let ids: Vec<_> = content.series().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["V1", "P1"]);
        assert_eq!(
            content.metadata().get("SCR"),
            Some(&MetadataValue::Number(3.0))
        );
    }

    #[test]
    fn unsupported_version_is_reported_before_validation() {
        let mut doc = channel_file_json(2, &["V1"], 2);
        doc["series"] = json!("not even an array");

        let err = parse_value(&doc).unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnsupportedSchemaVersion { version: 2, .. }
        ));
    }

    #[test]
    fn missing_version_is_malformed() {
        let mut doc = channel_file_json(1, &["V1"], 2);
        doc.as_object_mut().unwrap().remove("schemaVersion");

        let err = parse_value(&doc).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedRecord { hint: RecordHint::Field(ref f), .. } if f == "schemaVersion"
        ));
    }

    #[test]
    fn empty_and_cut_input_is_truncated() {
        assert!(matches!(
            parse_bytes(Vec::new()).unwrap_err(),
            ParseError::Truncated { .. }
        ));

        let full = serde_json::to_string(&channel_file_json(1, &["V1"], 3)).unwrap();
        let cut = &full[..full.len() / 2];
        assert!(matches!(
            parse_bytes(cut.as_bytes()).unwrap_err(),
            ParseError::Truncated { .. }
        ));
    }

    #[test]
    fn syntax_error_carries_position() {
        let err = parse_bytes("{\n  \"schemaVersion\": 1,\n  oops\n}").unwrap_err();
        match err {
            ParseError::MalformedRecord {
                hint: RecordHint::Position { line, .. },
                ..
            } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn misaligned_series_names_the_series() {
        let mut doc = channel_file_json(1, &["V1", "P1"], 3);
        doc["series"][1]["values"] = json!([1.0]);

        let err = parse_value(&doc).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedRecord { hint: RecordHint::Series(ref id), .. } if id == "P1"
        ));
    }

    #[test]
    fn empty_series_is_malformed() {
        let mut doc = channel_file_json(1, &["V1"], 3);
        doc["series"] = json!([]);

        let err = parse_value(&doc).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedRecord { hint: RecordHint::Field(ref f), .. } if f == "series"
        ));
    }

    #[test]
    fn non_numeric_value_names_the_field() {
        let mut doc = channel_file_json(1, &["V1"], 3);
        doc["x"]["values"][1] = json!("0.1");

        let err = parse_value(&doc).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedRecord { hint: RecordHint::Field(ref f), .. } if f == "x.values[1]"
        ));
    }

    #[test]
    fn nested_metadata_is_rejected() {
        let mut doc = channel_file_json(1, &["V1"], 1);
        doc["metadata"]["nested"] = json!({ "a": 1 });

        assert!(matches!(
            parse_value(&doc).unwrap_err(),
            ParseError::MalformedRecord { .. }
        ));
    }

    #[test]
    fn reparse_is_structurally_identical() {
        let bytes = serde_json::to_vec(&channel_file_json(1, &["V1", "V2"], 5)).unwrap();
        let first = parse_bytes(bytes.clone()).unwrap();
        let second = parse_bytes(bytes).unwrap();
        assert_eq!(first, second);
    }
}
