//! Comma-separated table parser (`.csv`, `.txt`)
//!
//! The first non-blank line is the header; its first column is the
//! independent axis. Every later non-blank line is one record. Headers of
//! the form `Voltage (kV)` are split into label and unit.

use crate::error::{ParseError, RecordHint};
use crate::parsers::{ChannelFileParser, SourceFile};
use chrono::{SecondsFormat, Utc};
use esplot_model::{
    ChannelFile, ChannelFileContent, ChannelFileContentSerie, ChannelFileMetadata, ChannelId,
    MetadataValue,
};
use std::path::Path;

const X_ID: &str = "time";
const X_UNIT: &str = "s";

/// Parser for comma-separated channel tables
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvTableParser;

impl ChannelFileParser for CsvTableParser {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn parse(&self, source: &SourceFile) -> Result<ChannelFile, ParseError> {
        let path = source.path.as_str();
        let text = std::str::from_utf8(&source.bytes).map_err(|e| {
            ParseError::malformed(path, RecordHint::Offset(e.valid_up_to()), "invalid UTF-8")
        })?;
        let newline_terminated = text.ends_with('\n');

        let mut lines = text
            .split('\n')
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty())
            .peekable();

        let Some((header_line, header)) = lines.next() else {
            return Err(ParseError::truncated(path, "empty file"));
        };
        let headers: Vec<&str> = header.split(',').map(str::trim).collect();
        if headers.len() < 2 {
            return Err(ParseError::malformed(
                path,
                RecordHint::Line(header_line),
                "expected at least 2 columns (axis and one channel)",
            ));
        }

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
        while let Some((line_no, line)) = lines.next() {
            let cells: Vec<&str> = line.split(',').map(str::trim).collect();
            let is_last = lines.peek().is_none();

            if cells.len() != headers.len() {
                if is_last && !newline_terminated && cells.len() < headers.len() {
                    return Err(ParseError::truncated(
                        path,
                        format!("incomplete record at line {line_no}"),
                    ));
                }
                return Err(ParseError::malformed(
                    path,
                    RecordHint::Line(line_no),
                    format!("expected {} columns, found {}", headers.len(), cells.len()),
                ));
            }

            for (column, (cell, values)) in cells.iter().zip(columns.iter_mut()).enumerate() {
                match cell.parse::<f64>() {
                    Ok(value) if value.is_finite() => values.push(value),
                    _ => {
                        return Err(ParseError::malformed(
                            path,
                            RecordHint::Line(line_no),
                            format!("column {}: '{cell}' is not a finite number", column + 1),
                        ));
                    }
                }
            }
        }

        if columns[0].is_empty() {
            return Err(ParseError::truncated(path, "header without records"));
        }

        let mut columns = columns.into_iter();
        let x_values = columns.next().unwrap_or_default();
        let x = ChannelFileContentSerie::new(channel_id(path, X_ID)?, headers[0], X_UNIT, x_values);

        let series = headers
            .iter()
            .skip(1)
            .zip(columns)
            .enumerate()
            .map(|(i, (header, values))| {
                let (label, unit) = split_label_unit(header);
                Ok(ChannelFileContentSerie::new(
                    channel_id(path, &format!("channel_{}", i + 1))?,
                    label,
                    unit,
                    values,
                ))
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        let timestamp = source
            .modified
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let metadata = ChannelFileMetadata::new(timestamp)
            .with("SCR", MetadataValue::Number(0.0))
            .with("shortTitle", MetadataValue::Text(short_title(path)));

        let content = ChannelFileContent::new(1, metadata, x, series)
            .map_err(|e| ParseError::malformed(path, RecordHint::Unspecified, e.to_string()))?;
        Ok(ChannelFile::new(path, content))
    }

    fn extensions(&self) -> &[&str] {
        &["csv", "txt"]
    }
}

fn channel_id(path: &str, id: &str) -> Result<ChannelId, ParseError> {
    ChannelId::new(id)
        .map_err(|e| ParseError::malformed(path, RecordHint::Unspecified, e.to_string()))
}

/// `"Voltage (kV)"` → `("Voltage", "kV")`; anything else keeps an empty unit
fn split_label_unit(header: &str) -> (&str, &str) {
    header
        .strip_suffix(')')
        .and_then(|rest| rest.rfind('(').map(|open| (&rest[..open], &rest[open + 1..])))
        .map(|(label, unit)| (label.trim_end(), unit.trim()))
        .filter(|(label, unit)| !label.is_empty() && !unit.contains('('))
        .unwrap_or((header, ""))
}

fn short_title(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map_or_else(|| "unknown".to_string(), |s| s.to_string_lossy().into_owned())
}
