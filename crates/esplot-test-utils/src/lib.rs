//! Testing utilities for the esplot workspace
//!
//! Fixture builders and writers for channel files on disk.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc, clippy::cast_precision_loss)]

use esplot_model::{
    ChannelFileContent, ChannelFileContentSerie, ChannelFileMetadata, ChannelId, MetadataValue,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn channel_id(id: &str) -> ChannelId {
    ChannelId::new(id).unwrap()
}

/// Content with `len` samples and one series per id, values derived from the index
pub fn sample_content(ids: &[&str], len: usize) -> ChannelFileContent {
    let x = ChannelFileContentSerie::new(
        channel_id("time"),
        "Time",
        "s",
        (0..len).map(|i| i as f64 * 0.01).collect(),
    );
    let series = ids
        .iter()
        .enumerate()
        .map(|(n, id)| {
            ChannelFileContentSerie::new(
                channel_id(id),
                format!("Label {id}"),
                "pu",
                (0..len).map(|i| (n + 1) as f64 + i as f64 / 100.0).collect(),
            )
        })
        .collect();

    ChannelFileContent::new(
        1,
        ChannelFileMetadata::new("2024-05-01T12:00:00Z").with("SCR", MetadataValue::Number(3.0)),
        x,
        series,
    )
    .unwrap()
}

/// JSON document of a channel file with an arbitrary schema version
pub fn channel_file_json(schema_version: i64, ids: &[&str], len: usize) -> Value {
    let content = sample_content(ids, len);
    let mut value = serde_json::to_value(&content).unwrap();
    value["schemaVersion"] = json!(schema_version);
    value
}

/// Write `value` as `<dir>/<name>` and return the absolute path
pub fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    write_text(dir, name, &serde_json::to_string_pretty(value).unwrap())
}

/// Write a valid schema-1 channel file
pub fn write_channel_file(dir: &Path, name: &str, ids: &[&str], len: usize) -> PathBuf {
    write_json(dir, name, &channel_file_json(1, ids, len))
}

pub fn write_text(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// A CSV table with a time column and the given headers
pub fn sample_csv(headers: &[&str], rows: usize) -> String {
    let mut out = String::from("Time");
    for h in headers {
        out.push(',');
        out.push_str(h);
    }
    out.push('\n');
    for r in 0..rows {
        out.push_str(&format!("{}", r as f64 * 0.5));
        for c in 0..headers.len() {
            out.push_str(&format!(",{}", (c + 1) * 10 + r));
        }
        out.push('\n');
    }
    out
}

/// Scratch area with separate source and data directories
pub struct Workspace {
    pub root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("sources")).unwrap();
        std::fs::create_dir_all(root.path().join("data")).unwrap();
        Self { root }
    }

    pub fn sources(&self) -> PathBuf {
        self.root.path().join("sources")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.path().join("data")
    }

    /// Write a valid channel file under `sources/` and return its path as a string
    pub fn channel_file(&self, name: &str, ids: &[&str], len: usize) -> String {
        path_string(&write_channel_file(&self.sources(), name, ids, len))
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
