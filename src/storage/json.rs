use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use super::{Snapshot, Store};

const INDENT: &[u8] = b"   ";

/// Human-readable JSON document holding both collections.
/// The file is rewritten completely on every save: keys sorted, three-space
/// indent, trailing newline.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Serialize a snapshot into the on-disk representation.
pub fn render(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let value = serde_json::to_value(snapshot).context("Failed to serialize ledger")?;
    let value = sort_keys(value);

    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value
        .serialize(&mut serializer)
        .context("Failed to format ledger")?;
    buf.push(b'\n');
    Ok(buf)
}

/// Parse the on-disk representation. Blank input is an empty ledger.
pub fn parse(bytes: &[u8]) -> Result<Snapshot> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Snapshot::default());
    }
    serde_json::from_slice(bytes).context("Failed to parse ledger document")
}

// serde_json's map order depends on its `preserve_order` feature.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(key, value)| (key, sort_keys(value)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn load(&self) -> Result<Snapshot> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };
        parse(&bytes).with_context(|| format!("Invalid ledger file {}", self.path.display()))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = render(snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        // Write next to the target and rename so readers never see a partial file.
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}
