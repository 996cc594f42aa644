//! Transcript parsing.
//!
//! A transcript is either one JSON array of entries or JSON lines, one entry
//! per line. Blank lines are ignored.
//!
//! ```json
//! {"tool": "search_code", "args": {"pattern": "TODO"}, "result": {"total_count": 3}, "success": true}
//! ```

use callguard::session::ToolCallRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// One recorded tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub tool: String,
    #[serde(default = "empty_args")]
    pub args: Value,
    #[serde(default)]
    pub result: Value,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub redundant: bool,
}

fn empty_args() -> Value {
    Value::Object(Default::default())
}

fn default_success() -> bool {
    true
}

impl TranscriptEntry {
    pub fn into_record(self) -> ToolCallRecord {
        ToolCallRecord::new(self.tool, self.args, self.result, self.success)
            .with_redundant(self.redundant)
    }
}

/// Parse a JSON array or JSON-lines transcript.
pub fn parse(data: &str) -> Result<Vec<TranscriptEntry>, String> {
    let trimmed = data.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| format!("invalid transcript array: {e}"));
    }
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| format!("invalid transcript line {}: {e}", i + 1))
        })
        .collect()
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<TranscriptEntry>, String> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read transcript {}: {e}", path.display()))?;
    parse(&data)
}
