use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference to a media file stored in the backend's output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub filename: String,
    pub subfolder: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

impl MediaRef {
    /// Parse a `{filename, subfolder, type}` object. Entries without a
    /// filename are ignored.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let filename = value.get("filename").and_then(|f| f.as_str())?;
        let subfolder = value
            .get("subfolder")
            .and_then(|s| s.as_str())
            .unwrap_or("");
        let media_type = value
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("output");
        Some(Self {
            filename: filename.to_string(),
            subfolder: subfolder.to_string(),
            media_type: media_type.to_string(),
        })
    }
}

/// Handle for a job accepted by the backend queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub queue_position: i64,
}

/// The `status` block of a history record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStatus {
    pub completed: bool,
    pub status_str: String,
    pub messages: Vec<String>,
}

/// History record for one job. `outputs` keeps the backend's raw
/// `node id -> media kind -> [MediaRef]` structure for the extractor.
#[derive(Debug, Clone, Default)]
pub struct HistoryEntry {
    pub status: HistoryStatus,
    pub outputs: Map<String, Value>,
}

/// Messages are plain strings or `[event, data]` pairs. A pair keeps the
/// event name plus `data.exception_message` when the backend sent one.
fn status_message(message: &Value) -> Option<String> {
    match message {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let event = parts.first().and_then(|p| p.as_str())?;
            let detail = parts
                .get(1)
                .and_then(|d| d.get("exception_message"))
                .and_then(|m| m.as_str())
                .map(str::trim)
                .filter(|m| !m.is_empty());
            Some(match detail {
                Some(detail) => format!("{}: {}", event, detail),
                None => event.to_string(),
            })
        }
        _ => None,
    }
}

impl HistoryEntry {
    /// Parse the entry for `job_id` out of a `/history/{id}` payload.
    /// Returns `None` when the job has no record yet.
    pub fn from_payload(payload: &Value, job_id: &str) -> Option<Self> {
        let entry = payload.get(job_id)?;

        let status_str = entry
            .pointer("/status/status_str")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        let completed = entry
            .pointer("/status/completed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let messages = entry
            .pointer("/status/messages")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(status_message).collect())
            .unwrap_or_default();

        let outputs = entry
            .get("outputs")
            .and_then(|o| o.as_object())
            .cloned()
            .unwrap_or_default();

        Some(Self {
            status: HistoryStatus {
                completed,
                status_str: status_str.to_string(),
                messages,
            },
            outputs,
        })
    }

    pub fn is_error(&self) -> bool {
        self.status.status_str == "error"
    }
}

/// One entry of the backend queue: `(priority, job id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub priority: i64,
    pub job_id: String,
}

/// Where a job sits in the shared queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePosition {
    Running,
    /// Zero-based index into the pending list.
    Pending(usize),
}

/// Snapshot of the backend's shared queue (every caller's work, not just ours).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub running: Vec<QueueItem>,
    pub pending: Vec<QueueItem>,
}

impl QueueSnapshot {
    /// Parse a `/queue` payload. Queue rows are `[number, prompt_id, ...]`.
    pub fn from_payload(payload: &Value) -> Self {
        let parse = |key: &str| -> Vec<QueueItem> {
            payload
                .get(key)
                .and_then(|v| v.as_array())
                .map(|rows| {
                    rows.iter()
                        .filter_map(|row| {
                            let job_id = row.get(1).and_then(|v| v.as_str())?;
                            Some(QueueItem {
                                priority: row.get(0).and_then(|v| v.as_i64()).unwrap_or(0),
                                job_id: job_id.to_string(),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            running: parse("queue_running"),
            pending: parse("queue_pending"),
        }
    }

    pub fn position(&self, job_id: &str) -> Option<QueuePosition> {
        if self.running.iter().any(|item| item.job_id == job_id) {
            return Some(QueuePosition::Running);
        }
        self.pending
            .iter()
            .position(|item| item.job_id == job_id)
            .map(QueuePosition::Pending)
    }
}

/// Lifecycle of a generation. Ordering follows the allowed transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }
}

/// Snapshot of a generation, returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub id: String,
    pub status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// 0-100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub auxiliary_media: Vec<String>,
}

impl GenerationResult {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: GenerationStatus::Pending,
            media_url: None,
            progress: None,
            error: None,
            auxiliary_media: Vec::new(),
        }
    }

    pub fn processing(id: impl Into<String>, progress: f64) -> Self {
        Self {
            status: GenerationStatus::Processing,
            progress: Some(progress.clamp(0.0, 100.0)),
            ..Self::pending(id)
        }
    }

    pub fn completed(
        id: impl Into<String>,
        media_url: Option<String>,
        auxiliary_media: Vec<String>,
    ) -> Self {
        Self {
            status: GenerationStatus::Completed,
            media_url,
            auxiliary_media,
            ..Self::pending(id)
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: GenerationStatus::Failed,
            error: Some(error.into()),
            ..Self::pending(id)
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == GenerationStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == GenerationStatus::Failed
    }
}
