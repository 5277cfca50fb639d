//! Append-only conversation transcript
//!
//! Every utterance and tool interaction in a voice session lands here as a
//! speaker-attributed entry. Insertion order is conversation order; entries
//! are never reordered or mutated after insertion. The log lives for one
//! session and is cleared when the next session starts.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The therapist speaking into the microphone
    Therapist,
    /// The remote voice assistant
    Assistant,
    /// A tool invocation or its result
    Tool,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Therapist => write!(f, "Therapist"),
            Speaker::Assistant => write!(f, "Assistant"),
            Speaker::Tool => write!(f, "Tool"),
        }
    }
}

/// One immutable line of the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    /// Arrival time, used when exporting for the save-session collaborator
    pub at: DateTime<Utc>,
}

/// The `{time, text}` shape handed to the external save-session endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedLine {
    pub time: String,
    pub text: String,
}

/// Callback invoked for each appended entry, for live rendering.
pub type EntryCallback = Arc<dyn Fn(&TranscriptEntry) + Send + Sync>;

/// Append-only, speaker-attributed conversation log.
#[derive(Default)]
pub struct TranscriptLog {
    entries: Mutex<Vec<TranscriptEntry>>,
    callback: RwLock<Option<EntryCallback>>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Empty text is the caller's concern; the log stores
    /// whatever it is given, in arrival order.
    pub fn append(&self, speaker: Speaker, text: impl Into<String>) {
        let entry = TranscriptEntry {
            speaker,
            text: text.into(),
            at: Utc::now(),
        };

        if let Some(callback) = self.callback.read().as_ref() {
            callback(&entry);
        }

        self.entries.lock().push(entry);
    }

    /// Register a callback fired on every append (live rendering hook).
    pub fn on_entry(&self, callback: EntryCallback) {
        *self.callback.write() = Some(callback);
    }

    /// Snapshot of all entries in conversation order.
    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop all entries. Called when a new session starts.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Export the finished transcript as ordered `{time, text}` pairs for the
    /// save-session collaborator.
    pub fn saved_lines(&self) -> Vec<SavedLine> {
        self.entries
            .lock()
            .iter()
            .map(|entry| SavedLine {
                time: entry.at.format("%H:%M:%S").to_string(),
                text: format!("{}: {}", entry.speaker, entry.text),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_append_preserves_arrival_order() {
        let log = TranscriptLog::new();
        log.append(Speaker::Therapist, "How was your week?");
        log.append(Speaker::Assistant, "He reported less anxiety.");
        log.append(Speaker::Therapist, "Good to hear.");

        let entries = log.snapshot();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].speaker, Speaker::Therapist);
        assert_eq!(entries[0].text, "How was your week?");
        assert_eq!(entries[1].speaker, Speaker::Assistant);
        assert_eq!(entries[2].text, "Good to hear.");
    }

    #[test]
    fn test_clear_empties_the_log() {
        let log = TranscriptLog::new();
        log.append(Speaker::Tool, "getClientSince({\"patientId\":1})");
        assert_eq!(log.len(), 1);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_entry_callback_fires_per_append() {
        let log = TranscriptLog::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        log.on_entry(Arc::new(move |_entry| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        log.append(Speaker::Therapist, "one");
        log.append(Speaker::Assistant, "two");

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_saved_lines_carry_speaker_and_time() {
        let log = TranscriptLog::new();
        log.append(Speaker::Assistant, "He joined in June 2023.");

        let lines = log.saved_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.contains("Assistant: He joined in June 2023."));
        // HH:MM:SS
        assert_eq!(lines[0].time.len(), 8);
    }
}
