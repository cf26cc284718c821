//! Ingestion progress as streamed back by the upload route.
//!
//! The server writes one JSON object per batch, back to back (optionally
//! newline separated), so object boundaries do not line up with network
//! chunks. [`ProgressDecoder`] buffers until an object is whole and
//! [`ProgressTracker`] checks the sequence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Separator between the original filename and the server-side suffix.
const FILENAME_SUFFIX_MARKER: &str = "-%-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgressEvent {
    pub filename: String,
    pub total_chunks: u64,
    pub chunks_upserted: u64,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgressEvent {
    /// Rounded percentage of chunks stored. An empty document counts as done
    /// once it is complete.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total_chunks == 0 {
            return if self.is_complete { 100 } else { 0 };
        }
        let ratio = self.chunks_upserted.min(self.total_chunks) as f64 / self.total_chunks as f64;
        (ratio * 100.0).round() as u8
    }

    /// Filename without the server-added `-%-` suffix.
    #[must_use]
    pub fn display_filename(&self) -> &str {
        self.filename
            .split(FILENAME_SUFFIX_MARKER)
            .next()
            .unwrap_or(&self.filename)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("malformed progress event: {0}")]
    Malformed(String),
    #[error("progress for {filename} went backwards ({previous} -> {current})")]
    Regressed {
        filename: String,
        previous: u64,
        current: u64,
    },
    #[error("progress for {filename} exceeds total ({upserted} > {total})")]
    OutOfBounds {
        filename: String,
        upserted: u64,
        total: u64,
    },
}

/// Incremental decoder for concatenated JSON objects.
#[derive(Debug, Default)]
pub struct ProgressDecoder {
    buffer: Vec<u8>,
}

impl ProgressDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `chunk` and returns every event it completed.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Malformed`] when the buffered bytes cannot be
    /// the start of a progress event.
    pub fn push(
        &mut self,
        chunk: &[u8],
    ) -> Result<Vec<UploadProgressEvent>, ProgressError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let consumed = {
            let mut stream = serde_json::Deserializer::from_slice(&self.buffer).into_iter::<UploadProgressEvent>();
            let mut consumed = 0;
            loop {
                match stream.next() {
                    Some(Ok(event)) => {
                        events.push(event);
                        consumed = stream.byte_offset();
                    }
                    Some(Err(e)) if e.is_eof() => break,
                    Some(Err(e)) => return Err(ProgressError::Malformed(e.to_string())),
                    None => {
                        consumed = self.buffer.len();
                        break;
                    }
                }
            }
            consumed
        };

        self.buffer.drain(..consumed);
        Ok(events)
    }

    /// Checks nothing but whitespace is left over.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Malformed`] for a truncated trailing event.
    pub fn finish(self) -> Result<(), ProgressError> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else {
            Err(ProgressError::Malformed(format!(
                "stream ended inside an event ({} bytes left)",
                self.buffer.len()
            )))
        }
    }
}

/// How an upload ended, judged across every file it reported on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Complete,
    Failed(String),
    /// The stream ended before the server reported completion for every file.
    Incomplete,
}

#[derive(Debug, Default)]
struct FileProgress {
    upserted: u64,
    complete: bool,
}

/// Validates an event sequence and keeps per-file state.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    files: HashMap<String, FileProgress>,
    failure: Option<String>,
    last: Option<UploadProgressEvent>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `event` and returns its percentage.
    ///
    /// # Errors
    ///
    /// Rejects events whose count exceeds the total or moves backwards for
    /// the same file. Error events are recorded without checks.
    pub fn observe(
        &mut self,
        event: UploadProgressEvent,
    ) -> Result<u8, ProgressError> {
        let file = self.files.entry(event.filename.clone()).or_default();

        match &event.error {
            Some(error) => {
                tracing::warn!("Ingestion of {} failed: {error}", event.display_filename());
                self.failure.get_or_insert_with(|| error.clone());
            }
            None => {
                if event.chunks_upserted > event.total_chunks {
                    return Err(ProgressError::OutOfBounds {
                        filename: event.filename,
                        upserted: event.chunks_upserted,
                        total: event.total_chunks,
                    });
                }
                if event.chunks_upserted < file.upserted {
                    return Err(ProgressError::Regressed {
                        filename: event.filename,
                        previous: file.upserted,
                        current: event.chunks_upserted,
                    });
                }
                file.upserted = event.chunks_upserted;
                file.complete |= event.is_complete;
            }
        }

        let percent = event.percent();
        self.last = Some(event);
        Ok(percent)
    }

    #[must_use]
    pub fn last(&self) -> Option<&UploadProgressEvent> {
        self.last.as_ref()
    }

    /// `Failed` with the first error any file reported, `Complete` once every
    /// file seen has completed, `Incomplete` otherwise.
    #[must_use]
    pub fn outcome(&self) -> UploadOutcome {
        if let Some(error) = &self.failure {
            return UploadOutcome::Failed(error.clone());
        }
        if !self.files.is_empty() && self.files.values().all(|file| file.complete) {
            UploadOutcome::Complete
        } else {
            UploadOutcome::Incomplete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(
        upserted: u64,
        total: u64,
        complete: bool,
    ) -> UploadProgressEvent {
        UploadProgressEvent {
            filename: "report.pdf-%-1712345".to_string(),
            total_chunks: total,
            chunks_upserted: upserted,
            is_complete: complete,
            error: None,
        }
    }

    #[test]
    fn test_decoder_handles_split_objects() {
        let stream = concat!(
            r#"{"filename":"a.pdf","totalChunks":4,"chunksUpserted":2,"isComplete":false}"#,
            "\n",
            r#"{"filename":"a.pdf","totalChunks":4,"chunksUpserted":4,"isComplete":true}"#,
        );
        let bytes = stream.as_bytes();

        let mut decoder = ProgressDecoder::new();
        let mut events = Vec::new();
        for chunk in bytes.chunks(7) {
            events.extend(decoder.push(chunk).unwrap());
        }
        decoder.finish().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].chunks_upserted, 2);
        assert!(events[1].is_complete);
    }

    #[test]
    fn test_decoder_handles_back_to_back_objects_in_one_chunk() {
        let mut decoder = ProgressDecoder::new();
        let events = decoder
            .push(br#"{"filename":"a","totalChunks":2,"chunksUpserted":1}{"filename":"a","totalChunks":2,"chunksUpserted":2,"isComplete":true}"#)
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(!events[0].is_complete);
    }

    #[test]
    fn test_decoder_rejects_garbage() {
        let mut decoder = ProgressDecoder::new();
        assert!(matches!(decoder.push(b"<html>"), Err(ProgressError::Malformed(_))));
    }

    #[test]
    fn test_truncated_stream_fails_finish() {
        let mut decoder = ProgressDecoder::new();
        assert!(decoder.push(br#"{"filename":"a","totalCh"#).unwrap().is_empty());
        assert!(decoder.finish().is_err());
    }

    #[test]
    fn test_percent_and_display_name() {
        let e = event(1, 3, false);
        assert_eq!(e.percent(), 33);
        assert_eq!(e.display_filename(), "report.pdf");
        assert_eq!(event(0, 0, true).percent(), 100);
        assert_eq!(event(0, 0, false).percent(), 0);

        let plain = UploadProgressEvent {
            filename: "notes.txt".to_string(),
            ..event(0, 1, false)
        };
        assert_eq!(plain.display_filename(), "notes.txt");
    }

    #[test]
    fn test_tracker_accepts_non_decreasing_sequence() {
        let mut tracker = ProgressTracker::new();
        let percents: Vec<u8> = [event(0, 4, false), event(2, 4, false), event(2, 4, false), event(4, 4, true)]
            .into_iter()
            .map(|e| tracker.observe(e).unwrap())
            .collect();
        assert_eq!(percents, vec![0, 50, 50, 100]);
        assert_eq!(tracker.outcome(), UploadOutcome::Complete);
    }

    #[test]
    fn test_tracker_rejects_regression_and_overflow() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(event(3, 4, false)).unwrap();
        assert!(matches!(
            tracker.observe(event(2, 4, false)),
            Err(ProgressError::Regressed { previous: 3, current: 2, .. })
        ));
        assert!(matches!(
            tracker.observe(event(5, 4, false)),
            Err(ProgressError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_outcome_requires_completion_without_error() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.outcome(), UploadOutcome::Incomplete);

        tracker.observe(event(2, 4, false)).unwrap();
        assert_eq!(tracker.outcome(), UploadOutcome::Incomplete);

        tracker
            .observe(UploadProgressEvent {
                error: Some("embedding quota exceeded".to_string()),
                ..event(2, 4, true)
            })
            .unwrap();
        assert_eq!(tracker.outcome(), UploadOutcome::Failed("embedding quota exceeded".to_string()));
    }

    fn file_event(
        filename: &str,
        upserted: u64,
        total: u64,
        complete: bool,
    ) -> UploadProgressEvent {
        UploadProgressEvent {
            filename: filename.to_string(),
            ..event(upserted, total, complete)
        }
    }

    #[test]
    fn test_earlier_file_error_fails_the_upload() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(file_event("a.pdf", 1, 4, false)).unwrap();
        tracker
            .observe(UploadProgressEvent {
                error: Some("quota exceeded".to_string()),
                ..file_event("a.pdf", 1, 4, false)
            })
            .unwrap();
        tracker.observe(file_event("b.pdf", 3, 3, true)).unwrap();

        assert_eq!(tracker.outcome(), UploadOutcome::Failed("quota exceeded".to_string()));
    }

    #[test]
    fn test_unfinished_file_keeps_upload_incomplete() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(file_event("a.pdf", 1, 4, false)).unwrap();
        tracker.observe(file_event("b.pdf", 3, 3, true)).unwrap();
        assert_eq!(tracker.outcome(), UploadOutcome::Incomplete);

        tracker.observe(file_event("a.pdf", 4, 4, true)).unwrap();
        assert_eq!(tracker.outcome(), UploadOutcome::Complete);
    }

    #[test]
    fn test_progress_is_tracked_per_file() {
        let mut tracker = ProgressTracker::new();
        tracker.observe(file_event("a.pdf", 3, 4, false)).unwrap();
        assert_eq!(tracker.observe(file_event("b.pdf", 1, 4, false)).unwrap(), 25);
    }
}
