//! Document upload: the progress protocol and a client for it.

pub mod client;
pub mod progress;

pub use client::{UploadClient, UploadClientError, validate_files};
pub use progress::{ProgressDecoder, ProgressError, ProgressTracker, UploadOutcome, UploadProgressEvent};
