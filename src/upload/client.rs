//! Client for the BFF upload route.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::multipart::{Form, Part};

use super::progress::{ProgressDecoder, ProgressError, ProgressTracker, UploadOutcome, UploadProgressEvent};
use crate::routes::upload::DOCS_FIELD;

pub const DEFAULT_NAMESPACE: &str = "testing-ui-files";
const ACCEPTED_TYPES: &[&str] = &["application/pdf", "text/plain"];

#[derive(Debug, thiserror::Error)]
pub enum UploadClientError {
    #[error("no files to upload")]
    NoFiles,
    #[error("{path}: only PDF and TXT files are supported (got {mime})")]
    UnsupportedFile { path: PathBuf, mime: String },
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upload rejected with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

fn accepted_mime(path: &Path) -> Result<&'static str, UploadClientError> {
    let guess = mime_guess::from_path(path).first();
    let essence = guess.as_ref().map(|mime| mime.essence_str()).unwrap_or("unknown");
    ACCEPTED_TYPES
        .iter()
        .find(|accepted| **accepted == essence)
        .copied()
        .ok_or_else(|| UploadClientError::UnsupportedFile {
            path: path.to_path_buf(),
            mime: essence.to_string(),
        })
}

/// Rejects anything that is not a PDF or a text file.
///
/// # Errors
///
/// Returns [`UploadClientError::NoFiles`] for an empty list and
/// [`UploadClientError::UnsupportedFile`] for the first unsupported path.
pub fn validate_files(paths: &[PathBuf]) -> Result<(), UploadClientError> {
    if paths.is_empty() {
        return Err(UploadClientError::NoFiles);
    }
    for path in paths {
        accepted_mime(path)?;
    }
    Ok(())
}

pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
    namespace: String,
}

impl UploadClient {
    /// `base_url` is the BFF root, e.g. `http://127.0.0.1:8080`.
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    #[must_use]
    pub fn with_namespace(
        mut self,
        namespace: impl Into<String>,
    ) -> Self {
        self.namespace = namespace.into();
        self
    }

    async fn build_form(
        &self,
        paths: &[PathBuf],
    ) -> Result<Form, UploadClientError> {
        let mut form = Form::new();
        for path in paths {
            let mime = accepted_mime(path)?;
            let data = tokio::fs::read(path).await.map_err(|source| UploadClientError::Io {
                path: path.clone(),
                source,
            })?;
            let filename = path
                .file_name()
                .map_or_else(|| "document".to_string(), |name| name.to_string_lossy().into_owned());
            form = form.part(DOCS_FIELD, Part::bytes(data).file_name(filename).mime_str(mime)?);
        }
        Ok(form.text("namespace", self.namespace.clone()))
    }

    /// Uploads `paths` and reports each progress event to `on_progress`
    /// together with its percentage.
    ///
    /// Every file is validated and read before the first request is made.
    ///
    /// # Errors
    ///
    /// Returns validation, transport, status and progress-sequence errors.
    /// A stream that ends early is not an error; it is reported as
    /// [`UploadOutcome::Incomplete`].
    pub async fn upload(
        &self,
        paths: &[PathBuf],
        mut on_progress: impl FnMut(&UploadProgressEvent, u8),
    ) -> Result<UploadOutcome, UploadClientError> {
        validate_files(paths)?;
        let form = self.build_form(paths).await?;

        let url = format!("{}/api/upload", self.base_url);
        tracing::info!("Uploading {} file(s) to {url}", paths.len());
        let response = self.http.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut decoder = ProgressDecoder::new();
        let mut tracker = ProgressTracker::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            for event in decoder.push(&chunk?)? {
                let percent = tracker.observe(event.clone())?;
                on_progress(&event, percent);
            }
        }

        if let Err(e) = decoder.finish() {
            tracing::warn!("Upload stream was cut short: {e}");
        }
        Ok(tracker.outcome())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_and_txt_are_accepted() {
        let paths = vec![PathBuf::from("cv.pdf"), PathBuf::from("notes.txt"), PathBuf::from("UPPER.PDF")];
        assert!(validate_files(&paths).is_ok());
    }

    #[test]
    fn test_other_types_are_rejected() {
        let paths = vec![PathBuf::from("cv.pdf"), PathBuf::from("photo.png")];
        match validate_files(&paths) {
            Err(UploadClientError::UnsupportedFile { path, mime }) => {
                assert_eq!(path, PathBuf::from("photo.png"));
                assert_eq!(mime, "image/png");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            validate_files(&[PathBuf::from("README")]),
            Err(UploadClientError::UnsupportedFile { .. })
        ));
        assert!(matches!(validate_files(&[]), Err(UploadClientError::NoFiles)));
    }

    #[tokio::test]
    async fn test_rejects_before_any_network_call() {
        // Nothing listens on this address; reaching the network would be a
        // Request error rather than UnsupportedFile.
        let client = UploadClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let mut calls = 0;
        let result = client
            .upload(&[PathBuf::from("slides.pptx")], |_, _| calls += 1)
            .await;
        assert!(matches!(result, Err(UploadClientError::UnsupportedFile { .. })));
        assert_eq!(calls, 0);
    }
}
