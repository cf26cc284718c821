use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::IngestError;

/// Text of one source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub source: String,
    pub text: String,
}

/// Reads a PDF (by extension) or a UTF-8 text file.
///
/// # Errors
///
/// Returns [`IngestError::Load`] when the file cannot be read or parsed.
pub fn load_document(path: &Path) -> Result<LoadedDocument, IngestError> {
    let source = path.display().to_string();
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let text = if is_pdf {
        pdf_extract::extract_text(path).map_err(|e| IngestError::Load {
            path: source.clone(),
            reason: e.to_string(),
        })?
    } else {
        std::fs::read_to_string(path).map_err(|e| IngestError::Load {
            path: source.clone(),
            reason: e.to_string(),
        })?
    };

    tracing::info!("Loaded {source} ({} characters)", text.chars().count());
    Ok(LoadedDocument { source, text })
}

struct Normalizer {
    newlines: Regex,
    hyphenated: Regex,
    spaces: Regex,
}

static NORMALIZER: OnceLock<Normalizer> = OnceLock::new();

/// Flattens extracted text: newline runs become a space, `word - word`
/// is joined, and whitespace runs collapse to one space.
#[must_use]
pub fn formatted_text(input: &str) -> String {
    let normalizer = NORMALIZER.get_or_init(|| Normalizer {
        newlines: Regex::new(r"\n+").unwrap(),
        hyphenated: Regex::new(r"(\w) - (\w)").unwrap(),
        spaces: Regex::new(r"\s+").unwrap(),
    });

    let text = normalizer.newlines.replace_all(input, " ");
    let text = normalizer.hyphenated.replace_all(&text, "$1$2");
    normalizer.spaces.replace_all(&text, " ").into_owned()
}
