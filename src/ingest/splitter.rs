//! Recursive character splitter.
//!
//! Splits on the coarsest separator present, recurses into pieces that are
//! still too long with the finer separators, then greedily merges pieces back
//! into chunks of at most `chunk_size` characters, repeating up to
//! `chunk_overlap` characters of the previous chunk at the start of the next.

pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
pub struct InvalidChunking {
    pub size: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::with_separators(1000, 200)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

impl RecursiveSplitter {
    /// # Errors
    ///
    /// Returns [`InvalidChunking`] if `chunk_overlap` is not smaller than `chunk_size`.
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, InvalidChunking> {
        if chunk_overlap >= chunk_size {
            return Err(InvalidChunking {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self::with_separators(chunk_size, chunk_overlap))
    }

    fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn split_text(
        &self,
        text: &str,
    ) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(
        &self,
        text: &str,
        separators: &[String],
    ) -> Vec<String> {
        let (separator, finer) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(sep.as_str()))
            .map_or(("", &[][..]), |(i, sep)| (sep.as_str(), &separators[i + 1..]));

        let splits: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).map(str::to_string).collect()
        };

        let mut chunks = Vec::new();
        let mut short = Vec::new();
        for split in splits {
            if char_len(&split) < self.chunk_size {
                short.push(split);
                continue;
            }
            if !short.is_empty() {
                chunks.extend(self.merge(&short, separator));
                short.clear();
            }
            if finer.is_empty() {
                chunks.push(split);
            } else {
                chunks.extend(self.split_with(&split, finer));
            }
        }
        if !short.is_empty() {
            chunks.extend(self.merge(&short, separator));
        }
        chunks
    }

    fn merge(
        &self,
        splits: &[String],
        separator: &str,
    ) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0;

        for split in splits {
            let len = char_len(split);
            let joined_sep = if window.is_empty() { 0 } else { sep_len };

            if total + len + joined_sep > self.chunk_size && !window.is_empty() {
                if total > self.chunk_size {
                    tracing::warn!("Created a chunk of size {total}, which is longer than the specified {}", self.chunk_size);
                }
                push_trimmed(&mut chunks, &window.join(separator));

                while total > self.chunk_overlap
                    || (total + len + if window.is_empty() { 0 } else { sep_len } > self.chunk_size && total > 0)
                {
                    let removed = window.remove(0);
                    total -= char_len(removed) + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push(split);
        }

        push_trimmed(&mut chunks, &window.join(separator));
        chunks
    }
}

fn push_trimmed(
    chunks: &mut Vec<String>,
    chunk: &str,
) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = RecursiveSplitter::default();
        assert_eq!(splitter.split_text("Just one line."), vec!["Just one line."]);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let splitter = RecursiveSplitter::new(20, 8).unwrap();
        let text = "one two three four five six seven eight nine ten";
        let chunks = splitter.split_text(text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 20, "{chunk:?}");
        }
        // Consecutive chunks share at least one word.
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').next_back().unwrap();
            assert!(pair[1].contains(last_word), "{pair:?}");
        }
        assert_eq!(chunks.first().unwrap(), "one two three four");
    }

    #[test]
    fn test_prefers_paragraph_breaks() {
        let splitter = RecursiveSplitter::new(30, 0).unwrap();
        let text = "First paragraph here.\n\nSecond paragraph here.";
        assert_eq!(
            splitter.split_text(text),
            vec!["First paragraph here.", "Second paragraph here."]
        );
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let splitter = RecursiveSplitter::new(10, 2).unwrap();
        let chunks = splitter.split_text(&"x".repeat(25));
        assert!(chunks.iter().all(|c| char_len(c) <= 10));
        assert_eq!(chunks[0], "x".repeat(10));
    }

    #[test]
    fn test_overlap_not_below_size_is_rejected() {
        assert_eq!(
            RecursiveSplitter::new(100, 100).unwrap_err(),
            InvalidChunking { size: 100, overlap: 100 }
        );
        assert!(RecursiveSplitter::new(0, 0).is_err());
        assert!(RecursiveSplitter::new(100, 99).is_ok());
    }
}
