//! Streaming corpus readers
//!
//! Reads documents from plain text (one document per line), JSON arrays,
//! or JSONL, with automatic gzip decompression by file extension.
//! Malformed input aborts the batch with the offending line number.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::{Error, Result};
use rapidsift_core::Document;

/// Corpus serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    /// One document per line; ids assigned sequentially
    Text,
    /// Top-level array of document objects, or one object per line
    Json,
}

impl std::str::FromStr for CorpusFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(CorpusFormat::Text),
            "json" | "jsonl" => Ok(CorpusFormat::Json),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Infer the corpus format from a file extension (`.gz` is looked
/// through). Unrecognized extensions default to text.
pub fn detect_format(path: &Path) -> CorpusFormat {
    let mut path = path.to_path_buf();
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        path.set_extension("");
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") | Some("jsonl") | Some("ndjson") => CorpusFormat::Json,
        _ => CorpusFormat::Text,
    }
}

/// Open a corpus file, transparently decompressing `.gz`.
fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        debug!("Opening gzip-compressed corpus {}", path.display());
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Streaming line-oriented document reader.
///
/// Yields one document per non-empty line; in JSON mode each line must
/// be a document object and a malformed line is an error (invalid input
/// aborts the batch rather than silently shrinking it).
pub struct DocumentReader<R: BufRead> {
    reader: R,
    format: CorpusFormat,
    line_number: usize,
    emitted: usize,
}

impl DocumentReader<Box<dyn BufRead>> {
    pub fn open(path: &Path, format: Option<CorpusFormat>) -> Result<Self> {
        let format = format.unwrap_or_else(|| detect_format(path));
        Ok(Self::new(open_reader(path)?, format))
    }
}

impl<R: BufRead> DocumentReader<R> {
    pub fn new(reader: R, format: CorpusFormat) -> Self {
        Self {
            reader,
            format,
            line_number: 0,
            emitted: 0,
        }
    }

    pub fn lines_read(&self) -> usize {
        self.line_number
    }
}

impl<R: BufRead> Iterator for DocumentReader<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    let trimmed = line.trim_end_matches(['\n', '\r']);
                    if trimmed.trim().is_empty() {
                        continue;
                    }
                    let result = match self.format {
                        CorpusFormat::Text => {
                            let doc = Document::new(format!("doc-{}", self.emitted), trimmed);
                            self.emitted += 1;
                            Ok(doc)
                        }
                        CorpusFormat::Json => match serde_json::from_str::<Document>(trimmed) {
                            Ok(doc) => {
                                self.emitted += 1;
                                Ok(doc)
                            }
                            Err(e) => Err(Error::InvalidInput {
                                line: self.line_number,
                                message: e.to_string(),
                            }),
                        },
                    };
                    return Some(result);
                }
                Err(e) => return Some(Err(Error::Io(e))),
            }
        }
    }
}

/// Load a whole corpus into memory.
///
/// JSON input may be a top-level array or newline-delimited objects;
/// text input is one document per line with sequential ids.
pub fn read_documents(path: &Path, format: Option<CorpusFormat>) -> Result<Vec<Document>> {
    let format = format.unwrap_or_else(|| detect_format(path));

    if format == CorpusFormat::Json {
        // peek at the first non-whitespace byte to distinguish an array
        // from JSONL
        let mut content = String::new();
        open_reader(path)?.read_to_string(&mut content)?;
        if content.trim_start().starts_with('[') {
            let docs: Vec<Document> = serde_json::from_str(&content)?;
            return Ok(docs);
        }
        return DocumentReader::new(content.as_bytes(), CorpusFormat::Json).collect();
    }

    DocumentReader::open(path, Some(format))?.collect()
}
