//! Tesseract-backed OCR engine.
//!
//! Shells out to an external `tesseract` binary and parses its TSV word
//! output. The binary path and language come from configuration; the
//! engine holds no other state, so one instance serves concurrent
//! pipeline runs.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::error::OcrError;
use crate::models::config::OcrConfig;

use super::{BoundingBox, OcrEngine, RecognizedToken};

/// OCR engine driving a tesseract binary in TSV mode.
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(config.binary.clone(), config.language.clone())
    }

    /// Parse tesseract TSV output. Word rows have level 5; rows with
    /// confidence -1 are structural and carry no text.
    fn parse_tsv(output: &str) -> Vec<RecognizedToken> {
        let mut tokens = Vec::new();

        for line in output.lines().skip(1) {
            let columns: Vec<&str> = line.split('\t').collect();
            if columns.len() < 12 {
                continue;
            }
            if columns[0] != "5" {
                continue;
            }

            let text = columns[11].trim();
            if text.is_empty() {
                continue;
            }

            let conf: f32 = match columns[10].parse() {
                Ok(c) if c >= 0.0 => c,
                _ => continue,
            };

            let (left, top, width, height) = match (
                columns[6].parse::<f32>(),
                columns[7].parse::<f32>(),
                columns[8].parse::<f32>(),
                columns[9].parse::<f32>(),
            ) {
                (Ok(l), Ok(t), Ok(w), Ok(h)) => (l, t, w, h),
                _ => continue,
            };

            tokens.push(RecognizedToken {
                text: text.to_string(),
                bbox: BoundingBox::new(left, top, width, height),
                confidence: (conf / 100.0).clamp(0.0, 1.0),
            });
        }

        tokens
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &[u8]) -> Result<Vec<RecognizedToken>, OcrError> {
        let mut input = tempfile::NamedTempFile::with_suffix(".png")
            .map_err(|e| OcrError::EngineUnavailable(e.to_string()))?;
        input
            .write_all(image)
            .map_err(|e| OcrError::EngineUnavailable(e.to_string()))?;

        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("tsv")
            .output()
            .map_err(|e| {
                OcrError::EngineUnavailable(format!("{}: {}", self.binary.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tokens = Self::parse_tsv(&stdout);
        debug!(tokens = tokens.len(), "tesseract recognized tokens");
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
        1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t\n\
        5\t1\t1\t1\t1\t1\t10\t20\t80\t14\t96.5\tClaim\n\
        5\t1\t1\t1\t1\t2\t95\t20\t90\t14\t91.2\tNumber:\n\
        5\t1\t1\t1\t1\t3\t190\t20\t70\t14\t-1\t\n";

    #[test]
    fn test_parse_tsv_word_rows() {
        let tokens = TesseractEngine::parse_tsv(SAMPLE_TSV);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "Claim");
        assert!((tokens[0].confidence - 0.965).abs() < 1e-4);
        assert_eq!(tokens[1].bbox, BoundingBox::new(95.0, 20.0, 90.0, 14.0));
    }

    #[test]
    fn test_parse_tsv_skips_structural_rows() {
        let tokens = TesseractEngine::parse_tsv("level\nnot-a-row\n");
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_missing_binary_is_engine_unavailable() {
        let engine = TesseractEngine::new("/nonexistent/tesseract", "eng");
        let err = engine.recognize(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable(_)));
    }
}
