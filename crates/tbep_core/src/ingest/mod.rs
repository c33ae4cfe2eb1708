//! Input file validation and CSV/TSV readers.
//!
//! # Responsibility
//! - Reject missing files and unsupported extensions before any mutation.
//! - Pick the delimiter from the extension (`.tsv` is tab separated).
//! - Hand records to planners as a stream; nothing here buffers a file.
//!
//! # Invariants
//! - Validation failures surface as `ValidationError`, never as I/O errors.

use crate::error::{PipelineResult, ValidationError};
use std::fs::File;
use std::path::Path;

pub mod metadata;
pub mod reference;

/// Accepted extensions and their delimiters.
const DELIMITED_EXTENSIONS: &[(&str, u8)] = &[("csv", b','), ("txt", b','), ("tsv", b'\t')];

/// Returns the delimiter for `path`, or a validation error for unsupported
/// or missing inputs.
pub fn validate_input(path: &Path) -> Result<u8, ValidationError> {
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let delimiter = DELIMITED_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == extension)
        .map(|(_, delimiter)| *delimiter)
        .ok_or_else(|| ValidationError::UnsupportedExtension(path.to_path_buf()))?;

    if !path.is_file() {
        return Err(ValidationError::MissingFile(path.to_path_buf()));
    }
    Ok(delimiter)
}

/// Opens a validated delimited file.
///
/// `has_headers = false` is used for headerless triple and pair files.
pub fn open_reader(path: &Path, has_headers: bool) -> PipelineResult<csv::Reader<File>> {
    let delimiter = validate_input(path)?;
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    Ok(reader)
}

/// Reads the header row of a headed reader as owned strings.
pub fn header_row<R: std::io::Read>(reader: &mut csv::Reader<R>) -> PipelineResult<Vec<String>> {
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::{open_reader, validate_input};
    use crate::error::{PipelineError, ValidationError};
    use std::fs;

    #[test]
    fn delimiter_follows_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("data.CSV");
        let tsv_path = dir.path().join("data.tsv");
        fs::write(&csv_path, "a,b\n").unwrap();
        fs::write(&tsv_path, "a\tb\n").unwrap();

        assert_eq!(validate_input(&csv_path).unwrap(), b',');
        assert_eq!(validate_input(&tsv_path).unwrap(), b'\t');
    }

    #[test]
    fn unsupported_extension_is_rejected_before_existence_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        assert_eq!(
            validate_input(&path).unwrap_err(),
            ValidationError::UnsupportedExtension(path.clone())
        );
    }

    #[test]
    fn missing_file_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        let err = open_reader(&path, true).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::MissingFile(missing)) if missing == path
        ));
    }
}
