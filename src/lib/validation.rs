//! Input validation for command-line parameters and files.

use noodles::sam::alignment::record::data::field::Tag;
use std::path::Path;

use crate::errors::{Result, UmiecError};

/// Checks that an input file exists.
///
/// # Errors
/// Returns [`UmiecError::InvalidFileFormat`] if the path does not exist.
///
/// # Example
/// ```no_run
/// use umiec_lib::validation::validate_file_exists;
///
/// validate_file_exists("input.bam", "Input BAM").unwrap();
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        Ok(())
    } else {
        Err(UmiecError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path.display().to_string(),
            reason: "File does not exist".to_string(),
        })
    }
}

/// Parses a two-character SAM tag.
///
/// # Errors
/// Returns [`UmiecError::InvalidParameter`] unless the tag is two ASCII characters.
///
/// # Example
/// ```
/// use noodles::sam::alignment::record::data::field::Tag;
/// use umiec_lib::validation::validate_tag;
///
/// let tag = validate_tag("RX", "UMI tag").unwrap();
/// assert_eq!(tag, Tag::new(b'R', b'X'));
/// assert!(validate_tag("RXX", "UMI tag").is_err());
/// ```
pub fn validate_tag(tag: &str, name: &str) -> Result<Tag> {
    match tag.as_bytes() {
        &[a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphanumeric() => Ok(Tag::new(a, b)),
        _ => Err(UmiecError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Tag must be two characters, a letter then a letter or digit, got: '{tag}'"),
        }),
    }
}

/// Checks that a frequency lies in `(0, 1]`.
///
/// # Errors
/// Returns [`UmiecError::InvalidFrequency`] otherwise.
pub fn validate_frequency(value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(UmiecError::InvalidFrequency { value, min: 0.0, max: 1.0 })
    }
}

/// Converts a percentage in `(0, 100]` to a fraction.
///
/// # Errors
/// Returns [`UmiecError::InvalidFrequency`] for values outside the range.
///
/// # Example
/// ```
/// use umiec_lib::validation::percent_to_fraction;
///
/// assert_eq!(percent_to_fraction(60.0).unwrap(), 0.6);
/// assert!(percent_to_fraction(0.0).is_err());
/// ```
pub fn percent_to_fraction(percent: f64) -> Result<f64> {
    if percent > 0.0 && percent <= 100.0 {
        Ok(percent / 100.0)
    } else {
        Err(UmiecError::InvalidFrequency { value: percent, min: 0.0, max: 100.0 })
    }
}

/// Checks that a fraction lies in `[0, 1]`.
///
/// # Errors
/// Returns [`UmiecError::InvalidParameter`] otherwise.
pub fn validate_fraction(value: f64, name: &str) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(UmiecError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("must be between 0 and 1, got {value}"),
        })
    }
}

/// Checks that a value is at least one.
///
/// # Errors
/// Returns [`UmiecError::InvalidParameter`] if `value` is zero.
pub fn validate_positive(value: usize, name: &str) -> Result<()> {
    if value == 0 {
        Err(UmiecError::InvalidParameter {
            parameter: name.to_string(),
            reason: "must be at least 1".to_string(),
        })
    } else {
        Ok(())
    }
}
