//! Phred-scale helpers for consensus base qualities.
//!
//! A consensus base's quality expresses how unanimous its family was: the error probability
//! is taken to be `1 - frequency` of the winning allele and converted to the Phred scale,
//! `Q = -10 * log10(p_error)`, then clamped into `[MIN_PHRED, MAX_CONSENSUS_PHRED]`.

/// Phred score type
pub type PhredScore = u8;

/// Lowest quality ever emitted; also the quality of a no-call.
pub const MIN_PHRED: PhredScore = 2;

/// Quality of a unanimous consensus base.
pub const MAX_CONSENSUS_PHRED: PhredScore = 60;

/// Base emitted when no allele reaches the consensus threshold.
pub const NO_CALL_BASE: u8 = b'N';

/// Converts the supporting frequency of a consensus base into a Phred quality.
///
/// # Examples
///
/// ```
/// use umiec_consensus::phred::frequency_to_phred;
///
/// assert_eq!(frequency_to_phred(1.0), 60);
/// assert_eq!(frequency_to_phred(0.9), 10);
/// assert_eq!(frequency_to_phred(0.7), 5);
/// assert_eq!(frequency_to_phred(0.0), 2);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn frequency_to_phred(frequency: f64) -> PhredScore {
    let error = 1.0 - frequency;
    if error <= 0.0 {
        return MAX_CONSENSUS_PHRED;
    }
    let q = (-10.0 * error.log10()).round();
    q.clamp(f64::from(MIN_PHRED), f64::from(MAX_CONSENSUS_PHRED)) as PhredScore
}
