//! Aligned reads and their per-reference-position columns.
//!
//! An [`AlignedRead`] is the minimal view of a mapped BAM record the consensus engine needs:
//! where it aligns, how (its CIGAR), what it reads, and which UMI it carries. Its alignment is
//! exposed as an ordered stream of [`Column`]s: one per aligned base, one per inserted base
//! and one per deleted reference base. Clips and pads produce nothing; reference skips (`N`)
//! advance the reference position silently.

use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::cigar::op::Kind;

use crate::ConsensusError;

/// Strand of the alignment relative to the reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Strand {
    /// Forward strand
    #[default]
    Positive,
    /// Reverse strand
    Negative,
}

/// One column of an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// A read base aligned to a reference position
    Match {
        /// 0-based reference position
        ref_pos: usize,
        /// The read base
        base: u8,
        /// The base quality
        qual: u8,
    },
    /// A read base inserted after a reference position
    Insertion {
        /// 0-based reference position the insertion follows
        after_ref_pos: usize,
        /// The inserted base
        base: u8,
        /// The base quality
        qual: u8,
    },
    /// A reference position deleted from the read
    Deletion {
        /// 0-based reference position
        ref_pos: usize,
    },
}

/// A mapped read with its UMI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    /// Read name
    pub id: String,
    /// Index of the contig in the BAM header
    pub contig_id: usize,
    /// 0-based position of the first aligned reference base
    pub start: usize,
    /// Alignment operations
    pub cigar: Vec<Op>,
    /// Read bases (uppercase)
    pub bases: Vec<u8>,
    /// Phred base qualities (numeric, not ASCII)
    pub quals: Vec<u8>,
    /// UMI barcode
    pub umi: String,
    /// Alignment strand
    pub strand: Strand,
}

impl AlignedRead {
    /// Number of reference bases covered by the alignment, including deletions and skips.
    #[must_use]
    pub fn reference_len(&self) -> usize {
        self.cigar.iter().filter(|op| consumes_reference(op.kind())).map(|op| op.len()).sum()
    }

    /// 0-based exclusive end of the alignment on the reference.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.reference_len()
    }

    /// Iterates over the alignment columns in reference order.
    ///
    /// Insertions that precede the first aligned reference base have no anchor inside the
    /// read and are not reported.
    #[must_use]
    pub fn columns(&self) -> Columns<'_> {
        Columns { read: self, op_idx: 0, op_offset: 0, ref_pos: self.start, read_pos: 0, anchored: false }
    }

    /// Checks that the read is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns [`ConsensusError::MalformedRead`] if bases and qualities differ in length, the
    /// CIGAR query length does not match the bases, the CIGAR consumes no reference, or the
    /// UMI is empty.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        let malformed =
            |reason: String| ConsensusError::MalformedRead { read: self.id.clone(), reason };

        if self.bases.len() != self.quals.len() {
            return Err(malformed(format!(
                "{} bases but {} qualities",
                self.bases.len(),
                self.quals.len()
            )));
        }
        let query_len: usize =
            self.cigar.iter().filter(|op| consumes_read(op.kind())).map(|op| op.len()).sum();
        if query_len != self.bases.len() {
            return Err(malformed(format!(
                "CIGAR query length {query_len} does not match {} bases",
                self.bases.len()
            )));
        }
        if self.reference_len() == 0 {
            return Err(malformed("CIGAR has no reference-consuming operation".to_string()));
        }
        if self.umi.is_empty() {
            return Err(malformed("missing UMI".to_string()));
        }
        Ok(())
    }
}

/// Iterator over the [`Column`]s of an [`AlignedRead`].
pub struct Columns<'a> {
    read: &'a AlignedRead,
    op_idx: usize,
    op_offset: usize,
    ref_pos: usize,
    read_pos: usize,
    /// Whether a reference base has been passed, i.e. insertions have an anchor
    anchored: bool,
}

impl Iterator for Columns<'_> {
    type Item = Column;

    fn next(&mut self) -> Option<Column> {
        loop {
            let op = self.read.cigar.get(self.op_idx)?;
            if self.op_offset >= op.len() {
                self.op_idx += 1;
                self.op_offset = 0;
                continue;
            }
            self.op_offset += 1;

            match op.kind() {
                Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch => {
                    let column = Column::Match {
                        ref_pos: self.ref_pos,
                        base: self.read.bases[self.read_pos],
                        qual: self.read.quals[self.read_pos],
                    };
                    self.ref_pos += 1;
                    self.read_pos += 1;
                    self.anchored = true;
                    return Some(column);
                }
                Kind::Insertion => {
                    let (base, qual) =
                        (self.read.bases[self.read_pos], self.read.quals[self.read_pos]);
                    self.read_pos += 1;
                    if self.anchored {
                        return Some(Column::Insertion { after_ref_pos: self.ref_pos - 1, base, qual });
                    }
                }
                Kind::Deletion => {
                    let column = Column::Deletion { ref_pos: self.ref_pos };
                    self.ref_pos += 1;
                    self.anchored = true;
                    return Some(column);
                }
                Kind::Skip => {
                    self.ref_pos += 1;
                    self.anchored = true;
                }
                Kind::SoftClip => self.read_pos += 1,
                Kind::HardClip | Kind::Pad => {}
            }
        }
    }
}

fn consumes_reference(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Match | Kind::SequenceMatch | Kind::SequenceMismatch | Kind::Deletion | Kind::Skip
    )
}

fn consumes_read(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Match
            | Kind::SequenceMatch
            | Kind::SequenceMismatch
            | Kind::Insertion
            | Kind::SoftClip
    )
}

/// Parses a CIGAR string such as `10M2I5M` into operations.
///
/// # Errors
///
/// Returns [`ConsensusError::InvalidCigar`] for unknown operations or missing lengths.
///
/// # Examples
///
/// ```
/// use umiec_consensus::read::parse_cigar;
///
/// let ops = parse_cigar("3S10M1D4M").unwrap();
/// assert_eq!(ops.len(), 4);
/// assert!(parse_cigar("10Q").is_err());
/// ```
pub fn parse_cigar(cigar: &str) -> Result<Vec<Op>, ConsensusError> {
    let invalid = |reason: &str| ConsensusError::InvalidCigar {
        cigar: cigar.to_string(),
        reason: reason.to_string(),
    };
    let mut ops = Vec::new();
    let mut len: Option<usize> = None;
    for c in cigar.chars() {
        if let Some(digit) = c.to_digit(10) {
            len = Some(len.unwrap_or(0) * 10 + digit as usize);
            continue;
        }
        let kind = match c {
            'M' => Kind::Match,
            'I' => Kind::Insertion,
            'D' => Kind::Deletion,
            'N' => Kind::Skip,
            'S' => Kind::SoftClip,
            'H' => Kind::HardClip,
            'P' => Kind::Pad,
            '=' => Kind::SequenceMatch,
            'X' => Kind::SequenceMismatch,
            _ => return Err(invalid("unknown operation")),
        };
        let n = len.take().ok_or_else(|| invalid("operation without a length"))?;
        ops.push(Op::new(kind, n));
    }
    if len.is_some() {
        return Err(invalid("trailing length without an operation"));
    }
    Ok(ops)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    /// Builds a forward-strand read on contig 0 with uniform quality 30.
    pub(crate) fn read(id: &str, start: usize, cigar: &str, bases: &str, umi: &str) -> AlignedRead {
        AlignedRead {
            id: id.to_string(),
            contig_id: 0,
            start,
            cigar: parse_cigar(cigar).unwrap(),
            bases: bases.as_bytes().to_vec(),
            quals: vec![30; bases.len()],
            umi: umi.to_string(),
            strand: Strand::Positive,
        }
    }

    #[test]
    fn test_columns_simple_match() {
        let r = read("r1", 10, "3M", "ACG", "AAAA");
        let cols: Vec<Column> = r.columns().collect();
        assert_eq!(
            cols,
            vec![
                Column::Match { ref_pos: 10, base: b'A', qual: 30 },
                Column::Match { ref_pos: 11, base: b'C', qual: 30 },
                Column::Match { ref_pos: 12, base: b'G', qual: 30 },
            ]
        );
        assert_eq!(r.end(), 13);
    }

    #[test]
    fn test_columns_with_indels_and_clips() {
        let r = read("r1", 100, "2S2M1I1M2D1M", "TTACGTA", "AAAA");
        let cols: Vec<Column> = r.columns().collect();
        assert_eq!(
            cols,
            vec![
                Column::Match { ref_pos: 100, base: b'A', qual: 30 },
                Column::Match { ref_pos: 101, base: b'C', qual: 30 },
                Column::Insertion { after_ref_pos: 101, base: b'G', qual: 30 },
                Column::Match { ref_pos: 102, base: b'T', qual: 30 },
                Column::Deletion { ref_pos: 103 },
                Column::Deletion { ref_pos: 104 },
                Column::Match { ref_pos: 105, base: b'A', qual: 30 },
            ]
        );
        assert_eq!(r.reference_len(), 6);
        r.validate().unwrap();
    }

    #[test]
    fn test_leading_insertion_has_no_column() {
        let r = read("r1", 5, "1I2M", "GAC", "AAAA");
        let cols: Vec<Column> = r.columns().collect();
        assert_eq!(cols.len(), 2);
        assert!(matches!(cols[0], Column::Match { ref_pos: 5, base: b'A', .. }));
    }

    #[test]
    fn test_skip_advances_reference() {
        let r = read("r1", 0, "1M3N1M", "AC", "AAAA");
        let positions: Vec<usize> = r
            .columns()
            .map(|c| match c {
                Column::Match { ref_pos, .. } | Column::Deletion { ref_pos } => ref_pos,
                Column::Insertion { after_ref_pos, .. } => after_ref_pos,
            })
            .collect();
        assert_eq!(positions, vec![0, 4]);
    }

    #[rstest]
    #[case(read("bad", 0, "4M", "ACG", "AAAA"), "CIGAR query length")]
    #[case(read("bad", 0, "3M", "ACG", ""), "missing UMI")]
    #[case(read("bad", 0, "3S", "ACG", "AAAA"), "no reference-consuming")]
    fn test_validate_rejects(#[case] r: AlignedRead, #[case] expected: &str) {
        let err = r.validate().unwrap_err();
        assert!(err.to_string().contains(expected), "{err}");
    }

    #[test]
    fn test_validate_rejects_quality_mismatch() {
        let mut r = read("bad", 0, "3M", "ACG", "AAAA");
        r.quals.pop();
        assert!(matches!(r.validate(), Err(ConsensusError::MalformedRead { .. })));
    }

    #[rstest]
    #[case("10M", 1)]
    #[case("5S10M2I3M1D4M", 6)]
    #[case("", 0)]
    fn test_parse_cigar(#[case] cigar: &str, #[case] expected: usize) {
        assert_eq!(parse_cigar(cigar).unwrap().len(), expected);
    }

    #[rstest]
    #[case("M")]
    #[case("10")]
    #[case("3Z")]
    fn test_parse_cigar_invalid(#[case] cigar: &str) {
        assert!(parse_cigar(cigar).is_err());
    }
}
