//! Utilities for generating test BAM, BED and FASTA inputs programmatically.

use std::fs;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use bstr::BString;
use noodles::bam;
use noodles::core::Position;
use noodles::sam::Header;
use noodles::sam::alignment::io::Write as AlignmentWrite;
use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::MappingQuality;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::ReferenceSequence;
use umiec_lib::consensus::parse_cigar;

/// Creates a header with the given contigs.
pub fn create_header(contigs: &[(&str, usize)]) -> Header {
    let mut builder = Header::builder();
    for (name, len) in contigs {
        builder = builder.add_reference_sequence(
            BString::from(*name),
            Map::<ReferenceSequence>::new(NonZeroUsize::new(*len).expect("non-zero length")),
        );
    }
    builder.build()
}

/// Creates a mapped, primary read with an RX tag.
///
/// `start` is 1-based; qualities are 30 throughout.
pub fn create_read(
    name: &str,
    contig_id: usize,
    start: usize,
    cigar: &str,
    sequence: &str,
    umi: &str,
) -> RecordBuf {
    let mut record = RecordBuf::default();
    *record.name_mut() = Some(BString::from(name));
    *record.flags_mut() = Flags::empty();
    *record.reference_sequence_id_mut() = Some(contig_id);
    *record.alignment_start_mut() = Position::new(start);
    *record.mapping_quality_mut() = MappingQuality::new(60);
    *record.cigar_mut() = parse_cigar(cigar).expect("valid CIGAR").into_iter().collect();
    *record.sequence_mut() = sequence.as_bytes().to_vec().into();
    *record.quality_scores_mut() = vec![30; sequence.len()].into();
    record.data_mut().insert(Tag::new(b'R', b'X'), Value::String(BString::from(umi)));
    record
}

/// Creates `depth` identical reads of one UMI family starting at a 1-based position.
pub fn create_umi_family(
    umi: &str,
    depth: usize,
    base_name: &str,
    start: usize,
    sequence: &str,
) -> Vec<RecordBuf> {
    let cigar = format!("{}M", sequence.len());
    (0..depth)
        .map(|i| create_read(&format!("{base_name}_{i}"), 0, start, &cigar, sequence, umi))
        .collect()
}

/// Writes records to a BAM file.
pub fn write_bam(path: &Path, header: &Header, records: &[RecordBuf]) {
    let mut writer = bam::io::Writer::new(fs::File::create(path).expect("create BAM"));
    writer.write_header(header).expect("write header");
    for record in records {
        writer.write_alignment_record(header, record).expect("write record");
    }
    writer.finish(header).expect("finish BAM");
}

/// Reads every record of a BAM file.
pub fn read_bam(path: &Path) -> (Header, Vec<RecordBuf>) {
    let mut reader = bam::io::Reader::new(fs::File::open(path).expect("open BAM"));
    let header = reader.read_header().expect("read header");
    let records =
        reader.record_bufs(&header).collect::<Result<Vec<_>, _>>().expect("read records");
    (header, records)
}

/// Writes a BED file with one line per `(contig, start, end, name)`.
pub fn write_bed(dir: &Path, intervals: &[(&str, usize, usize, &str)]) -> PathBuf {
    let path = dir.join("targets.bed");
    let mut file = fs::File::create(&path).expect("create BED");
    writeln!(file, "track name=targets").expect("write BED");
    for (contig, start, end, name) in intervals {
        writeln!(file, "{contig}\t{start}\t{end}\t{name}").expect("write BED");
    }
    path
}

/// Writes a single-contig FASTA file.
pub fn write_fasta(dir: &Path, contig: &str, sequence: &str) -> PathBuf {
    let path = dir.join("ref.fa");
    let mut file = fs::File::create(&path).expect("create FASTA");
    writeln!(file, ">{contig}").expect("write FASTA");
    for line in sequence.as_bytes().chunks(60) {
        file.write_all(line).expect("write FASTA");
        writeln!(file).expect("write FASTA");
    }
    path
}
