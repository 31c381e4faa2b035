#![allow(dead_code)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use bam2rpkm::genomics::FLAG_DUPLICATE;
use rust_htslib::bam::{
    self, header::Header, header::HeaderRecord, record::CigarString, Record, Writer,
};

const UPDATE_SNAPSHOTS: &str = "BAM2RPKM_UPDATE_SNAPSHOTS";

/// Compare `actual` with `tests/snapshots/<name>`, ignoring line endings.
/// With `BAM2RPKM_UPDATE_SNAPSHOTS` set the file is rewritten instead.
pub fn assert_snapshot(name: &str, actual: &str) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/snapshots")
        .join(name);
    if env::var_os(UPDATE_SNAPSHOTS).is_some() {
        let dir = path.parent().expect("snapshot path has a parent");
        fs::create_dir_all(dir).expect("create snapshot directory");
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected = fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("cannot read snapshot {}: {err}", path.display()));
    assert_eq!(
        expected.replace("\r\n", "\n"),
        actual.replace("\r\n", "\n"),
        "output differs from {}; rerun with {UPDATE_SNAPSHOTS}=1 to accept it",
        path.display()
    );
}

/// Fresh directory under the cargo test scratch area.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch directory");
    dir
}

pub fn write_text(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

/// Alignment to place in a fixture BAM: `(tid, 0-based pos, cigar, flags)`.
pub struct FixtureRead<'a> {
    pub tid: i32,
    pub pos: i64,
    pub cigar: &'a str,
    pub flags: u16,
}

impl<'a> FixtureRead<'a> {
    pub fn new(tid: i32, pos: i64, cigar: &'a str) -> Self {
        Self {
            tid,
            pos,
            cigar,
            flags: 0,
        }
    }
}

/// Write a coordinate-sorted BAM with the given references and reads, then
/// index it. Reads must already be in coordinate order.
pub fn write_indexed_bam(path: &Path, references: &[(&str, u64)], reads: &[FixtureRead]) {
    let mut header = Header::new();

    let mut hd = HeaderRecord::new(b"HD");
    hd.push_tag(b"VN", &"1.6");
    hd.push_tag(b"SO", &"coordinate");
    header.push_record(&hd);

    for (name, length) in references {
        let mut sq = HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", name);
        sq.push_tag(b"LN", &(*length as i64));
        header.push_record(&sq);
    }

    {
        let mut writer =
            Writer::from_path(path, &header, bam::Format::Bam).expect("create BAM writer");
        for (idx, read) in reads.iter().enumerate() {
            let cigar = CigarString::try_from(read.cigar).expect("valid CIGAR");
            let query_len: u32 = cigar
                .iter()
                .filter(|op| !matches!(op.char(), 'D' | 'N' | 'H' | 'P'))
                .map(|op| op.len())
                .sum();
            let seq = vec![b'A'; query_len as usize];
            let qual = vec![30u8; query_len as usize];

            let mut record = Record::new();
            let qname = format!("read{idx}");
            record.set(qname.as_bytes(), Some(&cigar), &seq, &qual);
            record.set_tid(read.tid);
            record.set_pos(read.pos);
            record.set_mapq(60);
            record.set_flags(read.flags);
            record.set_mtid(-1);
            record.set_mpos(-1);
            writer.write(&record).expect("write record");
        }
    }

    bam::index::build(path, None, bam::index::Type::Bai, 1).expect("index BAM");
}

/// Annotation matching [`profile_fixture`]: two coding genes on `chr1` and a
/// tRNA gene on `chr2`.
pub const PROFILE_ANNOTATION: &str = "##gff-version 3\n\
chr1\tsrc\tgene\t100\t200\t.\t+\t.\tID=gene1\n\
chr1\tsrc\tCDS\t100\t200\t.\t+\t0\tParent=gene1\n\
chr1\tsrc\tgene\t1001\t1100\t.\t+\t.\tID=gene2\n\
chr1\tsrc\tCDS\t1001\t1100\t.\t+\t0\tParent=gene2\n\
chr2\tsrc\tgene\t1\t50\t.\t-\t.\tID=trna1\n\
chr2\tsrc\ttRNA\t1\t50\t.\t-\t.\tParent=trna1\n";

/// Annotation and indexed BAM in a fresh scratch directory. Expected
/// covered counts are `[500, 100, 10]`.
pub fn profile_fixture(name: &str) -> (PathBuf, PathBuf) {
    let dir = scratch_dir(name);
    let gff = write_text(&dir, "genes.gff", PROFILE_ANNOTATION);
    let bam = dir.join("reads.bam");

    let mut reads = Vec::new();
    // gene1: ten 50M reads over 1-based 100..=149
    for _ in 0..10 {
        reads.push(FixtureRead::new(0, 99, "50M"));
    }
    // gene1: a duplicate that the default filter drops
    reads.push(FixtureRead {
        flags: FLAG_DUPLICATE,
        ..FixtureRead::new(0, 120, "50M")
    });
    // gene2: clipped, spliced read spanning 1-based 1001..=1150; the skipped
    // stretch stays covered, as in a pileup
    reads.push(FixtureRead::new(0, 1000, "5S20M100N30M"));
    // chr2: one read, 10 bases inside trna1
    reads.push(FixtureRead::new(1, 40, "2I30M"));

    write_indexed_bam(&bam, &[("chr1", 5_000), ("chr2", 1_000)], &reads);
    (gff, bam)
}
