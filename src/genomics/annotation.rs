//! GFF3 gene annotation loading.
//!
//! Genes become [`Region`]s in file order. `CDS`, `tRNA` and `rRNA` records
//! classify the gene whose `(locus, start, end)` they repeat; linking happens
//! in a second pass over an index built while reading, so sub-features need
//! not follow their gene directly.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::genomics::RegionQuery;
use crate::ProfileError;

const FIELD_LOCUS: usize = 0;
const FIELD_TYPE: usize = 2;
const FIELD_START: usize = 3;
const FIELD_END: usize = 4;
const FIELD_ATTRIBUTES: usize = 8;
const GFF_COLUMNS: usize = 9;
/// Largest coordinate magnitude accepted; keeps `start - 1` and
/// `end - start + 1` inside `i64`.
const MAX_COORDINATE: i64 = i64::MAX / 2;

/// Classification of an annotated gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionKind {
    /// No linked sub-feature seen.
    #[default]
    Unclassified,
    /// Protein coding; the only kind counted toward library size.
    Coding,
    /// Transfer RNA.
    TransferRna,
    /// Ribosomal RNA.
    RibosomalRna,
}

impl RegionKind {
    fn from_feature_type(feature: &str) -> Option<Self> {
        match feature {
            "CDS" => Some(RegionKind::Coding),
            "tRNA" => Some(RegionKind::TransferRna),
            "rRNA" => Some(RegionKind::RibosomalRna),
            _ => None,
        }
    }
}

/// One annotated gene and its accumulated coverage.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Reference sequence name.
    pub locus: Arc<str>,
    /// Classification tag.
    pub kind: RegionKind,
    /// 1-based inclusive start.
    pub start: i64,
    /// 1-based inclusive end.
    pub end: i64,
    /// Display identifier (`ID=` attribute or `locus:start-end`).
    pub tag: String,
    /// Depth-summed count of covered positions inside `[start, end]`.
    pub covered_count: u64,
}

impl Region {
    /// Create an unclassified region. Without an explicit tag one is
    /// synthesised from the coordinates.
    pub fn new(locus: impl Into<Arc<str>>, start: i64, end: i64, tag: Option<String>) -> Self {
        let locus = locus.into();
        let tag = tag.unwrap_or_else(|| format!("{locus}:{start}-{end}"));
        Self {
            locus,
            kind: RegionKind::Unclassified,
            start,
            end,
            tag,
            covered_count: 0,
        }
    }

    /// Set the classification.
    pub fn with_kind(mut self, kind: RegionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Whether the region counts toward the coding library size.
    pub fn is_coding(&self) -> bool {
        self.kind == RegionKind::Coding
    }

    /// Annotated length `end - start + 1`.
    pub fn length(&self) -> u64 {
        self.end
            .saturating_sub(self.start)
            .saturating_add(1)
            .max(0) as u64
    }

    /// 0-based half-open store query. Starts below the origin are clamped.
    pub fn query(&self) -> RegionQuery {
        let start = self.start.saturating_sub(1).max(0) as u64;
        let end = (self.end.max(0) as u64).max(start);
        RegionQuery {
            locus: Arc::clone(&self.locus),
            start,
            end,
        }
    }

    /// Region string as shown in diagnostics.
    pub fn label(&self) -> String {
        format!("{}:{}-{}", self.locus, self.start.max(0), self.end)
    }

    /// Store the aggregated count. Set once per run; a repeated run
    /// replaces the earlier value instead of adding to it.
    pub fn set_coverage(&mut self, covered: u64) {
        self.covered_count = covered;
    }
}

/// Annotation line that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed annotation record on line {line}: {reason}")]
pub struct MalformedRecord {
    /// 1-based line number.
    pub line: usize,
    /// What was wrong with it.
    pub reason: String,
}

impl MalformedRecord {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// Genes loaded from one annotation file.
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    /// Regions in file order.
    pub regions: Vec<Region>,
    /// Lines that were skipped.
    pub malformed: Vec<MalformedRecord>,
}

impl Annotation {
    /// Number of gene regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no gene was found.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Number of regions classified as coding.
    pub fn coding_count(&self) -> usize {
        self.regions.iter().filter(|r| r.is_coding()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FeatureKey {
    locus: Arc<str>,
    start: i64,
    end: i64,
}

#[derive(Debug)]
struct FeatureLink {
    key: FeatureKey,
    kind: RegionKind,
}

/// Open and parse a GFF3 file.
pub fn load_annotation(path: impl AsRef<Path>) -> Result<Annotation, ProfileError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| ProfileError::resource(path, err))?;
    parse_annotation(BufReader::new(file))
}

/// Parse GFF3 text. Only read failures are fatal; bad lines are collected
/// in [`Annotation::malformed`].
pub fn parse_annotation<R: BufRead>(reader: R) -> Result<Annotation, ProfileError> {
    let mut annotation = Annotation::default();
    let mut index: HashMap<FeatureKey, usize> = HashMap::new();
    let mut links = Vec::new();

    for (line_idx, line) in reader.lines().enumerate() {
        let line_no = line_idx + 1;
        let line = line.map_err(|err| ProfileError::io("reading annotation", err))?;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.starts_with("##FASTA") {
            break;
        }
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        match parse_line(line, line_no) {
            Ok(Some(Record::Gene(region))) => {
                let key = FeatureKey {
                    locus: Arc::clone(&region.locus),
                    start: region.start,
                    end: region.end,
                };
                // Later genes with the same coordinates shadow earlier ones.
                index.insert(key, annotation.regions.len());
                annotation.regions.push(region);
            }
            Ok(Some(Record::Feature(link))) => links.push(link),
            Ok(None) => {}
            Err(malformed) => {
                warn!(line = malformed.line, reason = %malformed.reason, "skipping annotation line");
                annotation.malformed.push(malformed);
            }
        }
    }

    for link in links {
        if let Some(&idx) = index.get(&link.key) {
            let region = &mut annotation.regions[idx];
            if link.kind == RegionKind::Coding || region.kind == RegionKind::Unclassified {
                region.kind = link.kind;
            }
        }
    }

    debug!(
        genes = annotation.regions.len(),
        coding = annotation.coding_count(),
        malformed = annotation.malformed.len(),
        "annotation parsed"
    );
    Ok(annotation)
}

enum Record {
    Gene(Region),
    Feature(FeatureLink),
}

fn parse_line(line: &str, line_no: usize) -> Result<Option<Record>, MalformedRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() <= FIELD_TYPE {
        return Err(MalformedRecord::new(
            line_no,
            format!("expected at least 3 columns, found {}", fields.len()),
        ));
    }

    let feature = fields[FIELD_TYPE].trim();
    let linked_kind = RegionKind::from_feature_type(feature);
    if feature != "gene" && linked_kind.is_none() {
        return Ok(None);
    }

    let locus = fields[FIELD_LOCUS].trim();
    if locus.is_empty() {
        return Err(MalformedRecord::new(line_no, "empty sequence id column"));
    }
    if fields.len() <= FIELD_END {
        return Err(MalformedRecord::new(
            line_no,
            format!("{feature} record has no start/end columns"),
        ));
    }
    let start = parse_coordinate(fields[FIELD_START], "start", line_no)?;
    let end = parse_coordinate(fields[FIELD_END], "end", line_no)?;

    if let Some(kind) = linked_kind {
        return Ok(Some(Record::Feature(FeatureLink {
            key: FeatureKey {
                locus: Arc::from(locus),
                start,
                end,
            },
            kind,
        })));
    }

    if fields.len() < GFF_COLUMNS {
        return Err(MalformedRecord::new(
            line_no,
            format!("gene record has {} of {GFF_COLUMNS} columns", fields.len()),
        ));
    }
    if start > end {
        return Err(MalformedRecord::new(
            line_no,
            format!("gene start {start} is after end {end}"),
        ));
    }

    let tag = attribute_id(fields[FIELD_ATTRIBUTES]);
    Ok(Some(Record::Gene(Region::new(locus, start, end, tag))))
}

fn parse_coordinate(field: &str, name: &str, line_no: usize) -> Result<i64, MalformedRecord> {
    let field = field.trim();
    let value: i64 = field.parse().map_err(|_| {
        MalformedRecord::new(line_no, format!("{name} coordinate '{field}' is not an integer"))
    })?;
    if !(-MAX_COORDINATE..=MAX_COORDINATE).contains(&value) {
        return Err(MalformedRecord::new(
            line_no,
            format!("{name} coordinate {value} is out of range"),
        ));
    }
    Ok(value)
}

/// Value of the first non-empty `ID` attribute.
fn attribute_id(attributes: &str) -> Option<String> {
    attributes
        .split(';')
        .filter_map(|attr| attr.split_once('='))
        .find(|(key, _)| key.trim() == "ID")
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
