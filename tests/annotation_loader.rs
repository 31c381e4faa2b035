mod common;

use bam2rpkm::genomics::{load_annotation, RegionKind};
use bam2rpkm::ProfileError;
use common::{scratch_dir, write_text};

#[test]
fn gene_and_matching_cds_load_as_one_coding_region() {
    let dir = scratch_dir("annotation_coding_pair");
    let path = write_text(
        &dir,
        "genes.gff",
        "##gff-version 3\n\
         chr1\tRefSeq\tgene\t100\t200\t.\t+\t.\tID=abc;Name=x\n\
         chr1\tRefSeq\tCDS\t100\t200\t.\t+\t0\tParent=abc\n\
         chr1\tRefSeq\tgene\t300\t400\t.\t-\t.\tName=y\n",
    );

    let annotation = load_annotation(&path).expect("annotation loads");
    assert_eq!(annotation.len(), 2);
    assert_eq!(annotation.coding_count(), 1);

    let first = &annotation.regions[0];
    assert_eq!(first.kind, RegionKind::Coding);
    assert_eq!(first.tag, "abc");
    assert_eq!((first.start, first.end), (100, 200));
    assert_eq!(first.covered_count, 0);

    let second = &annotation.regions[1];
    assert_eq!(second.kind, RegionKind::Unclassified);
    assert_eq!(second.tag, "chr1:300-400");
}

#[test]
fn regions_keep_file_order() {
    let dir = scratch_dir("annotation_order");
    let path = write_text(
        &dir,
        "genes.gff",
        "chr2\tsrc\tgene\t10\t20\t.\t+\t.\tID=z\n\
         chr1\tsrc\tgene\t5\t6\t.\t+\t.\tID=a\n\
         chr1\tsrc\tgene\t1\t2\t.\t+\t.\tID=m\n",
    );
    let tags: Vec<String> = load_annotation(&path)
        .unwrap()
        .regions
        .into_iter()
        .map(|r| r.tag)
        .collect();
    assert_eq!(tags, vec!["z", "a", "m"]);
}

#[test]
fn malformed_lines_do_not_abort_loading() {
    let dir = scratch_dir("annotation_malformed");
    let path = write_text(
        &dir,
        "genes.gff",
        "chr1\tsrc\tgene\t100\n\
         chr1\tsrc\tgene\t1\t50\t.\t+\t.\tID=ok\n",
    );
    let annotation = load_annotation(&path).unwrap();
    assert_eq!(annotation.len(), 1);
    assert_eq!(annotation.malformed.len(), 1);
    assert_eq!(annotation.malformed[0].line, 1);

    let as_error: ProfileError = annotation.malformed[0].clone().into();
    assert!(as_error.to_string().contains("line 1"));
}

#[test]
fn missing_file_is_resource_unavailable() {
    let dir = scratch_dir("annotation_missing");
    let path = dir.join("absent.gff");
    let err = load_annotation(&path).unwrap_err();
    match err {
        ProfileError::ResourceUnavailable { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error {other:?}"),
    }
}
