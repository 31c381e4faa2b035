mod common;

use bam2rpkm::genomics::{render_report, GeneExpression};
use common::assert_snapshot;

#[test]
fn render_report_matches_golden() {
    let records = vec![
        GeneExpression {
            tag: "gene1".to_string(),
            rpkm: 1234.5,
            reads_mapped: 20.0,
        },
        GeneExpression {
            tag: "chr1:300-450".to_string(),
            rpkm: 0.125,
            reads_mapped: 0.5,
        },
        GeneExpression {
            tag: "trnA".to_string(),
            rpkm: f64::NAN,
            reads_mapped: 0.0,
        },
    ];

    let actual = render_report(&records).expect("report rendering should succeed");
    assert_snapshot("report/simple.tsv", &actual);
}
