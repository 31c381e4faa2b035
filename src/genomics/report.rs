use anyhow::{anyhow, Result};
use std::io::Write;

use super::GeneExpression;

const HEADER: &str = "#locus_tag\trpkm\treads_mapped\n";

/// Write expression records as tab-separated text, header first.
pub fn write_report<W: Write>(writer: &mut W, records: &[GeneExpression]) -> Result<()> {
    writer.write_all(HEADER.as_bytes())?;

    for record in records {
        let line = format!(
            "{tag}\t{rpkm}\t{reads}\n",
            tag = record.tag,
            rpkm = fixed(record.rpkm),
            reads = fixed(record.reads_mapped),
        );
        writer.write_all(line.as_bytes())?;
    }

    writer.flush()?;
    Ok(())
}

/// Render the report into a string (useful for tests and snapshots).
pub fn render_report(records: &[GeneExpression]) -> Result<String> {
    let mut buffer = Vec::new();
    write_report(&mut buffer, records)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered report is not valid UTF-8"))
}

/// Six decimals; non-finite values as `nan`, `inf`, `-inf`.
fn fixed(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{value:.6}")
    }
}
