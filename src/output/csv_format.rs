//! CSV output formatting.
//!
//! One row per finding in the asset graph.

use crate::report::ScanReport;
use std::io::Write;

/// Write the report's findings as CSV.
pub fn write_findings_csv<W: Write>(out: &mut W, report: &ScanReport) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["type", "target", "description", "severity", "observed_at"])?;

    for finding in &report.graph.findings {
        wtr.write_record([
            finding.kind.as_str(),
            finding.target.as_str(),
            finding.description.as_str(),
            &finding.severity.to_string(),
            &finding.observed_at.to_rfc3339(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
