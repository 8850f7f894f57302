//! JSON output formatting.

use crate::report::ScanReport;
use std::io::{self, Write};

/// Write a report as pretty-printed JSON, or only its asset graph.
pub fn write_json<W: Write>(out: &mut W, report: &ScanReport, graph_only: bool) -> io::Result<()> {
    let json = if graph_only {
        serde_json::to_string_pretty(&report.graph)
    } else {
        serde_json::to_string_pretty(report)
    }
    .map_err(io::Error::other)?;
    writeln!(out, "{json}")
}
