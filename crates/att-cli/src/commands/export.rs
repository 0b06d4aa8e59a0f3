//! Export command for CSV range reports.
//!
//! Writes one row per stored event dated within the inclusive range, in the
//! reference zone's wall-clock time. Guarded by the admin password when one
//! is configured.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use att_core::report::{self, ExportRow};
use att_core::{AttendanceStore, ReferenceZone};
use chrono::NaiveDate;
use subtle::ConstantTimeEq;

use super::util;

/// Options for one export run.
#[derive(Debug)]
pub struct ExportRequest<'a> {
    pub start: &'a str,
    pub end: &'a str,
    pub output: Option<&'a Path>,
    pub password: Option<&'a str>,
}

/// Default file name for a range export.
pub fn default_file_name(start: NaiveDate, end: NaiveDate) -> String {
    format!("attendance_report_{start}_to_{end}.csv")
}

/// Runs the export command, returning the written file if any.
pub fn run<W: Write, S: AttendanceStore>(
    writer: &mut W,
    store: &S,
    zone: ReferenceZone,
    request: &ExportRequest<'_>,
    admin_password: Option<&str>,
    export_dir: &Path,
) -> Result<Option<PathBuf>> {
    if admin_password.is_some_and(|expected| !password_matches(request.password, expected)) {
        tracing::warn!("export refused: wrong admin password");
        bail!("Wrong admin password. Access denied.");
    }

    let start = util::parse_date(request.start).context("invalid start date")?;
    let end = util::parse_date(request.end).context("invalid end date")?;
    if start > end {
        bail!("Start date {start} is after end date {end}");
    }

    let rows = report::range_export(store, zone, start, end)?;
    if rows.is_empty() {
        writeln!(writer, "No attendance between {start} and {end}.")?;
        return Ok(None);
    }

    let path = request.output.map_or_else(
        || export_dir.join(default_file_name(start, end)),
        Path::to_path_buf,
    );
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_csv(file, &rows).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "export written");

    writeln!(writer, "Attendance report {start} to {end}")?;
    writeln!(writer, "Records: {}", rows.len())?;
    writeln!(writer, "Saved to: {}", path.display())?;
    Ok(Some(path))
}

fn password_matches(given: Option<&str>, expected: &str) -> bool {
    given.is_some_and(|given| given.as_bytes().ct_eq(expected.as_bytes()).into())
}

/// Serializes rows as CSV with a header line.
pub fn write_csv<W: Write>(out: W, rows: &[ExportRow]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(out);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}
