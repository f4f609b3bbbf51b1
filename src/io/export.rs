//! CSV export of the per-tick history and JSON export of state snapshots.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::{SimulationState, TimestepResult};

/// Column header for CSV telemetry export.
const HEADER: &str = "tick,timestamp,outdoor_temp_f,target_kw,effective_target_kw,\
                       achieved_kw,shortfall_kw,penalty,dropped_count,\
                       hvac_dispatched,battery_dispatched,ev_dispatched,\
                       fleet_site_dispatched,ci_building_dispatched,\
                       new_dispatches,continued_dispatches";

/// Exports a run's history to a CSV file at the given path.
///
/// Produces byte-identical output for identical histories.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(results: &[TimestepResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes a run's history as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[TimestepResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in results {
        let c = &r.dispatch_counts;
        wtr.write_record(&[
            r.tick.to_string(),
            r.timestamp.clone(),
            format!("{:.2}", r.outdoor_temp_f),
            format!("{:.4}", r.target_kw),
            format!("{:.4}", r.effective_target_kw),
            format!("{:.4}", r.achieved_kw),
            format!("{:.4}", r.shortfall_kw),
            format!("{:.6}", r.penalty),
            r.dropped_count.to_string(),
            c.hvac.to_string(),
            c.battery.to_string(),
            c.ev.to_string(),
            c.fleet_site.to_string(),
            c.ci_building.to_string(),
            r.new_dispatches.to_string(),
            r.continued_dispatches.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes a pretty-printed JSON snapshot of the full simulation state.
///
/// # Errors
///
/// Returns an `io::Error` if the file cannot be written or serialization
/// fails.
pub fn export_snapshot(state: &SimulationState, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(io::BufWriter::new(file), state).map_err(io::Error::other)
}
