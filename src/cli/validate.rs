//! Validate command - normalizes and checks a record without storing it

use tracing::debug;

use crate::domain::user::validate_record;

use super::{RecordArgs, Report};

/// Validate one record; returns whether it passed
pub fn run(args: RecordArgs) -> anyhow::Result<bool> {
    let draft = args.read_draft()?;

    let report = Report::from(validate_record(draft));
    debug!(valid = report.is_valid(), "Validated user record");

    report.print()?;
    Ok(report.is_valid())
}
