// 🧾 Fee slip - one person's yearly schedule as CSV

use crate::db::Person;
use crate::ledger::{month_name, LedgerSummary, MonthRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct SlipRow<'a> {
    month: &'a str,
    expected: i64,
    paid_amount: i64,
    paid: &'a str,
    cumulative_expected: i64,
    cumulative_paid: i64,
    carry_forward_due: i64,
}

/// Write the slip for `person` to any writer.
///
/// Layout: a header line naming the person, the 12 month rows, then a
/// totals line.
pub fn write_slip<W: Write>(
    writer: W,
    person: &Person,
    schedule: &[MonthRecord],
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record([
        "person",
        person.display_name.as_str(),
        "group",
        person.group_name.as_str(),
        "guardian",
        person.guardian_name.as_deref().unwrap_or(""),
    ])?;

    wtr.write_record([
        "month",
        "expected",
        "paid_amount",
        "paid",
        "cumulative_expected",
        "cumulative_paid",
        "carry_forward_due",
    ])?;

    for record in schedule {
        wtr.serialize(SlipRow {
            month: month_name(record.month_index),
            expected: record.expected_this_month,
            paid_amount: record.amount_paid,
            paid: if record.paid() { "yes" } else { "no" },
            cumulative_expected: record.cumulative_expected,
            cumulative_paid: record.cumulative_paid,
            carry_forward_due: record.carry_forward_due,
        })?;
    }

    let summary = LedgerSummary::from_schedule(schedule);
    wtr.write_record([
        "total".to_string(),
        summary.total_expected.to_string(),
        summary.total_paid.to_string(),
        format!("{}/12", summary.months_paid),
        String::new(),
        String::new(),
        summary.outstanding.to_string(),
    ])?;

    wtr.flush().context("Failed to flush fee slip")?;
    Ok(())
}

pub fn export_slip(path: &Path, person: &Person, schedule: &[MonthRecord]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create slip file {:?}", path))?;
    write_slip(file, person, schedule)
}
