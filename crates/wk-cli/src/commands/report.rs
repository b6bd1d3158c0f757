//! Report commands: active, payroll, hours, sites, today, earnings, timeline,
//! date-range segment report and shift list.
//!
//! Each command renders either an aligned text table or pretty JSON of the
//! report rows. Numbers arrive already rounded to two decimals.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use wk_core::{Reports, ShiftStore, WorkerId};

use super::util::format_local;

/// Writes `value` as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

/// Builds a table rule with the given column widths.
fn rule(widths: &[usize]) -> String {
    widths
        .iter()
        .map(|w| "─".repeat(*w))
        .collect::<Vec<_>>()
        .join("  ")
}

// ========== Active ==========

pub fn active<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    json: bool,
) -> Result<()> {
    let rows = reports.active_workers()?;
    if json {
        return write_json(writer, &rows);
    }

    writeln!(writer, "ACTIVE WORKERS")?;
    writeln!(writer)?;
    if rows.is_empty() {
        writeln!(writer, "No one is clocked in.")?;
        return Ok(());
    }

    let offset = reports.context().offset;
    writeln!(
        writer,
        "{:<20}  {:<20}  {:<16}  {:>6}",
        "Worker", "Site", "Clocked in", "Hours"
    )?;
    writeln!(writer, "{}", rule(&[20, 20, 16, 6]))?;
    for row in &rows {
        writeln!(
            writer,
            "{:<20}  {:<20}  {:<16}  {:>6.2}",
            row.name,
            row.location_name,
            format_local(row.clocked_in_at, offset),
            row.hours_today
        )?;
    }
    Ok(())
}

// ========== Payroll ==========

pub fn payroll<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    days: u32,
    json: bool,
) -> Result<()> {
    let rows = reports.payroll(days)?;
    if json {
        return write_json(writer, &rows);
    }

    writeln!(writer, "PAYROLL (last {days} days)")?;
    writeln!(writer)?;
    if rows.is_empty() {
        writeln!(writer, "No shifts in the last {days} days.")?;
        return Ok(());
    }

    let widths = [20, 8, 8, 10];
    writeln!(
        writer,
        "{:<20}  {:>8}  {:>8}  {:>10}",
        "Worker", "Rate", "Hours", "Cost"
    )?;
    writeln!(writer, "{}", rule(&widths))?;
    for row in &rows {
        writeln!(
            writer,
            "{:<20}  {:>8.2}  {:>8.2}  {:>10.2}",
            row.name, row.hourly_rate, row.total_hours, row.total_cost
        )?;
    }
    let hours: f64 = rows.iter().map(|row| row.total_hours).sum();
    let cost: f64 = rows.iter().map(|row| row.total_cost).sum();
    writeln!(writer, "{}", rule(&widths))?;
    writeln!(
        writer,
        "{:<20}  {:>8}  {:>8.2}  {:>10.2}",
        "Total",
        "",
        wk_core::round2(hours),
        wk_core::round2(cost)
    )?;
    Ok(())
}

// ========== Worker Hours ==========

pub fn hours<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    worker: WorkerId,
    days: u32,
    json: bool,
) -> Result<()> {
    let detail = reports.worker_detail(worker, days)?;
    if json {
        return write_json(writer, &detail);
    }

    writeln!(writer, "{} <{}>", detail.name, detail.email)?;
    writeln!(writer, "Last {days} days")?;
    writeln!(writer)?;
    writeln!(writer, "Shifts:  {}", detail.shift_count)?;
    writeln!(writer, "Hours:   {:.2}", detail.total_hours)?;
    writeln!(writer, "Cost:    {:.2}", detail.total_cost)?;
    Ok(())
}

// ========== Sites ==========

pub fn sites<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    json: bool,
) -> Result<()> {
    let rows = reports.site_busyness()?;
    if json {
        return write_json(writer, &rows);
    }

    writeln!(writer, "SITE ACTIVITY: {}", reports.context().today())?;
    writeln!(writer)?;
    if rows.is_empty() {
        writeln!(writer, "No active sites.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<20}  {:>6}  {:>11}",
        "Site", "Active", "Hours today"
    )?;
    writeln!(writer, "{}", rule(&[20, 6, 11]))?;
    for row in &rows {
        writeln!(
            writer,
            "{:<20}  {:>6}  {:>11.2}",
            row.name, row.active_worker_count, row.hours_today
        )?;
    }
    Ok(())
}

// ========== Today ==========

pub fn today<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    json: bool,
) -> Result<()> {
    let summary = reports.today_summary()?;
    if json {
        return write_json(writer, &summary);
    }

    writeln!(writer, "TODAY: {}", summary.date.format("%A, %b %-d, %Y"))?;
    writeln!(writer)?;
    writeln!(writer, "Total hours:     {:.2}", summary.total_hours)?;
    writeln!(writer, "Workers today:   {}", summary.distinct_workers)?;
    writeln!(writer, "Clocked in now:  {}", summary.currently_active)?;
    writeln!(writer, "Total cost:      {:.2}", summary.total_cost)?;
    Ok(())
}

// ========== Earnings ==========

pub fn earnings<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    worker: WorkerId,
    days: u32,
    tax_rate: f64,
    json: bool,
) -> Result<()> {
    let earnings = reports.earnings(worker, days, tax_rate)?;
    if json {
        return write_json(writer, &earnings);
    }

    let tax_label = format!("Tax ({:.0}%):", tax_rate * 100.0);
    writeln!(writer, "EARNINGS: {} (last {days} days)", earnings.name)?;
    writeln!(writer)?;
    writeln!(writer, "{:<13}{:.2}", "Hours:", earnings.period_hours)?;
    writeln!(writer, "{:<13}{:.2}", "Rate:", earnings.hourly_rate)?;
    writeln!(writer, "{:<13}{:.2}", "Gross pay:", earnings.gross_pay)?;
    writeln!(writer, "{tax_label:<13}{:.2}", earnings.tax_amount)?;
    writeln!(writer, "{:<13}{:.2}", "Net pay:", earnings.net_pay)?;
    Ok(())
}

// ========== Timeline ==========

pub fn timeline<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    worker: WorkerId,
    day: NaiveDate,
    json: bool,
) -> Result<()> {
    let entries = reports.worker_timeline(worker, day)?;
    if json {
        return write_json(writer, &entries);
    }

    writeln!(writer, "TIMELINE: worker {worker}, {day}")?;
    writeln!(writer)?;
    if entries.is_empty() {
        writeln!(writer, "No segments on this day.")?;
        return Ok(());
    }

    let offset = reports.context().offset;
    writeln!(
        writer,
        "{:<20}  {:<16}  {:<16}  {:>6}",
        "Site", "Start", "End", "Hours"
    )?;
    writeln!(writer, "{}", rule(&[20, 16, 16, 6]))?;
    for entry in &entries {
        let end = entry
            .end
            .map_or_else(|| "(open)".to_string(), |end| format_local(end, offset));
        writeln!(
            writer,
            "{:<20}  {:<16}  {:<16}  {:>6.2}",
            entry.location_name,
            format_local(entry.start, offset),
            end,
            entry.hours
        )?;
    }
    Ok(())
}

// ========== Date-range Report ==========

pub fn range_report<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    from: NaiveDate,
    to: NaiveDate,
    json: bool,
) -> Result<()> {
    let report = reports.segment_report(from, to)?;
    if json {
        return write_json(writer, &report);
    }

    writeln!(writer, "REPORT: {from} to {to}")?;
    writeln!(writer)?;
    if report.segments.is_empty() {
        writeln!(writer, "No segments in this range.")?;
        return Ok(());
    }

    let offset = reports.context().offset;
    let widths = [20, 20, 16, 6, 10];
    writeln!(
        writer,
        "{:<20}  {:<20}  {:<16}  {:>6}  {:>10}",
        "Worker", "Site", "Start", "Hours", "Cost"
    )?;
    writeln!(writer, "{}", rule(&widths))?;
    for row in &report.segments {
        writeln!(
            writer,
            "{:<20}  {:<20}  {:<16}  {:>6.2}  {:>10.2}",
            row.worker_name,
            row.location_name,
            format_local(row.start, offset),
            row.hours,
            row.cost
        )?;
    }
    writeln!(writer, "{}", rule(&widths))?;
    writeln!(
        writer,
        "{:<20}  {:<20}  {:<16}  {:>6.2}  {:>10.2}",
        "Total", "", "", report.total_hours, report.total_cost
    )?;
    Ok(())
}

// ========== Shifts ==========

pub fn shifts<W: Write, S: ShiftStore>(
    writer: &mut W,
    reports: &Reports<'_, S>,
    worker: WorkerId,
    from: NaiveDate,
    to: NaiveDate,
    json: bool,
) -> Result<()> {
    let rows = reports.worker_shifts(worker, from, to)?;
    if json {
        return write_json(writer, &rows);
    }

    writeln!(writer, "SHIFTS: worker {worker}, {from} to {to}")?;
    writeln!(writer)?;
    if rows.is_empty() {
        writeln!(writer, "No shifts in this range.")?;
        return Ok(());
    }

    let offset = reports.context().offset;
    writeln!(
        writer,
        "{:<16}  {:<16}  {:<20}  {:>6}",
        "Start", "End", "First site", "Hours"
    )?;
    writeln!(writer, "{}", rule(&[16, 16, 20, 6]))?;
    for row in &rows {
        let end = row
            .end
            .map_or_else(|| "(open)".to_string(), |end| format_local(end, offset));
        writeln!(
            writer,
            "{:<16}  {:<16}  {:<20}  {:>6.2}",
            format_local(row.start, offset),
            end,
            row.first_location.as_deref().unwrap_or("-"),
            row.hours
        )?;
    }
    Ok(())
}
