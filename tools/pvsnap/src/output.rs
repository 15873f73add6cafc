//! Terminal formatting shared by the subcommands

use colored::*;
use uuid::Uuid;

use pvsnap_model::{tags, ComparisonRow, EpicsData, EpicsValue, Pv, Severity, TagDef};

/// First block of a uuid, enough to tell entries apart in listings
pub fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

pub fn value_text(value: Option<&EpicsValue>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

/// Value with its enum string and alarm severity, as read from a channel
pub fn data_text(data: &EpicsData) -> String {
    let value = match data.enum_string() {
        Some(name) => name.to_string(),
        None => value_text(data.data.as_ref()),
    };
    match data.severity {
        Severity::NoAlarm => value,
        Severity::Minor => format!("{} {}", value, "[MINOR]".yellow()),
        Severity::Major => format!("{} {}", value, "[MAJOR]".red()),
        Severity::Invalid if data.has_value() => format!("{} {}", value, "[INVALID]".magenta()),
        Severity::Invalid => value,
    }
}

pub fn tags_text(def: &TagDef, pv: &Pv) -> String {
    tags::describe(def, &pv.tags)
        .into_iter()
        .map(|(group, names)| format!("{}={}", group, names.join("|")))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_pv_table(pvs: &[Pv], def: &TagDef) {
    if pvs.is_empty() {
        println!("{}", "No PVs".dimmed());
        return;
    }
    println!(
        "{:<8}  {:<28}  {:<28}  {:<24}  {}",
        "ID".bold(),
        "SETPOINT".bold(),
        "READBACK".bold(),
        "DESCRIPTION".bold(),
        "TAGS".bold()
    );
    for pv in pvs {
        println!(
            "{:<8}  {:<28}  {:<28}  {:<24}  {}",
            short_id(&pv.uuid).bright_black(),
            pv.setpoint,
            pv.readback,
            pv.description,
            tags_text(def, pv).cyan()
        );
    }
    println!("{} PVs", pvs.len());
}

pub fn print_comparison(rows: &[ComparisonRow], only_diff: bool) {
    let shown: Vec<&ComparisonRow> = rows
        .iter()
        .filter(|row| !only_diff || !row.is_match())
        .collect();

    println!(
        "{:<30}  {:<18}  {:<18}  {:<18}  {:<18}",
        "PV".bold(),
        "SETPOINT (MAIN)".bold(),
        "SETPOINT (OTHER)".bold(),
        "READBACK (MAIN)".bold(),
        "READBACK (OTHER)".bold()
    );
    for row in &shown {
        let mark = |close: bool, text: String| {
            if close {
                text.normal()
            } else {
                text.red()
            }
        };
        println!(
            "{:<30}  {:<18}  {:<18}  {:<18}  {:<18}",
            row.address(),
            value_text(row.main_setpoint.as_ref()),
            mark(row.setpoint_close, value_text(row.other_setpoint.as_ref())),
            value_text(row.main_readback.as_ref()),
            mark(row.readback_close, value_text(row.other_readback.as_ref())),
        );
    }

    let differing = rows.iter().filter(|row| !row.is_match()).count();
    if differing == 0 {
        println!("{} All {} PVs match", "OK".green(), rows.len());
    } else {
        println!(
            "{} {} of {} PVs differ",
            "DIFF".yellow(),
            differing,
            rows.len()
        );
    }
}
