//! Display utilities for the tagdump CLI

use colored::Colorize;
use std::fmt::Display;
use tagdump_core::{
    CardDump, CardInfo, DumpUnit, Outcome, Phase, ProbeReport, SkipReason, Status, WriteOutcome,
    WriteReport,
};

/// A formatted section title
pub(crate) struct SectionTitle(pub(crate) &'static str);

impl Display for SectionTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\n{}", self.0.bold().underline())
    }
}

/// Format a section header
pub(crate) const fn section_title(title: &'static str) -> SectionTitle {
    SectionTitle(title)
}

/// Format a success message
pub(crate) fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub(crate) fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Format an info message
pub(crate) fn info(message: &str) -> String {
    format!("ℹ️  {}", message.blue())
}

/// Format an error message
pub(crate) fn error(message: &str) -> String {
    format!("❌ {}", message.red().bold())
}

/// Format a key-value section for important outputs
pub(crate) fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());

    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }

    result
}

/// Render one engine status update
pub(crate) fn format_status(status: &Status) -> String {
    match (status.phase, status.failures) {
        (Phase::Done, Some(0)) => success(&status.message),
        (Phase::Done, Some(n)) => warning(&format!("{} ({n} failed)", status.message)),
        (Phase::Error, _) => error(&status.message),
        _ => info(&status.message),
    }
}

/// Print one engine status update
pub(crate) fn print_status(status: &Status) {
    println!("{}", format_status(status));
}

/// Print the inspection report
pub(crate) fn print_card_info(info: &CardInfo) {
    let mut items = vec![
        ("ID", info.id.clone()),
        ("Technologies", info.technologies.to_string()),
    ];
    if let Some(atqa) = &info.atqa {
        items.push(("ATQA", hex::encode_upper(atqa)));
    }
    if let Some(sak) = info.sak {
        items.push(("SAK", format!("{sak:02X}")));
    }
    if let Some(bytes) = &info.historical_bytes {
        items.push(("Historical bytes", hex::encode_upper(bytes)));
    }
    if let Some(outcome) = &info.ncmc_select {
        items.push(("NCMC select", format_outcome(outcome)));
    }
    println!("{}", key_value_box("Card", items));
}

fn format_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success { data } => hex::encode_upper(data),
        Outcome::Failure { reason } => reason.red().to_string(),
    }
}

/// Print a memory dump, one line per block or page group
pub(crate) fn print_dump(dump: &CardDump) {
    println!("{}", section_title("Dump"));
    for unit in &dump.units {
        match unit {
            DumpUnit::Sector(sector) => {
                println!("{} ({})", format!("Sector {}", sector.sector).bold(), sector.auth);
                for block in &sector.blocks {
                    println!("  {:>3}: {}", block.block, format_outcome(&block.outcome));
                }
            }
            DumpUnit::Pages(group) => {
                println!("  {:>3}: {}", group.page, format_outcome(&group.outcome));
            }
            DumpUnit::Metadata(metadata) => {
                let mut items = vec![("UID", hex::encode_upper(&metadata.uid))];
                if let Some(atqa) = &metadata.atqa {
                    items.push(("ATQA", hex::encode_upper(atqa)));
                }
                if let Some(sak) = metadata.sak {
                    items.push(("SAK", format!("{sak:02X}")));
                }
                println!("{}", key_value_box("NfcA", items));
            }
        }
    }
}

/// Print probe responses with their decoded status words
pub(crate) fn print_probes(report: &ProbeReport) {
    println!("{}", section_title("Probes"));
    for probe in &report.probes {
        let status = probe
            .status()
            .map(|sw| format!(" [{sw}: {}]", sw.description()))
            .unwrap_or_default();
        println!(
            "  {} {}{}",
            probe.label.bold(),
            format_outcome(&probe.outcome),
            status
        );
    }
}

/// Print a write report summary followed by the failed entries
pub(crate) fn print_write_report(report: &WriteReport) {
    println!(
        "{}",
        key_value_box(
            "Write",
            vec![
                ("Written", report.written().to_string()),
                ("Trailers skipped", report.skipped(SkipReason::Trailer).to_string()),
                ("Lock/OTP pages skipped", report.skipped(SkipReason::OneWay).to_string()),
                ("No data", report.skipped(SkipReason::NoData).to_string()),
                ("Failed", report.failure_count().to_string()),
            ],
        )
    );
    for entry in &report.entries {
        if let WriteOutcome::Failed { reason } = &entry.outcome {
            println!("  {:>3}: {}", entry.address, reason.red());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_status() {
        colored::control::set_override(false);

        assert!(format_status(&Status::done("Card read successfully", 0)).contains("✅"));
        let partial = format_status(&Status::done("Card read successfully", 3));
        assert!(partial.contains("(3 failed)"));
        assert!(format_status(&Status::new(Phase::Error, "Tag lost")).contains("❌"));
        assert!(format_status(&Status::new(Phase::Reading, "Reading sector 1")).contains("ℹ️"));
    }

    #[test]
    fn test_format_outcome() {
        colored::control::set_override(false);

        assert_eq!(format_outcome(&Outcome::success(vec![0xDE, 0xAD])), "DEAD");
        assert_eq!(format_outcome(&Outcome::failure("timeout")), "timeout");
    }
}
