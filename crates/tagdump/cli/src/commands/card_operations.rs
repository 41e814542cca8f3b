//! Commands that identify and interrogate a tag without touching its memory

use tagdump_core::{Engine, Status};
use tagdump_transport_pcsc::PcscTransport;
use tracing::info;

use crate::utils::{display, session};

/// Show what the tag reports about itself
pub(crate) async fn inspect_command(engine: Engine<PcscTransport>, json: bool) -> eyre::Result<()> {
    let info = session::run(engine, |engine| engine.inspect()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        display::print_card_info(&info);
    }
    Ok(())
}

/// Run the IsoDep probe sequence and print every response
pub(crate) async fn probe_command(engine: Engine<PcscTransport>, json: bool) -> eyre::Result<()> {
    let report = session::run(engine, |engine| {
        engine.probe(&mut |status: Status| display::print_status(&status))
    })
    .await?;

    info!(failures = report.failure_count(), "Probe sequence finished");
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display::print_probes(&report);
    }
    Ok(())
}
