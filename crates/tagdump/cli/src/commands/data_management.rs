//! Commands that dump tag memory to disk and mirror it back

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::WrapErr;
use tagdump_core::{Capture, DumpRecord, Engine, Status};
use tagdump_transport_pcsc::PcscTransport;
use tracing::{debug, info};

use crate::utils::{display, session};

/// Read the tag and save the capture as a dump record in `dir`
pub(crate) async fn read_command(engine: Engine<PcscTransport>, dir: &Path) -> eyre::Result<()> {
    let record = session::run(engine, |engine| {
        let capture = engine.read(&mut |status: Status| display::print_status(&status))?;
        Ok(engine.record(capture))
    })
    .await?;

    match &record.dump {
        Capture::Dump(dump) => display::print_dump(dump),
        Capture::Probes(report) => display::print_probes(report),
    }

    let millis = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let path = dir.join(record.file_name(millis));
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("Cannot create output directory {}", dir.display()))?;
    std::fs::write(&path, record.to_json_pretty()?)
        .wrap_err_with(|| format!("Cannot write dump record {}", path.display()))?;

    info!(path = %path.display(), "Dump record saved");
    println!("Saved to {}", path.display());
    Ok(())
}

/// Load a dump record and mirror its memory onto the tag
pub(crate) async fn write_command(engine: Engine<PcscTransport>, file: &Path) -> eyre::Result<()> {
    let json = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("Cannot read dump record {}", file.display()))?;
    let record = DumpRecord::from_json(&json)?;
    debug!(tech = %record.tech, card_type = %record.card_type, "Loaded dump record");
    let dump = record.into_dump()?;

    let report = session::run(engine, move |engine| {
        engine.write(&dump, &mut |status: Status| display::print_status(&status))
    })
    .await?;

    display::print_write_report(&report);
    Ok(())
}
