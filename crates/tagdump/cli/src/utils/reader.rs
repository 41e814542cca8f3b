use std::time::Duration;

use tagdump_transport_pcsc::{PcscDeviceManager, PcscReader};
use tracing::info;

/// Find a reader with a specific name
pub(crate) fn find_reader_by_name(
    manager: &PcscDeviceManager,
    reader_name: &str,
) -> eyre::Result<PcscReader> {
    select_reader(&manager.list_readers()?, Some(reader_name))
}

/// Pick the named reader, or the first one when no name is given
fn select_reader(readers: &[PcscReader], reader_name: Option<&str>) -> eyre::Result<PcscReader> {
    match reader_name {
        Some(name) => readers
            .iter()
            .find(|r| r.name() == name)
            .cloned()
            .ok_or_else(|| eyre::eyre!("Reader '{}' not found", name)),
        None => readers
            .first()
            .cloned()
            .ok_or_else(|| eyre::eyre!("No readers found!")),
    }
}

/// List all available readers
pub(crate) fn list_readers(manager: &PcscDeviceManager) -> eyre::Result<()> {
    let readers = manager.list_readers()?;

    if readers.is_empty() {
        println!("No readers found!");
        return Ok(());
    }

    println!("Available readers:");
    for (i, reader) in readers.iter().enumerate() {
        let status = match reader.atr() {
            Some(_) if reader.has_tag() => "tag present",
            Some(_) => "unrecognised card",
            None => "no tag",
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    Ok(())
}

/// Find a reader with a contactless tag in its field
pub(crate) fn find_reader_with_tag(manager: &PcscDeviceManager) -> eyre::Result<PcscReader> {
    let readers = manager.list_readers()?;

    readers
        .iter()
        .find(|r| r.has_tag())
        .cloned()
        .ok_or_else(|| eyre::eyre!("No tag found in any reader!"))
}

/// Block until a tag enters the field of the named reader, or of the first
/// reader when no name is given
pub(crate) fn wait_for_tag(
    manager: &PcscDeviceManager,
    reader_name: Option<&str>,
    secs: u64,
) -> eyre::Result<PcscReader> {
    let reader = select_reader(&manager.list_readers()?, reader_name)?;
    info!("Waiting up to {secs}s for a tag on {}", reader.name());
    Ok(manager.wait_for_card(reader.name(), Duration::from_secs(secs))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readers() -> Vec<PcscReader> {
        vec![
            PcscReader::new("ACS ACR122U 00".to_string(), false, None),
            PcscReader::new("ACS ACR1252 01".to_string(), false, None),
        ]
    }

    #[test]
    fn test_wait_without_name_uses_first_reader() {
        let reader = select_reader(&readers(), None).unwrap();
        assert_eq!(reader.name(), "ACS ACR122U 00");
    }

    #[test]
    fn test_select_named_reader() {
        let reader = select_reader(&readers(), Some("ACS ACR1252 01")).unwrap();
        assert_eq!(reader.name(), "ACS ACR1252 01");
        assert!(select_reader(&readers(), Some("Missing")).is_err());
    }

    #[test]
    fn test_no_readers() {
        assert!(select_reader(&[], None).is_err());
    }
}
