//! Technology negotiation

use tracing::debug;

use crate::tag::{Technology, TechnologySet};
use crate::{Error, Result};

/// Pick the dispatch technology from an advertised set
///
/// Follows [`Technology::PRECEDENCE`]; a set with none of those technologies
/// is rejected with the raw set echoed back.
pub fn negotiate(advertised: &TechnologySet) -> Result<Technology> {
    let selected = Technology::PRECEDENCE
        .into_iter()
        .find(|technology| advertised.contains(*technology))
        .ok_or_else(|| Error::UnsupportedTechnology(advertised.clone()))?;

    debug!(%advertised, %selected, "Technology negotiated");
    Ok(selected)
}
