//! Running engine operations off the async runtime

use tagdump_core::Engine;
use tagdump_transport_pcsc::PcscTransport;
use tracing::warn;

/// Run a blocking engine operation, aborting it on Ctrl-C
///
/// The operation runs on the blocking pool. On Ctrl-C the engine's abort
/// handle is raised and the operation ends at its next frame with an
/// `Aborted` error, which is returned here.
pub(crate) async fn run<R, F>(engine: Engine<PcscTransport>, operation: F) -> eyre::Result<R>
where
    R: Send + 'static,
    F: FnOnce(&Engine<PcscTransport>) -> tagdump_core::Result<R> + Send + 'static,
{
    let abort = engine.abort_handle();
    let mut task = tokio::task::spawn_blocking(move || operation(&engine));

    tokio::select! {
        result = &mut task => Ok(result??),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; aborting the running operation");
            abort.abort();
            Ok(task.await??)
        }
    }
}
