use std::panic::{self, AssertUnwindSafe};
use anyhow::Result;
use shared::types::Snapshot;

/// Notified with the new snapshot after every successful refresh.
///
/// Any `Fn(&Snapshot)` closure is a listener.
pub trait RefreshListener: Send + Sync {
    fn on_refresh(&self, services: &Snapshot) -> Result<()>;
}

impl<F> RefreshListener for F
where
    F: Fn(&Snapshot) + Send + Sync,
{
    fn on_refresh(&self, services: &Snapshot) -> Result<()> {
        self(services);
        Ok(())
    }
}

/// Listener used when no callback is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl RefreshListener for NoopListener {
    fn on_refresh(&self, _services: &Snapshot) -> Result<()> {
        Ok(())
    }
}

/// Invoke `listener`, logging errors and panics instead of propagating them
pub(crate) fn notify(listener: &dyn RefreshListener, services: &Snapshot) {
    match panic::catch_unwind(AssertUnwindSafe(|| listener.on_refresh(services))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Refresh callback failed: {:#}", e),
        Err(_) => tracing::warn!("Refresh callback panicked"),
    }
}
