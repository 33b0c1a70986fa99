use std::sync::Arc;

use chat_summary_model::Host;

/// Shows the host's loading indicator for as long as it is alive.
///
/// The indicator is hidden on drop, so it is cleared on every exit path
/// of the operation holding the guard.
pub(crate) struct LoaderGuard {
    host: Arc<dyn Host>,
}

impl LoaderGuard {
    #[inline]
    pub fn show(host: Arc<dyn Host>) -> Self {
        host.show_loader();
        Self { host }
    }
}

impl Drop for LoaderGuard {
    #[inline]
    fn drop(&mut self) {
        self.host.hide_loader();
    }
}
