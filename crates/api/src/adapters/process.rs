//! Process control through a shared cancellation token

use async_trait::async_trait;
use faultline_core::ProcessControl;
use faultline_domain::Result;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Why the process is being asked to exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitIntent {
    Quit,
    /// Exit with the restart code so the supervising service manager starts
    /// a fresh process
    Restart,
}

/// [`ProcessControl`] that requests a graceful exit from the main loop.
///
/// The first request wins; later requests do not change the intent.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    intent: Mutex<Option<ExitIntent>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, intent: ExitIntent) {
        {
            let mut current = self.intent.lock();
            if current.is_none() {
                *current = Some(intent);
            }
        }
        info!(?intent, "Process exit requested");
        self.token.cancel();
    }

    /// Resolves once an exit has been requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn intent(&self) -> Option<ExitIntent> {
        *self.intent.lock()
    }
}

#[async_trait]
impl ProcessControl for ShutdownSignal {
    async fn restart(&self) -> Result<()> {
        self.request(ExitIntent::Restart);
        Ok(())
    }

    async fn quit(&self) -> Result<()> {
        self.request(ExitIntent::Quit);
        Ok(())
    }
}
