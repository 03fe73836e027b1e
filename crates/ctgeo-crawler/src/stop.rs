use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

/// Shared flag asking a crawl to wind down after the running batch.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The first Ctrl-C raises the stop signal, a second one exits right away.
pub(crate) struct SigintWatch {
    signal: StopSignal,
    handle: Option<JoinHandle<()>>,
}

impl SigintWatch {
    pub(crate) fn new(enabled: bool) -> Self {
        let signal = StopSignal::new();
        let handle = enabled.then(|| {
            let signal = signal.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                log::warn!("Interrupt received, finishing current batch (Ctrl-C again to quit)");
                signal.stop();

                if tokio::signal::ctrl_c().await.is_ok() {
                    log::error!("Interrupted");
                    std::process::exit(130);
                }
            })
        });
        Self { signal, handle }
    }

    pub(crate) fn signal(&self) -> &StopSignal {
        &self.signal
    }
}

impl Drop for SigintWatch {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
