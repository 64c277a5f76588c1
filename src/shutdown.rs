use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{info, warn};
use tokio::runtime;

// Cooperative cancellation flag, shared between the signal handler and blocking loops.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

// Sleeps on a Tokio timer, waking up early and cancelling `cancel` on Ctrl-C.
pub struct SignalSleeper<'a> {
    rt: &'a runtime::Runtime,
    cancel: CancelToken,
}

impl SignalSleeper<'_> {
    pub fn new(rt: &runtime::Runtime, cancel: CancelToken) -> SignalSleeper<'_> {
        SignalSleeper { rt, cancel }
    }
}

impl Sleeper for SignalSleeper<'_> {
    fn sleep(&mut self, duration: Duration) {
        if self.cancel.is_cancelled() {
            return;
        }
        let interrupted = self
            .rt
            .block_on(async { tokio::time::timeout(duration, tokio::signal::ctrl_c()).await });
        match interrupted {
            Ok(Ok(())) => {
                info!("Received interrupt signal, stopping");
                self.cancel.cancel();
            }
            Ok(Err(err)) => {
                warn!("Failed to listen for interrupt signal: {}", err);
                self.rt.block_on(tokio::time::sleep(duration));
            }
            Err(_) => {}
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::time::Duration;

    use super::{CancelToken, Sleeper};

    // Records requested sleeps without sleeping; cancels `cancel` after `limit` sleeps.
    pub struct RecordingSleeper {
        pub sleeps: Vec<Duration>,
        cancel: CancelToken,
        limit: Option<usize>,
    }

    impl RecordingSleeper {
        pub fn new() -> RecordingSleeper {
            RecordingSleeper {
                sleeps: vec![],
                cancel: CancelToken::new(),
                limit: None,
            }
        }

        pub fn cancel_after(limit: usize, cancel: CancelToken) -> RecordingSleeper {
            RecordingSleeper {
                sleeps: vec![],
                cancel,
                limit: Some(limit),
            }
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&mut self, duration: Duration) {
            self.sleeps.push(duration);
            if self.limit.is_some_and(|limit| self.sleeps.len() >= limit) {
                self.cancel.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_shared_between_clones() {
        let cancel = CancelToken::new();
        let observer = cancel.clone();
        assert!(!observer.is_cancelled());
        cancel.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn signal_sleeper_waits_for_timer() {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let cancel = CancelToken::new();
        let mut sleeper = SignalSleeper::new(&rt, cancel.clone());
        let start = std::time::Instant::now();
        sleeper.sleep(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn signal_sleeper_skips_when_cancelled() {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut sleeper = SignalSleeper::new(&rt, cancel);
        let start = std::time::Instant::now();
        sleeper.sleep(Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
