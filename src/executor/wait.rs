//! Inclusion polling with cancellation, timeout and backoff
//!
//! Fetch errors while polling are transient: they are logged, counted and
//! retried with exponential backoff until the effects appear, the caller
//! cancels, or the timeout elapses. Polling never touches the object cache.

use crate::client::LedgerClient;
use crate::codec::{decode_effects, status_of, DecodeError, DecodeResult, StatusSummary, TransactionEffects};
use crate::config::InclusionConfig;
use crate::metrics::{metrics, Timer};
use crate::types::Digest;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitError {
    #[error("Inclusion wait cancelled")]
    Cancelled,

    #[error("Transaction {digest} not found after {after_ms} ms")]
    Timeout { digest: Digest, after_ms: u64 },

    /// The ledger returned effects this build cannot read
    #[error("Undecodable effects: {0}")]
    Decode(#[from] DecodeError),
}

/// Fires the paired [`CancelSignal`]s
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observes cancellation; cheap to clone
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        cancel_pair().1
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is gone
    pub async fn cancelled(&mut self) {
        let closed = self.rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Exponential backoff with symmetric jitter
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    jitter_factor: f64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64, jitter_factor: f64) -> Self {
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(config: &InclusionConfig) -> Self {
        Self::new(config.poll_interval_ms, config.max_backoff_ms, config.jitter_factor)
    }

    /// `base * 2^attempt`, capped at `max`, then jittered
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp_backoff = (self.base_ms as f64) * 2_f64.powi(attempt.min(30) as i32);
        let capped = exp_backoff.min(self.max_ms as f64);

        let jitter_range = capped * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// Effects of a transaction found on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Included {
    pub digest: Digest,
    pub status: StatusSummary,
    pub effects: Vec<u8>,
}

impl Included {
    fn new(digest: Digest, effects: Vec<u8>) -> Result<Self, WaitError> {
        let status = status_of(&effects)?;
        Ok(Self {
            digest,
            status,
            effects,
        })
    }

    /// Full decode; only the current effects layout is supported
    pub fn decode(&self) -> DecodeResult<TransactionEffects> {
        decode_effects(&self.effects)
    }
}

/// Poll `client` until the effects of `digest` are available
pub async fn wait_for_inclusion(
    client: &dyn LedgerClient,
    digest: &Digest,
    config: &InclusionConfig,
    mut cancel: CancelSignal,
) -> Result<Included, WaitError> {
    let backoff = Backoff::from_config(config);
    let timer = Timer::new();
    let mut errors: u32 = 0;

    let poll = async {
        loop {
            if cancel.is_cancelled() {
                return Err(WaitError::Cancelled);
            }

            metrics().inclusion_polls.inc();
            match client.fetch_effects(digest).await {
                Ok(Some(effects)) => return Included::new(*digest, effects),
                Ok(None) => {
                    errors = 0;
                    debug!(digest = %digest, "transaction not yet included");
                }
                Err(err) => {
                    metrics().inclusion_poll_errors.inc();
                    warn!(digest = %digest, error = %err, attempt = errors + 1, "inclusion poll failed, retrying");
                    errors = errors.saturating_add(1);
                }
            }

            tokio::select! {
                _ = sleep(backoff.delay(errors)) => {}
                _ = cancel.cancelled() => return Err(WaitError::Cancelled),
            }
        }
    };

    let result = match tokio::time::timeout(config.timeout(), poll).await {
        Ok(result) => result,
        Err(_) => Err(WaitError::Timeout {
            digest: *digest,
            after_ms: config.timeout_ms,
        }),
    };
    if result.is_ok() {
        timer.observe_duration(&metrics().inclusion_wait);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::codec::{encode_effects, simple_effects};
    use crate::test_utils::{FetchStep, MockLedger, MockLookup};
    use crate::types::{Address, ObjectRef};
    use std::sync::Arc;

    fn config() -> InclusionConfig {
        InclusionConfig {
            timeout_ms: 10_000,
            poll_interval_ms: 100,
            max_backoff_ms: 1_000,
            jitter_factor: 0.0,
        }
    }

    fn ledger_with_effects(digest: Digest) -> MockLedger {
        let ledger = MockLedger::new(Arc::new(MockLookup::new()));
        let fee = ObjectRef::new(Address::from_u64(5), 1, Digest::new([5; 32]));
        let effects = simple_effects(digest, fee, Digest::new([6; 32]), Address::from_u64(1), 2);
        ledger.insert_effects(digest, encode_effects(&effects));
        ledger
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = Backoff::new(100, 1_000, 0.0);
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(10), Duration::from_millis(1_000));

        let jittered = Backoff::new(100, 1_000, 0.5);
        for attempt in 0..5 {
            let delay = jittered.delay(attempt).as_millis() as f64;
            let nominal = (100.0 * 2f64.powi(attempt as i32)).min(1_000.0);
            assert!(delay >= nominal * 0.5 - 1.0 && delay <= nominal * 1.5 + 1.0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let digest = Digest::new([9; 32]);
        let ledger = ledger_with_effects(digest);
        ledger.script_fetches([
            FetchStep::Fail(ClientError::Transport("reset".to_string())),
            FetchStep::NotYet,
            FetchStep::Fail(ClientError::Timeout("slow".to_string())),
        ]);

        let included = wait_for_inclusion(&ledger, &digest, &config(), CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(included.digest, digest);
        assert!(included.status.success);
        assert_eq!(included.decode().unwrap().transaction_digest, digest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let ledger = MockLedger::new(Arc::new(MockLookup::new()));
        let digest = Digest::new([1; 32]);
        let err = wait_for_inclusion(&ledger, &digest, &config(), CancelSignal::never())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            WaitError::Timeout {
                digest,
                after_ms: 10_000
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_and_during() {
        let ledger = Arc::new(MockLedger::new(Arc::new(MockLookup::new())));
        let digest = Digest::new([1; 32]);

        let (handle, signal) = cancel_pair();
        handle.cancel();
        let err = wait_for_inclusion(ledger.as_ref(), &digest, &config(), signal)
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::Cancelled);

        let (handle, signal) = cancel_pair();
        let waiter = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                wait_for_inclusion(ledger.as_ref(), &digest, &config(), signal).await
            })
        };
        sleep(Duration::from_millis(350)).await;
        handle.cancel();
        assert_eq!(waiter.await.unwrap().unwrap_err(), WaitError::Cancelled);
    }
}
