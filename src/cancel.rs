//! Cancellation of in-flight lookups.
//!
//! A [`CancelToken`] is handed to everything working on behalf of one event or batch. It fires when its
//! [`CancelHandle`] is cancelled or dropped, or when its deadline passes, whichever comes first. Lookups that are
//! still running at that point are recorded as [`Timeout`][crate::LookupError::Timeout].

use std::time::{Duration, Instant};

use futures_lite::{future, FutureExt};
use futures_timer::Delay;

/// Creates a linked handle and token.
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = async_channel::bounded(1);
    (
        CancelHandle { sender },
        CancelToken {
            receiver: Some(receiver),
            deadline: None,
        },
    )
}

/// Cancels every [`CancelToken`] cloned from its pair. Dropping the handle also cancels.
#[derive(Debug)]
pub struct CancelHandle {
    sender: async_channel::Sender<()>,
}

impl CancelHandle {
    /// Cancels the linked tokens.
    pub fn cancel(&self) {
        self.sender.close();
    }
}

/// Observes cancellation. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    receiver: Option<async_channel::Receiver<()>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        CancelToken::default()
    }

    /// Adds a deadline. If the token already has an earlier one, the earlier one is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// Adds a deadline `budget` from now.
    pub fn with_budget(self, budget: Duration) -> Self {
        self.with_deadline(Instant::now() + budget)
    }

    /// Returns `true` if the token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.receiver.as_ref().is_some_and(|r| r.is_closed())
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Completes when the token fires.
    pub async fn cancelled(&self) {
        let signal = async {
            match &self.receiver {
                Some(receiver) => {
                    let _ = receiver.recv().await;
                }
                None => future::pending::<()>().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(deadline) => Delay::new(deadline.saturating_duration_since(Instant::now())).await,
                None => future::pending::<()>().await,
            }
        };
        signal.or(deadline).await
    }
}
