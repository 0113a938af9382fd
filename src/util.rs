//! Time and cancellation bounds for GATT lookups.

use std::future::Future;
use std::time::Duration;

use futures_lite::FutureExt;
use futures_timer::Delay;

use crate::{CancelToken, LookupError};

/// Runs `lookup` until it completes, `timeout` elapses, or `cancel` fires. The last two yield
/// [`LookupError::Timeout`].
pub(crate) async fn bounded<T, F>(lookup: F, timeout: Duration, cancel: &CancelToken) -> Result<T, LookupError>
where
    F: Future<Output = Result<T, LookupError>>,
{
    lookup
        .or(async {
            Delay::new(timeout).await;
            Err(LookupError::Timeout)
        })
        .or(async {
            cancel.cancelled().await;
            Err(LookupError::Timeout)
        })
        .await
}
