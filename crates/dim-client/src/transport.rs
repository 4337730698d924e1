//! HTTP transport helpers
//!
//! One POST per call, raced against the caller's cancellation token.
//! Dropping the losing request future aborts the connection attempt.
//! Faults are returned bare; callers attach the method name.

use std::future::Future;

use dim_core::TransportFault;
use tokio_util::sync::CancellationToken;

/// Outcome of a transport step
pub type FaultResult<T> = std::result::Result<T, TransportFault>;

/// Run `fut` unless `cancel` fires first
pub async fn race<F, T>(fut: F, cancel: &CancellationToken) -> FaultResult<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportFault::Canceled),
        out = fut => Ok(out),
    }
}

/// Map a reqwest failure to a transport fault
pub fn map_send_error(e: reqwest::Error) -> TransportFault {
    if e.is_timeout() {
        TransportFault::Timeout
    } else {
        TransportFault::Request(e.to_string())
    }
}

/// Send `request` and read the whole body
///
/// Non-2xx responses become [`TransportFault::Status`] carrying the body.
pub async fn send(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> FaultResult<Vec<u8>> {
    race(send_and_read(request), cancel).await?
}

async fn send_and_read(request: reqwest::RequestBuilder) -> FaultResult<Vec<u8>> {
    let response = request.send().await.map_err(map_send_error)?;
    let status = response.status();
    let body = response.bytes().await.map_err(map_send_error)?;

    if !status.is_success() {
        return Err(TransportFault::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_race_completes_without_cancel() {
        let cancel = CancellationToken::new();
        assert_eq!(race(async { 7 }, &cancel).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_race_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fault = race(async { 7 }, &cancel).await.unwrap_err();
        assert_eq!(fault, TransportFault::Canceled);
    }
}
