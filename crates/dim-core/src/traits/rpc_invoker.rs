// # RPC Invoker Trait
//
// Defines the interface for executing one DIM JSON-RPC call.
//
// ## Implementations
//
// - reqwest-based HTTP client: `dim-client` crate
// - Scripted test doubles: `dim-core/tests/common`
//
// ## Usage
//
// ```rust,ignore
// use dim_core::RpcInvoker;
// use tokio_util::sync::CancellationToken;
//
// let cancel = CancellationToken::new();
// let zones = invoker
//     .invoke("zone_list", vec![serde_json::json!({})], &cancel)
//     .await?;
// ```

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Trait for executing remote DIM method calls
///
/// The result is the envelope's `result` member, returned as a dynamically
/// typed [`Value`]; its shape varies per method and callers narrow it with
/// the helpers in [`crate::value`].
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks; many
/// logical operations invoke the same client concurrently.
///
/// # Failure Policy
///
/// - Every failure is surfaced once as a typed [`crate::Error`]
/// - Implementations do not retry calls on their own initiative
/// - A fired `cancel` token aborts the in-flight request and yields
///   [`crate::error::TransportFault::Canceled`]
#[async_trait]
pub trait RpcInvoker: Send + Sync {
    /// Invoke `method` with positional `params`
    ///
    /// # Returns
    ///
    /// - `Ok(Value)`: The envelope's `result`, opaque at this layer
    /// - `Err(Error::Remote { .. })`: The service rejected the call (code preserved)
    /// - `Err(Error::Decode { .. })`: The body was not a JSON-RPC envelope
    /// - `Err(Error::Transport { .. })`: Network, status, timeout or cancellation failure
    async fn invoke(
        &self,
        method: &str,
        params: Vec<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value, crate::Error>;
}
