//! Core traits for the DIM client
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RpcInvoker`]: Execute one remote DIM method call

pub mod rpc_invoker;

pub use rpc_invoker::RpcInvoker;
