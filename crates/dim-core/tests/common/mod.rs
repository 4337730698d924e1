//! Test doubles and common utilities for contract tests
//!
//! This module provides a scripted invoker that answers calls from a queue
//! and records every call it receives.

#![allow(dead_code)]

use dim_core::error::{Error, Result};
use dim_core::traits::RpcInvoker;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// One call received by [`ScriptedInvoker`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub params: Vec<Value>,
}

/// An RpcInvoker that replays scripted replies in order
///
/// Each call pops the next reply regardless of method. Running out of
/// replies fails the call, so an unexpected extra call shows up as an error.
pub struct ScriptedInvoker {
    replies: Mutex<VecDeque<Result<Value>>>,
    calls: Mutex<Vec<RecordedCall>>,
    call_count: AtomicUsize,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Queue a successful result
    pub fn reply(self, result: Value) -> Self {
        self.replies.lock().unwrap().push_back(Ok(result));
        self
    }

    /// Queue a remote error
    pub fn fail(self, code: i64, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::remote("scripted", code, message)));
        self
    }

    /// Queue an arbitrary error
    pub fn fail_with(self, error: Error) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.method).collect()
    }

    /// Whether every scripted reply has been consumed
    pub fn exhausted(&self) -> bool {
        self.replies.lock().unwrap().is_empty()
    }
}

#[async_trait::async_trait]
impl RpcInvoker for ScriptedInvoker {
    async fn invoke(
        &self,
        method: &str,
        params: Vec<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            params,
        });

        if cancel.is_cancelled() {
            return Err(Error::transport(method, dim_core::TransportFault::Canceled));
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::invalid_input(format!("unscripted call to {method}"))))
            .map_err(|e| match e {
                Error::Remote { code, message, .. } => Error::remote(method, code, message),
                other => other,
            })
    }
}
