// # dim-core
//
// Core library for the DIM (DNS and IP management) client.
//
// ## Architecture Overview
//
// - **RpcInvoker**: Trait for performing one authenticated JSON-RPC call
// - **IdSchema / CompositeId**: Reversible composite identifiers
// - **Reconciler**: Detects drift and disappearance of tracked entities
// - **EntityKind**: Create/read/update/delete of records and static IPs
//
// The HTTP transport and session handling live in `dim-client`; this crate
// never opens a connection itself.
//
// ## Design Principles
//
// 1. **Library-First**: Everything is usable without the CLI
// 2. **Explicit Narrowing**: Remote results stay dynamic until checked
// 3. **No Silent Rewrite**: A changed identifier is reported, never adopted
// 4. **Surface Once**: Faults propagate to the caller, nothing retries

pub mod config;
pub mod entity;
pub mod error;
pub mod id;
pub mod reconcile;
pub mod traits;
pub mod value;

// Re-export core types for convenience
pub use config::{ClientConfig, Credentials, ReloginPolicy};
pub use entity::{
    Created, Deleted, EntityKind, RecordAttrs, RecordSetEntry, RecordSetQuery, allocate_ip,
    list_record_values,
};
pub use error::{Error, Result, TransportFault};
pub use id::{CompositeId, FieldSpec, FieldValue, IdSchema};
pub use reconcile::{Reconciler, Reconciliation};
pub use traits::RpcInvoker;

pub use tokio_util::sync::CancellationToken;
