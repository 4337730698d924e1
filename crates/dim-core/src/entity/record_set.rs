//! Record-set lookup
//!
//! Lists the values of every record of one type matching a name pattern.
//! Unlike the tracked entities this is a plain read: nothing is reconciled.

use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::traits::RpcInvoker;
use crate::value::{expect_array, expect_object, opt_str};

/// Filters narrowing an `rr_list` query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSetQuery {
    /// Restrict to one layer3domain
    pub layer3domain: Option<String>,
    /// Restrict to one view
    pub view: Option<String>,
    /// Restrict to one zone
    pub zone: Option<String>,
}

/// One record returned by `rr_list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSetEntry {
    /// Record value (address, target name, text...)
    pub value: String,
    /// View the record lives in
    pub view: Option<String>,
    /// Layer3domain of the record, for address records
    pub layer3domain: Option<String>,
}

/// List records of `rr_type` whose name matches `pattern`
pub async fn list_record_values<I: RpcInvoker + ?Sized>(
    invoker: &I,
    rr_type: &str,
    pattern: &str,
    filters: &RecordSetQuery,
    cancel: &CancellationToken,
) -> Result<Vec<RecordSetEntry>> {
    let mut args = Map::new();
    args.insert("type".to_string(), json!(rr_type));
    args.insert("pattern".to_string(), json!(pattern));
    for (key, value) in [
        ("layer3domain", &filters.layer3domain),
        ("view", &filters.view),
        ("zone", &filters.zone),
    ] {
        if let Some(v) = value {
            args.insert(key.to_string(), json!(v));
        }
    }

    tracing::debug!("rr_list type={} pattern={}", rr_type, pattern);
    let result = invoker
        .invoke("rr_list", vec![Value::Object(args)], cancel)
        .await?;

    let entries = expect_array(&result, "rr_list")?
        .iter()
        .map(|item| {
            let record = expect_object(item, "rr_list element")?;
            let value = opt_str(record, "value")?.ok_or_else(|| {
                Error::unexpected_shape("rr_list element: missing attribute 'value'")
            })?;
            Ok(RecordSetEntry {
                value: value.to_string(),
                view: opt_str(record, "view")?.map(str::to_string),
                layer3domain: opt_str(record, "layer3domain")?.map(str::to_string),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if spans_several(&entries, |e| &e.view) {
        tracing::warn!("Multiple views found for {} records matching {}", rr_type, pattern);
    }
    if spans_several(&entries, |e| &e.layer3domain) {
        tracing::warn!(
            "Multiple layer3domains found for {} records matching {}",
            rr_type,
            pattern
        );
    }

    Ok(entries)
}

/// Whether `key` differs between any entry and the first one
fn spans_several<K: PartialEq>(
    entries: &[RecordSetEntry],
    key: impl Fn(&RecordSetEntry) -> &K,
) -> bool {
    match entries.split_first() {
        Some((first, rest)) => rest.iter().any(|e| key(e) != key(first)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(view: &str, layer3domain: &str) -> RecordSetEntry {
        RecordSetEntry {
            value: "10.0.0.1".to_string(),
            view: Some(view.to_string()),
            layer3domain: Some(layer3domain.to_string()),
        }
    }

    #[test]
    fn test_spans_several_checks_every_entry() {
        let entries = vec![
            entry("default", "default"),
            entry("internal", "default"),
            entry("default", "default"),
        ];
        assert!(spans_several(&entries, |e| &e.view));
        assert!(!spans_several(&entries, |e| &e.layer3domain));
    }

    #[test]
    fn test_spans_several_empty_and_single() {
        assert!(!spans_several(&[], |e| &e.view));
        assert!(!spans_several(&[entry("a", "b")], |e| &e.view));
    }
}
