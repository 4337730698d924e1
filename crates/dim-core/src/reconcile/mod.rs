// # Reconciler
//
// Decides, on every read, whether a tracked entity is still the entity its
// identifier names.
//
// ## Policy
//
// - The identifier is recomputed from what the service actually returned
//   (fields with a `remote_key` are taken from the fetched attributes), then
//   string-compared with the identifier the caller holds.
// - Equal → `Unchanged`. Different → `Drifted`; never a silent rewrite.
// - The lookup failing with the "not found" sentinel (code 1), or the entity
//   reporting a released state, → `NotFound`. This is the only fault that is
//   converted to a non-error outcome.
//
// ## Lifecycle
//
// ```text
// Absent → Created → (Unchanged)* → Deleted (Absent)
//             │            │
//             └── Drifted ─┘   (terminal error)
// any read ── NotFound ──▶ Absent
// ```

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::id::{CompositeId, FieldKind, FieldValue, IdSchema};
use crate::value::{expect_object, kind_of};

/// Attribute that must hold a given value for the entity to count as present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    /// Attribute name, e.g. "status"
    pub key: &'static str,
    /// Value meaning "still allocated", e.g. "Static"
    pub expected: &'static str,
}

/// Outcome of reconciling a stored identifier with fresh remote data
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Remote entity still matches; attributes may be persisted under `id`
    Unchanged {
        /// The identifier, as decoded from the stored string
        id: CompositeId,
        /// Freshly fetched attributes
        attributes: Map<String, Value>,
    },
    /// Remote entity no longer corresponds to the stored identifier
    Drifted {
        /// Identifier held by the caller
        old: String,
        /// Identifier recomputed from the fetched attributes
        new: String,
    },
    /// Remote entity is gone; the caller should forget it without failing
    NotFound,
}

impl Reconciliation {
    /// Whether the entity is gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Escalate drift to [`Error::Drifted`]
    ///
    /// Returns `Ok(None)` for `NotFound`.
    pub fn into_result(self) -> Result<Option<(CompositeId, Map<String, Value>)>> {
        match self {
            Self::Unchanged { id, attributes } => Ok(Some((id, attributes))),
            Self::Drifted { old, new } => Err(Error::Drifted { old, new }),
            Self::NotFound => Ok(None),
        }
    }
}

/// Reconciliation rules for one entity kind
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    schema: &'static IdSchema,
    liveness: Option<Liveness>,
}

impl Reconciler {
    /// Reconciler for identifiers following `schema`
    pub const fn new(schema: &'static IdSchema) -> Self {
        Self {
            schema,
            liveness: None,
        }
    }

    /// Treat the entity as gone unless `key` equals `expected`
    pub const fn with_liveness(mut self, key: &'static str, expected: &'static str) -> Self {
        self.liveness = Some(Liveness { key, expected });
        self
    }

    /// Schema of the identifiers this reconciler handles
    pub fn schema(&self) -> &'static IdSchema {
        self.schema
    }

    /// Reconcile `stored` against the outcome of the lookup keyed by it
    ///
    /// A lookup error carrying the not-found sentinel becomes
    /// [`Reconciliation::NotFound`]; every other lookup error propagates.
    pub fn reconcile_lookup(
        &self,
        stored: &str,
        lookup: Result<Value>,
    ) -> Result<Reconciliation> {
        match lookup {
            Ok(fetched) => self.reconcile(stored, &fetched),
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} {} not found (has been removed?)", self.schema.kind, stored);
                Ok(Reconciliation::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Reconcile `stored` against freshly fetched attributes
    ///
    /// Fails with [`Error::Format`] if `stored` does not decode and with
    /// [`Error::UnexpectedShape`] if `fetched` is not an object of the
    /// expected attribute types.
    pub fn reconcile(&self, stored: &str, fetched: &Value) -> Result<Reconciliation> {
        let id = self.schema.decode(stored)?;
        let attributes = expect_object(fetched, self.schema.kind)?;

        if let Some(liveness) = self.liveness {
            let state = attributes.get(liveness.key).and_then(Value::as_str);
            if state != Some(liveness.expected) {
                tracing::debug!(
                    "{} {} has {}={:?}, treating as released",
                    self.schema.kind,
                    stored,
                    liveness.key,
                    state
                );
                return Ok(Reconciliation::NotFound);
            }
        }

        let recomputed = recompute(&id, attributes)?.encode();
        if recomputed != stored {
            tracing::warn!(
                "{} ID has changed, old={}, new={}",
                self.schema.kind,
                stored,
                recomputed
            );
            return Ok(Reconciliation::Drifted {
                old: stored.to_string(),
                new: recomputed,
            });
        }

        Ok(Reconciliation::Unchanged {
            id,
            attributes: attributes.clone(),
        })
    }
}

/// Recompute an identifier, taking reported fields from `attributes`
///
/// Fields without a `remote_key`, or whose key is missing or null in
/// `attributes`, keep their stored value.
pub fn recompute(stored: &CompositeId, attributes: &Map<String, Value>) -> Result<CompositeId> {
    let schema = stored.schema();
    let mut values = stored.values().to_vec();

    for (spec, slot) in schema.fields.iter().zip(values.iter_mut()) {
        let Some(key) = spec.remote_key else {
            continue;
        };
        let reported = match attributes.get(key) {
            None | Some(Value::Null) => continue,
            Some(v) => v,
        };

        *slot = match (spec.kind, reported) {
            (FieldKind::Scalar, Value::String(s)) => FieldValue::optional(Some(s)),
            (FieldKind::List, Value::Array(items)) if items.is_empty() => {
                return Err(Error::unexpected_shape(format!(
                    "attribute '{key}' of {}: empty list",
                    schema.kind
                )));
            }
            (FieldKind::List, Value::Array(items)) => FieldValue::List(
                items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            Error::unexpected_shape(format!(
                                "attribute '{key}': expected string elements, got {}",
                                kind_of(item)
                            ))
                        })
                    })
                    .collect::<Result<_>>()?,
            ),
            (_, other) => {
                return Err(Error::unexpected_shape(format!(
                    "attribute '{key}' of {}: unexpected {}",
                    schema.kind,
                    kind_of(other)
                )));
            }
        };
    }

    CompositeId::new(schema, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::FieldSpec;
    use serde_json::json;

    static RECORD: IdSchema = IdSchema {
        kind: "record",
        fields: &[
            FieldSpec::scalar("zone").reported_as("zone"),
            FieldSpec::scalar("view").reported_as("view"),
            FieldSpec::scalar("name"),
        ],
    };

    static ADDRESS: IdSchema = IdSchema {
        kind: "address",
        fields: &[FieldSpec::scalar("layer3domain"), FieldSpec::scalar("ip").reported_as("ip")],
    };

    static NOTES: IdSchema = IdSchema {
        kind: "notes",
        fields: &[FieldSpec::scalar("name"), FieldSpec::list("lines").reported_as("lines")],
    };

    #[test]
    fn test_recompute_takes_reported_fields() {
        let id = RECORD.decode("example.com//www").unwrap();
        let attrs = json!({"zone": "example.org", "view": null, "name": "ignored"});
        let recomputed = recompute(&id, attrs.as_object().unwrap()).unwrap();
        assert_eq!(recomputed.encode(), "example.org//www");
    }

    #[test]
    fn test_recompute_rejects_wrong_types() {
        let id = RECORD.decode("example.com//www").unwrap();
        let attrs = json!({"zone": 42});
        let err = recompute(&id, attrs.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape(_)));
    }

    #[test]
    fn test_recompute_rejects_empty_reported_list() {
        let id = NOTES.decode("www/a,b").unwrap();
        let attrs = json!({"lines": []});
        let err = recompute(&id, attrs.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape(_)));
    }

    #[test]
    fn test_unchanged_keeps_attributes() {
        let reconciler = Reconciler::new(&RECORD);
        let outcome = reconciler
            .reconcile("example.com//www", &json!({"zone": "example.com", "ttl": 300}))
            .unwrap();

        match outcome {
            Reconciliation::Unchanged { id, attributes } => {
                assert_eq!(id.encode(), "example.com//www");
                assert_eq!(attributes["ttl"], 300);
            }
            other => panic!("expected Unchanged, got {:?}", other),
        }
    }

    #[test]
    fn test_drift_detected() {
        let reconciler = Reconciler::new(&RECORD);
        let outcome = reconciler
            .reconcile("example.com//www", &json!({"zone": "example.com", "view": "internal"}))
            .unwrap();
        assert_eq!(
            outcome,
            Reconciliation::Drifted {
                old: "example.com//www".to_string(),
                new: "example.com/internal/www".to_string(),
            }
        );
        assert!(matches!(outcome.into_result(), Err(Error::Drifted { .. })));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let reconciler = Reconciler::new(&RECORD);
        for fetched in [
            json!({"zone": "example.com", "ttl": 300}),
            json!({"zone": "example.com", "view": "internal"}),
        ] {
            let first = reconciler.reconcile("example.com//www", &fetched).unwrap();
            let second = reconciler.reconcile("example.com//www", &fetched).unwrap();
            assert_eq!(first, second);
        }

        let addresses = Reconciler::new(&ADDRESS).with_liveness("status", "Static");
        let released = json!({"ip": "10.0.0.1", "status": "Available"});
        assert_eq!(
            addresses.reconcile("default/10.0.0.1", &released).unwrap(),
            addresses.reconcile("default/10.0.0.1", &released).unwrap()
        );
    }

    #[test]
    fn test_liveness_released_is_not_found() {
        let reconciler = Reconciler::new(&ADDRESS).with_liveness("status", "Static");
        let outcome = reconciler
            .reconcile("default/10.0.0.1", &json!({"ip": "10.0.0.1", "status": "Available"}))
            .unwrap();
        assert!(outcome.is_not_found());

        let outcome = reconciler
            .reconcile("default/10.0.0.1", &json!({"ip": "10.0.0.1", "status": "Static"}))
            .unwrap();
        assert!(matches!(outcome, Reconciliation::Unchanged { .. }));
    }

    #[test]
    fn test_sentinel_lookup_error_is_not_found() {
        let reconciler = Reconciler::new(&RECORD);
        let lookup = Err(Error::remote("rr_get_attrs", 1, "not found"));
        assert_eq!(
            reconciler.reconcile_lookup("example.com//www", lookup).unwrap(),
            Reconciliation::NotFound
        );
        assert_eq!(Reconciliation::NotFound.into_result().unwrap(), None);
    }

    #[test]
    fn test_other_lookup_errors_propagate() {
        let reconciler = Reconciler::new(&RECORD);
        let lookup = Err(Error::remote("rr_get_attrs", 2, "permission denied"));
        let err = reconciler.reconcile_lookup("example.com//www", lookup).unwrap_err();
        assert_eq!(err.remote_code(), Some(2));
    }

    #[test]
    fn test_malformed_stored_id_is_format_error() {
        let reconciler = Reconciler::new(&RECORD);
        let err = reconciler.reconcile("example.com/www", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_non_object_result_is_shape_error() {
        let reconciler = Reconciler::new(&RECORD);
        let err = reconciler.reconcile("example.com//www", &json!([])).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape(_)));
    }
}
