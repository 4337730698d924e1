// # Composite Identifiers
//
// A tracked DIM entity is named by several key fields (zone, view, name,
// layer3domain, value...). The codec packs them into one reversible string.
//
// ## Format
//
// Fields are joined with '/' in the order given by the entity's [`IdSchema`]:
//
// ```text
// A record:    <zone>/<view>/<name>/<layer3domain>/<ip>
// TXT record:  <zone>/<view>/<name>/<escaped,escaped,...>
// ```
//
// - An absent scalar field is an empty segment and decodes back to absent.
// - A list field escapes each element (see [`escape`]) and joins them with ','.
//   Lists hold at least one element, so an empty segment decodes to `[""]`.
// - Scalars may not contain '/'; encoding rejects them instead of emitting
//   a token that would not decode.
//
// One generic codec serves every entity kind; the per-kind knowledge is just
// the field-descriptor list.

pub mod escape;

use std::fmt;

use crate::error::{Error, Result};

pub use escape::{escape_element, unescape_element};

/// Separator between fields of a composite identifier
pub const FIELD_SEPARATOR: char = '/';

/// Separator between escaped elements of a list-valued field
pub const LIST_SEPARATOR: char = ',';

/// Shape of one identifier field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single optional string
    Scalar,
    /// Ordered list of strings
    List,
}

/// Descriptor of one identifier field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name, e.g. "zone"
    pub name: &'static str,
    /// Scalar or list
    pub kind: FieldKind,
    /// Attribute of a fetched remote object that supersedes this field
    /// during reconciliation, if the service reports it
    pub remote_key: Option<&'static str>,
}

impl FieldSpec {
    /// A scalar field not reported back by the service
    pub const fn scalar(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Scalar,
            remote_key: None,
        }
    }

    /// A list field not reported back by the service
    pub const fn list(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::List,
            remote_key: None,
        }
    }

    /// Mark the field as reported by the service under `key`
    pub const fn reported_as(mut self, key: &'static str) -> Self {
        self.remote_key = Some(key);
        self
    }
}

/// Value of one identifier field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Scalar value; `None` is absent (encoded as an empty segment)
    Scalar(Option<String>),
    /// List value
    List(Vec<String>),
}

impl FieldValue {
    /// Present scalar value
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Scalar(Some(value.into()))
    }

    /// Scalar value where the empty string means absent
    pub fn optional(value: Option<&str>) -> Self {
        Self::Scalar(value.filter(|v| !v.is_empty()).map(str::to_string))
    }

    /// Absent scalar value
    pub fn absent() -> Self {
        Self::Scalar(None)
    }

    /// List value
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Scalar(_) => FieldKind::Scalar,
            Self::List(_) => FieldKind::List,
        }
    }
}

/// Ordered field layout of one tracked entity kind
#[derive(Debug, PartialEq, Eq)]
pub struct IdSchema {
    /// Entity kind name, used in error messages
    pub kind: &'static str,
    /// Fields in encoding order
    pub fields: &'static [FieldSpec],
}

impl IdSchema {
    /// Number of '/'-separated parts an identifier of this kind has
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Human-readable layout, e.g. `<zone>/<view>/<name>`
    pub fn layout(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("<{}>", f.name))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Position of the field called `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Build an identifier from `values`, checked against this schema
    pub fn compose(&'static self, values: Vec<FieldValue>) -> Result<CompositeId> {
        CompositeId::new(self, values)
    }

    /// Encode `values` into an identifier string
    pub fn encode(&'static self, values: Vec<FieldValue>) -> Result<String> {
        Ok(self.compose(values)?.encode())
    }

    /// Decode an identifier string
    ///
    /// The string must split into exactly [`arity`](Self::arity) parts;
    /// anything else is [`Error::Format`], never a partial result.
    pub fn decode(&'static self, s: &str) -> Result<CompositeId> {
        let parts: Vec<&str> = s.split(FIELD_SEPARATOR).collect();
        if parts.len() != self.arity() {
            return Err(Error::format(format!(
                "{} ID '{}' has {} part(s), expected {} ({})",
                self.kind,
                s,
                parts.len(),
                self.arity(),
                self.layout()
            )));
        }

        let values = self
            .fields
            .iter()
            .zip(parts)
            .map(|(spec, part)| match spec.kind {
                FieldKind::Scalar => Ok(FieldValue::optional(Some(part))),
                FieldKind::List => decode_list(part).map(FieldValue::List).map_err(|e| match e {
                    Error::Format(msg) => {
                        Error::format(format!("{} ID, '{}' part: {}", self.kind, spec.name, msg))
                    }
                    other => other,
                }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompositeId {
            schema: self,
            values,
        })
    }
}

/// A decoded or freshly minted identifier
///
/// Values always match the schema's arity and field kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeId {
    schema: &'static IdSchema,
    values: Vec<FieldValue>,
}

impl CompositeId {
    /// Build an identifier, checking arity, field kinds and separators
    ///
    /// A present but empty scalar is stored as absent. An empty list is
    /// rejected.
    pub fn new(schema: &'static IdSchema, values: Vec<FieldValue>) -> Result<Self> {
        if values.len() != schema.arity() {
            return Err(Error::format(format!(
                "{} ID needs {} field(s) ({}), got {}",
                schema.kind,
                schema.arity(),
                schema.layout(),
                values.len()
            )));
        }

        for (spec, value) in schema.fields.iter().zip(&values) {
            if spec.kind != value.kind() {
                return Err(Error::format(format!(
                    "{} ID field '{}' expects a {:?} value",
                    schema.kind, spec.name, spec.kind
                )));
            }
            if let FieldValue::List(items) = value
                && items.is_empty()
            {
                return Err(Error::format(format!(
                    "{} ID field '{}' needs at least one element",
                    schema.kind, spec.name
                )));
            }
            if let FieldValue::Scalar(Some(s)) = value
                && s.contains(FIELD_SEPARATOR)
            {
                return Err(Error::format(format!(
                    "{} ID field '{}' must not contain '{}', got '{}'",
                    schema.kind, spec.name, FIELD_SEPARATOR, s
                )));
            }
        }

        let values = values
            .into_iter()
            .map(|value| match value {
                FieldValue::Scalar(s) => FieldValue::optional(s.as_deref()),
                list => list,
            })
            .collect();

        Ok(Self { schema, values })
    }

    /// Schema this identifier follows
    pub fn schema(&self) -> &'static IdSchema {
        self.schema
    }

    /// All field values in schema order
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Value of the field called `name`
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.schema.position(name).map(|i| &self.values[i])
    }

    /// Present scalar value of the field called `name`
    pub fn scalar(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::Scalar(value)) => value.as_deref(),
            _ => None,
        }
    }

    /// List value of the field called `name`
    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.get(name) {
            Some(FieldValue::List(values)) => Some(values),
            _ => None,
        }
    }

    /// Copy of this identifier with field `name` replaced
    pub fn with_field(&self, name: &str, value: FieldValue) -> Result<Self> {
        let position = self.schema.position(name).ok_or_else(|| {
            Error::format(format!("{} ID has no field '{}'", self.schema.kind, name))
        })?;
        let mut values = self.values.clone();
        values[position] = value;
        Self::new(self.schema, values)
    }

    /// Encode to the identifier string
    pub fn encode(&self) -> String {
        self.values
            .iter()
            .map(|value| match value {
                FieldValue::Scalar(s) => s.clone().unwrap_or_default(),
                FieldValue::List(items) => items
                    .iter()
                    .map(|item| escape_element(item))
                    .collect::<Vec<_>>()
                    .join(&LIST_SEPARATOR.to_string()),
            })
            .collect::<Vec<_>>()
            .join(&FIELD_SEPARATOR.to_string())
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn decode_list(part: &str) -> Result<Vec<String>> {
    part.split(LIST_SEPARATOR).map(unescape_element).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    static HOST: IdSchema = IdSchema {
        kind: "host",
        fields: &[
            FieldSpec::scalar("zone"),
            FieldSpec::scalar("view"),
            FieldSpec::scalar("name"),
        ],
    };

    static NOTE: IdSchema = IdSchema {
        kind: "note",
        fields: &[FieldSpec::scalar("name"), FieldSpec::list("lines")],
    };

    #[test]
    fn test_absent_fields_are_empty_segments() {
        let id = HOST
            .encode(vec![
                FieldValue::scalar("example.com"),
                FieldValue::absent(),
                FieldValue::scalar("www"),
            ])
            .unwrap();
        assert_eq!(id, "example.com//www");

        let decoded = HOST.decode(&id).unwrap();
        assert_eq!(decoded.get("view"), Some(&FieldValue::Scalar(None)));
        assert_eq!(decoded.scalar("zone"), Some("example.com"));
    }

    #[test]
    fn test_present_empty_string_decodes_to_absent() {
        let id = HOST
            .encode(vec![
                FieldValue::Scalar(Some(String::new())),
                FieldValue::absent(),
                FieldValue::scalar("www.example.com."),
            ])
            .unwrap();
        assert_eq!(HOST.decode(&id).unwrap().get("zone"), Some(&FieldValue::absent()));
    }

    #[test]
    fn test_scalar_with_separator_rejected() {
        let err = HOST
            .encode(vec![
                FieldValue::scalar("example.com"),
                FieldValue::absent(),
                FieldValue::scalar("a/b"),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let err = NOTE
            .compose(vec![FieldValue::list(["x"]), FieldValue::list(["y"])])
            .unwrap_err();
        assert!(err.to_string().contains("'name'"));
    }

    #[test]
    fn test_wrong_arity_on_compose() {
        assert!(HOST.compose(vec![FieldValue::scalar("example.com")]).is_err());
    }

    #[test]
    fn test_decode_arity_mismatch() {
        for bad in ["", "example.com", "example.com/www", "a/b/c/d"] {
            let err = HOST.decode(bad).unwrap_err();
            assert!(matches!(err, Error::Format(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn test_decode_error_mentions_layout() {
        let err = HOST.decode("x").unwrap_err();
        assert!(err.to_string().contains("<zone>/<view>/<name>"));
    }

    #[test]
    fn test_single_empty_element_round_trips() {
        let id = NOTE
            .compose(vec![FieldValue::scalar("n"), FieldValue::list([""])])
            .unwrap();
        assert_eq!(id.encode(), "n/");

        let decoded = NOTE.decode("n/").unwrap();
        assert_eq!(decoded.list("lines"), Some(&[String::new()][..]));
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_empty_list_rejected() {
        let err = NOTE
            .compose(vec![FieldValue::scalar("n"), FieldValue::list(Vec::<String>::new())])
            .unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(err.to_string().contains("at least one element"));
    }

    #[test]
    fn test_empty_elements_keep_their_positions() {
        let values = vec![FieldValue::scalar("n"), FieldValue::list(["", "x", ""])];
        let id = NOTE.compose(values.clone()).unwrap();
        assert_eq!(id.encode(), "n/,x,");
        assert_eq!(NOTE.decode(&id.encode()).unwrap().values(), &values[..]);
    }

    #[test]
    fn test_list_element_decode_failure() {
        let err = NOTE.decode("n/ok,bad%").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(err.to_string().contains("'lines'"));
    }

    #[test]
    fn test_with_field() {
        let id = HOST.decode("example.com//www").unwrap();
        let changed = id.with_field("view", FieldValue::scalar("internal")).unwrap();
        assert_eq!(changed.encode(), "example.com/internal/www");
        assert!(id.with_field("ttl", FieldValue::absent()).is_err());
    }

    #[test]
    fn test_display_matches_encode() {
        let id = HOST.decode("example.com/internal/www").unwrap();
        assert_eq!(id.to_string(), "example.com/internal/www");
        assert_eq!(id.schema().kind, "host");
    }
}
