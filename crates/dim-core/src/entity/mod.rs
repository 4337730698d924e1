// # Tracked Entities
//
// The DIM objects whose identity is carried across separate create, read,
// update and delete calls, and the remote calls each lifecycle step maps to.
//
// ## Identifier layouts
//
// | Kind  | Identifier                                  |
// |-------|---------------------------------------------|
// | A     | `<zone>/<view>/<name>/<layer3domain>/<ip>`  |
// | CNAME | `<layer3domain>/<zone>/<view>/<name>/<cname>` |
// | TXT   | `<zone>/<view>/<name>/<strings>`            |
// | IP    | `<layer3domain>/<ip>`                       |
//
// ## Remote calls
//
// - Records: `rr_create`, `rr_get_attrs`, `rr_set_attrs`, `rr_delete`
// - IPs: `ip_mark`, `ipblock_get_ip`, `ipblock_get_attrs`, `ip_free`
//
// `rr_get_attrs` and `rr_set_attrs` take no zone argument, so records are
// looked up by FQDN.

pub mod record_set;

use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::id::{CompositeId, FieldSpec, FieldValue, IdSchema};
use crate::reconcile::{Reconciler, Reconciliation, recompute};
use crate::traits::RpcInvoker;
use crate::value::{expect_i64, expect_object, opt_str};

pub use record_set::{RecordSetEntry, RecordSetQuery, list_record_values};

/// Identifier layout of an A record
pub static A_RECORD: IdSchema = IdSchema {
    kind: "A record",
    fields: &[
        FieldSpec::scalar("zone").reported_as("zone"),
        FieldSpec::scalar("view").reported_as("view"),
        FieldSpec::scalar("name"),
        FieldSpec::scalar("layer3domain"),
        FieldSpec::scalar("ip"),
    ],
};

/// Identifier layout of a CNAME record
pub static CNAME_RECORD: IdSchema = IdSchema {
    kind: "CNAME record",
    fields: &[
        FieldSpec::scalar("layer3domain"),
        FieldSpec::scalar("zone").reported_as("zone"),
        FieldSpec::scalar("view").reported_as("view"),
        FieldSpec::scalar("name"),
        FieldSpec::scalar("cname"),
    ],
};

/// Identifier layout of a TXT record
pub static TXT_RECORD: IdSchema = IdSchema {
    kind: "TXT record",
    fields: &[
        FieldSpec::scalar("zone").reported_as("zone"),
        FieldSpec::scalar("view").reported_as("view"),
        FieldSpec::scalar("name"),
        FieldSpec::list("strings"),
    ],
};

/// Identifier layout of a statically allocated IP address
pub static IP_ADDRESS: IdSchema = IdSchema {
    kind: "ip",
    fields: &[
        FieldSpec::scalar("layer3domain"),
        FieldSpec::scalar("ip").reported_as("ip"),
    ],
};

/// Status DIM reports for an allocated address
pub const STATUS_STATIC: &str = "Static";

/// Kind of tracked DIM entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A record
    ARecord,
    /// CNAME record
    CnameRecord,
    /// TXT record
    TxtRecord,
    /// Static IP address
    Ip,
}

/// Non-identifying record attributes that may change in place
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordAttrs {
    /// Time to live (in seconds)
    pub ttl: Option<i64>,
    /// Free-form comment
    pub comment: Option<String>,
}

/// A newly established entity
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    /// Identifier to track the entity by
    pub id: CompositeId,
    /// Attributes reported by the service after creation
    pub attributes: Map<String, Value>,
}

/// Outcome of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    /// The entity existed and was removed
    Removed,
    /// Nothing to remove; the entity was already gone
    AlreadyAbsent,
}

impl EntityKind {
    /// All tracked kinds
    pub const ALL: [EntityKind; 4] = [
        EntityKind::ARecord,
        EntityKind::CnameRecord,
        EntityKind::TxtRecord,
        EntityKind::Ip,
    ];

    /// Identifier layout of this kind
    pub fn schema(self) -> &'static IdSchema {
        match self {
            EntityKind::ARecord => &A_RECORD,
            EntityKind::CnameRecord => &CNAME_RECORD,
            EntityKind::TxtRecord => &TXT_RECORD,
            EntityKind::Ip => &IP_ADDRESS,
        }
    }

    /// Reconciliation rules of this kind
    ///
    /// An IP whose status is no longer `Static` has been released and counts
    /// as gone.
    pub fn reconciler(self) -> Reconciler {
        match self {
            EntityKind::Ip => Reconciler::new(&IP_ADDRESS).with_liveness("status", STATUS_STATIC),
            kind => Reconciler::new(kind.schema()),
        }
    }

    /// DIM resource record type, `None` for IPs
    pub fn rr_type(self) -> Option<&'static str> {
        match self {
            EntityKind::ARecord => Some("A"),
            EntityKind::CnameRecord => Some("CNAME"),
            EntityKind::TxtRecord => Some("TXT"),
            EntityKind::Ip => None,
        }
    }

    /// Identifier field carrying the record value, also its DIM argument name
    fn value_field(self) -> &'static str {
        match self {
            EntityKind::ARecord | EntityKind::Ip => "ip",
            EntityKind::CnameRecord => "cname",
            EntityKind::TxtRecord => "strings",
        }
    }

    /// Decode a stored identifier of this kind
    pub fn decode(self, stored: &str) -> Result<CompositeId> {
        self.schema().decode(stored)
    }

    /// Method and arguments that fetch the entity named by `id`
    pub fn lookup_call(self, id: &CompositeId) -> Result<(&'static str, Vec<Value>)> {
        match self {
            EntityKind::Ip => Ok(("ipblock_get_attrs", ip_host_args(id)?)),
            kind => {
                let mut args = kind.record_args(id, fqdn(id)?)?;
                insert_opt(&mut args, "view", id.scalar("view"));
                if kind.sends_layer3domain() {
                    insert_opt(&mut args, "layer3domain", id.scalar("layer3domain"));
                }
                Ok(("rr_get_attrs", vec![Value::Object(args)]))
            }
        }
    }

    /// Establish the entity named by `id` and mint its tracking identifier
    ///
    /// Records are created with `rr_create` and fetched back; an A record is
    /// refused unless its address is already allocated. IPs are marked
    /// static with `ip_mark`. Reported fields (see [`FieldSpec::remote_key`])
    /// come from the service so the first read does not see drift.
    pub async fn create<I: RpcInvoker + ?Sized>(
        self,
        invoker: &I,
        id: &CompositeId,
        attrs: &RecordAttrs,
        cancel: &CancellationToken,
    ) -> Result<Created> {
        self.check_schema(id)?;

        let fetched = match self {
            EntityKind::Ip => {
                let params = ip_mark_args(id)?;
                let result = call(invoker, "Create", "ip_mark", params, cancel).await?;
                tracing::info!("IP {} has been made static", id);
                result
            }
            kind => {
                if kind == EntityKind::ARecord {
                    ensure_ip_allocated(invoker, id, cancel).await?;
                }

                let name = required(id, "name")?;
                let mut args = kind.record_args(id, name.to_string())?;
                insert_opt(&mut args, "zone", id.scalar("zone"));
                insert_opt(&mut args, "view", id.scalar("view"));
                if kind.sends_layer3domain() {
                    insert_opt(&mut args, "layer3domain", id.scalar("layer3domain"));
                }
                insert_attrs(&mut args, attrs);

                call(invoker, "Create", "rr_create", vec![Value::Object(args)], cancel).await?;
                tracing::info!("{} {} has been created", kind.schema().kind, id);

                let (method, params) = kind.lookup_call(id)?;
                call(invoker, "Create", method, params, cancel).await?
            }
        };

        let attributes = expect_object(&fetched, self.schema().kind)?.clone();
        let id = recompute(id, &attributes)?;
        Ok(Created { id, attributes })
    }

    /// Fetch the entity named by `stored` and reconcile it
    pub async fn read<I: RpcInvoker + ?Sized>(
        self,
        invoker: &I,
        stored: &str,
        cancel: &CancellationToken,
    ) -> Result<Reconciliation> {
        let id = self.decode(stored)?;
        tracing::debug!("ID parsed {:?}", id);

        let (method, params) = self.lookup_call(&id)?;
        let lookup = call(invoker, "Read", method, params, cancel).await;
        self.reconciler().reconcile_lookup(stored, lookup)
    }

    /// Change the TTL and/or comment of the record named by `stored`
    ///
    /// Returns the attributes reported by `rr_set_attrs`. IPs have nothing
    /// updatable and are rejected.
    pub async fn update<I: RpcInvoker + ?Sized>(
        self,
        invoker: &I,
        stored: &str,
        attrs: &RecordAttrs,
        cancel: &CancellationToken,
    ) -> Result<Map<String, Value>> {
        if self == EntityKind::Ip {
            return Err(Error::invalid_input("IP addresses have no updatable attributes"));
        }

        let id = self.decode(stored)?;
        let mut args = self.record_args(&id, fqdn(&id)?)?;
        insert_opt(&mut args, "view", id.scalar("view"));
        if self.sends_layer3domain() {
            insert_opt(&mut args, "layer3domain", id.scalar("layer3domain"));
        }
        insert_attrs(&mut args, attrs);

        let result = call(invoker, "Update", "rr_set_attrs", vec![Value::Object(args)], cancel).await?;
        tracing::info!("{} {} has been updated", self.schema().kind, stored);

        match result {
            Value::Null => Ok(Map::new()),
            other => Ok(expect_object(&other, "rr_set_attrs")?.clone()),
        }
    }

    /// Remove the entity named by `stored`
    ///
    /// Deleting something that is already gone succeeds with
    /// [`Deleted::AlreadyAbsent`].
    pub async fn delete<I: RpcInvoker + ?Sized>(
        self,
        invoker: &I,
        stored: &str,
        cancel: &CancellationToken,
    ) -> Result<Deleted> {
        let id = self.decode(stored)?;

        match self {
            EntityKind::Ip => {
                let result = call(invoker, "Delete", "ip_free", ip_mark_args(&id)?, cancel).await?;
                match expect_i64(&result, "ip_free")? {
                    1 => Ok(Deleted::Removed),
                    0 => {
                        tracing::warn!("IP {} was already free", stored);
                        Ok(Deleted::AlreadyAbsent)
                    }
                    -1 => Err(Error::invalid_input("Freeing a reserved IP is not supported")),
                    other => Err(Error::unexpected_shape(format!(
                        "Unexpected result from ip_free: {other}"
                    ))),
                }
            }
            kind => {
                let name = required(&id, "name")?;
                let mut args = kind.record_args(&id, name.to_string())?;
                insert_opt(&mut args, "zone", id.scalar("zone"));
                insert_opt(&mut args, "view", id.scalar("view"));
                if kind.sends_layer3domain() {
                    insert_opt(&mut args, "layer3domain", id.scalar("layer3domain"));
                }
                args.insert("references".to_string(), json!("warn"));

                match call(invoker, "Delete", "rr_delete", vec![Value::Object(args)], cancel).await {
                    Ok(_) => Ok(Deleted::Removed),
                    Err(e) if e.is_not_found() => {
                        tracing::debug!("{} {} already removed", kind.schema().kind, stored);
                        Ok(Deleted::AlreadyAbsent)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn sends_layer3domain(self) -> bool {
        self == EntityKind::ARecord
    }

    fn check_schema(self, id: &CompositeId) -> Result<()> {
        if id.schema() != self.schema() {
            return Err(Error::invalid_input(format!(
                "expected a {} ID, got a {} ID",
                self.schema().kind,
                id.schema().kind
            )));
        }
        Ok(())
    }

    /// `type`, `name` and value arguments shared by every record call
    fn record_args(self, id: &CompositeId, name: String) -> Result<Map<String, Value>> {
        let rr_type = self
            .rr_type()
            .ok_or_else(|| Error::invalid_input(format!("{} is not a record", self.schema().kind)))?;

        let value = match id.get(self.value_field()) {
            Some(FieldValue::Scalar(Some(v))) => json!(v),
            Some(FieldValue::List(items)) => json!(items),
            _ => {
                return Err(Error::invalid_input(format!(
                    "{} ID has no '{}' value",
                    self.schema().kind,
                    self.value_field()
                )));
            }
        };

        let mut args = Map::new();
        args.insert("type".to_string(), json!(rr_type));
        args.insert("name".to_string(), json!(name));
        args.insert(self.value_field().to_string(), value);
        Ok(args)
    }
}

/// Fully qualified name of the record named by `id`
///
/// A name ending in '.' is already absolute; otherwise it is relative to the
/// identifier's zone.
pub fn fqdn(id: &CompositeId) -> Result<String> {
    let name = required(id, "name")?;
    if name.ends_with('.') {
        return Ok(name.to_string());
    }
    match id.scalar("zone") {
        Some(zone) => Ok(format!("{}.{}.", name, zone.trim_end_matches('.'))),
        None => Err(Error::invalid_input(format!(
            "record name '{name}' is relative but no zone is set"
        ))),
    }
}

/// Reserve a free address from `cidr` and mint its identifier
pub async fn allocate_ip<I: RpcInvoker + ?Sized>(
    invoker: &I,
    cidr: &str,
    layer3domain: Option<&str>,
    cancel: &CancellationToken,
) -> Result<Created> {
    let mut options = Map::new();
    insert_opt(&mut options, "layer3domain", layer3domain);

    let result = call(
        invoker,
        "Create",
        "ipblock_get_ip",
        vec![json!(cidr), Value::Object(options)],
        cancel,
    )
    .await?;

    let attributes = expect_object(&result, "ipblock_get_ip")?.clone();
    let ip = opt_str(&attributes, "ip")?
        .ok_or_else(|| Error::unexpected_shape("ipblock_get_ip result has no 'ip'"))?;
    let layer3domain = opt_str(&attributes, "layer3domain")?.or(layer3domain);
    let id = IP_ADDRESS.compose(vec![FieldValue::optional(layer3domain), FieldValue::scalar(ip)])?;
    tracing::info!("IP {} allocated from {}", id, cidr);

    Ok(Created { id, attributes })
}

async fn ensure_ip_allocated<I: RpcInvoker + ?Sized>(
    invoker: &I,
    id: &CompositeId,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = call(invoker, "Create", "ipblock_get_attrs", ip_host_args(id)?, cancel).await?;
    let attributes = expect_object(&result, "ipblock_get_attrs")?;
    if opt_str(attributes, "status")? != Some(STATUS_STATIC) {
        return Err(Error::invalid_input(format!(
            "IP address {} is not allocated (not marked as {})",
            id.scalar("ip").unwrap_or_default(),
            STATUS_STATIC
        )));
    }
    Ok(())
}

/// `[ip, {"host": true, "layer3domain"?}]`
fn ip_host_args(id: &CompositeId) -> Result<Vec<Value>> {
    let mut options = Map::new();
    options.insert("host".to_string(), json!(true));
    insert_opt(&mut options, "layer3domain", id.scalar("layer3domain"));
    Ok(vec![json!(required(id, "ip")?), Value::Object(options)])
}

/// `[ip, {"layer3domain"?}]`
fn ip_mark_args(id: &CompositeId) -> Result<Vec<Value>> {
    let mut options = Map::new();
    insert_opt(&mut options, "layer3domain", id.scalar("layer3domain"));
    Ok(vec![json!(required(id, "ip")?), Value::Object(options)])
}

fn required<'a>(id: &'a CompositeId, field: &str) -> Result<&'a str> {
    id.scalar(field).ok_or_else(|| {
        Error::invalid_input(format!("{} ID has no '{}' value", id.schema().kind, field))
    })
}

fn insert_opt(args: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        args.insert(key.to_string(), json!(v));
    }
}

fn insert_attrs(args: &mut Map<String, Value>, attrs: &RecordAttrs) {
    if let Some(ttl) = attrs.ttl {
        args.insert("ttl".to_string(), json!(ttl));
    }
    if let Some(ref comment) = attrs.comment {
        args.insert("comment".to_string(), json!(comment));
    }
}

/// Invoke one call with the debug logging every lifecycle step shares
async fn call<I: RpcInvoker + ?Sized>(
    invoker: &I,
    action: &str,
    method: &'static str,
    params: Vec<Value>,
    cancel: &CancellationToken,
) -> Result<Value> {
    tracing::debug!("{}/{} call with {} arg(s)", action, method, params.len());
    let result = invoker.invoke(method, params, cancel).await;
    match &result {
        Ok(_) => tracing::debug!("{}/{} response received", action, method),
        Err(e) => tracing::debug!("{}/{} failed: {}", action, method, e),
    }
    result
}
