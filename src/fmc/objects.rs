//! Mapping between resource kinds and FMC object endpoints
//!
//! Item attributes are sent as FMC JSON fields verbatim. Reference fields are
//! the exception: resolved references travel in the FMC `objects` array as
//! `{id, type}` entries and are read back by name.

use reconcile::{Attributes, Payload, RemoteObject, ResourceKind};
use serde_json::{Map, Value, json};

/// FMC object endpoint for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub kind: &'static str,
    /// Path segment below `/object/`
    pub path: &'static str,
    /// FMC `type` of objects at this endpoint
    pub object_type: &'static str,
}

pub const ENDPOINTS: &[Endpoint] = &[
    Endpoint::new("hosts", "hosts", "Host"),
    Endpoint::new("networks", "networks", "Network"),
    Endpoint::new("ranges", "ranges", "Range"),
    Endpoint::new("fqdns", "fqdns", "FQDN"),
    Endpoint::new("network_groups", "networkgroups", "NetworkGroup"),
    Endpoint::new("ports", "protocolportobjects", "ProtocolPortObject"),
    Endpoint::new("icmpv4_objects", "icmpv4objects", "ICMPV4Object"),
    Endpoint::new("urls", "urls", "Url"),
    Endpoint::new("vlan_tags", "vlantags", "VlanTag"),
    Endpoint::new("sgts", "securitygrouptags", "SecurityGroupTag"),
    Endpoint::new("key_chains", "keychains", "KeyChain"),
    Endpoint::new("dynamic_objects", "dynamicobjects", "DynamicObject"),
];

/// Fields FMC adds to every object that are not item attributes
const SERVER_FIELDS: &[&str] = &["id", "name", "type", "links", "metadata"];

const OBJECTS: &str = "objects";

impl Endpoint {
    const fn new(kind: &'static str, path: &'static str, object_type: &'static str) -> Self {
        Self {
            kind,
            path,
            object_type,
        }
    }

    pub fn for_kind(kind: &ResourceKind) -> Option<&'static Self> {
        ENDPOINTS.iter().find(|e| e.kind == kind.name)
    }
}

/// Request body for a create (no id) or update (with id)
pub fn encode(endpoint: &Endpoint, payload: &Payload, remote_id: Option<&str>) -> Value {
    let mut body: Map<String, Value> = payload
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    body.insert("name".into(), Value::String(payload.name.clone()));
    body.insert("type".into(), Value::String(endpoint.object_type.into()));
    if let Some(id) = remote_id {
        body.insert("id".into(), Value::String(id.into()));
    }

    if !payload.references.is_empty() {
        let mut objects = match body.remove(OBJECTS) {
            Some(Value::Array(existing)) => existing,
            _ => Vec::new(),
        };
        objects.extend(
            payload
                .references
                .values()
                .flatten()
                .map(|r| json!({ "id": r.remote_id, "type": endpoint.object_type })),
        );
        body.insert(OBJECTS.into(), Value::Array(objects));
    }

    Value::Object(body)
}

/// Turn one listed FMC object into a [`RemoteObject`]
///
/// Sibling entries of the `objects` array are moved into the kind's
/// reference field by name. Objects without an id or name are skipped.
pub fn decode(
    endpoint: &Endpoint,
    kind: &ResourceKind,
    raw: Map<String, Value>,
) -> Option<RemoteObject> {
    let remote_id = raw.get("id")?.as_str()?.to_string();
    let name = raw.get("name")?.as_str()?.to_string();

    let mut attributes: Attributes = raw
        .into_iter()
        .filter(|(k, _)| !SERVER_FIELDS.contains(&k.as_str()))
        .collect();

    if let Some(field) = kind.reference_fields.first() {
        let objects = match attributes.remove(OBJECTS) {
            Some(Value::Array(objects)) => objects,
            _ => Vec::new(),
        };
        let (siblings, others): (Vec<Value>, Vec<Value>) = objects
            .into_iter()
            .partition(|o| o.get("type").and_then(Value::as_str) == Some(endpoint.object_type));

        let mut names: Vec<&str> = siblings
            .iter()
            .filter_map(|o| o.get("name").and_then(Value::as_str))
            .collect();
        names.sort_unstable();
        let names = names.into_iter().map(|n| Value::String(n.to_string())).collect();
        attributes.insert(field.attribute.to_string(), Value::Array(names));
        if !others.is_empty() {
            attributes.insert(OBJECTS.into(), Value::Array(others));
        }
    }

    Some(RemoteObject {
        remote_id,
        name,
        attributes,
    })
}

/// Human readable message from an FMC error body
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let messages: Vec<&str> = value
        .get("error")?
        .get("messages")?
        .as_array()?
        .iter()
        .filter_map(|m| m.get("description").and_then(Value::as_str))
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ResolvedReference;
    use reconcile::kind::{self, HOSTS, NETWORK_GROUPS};

    #[test]
    fn test_every_kind_has_an_endpoint() {
        for kind in kind::ALL {
            assert!(Endpoint::for_kind(kind).is_some(), "{}", kind.name);
        }
    }

    #[test]
    fn test_encode_group_references() {
        let endpoint = Endpoint::for_kind(&NETWORK_GROUPS).unwrap();
        let mut payload = Payload {
            name: "g1".into(),
            ..Payload::default()
        };
        payload
            .attributes
            .insert("literals".into(), json!([{ "type": "Host", "value": "10.1.1.1" }]));
        payload.references.insert(
            "network_groups".into(),
            vec![ResolvedReference {
                name: "g2".into(),
                remote_id: "0050-g2".into(),
            }],
        );

        let body = encode(endpoint, &payload, Some("0050-g1"));
        assert_eq!(body["id"], json!("0050-g1"));
        assert_eq!(body["type"], json!("NetworkGroup"));
        assert_eq!(body["objects"], json!([{ "id": "0050-g2", "type": "NetworkGroup" }]));
        assert!(body.get("network_groups").is_none());
    }

    #[test]
    fn test_decode_group_references() {
        let endpoint = Endpoint::for_kind(&NETWORK_GROUPS).unwrap();
        let raw = json!({
            "id": "0050-g1",
            "name": "g1",
            "type": "NetworkGroup",
            "links": { "self": "https://fmc/..." },
            "objects": [
                { "id": "0050-g2", "name": "g2", "type": "NetworkGroup" },
                { "id": "0050-h1", "name": "web", "type": "Host" }
            ],
            "overridable": false
        });
        let Value::Object(raw) = raw else { unreachable!() };

        let object = decode(endpoint, &NETWORK_GROUPS, raw).unwrap();
        assert_eq!(object.remote_id, "0050-g1");
        assert_eq!(object.attributes["network_groups"], json!(["g2"]));
        assert_eq!(object.attributes["objects"].as_array().unwrap().len(), 1);
        assert_eq!(object.attributes["overridable"], json!(false));
        assert!(!object.attributes.contains_key("links"));
    }

    #[test]
    fn test_decoded_references_are_sorted() {
        let endpoint = Endpoint::for_kind(&NETWORK_GROUPS).unwrap();
        let raw = json!({
            "id": "0050-top",
            "name": "top",
            "objects": [
                { "id": "0050-g3", "name": "g3", "type": "NetworkGroup" },
                { "id": "0050-g1", "name": "g1", "type": "NetworkGroup" },
                { "id": "0050-g2", "name": "g2", "type": "NetworkGroup" }
            ]
        });
        let Value::Object(raw) = raw else { unreachable!() };

        let object = decode(endpoint, &NETWORK_GROUPS, raw).unwrap();
        assert_eq!(object.attributes["network_groups"], json!(["g1", "g2", "g3"]));
        assert!(!object.attributes.contains_key("objects"));
    }

    #[test]
    fn test_decode_plain_object() {
        let endpoint = Endpoint::for_kind(&HOSTS).unwrap();
        let Value::Object(raw) = json!({ "id": "1", "name": "web", "value": "10.0.0.1" }) else {
            unreachable!()
        };
        let object = decode(endpoint, &HOSTS, raw).unwrap();
        assert_eq!(object.attributes.len(), 1);

        let Value::Object(nameless) = json!({ "id": "2" }) else { unreachable!() };
        assert!(decode(endpoint, &HOSTS, nameless).is_none());
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error":{"category":"FRAMEWORK",
            "messages":[{"description":"Invalid IP"}],"severity":"ERROR"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("Invalid IP"));
        assert!(error_message("<html>").is_none());
    }
}
