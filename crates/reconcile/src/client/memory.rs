//! In-memory remote client.
//!
//! Behaves like a small object store with referential integrity: references
//! must point at existing ids, and an object cannot be deleted while another
//! object still references it. Every call is recorded, and failures can be
//! scripted per call kind and item name.

use super::{Payload, RemoteClient, RemoteObject};
use crate::error::RemoteError;
use crate::kind::ResourceKind;
use crate::types::Attributes;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Kind of call made against the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    List,
    Create,
    Update,
    Delete,
}

/// A recorded call; `name` is empty for list calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub name: String,
}

#[derive(Debug, Clone)]
struct Stored {
    name: String,
    attributes: Attributes,
    /// reference field -> referenced ids
    references: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    objects: BTreeMap<String, Stored>,
    calls: Vec<Call>,
    failures: HashMap<(CallKind, String), VecDeque<RemoteError>>,
}

impl Inner {
    fn id_of(&self, name: &str) -> Option<&String> {
        self.objects
            .iter()
            .find(|(_, o)| o.name == name)
            .map(|(id, _)| id)
    }

    fn name_of(&self, remote_id: &str) -> String {
        self.objects
            .get(remote_id)
            .map(|o| o.name.clone())
            .unwrap_or_default()
    }

    fn to_object(&self, id: &str, stored: &Stored) -> RemoteObject {
        let mut attributes = stored.attributes.clone();
        for (field, ids) in &stored.references {
            let names: Vec<serde_json::Value> = ids
                .iter()
                .map(|id| serde_json::Value::String(self.name_of(id)))
                .collect();
            attributes.insert(field.clone(), serde_json::Value::Array(names));
        }
        RemoteObject {
            remote_id: id.to_string(),
            name: stored.name.clone(),
            attributes,
        }
    }

    fn take_failure(&mut self, kind: CallKind, name: &str) -> Option<RemoteError> {
        let key = (kind, name.to_string());
        let queue = self.failures.get_mut(&key)?;
        let error = queue.pop_front();
        if queue.is_empty() {
            self.failures.remove(&key);
        }
        error
    }

    fn check_references(&self, payload: &Payload) -> Result<(), RemoteError> {
        for id in payload.referenced_ids() {
            if !self.objects.contains_key(id) {
                return Err(RemoteError::validation(format!(
                    "{} references unknown object id {id}",
                    payload.name
                )));
            }
        }
        Ok(())
    }

    fn stored(payload: &Payload) -> Stored {
        Stored {
            name: payload.name.clone(),
            attributes: payload.attributes.clone(),
            references: payload
                .references
                .iter()
                .map(|(field, refs)| {
                    (
                        field.clone(),
                        refs.iter().map(|r| r.remote_id.clone()).collect(),
                    )
                })
                .collect(),
        }
    }
}

/// Thread-safe in-memory implementation of [`RemoteClient`]
#[derive(Debug)]
pub struct MemoryClient {
    kind: ResourceKind,
    inner: Mutex<Inner>,
}

impl MemoryClient {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an object directly, as if it had been created out of band
    pub fn seed(&self, name: &str, attributes: Attributes) -> String {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = format!("{}-{:04}", self.kind.name, inner.next_id);
        inner.objects.insert(
            id.clone(),
            Stored {
                name: name.to_string(),
                attributes,
                references: BTreeMap::new(),
            },
        );
        id
    }

    /// Remove an object out of band, ignoring references
    pub fn remove(&self, name: &str) -> bool {
        let mut inner = self.lock();
        match inner.id_of(name).cloned() {
            Some(id) => inner.objects.remove(&id).is_some(),
            None => false,
        }
    }

    /// Make the next call of `kind` for `name` fail with `error`
    ///
    /// Queue several failures to script a sequence of attempts. Use an empty
    /// name for list calls.
    pub fn fail(&self, kind: CallKind, name: &str, error: RemoteError) {
        self.lock()
            .failures
            .entry((kind, name.to_string()))
            .or_default()
            .push_back(error);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of create, update and delete calls made so far
    pub fn mutation_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.kind != CallKind::List)
            .count()
    }

    /// Position of the first call of `kind` for `name`
    pub fn position(&self, kind: CallKind, name: &str) -> Option<usize> {
        self.lock()
            .calls
            .iter()
            .position(|c| c.kind == kind && c.name == name)
    }

    /// Look up a stored object by name
    pub fn get(&self, name: &str) -> Option<RemoteObject> {
        let inner = self.lock();
        let id = inner.id_of(name)?;
        Some(inner.to_object(id, &inner.objects[id]))
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RemoteClient for MemoryClient {
    fn list(&self) -> Result<Vec<RemoteObject>, RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(Call {
            kind: CallKind::List,
            name: String::new(),
        });
        if let Some(error) = inner.take_failure(CallKind::List, "") {
            return Err(error);
        }
        Ok(inner
            .objects
            .iter()
            .map(|(id, stored)| inner.to_object(id, stored))
            .collect())
    }

    fn create(&self, payload: &Payload) -> Result<String, RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(Call {
            kind: CallKind::Create,
            name: payload.name.clone(),
        });
        if let Some(error) = inner.take_failure(CallKind::Create, &payload.name) {
            return Err(error);
        }
        if inner.id_of(&payload.name).is_some() {
            return Err(RemoteError::conflict(format!(
                "an object named {} already exists",
                payload.name
            )));
        }
        inner.check_references(payload)?;

        inner.next_id += 1;
        let id = format!("{}-{:04}", self.kind.name, inner.next_id);
        inner.objects.insert(id.clone(), Inner::stored(payload));
        Ok(id)
    }

    fn update(&self, remote_id: &str, payload: &Payload) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.calls.push(Call {
            kind: CallKind::Update,
            name: payload.name.clone(),
        });
        if let Some(error) = inner.take_failure(CallKind::Update, &payload.name) {
            return Err(error);
        }
        if !inner.objects.contains_key(remote_id) {
            return Err(RemoteError::not_found(format!("object id {remote_id}")));
        }
        inner.check_references(payload)?;
        inner
            .objects
            .insert(remote_id.to_string(), Inner::stored(payload));
        Ok(())
    }

    fn delete(&self, remote_id: &str) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        let name = inner.name_of(remote_id);
        inner.calls.push(Call {
            kind: CallKind::Delete,
            name: name.clone(),
        });
        if let Some(error) = inner.take_failure(CallKind::Delete, &name) {
            return Err(error);
        }
        if !inner.objects.contains_key(remote_id) {
            return Err(RemoteError::not_found(format!("object id {remote_id}")));
        }
        if let Some(user) = inner
            .objects
            .values()
            .find(|o| o.references.values().flatten().any(|id| id == remote_id))
        {
            return Err(RemoteError::conflict(format!(
                "{name} is in use by {}",
                user.name
            )));
        }
        inner.objects.remove(remote_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ResolvedReference;
    use crate::kind::NETWORK_GROUPS;
    use serde_json::json;

    fn payload(name: &str, refs: &[(&str, &str)]) -> Payload {
        let mut payload = Payload {
            name: name.to_string(),
            ..Payload::default()
        };
        if !refs.is_empty() {
            payload.references.insert(
                "network_groups".into(),
                refs.iter()
                    .map(|(n, id)| ResolvedReference {
                        name: (*n).to_string(),
                        remote_id: (*id).to_string(),
                    })
                    .collect(),
            );
        }
        payload
    }

    #[test]
    fn test_referential_integrity() {
        let client = MemoryClient::new(NETWORK_GROUPS);
        let g2 = client.create(&payload("g2", &[])).unwrap();
        client.create(&payload("g1", &[("g2", &g2)])).unwrap();

        let err = client.delete(&g2).unwrap_err();
        assert!(matches!(err, RemoteError::Conflict { .. }));

        let err = client.create(&payload("g3", &[("x", "nope")])).unwrap_err();
        assert!(matches!(err, RemoteError::Validation { .. }));
    }

    #[test]
    fn test_list_reports_reference_names() {
        let client = MemoryClient::new(NETWORK_GROUPS);
        let g2 = client.create(&payload("g2", &[])).unwrap();
        client.create(&payload("g1", &[("g2", &g2)])).unwrap();

        let g1 = client.get("g1").unwrap();
        assert_eq!(g1.attributes["network_groups"], json!(["g2"]));
        assert_eq!(client.list().unwrap().len(), 2);
    }

    #[test]
    fn test_scripted_failures_are_consumed_in_order() {
        let client = MemoryClient::new(NETWORK_GROUPS);
        client.fail(CallKind::Create, "g1", RemoteError::transient("timeout"));

        assert!(client.create(&payload("g1", &[])).is_err());
        assert!(client.create(&payload("g1", &[])).is_ok());
        assert_eq!(client.calls().len(), 2);
        assert_eq!(client.mutation_count(), 2);
    }
}
