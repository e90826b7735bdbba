//! Resource documents
//!
//! A [`ResourceDocument`] is one subject resource (Machine, bootstrap config
//! or infrastructure machine) held in two forms at once: the canonical JSON
//! bytes and the decoded JSON object. Only the `spec` member is ever diffed
//! or patched.

use crate::hash::ContentHash;
use crate::identity::{ObjectKey, TypeIdentity};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Name of the mutable subtree
pub const SPEC_FIELD: &str = "spec";

const API_VERSION_FIELD: &str = "apiVersion";
const KIND_FIELD: &str = "kind";
const METADATA_FIELD: &str = "metadata";
const LABELS_FIELD: &str = "labels";
const ANNOTATIONS_FIELD: &str = "annotations";

/// Errors related to document construction and mutation
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Top-level value is not an object
    #[error("document is not a JSON object (found {found})")]
    NotAnObject { found: &'static str },

    /// apiVersion or kind missing
    #[error("document has no {field} set")]
    MissingTypeIdentity { field: &'static str },

    /// Canonical form could not be produced
    #[error("failed to marshal document to JSON: {0}")]
    Encode(#[source] serde_json::Error),

    /// Canonical form could not be decoded
    #[error("failed to unmarshal document from JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Semi-structured resource with synchronized canonical and structured forms
///
/// # Invariants
/// - `raw` is always the canonical encoding of `object`
/// - `hash` is always `ContentHash::compute(&raw)`
/// - `object` always carries non-empty `apiVersion` and `kind`
///
/// Every mutator builds the new structured form, encodes it and only then
/// commits all three fields, so a failed mutation leaves the document as it
/// was.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDocument {
    raw: Vec<u8>,
    object: Map<String, Value>,
    hash: ContentHash,
}

impl ResourceDocument {
    /// Create document from a structured value
    ///
    /// # Errors
    /// Returns error if the value is not an object, lacks type identity, or
    /// cannot be encoded
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        Self::from_object(into_object(value)?)
    }

    /// Create document by decoding serialized bytes from scratch
    ///
    /// The canonical form is re-derived from the decoded object, so any
    /// field absent from `raw` is absent from the document.
    ///
    /// # Errors
    /// Returns error if `raw` is not a JSON object with type identity
    pub fn from_slice(raw: &[u8]) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_slice(raw).map_err(DocumentError::Decode)?;
        Self::from_value(value)
    }

    fn from_object(object: Map<String, Value>) -> Result<Self, DocumentError> {
        require_type_identity(&object)?;
        let raw = serde_json::to_vec(&object).map_err(DocumentError::Encode)?;
        let hash = ContentHash::compute(&raw);
        Ok(Self { raw, object, hash })
    }

    /// Canonical serialized form
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Structured form
    #[inline]
    #[must_use]
    pub fn object(&self) -> &Map<String, Value> {
        &self.object
    }

    /// Hash of the canonical form
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Clone the structured form out as a value
    #[inline]
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.object.clone())
    }

    #[must_use]
    pub fn api_version(&self) -> &str {
        str_member(&self.object, API_VERSION_FIELD).unwrap_or_default()
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        str_member(&self.object, KIND_FIELD).unwrap_or_default()
    }

    #[must_use]
    pub fn type_identity(&self) -> TypeIdentity {
        TypeIdentity::new(self.api_version(), self.kind())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata()
            .and_then(|m| str_member(m, "name"))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.metadata()
            .and_then(|m| str_member(m, "namespace"))
            .unwrap_or_default()
    }

    /// `namespace/name` key for log fields
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            namespace: self.namespace().to_string(),
            name: self.name().to_string(),
        }
    }

    #[must_use]
    pub fn labels(&self) -> Option<&Map<String, Value>> {
        self.metadata()
            .and_then(|m| m.get(LABELS_FIELD))
            .and_then(Value::as_object)
    }

    #[must_use]
    pub fn annotations(&self) -> Option<&Map<String, Value>> {
        self.metadata()
            .and_then(|m| m.get(ANNOTATIONS_FIELD))
            .and_then(Value::as_object)
    }

    /// The mutable subtree, if present
    #[inline]
    #[must_use]
    pub fn spec(&self) -> Option<&Value> {
        self.object.get(SPEC_FIELD)
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.object.get(METADATA_FIELD).and_then(Value::as_object)
    }

    /// Replace labels; `None` removes them
    ///
    /// # Errors
    /// Returns error if the canonical form cannot be re-derived
    pub fn set_labels(&mut self, labels: Option<Map<String, Value>>) -> Result<(), DocumentError> {
        self.mutate(|object| set_metadata_member(object, LABELS_FIELD, labels))
    }

    /// Replace annotations; `None` removes them
    ///
    /// # Errors
    /// Returns error if the canonical form cannot be re-derived
    pub fn set_annotations(
        &mut self,
        annotations: Option<Map<String, Value>>,
    ) -> Result<(), DocumentError> {
        self.mutate(|object| set_metadata_member(object, ANNOTATIONS_FIELD, annotations))
    }

    /// Copy the spec of a patched serialization into this document
    ///
    /// `patched` is decoded from scratch, so fields removed by a patch are
    /// really gone. Everything outside `spec` is kept from `self`. If
    /// `patched` has no spec, the spec is removed.
    ///
    /// # Errors
    /// Returns error if `patched` is not a JSON object or the canonical form
    /// cannot be re-derived. `self` is unchanged on error.
    pub fn patch_spec(&mut self, patched: &[u8]) -> Result<(), DocumentError> {
        let patched: Value = serde_json::from_slice(patched).map_err(DocumentError::Decode)?;
        let mut patched = into_object(patched)?;
        let spec = patched.remove(SPEC_FIELD);
        self.mutate(|object| match spec {
            Some(spec) => {
                object.insert(SPEC_FIELD.to_string(), spec);
            }
            None => {
                object.remove(SPEC_FIELD);
            }
        })
    }

    /// Copy with everything stripped except type identity, name, namespace,
    /// labels, annotations and spec
    ///
    /// # Errors
    /// Returns error if the canonical form cannot be produced
    pub fn cleaned(&self) -> Result<Self, DocumentError> {
        let mut metadata = Map::new();
        if !self.name().is_empty() {
            metadata.insert("name".to_string(), Value::from(self.name()));
        }
        if !self.namespace().is_empty() {
            metadata.insert("namespace".to_string(), Value::from(self.namespace()));
        }
        if let Some(labels) = self.labels() {
            metadata.insert(LABELS_FIELD.to_string(), Value::Object(labels.clone()));
        }
        if let Some(annotations) = self.annotations() {
            metadata.insert(
                ANNOTATIONS_FIELD.to_string(),
                Value::Object(annotations.clone()),
            );
        }

        let mut object = Map::new();
        object.insert(API_VERSION_FIELD.to_string(), Value::from(self.api_version()));
        object.insert(KIND_FIELD.to_string(), Value::from(self.kind()));
        object.insert(METADATA_FIELD.to_string(), Value::Object(metadata));
        if let Some(spec) = self.spec() {
            object.insert(SPEC_FIELD.to_string(), spec.clone());
        }
        Self::from_object(object)
    }

    /// The only path that changes a document: edit a copy of the structured
    /// form, re-encode, then commit both forms and the hash together.
    fn mutate<F>(&mut self, edit: F) -> Result<(), DocumentError>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let mut object = self.object.clone();
        edit(&mut object);
        *self = Self::from_object(object)?;
        Ok(())
    }
}

impl Serialize for ResourceDocument {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.object.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, DocumentError> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(DocumentError::NotAnObject {
            found: value_kind(&other),
        }),
    }
}

fn require_type_identity(object: &Map<String, Value>) -> Result<(), DocumentError> {
    for field in [API_VERSION_FIELD, KIND_FIELD] {
        if str_member(object, field).map_or(true, str::is_empty) {
            return Err(DocumentError::MissingTypeIdentity { field });
        }
    }
    Ok(())
}

fn set_metadata_member(object: &mut Map<String, Value>, key: &str, value: Option<Map<String, Value>>) {
    let metadata = object
        .entry(METADATA_FIELD)
        .or_insert_with(|| Value::Object(Map::new()));
    if !metadata.is_object() {
        *metadata = Value::Object(Map::new());
    }
    if let Value::Object(metadata) = metadata {
        match value {
            Some(value) => {
                metadata.insert(key.to_string(), Value::Object(value));
            }
            None => {
                metadata.remove(key);
            }
        }
    }
}

fn str_member<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn machine() -> ResourceDocument {
        ResourceDocument::from_value(json!({
            "apiVersion": "cluster.x-k8s.io/v1beta2",
            "kind": "Machine",
            "metadata": {
                "name": "m-1",
                "namespace": "default",
                "uid": "1234",
                "labels": {"role": "cp"},
                "resourceVersion": "42"
            },
            "spec": {
                "version": "v1.30.0",
                "providerID": "aws:///i-1",
                "readinessGates": [{"conditionType": "A"}]
            },
            "status": {"phase": "Running"}
        }))
        .unwrap()
    }

    fn assert_in_sync(doc: &ResourceDocument) {
        let decoded: Value = serde_json::from_slice(doc.raw()).unwrap();
        assert_eq!(decoded, doc.to_value());
        assert_eq!(*doc.hash(), ContentHash::compute(doc.raw()));
    }

    #[test]
    fn from_value_rejects_non_object() {
        let result = ResourceDocument::from_value(json!([1, 2]));
        assert!(matches!(
            result,
            Err(DocumentError::NotAnObject { found: "array" })
        ));
    }

    #[test]
    fn from_value_requires_type_identity() {
        let result = ResourceDocument::from_value(json!({"apiVersion": "v1", "spec": {}}));
        assert!(matches!(
            result,
            Err(DocumentError::MissingTypeIdentity { field: "kind" })
        ));

        let result = ResourceDocument::from_value(json!({"apiVersion": "", "kind": "Machine"}));
        assert!(matches!(
            result,
            Err(DocumentError::MissingTypeIdentity {
                field: "apiVersion"
            })
        ));
    }

    #[test]
    fn from_slice_rejects_garbage() {
        let result = ResourceDocument::from_slice(b"{not json");
        assert!(matches!(result, Err(DocumentError::Decode(_))));
    }

    #[test]
    fn accessors() {
        let doc = machine();
        assert_eq!(doc.kind(), "Machine");
        assert_eq!(doc.api_version(), "cluster.x-k8s.io/v1beta2");
        assert_eq!(doc.name(), "m-1");
        assert_eq!(doc.namespace(), "default");
        assert_eq!(doc.key().to_string(), "default/m-1");
        assert_eq!(doc.labels().unwrap()["role"], "cp");
        assert!(doc.annotations().is_none());
        assert_eq!(doc.spec().unwrap()["version"], "v1.30.0");
        assert_in_sync(&doc);
    }

    #[test]
    fn set_labels_rederives_both_forms() {
        let mut doc = machine();
        let before = *doc.hash();

        let mut labels = Map::new();
        labels.insert("role".to_string(), json!("worker"));
        doc.set_labels(Some(labels)).unwrap();

        assert_eq!(doc.labels().unwrap()["role"], "worker");
        assert_ne!(*doc.hash(), before);
        assert_in_sync(&doc);
    }

    #[test]
    fn set_annotations_none_removes() {
        let mut doc = machine();
        let mut annotations = Map::new();
        annotations.insert("a".to_string(), json!("b"));
        doc.set_annotations(Some(annotations)).unwrap();
        assert!(doc.annotations().is_some());

        doc.set_annotations(None).unwrap();
        assert!(doc.annotations().is_none());
        assert_in_sync(&doc);
    }

    #[test]
    fn patch_spec_clears_removed_fields() {
        let mut doc = machine();
        let patched = json!({
            "apiVersion": "cluster.x-k8s.io/v1beta2",
            "kind": "Machine",
            "spec": {"version": "v1.31.0"}
        });
        doc.patch_spec(&serde_json::to_vec(&patched).unwrap()).unwrap();

        assert_eq!(doc.spec(), Some(&json!({"version": "v1.31.0"})));
        assert_in_sync(&doc);
    }

    #[test]
    fn patch_spec_keeps_everything_but_spec() {
        let mut doc = machine();
        let patched = json!({
            "apiVersion": "evil/v1",
            "kind": "Other",
            "metadata": {"name": "renamed", "labels": {"x": "y"}},
            "spec": {"version": "v1.31.0"},
            "status": {"phase": "Deleting"}
        });
        doc.patch_spec(&serde_json::to_vec(&patched).unwrap()).unwrap();

        assert_eq!(doc.kind(), "Machine");
        assert_eq!(doc.api_version(), "cluster.x-k8s.io/v1beta2");
        assert_eq!(doc.name(), "m-1");
        assert_eq!(doc.labels().unwrap()["role"], "cp");
        assert_eq!(doc.object()["status"], json!({"phase": "Running"}));
        assert_eq!(doc.spec().unwrap()["version"], "v1.31.0");
    }

    #[test]
    fn patch_spec_without_spec_removes_it() {
        let mut doc = machine();
        doc.patch_spec(br#"{"kind": "Machine"}"#).unwrap();
        assert!(doc.spec().is_none());
        assert_in_sync(&doc);
    }

    #[test]
    fn patch_spec_failure_leaves_document_untouched() {
        let mut doc = machine();
        let before = doc.clone();
        assert!(doc.patch_spec(b"[1,2,3]").is_err());
        assert!(doc.patch_spec(b"{oops").is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn cleaned_strips_status_and_other_metadata() {
        let cleaned = machine().cleaned().unwrap();
        assert_eq!(
            cleaned.to_value(),
            json!({
                "apiVersion": "cluster.x-k8s.io/v1beta2",
                "kind": "Machine",
                "metadata": {
                    "name": "m-1",
                    "namespace": "default",
                    "labels": {"role": "cp"}
                },
                "spec": {
                    "version": "v1.30.0",
                    "providerID": "aws:///i-1",
                    "readinessGates": [{"conditionType": "A"}]
                }
            })
        );
        assert_in_sync(&cleaned);
    }

    #[test]
    fn serde_embeds_type_identity() {
        let doc = machine().cleaned().unwrap();
        let encoded = serde_json::to_value(&doc).unwrap();
        assert_eq!(encoded["kind"], "Machine");
        assert_eq!(encoded["apiVersion"], "cluster.x-k8s.io/v1beta2");

        let decoded: ResourceDocument = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn deserialize_rejects_missing_kind() {
        let result: Result<ResourceDocument, _> =
            serde_json::from_value(json!({"apiVersion": "v1"}));
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn prop_label_mutation_keeps_forms_in_sync(
            labels in prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..6)
        ) {
            let mut doc = machine();
            let labels: Map<String, Value> = labels
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            doc.set_labels(Some(labels.clone())).unwrap();

            prop_assert_eq!(doc.labels(), Some(&labels));
            let decoded: Value = serde_json::from_slice(doc.raw()).unwrap();
            prop_assert_eq!(decoded, doc.to_value());
        }
    }
}
