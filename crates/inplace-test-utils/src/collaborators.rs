//! Scripted collaborators
//!
//! In-memory stand-ins for the dry-run normalizer, the bootstrap preparer
//! and the extension registry.

use async_trait::async_trait;
use inplace_core::{
    BootstrapConfigPreparer, CanUpdateMachineRequest, CanUpdateMachineResponse, ExtensionClient,
    ObjectNormalizer,
};
use inplace_document::ResourceDocument;
use inplace_patch::Patch;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Normalizer returning objects unchanged, counting calls
#[derive(Debug, Default)]
pub struct PassthroughNormalizer {
    calls: AtomicUsize,
}

impl PassthroughNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectNormalizer for PassthroughNormalizer {
    async fn dry_run_apply(
        &self,
        _field_manager: &str,
        object: ResourceDocument,
    ) -> anyhow::Result<ResourceDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(object)
    }
}

/// Normalizer filling a default spec field on one kind, like an API server
/// defaulting webhook
#[derive(Debug)]
pub struct DefaultingNormalizer {
    kind: String,
    field: String,
    value: Value,
}

impl DefaultingNormalizer {
    pub fn new(kind: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self {
            kind: kind.into(),
            field: field.into(),
            value,
        }
    }
}

#[async_trait]
impl ObjectNormalizer for DefaultingNormalizer {
    async fn dry_run_apply(
        &self,
        _field_manager: &str,
        object: ResourceDocument,
    ) -> anyhow::Result<ResourceDocument> {
        if object.kind() != self.kind {
            return Ok(object);
        }
        let mut value = object.to_value();
        let spec = value
            .as_object_mut()
            .ok_or_else(|| anyhow::anyhow!("object is not a map"))?
            .entry("spec")
            .or_insert_with(|| json!({}));
        if let Some(spec) = spec.as_object_mut() {
            spec.entry(self.field.clone())
                .or_insert_with(|| self.value.clone());
        }
        Ok(ResourceDocument::from_value(value)?)
    }
}

/// Normalizer that always fails
#[derive(Debug, Default)]
pub struct FailingNormalizer;

#[async_trait]
impl ObjectNormalizer for FailingNormalizer {
    async fn dry_run_apply(
        &self,
        _field_manager: &str,
        object: ResourceDocument,
    ) -> anyhow::Result<ResourceDocument> {
        anyhow::bail!("dry-run apply of {} rejected", object.key())
    }
}

/// Bootstrap preparer returning both configs unchanged
#[derive(Debug, Default)]
pub struct PassthroughPreparer;

#[async_trait]
impl BootstrapConfigPreparer for PassthroughPreparer {
    async fn prepare_for_diff(
        &self,
        desired: ResourceDocument,
        current: ResourceDocument,
    ) -> anyhow::Result<(ResourceDocument, ResourceDocument)> {
        Ok((desired, current))
    }
}

type Reply =
    Arc<dyn Fn(&CanUpdateMachineRequest) -> anyhow::Result<CanUpdateMachineResponse> + Send + Sync>;

/// Extension registry with scripted handlers
///
/// Handlers are discovered in registration order. Every call is recorded
/// together with the request it received.
#[derive(Default)]
pub struct ScriptedExtensionClient {
    order: Vec<String>,
    replies: HashMap<String, Reply>,
    discovery_error: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, CanUpdateMachineRequest)>>,
}

impl ScriptedExtensionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler answering with `reply`
    #[must_use]
    pub fn with_handler<F>(mut self, name: &str, reply: F) -> Self
    where
        F: Fn(&CanUpdateMachineRequest) -> anyhow::Result<CanUpdateMachineResponse>
            + Send
            + Sync
            + 'static,
    {
        self.order.push(name.to_string());
        self.replies.insert(name.to_string(), Arc::new(reply));
        self
    }

    /// Register a handler proposing no patches
    #[must_use]
    pub fn with_noop_handler(self, name: &str) -> Self {
        self.with_handler(name, |_| Ok(CanUpdateMachineResponse::default()))
    }

    /// Register a handler returning a fixed response
    #[must_use]
    pub fn with_response(self, name: &str, response: CanUpdateMachineResponse) -> Self {
        self.with_handler(name, move |_| Ok(response.clone()))
    }

    /// Register a handler that fails
    #[must_use]
    pub fn with_failing_handler(self, name: &str, message: &str) -> Self {
        let message = message.to_string();
        self.with_handler(name, move |_| Err(anyhow::anyhow!(message.clone())))
    }

    /// Make discovery fail
    #[must_use]
    pub fn with_discovery_error(mut self, message: &str) -> Self {
        self.discovery_error = Some(message.to_string());
        self
    }

    /// Delay every call
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handler names called so far, in order
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Requests received so far, in order
    pub async fn requests(&self) -> Vec<CanUpdateMachineRequest> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }
}

#[async_trait]
impl ExtensionClient for ScriptedExtensionClient {
    async fn discover(&self, _machine: &ResourceDocument) -> anyhow::Result<Vec<String>> {
        match &self.discovery_error {
            Some(message) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(self.order.clone()),
        }
    }

    async fn call(
        &self,
        name: &str,
        request: &CanUpdateMachineRequest,
    ) -> anyhow::Result<CanUpdateMachineResponse> {
        self.calls
            .lock()
            .await
            .push((name.to_string(), request.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self
            .replies
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("extension {name} is not registered"))?;
        reply(request)
    }
}

/// Response patching the Machine spec field `field` to `value`
pub fn machine_spec_patch(field: &str, value: Value) -> CanUpdateMachineResponse {
    CanUpdateMachineResponse::default().with_machine_patch(Patch::json_patch(&json!([
        {"op": "replace", "path": format!("/spec/{field}"), "value": value}
    ])))
}
