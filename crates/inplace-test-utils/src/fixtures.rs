//! Document fixtures
//!
//! [`Scenario`] holds a complete, in-sync set of Machine, KubeadmConfig and
//! DockerMachine documents; tests tweak one side and hand the result to the
//! gate.

use inplace_core::UpToDateResult;
use inplace_document::ResourceDocument;
use serde_json::{json, Map, Value};

pub const MACHINE_API_VERSION: &str = "cluster.x-k8s.io/v1beta2";
pub const BOOTSTRAP_API_VERSION: &str = "bootstrap.cluster.x-k8s.io/v1beta2";
pub const INFRA_API_VERSION: &str = "infrastructure.cluster.x-k8s.io/v1beta2";

fn document(api_version: &str, kind: &str, name: &str, spec: Value) -> ResourceDocument {
    ResourceDocument::from_value(json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": {
            "name": name,
            "namespace": "default",
            "uid": format!("uid-{name}"),
            "resourceVersion": "1",
            "labels": {"cluster.x-k8s.io/cluster-name": "test-cluster"}
        },
        "spec": spec,
        "status": {"ready": true}
    }))
    .expect("fixture document is valid")
}

pub fn machine(name: &str, version: &str) -> ResourceDocument {
    document(
        MACHINE_API_VERSION,
        "Machine",
        name,
        json!({
            "clusterName": "test-cluster",
            "version": version,
            "bootstrap": {"configRef": {"kind": "KubeadmConfig", "name": name}},
            "infrastructureRef": {"kind": "DockerMachine", "name": name}
        }),
    )
}

pub fn kubeadm_config(name: &str, spec: Value) -> ResourceDocument {
    document(BOOTSTRAP_API_VERSION, "KubeadmConfig", name, spec)
}

pub fn docker_machine(name: &str, spec: Value) -> ResourceDocument {
    document(INFRA_API_VERSION, "DockerMachine", name, spec)
}

fn with_spec(doc: &ResourceDocument, spec: Value) -> ResourceDocument {
    let mut value = doc.to_value();
    value["spec"] = spec;
    ResourceDocument::from_value(value).expect("fixture document is valid")
}

fn with_metadata(doc: &ResourceDocument, field: &str, entries: &[(&str, &str)]) -> ResourceDocument {
    let mut value = doc.to_value();
    let map: Map<String, Value> = entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
        .collect();
    value["metadata"][field] = Value::Object(map);
    ResourceDocument::from_value(value).expect("fixture document is valid")
}

/// Complete current/desired state for one Machine
#[derive(Debug, Clone)]
pub struct Scenario {
    pub machine: ResourceDocument,
    pub desired_machine: ResourceDocument,
    pub current_bootstrap_config: ResourceDocument,
    pub desired_bootstrap_config: ResourceDocument,
    pub current_infra_machine: ResourceDocument,
    pub desired_infra_machine: ResourceDocument,
}

impl Scenario {
    /// Every spec already equal
    pub fn in_sync() -> Self {
        let kubeadm_spec = json!({
            "clusterConfiguration": {"etcd": {"local": {"dataDir": "/var/lib/etcd"}}},
            "files": [{"path": "/etc/motd", "content": "hello"}]
        });
        let docker_spec = json!({"customImage": "kindest/node:v1.30.0", "extraMounts": []});
        Self {
            machine: machine("m-1", "v1.30.0"),
            desired_machine: machine("m-1", "v1.30.0"),
            current_bootstrap_config: kubeadm_config("m-1", kubeadm_spec.clone()),
            desired_bootstrap_config: kubeadm_config("m-1", kubeadm_spec),
            current_infra_machine: docker_machine("m-1", docker_spec.clone()),
            desired_infra_machine: docker_machine("m-1", docker_spec),
        }
    }

    /// Desired Machine asks for another Kubernetes version
    #[must_use]
    pub fn with_desired_version(mut self, version: &str) -> Self {
        let mut spec = self.desired_machine.spec().cloned().unwrap_or_else(|| json!({}));
        spec["version"] = json!(version);
        self.desired_machine = with_spec(&self.desired_machine, spec);
        self
    }

    /// Desired KubeadmConfig spec
    #[must_use]
    pub fn with_desired_bootstrap_spec(mut self, spec: Value) -> Self {
        self.desired_bootstrap_config = with_spec(&self.desired_bootstrap_config, spec);
        self
    }

    /// Desired DockerMachine spec
    #[must_use]
    pub fn with_desired_infra_spec(mut self, spec: Value) -> Self {
        self.desired_infra_machine = with_spec(&self.desired_infra_machine, spec);
        self
    }

    /// Current-side labels on KubeadmConfig and DockerMachine
    #[must_use]
    pub fn with_current_labels(mut self, labels: &[(&str, &str)]) -> Self {
        self.current_bootstrap_config = with_metadata(&self.current_bootstrap_config, "labels", labels);
        self.current_infra_machine = with_metadata(&self.current_infra_machine, "labels", labels);
        self
    }

    /// Desired-side annotations on KubeadmConfig and DockerMachine
    #[must_use]
    pub fn with_desired_annotations(mut self, annotations: &[(&str, &str)]) -> Self {
        self.desired_bootstrap_config =
            with_metadata(&self.desired_bootstrap_config, "annotations", annotations);
        self.desired_infra_machine =
            with_metadata(&self.desired_infra_machine, "annotations", annotations);
        self
    }

    /// Bundle the desired and current documents for the gate
    pub fn up_to_date(&self) -> UpToDateResult {
        UpToDateResult::new()
            .with_desired_machine(self.desired_machine.clone())
            .with_bootstrap_config(
                self.current_bootstrap_config.clone(),
                self.desired_bootstrap_config.clone(),
            )
            .with_infra_machine(
                self.current_infra_machine.clone(),
                self.desired_infra_machine.clone(),
            )
    }
}
