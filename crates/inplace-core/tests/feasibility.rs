//! End-to-end feasibility evaluations over scripted collaborators

use inplace_core::{
    CanUpdateMachineResponse, Deadline, Decision, FeasibilityConfig, FeasibilityError,
    FeasibilityGate, IneligibleReason,
};
use inplace_patch::{Patch, PatchType};
use inplace_test_utils::{
    enabled_config, init_tracing, machine_spec_patch, setup_test_gate, DefaultingNormalizer,
    FailingNormalizer, PassthroughNormalizer, PassthroughPreparer, Scenario,
    ScriptedExtensionClient,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn in_sync_machine_converges_in_first_round() {
    init_tracing();
    let scenario = Scenario::in_sync();
    let client = Arc::new(ScriptedExtensionClient::new().with_noop_handler("ext"));
    let gate = setup_test_gate(enabled_config(), Arc::clone(&client)).unwrap();

    let decision = gate
        .evaluate(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();

    assert_eq!(
        decision,
        Decision::Eligible {
            handler: "ext".to_string(),
            rounds: 1
        }
    );
    assert_eq!(client.calls().await, vec!["ext"]);
}

#[tokio::test]
async fn extension_patch_makes_machine_eligible() {
    let scenario = Scenario::in_sync().with_desired_version("v1.31.0");
    let client = Arc::new(
        ScriptedExtensionClient::new()
            .with_response("ext", machine_spec_patch("version", json!("v1.31.0"))),
    );
    let gate = setup_test_gate(enabled_config(), client).unwrap();

    let eligible = gate
        .can_update_machine(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();
    assert!(eligible);
}

#[tokio::test]
async fn huge_configured_timeout_still_evaluates() {
    let config = FeasibilityConfig::from_toml_str(
        "in_place_updates = true\nevaluation_timeout_secs = 9223372036854775807\n",
    )
    .unwrap();
    let scenario = Scenario::in_sync();
    let client = Arc::new(ScriptedExtensionClient::new().with_noop_handler("ext"));
    let gate = setup_test_gate(config, client).unwrap();

    let eligible = gate
        .can_update_machine(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();
    assert!(eligible);
}

#[tokio::test]
async fn last_of_many_extensions_converges() {
    let scenario = Scenario::in_sync().with_desired_version("v1.31.0");
    let client = Arc::new(
        ScriptedExtensionClient::new()
            .with_noop_handler("first")
            .with_response("second", machine_spec_patch("version", json!("v1.30.5")))
            .with_response("third", machine_spec_patch("version", json!("v1.31.0")))
            .with_noop_handler("fourth"),
    );
    let config = enabled_config().with_max_extension_handlers(4);
    let gate = setup_test_gate(config, Arc::clone(&client)).unwrap();

    let decision = gate
        .evaluate(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();

    assert_eq!(
        decision,
        Decision::Eligible {
            handler: "third".to_string(),
            rounds: 3
        }
    );
    assert_eq!(client.calls().await, vec!["first", "second", "third"]);

    let requests = client.requests().await;
    assert_eq!(
        requests[2].current.machine.spec().unwrap()["version"],
        "v1.30.5"
    );
}

#[tokio::test]
async fn zero_extensions_is_never_eligible() {
    let scenario = Scenario::in_sync();
    let client = Arc::new(ScriptedExtensionClient::new());
    let gate = setup_test_gate(enabled_config(), client).unwrap();

    let decision = gate
        .evaluate(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();
    assert_eq!(decision, Decision::Ineligible(IneligibleReason::NoExtensions));
}

#[tokio::test]
async fn two_extensions_fail_without_calling_either() {
    let scenario = Scenario::in_sync();
    let client = Arc::new(
        ScriptedExtensionClient::new()
            .with_noop_handler("a")
            .with_noop_handler("b"),
    );
    let gate = setup_test_gate(enabled_config(), Arc::clone(&client)).unwrap();

    let err = gate
        .can_update_machine(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap_err();

    assert!(matches!(err, FeasibilityError::MultipleExtensions { .. }));
    assert!(client.calls().await.is_empty());
}

#[tokio::test]
async fn metadata_drift_never_blocks_update() {
    let scenario = Scenario::in_sync()
        .with_current_labels(&[("stale", "true")])
        .with_desired_annotations(&[("note", "new")]);
    let client = Arc::new(ScriptedExtensionClient::new().with_noop_handler("ext"));
    let gate = setup_test_gate(enabled_config(), Arc::clone(&client)).unwrap();

    let decision = gate
        .evaluate(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();
    assert!(decision.is_eligible());

    let request = &client.requests().await[0];
    assert_eq!(
        request.current.infrastructure_machine.labels(),
        request.desired.infrastructure_machine.labels()
    );
    assert_eq!(
        request.current.bootstrap_config.annotations(),
        request.desired.bootstrap_config.annotations()
    );
}

#[tokio::test]
async fn spec_drift_is_always_reported() {
    let scenario = Scenario::in_sync()
        .with_current_labels(&[("stale", "true")])
        .with_desired_infra_spec(json!({"customImage": "kindest/node:v1.31.0", "extraMounts": []}));
    let client = Arc::new(ScriptedExtensionClient::new().with_noop_handler("ext"));
    let gate = setup_test_gate(enabled_config(), client).unwrap();

    let decision = gate
        .evaluate(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();

    assert_eq!(
        decision.reasons(),
        &[concat!(
            r#"DockerMachine cannot be updated in-place: spec.customImage: "kindest/node:v1.30.0" -> "#,
            r#""kindest/node:v1.31.0""#
        )
        .to_string()]
    );
}

#[tokio::test]
async fn reasons_cover_every_mismatched_resource_in_order() {
    let scenario = Scenario::in_sync()
        .with_desired_version("v1.31.0")
        .with_desired_bootstrap_spec(json!({"files": []}))
        .with_desired_infra_spec(json!({"customImage": "other"}));
    let client = Arc::new(ScriptedExtensionClient::new().with_noop_handler("ext"));
    let gate = setup_test_gate(enabled_config(), client).unwrap();

    let decision = gate
        .evaluate(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();

    let kinds: Vec<&str> = decision
        .reasons()
        .iter()
        .map(|r| r.split(' ').next().unwrap_or_default())
        .collect();
    assert_eq!(kinds, vec!["Machine", "KubeadmConfig", "DockerMachine"]);
}

#[tokio::test]
async fn capability_off_skips_everything() {
    let scenario = Scenario::in_sync();
    let client = Arc::new(ScriptedExtensionClient::new().with_discovery_error("must not be called"));
    let gate = FeasibilityGate::new(
        enabled_config().with_in_place_updates(false),
        Arc::new(FailingNormalizer),
        Arc::new(PassthroughPreparer),
        client,
    )
    .unwrap();

    let eligible = gate
        .can_update_machine(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();
    assert!(!eligible);
}

#[tokio::test]
async fn missing_object_is_ineligible_before_discovery() {
    let scenario = Scenario::in_sync();
    let mut up_to_date = scenario.up_to_date();
    up_to_date.current_infra_machine = None;
    let client = Arc::new(ScriptedExtensionClient::new().with_discovery_error("must not be called"));
    let gate = setup_test_gate(enabled_config(), client).unwrap();

    let decision = gate.evaluate(&scenario.machine, &up_to_date).await.unwrap();
    assert!(matches!(
        decision,
        Decision::Ineligible(IneligibleReason::IncompleteSnapshot(_))
    ));
}

#[tokio::test]
async fn normalization_defaults_are_compared() {
    // The live DockerMachine carries a server-side default the desired
    // object lacks; dry-run apply fills it on both sides.
    let mut scenario = Scenario::in_sync();
    scenario.current_infra_machine = inplace_test_utils::docker_machine(
        "m-1",
        json!({"customImage": "kindest/node:v1.30.0", "extraMounts": [], "bootstrapped": false}),
    );
    let normalizer = Arc::new(DefaultingNormalizer::new(
        "DockerMachine",
        "bootstrapped",
        json!(false),
    ));
    let client = Arc::new(ScriptedExtensionClient::new().with_noop_handler("ext"));
    let gate = FeasibilityGate::new(
        enabled_config(),
        normalizer,
        Arc::new(PassthroughPreparer),
        client,
    )
    .unwrap();

    let eligible = gate
        .can_update_machine(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();
    assert!(eligible);
}

#[tokio::test]
async fn normalization_failure_is_an_error() {
    let scenario = Scenario::in_sync();
    let client = Arc::new(ScriptedExtensionClient::new().with_noop_handler("ext"));
    let gate = FeasibilityGate::new(
        enabled_config(),
        Arc::new(FailingNormalizer),
        Arc::new(PassthroughPreparer),
        client.clone(),
    )
    .unwrap();

    let err = gate
        .can_update_machine(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap_err();

    assert!(err
        .to_string()
        .starts_with("failed to generate CanUpdateMachine request"));
    assert!(client.calls().await.is_empty());
}

#[tokio::test]
async fn extension_failure_is_an_error() {
    let scenario = Scenario::in_sync();
    let client = Arc::new(ScriptedExtensionClient::new().with_failing_handler("ext", "503"));
    let gate = setup_test_gate(enabled_config(), client).unwrap();

    let err = gate
        .can_update_machine(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap_err();
    assert_eq!(err.handler(), Some("ext"));
}

#[tokio::test]
async fn unknown_patch_type_is_an_error() {
    let scenario = Scenario::in_sync();
    let response = CanUpdateMachineResponse::default().with_bootstrap_config_patch(Patch::new(
        PatchType::Unknown("StrategicMergePatch".to_string()),
        "{}",
    ));
    let client = Arc::new(ScriptedExtensionClient::new().with_response("ext", response));
    let gate = setup_test_gate(enabled_config(), client).unwrap();

    let err = gate
        .can_update_machine(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with(
        "failed to apply patches from extension ext to the CanUpdateMachine request"
    ));
}

#[tokio::test]
async fn wire_response_is_decoded_and_applied() {
    let scenario = Scenario::in_sync().with_desired_version("v1.31.0");
    // {"spec":{"version":"v1.31.0"}} as sent by a remote extension
    let response: CanUpdateMachineResponse = serde_json::from_value(json!({
        "machinePatch": {
            "patchType": "JSONMergePatch",
            "patch": "eyJzcGVjIjp7InZlcnNpb24iOiJ2MS4zMS4wIn19"
        }
    }))
    .unwrap();
    let client = Arc::new(ScriptedExtensionClient::new().with_response("ext", response));
    let gate = setup_test_gate(enabled_config(), client).unwrap();

    let eligible = gate
        .can_update_machine(&scenario.machine, &scenario.up_to_date())
        .await
        .unwrap();
    assert!(eligible);
}

#[tokio::test(start_paused = true)]
async fn slow_extension_hits_deadline() {
    let scenario = Scenario::in_sync();
    let client = Arc::new(
        ScriptedExtensionClient::new()
            .with_noop_handler("ext")
            .with_delay(Duration::from_secs(60)),
    );
    let gate = FeasibilityGate::new(
        enabled_config(),
        Arc::new(PassthroughNormalizer::new()),
        Arc::new(PassthroughPreparer),
        client,
    )
    .unwrap();

    let err = gate
        .evaluate_until(
            &scenario.machine,
            &scenario.up_to_date(),
            Deadline::after(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FeasibilityError::Timeout { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn concurrent_evaluations_are_independent() {
    let client = Arc::new(
        ScriptedExtensionClient::new()
            .with_response("ext", machine_spec_patch("version", json!("v1.31.0"))),
    );
    let gate = Arc::new(setup_test_gate(enabled_config(), client).unwrap());

    let mut handles = Vec::new();
    for target in ["v1.31.0", "v1.32.0", "v1.31.0", "v1.32.0"] {
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            let scenario = Scenario::in_sync().with_desired_version(target);
            gate.can_update_machine(&scenario.machine, &scenario.up_to_date())
                .await
                .unwrap()
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert_eq!(results, vec![true, false, true, false]);
}
