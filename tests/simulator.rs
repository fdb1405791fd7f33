//! Integration tests for the execution simulator

mod common;

use common::{branch, document, edge, node, simulator_config, RecordingEffects};
use flowdeck::{
    config::SimulatorConfig,
    runtime::{fold_results, Hooks, SimulationPhase, StepStatus},
    NodeKind, Simulator,
};
use serde_json::json;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

fn logs(simulator: &Simulator) -> Vec<(String, StepStatus, String)> {
    simulator
        .steps()
        .iter()
        .map(|s| (s.node_id.clone(), s.status, s.log.clone()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_condition_follows_false_branch_without_prior_response() {
    let doc = document(
        vec![
            node("a", NodeKind::ManualTrigger, json!({})),
            node("b", NodeKind::Condition, json!({ "expression": "response.status == 200" })),
            node("c", NodeKind::Log, json!({ "message": "yes" })),
            node("d", NodeKind::Log, json!({ "message": "no" })),
        ],
        vec![
            edge("e1", "a", "b"),
            branch("e2", "b", "c", "true"),
            branch("e3", "b", "d", "false"),
        ],
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.play(&mut ()).await;

    assert_eq!(
        logs(&sim),
        vec![
            ("a".to_string(), StepStatus::Success, "OK".to_string()),
            ("b".to_string(), StepStatus::Success, "Condition: false".to_string()),
            ("d".to_string(), StepStatus::Success, "no".to_string()),
        ]
    );
    assert_eq!(sim.current_node(), None);
    assert_eq!(sim.phase(), SimulationPhase::Finished);
    assert!(!sim.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_http_response_drives_true_branch() {
    let doc = document(
        vec![
            node("start", NodeKind::WebhookTrigger, json!({})),
            node("call", NodeKind::Http, json!({ "url": "https://api.example.com/ping" })),
            node("ok", NodeKind::Condition, json!({ "expression": "response.status == 200" })),
            node("yes", NodeKind::Log, json!({ "message": "reachable" })),
            node("no", NodeKind::Log, json!({ "message": "unreachable" })),
        ],
        vec![
            edge("e1", "start", "call"),
            edge("e2", "call", "ok"),
            branch("e3", "ok", "yes", "True"),
            branch("e4", "ok", "no", "false"),
        ],
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.play(&mut ()).await;

    let visited: Vec<_> = sim.steps().iter().map(|s| s.node_id.as_str()).collect();
    assert_eq!(visited, vec!["start", "call", "ok", "yes"]);
    assert_eq!(sim.steps()[1].log, "HTTP call to https://api.example.com/ping returned 200");
    assert_eq!(sim.steps()[2].log, "Condition: true");
    assert_eq!(sim.last_response(), Some(&json!({ "status": 200 })));
}

#[tokio::test]
async fn test_missing_branch_logs_error_and_stops() {
    let doc = document(
        vec![
            node("check", NodeKind::Condition, json!({ "expression": "true" })),
            node("only-false", NodeKind::Log, json!({})),
        ],
        vec![branch("e1", "check", "only-false", "false")],
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.step(&mut ()).await;

    assert_eq!(
        logs(&sim),
        vec![
            ("check".to_string(), StepStatus::Success, "Condition: true".to_string()),
            ("check".to_string(), StepStatus::Error, "Missing true edge".to_string()),
        ]
    );
    assert_eq!(sim.current_node(), None);
    assert!(sim.last_transition().is_none());
    assert_eq!(sim.pointer(), 0);
    assert_eq!(sim.phase(), SimulationPhase::Finished);
}

#[tokio::test]
async fn test_branch_to_removed_node_counts_as_missing() {
    let doc = document(
        vec![node("check", NodeKind::Condition, json!({ "expression": "1 < 2" }))],
        vec![branch("e1", "check", "ghost", "true")],
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.step(&mut ()).await;

    assert_eq!(sim.steps().last().map(|s| s.log.as_str()), Some("Missing true edge"));
    assert!(sim.last_transition().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failed_email_still_advances() {
    let doc = document(
        vec![
            node("start", NodeKind::ManualTrigger, json!({})),
            node("mail", NodeKind::Email, json!({ "to": "failure@gmail.com" })),
            node("after", NodeKind::Log, json!({ "message": "after" })),
        ],
        vec![edge("e1", "start", "mail"), edge("e2", "mail", "after")],
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.play(&mut ()).await;

    assert_eq!(
        logs(&sim),
        vec![
            ("start".to_string(), StepStatus::Success, "OK".to_string()),
            ("mail".to_string(), StepStatus::Error, "Failed to send to failure@gmail.com".to_string()),
            ("after".to_string(), StepStatus::Success, "after".to_string()),
        ]
    );
    assert!(sim.last_response().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reset_is_idempotent_and_rerun_is_deterministic() {
    let doc = document(
        vec![
            node("start", NodeKind::ManualTrigger, json!({})),
            node("sms", NodeKind::Sms, json!({ "to": "+15550100", "message": "hi" })),
        ],
        vec![edge("e1", "start", "sms")],
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.play(&mut ()).await;
    let first = logs(&sim);
    assert_eq!(first.len(), 2);

    sim.reset();
    sim.reset();
    assert!(sim.steps().is_empty());
    assert_eq!(sim.pointer(), -1);
    assert_eq!(sim.current_node(), None);
    assert!(sim.last_response().is_none());
    assert_eq!(sim.phase(), SimulationPhase::Idle);

    sim.play(&mut ()).await;
    assert_eq!(logs(&sim), first);
}

#[tokio::test(start_paused = true)]
async fn test_pause_lets_in_flight_step_finish() {
    let doc = document(
        vec![
            node("t", NodeKind::ManualTrigger, json!({})),
            node("mail", NodeKind::Email, json!({ "to": "ops@example.com" })),
            node("l", NodeKind::Log, json!({ "message": "done" })),
        ],
        vec![edge("e1", "t", "mail"), edge("e2", "mail", "l")],
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.step(&mut ()).await;
    assert_eq!(sim.current_node(), Some("mail"));
    assert_eq!(sim.phase(), SimulationPhase::Paused);

    let handle = sim.pause_handle();
    let mut observer = ();
    tokio::join!(sim.play(&mut observer), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.pause();
    });

    let visited: Vec<_> = sim.steps().iter().map(|s| s.node_id.as_str()).collect();
    assert_eq!(visited, vec!["t", "mail"]);
    assert_eq!(sim.steps()[1].log, "Email sent to ops@example.com");
    assert_eq!(sim.current_node(), Some("l"));
    assert_eq!(sim.phase(), SimulationPhase::Paused);

    sim.play(&mut ()).await;
    assert_eq!(sim.steps().len(), 3);
    assert_eq!(sim.phase(), SimulationPhase::Finished);
}

#[tokio::test]
async fn test_play_limit_stops_cyclic_graph() {
    let doc = document(
        vec![
            node("start", NodeKind::ManualTrigger, json!({})),
            node("a", NodeKind::Log, json!({ "message": "a" })),
            node("b", NodeKind::Log, json!({ "message": "b" })),
        ],
        vec![edge("e1", "start", "a"), edge("e2", "a", "b"), edge("e3", "b", "a")],
    );
    let config = SimulatorConfig {
        action_latency_ms: 0,
        max_play_steps: Some(5),
        max_run_steps: 10_000,
    };

    let mut sim = Simulator::new(doc, &config);
    assert!(sim.index().is_cyclic());
    sim.play(&mut ()).await;

    let visited: Vec<_> = sim.steps().iter().map(|s| s.node_id.as_str()).collect();
    assert_eq!(visited, vec!["start", "a", "b", "a", "b"]);
    assert_eq!(sim.current_node(), Some("a"));
    assert_eq!(sim.phase(), SimulationPhase::Paused);
}

#[tokio::test]
async fn test_unbounded_cycle_can_be_paused_from_another_task() {
    let doc = document(
        vec![
            node("t", NodeKind::ManualTrigger, json!({})),
            node("a", NodeKind::Log, json!({ "message": "a" })),
            node("b", NodeKind::Log, json!({ "message": "b" })),
        ],
        vec![edge("e1", "t", "a"), edge("e2", "a", "b"), edge("e3", "b", "a")],
    );
    let config = SimulatorConfig {
        action_latency_ms: 0,
        max_play_steps: None,
        max_run_steps: 10_000,
    };

    let mut sim = Simulator::new(doc, &config);
    let handle = sim.pause_handle();
    let run = tokio::spawn(async move {
        sim.play(&mut ()).await;
        sim
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.pause();
    let sim = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("play should observe the pause")
        .unwrap();

    assert!(!sim.steps().is_empty());
    assert!(!sim.is_running());
    assert_eq!(sim.phase(), SimulationPhase::Paused);
    assert!(matches!(sim.current_node(), Some("a") | Some("b")));
}

#[tokio::test]
async fn test_cycle_without_entry_point_never_starts() {
    let doc = document(
        vec![node("a", NodeKind::Log, json!({})), node("b", NodeKind::Log, json!({}))],
        vec![edge("e1", "a", "b"), edge("e2", "b", "a")],
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.play(&mut ()).await;

    assert!(sim.steps().is_empty());
    assert_eq!(sim.pointer(), -1);
    assert_eq!(sim.phase(), SimulationPhase::Finished);
}

#[tokio::test]
async fn test_custom_effects_receive_requests() {
    let effects = Arc::new(RecordingEffects::default());
    let doc = document(
        vec![
            node("start", NodeKind::ManualTrigger, json!({})),
            node("post", NodeKind::Http, json!({ "url": "https://hooks.example.com", "method": "POST" })),
            node("check", NodeKind::Condition, json!({ "expression": "response.status >= 200 && response.status < 300" })),
            node("sms", NodeKind::Sms, json!({ "to": "+15550101", "message": "accepted" })),
        ],
        vec![
            edge("e1", "start", "post"),
            edge("e2", "post", "check"),
            branch("e3", "check", "sms", "true"),
        ],
    );

    let mut sim = Simulator::with_effects(doc, effects.clone(), &simulator_config());
    sim.play(&mut ()).await;

    assert_eq!(
        effects.calls(),
        vec!["http:POST:https://hooks.example.com", "sms:+15550101:accepted"]
    );
    assert_eq!(sim.steps()[1].log, "HTTP call to https://hooks.example.com returned 202");
    assert_eq!(sim.steps()[3].log, "SMS sent to +15550101");
}

#[tokio::test]
async fn test_rejected_effects_report_errors() {
    let effects = Arc::new(RecordingEffects::rejecting("gateway down"));
    let doc = document(
        vec![node("mail", NodeKind::Email, json!({ "to": "a@example.com" }))],
        vec![],
    );

    let mut sim = Simulator::with_effects(doc, effects.clone(), &simulator_config());
    sim.step(&mut ()).await;

    assert_eq!(effects.calls().len(), 1);
    assert_eq!(sim.steps()[0].status, StepStatus::Error);
    assert_eq!(sim.steps()[0].log, "Failed to send to a@example.com");
}

#[tokio::test(start_paused = true)]
async fn test_delay_response_satisfies_strict_condition() {
    let doc = document(
        vec![
            node("start", NodeKind::ManualTrigger, json!({})),
            node("wait", NodeKind::Delay, json!({ "ms": 250 })),
            node("check", NodeKind::Condition, json!({ "expression": "response.status === 200" })),
            node("yes", NodeKind::Log, json!({ "message": "waited" })),
        ],
        vec![
            edge("e1", "start", "wait"),
            edge("e2", "wait", "check"),
            branch("e3", "check", "yes", "true"),
        ],
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.play(&mut ()).await;

    let visited: Vec<_> = sim.steps().iter().map(|s| s.node_id.as_str()).collect();
    assert_eq!(visited, vec!["start", "wait", "check", "yes"]);
    assert_eq!(sim.steps()[1].log, "Delayed for 250ms");
}

#[tokio::test]
async fn test_hooks_run_around_every_step() {
    let doc = document(
        vec![
            node("a", NodeKind::ManualTrigger, json!({})),
            node("b", NodeKind::Log, json!({})),
        ],
        vec![edge("e1", "a", "b")],
    );
    let events = Mutex::new(Vec::new());

    let mut hooks = Hooks::new(
        |id: &str| {
            events.lock().unwrap().push(format!("before:{}", id));
            Ok(())
        },
        || {
            events.lock().unwrap().push("after".to_string());
            Err(anyhow::anyhow!("observer failure"))
        },
    );

    let mut sim = Simulator::new(doc, &simulator_config());
    sim.play(&mut hooks).await;
    drop(hooks);

    assert_eq!(
        events.into_inner().unwrap(),
        vec!["before:a", "after", "before:b", "after"]
    );
    assert_eq!(sim.steps().len(), 2);
}

#[tokio::test]
async fn test_fold_results_marks_nodes() {
    let doc = document(
        vec![
            node("start", NodeKind::ManualTrigger, json!({})),
            node("broken", NodeKind::Http, json!({})),
        ],
        vec![edge("e1", "start", "broken")],
    );

    let mut sim = Simulator::new(doc.clone(), &simulator_config());
    sim.play(&mut ()).await;

    let mut updated = (*doc).clone();
    fold_results(sim.steps(), &mut updated);

    assert_eq!(updated.nodes[0].data.status, flowdeck::workflow::NodeStatus::Success);
    assert_eq!(updated.nodes[0].data.logs, vec!["OK"]);
    assert_eq!(updated.nodes[1].data.status, flowdeck::workflow::NodeStatus::Error);
    assert_eq!(updated.nodes[1].data.logs, vec!["Failed to make HTTP call to <missing>"]);
    assert!(doc.nodes[1].data.logs.is_empty());
}
