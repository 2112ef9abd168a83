// tests/registry_tests.rs
mod common;

use common::*;
use runbook::{RunbookError, ServerState, StepSelection, StepState, StepStatus, TriggerResponse};
use std::sync::Arc;

fn docs_state() -> ServerState {
  ServerState::new(vec![
    pipeline("Docs", vec![link_step("Wiki", "w"), link_step("Board", "b")]),
    pipeline("Other", vec![link_step("Readme", "r")]),
  ])
}

#[test]
fn test_pipeline_from_name_is_exact() {
  let state = docs_state();
  assert!(state.pipeline_from_name("Docs").is_some());
  assert!(state.pipeline_from_name("docs").is_none());
  assert!(state.pipeline_from_name("Missing").is_none());
  assert!(state.step_states("Missing").is_none());
  assert!(state.status("Missing").is_none());
}

#[test]
fn test_no_execution_lookups_are_not_found() {
  let state = docs_state();
  assert!(!state.has_execution());
  assert!(!state.is_running());
  let err = state.step_output("Wiki").unwrap_err();
  assert!(matches!(err, RunbookError::NoExecution));
  assert!(err.is_not_found());
}

#[test]
fn test_new_execution_with_unknown_pipeline_fails() {
  let state = docs_state();
  let err = state
    .new_execution(state.pipeline_from_name("Missing"), vec![StepSelection::checked("x")])
    .unwrap_err();
  assert!(matches!(err, RunbookError::MissingPipeline));
  assert!(!state.has_execution());
}

#[tokio::test]
async fn test_new_execution_fails_only_while_unfinished() {
  setup_tracing();
  let state = docs_state();
  let docs = || state.pipeline_from_name("Docs");
  let selection = || vec![StepSelection::checked("Wiki")];

  state.new_execution(docs(), selection()).unwrap();
  assert!(state.has_execution());
  assert!(state.is_running());

  // NotStarted still counts as unfinished.
  let err = state.new_execution(docs(), selection()).unwrap_err();
  assert!(matches!(err, RunbookError::AlreadyRunning { .. }));
  assert!(matches!(state.reset("Docs"), Err(RunbookError::AlreadyRunning { .. })));

  state.execute().await;
  assert!(!state.is_running());
  assert!(state.has_execution());

  // A finished run is replaced directly.
  state.new_execution(docs(), selection()).unwrap();
  state.execute().await;

  state.reset("Docs").unwrap();
  assert!(!state.has_execution());
  state.new_execution(docs(), selection()).unwrap();
  assert!(state.is_running());
}

#[test]
fn test_concurrent_new_executions_have_exactly_one_winner() {
  let state = docs_state();
  let results: Vec<bool> = std::thread::scope(|scope| {
    let handles: Vec<_> = (0..8)
      .map(|_| {
        scope.spawn(|| {
          state
            .new_execution(state.pipeline_from_name("Docs"), vec![StepSelection::checked("Wiki")])
            .is_ok()
        })
      })
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
async fn test_reset_restores_waiting_states() {
  let state = docs_state();
  state
    .new_execution(state.pipeline_from_name("Docs"), vec![StepSelection::checked("Wiki")])
    .unwrap();
  state.execute().await;
  assert_eq!(
    state.step_states("Docs").unwrap()[0],
    StepStatus { step: "Wiki".to_string(), state: StepState::Running }
  );

  state.reset("Docs").unwrap();

  assert!(state
    .step_states("Docs")
    .unwrap()
    .iter()
    .all(|s| s.state == StepState::Waiting));
  assert!(matches!(
    state.reset("Missing"),
    Err(RunbookError::PipelineNotFound { .. })
  ));
}

#[test]
fn test_kill_without_active_run_is_a_no_op() {
  let state = docs_state();
  assert!(state.kill("Docs").is_ok());
  assert!(state.kill("Missing").is_ok());
  assert!(!state.has_execution());
  assert!(state
    .step_states("Docs")
    .unwrap()
    .iter()
    .all(|s| s.state == StepState::Waiting));
}

#[test]
fn test_kill_of_other_pipeline_during_run_is_not_found() {
  let state = docs_state();
  state
    .new_execution(state.pipeline_from_name("Docs"), vec![StepSelection::checked("Wiki")])
    .unwrap();
  assert!(matches!(
    state.kill("Other"),
    Err(RunbookError::PipelineNotFound { .. })
  ));
  assert!(state.kill("Docs").is_ok());
}

#[tokio::test]
async fn test_trigger_unknown_pipeline_is_not_started() {
  let state = Arc::new(docs_state());
  assert_eq!(
    state.trigger("Missing", vec![StepSelection::checked("Wiki")]),
    TriggerResponse { started: false }
  );
  assert!(!state.has_execution());
}

#[test]
fn test_payloads_serialize_like_the_control_surface_expects() {
  let state = docs_state();
  let status = serde_json::to_value(state.status("Docs").unwrap()).unwrap();
  assert_eq!(
    status,
    serde_json::json!({
      "running": false,
      "stepStates": [
        { "Step": "Wiki", "State": "Waiting" },
        { "Step": "Board", "State": "Waiting" }
      ]
    })
  );

  let selection: Vec<StepSelection> =
    serde_json::from_str(r#"[{"StepName": "Board", "Checked": true}, {"StepName": "Wiki", "Checked": false}]"#)
      .unwrap();
  assert_eq!(selection, [StepSelection::checked("Board"), StepSelection::unchecked("Wiki")]);

  assert_eq!(
    serde_json::to_string(&TriggerResponse { started: true }).unwrap(),
    r#"{"started":true}"#
  );
}

#[cfg(unix)]
mod scenarios {
  use super::*;
  use serial_test::serial;

  fn build_state(dir: &ScratchDir) -> Arc<ServerState> {
    Arc::new(ServerState::new(vec![pipeline(
      "Build",
      vec![
        script_step(dir, "A", "sleep 0.3\necho hello\n"),
        script_step(dir, "B", "exit 1\n"),
      ],
    )]))
  }

  #[tokio::test]
  #[serial]
  async fn test_trigger_runs_every_step_and_rejects_second_trigger() {
    setup_tracing();
    let dir = ScratchDir::new("scenario-a");
    let state = build_state(&dir);
    let selection = vec![StepSelection::checked("A"), StepSelection::checked("B")];

    assert!(state.trigger("Build", selection.clone()).started);
    assert!(!state.trigger("Build", selection).started);
    assert!(state.is_running());

    wait_until_idle(&state).await;

    let status = state.status("Build").unwrap();
    assert!(!status.running);
    assert_eq!(
      status.step_states,
      vec![
        StepStatus { step: "A".to_string(), state: StepState::Success },
        StepStatus { step: "B".to_string(), state: StepState::Failed },
      ]
    );
    assert!(state.step_output("A").unwrap().contains("hello"));
    let b = state.step_output("B").unwrap();
    assert!(b.contains("Step B failed"), "output was {}", b);
  }

  #[tokio::test]
  #[serial]
  async fn test_unchecked_steps_do_not_run() {
    setup_tracing();
    let dir = ScratchDir::new("scenario-b");
    let state = build_state(&dir);

    assert!(state
      .trigger("Build", vec![StepSelection::unchecked("A"), StepSelection::checked("B")])
      .started);
    wait_until_idle(&state).await;

    assert!(state.step_output("A").unwrap_err().is_not_found());
    assert!(state.step_output("B").is_ok());
    assert_eq!(
      state.step_states("Build").unwrap(),
      vec![
        StepStatus { step: "A".to_string(), state: StepState::Waiting },
        StepStatus { step: "B".to_string(), state: StepState::Failed },
      ]
    );
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  #[serial]
  async fn test_kill_through_registry_fails_the_running_step_and_finishes() {
    setup_tracing();
    let dir = ScratchDir::new("registry-kill");
    let state = Arc::new(ServerState::new(vec![pipeline(
      "Long",
      vec![
        script_step(&dir, "wait", "echo waiting\nsleep 30\n"),
        script_step(&dir, "after", "echo after\n"),
      ],
    )]));

    assert!(state
      .trigger("Long", vec![StepSelection::checked("wait"), StepSelection::checked("after")])
      .started);
    wait_for("step to start", std::time::Duration::from_secs(10), || {
      state.step_output("wait").map_or(false, |t| t.contains("waiting"))
    })
    .await;

    state.kill("Long").unwrap();
    wait_until_idle(&state).await;

    let states = state.step_states("Long").unwrap();
    assert_eq!(states[0].state, StepState::Failed);
    // The run keeps going after a killed step.
    assert_eq!(states[1].state, StepState::Success);
    assert!(state.step_output("after").unwrap().contains("after"));
  }
}
