//! Mode controller transitions
//!
//! Uses paused tokio time so cooldown windows are exact.

use std::sync::Arc;
use std::time::Duration;

use vanadium_twin::config::{ControlSettings, Settings};
use vanadium_twin::control::{ModeController, SystemMode};
use vanadium_twin::error::{ControlError, ControlErrorKind};
use vanadium_twin::simulation::Simulator;

const TOKEN: &str = "shift-lead-7731";

fn setup(cooldown_ms: u64) -> (Arc<Simulator>, ModeController) {
    let mut settings = Settings::default();
    settings.simulation.seed = Some(11);
    let control = ControlSettings { switch_cooldown_ms: cooldown_ms, production_token_sha256: None }
        .with_production_token(TOKEN);
    let sim = Arc::new(Simulator::new(&settings));
    let mc = ModeController::new(sim.clone(), &control);
    (sim, mc)
}

#[tokio::test(start_paused = true)]
async fn test_simulation_to_production_is_illegal_for_any_credential() {
    let (_sim, mc) = setup(1000);
    for credential in [None, Some("wrong"), Some(TOKEN)] {
        let err = mc.switch_mode(SystemMode::Production, "op", credential, "skip").await.unwrap_err();
        assert_eq!(
            err,
            ControlError::IllegalTransition { from: SystemMode::Simulation, to: SystemMode::Production }
        );
    }
    assert_eq!(mc.mode(), SystemMode::Simulation);
    assert!(mc.audit_log().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_rejects_then_allows() {
    let (_sim, mc) = setup(1000);
    mc.switch_mode(SystemMode::Validation, "op", None, "shadow").await.unwrap();

    tokio::time::advance(Duration::from_millis(400)).await;
    let err = mc.switch_mode(SystemMode::Simulation, "op", None, "back").await.unwrap_err();
    assert_eq!(err.kind(), ControlErrorKind::RateLimited);
    match err {
        ControlError::RateLimited { remaining } => assert_eq!(remaining, Duration::from_millis(600)),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(mc.mode(), SystemMode::Validation);
    assert_eq!(mc.audit_log().await.len(), 1);

    tokio::time::advance(Duration::from_millis(600)).await;
    assert_eq!(
        mc.switch_mode(SystemMode::Simulation, "op", None, "back").await.unwrap(),
        SystemMode::Simulation
    );
    assert_eq!(mc.audit_log().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_credential_leaves_everything_unchanged() {
    let (_sim, mc) = setup(1000);
    mc.switch_mode(SystemMode::Validation, "op", None, "shadow").await.unwrap();
    tokio::time::advance(Duration::from_secs(2)).await;

    let before = mc.audit_log().await;
    let err = mc.switch_mode(SystemMode::Production, "mallory", Some("guess"), "go").await.unwrap_err();
    assert_eq!(err, ControlError::PermissionDenied { actor: "mallory".into() });
    assert_eq!(mc.mode(), SystemMode::Validation);
    assert_eq!(mc.audit_log().await, before);

    // The rejection did not start a cooldown
    mc.switch_mode(SystemMode::Production, "lead", Some(TOKEN), "go").await.unwrap();
    let log = mc.audit_log().await;
    assert_eq!(log.last().unwrap().actor, "lead");
    assert_eq!(log.last().unwrap().to_mode, SystemMode::Production);
}

#[tokio::test(start_paused = true)]
async fn test_writers_follow_the_mode() {
    let (sim, mc) = setup(0);

    // Simulation: closed loop
    assert!(mc.writer().add_coolant("pig_iron", 1000.0).await.unwrap());
    assert_eq!(sim.state().coolant_added_kg, 1000.0);

    // Validation: journal only
    mc.switch_mode(SystemMode::Validation, "op", None, "shadow").await.unwrap();
    assert!(mc.writer().add_coolant("pig_iron", 500.0).await.unwrap());
    assert_eq!(sim.state().coolant_added_kg, 1000.0);
    assert_eq!(mc.journal().len(), 1);
    assert!(!mc.reader().get_temperature().await.is_valid);

    // Production: safety lock
    mc.switch_mode(SystemMode::Production, "lead", Some(TOKEN), "live").await.unwrap();
    let err = mc.writer().set_oxygen_flow(300.0).await.unwrap_err();
    assert_eq!(err.kind(), ControlErrorKind::ActuationNotImplemented);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_switches_commit_once() {
    let (_sim, mc) = setup(1000);
    let mc = Arc::new(mc);

    let mut handles = Vec::new();
    for i in 0..8 {
        let mc = mc.clone();
        handles.push(tokio::spawn(async move {
            mc.switch_mode(SystemMode::Validation, &format!("op{i}"), None, "race").await
        }));
    }
    let mut ok = 0;
    let mut limited = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(ControlError::RateLimited { .. }) => limited += 1,
            Err(e) => panic!("unexpected {e}"),
        }
    }
    assert_eq!(ok + limited, 8);
    assert_eq!(mc.audit_log().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_credential_provisioned_blocks_production() {
    let mut settings = Settings::default();
    settings.simulation.seed = Some(2);
    settings.control.switch_cooldown_ms = 0;
    let sim = Arc::new(Simulator::new(&settings));
    let mc = ModeController::new(sim, &settings.control);

    mc.switch_mode(SystemMode::Validation, "op", None, "shadow").await.unwrap();
    let err = mc.switch_mode(SystemMode::Production, "op", Some(""), "go").await.unwrap_err();
    assert_eq!(err.kind(), ControlErrorKind::PermissionDenied);
}
