//! Mode Controller
//!
//! Finite-state machine over Simulation → Validation → Production. A switch
//! is all-or-nothing: either the strategy pair, the audit log and the
//! cooldown clock all move, or none of them do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::safety::SwitchGuard;
use super::strategies::{ActuationWriter, IntendedAction, StrategyFactory, StrategyPair, StubTelemetry, TelemetryReader};
use super::SystemMode;
use crate::config::ControlSettings;
use crate::error::{ControlError, ControlErrorKind};
use crate::simulation::Simulator;

/// One committed transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub from_mode: SystemMode,
    pub to_mode: SystemMode,
    pub reason: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ModeSwitchRequest {
    pub target_mode: SystemMode,
    pub actor: String,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub reason: String,
}

impl std::fmt::Debug for ModeSwitchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeSwitchRequest")
            .field("target_mode", &self.target_mode)
            .field("actor", &self.actor)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("reason", &self.reason)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeSwitchResponse {
    Switched { new_mode: SystemMode },
    Rejected { error: ControlErrorKind, message: String },
}

/// Guarded by the switch lock.
struct Ledger {
    current: SystemMode,
    last_switch: Option<Instant>,
    audit: Vec<ModeRecord>,
}

pub struct ModeController {
    factory: StrategyFactory,
    guard: SwitchGuard,
    ledger: Mutex<Ledger>,
    active: RwLock<Arc<StrategyPair>>,
}

impl ModeController {
    /// Starts in Simulation with stub external telemetry.
    pub fn new(simulator: Arc<Simulator>, settings: &ControlSettings) -> Self {
        Self::with_external(simulator, Arc::new(StubTelemetry::default()), settings)
    }

    pub fn with_external(
        simulator: Arc<Simulator>,
        external: Arc<dyn TelemetryReader>,
        settings: &ControlSettings,
    ) -> Self {
        let guard = SwitchGuard::from_settings(settings);
        if !guard.credential.is_provisioned() {
            warn!("No production credential provisioned: production mode is unreachable");
        }
        let factory = StrategyFactory::new(simulator, external);
        let initial = Arc::new(factory.pair_for(SystemMode::Simulation));
        Self {
            factory,
            guard,
            ledger: Mutex::new(Ledger {
                current: SystemMode::Simulation,
                last_switch: None,
                audit: Vec::new(),
            }),
            active: RwLock::new(initial),
        }
    }

    /// The bound pair. Cloned out so no lock outlives this call.
    pub fn active(&self) -> Arc<StrategyPair> {
        self.active.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn mode(&self) -> SystemMode {
        self.active().mode
    }

    pub fn reader(&self) -> Arc<dyn TelemetryReader> {
        self.active().reader.clone()
    }

    pub fn writer(&self) -> Arc<dyn ActuationWriter> {
        self.active().writer.clone()
    }

    pub async fn audit_log(&self) -> Vec<ModeRecord> {
        self.ledger.lock().await.audit.clone()
    }

    /// Actions the validation writer would have sent.
    pub fn journal(&self) -> Vec<IntendedAction> {
        self.factory.shadow().journal()
    }

    pub async fn switch_mode(
        &self,
        target: SystemMode,
        actor: &str,
        credential: Option<&str>,
        reason: &str,
    ) -> Result<SystemMode, ControlError> {
        // 1. Serialize switch attempts
        let mut ledger = self.ledger.lock().await;
        let now = Instant::now();

        // 2. Cooldown
        if let Some(remaining) = self.guard.cooldown.remaining(ledger.last_switch, now) {
            warn!("Mode switch by `{}` to {} rate limited ({:?} left)", actor, target, remaining);
            return Err(ControlError::RateLimited { remaining });
        }

        // 3. Already there
        let from = ledger.current;
        if target == from {
            info!("Mode switch by `{}`: already in {}", actor, target);
            return Ok(from);
        }

        // 4. Production only via validation
        if from == SystemMode::Simulation && target == SystemMode::Production {
            warn!("Mode switch by `{}` rejected: {} -> {} skips validation", actor, from, target);
            return Err(ControlError::IllegalTransition { from, to: target });
        }

        // 5. Credential
        if target == SystemMode::Production && !self.guard.credential.verify(credential) {
            warn!("Mode switch by `{}` to production rejected: bad credential", actor);
            return Err(ControlError::PermissionDenied { actor: actor.to_string() });
        }

        // 6. Rebind
        let pair = Arc::new(self.factory.pair_for(target));
        *self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = pair;

        // 7. Audit and commit
        ledger.audit.push(ModeRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: actor.to_string(),
            from_mode: from,
            to_mode: target,
            reason: reason.to_string(),
        });
        ledger.current = target;
        ledger.last_switch = Some(now);

        warn!("⚠️ MODE SWITCH: {} -> {} by `{}` ({})", from, target, actor, reason);
        Ok(target)
    }

    /// Wire-level entry point.
    pub async fn handle(&self, req: ModeSwitchRequest) -> ModeSwitchResponse {
        match self
            .switch_mode(req.target_mode, &req.actor, req.credential.as_deref(), &req.reason)
            .await
        {
            Ok(new_mode) => ModeSwitchResponse::Switched { new_mode },
            Err(e) => ModeSwitchResponse::Rejected {
                error: e.kind(),
                message: e.to_string(),
            },
        }
    }
}
