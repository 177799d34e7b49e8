//! Switch Guard
//!
//! Cooldown rate limit and production-credential check for mode switches.

use sha2::{Digest, Sha256};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ControlSettings;

/// At most one committed switch per cooldown window.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Time left before another switch may commit, if any.
    pub fn remaining(&self, last_switch: Option<Instant>, now: Instant) -> Option<Duration> {
        let last = last_switch?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < self.cooldown).then(|| self.cooldown - elapsed)
    }
}

/// Holds only the SHA-256 digest of the provisioned credential.
#[derive(Clone)]
pub struct CredentialCheck {
    digest: Option<Vec<u8>>,
}

impl CredentialCheck {
    pub fn from_hex(digest_hex: Option<&str>) -> Self {
        Self {
            digest: digest_hex.and_then(|h| hex::decode(h.trim()).ok()),
        }
    }

    pub fn is_provisioned(&self) -> bool {
        self.digest.is_some()
    }

    /// No credential provisioned means nobody gets in.
    pub fn verify(&self, credential: Option<&str>) -> bool {
        let (Some(expected), Some(given)) = (self.digest.as_deref(), credential) else {
            return false;
        };
        let mut hasher = Sha256::new();
        hasher.update(given.as_bytes());
        let actual = hasher.finalize();
        // Length is fixed by the hash; compare without early exit
        expected.len() == actual.len() && expected.iter().zip(actual.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }
}

impl std::fmt::Debug for CredentialCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCheck").field("provisioned", &self.is_provisioned()).finish()
    }
}

#[derive(Debug, Clone)]
pub struct SwitchGuard {
    pub cooldown: CooldownGate,
    pub credential: CredentialCheck,
}

impl SwitchGuard {
    pub fn from_settings(settings: &ControlSettings) -> Self {
        Self {
            cooldown: CooldownGate::new(settings.switch_cooldown()),
            credential: CredentialCheck::from_hex(settings.production_token_sha256.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::digest_token;

    #[test]
    fn test_cooldown_window() {
        let gate = CooldownGate::new(Duration::from_secs(1));
        let t0 = Instant::now();
        assert_eq!(gate.remaining(None, t0), None);
        assert_eq!(gate.remaining(Some(t0), t0 + Duration::from_millis(400)), Some(Duration::from_millis(600)));
        assert_eq!(gate.remaining(Some(t0), t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_credential_check() {
        let digest = digest_token("s3cret");
        let check = CredentialCheck::from_hex(Some(&digest));
        assert!(check.verify(Some("s3cret")));
        assert!(!check.verify(Some("guess")));
        assert!(!check.verify(None));
        assert!(!format!("{:?}", check).contains(&digest));
    }

    #[test]
    fn test_unprovisioned_denies_everything() {
        let check = CredentialCheck::from_hex(None);
        assert!(!check.is_provisioned());
        assert!(!check.verify(Some("")));
    }
}
