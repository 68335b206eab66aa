//! Readiness protocol decoder.
//!
//! Every managed process prints `<role-code>:<token>` twice: once when it
//! begins starting and once, with the same token, when it is ready. The line
//! carries no instance index, so for gate roles the decoder matches it
//! against the instances of that role still awaiting readiness.

use crate::process::ManagedProcess;
use crate::roles::RoleKey;
use gamecenter_client::ReadinessLine;
use tracing::debug;

/// Outcome of decoding one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// First line of a launch; the token was recorded.
    Registered(RoleKey),
    /// Second line with the recorded token; the process is running.
    Confirmed(RoleKey),
    /// Malformed, unknown or stale; no state changed.
    Ignored,
}

/// Apply one raw output line to the roster.
///
/// Candidates are the enabled, not yet confirmed instances of the line's role
/// in index order. A candidate whose recorded token equals the line's token
/// is confirmed. Otherwise the first candidate without a token claims it,
/// unless the token belongs to that candidate's previous launch.
pub fn decode(processes: &mut [ManagedProcess], raw: &str) -> Readiness {
    let line = match ReadinessLine::parse(raw) {
        Ok(line) => line,
        Err(e) => {
            debug!(line = raw, "Discarding output line: {e}");
            return Readiness::Ignored;
        }
    };
    let Some(role) = line.role() else {
        debug!(code = line.code, "Discarding line with unknown role code");
        return Readiness::Ignored;
    };

    // Any instance's previous token marks an echo from a dead launch, even
    // when a sibling instance would be the one to claim it.
    let stale = processes
        .iter()
        .any(|p| p.key().role == role && p.previous_token() == Some(line.token.as_str()));

    let candidates = processes
        .iter_mut()
        .filter(|p| p.key().role == role && p.enabled() && p.state().is_pending());

    let mut unclaimed: Option<&mut ManagedProcess> = None;
    for process in candidates {
        if process.token() == Some(line.token.as_str()) {
            process.confirm();
            return Readiness::Confirmed(process.key());
        }
        if unclaimed.is_none() && process.token().is_none() {
            unclaimed = Some(process);
        }
    }

    match unclaimed {
        Some(_) if stale => {
            debug!(%role, "Discarding line from previous launch");
            Readiness::Ignored
        }
        Some(process) => {
            process.register(&line.token);
            Readiness::Registered(process.key())
        }
        None => {
            debug!(%role, "Discarding line with no matching instance");
            Readiness::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{LifecycleState, Role};
    use crate::testing::{test_spec, FakeLauncher};
    use tokio::sync::mpsc;

    fn launched(keys: &[RoleKey]) -> Vec<ManagedProcess> {
        let launcher = FakeLauncher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        keys.iter()
            .map(|key| {
                let mut p = ManagedProcess::new(test_spec(*key), true, true);
                let _ = p.start(&launcher, tx.clone());
                p
            })
            .collect()
    }

    #[test]
    fn test_register_then_confirm() {
        let key = RoleKey::single(Role::Database);
        let mut processes = launched(&[key]);

        assert_eq!(decode(&mut processes, "1:abc"), Readiness::Registered(key));
        assert_eq!(processes[0].state(), LifecycleState::AwaitingReady);

        assert_eq!(decode(&mut processes, "1:abc\r\n"), Readiness::Confirmed(key));
        assert_eq!(processes[0].state(), LifecycleState::Running);

        // A third copy changes nothing.
        assert_eq!(decode(&mut processes, "1:abc"), Readiness::Ignored);
        assert_eq!(processes[0].state(), LifecycleState::Running);
    }

    #[test]
    fn test_mismatched_token_is_ignored() {
        let key = RoleKey::single(Role::Auth);
        let mut processes = launched(&[key]);

        assert_eq!(decode(&mut processes, "2:first"), Readiness::Registered(key));
        assert_eq!(decode(&mut processes, "2:other"), Readiness::Ignored);
        assert_eq!(processes[0].state(), LifecycleState::AwaitingReady);
        assert_eq!(processes[0].token(), Some("first"));
    }

    #[test]
    fn test_malformed_and_unknown_lines_are_ignored() {
        let mut processes = launched(&[RoleKey::single(Role::Database)]);

        for line in ["", "hello", "x:abc", "1:", "99:abc", "-1:abc"] {
            assert_eq!(decode(&mut processes, line), Readiness::Ignored, "{line:?}");
        }
        assert_eq!(processes[0].token(), None);
    }

    #[test]
    fn test_line_for_role_not_launched_is_ignored() {
        let mut processes = launched(&[RoleKey::single(Role::Database)]);
        assert_eq!(decode(&mut processes, "4:abc"), Readiness::Ignored);
    }

    #[test]
    fn test_gate_instances_claim_slots_in_order() {
        let a = RoleKey::new(Role::RelayGate, 0);
        let b = RoleKey::new(Role::RelayGate, 1);
        let mut processes = launched(&[a, b]);

        assert_eq!(decode(&mut processes, "5:aaa"), Readiness::Registered(a));
        assert_eq!(decode(&mut processes, "5:bbb"), Readiness::Registered(b));

        // Confirmations may arrive in either order.
        assert_eq!(decode(&mut processes, "5:bbb"), Readiness::Confirmed(b));
        assert_eq!(decode(&mut processes, "5:aaa"), Readiness::Confirmed(a));
    }

    #[test]
    fn test_confirmation_is_not_mistaken_for_registration() {
        let a = RoleKey::new(Role::RelayGate, 0);
        let b = RoleKey::new(Role::RelayGate, 1);
        let mut processes = launched(&[a, b]);

        assert_eq!(decode(&mut processes, "5:aaa"), Readiness::Registered(a));
        // The second line from instance 0 must not claim instance 1.
        assert_eq!(decode(&mut processes, "5:aaa"), Readiness::Confirmed(a));
        assert_eq!(processes[1].token(), None);
    }

    #[test]
    fn test_running_instances_are_not_candidates() {
        let a = RoleKey::new(Role::SelectorGate, 0);
        let b = RoleKey::new(Role::SelectorGate, 1);
        let mut processes = launched(&[a, b]);

        decode(&mut processes, "6:aaa");
        decode(&mut processes, "6:aaa");
        assert_eq!(decode(&mut processes, "6:ccc"), Readiness::Registered(b));
    }

    #[test]
    fn test_previous_launch_token_is_rejected() {
        let key = RoleKey::new(Role::RelayGate, 0);
        let launcher = FakeLauncher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut processes = vec![ManagedProcess::new(test_spec(key), true, true)];

        let _ = processes[0].start(&launcher, tx.clone());
        decode(&mut processes, "5:old");
        decode(&mut processes, "5:old");
        let _ = processes[0].restart(&launcher, tx);
        assert_eq!(processes[0].token(), None);

        // Late echo from the dead incarnation.
        assert_eq!(decode(&mut processes, "5:old"), Readiness::Ignored);
        assert_eq!(processes[0].token(), None);

        assert_eq!(decode(&mut processes, "5:new"), Readiness::Registered(key));
        assert_eq!(decode(&mut processes, "5:new"), Readiness::Confirmed(key));
    }

    #[test]
    fn test_sibling_previous_token_is_rejected() {
        let a = RoleKey::new(Role::RelayGate, 0);
        let b = RoleKey::new(Role::RelayGate, 1);
        let launcher = FakeLauncher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut processes = launched(&[a, b]);

        for line in ["5:a1", "5:a1", "5:b1", "5:b1"] {
            decode(&mut processes, line);
        }
        assert_eq!(processes[1].state(), LifecycleState::Running);

        // Both instances die and come back together.
        for process in &mut processes {
            let _ = process.restart(&launcher, tx.clone());
        }

        // An echo from instance 1's dead launch must not land on instance 0.
        assert_eq!(decode(&mut processes, "5:b1"), Readiness::Ignored);
        assert_eq!(processes[0].token(), None);

        assert_eq!(decode(&mut processes, "5:a2"), Readiness::Registered(a));
        assert_eq!(decode(&mut processes, "5:b2"), Readiness::Registered(b));
        assert_eq!(decode(&mut processes, "5:b2"), Readiness::Confirmed(b));
        assert_eq!(decode(&mut processes, "5:a2"), Readiness::Confirmed(a));
    }

    #[test]
    fn test_disabled_instances_are_skipped() {
        let a = RoleKey::new(Role::LoginGate, 0);
        let b = RoleKey::new(Role::LoginGate, 1);
        let launcher = FakeLauncher::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut processes = vec![
            ManagedProcess::new(test_spec(a), false, true),
            ManagedProcess::new(test_spec(b), true, true),
        ];
        let _ = processes[1].start(&launcher, tx);

        assert_eq!(decode(&mut processes, "7:zzz"), Readiness::Registered(b));
    }
}
