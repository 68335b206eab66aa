//! Startup sequencer.
//!
//! Walks the fixed stage order once per tick. A stage either lets control
//! fall through to the next stage in the same tick, yields the tick, or
//! halts startup on a fault.

use super::Cluster;
use crate::events::EventKind;
use crate::roles::{ClusterPhase, LifecycleState, Role, RoleKey};
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy)]
enum Stage {
    Instance(RoleKey),
    /// Every enabled instance must be running before the stage passes.
    Barrier(Role),
    LaunchGate,
}

const STAGES: [Stage; 11] = [
    Stage::Instance(RoleKey::single(Role::Database)),
    Stage::Instance(RoleKey::single(Role::Auth)),
    Stage::Instance(RoleKey::single(Role::Logging)),
    Stage::Instance(RoleKey::single(Role::CoreEngine)),
    Stage::Barrier(Role::RelayGate),
    Stage::Instance(RoleKey::new(Role::SelectorGate, 0)),
    Stage::Instance(RoleKey::new(Role::SelectorGate, 1)),
    Stage::LaunchGate,
    Stage::Instance(RoleKey::new(Role::LoginGate, 0)),
    Stage::Instance(RoleKey::new(Role::LoginGate, 1)),
    Stage::Instance(RoleKey::single(Role::Plugin)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Yield,
    Halt,
}

pub(super) fn step(cluster: &mut Cluster, now: NaiveDateTime) {
    for stage in STAGES {
        let flow = match stage {
            Stage::Instance(key) => instance(cluster, key),
            Stage::Barrier(role) => barrier(cluster, role),
            Stage::LaunchGate => launch_gate(cluster, now),
        };
        match flow {
            Flow::Continue => {}
            Flow::Yield => return,
            Flow::Halt => {
                cluster.set_phase(ClusterPhase::Error);
                return;
            }
        }
    }
    cluster.set_phase(ClusterPhase::Running);
}

fn instance(cluster: &mut Cluster, key: RoleKey) -> Flow {
    let Some(idx) = cluster.index_of(key) else {
        return Flow::Continue;
    };
    if !cluster.processes[idx].enabled() {
        return Flow::Continue;
    }

    match advance(cluster, idx) {
        Some(true) => Flow::Continue,
        Some(false) => Flow::Yield,
        None => Flow::Halt,
    }
}

fn barrier(cluster: &mut Cluster, role: Role) -> Flow {
    let mut all_running = true;
    let mut faulted = false;
    for idx in cluster.indices_of(role) {
        if !cluster.processes[idx].enabled() {
            continue;
        }
        match advance(cluster, idx) {
            Some(true) => {}
            Some(false) => all_running = false,
            None => faulted = true,
        }
    }

    if faulted {
        Flow::Halt
    } else if all_running {
        Flow::Continue
    } else {
        Flow::Yield
    }
}

/// Move one enabled record towards `Running`.
///
/// Returns `Some(true)` when it is running, `Some(false)` while waiting and
/// `None` when it is faulted.
fn advance(cluster: &mut Cluster, idx: usize) -> Option<bool> {
    match cluster.processes[idx].state() {
        LifecycleState::Running => Some(true),
        LifecycleState::Stopped => cluster.launch(idx).ok().map(|()| false),
        LifecycleState::Launching | LifecycleState::AwaitingReady => {
            if cluster.processes[idx].take_early_exit() {
                let key = cluster.processes[idx].key();
                cluster.emit(
                    EventKind::ExitedBeforeReady,
                    Some(key),
                    format!("{key} exited before reporting ready"),
                );
            }
            Some(false)
        }
        // Startup only begins once every record is stopped.
        LifecycleState::Stopping => Some(false),
        LifecycleState::Faulted => None,
    }
}

fn launch_gate(cluster: &mut Cluster, now: NaiveDateTime) -> Flow {
    if cluster.launch_gate.is_open(cluster.tick, now) {
        return Flow::Continue;
    }
    if !cluster.gate_notice_sent {
        cluster.gate_notice_sent = true;
        let message = format!("login gates will start at {}", cluster.launch_gate);
        cluster.emit(EventKind::LaunchGateWaiting, None, message);
    }
    Flow::Yield
}
