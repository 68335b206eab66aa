//! Shutdown sequencer.
//!
//! Stops role groups in reverse dependency order, one group fully stopped
//! before the next begins, with a drain pause between the relay gates and
//! the core engine.

use super::{Cluster, DrainState};
use crate::events::EventKind;
use crate::roles::{ClusterPhase, LifecycleState, Role};

#[derive(Debug, Clone, Copy)]
enum Stage {
    Group(Role),
    Drain,
}

const ORDER: [Stage; 9] = [
    Stage::Group(Role::Plugin),
    Stage::Group(Role::LoginGate),
    Stage::Group(Role::SelectorGate),
    Stage::Group(Role::RelayGate),
    Stage::Drain,
    Stage::Group(Role::CoreEngine),
    Stage::Group(Role::Auth),
    Stage::Group(Role::Logging),
    Stage::Group(Role::Database),
];

pub(super) fn step(cluster: &mut Cluster) {
    for stage in ORDER {
        let done = match stage {
            Stage::Group(role) => group(cluster, role),
            Stage::Drain => drain(cluster),
        };
        if !done {
            return;
        }
    }
    cluster.set_phase(ClusterPhase::Stopped);
}

/// Advance every record of `role`. Returns whether all of them are stopped.
fn group(cluster: &mut Cluster, role: Role) -> bool {
    let mut done = true;
    for idx in cluster.indices_of(role) {
        done &= stop_one(cluster, idx);
    }
    done
}

fn stop_one(cluster: &mut Cluster, idx: usize) -> bool {
    let tick = cluster.tick;
    let timeout = cluster.settings.stop_timeout_ticks;
    let process = &mut cluster.processes[idx];
    let key = process.key();

    match process.state() {
        LifecycleState::Stopped => true,
        LifecycleState::Faulted => {
            process.mark_stopped();
            true
        }
        LifecycleState::Launching | LifecycleState::AwaitingReady | LifecycleState::Running => {
            if !process.is_alive() {
                process.mark_stopped();
                cluster.emit(EventKind::Stopped, Some(key), format!("{key} already exited"));
                return true;
            }
            match process.request_stop(tick) {
                Ok(()) => cluster.emit(EventKind::QuitSent, Some(key), format!("stopping {key}")),
                Err(e) => cluster.emit(
                    EventKind::QuitFailed,
                    Some(key),
                    format!("quit request to {key} failed: {e}"),
                ),
            }
            false
        }
        LifecycleState::Stopping => {
            if !process.is_alive() {
                process.mark_stopped();
                cluster.emit(EventKind::Stopped, Some(key), format!("{key} stopped"));
                true
            } else if process.grace_elapsed(tick, timeout) {
                process.force_kill();
                cluster.emit(
                    EventKind::ForcedStop,
                    Some(key),
                    format!("{key} did not exit in time and was killed"),
                );
                true
            } else {
                false
            }
        }
    }
}

fn drain(cluster: &mut Cluster) -> bool {
    match cluster.drain {
        DrainState::Done => true,
        DrainState::Pending => {
            let core_live = cluster
                .indices_of(Role::CoreEngine)
                .into_iter()
                .any(|idx| cluster.processes[idx].state().is_live());
            if !core_live || cluster.settings.drain_ticks == 0 {
                cluster.drain = DrainState::Done;
                return true;
            }
            let until = cluster.tick.saturating_add(cluster.settings.drain_ticks);
            cluster.drain = DrainState::Waiting { until };
            cluster.emit(
                EventKind::DrainStarted,
                None,
                format!("relay gates closed, core engine stops at tick {until}"),
            );
            false
        }
        DrainState::Waiting { until } => {
            if cluster.tick >= until {
                cluster.drain = DrainState::Done;
                true
            } else {
                false
            }
        }
    }
}
