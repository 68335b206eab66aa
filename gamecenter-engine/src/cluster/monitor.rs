//! Health monitor.
//!
//! Active while the cluster is running. A live record whose process has
//! died is relaunched immediately, or marked stopped when it does not
//! restart on exit. There is no retry limit.

use super::Cluster;
use crate::events::EventKind;
use crate::roles::LifecycleState;

pub(super) fn step(cluster: &mut Cluster) {
    for idx in 0..cluster.processes.len() {
        let process = &mut cluster.processes[idx];
        let state = process.state();
        if !process.enabled() || !state.is_live() || process.is_alive() {
            continue;
        }

        let key = process.key();
        if state == LifecycleState::Stopping {
            // Quit requested before a cancelled shutdown; not relaunched.
            process.mark_stopped();
            cluster.emit(EventKind::Stopped, Some(key), format!("{key} stopped"));
        } else if !process.restart_on_exit() {
            process.mark_stopped();
            cluster.emit(EventKind::Exited, Some(key), format!("{key} exited"));
        } else {
            cluster.relaunch(idx);
        }
    }
}
