//! In-memory fakes shared by the unit tests.

use crate::cluster::Cluster;
use crate::config::{ClusterConfig, GateGroupConfig, GateInstanceConfig, RoleConfig, WindowPosition};
use crate::error::{LaunchError, RegenError};
use crate::events::{ClusterEvent, EventKind};
use crate::launcher::{LaunchSpec, Launcher, OutputSender, ProcessHandle};
use crate::regen::ConfigRegenerator;
use crate::roles::{ClusterPhase, LifecycleState, RoleKey};
use crate::sink::EventSink;
use chrono::{NaiveDate, NaiveDateTime};
use gamecenter_client::ReadinessLine;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub fn test_spec(key: RoleKey) -> LaunchSpec {
    LaunchSpec {
        key,
        directory: PathBuf::from("/srv/test"),
        program: key.role.as_str().to_string(),
        args: Vec::new(),
        env: HashMap::new(),
        window: WindowPosition::default(),
    }
}

#[derive(Debug, Default)]
struct FakeProc {
    alive: bool,
    quits: u32,
    killed: bool,
}

#[derive(Debug, Default)]
struct LauncherState {
    launches: HashMap<RoleKey, u32>,
    latest: HashMap<RoleKey, Arc<Mutex<FakeProc>>>,
    failing: HashSet<RoleKey>,
    ignoring_quit: HashSet<RoleKey>,
    next_pid: u32,
}

/// Launcher whose processes are flags in memory.
#[derive(Debug, Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<LauncherState>>,
    auto_ready: bool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every launched process immediately prints both readiness lines.
    pub fn auto_ready() -> Self {
        Self {
            auto_ready: true,
            ..Self::default()
        }
    }

    /// Make launches of `key` fail.
    pub fn fail(&self, key: RoleKey) {
        self.state.lock().unwrap().failing.insert(key);
    }

    /// Let launches of `key` succeed again.
    pub fn heal(&self, key: RoleKey) {
        self.state.lock().unwrap().failing.remove(&key);
    }

    /// Processes of `key` ignore graceful quit requests.
    pub fn ignore_quit(&self, key: RoleKey) {
        self.state.lock().unwrap().ignoring_quit.insert(key);
    }

    /// Simulate the latest process of `key` dying.
    pub fn crash(&self, key: RoleKey) {
        if let Some(proc) = self.state.lock().unwrap().latest.get(&key) {
            proc.lock().unwrap().alive = false;
        }
    }

    pub fn launch_count(&self, key: RoleKey) -> u32 {
        self.state
            .lock()
            .unwrap()
            .launches
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    pub fn quit_count(&self, key: RoleKey) -> u32 {
        self.state
            .lock()
            .unwrap()
            .latest
            .get(&key)
            .map_or(0, |p| p.lock().unwrap().quits)
    }

    pub fn was_killed(&self, key: RoleKey) -> bool {
        self.state
            .lock()
            .unwrap()
            .latest
            .get(&key)
            .is_some_and(|p| p.lock().unwrap().killed)
    }

    pub fn is_alive(&self, key: RoleKey) -> bool {
        self.state
            .lock()
            .unwrap()
            .latest
            .get(&key)
            .is_some_and(|p| p.lock().unwrap().alive)
    }
}

impl Launcher for FakeLauncher {
    fn launch(
        &self,
        spec: &LaunchSpec,
        output: OutputSender,
    ) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(&spec.key) {
            return Err(LaunchError::MissingDirectory {
                key: spec.key,
                path: spec.directory.clone(),
            });
        }

        *state.launches.entry(spec.key).or_insert(0) += 1;
        state.next_pid += 1;
        let proc = Arc::new(Mutex::new(FakeProc {
            alive: true,
            ..FakeProc::default()
        }));
        state.latest.insert(spec.key, Arc::clone(&proc));

        if self.auto_ready {
            let token = format!("{}-{}", spec.key.index, state.next_pid);
            let line = ReadinessLine {
                code: spec.key.role.code(),
                token,
            };
            let _ = output.send(line.to_string());
            let _ = output.send(line.to_string());
        }

        Ok(Box::new(FakeHandle {
            pid: 1000 + state.next_pid,
            proc,
            ignore_quit: state.ignoring_quit.contains(&spec.key),
        }))
    }
}

struct FakeHandle {
    pid: u32,
    proc: Arc<Mutex<FakeProc>>,
    ignore_quit: bool,
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_alive(&mut self) -> bool {
        self.proc.lock().unwrap().alive
    }

    fn request_quit(&mut self) -> std::io::Result<()> {
        let mut proc = self.proc.lock().unwrap();
        proc.quits += 1;
        if !self.ignore_quit {
            proc.alive = false;
        }
        Ok(())
    }

    fn kill(&mut self) -> std::io::Result<()> {
        let mut proc = self.proc.lock().unwrap();
        proc.killed = true;
        proc.alive = false;
        Ok(())
    }
}

/// Sink that keeps every event.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<ClusterEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClusterEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &ClusterEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Regenerator that records which keys it was asked to regenerate.
#[derive(Debug, Clone, Default)]
pub struct RecordingRegenerator {
    calls: Arc<Mutex<Vec<RoleKey>>>,
    failing: bool,
}

impl RecordingRegenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RoleKey> {
        self.calls.lock().unwrap().clone()
    }
}

impl ConfigRegenerator for RecordingRegenerator {
    fn regenerate(&self, key: RoleKey) -> Result<(), RegenError> {
        self.calls.lock().unwrap().push(key);
        if self.failing {
            return Err(RegenError::MissingSetting {
                key,
                setting: "gate_port",
            });
        }
        Ok(())
    }
}

/// 2026-01-01 12:00 local.
pub fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

fn role(program: &str) -> RoleConfig {
    RoleConfig {
        enabled: true,
        directory: PathBuf::from(program),
        program: program.to_string(),
        ..Default::default()
    }
}

fn gates(program: &str, count: usize, first_port: u16) -> GateGroupConfig {
    GateGroupConfig {
        directory: PathBuf::from(program),
        program: program.to_string(),
        instances: (0..count)
            .map(|i| GateInstanceConfig {
                enabled: true,
                gate_port: first_port + u16::try_from(i).unwrap(),
            })
            .collect(),
        ..Default::default()
    }
}

/// Database, auth and core engine plus `relays` relay gates.
///
/// The logging server and plugin are present but disabled; there are no
/// selector or login gates.
pub fn test_config(relays: usize) -> ClusterConfig {
    let mut config = ClusterConfig::default();
    config.engine.game_directory = PathBuf::from("/srv/test");
    config.database = role("DBServer");
    config.auth = role("LoginSrv");
    config.logging = RoleConfig {
        enabled: false,
        ..role("LogServer")
    };
    config.core_engine = role("M2Server");
    config.relay_gate = gates("RunGate", relays, 7200);
    config.plugin = RoleConfig {
        enabled: false,
        ..role("Plugin")
    };
    config
}

/// Every role enabled: three relay gates, two selector and two login gates.
pub fn full_config() -> ClusterConfig {
    let mut config = test_config(3);
    config.logging.enabled = true;
    config.plugin.enabled = true;
    config.selector_gate = gates("SelGate", 2, 7100);
    config.login_gate = gates("LoginGate", 2, 7000);
    config
}

/// A cluster wired to fakes, driven tick by tick.
pub struct Harness {
    pub cluster: Cluster,
    pub launcher: FakeLauncher,
    pub sink: RecordingSink,
    _output: mpsc::UnboundedReceiver<String>,
}

impl Harness {
    pub fn new(config: ClusterConfig) -> Self {
        Self::with_regenerator(config, RecordingRegenerator::new())
    }

    pub fn with_regenerator(config: ClusterConfig, regen: RecordingRegenerator) -> Self {
        let launcher = FakeLauncher::new();
        let sink = RecordingSink::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let cluster = Cluster::new(
            config,
            Arc::new(launcher.clone()),
            Box::new(regen),
            Box::new(sink.clone()),
            tx,
        )
        .unwrap();
        Self {
            cluster,
            launcher,
            sink,
            _output: rx,
        }
    }

    pub fn tick(&mut self) {
        self.cluster.tick(noon());
    }

    pub fn tick_at(&mut self, now: NaiveDateTime) {
        self.cluster.tick(now);
    }

    pub fn state(&self, key: RoleKey) -> LifecycleState {
        self.cluster.process(key).map(|p| p.state()).unwrap()
    }

    pub fn token(&self, key: RoleKey) -> Option<String> {
        self.cluster
            .process(key)
            .and_then(|p| p.token().map(str::to_string))
    }

    /// Feed both readiness lines of the current launch of `key`.
    pub fn ready(&mut self, key: RoleKey) {
        let line = ReadinessLine {
            code: key.role.code(),
            token: format!(
                "{}-{}-{}",
                key.role.as_str(),
                key.index,
                self.launcher.launch_count(key)
            ),
        }
        .to_string();
        self.cluster.handle_line(&line);
        self.cluster.handle_line(&line);
    }

    pub fn ready_after_tick(&mut self, key: RoleKey) {
        self.tick();
        self.ready(key);
    }

    fn ready_pending(&mut self) {
        let pending: Vec<RoleKey> = self
            .cluster
            .processes()
            .iter()
            .filter(|p| p.enabled() && p.state().is_pending())
            .map(|p| p.key())
            .collect();
        for key in pending {
            self.ready(key);
        }
    }

    /// Start the cluster if needed and confirm every launch until it runs.
    pub fn run_to_running(&mut self) {
        if self.cluster.phase().can_start() {
            self.cluster.start(noon()).unwrap();
        }
        for _ in 0..100 {
            self.tick();
            if self.cluster.phase() == ClusterPhase::Running {
                return;
            }
            self.ready_pending();
        }
        panic!("cluster did not reach Running: {:?}", self.cluster);
    }

    /// Confirm every launch until every enabled record before `key` runs,
    /// then tick once more so the stage in front of `key` is evaluated.
    pub fn ready_everything_before(&mut self, key: RoleKey) {
        for _ in 0..100 {
            self.tick();
            self.ready_pending();
            let done = self
                .cluster
                .processes()
                .iter()
                .take_while(|p| p.key() != key)
                .filter(|p| p.enabled())
                .all(|p| p.state() == LifecycleState::Running);
            if done {
                self.tick();
                return;
            }
        }
        panic!("records before {key} did not all start");
    }
}
