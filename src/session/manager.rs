//! Session registry
//!
//! The registry map is only locked to look up, insert or remove a session
//! slot. Each slot has its own mutex, held for the whole pipeline run of a
//! request, so requests for one session are serialized while distinct
//! sessions run in parallel.
//!
//! The sweep only destroys a session after taking its lock and rechecking
//! expiry under it, so it never tears down state an in-flight run is using.
//! Sessions whose lock is held are busy and are skipped. Every request entry
//! point runs [`SessionManager::maybe_sweep`] first, so expired sessions are
//! reclaimed through ordinary traffic once the sweep interval has elapsed.

use super::pipeline::PipelineOutput;
use super::scratch::ScratchSpace;
use super::state::{ParamDelta, ProcessRequest, SessionState, VisualParams};
use crate::color::ArraySelector;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::mesh::{
    loader::default_loaders, primitives, ArrayDomain, ArrayInfo, Mesh, MeshKind, MeshLoader,
};
use crate::packaging::GeometryPayload;
use crate::performance::{PipelineMetrics, PipelineMonitor, PipelineStats};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of a session id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifecycle {
    /// Never seen, or swept and forgotten
    Uninitialized,
    Active,
    /// Swept; the slot is about to leave the registry
    Destroyed,
}

/// Read-only view of a session handed to callers
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: String,
    /// Whether this call created the session
    pub created: bool,
    pub mesh_kind: MeshKind,
    pub point_count: usize,
    pub cell_count: usize,
    pub point_arrays: Vec<ArrayInfo>,
    pub cell_arrays: Vec<ArrayInfo>,
    pub params: VisualParams,
}

struct SessionEntry {
    /// `None` once destroyed
    state: Option<SessionState>,
    scratch: Option<ScratchSpace>,
    last_access: Instant,
}

impl SessionEntry {
    fn new(state: SessionState) -> Self {
        Self {
            state: Some(state),
            scratch: None,
            last_access: Instant::now(),
        }
    }

    fn destroy(&mut self) {
        self.state = None;
        self.scratch = None;
    }
}

type Slot = Arc<Mutex<SessionEntry>>;

/// Owns every session and runs requests against them
pub struct SessionManager {
    config: PipelineConfig,
    loaders: Vec<Box<dyn MeshLoader>>,
    default_mesh: Mesh,
    sessions: RwLock<HashMap<String, Slot>>,
    last_sweep: Mutex<Instant>,
    monitor: Mutex<PipelineMonitor>,
}

impl SessionManager {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            config,
            loaders: default_loaders(),
            default_mesh: primitives::default_mesh()?,
            sessions: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
            monitor: Mutex::new(PipelineMonitor::new()),
        })
    }

    /// Registers an additional ingestion adapter
    pub fn with_loader(mut self, loader: Box<dyn MeshLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Parameters a freshly created session starts with
    pub fn default_params(&self) -> VisualParams {
        VisualParams {
            selector: Some(ArraySelector::point(primitives::ELEVATION)),
            slice_count: self.config.slicing.default_count,
            slice_spacing: self.config.slicing.default_spacing,
            lookup_table: self.config.color.lookup_table.clone(),
            ..Default::default()
        }
    }

    /// Looks up a session, creating a default one if the id is unknown
    pub fn get(&self, id: &str) -> Result<SessionInfo> {
        self.maybe_sweep();
        let mut created = false;
        self.with_session(id, &mut created, |state, _| {
            let mesh = state.mesh();
            Ok(SessionInfo {
                id: id.to_string(),
                created: false,
                mesh_kind: mesh.kind(),
                point_count: mesh.point_count(),
                cell_count: mesh.cell_count(),
                point_arrays: mesh.array_infos(ArrayDomain::Point),
                cell_arrays: mesh.array_infos(ArrayDomain::Cell),
                params: state.params().clone(),
            })
        })
        .map(|info| SessionInfo { created, ..info })
    }

    /// Applies a request and returns the new payload
    pub fn process(&self, id: &str, request: ProcessRequest) -> Result<GeometryPayload> {
        self.process_with_stats(id, request).map(|(payload, _)| payload)
    }

    /// Like [`process`](Self::process), also returning stage timings
    ///
    /// On any failure the session keeps its previous state.
    pub fn process_with_stats(
        &self,
        id: &str,
        request: ProcessRequest,
    ) -> Result<(GeometryPayload, PipelineStats)> {
        let mesh = match request.mesh {
            Some(source) => Some(source.into_mesh(&self.loaders).map_err(|e| {
                warn!("Session {}: mesh ingestion failed: {}", id, e);
                e
            })?),
            None => None,
        };
        let delta = ParamDelta {
            mesh,
            params: request.params,
        };

        self.run(id, |state| state.apply(delta, &self.config))
    }

    /// Recomputes the payload of the current state
    pub fn payload(&self, id: &str) -> Result<GeometryPayload> {
        self.run(id, |state| state.refresh(&self.config))
            .map(|(payload, _)| payload)
    }

    /// Handle to the session's scratch directory, created on first use
    ///
    /// The directory stays on disk while any handle is alive, even after
    /// the session itself has been swept.
    pub fn scratch_space(&self, id: &str) -> Result<ScratchSpace> {
        self.maybe_sweep();
        loop {
            let slot = self.live_slot(id, &mut false)?;
            let mut entry = slot.lock();
            if entry.state.is_none() {
                continue;
            }
            entry.last_access = Instant::now();
            if let Some(scratch) = &entry.scratch {
                return Ok(scratch.clone());
            }
            let scratch = ScratchSpace::create(&self.config.scratch_root(), id)?;
            entry.scratch = Some(scratch.clone());
            return Ok(scratch);
        }
    }

    pub fn lifecycle(&self, id: &str) -> SessionLifecycle {
        let slot = match self.sessions.read().get(id) {
            Some(slot) => Arc::clone(slot),
            None => return SessionLifecycle::Uninitialized,
        };
        let entry = slot.lock();
        match entry.state {
            Some(_) => SessionLifecycle::Active,
            None => SessionLifecycle::Destroyed,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Destroys every session idle for longer than the TTL as of `now`
    ///
    /// Sessions busy with a request are left alone. Returns the number of
    /// sessions destroyed.
    pub fn sweep(&self, now: Instant) -> usize {
        let ttl = self.config.ttl();
        let candidates: Vec<(String, Slot)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut destroyed = 0;
        for (id, slot) in candidates {
            let Some(mut entry) = slot.try_lock() else {
                continue;
            };
            // Recheck under the session lock: a request may have landed since
            if entry.state.is_none() || now.saturating_duration_since(entry.last_access) < ttl {
                continue;
            }
            entry.destroy();
            {
                let mut sessions = self.sessions.write();
                if let Some(current) = sessions.get(&id) {
                    if Arc::ptr_eq(current, &slot) {
                        sessions.remove(&id);
                    }
                }
            }
            destroyed += 1;
            info!("Session {} expired and was destroyed", id);
        }

        *self.last_sweep.lock() = now;
        if destroyed > 0 {
            info!(
                "Sweep destroyed {} sessions, {} remain",
                destroyed,
                self.session_count()
            );
        }
        destroyed
    }

    /// Sweeps if the sweep interval has elapsed since the last sweep
    pub fn maybe_sweep(&self) -> usize {
        let now = Instant::now();
        {
            let mut last = self.last_sweep.lock();
            if now.saturating_duration_since(*last) < self.config.sweep_interval() {
                return 0;
            }
            // Claim this round so concurrent callers do not sweep too
            *last = now;
        }
        self.sweep(now)
    }

    /// Aggregated timings of recent runs across all sessions
    pub fn metrics(&self) -> PipelineMetrics {
        self.monitor.lock().metrics()
    }

    fn run(
        &self,
        id: &str,
        transition: impl FnOnce(&SessionState) -> Result<(SessionState, PipelineOutput)>,
    ) -> Result<(GeometryPayload, PipelineStats)> {
        self.maybe_sweep();
        let mut created = false;
        let result = self.with_session(id, &mut created, |state, slot_state| {
            let (next, output) = transition(state)?;
            *slot_state = Some(next);
            Ok((output.payload, output.stats))
        });

        match &result {
            Ok((payload, stats)) => {
                self.monitor.lock().record(stats);
                debug!(
                    "Session {}: {} vertices, {} primitives (extract {:?}, colorize {:?}, slice {:?}, package {:?})",
                    id,
                    payload.vertex_count,
                    payload.primitive_count,
                    stats.extract,
                    stats.colorize,
                    stats.slice,
                    stats.package
                );
            }
            Err(e) => warn!("Session {}: request rejected ({}): {}", id, e.kind(), e),
        }
        result
    }

    /// Runs `f` on the live state of `id` while holding its lock
    ///
    /// `f` gets the current state and the slot to store a successor into;
    /// the slot is only written when `f` succeeds.
    fn with_session<T>(
        &self,
        id: &str,
        created: &mut bool,
        f: impl FnOnce(&SessionState, &mut Option<SessionState>) -> Result<T>,
    ) -> Result<T> {
        loop {
            let slot = self.live_slot(id, created)?;
            let mut entry = slot.lock();
            let Some(state) = entry.state.clone() else {
                // Swept between lookup and lock; the sweeper removes the
                // slot before unlocking, so the next lookup starts fresh
                continue;
            };
            entry.last_access = Instant::now();

            let mut next = None;
            let value = f(&state, &mut next)?;
            if let Some(next) = next {
                entry.state = Some(next);
            }
            return Ok(value);
        }
    }

    fn live_slot(&self, id: &str, created: &mut bool) -> Result<Slot> {
        if let Some(slot) = self.sessions.read().get(id) {
            return Ok(Arc::clone(slot));
        }

        let fresh = SessionEntry::new(SessionState::new(
            self.default_mesh.clone(),
            self.default_params(),
        ));
        let mut sessions = self.sessions.write();
        match sessions.entry(id.to_string()) {
            Entry::Occupied(slot) => Ok(Arc::clone(slot.get())),
            Entry::Vacant(vacant) => {
                info!("Created session {} with the default mesh", id);
                *created = true;
                Ok(Arc::clone(vacant.insert(Arc::new(Mutex::new(fresh)))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mesh::MeshSource;
    use std::time::Duration;

    fn manager() -> SessionManager {
        SessionManager::new(PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_get_creates_default_session_once() {
        let manager = manager();
        let first = manager.get("a").unwrap();
        assert!(first.created);
        assert_eq!(first.mesh_kind, MeshKind::SurfaceMesh);
        assert_eq!(first.point_arrays[0].name, primitives::ELEVATION);

        let second = manager.get("a").unwrap();
        assert!(!second.created);
        assert_eq!(manager.session_count(), 1);
        assert_eq!(manager.lifecycle("a"), SessionLifecycle::Active);
        assert_eq!(manager.lifecycle("b"), SessionLifecycle::Uninitialized);
    }

    #[test]
    fn test_failed_request_keeps_previous_state() {
        let manager = manager();
        let params = VisualParams {
            opacity: 0.25,
            ..manager.default_params()
        };
        manager.process("s", ProcessRequest::params(params)).unwrap();

        let bad = VisualParams {
            selector: Some(ArraySelector::cell("Nothing")),
            opacity: 0.9,
            ..manager.default_params()
        };
        let err = manager.process("s", ProcessRequest::params(bad)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyArray);
        assert_eq!(manager.get("s").unwrap().params.opacity, 0.25);
    }

    #[test]
    fn test_ingestion_failure_keeps_state() {
        let manager = manager();
        manager.get("s").unwrap();
        let request = ProcessRequest {
            mesh: Some(MeshSource::Path("/nonexistent/model.obj".into())),
            params: VisualParams::default(),
        };
        let err = manager.process("s", request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(manager.get("s").unwrap().mesh_kind, MeshKind::SurfaceMesh);
    }

    #[test]
    fn test_sweep_respects_ttl() {
        let manager = manager();
        manager.get("old").unwrap();
        assert_eq!(manager.sweep(Instant::now()), 0);

        let later = Instant::now() + manager.config().ttl() + Duration::from_secs(1);
        assert_eq!(manager.sweep(later), 1);
        assert_eq!(manager.session_count(), 0);
        assert_eq!(manager.lifecycle("old"), SessionLifecycle::Uninitialized);

        // The id comes back as a fresh default session
        assert!(manager.get("old").unwrap().created);
    }

    #[test]
    fn test_traffic_sweeps_expired_sessions() {
        let mut config = PipelineConfig::default();
        config.session.ttl_secs = 0;
        config.session.sweep_interval_secs = 0;
        let manager = SessionManager::new(config).unwrap();

        for i in 0..50 {
            manager.get(&format!("idle-{}", i)).unwrap();
        }
        std::thread::sleep(Duration::from_millis(5));
        for _ in 0..10 {
            manager.payload("busy").unwrap();
        }
        assert_eq!(manager.session_count(), 1);
        assert_eq!(manager.lifecycle("idle-0"), SessionLifecycle::Uninitialized);
        assert_eq!(manager.lifecycle("busy"), SessionLifecycle::Active);
    }

    #[test]
    fn test_traffic_keeps_live_sessions() {
        let mut config = PipelineConfig::default();
        config.session.sweep_interval_secs = 0;
        let manager = SessionManager::new(config).unwrap();

        for i in 0..20 {
            manager.get(&format!("live-{}", i)).unwrap();
        }
        manager.payload("live-0").unwrap();
        assert_eq!(manager.session_count(), 20);
    }

    #[test]
    fn test_sweep_skips_busy_session() {
        let manager = manager();
        manager.get("held").unwrap();
        let slot = manager.live_slot("held", &mut false).unwrap();
        let guard = slot.lock();

        let later = Instant::now() + manager.config().ttl() + Duration::from_secs(1);
        assert_eq!(manager.sweep(later), 0);
        drop(guard);
        assert_eq!(manager.sweep(later), 1);
    }

    #[test]
    fn test_regenerated_sphere_replaces_mesh() {
        let manager = manager();
        let params = manager.default_params();
        let default_points = manager.get("s").unwrap().point_count;

        let (_, stats) = manager
            .process_with_stats(
                "s",
                ProcessRequest::params(params.clone())
                    .with_mesh(MeshSource::DefaultSphere { resolution: 10 }),
            )
            .unwrap();
        assert!(!stats.surface_cached);
        let info = manager.get("s").unwrap();
        assert_eq!(info.point_count, 10 * 9 + 2);
        assert_ne!(info.point_count, default_points);
        assert_eq!(info.point_arrays[0].name, primitives::ELEVATION);

        let (_, stats) = manager
            .process_with_stats("s", ProcessRequest::params(params.clone()))
            .unwrap();
        assert!(stats.surface_cached);

        let (_, stats) = manager
            .process_with_stats(
                "s",
                ProcessRequest::params(params.clone())
                    .with_mesh(MeshSource::DefaultSphere { resolution: 50 }),
            )
            .unwrap();
        assert!(!stats.surface_cached);
        assert_eq!(manager.get("s").unwrap().point_count, 50 * 49 + 2);

        let err = manager
            .process(
                "s",
                ProcessRequest::params(params).with_mesh(MeshSource::DefaultSphere { resolution: 1 }),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
        assert_eq!(manager.get("s").unwrap().point_count, 50 * 49 + 2);
    }

    #[test]
    fn test_scratch_outlives_swept_session() {
        let mut config = PipelineConfig::default();
        config.session.scratch_root = Some(std::env::temp_dir().join(format!(
            "geoslice-manager-test-{}",
            rand::random::<u32>()
        )));
        let root = config.scratch_root();
        let manager = SessionManager::new(config).unwrap();

        let scratch = manager.scratch_space("s").unwrap();
        assert_eq!(manager.scratch_space("s").unwrap().path(), scratch.path());

        let later = Instant::now() + manager.config().ttl() + Duration::from_secs(1);
        manager.sweep(later);
        assert!(scratch.path().exists());

        let path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!path.exists());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn test_metrics_count_runs() {
        let manager = manager();
        manager.payload("m").unwrap();
        manager.payload("m").unwrap();
        assert_eq!(manager.metrics().runs, 2);
    }
}
