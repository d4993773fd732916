//! The run controller.
//!
//! [`RunController`] owns the current [`Snapshot`] and is the only path by
//! which the control surface talks to the engine. It enforces three rules:
//!
//! - Snapshots are replaced wholesale, never patched.
//! - Mutating engine calls for one simulation never overlap. A second
//!   command while one is in flight fails with [`ControlError::Busy`]; it is
//!   never queued. The busy mark is released by a drop guard, so every exit
//!   path clears it.
//! - Switching simulations (create, load, local reset) bumps an epoch.
//!   Responses that come back for an older epoch are discarded instead of
//!   overwriting the newer simulation.
//!
//! # Errors
//!
//! Failures are recorded as the current error and stay there until
//! [`dismiss_error`](RunController::dismiss_error). Local guards (`Busy`,
//! `NoActiveSimulation`) are returned but not recorded. Dialog-driven
//! operations ([`save_snapshot`](RunController::save_snapshot),
//! [`list_simulations`](RunController::list_simulations)) return their
//! errors without recording them, so the dialog can show them instead.
//!
//! # Locking
//!
//! State lives behind [`std::sync::Mutex`]es that are never held across an
//! `.await`.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use petri_types::{
    DisplayStatistics, Organism, RunState, SaveReceipt, SimulationId, Snapshot, SnapshotSummary,
    SpeedMultiplier,
};
use serde::Serialize;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::config::ControlsConfig;
use crate::engine::{EngineError, SimulationEngine};
use crate::error::{ControlError, SurfacedError};
use crate::planner::{StepMode, plan_steps};
use crate::prefs::{PreferenceBackend, PreferenceStore};
use crate::reconcile::reconcile;
use crate::request::RunRequest;
use crate::stats::derive_statistics;
use crate::ticker::ElapsedTicker;

/// Highest target generation accepted for run-to-target mode.
pub const MAX_TARGET_GENERATION: u64 = 100_000;

/// Lifecycle phase of the controller.
///
/// Errors are not a phase: they are recorded alongside and never block a
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunPhase {
    /// No simulation loaded.
    #[default]
    Idle,
    /// A create call is in flight.
    Creating,
    /// A different simulation is being fetched; the old one is gone.
    Switching,
    /// A simulation is loaded and stopped.
    Ready,
    /// A simulation is loaded and the engine is advancing it.
    Running,
    /// A remote reset is in flight.
    Resetting,
}

/// Outcome of one step command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Rate or run-to-target.
    pub mode: StepMode,
    /// Engine step calls issued.
    pub requested: u64,
    /// Generation of the canonical snapshot read after the batch.
    pub generation: u64,
}

/// Everything the dashboard needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderView {
    /// Lifecycle phase.
    pub phase: RunPhase,
    /// Identity of the loaded simulation.
    pub simulation_id: Option<SimulationId>,
    /// Name of the loaded simulation.
    pub run_name: Option<String>,
    /// Current generation, when a simulation is loaded.
    pub generation: Option<u64>,
    /// Deduplicated organisms, in engine order.
    pub organisms: Vec<Organism>,
    /// Population statistics for the loaded simulation.
    pub statistics: DisplayStatistics,
    /// The error awaiting dismissal.
    pub error: Option<SurfacedError>,
    /// Whether a command is in flight.
    pub busy: bool,
    /// False while showing the offline snapshot cache.
    pub live: bool,
    /// Speed multiplier used for step batches.
    pub speed: SpeedMultiplier,
    /// Autosave preference.
    pub autosave: bool,
    /// Target generation for run-to-target mode.
    pub target_generation: Option<u64>,
    /// Seconds the current run has been going.
    pub elapsed_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum BusyKey {
    Create,
    Run(SimulationId),
}

/// Clears its busy mark on drop.
struct BusyGuard<'a> {
    in_flight: &'a Mutex<BTreeSet<BusyKey>>,
    key: BusyKey,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock(self.in_flight).remove(&self.key);
    }
}

#[derive(Debug)]
struct ControllerState {
    phase: RunPhase,
    snapshot: Option<Snapshot>,
    organisms: Vec<Organism>,
    live: bool,
    speed: SpeedMultiplier,
    autosave: bool,
    target_generation: Option<u64>,
    error: Option<SurfacedError>,
    epoch: u64,
}

impl ControllerState {
    /// Drop the loaded simulation and start a new epoch.
    fn begin_switch(&mut self, phase: RunPhase) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.phase = phase;
        self.snapshot = None;
        self.organisms.clear();
        self.live = true;
        self.epoch
    }

    /// Phase implied by the loaded snapshot.
    const fn settle(&mut self) {
        self.phase = match &self.snapshot {
            None => RunPhase::Idle,
            Some(snapshot) if snapshot.is_running() => RunPhase::Running,
            Some(_) => RunPhase::Ready,
        };
    }

    fn active(&self) -> Result<(SimulationId, u64), ControlError> {
        self.snapshot
            .as_ref()
            .map(|snapshot| (snapshot.id.clone(), self.epoch))
            .ok_or(ControlError::NoActiveSimulation)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Client-side run controller for one dashboard.
pub struct RunController<E, B> {
    engine: E,
    prefs: PreferenceStore<B>,
    default_speed: SpeedMultiplier,
    state: Mutex<ControllerState>,
    in_flight: Mutex<BTreeSet<BusyKey>>,
    ticker: Mutex<ElapsedTicker>,
}

impl<E, B> core::fmt::Debug for RunController<E, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("RunController")
            .field("phase", &state.phase)
            .field("epoch", &state.epoch)
            .finish_non_exhaustive()
    }
}

impl<E: SimulationEngine, B: PreferenceBackend> RunController<E, B> {
    /// Build a controller with nothing loaded. Preferences are read once
    /// here; call [`restore`](Self::restore) to reload the last simulation.
    pub fn new(engine: E, prefs: PreferenceStore<B>, controls: &ControlsConfig) -> Self {
        let default_speed =
            SpeedMultiplier::new(i64::from(controls.default_speed)).unwrap_or_default();
        let loaded = prefs.load(default_speed);
        debug!(
            speed = loaded.speed.get(),
            autosave = loaded.autosave,
            target_generation = ?loaded.target_generation,
            "preferences loaded"
        );
        Self {
            engine,
            prefs,
            default_speed,
            state: Mutex::new(ControllerState {
                phase: RunPhase::Idle,
                snapshot: None,
                organisms: Vec::new(),
                live: true,
                speed: loaded.speed,
                autosave: loaded.autosave,
                target_generation: loaded.target_generation,
                error: None,
                epoch: 0,
            }),
            in_flight: Mutex::new(BTreeSet::new()),
            ticker: Mutex::new(ElapsedTicker::new(Duration::from_millis(
                controls.tick_interval_ms,
            ))),
        }
    }

    /// The engine this controller drives.
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// The preference store.
    pub const fn prefs(&self) -> &PreferenceStore<B> {
        &self.prefs
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        lock(&self.state)
    }

    fn claim(&self, key: BusyKey) -> Result<BusyGuard<'_>, ControlError> {
        let mut in_flight = lock(&self.in_flight);
        if !in_flight.insert(key.clone()) {
            return Err(ControlError::Busy);
        }
        Ok(BusyGuard {
            in_flight: &self.in_flight,
            key,
        })
    }

    /// Record `err` as the current error (unless it is a local guard) and
    /// hand it back for propagation.
    fn fail(&self, err: ControlError) -> ControlError {
        if err.is_local_guard() {
            debug!(kind = ?err.kind(), "command rejected: {err}");
        } else {
            warn!(kind = ?err.kind(), error = %err, "command failed");
            self.state().error = Some(SurfacedError::from(&err));
        }
        err
    }

    /// Log `err` without recording it; the caller shows it.
    fn reraise(err: ControlError) -> ControlError {
        warn!(kind = ?err.kind(), error = %err, "dialog command failed");
        err
    }

    /// Replace the loaded snapshot unless a newer switch superseded `epoch`,
    /// and write it to the snapshot cache.
    fn apply(&self, epoch: u64, snapshot: Snapshot) -> bool {
        self.install(epoch, snapshot, true)
    }

    /// Show an intermediate step response. Not cached: the read that ends
    /// the batch is the one worth keeping.
    fn apply_progress(&self, epoch: u64, snapshot: Snapshot) -> bool {
        self.install(epoch, snapshot, false)
    }

    fn install(&self, epoch: u64, snapshot: Snapshot, cache: bool) -> bool {
        let reconciled = reconcile(&snapshot.organisms);
        let running = snapshot.is_running();
        let to_cache = cache.then(|| snapshot.clone());
        {
            let mut state = self.state();
            if state.epoch != epoch {
                debug!(
                    simulation_id = %snapshot.id,
                    stale_epoch = epoch,
                    epoch = state.epoch,
                    "discarding superseded snapshot"
                );
                return false;
            }
            debug!(
                simulation_id = %snapshot.id,
                generation = snapshot.generation,
                organisms = reconciled.organisms.len(),
                "snapshot applied"
            );
            state.organisms = reconciled.organisms;
            state.live = true;
            state.snapshot = Some(snapshot);
            state.settle();
        }
        let cached = to_cache
            .as_ref()
            .map_or(Ok(()), |snapshot| self.prefs.cache_snapshot(snapshot));
        if let Err(err) = cached {
            warn!(error = %err, "failed to cache snapshot");
        }
        self.sync_ticker(running);
        true
    }

    fn sync_ticker(&self, running: bool) {
        let mut ticker = lock(&self.ticker);
        if running && !ticker.is_running() {
            ticker.start();
        } else if !running {
            ticker.stop();
        }
    }

    // -----------------------------------------------------------------------
    // Run lifecycle
    // -----------------------------------------------------------------------

    /// Create a new simulation and make it the loaded one.
    ///
    /// The previous simulation's organisms and snapshot cache are cleared
    /// before the engine is called, so the new identity never renders mixed
    /// with the old one.
    pub async fn create_run(&self, request: &RunRequest) -> Result<SimulationId, ControlError> {
        request
            .validate()
            .map_err(|err| self.fail(ControlError::Validation(err.to_string())))?;
        let _guard = self.claim(BusyKey::Create).map_err(|err| self.fail(err))?;
        if let Some(target) = request.effective_target() {
            self.set_target_generation(target)?;
        }

        let epoch = self.state().begin_switch(RunPhase::Creating);
        lock(&self.ticker).clear();
        if let Err(err) = self.prefs.clear_cached_snapshot() {
            warn!(error = %err, "failed to clear snapshot cache");
        }

        info!(name = %request.name, "creating simulation");
        let created = self
            .engine
            .create_simulation(&request.name, &request.engine_parameters())
            .await;
        match created {
            Ok(snapshot) => {
                let id = snapshot.id.clone();
                if self.apply(epoch, snapshot) {
                    self.prefs
                        .set_last_identity(&id)
                        .map_err(|err| self.fail(err.into()))?;
                    info!(simulation_id = %id, "simulation created");
                }
                Ok(id)
            }
            Err(err) => {
                {
                    let mut state = self.state();
                    if state.epoch == epoch {
                        state.settle();
                    }
                }
                Err(self.fail(err.into()))
            }
        }
    }

    /// Start a stopped simulation or stop a running one.
    ///
    /// Returns the run state the engine reports afterwards.
    pub async fn toggle_run(&self) -> Result<RunState, ControlError> {
        let active = {
            let state = self.state();
            let running = state.snapshot.as_ref().is_some_and(Snapshot::is_running);
            state.active().map(|(id, epoch)| (id, epoch, running))
        };
        let (id, epoch, running) = active.map_err(|err| self.fail(err))?;
        let _guard = self
            .claim(BusyKey::Run(id.clone()))
            .map_err(|err| self.fail(err))?;

        let result = if running {
            info!(simulation_id = %id, "stopping simulation");
            self.engine.stop_simulation(&id).await
        } else {
            info!(simulation_id = %id, "starting simulation");
            self.engine.start_simulation(&id).await
        };
        let snapshot = result.map_err(|err| self.fail(err.into()))?;
        let run_state = snapshot.run_state;
        self.apply(epoch, snapshot);
        Ok(run_state)
    }

    /// Advance a stopped simulation by one batch.
    ///
    /// The batch size comes from the speed multiplier (see
    /// [`plan_steps`]). Step calls are issued one after another, each
    /// awaited before the next. The canonical snapshot is then re-read and
    /// applied as the final value.
    pub async fn step(&self) -> Result<StepReport, ControlError> {
        let active = {
            let state = self.state();
            let (running, current) = state
                .snapshot
                .as_ref()
                .map_or((false, 0), |s| (s.is_running(), s.generation));
            let (speed, target) = (state.speed, state.target_generation);
            state
                .active()
                .map(|(id, epoch)| (id, epoch, running, speed, target, current))
        };
        let (id, epoch, running, speed, target, current) =
            active.map_err(|err| self.fail(err))?;
        if running {
            return Err(self.fail(ControlError::InvalidState(
                "cannot step while the simulation is running".to_owned(),
            )));
        }
        let _guard = self
            .claim(BusyKey::Run(id.clone()))
            .map_err(|err| self.fail(err))?;

        let plan = plan_steps(speed, target, Some(current));
        debug!(simulation_id = %id, mode = ?plan.mode, steps = plan.steps, "stepping");
        for _ in 0..plan.steps {
            let snapshot = self
                .engine
                .step_simulation(&id)
                .await
                .map_err(|err| self.fail(err.into()))?;
            if !self.apply_progress(epoch, snapshot) {
                break;
            }
        }

        let canonical = self
            .engine
            .get_simulation(&id)
            .await
            .map_err(|err| self.fail(err.into()))?;
        let generation = canonical.generation;
        self.apply(epoch, canonical);
        info!(simulation_id = %id, steps = plan.steps, generation, "step batch complete");
        Ok(StepReport {
            mode: plan.mode,
            requested: plan.steps,
            generation,
        })
    }

    /// Unload the current simulation locally.
    ///
    /// The snapshot and organisms are cleared immediately; the engine is
    /// not told. In-flight responses for the old simulation are discarded.
    /// The remembered identity is kept, so a restart restores it.
    pub fn reset(&self) -> Result<(), ControlError> {
        {
            let mut state = self.state();
            if state.snapshot.is_none() {
                drop(state);
                return Err(self.fail(ControlError::NoActiveSimulation));
            }
            state.begin_switch(RunPhase::Idle);
        }
        lock(&self.ticker).clear();
        info!("simulation unloaded");
        Ok(())
    }

    /// Reset the loaded simulation on the engine back to generation zero.
    pub async fn reset_remote(&self) -> Result<(), ControlError> {
        let active = self.state().active();
        let (id, epoch) = active.map_err(|err| self.fail(err))?;
        let _guard = self
            .claim(BusyKey::Run(id.clone()))
            .map_err(|err| self.fail(err))?;

        self.state().phase = RunPhase::Resetting;
        info!(simulation_id = %id, "resetting simulation");
        match self.engine.reset_simulation(&id).await {
            Ok(snapshot) => {
                if self.apply(epoch, snapshot) {
                    lock(&self.ticker).clear();
                }
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.state();
                    if state.epoch == epoch {
                        state.settle();
                    }
                }
                Err(self.fail(err.into()))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Switching
    // -----------------------------------------------------------------------

    async fn switch_to(&self, id: &SimulationId) -> Result<bool, (u64, ControlError)> {
        let epoch = self.state().begin_switch(RunPhase::Switching);
        lock(&self.ticker).clear();
        info!(simulation_id = %id, "switching simulation");

        match self.engine.get_simulation(id).await {
            Ok(snapshot) => {
                if !self.apply(epoch, snapshot) {
                    return Ok(false);
                }
                self.prefs
                    .set_last_identity(id)
                    .map_err(|err| (epoch, err.into()))?;
                Ok(true)
            }
            Err(err) => {
                let mut state = self.state();
                if state.epoch == epoch {
                    state.settle();
                }
                Err((epoch, err.into()))
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state().epoch == epoch
    }

    /// Load an existing simulation.
    ///
    /// Returns `false` when a newer switch finished first and this result
    /// was discarded.
    pub async fn load(&self, id: &SimulationId) -> Result<bool, ControlError> {
        match self.switch_to(id).await {
            Ok(applied) => Ok(applied),
            Err((epoch, err)) if self.is_current(epoch) => Err(self.fail(err)),
            Err((_, err)) => {
                debug!(simulation_id = %id, error = %err, "superseded load failed");
                Err(err)
            }
        }
    }

    /// Reload the simulation remembered from the last session.
    ///
    /// An identity the engine no longer knows is forgotten. If the engine
    /// is unreachable, the cached snapshot is shown instead, marked as not
    /// live, and the network error is recorded.
    pub async fn restore(&self) -> Result<Option<SimulationId>, ControlError> {
        let Some(id) = self.prefs.last_identity() else {
            debug!("no simulation to restore");
            return Ok(None);
        };

        match self.switch_to(&id).await {
            Ok(_) => Ok(Some(id)),
            Err((_, ControlError::Engine(EngineError::NotFound(_)))) => {
                info!(simulation_id = %id, "remembered simulation is gone, forgetting it");
                self.prefs
                    .forget_last_identity()
                    .map_err(|err| self.fail(err.into()))?;
                Ok(None)
            }
            Err((epoch, ControlError::Engine(err))) if err.is_transport() => {
                let err = self.fail(ControlError::Engine(err));
                let cached = self.prefs.cached_snapshot().filter(|s| s.id == id);
                let Some(mut snapshot) = cached else {
                    return Err(err);
                };
                // The engine has not confirmed it is still running.
                snapshot.run_state = RunState::Idle;
                let reconciled = reconcile(&snapshot.organisms);
                let mut state = self.state();
                if state.epoch != epoch {
                    return Err(err);
                }
                warn!(simulation_id = %id, "engine unreachable, showing cached snapshot");
                state.organisms = reconciled.organisms;
                state.snapshot = Some(snapshot);
                state.live = false;
                state.phase = RunPhase::Ready;
                Ok(Some(id))
            }
            Err((_, err)) => Err(self.fail(err)),
        }
    }

    // -----------------------------------------------------------------------
    // Preferences
    // -----------------------------------------------------------------------

    /// Change the speed multiplier.
    ///
    /// Out-of-range values are rejected before anything happens. A valid
    /// value is persisted first, then sent to the engine if a simulation is
    /// loaded. If that fails the in-memory speed goes back to the value
    /// persisted before this call; the persisted value stays.
    pub async fn set_speed(&self, raw: i64) -> Result<SpeedMultiplier, ControlError> {
        let speed = SpeedMultiplier::new(raw).map_err(|err| self.fail(err.into()))?;
        let previous = self.prefs.speed().unwrap_or(self.default_speed);
        self.prefs
            .set_speed(speed)
            .map_err(|err| self.fail(err.into()))?;

        let active = {
            let mut state = self.state();
            state.speed = speed;
            state.active().ok()
        };
        let Some((id, epoch)) = active else {
            debug!(speed = speed.get(), "speed persisted, nothing loaded");
            return Ok(speed);
        };

        let result = match self.claim(BusyKey::Run(id.clone())) {
            Ok(_guard) => self
                .engine
                .update_simulation_speed(&id, speed)
                .await
                .map_err(ControlError::from),
            Err(busy) => Err(busy),
        };
        match result {
            Ok(snapshot) => {
                self.apply(epoch, snapshot);
                info!(simulation_id = %id, speed = speed.get(), "speed updated");
                Ok(speed)
            }
            Err(err) => {
                {
                    let mut state = self.state();
                    if state.speed == speed {
                        state.speed = previous;
                    }
                }
                Err(self.fail(err))
            }
        }
    }

    /// Persist the autosave flag. Running autosave is someone else's job.
    pub fn set_autosave(&self, enabled: bool) -> Result<(), ControlError> {
        self.prefs
            .set_autosave(enabled)
            .map_err(|err| self.fail(err.into()))?;
        self.state().autosave = enabled;
        Ok(())
    }

    /// Persist the target generation used by run-to-target mode.
    pub fn set_target_generation(&self, target: u64) -> Result<(), ControlError> {
        if !(1..=MAX_TARGET_GENERATION).contains(&target) {
            return Err(self.fail(ControlError::Validation(format!(
                "target generation must be between 1 and {MAX_TARGET_GENERATION}, got {target}"
            ))));
        }
        self.prefs
            .set_target_generation(target)
            .map_err(|err| self.fail(err.into()))?;
        self.state().target_generation = Some(target);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dialogs
    // -----------------------------------------------------------------------

    /// Save a named snapshot of the loaded simulation.
    pub async fn save_snapshot(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<SaveReceipt, ControlError> {
        let (id, _) = self.state().active()?;
        let receipt = self
            .engine
            .save_simulation_snapshot(&id, name, description)
            .await
            .map_err(|err| Self::reraise(err.into()))?;
        info!(simulation_id = %id, name = %receipt.name, "snapshot saved");
        Ok(receipt)
    }

    /// List the simulations the engine knows about.
    pub async fn list_simulations(&self) -> Result<Vec<SnapshotSummary>, ControlError> {
        self.engine
            .list_simulations()
            .await
            .map_err(|err| Self::reraise(err.into()))
    }

    // -----------------------------------------------------------------------
    // Render boundary
    // -----------------------------------------------------------------------

    /// Clear the current error, returning it.
    pub fn dismiss_error(&self) -> Option<SurfacedError> {
        self.state().error.take()
    }

    /// The error awaiting dismissal.
    pub fn current_error(&self) -> Option<SurfacedError> {
        self.state().error.clone()
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> RunPhase {
        self.state().phase
    }

    /// Whether any command is in flight.
    pub fn is_busy(&self) -> bool {
        let phase_busy = matches!(
            self.phase(),
            RunPhase::Creating | RunPhase::Switching | RunPhase::Resetting
        );
        phase_busy || !lock(&self.in_flight).is_empty()
    }

    /// Whether a simulation is loaded.
    pub fn has_simulation(&self) -> bool {
        self.state().snapshot.is_some()
    }

    /// Whether the loaded simulation is running.
    pub fn is_running(&self) -> bool {
        self.state()
            .snapshot
            .as_ref()
            .is_some_and(Snapshot::is_running)
    }

    /// Copy of the loaded snapshot.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.state().snapshot.clone()
    }

    /// In-memory speed multiplier.
    pub fn speed(&self) -> SpeedMultiplier {
        self.state().speed
    }

    /// Seconds the current run has been going.
    pub fn elapsed_seconds(&self) -> u64 {
        lock(&self.ticker).elapsed_seconds()
    }

    /// Build the render record.
    pub fn view(&self) -> RenderView {
        let busy = self.is_busy();
        let elapsed_seconds = self.elapsed_seconds();
        let state = self.state();
        let series = state
            .snapshot
            .as_ref()
            .map_or(&[][..], |s| s.statistics.as_slice());
        RenderView {
            phase: state.phase,
            simulation_id: state.snapshot.as_ref().map(|s| s.id.clone()),
            run_name: state.snapshot.as_ref().map(|s| s.name.clone()),
            generation: state.snapshot.as_ref().map(|s| s.generation),
            statistics: derive_statistics(series, &state.organisms),
            organisms: state.organisms.clone(),
            error: state.error.clone(),
            busy,
            live: state.live,
            speed: state.speed,
            autosave: state.autosave,
            target_generation: state.target_generation,
            elapsed_seconds,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::memory::{InMemoryEngine, Operation};
    use crate::error::ErrorKind;
    use crate::prefs::MemoryBackend;

    fn controller() -> RunController<InMemoryEngine, MemoryBackend> {
        RunController::new(
            InMemoryEngine::new(),
            PreferenceStore::new(MemoryBackend::new()),
            &ControlsConfig::default(),
        )
    }

    #[tokio::test]
    async fn create_loads_and_remembers_the_simulation() {
        let controller = controller();
        let id = controller
            .create_run(&RunRequest::new("demo").with_parameters(json!({ "initialPopulation": 4 })))
            .await
            .unwrap();

        assert_eq!(controller.phase(), RunPhase::Ready);
        assert_eq!(controller.prefs().last_identity(), Some(id.clone()));
        let view = controller.view();
        assert_eq!(view.simulation_id, Some(id));
        assert_eq!(view.organisms.len(), 4);
        assert!(view.statistics.live_data);
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_the_engine() {
        let controller = controller();
        let err = controller.create_run(&RunRequest::new("")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(controller.engine().total_calls(), 0);
        assert!(controller.current_error().is_some());
    }

    #[tokio::test]
    async fn toggle_flips_run_state_and_phase() {
        let controller = controller();
        controller.create_run(&RunRequest::new("demo")).await.unwrap();

        assert_eq!(controller.toggle_run().await.unwrap(), RunState::Running);
        assert_eq!(controller.phase(), RunPhase::Running);
        assert_eq!(controller.toggle_run().await.unwrap(), RunState::Idle);
        assert_eq!(controller.phase(), RunPhase::Ready);
    }

    #[tokio::test]
    async fn guard_errors_are_not_recorded() {
        let controller = controller();
        let err = controller.toggle_run().await.unwrap_err();
        assert!(matches!(err, ControlError::NoActiveSimulation));
        assert!(controller.current_error().is_none());
    }

    #[tokio::test]
    async fn errors_stay_until_dismissed() {
        let controller = controller();
        let id = controller.create_run(&RunRequest::new("demo")).await.unwrap();
        controller
            .engine()
            .fail_next(Operation::Start, EngineError::Network("timeout".to_owned()));

        assert!(controller.toggle_run().await.is_err());
        controller.step().await.unwrap();
        let error = controller.current_error().unwrap();
        assert_eq!(error.kind, ErrorKind::Network);
        assert_eq!(error.message, "timeout");

        assert_eq!(controller.dismiss_error(), Some(error));
        assert!(controller.current_error().is_none());
        assert_eq!(controller.view().simulation_id, Some(id));
    }

    #[tokio::test]
    async fn remote_reset_returns_to_generation_zero() {
        let controller = controller();
        controller.create_run(&RunRequest::new("demo")).await.unwrap();
        controller.set_speed(4).await.unwrap();
        controller.step().await.unwrap();
        assert_eq!(controller.view().generation, Some(4));

        controller.reset_remote().await.unwrap();
        assert_eq!(controller.view().generation, Some(0));
        assert_eq!(controller.phase(), RunPhase::Ready);
        assert_eq!(controller.engine().calls(Operation::Reset), 1);
    }

    #[tokio::test]
    async fn target_generation_is_range_checked() {
        let controller = controller();
        assert!(controller.set_target_generation(0).is_err());
        assert!(controller.set_target_generation(MAX_TARGET_GENERATION).is_ok());
        assert_eq!(
            controller.view().target_generation,
            Some(MAX_TARGET_GENERATION)
        );
    }
}
