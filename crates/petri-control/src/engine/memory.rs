//! In-memory stub engine.
//!
//! [`InMemoryEngine`] keeps simulations in a map and advances them
//! deterministically: a step bumps the generation and records a statistics
//! point, nothing mutates. It exists so the controller can be exercised end
//! to end without a network, and it records per-operation call counts and
//! supports failure injection for tests.
//!
//! Every call suspends once before touching state, like a network round
//! trip would, so concurrently issued commands genuinely interleave. A call
//! can also be held open with [`InMemoryEngine::hold_next`] until the test
//! opens its [`CallGate`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use petri_types::{
    Organism, RunState, SaveReceipt, SimulationId, Snapshot, SnapshotSummary, SpeedMultiplier,
    StatisticsPoint,
};

use tokio::sync::Semaphore;

use crate::engine::{EngineError, SimulationEngine};
use crate::prefs::lenient_integer;

/// Population created when the parameters do not name one.
const DEFAULT_POPULATION: u32 = 12;

/// Every n-th seeded organism starts resistant.
const RESISTANT_EVERY: u32 = 4;

/// Engine operations, used to count calls and target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// `create_simulation`
    Create,
    /// `get_simulation`
    Get,
    /// `start_simulation`
    Start,
    /// `stop_simulation`
    Stop,
    /// `step_simulation`
    Step,
    /// `reset_simulation`
    Reset,
    /// `update_simulation_speed`
    UpdateSpeed,
    /// `list_simulations`
    List,
    /// `save_simulation_snapshot`
    Save,
}

#[derive(Debug, Default)]
struct EngineState {
    simulations: BTreeMap<SimulationId, Snapshot>,
    saved: BTreeSet<(SimulationId, String)>,
    calls: BTreeMap<Operation, usize>,
    failures: BTreeMap<Operation, VecDeque<EngineError>>,
    gates: BTreeMap<Operation, VecDeque<Arc<Semaphore>>>,
    unreachable: bool,
}

/// Holds one engine call open until [`CallGate::open`] is called or the gate
/// is dropped.
#[derive(Debug)]
pub struct CallGate {
    semaphore: Arc<Semaphore>,
}

impl CallGate {
    /// Let the held call proceed.
    pub fn open(&self) {
        self.semaphore.close();
    }
}

impl Drop for CallGate {
    fn drop(&mut self) {
        self.open();
    }
}

/// A deterministic [`SimulationEngine`] living in process memory.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: Mutex<EngineState>,
}

impl InMemoryEngine {
    /// Create an engine with no simulations.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a simulation verbatim, replacing any with the same identity.
    pub fn insert(&self, snapshot: Snapshot) {
        self.lock()
            .simulations
            .insert(snapshot.id.clone(), snapshot);
    }

    /// Current engine-side state of a simulation.
    pub fn simulation(&self, id: &SimulationId) -> Option<Snapshot> {
        self.lock().simulations.get(id).cloned()
    }

    /// Number of times `op` has been called.
    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of calls across all operations.
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Make the next call to `op` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: Operation, error: EngineError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    /// Simulate the engine being unreachable: every call fails with a
    /// network error until switched back.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Hold the next call to `op` open until the returned gate opens.
    /// Calls after that one are not held.
    pub fn hold_next(&self, op: Operation) -> CallGate {
        let semaphore = Arc::new(Semaphore::new(0));
        self.lock()
            .gates
            .entry(op)
            .or_default()
            .push_back(Arc::clone(&semaphore));
        CallGate { semaphore }
    }

    /// Count the call, wait on any gate, then suspend once.
    async fn enter(&self, op: Operation) -> Result<(), EngineError> {
        let (outcome, gate) = {
            let mut state = self.lock();
            let gate = state.gates.get_mut(&op).and_then(VecDeque::pop_front);
            let count = state.calls.entry(op).or_insert(0);
            *count = count.saturating_add(1);
            let outcome = if state.unreachable {
                Err(EngineError::Network("engine unreachable".to_owned()))
            } else {
                state
                    .failures
                    .get_mut(&op)
                    .and_then(VecDeque::pop_front)
                    .map_or(Ok(()), Err)
            };
            (outcome, gate)
        };
        if let Some(gate) = gate {
            // The gate never hands out permits; closing it releases the call.
            let _ = gate.acquire().await;
        }
        tokio::task::yield_now().await;
        outcome
    }

    /// Apply `mutate` to a stored simulation and return the new snapshot.
    fn update(
        &self,
        id: &SimulationId,
        mutate: impl FnOnce(&mut Snapshot) -> Result<(), EngineError>,
    ) -> Result<Snapshot, EngineError> {
        let mut state = self.lock();
        let snapshot = state
            .simulations
            .get_mut(id)
            .ok_or_else(|| not_found(id))?;
        mutate(snapshot)?;
        Ok(snapshot.clone())
    }
}

fn not_found(id: &SimulationId) -> EngineError {
    EngineError::NotFound(format!("simulation {id} not found"))
}

fn population_point(generation: u64, organisms: &[Organism]) -> StatisticsPoint {
    let total = u32::try_from(organisms.len()).unwrap_or(u32::MAX);
    let resistant = u32::try_from(organisms.iter().filter(|o| o.resistant).count())
        .unwrap_or(u32::MAX);
    StatisticsPoint {
        generation,
        total,
        resistant,
    }
}

fn seed_organisms(id: &SimulationId, population: u32) -> Vec<Organism> {
    (0..population)
        .map(|i| Organism::new(format!("{id}-org-{i}"), i % RESISTANT_EVERY == 0))
        .collect()
}

impl SimulationEngine for InMemoryEngine {
    async fn create_simulation(
        &self,
        name: &str,
        parameters: &serde_json::Value,
    ) -> Result<Snapshot, EngineError> {
        self.enter(Operation::Create).await?;
        if name.trim().is_empty() {
            return Err(EngineError::Validation("simulation name is required".to_owned()));
        }
        if !parameters.is_object() {
            return Err(EngineError::Validation("parameters must be an object".to_owned()));
        }

        let population = parameters
            .get("initialPopulation")
            .and_then(lenient_integer)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_POPULATION);
        let id = SimulationId::generate();
        let organisms = seed_organisms(&id, population);
        let snapshot = Snapshot {
            statistics: vec![population_point(0, &organisms)],
            id,
            name: name.to_owned(),
            generation: 0,
            run_state: RunState::Idle,
            speed: SpeedMultiplier::MIN,
            parameters: parameters.clone(),
            organisms,
        };
        self.insert(snapshot.clone());
        Ok(snapshot)
    }

    async fn get_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        self.enter(Operation::Get).await?;
        self.simulation(id).ok_or_else(|| not_found(id))
    }

    async fn start_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        self.enter(Operation::Start).await?;
        self.update(id, |s| {
            if s.is_running() {
                return Err(EngineError::InvalidState("simulation is already running".to_owned()));
            }
            s.run_state = RunState::Running;
            Ok(())
        })
    }

    async fn stop_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        self.enter(Operation::Stop).await?;
        self.update(id, |s| {
            if !s.is_running() {
                return Err(EngineError::InvalidState("simulation is not running".to_owned()));
            }
            s.run_state = RunState::Idle;
            Ok(())
        })
    }

    async fn step_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        self.enter(Operation::Step).await?;
        self.update(id, |s| {
            if s.is_running() {
                return Err(EngineError::InvalidState(
                    "cannot step a running simulation".to_owned(),
                ));
            }
            s.generation = s.generation.saturating_add(1);
            let point = population_point(s.generation, &s.organisms);
            s.statistics.push(point);
            Ok(())
        })
    }

    async fn reset_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        self.enter(Operation::Reset).await?;
        self.update(id, |s| {
            s.generation = 0;
            s.run_state = RunState::Idle;
            s.statistics = vec![population_point(0, &s.organisms)];
            Ok(())
        })
    }

    async fn update_simulation_speed(
        &self,
        id: &SimulationId,
        speed: SpeedMultiplier,
    ) -> Result<Snapshot, EngineError> {
        self.enter(Operation::UpdateSpeed).await?;
        self.update(id, |s| {
            s.speed = speed;
            Ok(())
        })
    }

    async fn list_simulations(&self) -> Result<Vec<SnapshotSummary>, EngineError> {
        self.enter(Operation::List).await?;
        Ok(self
            .lock()
            .simulations
            .values()
            .map(SnapshotSummary::from)
            .collect())
    }

    async fn save_simulation_snapshot(
        &self,
        id: &SimulationId,
        name: &str,
        _description: Option<&str>,
    ) -> Result<SaveReceipt, EngineError> {
        self.enter(Operation::Save).await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("snapshot name is required".to_owned()));
        }
        let mut state = self.lock();
        if !state.simulations.contains_key(id) {
            return Err(not_found(id));
        }
        if !state.saved.insert((id.clone(), name.to_owned())) {
            return Err(EngineError::Conflict(format!(
                "a snapshot named '{name}' already exists"
            )));
        }
        Ok(SaveReceipt {
            simulation_id: id.clone(),
            name: name.to_owned(),
            saved_at: Utc::now(),
        })
    }
}
