//! Core entity structs exchanged with the engine and the dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{RunState, SpeedMultiplier};
use crate::ids::{OrganismId, SimulationId};

/// One simulated organism.
///
/// Only the identity and the resistance trait matter to the control layer;
/// everything else the engine reports is carried through in `traits`
/// untouched for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Organism {
    /// Identity, unique within one display set.
    pub id: OrganismId,
    /// Whether the organism carries the resistance trait.
    pub resistant: bool,
    /// Opaque engine-defined fields (position, fitness, lineage, ...).
    #[serde(default)]
    pub traits: BTreeMap<String, serde_json::Value>,
}

impl Organism {
    /// Create an organism with no extra traits.
    pub fn new(id: impl Into<OrganismId>, resistant: bool) -> Self {
        Self {
            id: id.into(),
            resistant,
            traits: BTreeMap::new(),
        }
    }
}

/// Population counts recorded by the engine for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct StatisticsPoint {
    /// Generation the counts belong to.
    pub generation: u64,
    /// Total living organisms.
    pub total: u32,
    /// Organisms carrying the resistance trait.
    pub resistant: u32,
}

/// Full authoritative simulation state returned by the engine.
///
/// Snapshots are replaced wholesale on every successful response and never
/// patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot {
    /// Engine-issued identity.
    pub id: SimulationId,
    /// Human-readable run name.
    pub name: String,
    /// Current generation counter.
    pub generation: u64,
    /// Whether the engine is advancing on its own.
    pub run_state: RunState,
    /// Speed multiplier last acknowledged by the engine.
    pub speed: SpeedMultiplier,
    /// Creation parameters, opaque to the control layer.
    pub parameters: serde_json::Value,
    /// Per-generation population series computed by the engine.
    #[serde(default)]
    pub statistics: Vec<StatisticsPoint>,
    /// Organisms of the current generation, possibly with duplicates.
    #[serde(default)]
    pub organisms: Vec<Organism>,
}

impl Snapshot {
    /// Most recent engine-computed statistics point, if any.
    pub fn latest_statistics(&self) -> Option<&StatisticsPoint> {
        self.statistics.last()
    }

    /// Whether the engine reports the run as running.
    pub const fn is_running(&self) -> bool {
        self.run_state.is_running()
    }
}

/// Listing entry returned by the engine for the load dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SnapshotSummary {
    /// Engine-issued identity.
    pub id: SimulationId,
    /// Human-readable run name.
    pub name: String,
    /// Generation at the time of listing.
    pub generation: u64,
    /// Run state at the time of listing.
    pub run_state: RunState,
    /// Last modification time, when the engine reports one.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Snapshot> for SnapshotSummary {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            generation: snapshot.generation,
            run_state: snapshot.run_state,
            updated_at: None,
        }
    }
}

/// Acknowledgement of a saved named snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SaveReceipt {
    /// The simulation that was saved.
    pub simulation_id: SimulationId,
    /// Name the snapshot was saved under.
    pub name: String,
    /// When the engine stored it.
    pub saved_at: DateTime<Utc>,
}

/// Population statistics shown next to the organism field.
///
/// Derived per render and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct DisplayStatistics {
    /// Total organisms.
    pub total: u32,
    /// Resistant organisms.
    pub resistant: u32,
    /// Non-resistant organisms.
    pub sensitive: u32,
    /// `resistant / total * 100`, or zero for an empty population.
    pub resistance_percentage: f64,
    /// True when the numbers come from the engine's series rather than a
    /// local scan.
    pub live_data: bool,
}
