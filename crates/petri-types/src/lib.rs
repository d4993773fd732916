//! Shared type definitions for the Petri resistance-evolution dashboard.
//!
//! This crate is the single source of truth for the types exchanged between
//! the run controller, the remote simulation engine client, and the browser
//! dashboard. Types flow downstream to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe wrappers for simulation and organism identities
//! - [`enums`] -- Run state and the validated speed multiplier
//! - [`structs`] -- Snapshots, organisms, statistics, and summaries

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{InvalidSpeed, RunState, SpeedMultiplier};
pub use ids::{OrganismId, SimulationId};
pub use structs::{
    DisplayStatistics, Organism, SaveReceipt, Snapshot, SnapshotSummary, StatisticsPoint,
};

#[cfg(test)]
mod tests {
    //! Binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        // ts-rs writes the generated files to `bindings/` relative to the
        // crate root.
        use ts_rs::TS;

        let _ = crate::ids::SimulationId::export_all();
        let _ = crate::ids::OrganismId::export_all();
        let _ = crate::enums::RunState::export_all();
        let _ = crate::enums::SpeedMultiplier::export_all();
        let _ = crate::structs::Organism::export_all();
        let _ = crate::structs::StatisticsPoint::export_all();
        let _ = crate::structs::Snapshot::export_all();
        let _ = crate::structs::SnapshotSummary::export_all();
        let _ = crate::structs::SaveReceipt::export_all();
        let _ = crate::structs::DisplayStatistics::export_all();
    }
}
