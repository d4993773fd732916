//! HTTP client for the remote simulation engine.
//!
//! The engine speaks JSON over REST. Its wire shape nests the live state
//! under `currentState` and reports statistics as parallel arrays; this
//! module converts that into the flat [`Snapshot`] the controller works
//! with.
//!
//! # Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `POST` | `/simulations` | create |
//! | `GET` | `/simulations` | list |
//! | `GET` | `/simulations/{id}` | get |
//! | `POST` | `/simulations/{id}/start` | start |
//! | `POST` | `/simulations/{id}/stop` | stop |
//! | `POST` | `/simulations/{id}/step` | step |
//! | `POST` | `/simulations/{id}/reset` | reset |
//! | `PUT` | `/simulations/{id}/speed` | update speed |
//! | `POST` | `/simulations/{id}/snapshots` | save named snapshot |

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use petri_types::{
    Organism, OrganismId, RunState, SaveReceipt, SimulationId, Snapshot, SnapshotSummary,
    SpeedMultiplier, StatisticsPoint,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::EngineConfig;
use crate::engine::{EngineError, SimulationEngine};
use crate::prefs::lenient_integer;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Responses are either wrapped as `{"simulation": ...}` or bare.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SimulationEnvelope {
    Wrapped { simulation: WireSimulation },
    Bare(WireSimulation),
}

impl SimulationEnvelope {
    fn into_inner(self) -> WireSimulation {
        match self {
            Self::Wrapped { simulation } | Self::Bare(simulation) => simulation,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Wrapped { simulations: Vec<WireSimulation> },
    Bare(Vec<WireSimulation>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSimulation {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    parameters: serde_json::Value,
    #[serde(default)]
    current_state: WireState,
    #[serde(default)]
    statistics: WireStatistics,
    #[serde(default)]
    is_running: Option<bool>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireState {
    generation: u64,
    is_running: Option<bool>,
    simulation_speed: Option<serde_json::Value>,
    bacteria: Vec<WireOrganism>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireStatistics {
    generations: Vec<u64>,
    total_population: Vec<u32>,
    resistant_count: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOrganism {
    id: String,
    #[serde(default, alias = "resistant")]
    is_resistant: bool,
    #[serde(flatten)]
    traits: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSaveReceipt {
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

impl WireSimulation {
    fn run_state(&self) -> RunState {
        RunState::from_running(
            self.current_state
                .is_running
                .or(self.is_running)
                .unwrap_or(false),
        )
    }

    fn into_snapshot(self) -> Snapshot {
        let run_state = self.run_state();
        let speed = self
            .current_state
            .simulation_speed
            .as_ref()
            .and_then(lenient_integer)
            .and_then(|raw| SpeedMultiplier::new(raw).ok())
            .unwrap_or_default();
        Snapshot {
            id: SimulationId::new(self.id),
            name: self.name,
            generation: self.current_state.generation,
            run_state,
            speed,
            parameters: self.parameters,
            statistics: self.statistics.into_points(),
            organisms: self
                .current_state
                .bacteria
                .into_iter()
                .map(WireOrganism::into_organism)
                .collect(),
        }
    }

    fn into_summary(self) -> SnapshotSummary {
        SnapshotSummary {
            run_state: self.run_state(),
            id: SimulationId::new(self.id),
            name: self.name,
            generation: self.current_state.generation,
            updated_at: self.updated_at,
        }
    }
}

impl WireStatistics {
    /// Zip the parallel arrays; a ragged tail is dropped. Missing
    /// generation labels fall back to the array index.
    fn into_points(self) -> Vec<StatisticsPoint> {
        self.total_population
            .into_iter()
            .zip(self.resistant_count)
            .enumerate()
            .map(|(index, (total, resistant))| StatisticsPoint {
                generation: self
                    .generations
                    .get(index)
                    .copied()
                    .unwrap_or_else(|| u64::try_from(index).unwrap_or(u64::MAX)),
                total,
                resistant,
            })
            .collect()
    }
}

impl WireOrganism {
    fn into_organism(self) -> Organism {
        Organism {
            id: OrganismId::new(self.id),
            resistant: self.is_resistant,
            traits: self.traits,
        }
    }
}

// ---------------------------------------------------------------------------
// Status classification
// ---------------------------------------------------------------------------

/// Which family of route produced an error status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// start / stop / step: 409 means the run state forbids the command.
    RunControl,
    /// Everything else: 409 is a genuine resource conflict.
    Resource,
}

fn classify(status: StatusCode, route: Route, message: String) -> EngineError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            EngineError::Validation(message)
        }
        StatusCode::NOT_FOUND => EngineError::NotFound(message),
        StatusCode::CONFLICT if route == Route::RunControl => EngineError::InvalidState(message),
        StatusCode::CONFLICT => EngineError::Conflict(message),
        _ => EngineError::Network(message),
    }
}

/// Pull the most useful message out of an error body.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|key| json.get(key).and_then(serde_json::Value::as_str))
                .map(ToOwned::to_owned)
        });
    from_json
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        })
        .unwrap_or_else(|| format!("engine returned {status}"))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`SimulationEngine`] backed by the engine's REST API.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEngine {
    /// Create a client for the configured engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Network`] if the HTTP client cannot be built
    /// (e.g. TLS backend initialisation failure).
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| EngineError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// The engine base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn simulation_url(&self, id: &SimulationId, action: &str) -> String {
        if action.is_empty() {
            self.url(&format!("/simulations/{id}"))
        } else {
            self.url(&format!("/simulations/{id}/{action}"))
        }
    }

    /// Send a request and decode a successful JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        route: Route,
    ) -> Result<T, EngineError> {
        let response = request
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| EngineError::Network(format!("engine request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = body.as_str(), "Engine returned an error status");
            return Err(classify(status, route, error_message(status, &body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EngineError::Decode(format!("engine response parse failed: {e}")))
    }

    async fn snapshot(
        &self,
        request: reqwest::RequestBuilder,
        route: Route,
    ) -> Result<Snapshot, EngineError> {
        self.send::<SimulationEnvelope>(request, route)
            .await
            .map(|envelope| envelope.into_inner().into_snapshot())
    }
}

impl SimulationEngine for HttpEngine {
    async fn create_simulation(
        &self,
        name: &str,
        parameters: &serde_json::Value,
    ) -> Result<Snapshot, EngineError> {
        let body = serde_json::json!({ "name": name, "parameters": parameters });
        let request = self.client.post(self.url("/simulations")).json(&body);
        self.snapshot(request, Route::Resource).await
    }

    async fn get_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        let request = self.client.get(self.simulation_url(id, ""));
        self.snapshot(request, Route::Resource).await
    }

    async fn start_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        let request = self.client.post(self.simulation_url(id, "start"));
        self.snapshot(request, Route::RunControl).await
    }

    async fn stop_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        let request = self.client.post(self.simulation_url(id, "stop"));
        self.snapshot(request, Route::RunControl).await
    }

    async fn step_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        let request = self.client.post(self.simulation_url(id, "step"));
        self.snapshot(request, Route::RunControl).await
    }

    async fn reset_simulation(&self, id: &SimulationId) -> Result<Snapshot, EngineError> {
        let request = self.client.post(self.simulation_url(id, "reset"));
        self.snapshot(request, Route::Resource).await
    }

    async fn update_simulation_speed(
        &self,
        id: &SimulationId,
        speed: SpeedMultiplier,
    ) -> Result<Snapshot, EngineError> {
        let body = serde_json::json!({ "speed": speed.get() });
        let request = self.client.put(self.simulation_url(id, "speed")).json(&body);
        self.snapshot(request, Route::Resource).await
    }

    async fn list_simulations(&self) -> Result<Vec<SnapshotSummary>, EngineError> {
        let request = self.client.get(self.url("/simulations"));
        let list = self.send::<ListEnvelope>(request, Route::Resource).await?;
        let simulations = match list {
            ListEnvelope::Wrapped { simulations } | ListEnvelope::Bare(simulations) => simulations,
        };
        Ok(simulations
            .into_iter()
            .map(WireSimulation::into_summary)
            .collect())
    }

    async fn save_simulation_snapshot(
        &self,
        id: &SimulationId,
        name: &str,
        description: Option<&str>,
    ) -> Result<SaveReceipt, EngineError> {
        let body = serde_json::json!({ "name": name, "description": description });
        let request = self
            .client
            .post(self.simulation_url(id, "snapshots"))
            .json(&body);
        let receipt = self.send::<WireSaveReceipt>(request, Route::Resource).await?;
        Ok(SaveReceipt {
            simulation_id: id.clone(),
            name: name.to_owned(),
            saved_at: receipt.saved_at.unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> Snapshot {
        serde_json::from_value::<SimulationEnvelope>(value)
            .unwrap()
            .into_inner()
            .into_snapshot()
    }

    #[test]
    fn wrapped_and_bare_bodies_decode_alike() {
        let body = json!({
            "id": "sim-1",
            "name": "Bacteria Evolution Simulation",
            "parameters": { "duration": 50 },
            "currentState": {
                "generation": 3,
                "isRunning": true,
                "simulationSpeed": 4,
                "bacteria": [
                    { "id": "b-1", "isResistant": true, "x": 1.5 },
                    { "id": "b-2", "isResistant": false }
                ]
            },
            "statistics": {
                "generations": [1, 2, 3],
                "totalPopulation": [10, 12, 14],
                "resistantCount": [1, 2, 5]
            }
        });
        let bare = parse(body.clone());
        let wrapped = parse(json!({ "simulation": body }));
        assert_eq!(bare, wrapped);

        assert_eq!(bare.generation, 3);
        assert_eq!(bare.run_state, RunState::Running);
        assert_eq!(bare.speed.get(), 4);
        assert_eq!(bare.organisms.len(), 2);
        assert!(bare.organisms.first().unwrap().resistant);
        assert_eq!(bare.organisms.first().unwrap().traits.get("x"), Some(&json!(1.5)));
        assert_eq!(
            bare.latest_statistics(),
            Some(&StatisticsPoint {
                generation: 3,
                total: 14,
                resistant: 5,
            })
        );
    }

    #[test]
    fn sparse_body_uses_defaults() {
        let snapshot = parse(json!({ "id": "sim-2", "currentState": { "simulationSpeed": "99" } }));
        assert_eq!(snapshot.generation, 0);
        assert_eq!(snapshot.run_state, RunState::Idle);
        assert_eq!(snapshot.speed, SpeedMultiplier::MIN);
        assert!(snapshot.statistics.is_empty());
        assert!(snapshot.organisms.is_empty());
    }

    #[test]
    fn ragged_statistics_are_truncated_and_indexed() {
        let stats = WireStatistics {
            generations: Vec::new(),
            total_population: vec![10, 20, 30],
            resistant_count: vec![1, 2],
        };
        let points = stats.into_points();
        assert_eq!(points.len(), 2);
        assert_eq!(points.last().map(|p| p.generation), Some(1));
    }

    #[test]
    fn list_accepts_both_shapes() {
        let wrapped: ListEnvelope =
            serde_json::from_value(json!({ "simulations": [{ "id": "a" }, { "id": "b" }] }))
                .unwrap();
        let bare: ListEnvelope = serde_json::from_value(json!([{ "id": "a" }])).unwrap();
        assert!(
            matches!(wrapped, ListEnvelope::Wrapped { ref simulations } if simulations.len() == 2)
        );
        assert!(matches!(bare, ListEnvelope::Bare(ref simulations) if simulations.len() == 1));
    }

    #[test]
    fn status_classification() {
        let msg = || "m".to_owned();
        assert_eq!(
            classify(StatusCode::CONFLICT, Route::RunControl, msg()),
            EngineError::InvalidState(msg())
        );
        assert_eq!(
            classify(StatusCode::CONFLICT, Route::Resource, msg()),
            EngineError::Conflict(msg())
        );
        assert_eq!(
            classify(StatusCode::UNPROCESSABLE_ENTITY, Route::Resource, msg()),
            EngineError::Validation(msg())
        );
        assert_eq!(
            classify(StatusCode::NOT_FOUND, Route::RunControl, msg()),
            EngineError::NotFound(msg())
        );
        assert_eq!(
            classify(StatusCode::BAD_GATEWAY, Route::Resource, msg()),
            EngineError::Network(msg())
        );
    }

    #[test]
    fn error_message_prefers_json_fields() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"duration too large"}"#),
            "duration too large"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"detail":"nope"}"#),
            "nope"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, " upstream down "), "upstream down");
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, ""),
            "engine returned 502 Bad Gateway"
        );
    }

    #[test]
    fn base_url_is_normalised() {
        let engine = HttpEngine::new(&EngineConfig {
            base_url: "http://localhost:8000/api/".to_owned(),
            request_timeout_ms: 1000,
        })
        .unwrap();
        assert_eq!(engine.base_url(), "http://localhost:8000/api");
        assert_eq!(
            engine.simulation_url(&SimulationId::new("x"), "step"),
            "http://localhost:8000/api/simulations/x/step"
        );
    }
}
