//! Validated run-creation requests.

use validator::{Validate, ValidationError};

/// Parameter key under which the engine expects the target generation.
pub const TARGET_GENERATION_PARAMETER: &str = "duration";

/// A request to create a new simulation run.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct RunRequest {
    /// Human-readable run name.
    #[validate(length(min = 1, max = 120))]
    pub name: String,

    /// Generation the run-to-target mode advances to.
    #[validate(range(min = 1, max = 100_000))]
    pub target_generation: Option<u64>,

    /// Engine-specific creation parameters. Must be a JSON object.
    #[validate(custom(function = "parameters_are_object"))]
    pub parameters: serde_json::Value,
}

fn parameters_are_object(parameters: &serde_json::Value) -> Result<(), ValidationError> {
    if parameters.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("parameters_not_object"))
    }
}

impl RunRequest {
    /// A request with empty parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_generation: None,
            parameters: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the target generation.
    #[must_use]
    pub const fn with_target(mut self, target_generation: u64) -> Self {
        self.target_generation = Some(target_generation);
        self
    }

    /// Replace the parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Target generation from the explicit field, or failing that from the
    /// parameters.
    pub fn effective_target(&self) -> Option<u64> {
        self.target_generation.or_else(|| {
            self.parameters
                .get(TARGET_GENERATION_PARAMETER)
                .and_then(crate::prefs::lenient_integer)
                .and_then(|raw| u64::try_from(raw).ok())
        })
    }

    /// Parameters as sent to the engine. An explicit target generation
    /// replaces any `duration` the caller set, so the engine always runs to
    /// [`effective_target`](Self::effective_target).
    pub fn engine_parameters(&self) -> serde_json::Value {
        let mut parameters = self.parameters.clone();
        if let (Some(target), Some(map)) = (self.target_generation, parameters.as_object_mut()) {
            map.insert(
                TARGET_GENERATION_PARAMETER.to_owned(),
                serde_json::Value::from(target),
            );
        }
        parameters
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn valid_request_passes() {
        let request = RunRequest::new("demo").with_target(50);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(RunRequest::new("").validate().is_err());
    }

    #[test]
    fn zero_target_is_rejected() {
        assert!(RunRequest::new("demo").with_target(0).validate().is_err());
    }

    #[test]
    fn non_object_parameters_are_rejected() {
        let request = RunRequest::new("demo").with_parameters(json!([1, 2, 3]));
        assert!(request.validate().is_err());
    }

    #[test]
    fn target_is_folded_into_parameters() {
        let request = RunRequest::new("demo")
            .with_parameters(json!({ "mutationRate": 0.1 }))
            .with_target(40);
        assert_eq!(
            request.engine_parameters(),
            json!({ "mutationRate": 0.1, "duration": 40 })
        );
    }

    #[test]
    fn explicit_target_replaces_the_duration_parameter() {
        let request = RunRequest::new("demo")
            .with_parameters(json!({ "duration": 70 }))
            .with_target(40);
        assert_eq!(request.engine_parameters(), json!({ "duration": 40 }));
        assert_eq!(request.effective_target(), Some(40));
    }

    #[test]
    fn target_can_come_from_parameters() {
        let request = RunRequest::new("demo").with_parameters(json!({ "duration": "25" }));
        assert_eq!(request.effective_target(), Some(25));
    }
}
