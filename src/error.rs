use thiserror::Error;

/// Validation failures raised by intent handlers. None of these leave
/// partial state behind: a rejected intent deducts nothing and creates
/// nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("Unknown building type: {0}")]
    UnknownBuildingType(String),

    #[error("Unknown unit type: {0}")]
    UnknownUnitType(String),

    #[error("Cannot train {unit}: requires a {required} first")]
    PrerequisiteMissing { unit: String, required: String },

    #[error("Not enough resources to train {unit}: needs {gold} gold and {food} food")]
    InsufficientResources { unit: String, gold: i32, food: i32 },

    #[error("No {required} placed to train {unit}")]
    NoTrainingBuilding { unit: String, required: String },
}

impl SimError {
    /// Stable machine-readable kind, used by the HTTP boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::UnknownBuildingType(_) => "unknown_building_type",
            SimError::UnknownUnitType(_) => "unknown_unit_type",
            SimError::PrerequisiteMissing { .. } => "prerequisite_missing",
            SimError::InsufficientResources { .. } => "insufficient_resources",
            SimError::NoTrainingBuilding { .. } => "no_training_building",
        }
    }
}
