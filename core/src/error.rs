use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmlError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Rule {rule_id} failed: {reason}")]
    RuleEvaluation { rule_id: String, reason: String },

    #[error("Invalid {entity} transition from {from} to {to}")]
    StateTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Stale score version for transaction '{transaction_id}'")]
    StaleScore { transaction_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AmlError {
    pub fn validation(field: &str, reason: impl Into<String>) -> Self {
        AmlError::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AmlError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type AmlResult<T> = Result<T, AmlError>;
