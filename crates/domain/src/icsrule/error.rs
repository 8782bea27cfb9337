use thiserror::Error;

#[derive(Debug, Error)]
pub enum IcsRuleError {
    #[error("failed to read rule file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid rule json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("duplicate rule id: {0}")]
    DuplicateRid(u32),
}
