use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("failed to read rule file: {0}")]
    Io(#[from] std::io::Error),

    #[error("rule syntax error at line {line}: {reason}")]
    Syntax { line: usize, reason: String },
}
