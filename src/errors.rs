use thiserror::Error;

#[derive(Debug, Error)]
pub enum BeeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("inconsistent lengths: {0}")]
    InconsistentLengths(String),

    #[error("unknown block: {0}")]
    UnknownBlock(String),

    #[error("multiblock depth exceeded (block_depth = {0})")]
    DepthExceeded(usize),

    #[error("frame source ended mid-message")]
    AbortedIteration,

    #[error("message slot produced an empty buffer")]
    EmptyBuffer,

    #[error("intersecting block boundaries: {0}")]
    Intersection(String),

    #[error("unknown head index: {0}")]
    UnknownIndex(u64),

    #[error("environment error: {0}")]
    Environment(String),
}
