use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown metric key `{0}`")]
    UnknownMetric(String),

    #[error("unknown node `{0}`")]
    UnknownNode(String),

    #[error("node `{0}` registered twice")]
    DuplicateNode(String),

    #[error("node `{0}` is not a writable state field")]
    NotWritable(String),

    #[error("dependency cycle: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("day index {index} outside 0..{num_days}")]
    DayOutOfRange { index: usize, num_days: usize },
}
