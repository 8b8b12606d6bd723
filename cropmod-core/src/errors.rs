use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum CropError {
    #[error("{0}")]
    Error(String),
    /// An inconsistent parameter set, rejected at construction.
    #[error("invalid parameter set: {0}")]
    Parameter(String),
    /// The developmental stage index left its valid range.
    ///
    /// This is a fatal invariant violation; the crop instance stops
    /// advancing once it is raised.
    #[error("irregular developmental stage {stage} (valid range 0..{num_stages})")]
    IrregularStage { stage: usize, num_stages: usize },
    #[error("organ index {organ} out of range (crop has {num_organs} organs)")]
    UnknownOrgan { organ: usize, num_organs: usize },
    #[error("failed to parse configuration: {0}")]
    Config(String),
}

/// Convenience type for `Result<T, CropError>`.
pub type CropResult<T> = Result<T, CropError>;
