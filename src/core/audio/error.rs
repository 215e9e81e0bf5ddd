/// Errors raised while packaging or re-encoding audio.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudioError {
    /// The container header could not describe the payload.
    #[error("Container build failed: {0}")]
    ContainerBuild(String),

    /// The source audio could not be decoded or re-encoded.
    #[error("Transcode failed: {0}")]
    Transcode(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
