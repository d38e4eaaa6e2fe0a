pub type ChalkResult<T> = Result<T, ChalkError>;

#[derive(thiserror::Error, Debug)]
pub enum ChalkError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("shape error: {0}")]
    Shape(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("speech error: {0}")]
    Speech(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChalkError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn speech(msg: impl Into<String>) -> Self {
        Self::Speech(msg.into())
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }
}
