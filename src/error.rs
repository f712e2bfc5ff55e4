use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("ASR error: {0}")]
    Asr(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Screen error: {0}")]
    Screen(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::General(err.to_string())
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<crate::audio::AudioError> for AppError {
    fn from(err: crate::audio::AudioError) -> Self {
        AppError::Audio(err.to_string())
    }
}

impl From<crate::screen::ScreenError> for AppError {
    fn from(err: crate::screen::ScreenError) -> Self {
        AppError::Screen(err.to_string())
    }
}
