pub mod buffer;
pub mod capture;

pub use buffer::AudioBuffer;
pub use capture::Recorder;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("empty audio buffer")]
    EmptyBuffer,

    #[error("capture error: {0}")]
    Capture(String),
}
