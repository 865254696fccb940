pub mod assistant;
pub mod audio;
pub mod config;
pub mod locale;
pub mod registry;
pub mod summarize;
pub mod task;
pub mod transcribe;

pub use assistant::Assistant;
pub use audio::{AudioBuffer, Recorder};
pub use config::AppConfig;
pub use locale::{LocaleProvider, LocaleStore};
pub use registry::{ModelRegistry, ProviderModel};
pub use task::{
    ErrorClass, OperationError, PanelSurface, TaskController, TaskOperation, TaskResult,
    TaskState, TaskSurface,
};
pub use transcribe::AudioPayload;
