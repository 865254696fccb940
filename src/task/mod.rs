// src/task/mod.rs
// Task Module - cancellable remote-operation lifecycle

mod controller;
mod state;
mod surface;
mod ticker;

pub use controller::{TaskController, TaskOperation, TaskTextKeys};
pub use state::{ErrorClass, OperationError, TaskResult, TaskState, ValidationError};
pub use surface::{PanelState, PanelSurface, StatusKind, TaskSurface};
