pub mod config;
pub mod error;
pub mod paths;
pub mod protocol;

pub use config::{Config, EngineConfig, ProcessConfig};
pub use error::{Error, Result};
pub use paths::Paths;
pub use protocol::{OpenSettings, Operation, Rect, RefJson, ValueResponse};
