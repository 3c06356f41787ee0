pub mod errors;
pub mod id;
pub mod types;

pub use errors::{CaptureError, ConduitError, ConfigError, IpcError, WindowError};
pub use id::RequestId;
pub use types::{ContentsId, Size};

pub type Result<T> = std::result::Result<T, ConduitError>;
