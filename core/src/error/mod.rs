pub mod error;
pub mod queue;
pub mod tool;

pub use error::CliError;
pub use queue::QueueError;
pub use tool::ToolError;
