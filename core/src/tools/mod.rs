//! Tool calls, dispatch, command validation and retry policy.

pub mod call;
pub mod registry;
pub mod retry;
pub mod validator;

pub use call::{ToolCall, KNOWN_TOOLS};
pub use registry::{ToolExecutor, ToolRegistry, DEFAULT_QUERY_TOP_K};
pub use retry::{run_with_retry, ExponentialBackoff, LinearBackoff, RetryConfig, RetryStrategy};
pub use validator::CommandValidator;
