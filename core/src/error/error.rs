use thiserror::Error;

use super::queue::QueueError;
use super::tool::ToolError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("queue failed: {0}")]
    Queue(#[from] QueueError),
    #[error("tool failed: {0}")]
    Tool(#[from] ToolError),
    #[error("config error: {0}")]
    Config(String),
    #[error("chain file error: {0}")]
    Chain(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
