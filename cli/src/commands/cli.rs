use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "deskforge", about = "Agent task queue harness")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the workspace root from config.
    #[arg(long, global = true)]
    pub workspace: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Path to a chain file: a JSON array of `{tool, params, ...}` steps.
    pub chain_file: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct QueryArgs {
    /// Question to ask the developer library.
    pub question: String,

    /// Ranked chunks to return; defaults to `library.top_k` from config.
    #[arg(long)]
    pub top_k: Option<usize>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct IngestArgs {
    /// File whose text is chunked and indexed.
    pub file: String,

    /// Source label stored with each chunk; defaults to the file path.
    #[arg(long)]
    pub source: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a chain of tool calls through the task queue.
    Run(RunArgs),
    /// Continue from the last saved queue checkpoint.
    Resume,
    /// Print the saved queue checkpoint.
    Inspect,
    /// Query the developer library.
    Query(QueryArgs),
    /// Index a document into the developer library.
    Ingest(IngestArgs),
}
