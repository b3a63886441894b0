use clap::Parser;
use std::path::PathBuf;

/// Common command-line arguments shared between the collector and the
/// export binaries
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to the sessions database
    #[arg(long, env = "SESSIONS_DB")]
    pub sessions_db: PathBuf,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    pub openai_api_base: Option<String>,

    /// Model used for System B generation
    #[arg(long, default_value = "gpt-4o")]
    pub generation_model: String,

    /// Cap on the number of sessions processed in one run (absent = all)
    #[arg(long, env = "SESSION_LIMIT")]
    pub session_limit: Option<usize>,

    /// Phrase marking an out-of-domain refusal in a generated response
    #[arg(long, default_value = "irrelevant question")]
    pub refusal_marker: String,
}
