//! CLI client: thin `clap` front end over `rpc::client::Client`.
//!
//! Every subcommand builds one `rpc::Req`, sends it, and renders the
//! `rpc::Resp` via `fmt::print_resp`. No subsystem logic lives here.

use crate::rpc::{Client, Req};
use crate::types::{Id, MemoryCategory, MessageId, Priority, Severity, TaskStatus};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aide")]
#[command(about = "Local-first coordination and knowledge substrate for coding agents")]
#[command(version)]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(long, global = true, default_value = ".")]
    pub root: std::path::PathBuf,

    /// Print raw JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable ANSI color in human-readable output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the coordination daemon (socket + optional code/findings stores + watcher)
    Serve {
        /// Disable the code index store
        #[arg(long)]
        no_code: bool,
        /// Disable the findings store
        #[arg(long)]
        no_findings: bool,
        /// Disable the filesystem watcher
        #[arg(long)]
        no_watch: bool,
    },
    /// Run as an MCP server (stdin/stdout JSON-RPC) against a running daemon
    Mcp,
    /// Memory records
    #[command(subcommand)]
    Memory(MemoryCommands),
    /// Decisions
    #[command(subcommand)]
    Decision(DecisionCommands),
    /// Key/value state
    #[command(subcommand)]
    State(StateCommands),
    /// Inter-agent messages
    #[command(subcommand)]
    Message(MessageCommands),
    /// Coordination tasks
    #[command(subcommand)]
    Task(TaskCommands),
    /// Code index
    #[command(subcommand)]
    Code(CodeCommands),
    /// Findings (static analysis)
    #[command(subcommand)]
    Findings(FindingsCommands),
    /// Daemon status and health
    Status,
    /// Health check only
    Ping,
    /// Generate shell completion scripts
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    Add {
        category: MemoryCategory,
        content: String,
        #[arg(long)]
        tag: Vec<String>,
        #[arg(long, default_value = "0.0")]
        priority: f64,
        #[arg(long)]
        plan: Option<String>,
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        namespace: Option<String>,
    },
    Get {
        id: String,
    },
    List {
        #[arg(long)]
        category: Option<MemoryCategory>,
        #[arg(long)]
        plan: Option<String>,
        #[arg(long)]
        tag: Vec<String>,
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long)]
        include_all: bool,
        #[arg(long, default_value = "0")]
        limit: usize,
    },
    Search {
        query: String,
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    Delete {
        id: String,
    },
    Clear {
        #[arg(long)]
        category: Option<MemoryCategory>,
    },
    Export,
}

#[derive(Subcommand)]
pub enum DecisionCommands {
    Set {
        topic: String,
        decision: String,
        #[arg(long)]
        rationale: Option<String>,
        #[arg(long)]
        details: Option<String>,
        #[arg(long)]
        reference: Vec<String>,
        #[arg(long)]
        decided_by: Option<String>,
    },
    Get {
        topic: String,
    },
    History {
        topic: String,
    },
    Delete {
        topic: String,
    },
}

#[derive(Subcommand)]
pub enum StateCommands {
    Set {
        key: String,
        value: String,
        #[arg(long)]
        agent: Option<String>,
    },
    Get {
        key: String,
    },
    List {
        #[arg(long)]
        agent: Option<String>,
    },
    Delete {
        key: String,
    },
    ClearAgent {
        agent: String,
    },
    ClearAll,
}

#[derive(Subcommand)]
pub enum MessageCommands {
    Send {
        from: String,
        to: String,
        content: String,
        #[arg(long, default_value = "note")]
        msg_type: String,
        #[arg(long)]
        ttl_secs: Option<i64>,
    },
    List {
        agent: String,
    },
    Ack {
        id: i64,
        agent: String,
    },
    Prune,
    Clear {
        agent: String,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    Create {
        title: String,
        description: String,
    },
    Get {
        id: String,
    },
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    Claim {
        id: String,
        agent: String,
        #[arg(long)]
        worktree: Option<String>,
    },
    Complete {
        id: String,
        #[arg(long)]
        result: Option<String>,
    },
    Delete {
        id: String,
    },
    Clear,
}

#[derive(Subcommand)]
pub enum CodeCommands {
    Index {
        #[arg(default_value = ".")]
        paths: Vec<String>,
        #[arg(long)]
        force: bool,
    },
    Get {
        path: String,
    },
    Search {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    Clear,
}

#[derive(Subcommand)]
pub enum FindingsCommands {
    Run {
        path: Option<String>,
    },
    List {
        #[arg(long)]
        analyzer: Option<String>,
        #[arg(long)]
        severity: Option<Severity>,
        #[arg(long)]
        file_path: Option<String>,
    },
    Search {
        query: String,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    Clear {
        #[arg(long)]
        analyzer: Option<String>,
        #[arg(long)]
        file_path: Option<String>,
    },
    Status,
}

fn parse_id(raw: &str) -> anyhow::Result<Id> {
    raw.parse().map_err(|_| anyhow::anyhow!("invalid id: {raw}"))
}

/// Sends one request built from `command` and renders the response.
///
/// # Errors
///
/// Returns an error if the id arguments don't parse, or the RPC call fails.
pub async fn run(client: &Client, command: Commands, json: bool, color: bool) -> anyhow::Result<()> {
    let req = match command {
        Commands::Serve { .. } | Commands::Mcp | Commands::Completions { .. } => {
            anyhow::bail!("not a client command")
        }
        Commands::Memory(cmd) => memory_req(cmd)?,
        Commands::Decision(cmd) => decision_req(cmd),
        Commands::State(cmd) => state_req(cmd),
        Commands::Message(cmd) => message_req(cmd),
        Commands::Task(cmd) => task_req(cmd)?,
        Commands::Code(cmd) => code_req(cmd),
        Commands::Findings(cmd) => findings_req(cmd),
        Commands::Status => Req::Status,
        Commands::Ping => Req::HealthCheck,
    };
    let resp = client.call(req).await?;
    crate::fmt::print_resp(&mut std::io::stdout(), &resp, json, color)
}

fn memory_req(cmd: MemoryCommands) -> anyhow::Result<Req> {
    Ok(match cmd {
        MemoryCommands::Add { category, content, tag, priority, plan, agent, namespace } => {
            Req::MemoryAdd {
                category,
                content,
                tags: tag.into_iter().collect(),
                priority: Priority::new(priority),
                plan,
                agent,
                namespace,
            }
        }
        MemoryCommands::Get { id } => Req::MemoryGet { id: parse_id(&id)? },
        MemoryCommands::List { category, plan, tag, namespace, include_all, limit } => {
            Req::MemoryList { category, plan, tags: tag, namespace, include_all, limit }
        }
        MemoryCommands::Search { query, limit } => Req::MemorySearch { query, limit },
        MemoryCommands::Delete { id } => Req::MemoryDelete { id: parse_id(&id)? },
        MemoryCommands::Clear { category } => Req::MemoryClear { category },
        MemoryCommands::Export => Req::MemoryExport,
    })
}

fn decision_req(cmd: DecisionCommands) -> Req {
    match cmd {
        DecisionCommands::Set { topic, decision, rationale, details, reference, decided_by } => {
            Req::DecisionSet { topic, decision, rationale, details, references: reference, decided_by }
        }
        DecisionCommands::Get { topic } => Req::DecisionGet { topic },
        DecisionCommands::History { topic } => Req::DecisionHistory { topic },
        DecisionCommands::Delete { topic } => Req::DecisionDelete { topic },
    }
}

fn state_req(cmd: StateCommands) -> Req {
    match cmd {
        StateCommands::Set { key, value, agent } => Req::StateSet { key, value, agent },
        StateCommands::Get { key } => Req::StateGet { key },
        StateCommands::List { agent } => Req::StateList { agent },
        StateCommands::Delete { key } => Req::StateDelete { key },
        StateCommands::ClearAgent { agent } => Req::StateClearAgent { agent },
        StateCommands::ClearAll => Req::StateClearAll,
    }
}

fn message_req(cmd: MessageCommands) -> Req {
    match cmd {
        MessageCommands::Send { from, to, content, msg_type, ttl_secs } => {
            Req::MessageSend { from, to, content, msg_type, ttl_secs }
        }
        MessageCommands::List { agent } => Req::MessageList { agent },
        MessageCommands::Ack { id, agent } => Req::MessageAck { id: MessageId::new(id), agent },
        MessageCommands::Prune => Req::MessagePrune,
        MessageCommands::Clear { agent } => Req::MessageClear { agent },
    }
}

fn task_req(cmd: TaskCommands) -> anyhow::Result<Req> {
    Ok(match cmd {
        TaskCommands::Create { title, description } => Req::TaskCreate { title, description },
        TaskCommands::Get { id } => Req::TaskGet { id: parse_id(&id)? },
        TaskCommands::List { status } => Req::TaskList { status },
        TaskCommands::Claim { id, agent, worktree } => {
            Req::TaskClaim { id: parse_id(&id)?, agent, worktree }
        }
        TaskCommands::Complete { id, result } => Req::TaskComplete { id: parse_id(&id)?, result },
        TaskCommands::Delete { id } => Req::TaskDelete { id: parse_id(&id)? },
        TaskCommands::Clear => Req::TaskClear,
    })
}

fn code_req(cmd: CodeCommands) -> Req {
    match cmd {
        CodeCommands::Index { paths, force } => Req::CodeIndex { paths, force },
        CodeCommands::Get { path } => Req::CodeGet { path },
        CodeCommands::Search { name, kind, language, limit } => {
            Req::CodeSearch { name, kind, language, limit }
        }
        CodeCommands::Clear => Req::CodeClear,
    }
}

fn findings_req(cmd: FindingsCommands) -> Req {
    match cmd {
        FindingsCommands::Run { path } => Req::FindingsRun { path },
        FindingsCommands::List { analyzer, severity, file_path } => {
            Req::FindingsList { analyzer, severity, file_path }
        }
        FindingsCommands::Search { query, limit } => Req::FindingsSearch { query, limit },
        FindingsCommands::Clear { analyzer, file_path } => Req::FindingsClear { analyzer, file_path },
        FindingsCommands::Status => Req::FindingsStatus,
    }
}
