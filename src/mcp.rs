//! MCP adapter: translates MCP tool calls into the same typed RPC requests
//! `cli.rs` sends, using `rmcp`'s tool router (spec §4.6, ambient surface).
//!
//! This module holds no subsystem logic of its own — every tool body builds
//! a `rpc::Req`, calls the client, and renders the `rpc::Resp` as JSON.

use crate::rpc::{Client, Req, Resp};
use crate::types::{Id, MemoryCategory, MessageId, Priority, Severity, TagSet, TaskStatus};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::ToolCallContext;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{tool, tool_router, ErrorData, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;

fn render(resp: Result<Resp, crate::rpc::client::ClientError>) -> Result<CallToolResult, ErrorData> {
    match resp {
        Ok(resp) => {
            let json = serde_json::to_string(&resp)
                .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(json)]))
        }
        Err(crate::rpc::client::ClientError::Rpc(err)) => {
            Ok(CallToolResult::error(vec![Content::text(err.to_string())]))
        }
        Err(err) => Err(ErrorData::internal_error(err.to_string(), None)),
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct MemoryAddParams {
    pub category: MemoryCategory,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub priority: Option<f64>,
    pub plan: Option<String>,
    pub agent: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct MemoryGetParams {
    pub id: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct MemoryListParams {
    pub category: Option<MemoryCategory>,
    pub plan: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub include_all: bool,
    pub limit: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
pub struct MemorySearchParams {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
pub struct MemoryDeleteParams {
    pub id: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct DecisionSetParams {
    pub topic: String,
    pub decision: String,
    pub rationale: Option<String>,
    pub details: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    pub decided_by: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct TopicParams {
    pub topic: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct StateSetParams {
    pub key: String,
    pub value: String,
    pub agent: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct StateKeyParams {
    pub key: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct AgentParams {
    pub agent: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct MessageSendParams {
    pub from: String,
    pub to: String,
    pub content: String,
    pub msg_type: String,
    pub ttl_secs: Option<i64>,
}

#[derive(Deserialize, JsonSchema)]
pub struct MessageListParams {
    pub agent: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct MessageAckParams {
    pub id: i64,
    pub agent: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct TaskCreateParams {
    pub title: String,
    pub description: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct TaskIdParams {
    pub id: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct TaskListParams {
    pub status: Option<TaskStatus>,
}

#[derive(Deserialize, JsonSchema)]
pub struct TaskClaimParams {
    pub id: String,
    pub agent: String,
    pub worktree: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct TaskUpdateParams {
    pub id: String,
    pub result: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct CodeIndexParams {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Deserialize, JsonSchema)]
pub struct CodeGetParams {
    pub path: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct CodeSearchParams {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub language: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, JsonSchema)]
pub struct FindingsRunParams {
    pub path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct FindingsListParams {
    pub analyzer: Option<String>,
    pub severity: Option<Severity>,
    pub file_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct FindingsSearchParams {
    pub query: String,
    pub limit: Option<usize>,
}

fn parse_id(raw: &str) -> Result<Id, ErrorData> {
    raw.parse().map_err(|_| ErrorData::invalid_params(format!("invalid id: {raw}"), None))
}

/// MCP server exposing every `aide` RPC method as a tool. No state beyond
/// the RPC client: all logic lives behind the socket.
#[derive(Clone)]
pub struct McpServer {
    client: Client,
    tool_router: ToolRouter<McpServer>,
}

impl McpServer {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client, tool_router: Self::tool_router() }
    }
}

#[tool_router]
impl McpServer {
    #[tool(description = "Add a memory record (learning/decision/issue/discovery/blocker)")]
    async fn memory_add(
        &self,
        Parameters(p): Parameters<MemoryAddParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let tags: TagSet = p.tags.into_iter().collect();
        let req = Req::MemoryAdd {
            category: p.category,
            content: p.content,
            tags,
            priority: Priority::new(p.priority.unwrap_or(0.0)),
            plan: p.plan,
            agent: p.agent,
            namespace: p.namespace,
        };
        render(self.client.call(req).await)
    }

    #[tool(description = "Fetch a memory by id")]
    async fn memory_get(
        &self,
        Parameters(p): Parameters<MemoryGetParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let id = parse_id(&p.id)?;
        render(self.client.call(Req::MemoryGet { id }).await)
    }

    #[tool(description = "List memories matching a filter")]
    async fn memory_list(
        &self,
        Parameters(p): Parameters<MemoryListParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = Req::MemoryList {
            category: p.category,
            plan: p.plan,
            tags: p.tags,
            namespace: p.namespace,
            include_all: p.include_all,
            limit: p.limit.unwrap_or(0),
        };
        render(self.client.call(req).await)
    }

    #[tool(description = "Full-text search memories")]
    async fn memory_search(
        &self,
        Parameters(p): Parameters<MemorySearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = Req::MemorySearch { query: p.query, limit: p.limit.unwrap_or(10) };
        render(self.client.call(req).await)
    }

    #[tool(description = "Delete a memory by id")]
    async fn memory_delete(
        &self,
        Parameters(p): Parameters<MemoryDeleteParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let id = parse_id(&p.id)?;
        render(self.client.call(Req::MemoryDelete { id }).await)
    }

    #[tool(description = "Record a decision for a topic (append-only history)")]
    async fn decision_set(
        &self,
        Parameters(p): Parameters<DecisionSetParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = Req::DecisionSet {
            topic: p.topic,
            decision: p.decision,
            rationale: p.rationale,
            details: p.details,
            references: p.references,
            decided_by: p.decided_by,
        };
        render(self.client.call(req).await)
    }

    #[tool(description = "Get the latest decision for a topic")]
    async fn decision_get(
        &self,
        Parameters(p): Parameters<TopicParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::DecisionGet { topic: p.topic }).await)
    }

    #[tool(description = "Get the full decision history for a topic")]
    async fn decision_history(
        &self,
        Parameters(p): Parameters<TopicParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::DecisionHistory { topic: p.topic }).await)
    }

    #[tool(description = "Set a state value, optionally agent-scoped")]
    async fn state_set(
        &self,
        Parameters(p): Parameters<StateSetParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::StateSet { key: p.key, value: p.value, agent: p.agent }).await)
    }

    #[tool(description = "Get a state value by key")]
    async fn state_get(
        &self,
        Parameters(p): Parameters<StateKeyParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::StateGet { key: p.key }).await)
    }

    #[tool(description = "List state entries, optionally scoped to an agent")]
    async fn state_list(
        &self,
        Parameters(p): Parameters<AgentParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::StateList { agent: p.agent }).await)
    }

    #[tool(description = "Send a message between agents (default TTL one hour)")]
    async fn message_send(
        &self,
        Parameters(p): Parameters<MessageSendParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = Req::MessageSend {
            from: p.from,
            to: p.to,
            content: p.content,
            msg_type: p.msg_type,
            ttl_secs: p.ttl_secs,
        };
        render(self.client.call(req).await)
    }

    #[tool(description = "List unread messages addressed to an agent")]
    async fn message_list(
        &self,
        Parameters(p): Parameters<MessageListParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::MessageList { agent: p.agent }).await)
    }

    #[tool(description = "Acknowledge a message as read by an agent")]
    async fn message_ack(
        &self,
        Parameters(p): Parameters<MessageAckParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::MessageAck { id: MessageId::new(p.id), agent: p.agent }).await)
    }

    #[tool(description = "Create a task in the coordination queue")]
    async fn task_create(
        &self,
        Parameters(p): Parameters<TaskCreateParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::TaskCreate { title: p.title, description: p.description }).await)
    }

    #[tool(description = "Fetch a task by id")]
    async fn task_get(
        &self,
        Parameters(p): Parameters<TaskIdParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let id = parse_id(&p.id)?;
        render(self.client.call(Req::TaskGet { id }).await)
    }

    #[tool(description = "List tasks, optionally filtered by status")]
    async fn task_list(
        &self,
        Parameters(p): Parameters<TaskListParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::TaskList { status: p.status }).await)
    }

    #[tool(description = "Atomically claim a pending task for an agent")]
    async fn task_claim(
        &self,
        Parameters(p): Parameters<TaskClaimParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let id = parse_id(&p.id)?;
        render(self.client.call(Req::TaskClaim { id, agent: p.agent, worktree: p.worktree }).await)
    }

    #[tool(description = "Mark a claimed task complete, with an optional result")]
    async fn task_complete(
        &self,
        Parameters(p): Parameters<TaskUpdateParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let id = parse_id(&p.id)?;
        render(self.client.call(Req::TaskComplete { id, result: p.result }).await)
    }

    #[tool(description = "Re-index code under one or more paths (relative to root)")]
    async fn code_index(
        &self,
        Parameters(p): Parameters<CodeIndexParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::CodeIndex { paths: p.paths, force: p.force }).await)
    }

    #[tool(description = "Get indexed file info and symbols for a path")]
    async fn code_get(
        &self,
        Parameters(p): Parameters<CodeGetParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::CodeGet { path: p.path }).await)
    }

    #[tool(description = "Search indexed symbols by name/kind/language")]
    async fn code_search(
        &self,
        Parameters(p): Parameters<CodeSearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = Req::CodeSearch { name: p.name, kind: p.kind, language: p.language, limit: p.limit.unwrap_or(20) };
        render(self.client.call(req).await)
    }

    #[tool(description = "Run all findings analyzers, optionally scoped to a path")]
    async fn findings_run(
        &self,
        Parameters(p): Parameters<FindingsRunParams>,
    ) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::FindingsRun { path: p.path }).await)
    }

    #[tool(description = "List findings matching a filter")]
    async fn findings_list(
        &self,
        Parameters(p): Parameters<FindingsListParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = Req::FindingsList { analyzer: p.analyzer, severity: p.severity, file_path: p.file_path };
        render(self.client.call(req).await)
    }

    #[tool(description = "Full-text search findings")]
    async fn findings_search(
        &self,
        Parameters(p): Parameters<FindingsSearchParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let req = Req::FindingsSearch { query: p.query, limit: p.limit.unwrap_or(20) };
        render(self.client.call(req).await)
    }

    #[tool(description = "Server status: enabled subsystems and watcher stats")]
    async fn status(&self) -> Result<CallToolResult, ErrorData> {
        render(self.client.call(Req::Status).await)
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            server_info: Implementation {
                name: "aide".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "aide: local-first coordination and knowledge substrate for coding agents. \
                 Memory/decision/state/message/task tools coordinate agents working in this \
                 repository; code/findings tools expose the code index and static analyzers."
                    .to_string(),
            ),
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let tcc = ToolCallContext::new(self, request, context);
        self.tool_router.call(tcc).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult { tools: self.tool_router.list_all(), next_cursor: None, meta: None })
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tool_router.get(name).cloned()
    }
}
