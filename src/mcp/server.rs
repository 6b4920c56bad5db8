//! MCP server implementation for Bear.
//!
//! Runs an MCP server on stdio transport with one tool per Bear
//! x-callback-url action.

use anyhow::Result;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ErrorCode, ErrorData as McpError, Implementation, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
    transport::stdio,
    ServerHandler, ServiceExt,
};
use serde::Serialize;
use std::borrow::Cow;

use crate::bear::action::{
    AddFile, AddText, Create, DeleteTag, GrabUrl, NoteTarget, OpenNote, OpenTag, RenameTag,
    Search, SidebarSearch,
};
use crate::bear::notes::{notes_from_fields, tag_names_from_fields, Note};
use crate::bear::{ActionRequest, ActionResponse, BearError, CallbackFields, Dispatcher};

// ============== Result Types ==============

/// Reply for fire-and-forget actions.
#[derive(Debug, Serialize)]
pub struct Acknowledgement {
    pub action: String,
    pub acknowledged: bool,
}

// ============== Server Implementation ==============

/// The Bear MCP server.
#[derive(Clone)]
pub struct BearServer {
    dispatcher: Dispatcher,
    tool_router: ToolRouter<BearServer>,
}

impl BearServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            tool_router: Self::tool_router(),
        }
    }

    async fn call(&self, request: ActionRequest) -> Result<ActionResponse, McpError> {
        let action = request.action();
        tracing::info!("Tool call: {action}");
        self.dispatcher.dispatch(request).await.map_err(|e| {
            tracing::warn!("{action} failed: {e}");
            tool_error(&e)
        })
    }

    /// Runs a callback action and returns Bear's fields.
    async fn fields(&self, request: ActionRequest) -> Result<CallbackFields, McpError> {
        match self.call(request).await? {
            ActionResponse::Callback(fields) => Ok(fields),
            ActionResponse::Acknowledged(_) => Ok(CallbackFields::default()),
        }
    }

    /// Runs a fire-and-forget action.
    async fn acknowledge(&self, request: ActionRequest) -> Result<CallToolResult, McpError> {
        let action = request.action();
        self.call(request).await?;
        json_result(&Acknowledgement {
            action: action.path().to_string(),
            acknowledged: true,
        })
    }

    async fn listing(&self, request: ActionRequest) -> Result<CallToolResult, McpError> {
        let fields = self.fields(request).await?;
        let notes = notes_from_fields(&fields).map_err(|e| tool_error(&e))?;
        json_result(&notes)
    }
}

/// Converts a Bear error into MCP error data carrying its kind.
fn tool_error(err: &BearError) -> McpError {
    let code = match err {
        BearError::InvalidParameters(_) => ErrorCode(-32602),
        _ => ErrorCode(-32603),
    };
    McpError {
        code,
        message: Cow::from(err.to_string()),
        data: Some(serde_json::json!({ "kind": err.kind() })),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("Error serializing response: {e}"));
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[tool_router]
impl BearServer {
    #[tool(
        description = "Open a note identified by exactly one of its id, title or a search term and return its content"
    )]
    async fn open_note(
        &self,
        Parameters(params): Parameters<OpenNote>,
    ) -> Result<CallToolResult, McpError> {
        let fields = self.fields(ActionRequest::OpenNote(params)).await?;
        let note = Note::from_fields(&fields).map_err(|e| tool_error(&e))?;
        json_result(&note)
    }

    #[tool(
        description = "Create a new note and return its unique identifier. Empty notes are not allowed."
    )]
    async fn create(
        &self,
        Parameters(params): Parameters<Create>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.fields(ActionRequest::Create(params)).await?)
    }

    /// Covers append, prepend and both replace modes of Bear's add-text.
    #[tool(
        description = "Add text to a note identified by its id or title. Mode is prepend, append (default), replace (keeps the title) or replace_all."
    )]
    async fn add_text(
        &self,
        Parameters(params): Parameters<AddText>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.fields(ActionRequest::AddText(params)).await?)
    }

    #[tool(
        description = "Append or prepend a file to a note identified by its id or title. The file is base64 data or an http(s) URL to download."
    )]
    async fn add_file(
        &self,
        Parameters(params): Parameters<AddFile>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.fields(ActionRequest::AddFile(params)).await?)
    }

    #[tool(description = "Return all the tags currently displayed in Bear's sidebar")]
    async fn tags(&self) -> Result<CallToolResult, McpError> {
        let fields = self.fields(ActionRequest::Tags).await?;
        let names = tag_names_from_fields(&fields).map_err(|e| tool_error(&e))?;
        json_result(&names)
    }

    #[tool(description = "List the notes that have the given tag (or comma-separated tags)")]
    async fn open_tag(
        &self,
        Parameters(params): Parameters<OpenTag>,
    ) -> Result<CallToolResult, McpError> {
        self.listing(ActionRequest::OpenTag(params)).await
    }

    #[tool(
        description = "Rename an existing tag. Fails if Bear is locked or the tag contains a locked note."
    )]
    async fn rename_tag(
        &self,
        Parameters(params): Parameters<RenameTag>,
    ) -> Result<CallToolResult, McpError> {
        self.acknowledge(ActionRequest::RenameTag(params)).await
    }

    #[tool(
        description = "Delete an existing tag. Fails if Bear is locked or the tag contains a locked note."
    )]
    async fn delete_tag(
        &self,
        Parameters(params): Parameters<DeleteTag>,
    ) -> Result<CallToolResult, McpError> {
        self.acknowledge(ActionRequest::DeleteTag(params)).await
    }

    #[tool(
        description = "Move a note identified by its id or a search term to the trash. Encrypted notes cannot be trashed."
    )]
    async fn trash(
        &self,
        Parameters(params): Parameters<NoteTarget>,
    ) -> Result<CallToolResult, McpError> {
        self.acknowledge(ActionRequest::Trash(params)).await
    }

    #[tool(
        description = "Move a note identified by its id or a search term to the archive. Encrypted notes cannot be archived."
    )]
    async fn archive(
        &self,
        Parameters(params): Parameters<NoteTarget>,
    ) -> Result<CallToolResult, McpError> {
        self.acknowledge(ActionRequest::Archive(params)).await
    }

    #[tool(description = "List notes without tags, optionally filtered by a search term")]
    async fn untagged(
        &self,
        Parameters(params): Parameters<SidebarSearch>,
    ) -> Result<CallToolResult, McpError> {
        self.listing(ActionRequest::Untagged(params)).await
    }

    #[tool(description = "List notes with open todos, optionally filtered by a search term")]
    async fn todo(
        &self,
        Parameters(params): Parameters<SidebarSearch>,
    ) -> Result<CallToolResult, McpError> {
        self.listing(ActionRequest::Todo(params)).await
    }

    #[tool(description = "List notes modified today, optionally filtered by a search term")]
    async fn today(
        &self,
        Parameters(params): Parameters<SidebarSearch>,
    ) -> Result<CallToolResult, McpError> {
        self.listing(ActionRequest::Today(params)).await
    }

    #[tool(description = "List locked notes, optionally filtered by a search term")]
    async fn locked(
        &self,
        Parameters(params): Parameters<SidebarSearch>,
    ) -> Result<CallToolResult, McpError> {
        self.listing(ActionRequest::Locked(params)).await
    }

    #[tool(description = "Search all notes, or the notes of one tag, and return the matches")]
    async fn search(
        &self,
        Parameters(params): Parameters<Search>,
    ) -> Result<CallToolResult, McpError> {
        self.listing(ActionRequest::Search(params)).await
    }

    #[tool(
        description = "Create a new note from the content of a web page and return its unique identifier"
    )]
    async fn grab_url(
        &self,
        Parameters(params): Parameters<GrabUrl>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.fields(ActionRequest::GrabUrl(params)).await?)
    }
}

#[tool_handler]
impl ServerHandler for BearServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Tools for the Bear note-taking app. Each tool triggers one Bear \
                 x-callback-url action; read actions wait for Bear to report back, \
                 while rename_tag, delete_tag, trash and archive return as soon as \
                 Bear has been asked."
                    .to_string(),
            ),
        }
    }
}

/// Runs the MCP server on stdio transport.
///
/// Blocks until the client disconnects or an error occurs.
pub async fn run_server(dispatcher: Dispatcher) -> Result<()> {
    tracing::info!("Starting Bear MCP server on stdio");
    let service = BearServer::new(dispatcher).serve(stdio()).await?;
    service.waiting().await?;
    tracing::info!("MCP client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bear::{Action, UrlOpener};
    use crate::bear::url::{encode_query, parse_query_string};
    use crate::config::Config;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl UrlOpener for Recorder {
        fn open(&self, url: &str) -> Result<(), BearError> {
            self.0.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    /// Answers every callback action through its `x-success` URL, the way
    /// Bear does.
    struct Responder {
        fields: Vec<(&'static str, &'static str)>,
        http: reqwest::Client,
    }

    impl UrlOpener for Responder {
        fn open(&self, url: &str) -> Result<(), BearError> {
            let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
            let success = parse_query_string(query)
                .into_iter()
                .find(|(key, _)| key == "x-success")
                .map(|(_, value)| value);

            if let Some(success) = success {
                let target = format!("{success}?{}", encode_query(self.fields.iter().copied()));
                let http = self.http.clone();
                tokio::spawn(async move {
                    let _ = http.get(target).send().await;
                });
            }
            Ok(())
        }
    }

    fn answering(fields: Vec<(&'static str, &'static str)>) -> BearServer {
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .expect("Failed to build HTTP client");
        let config = Config::new("TOKEN")
            .unwrap()
            .with_callback_timeout(Duration::from_secs(5));
        let dispatcher = Dispatcher::with_opener(config, Arc::new(Responder { fields, http }));
        BearServer::new(dispatcher)
    }

    fn json_of(result: &CallToolResult) -> serde_json::Value {
        serde_json::from_str(&text_of(result)).unwrap()
    }

    fn server() -> (BearServer, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let config = Config::new("TOKEN").unwrap();
        let dispatcher = Dispatcher::with_opener(config, recorder.clone());
        (BearServer::new(dispatcher), recorder)
    }

    fn text_of(result: &CallToolResult) -> String {
        let value = serde_json::to_value(result).unwrap();
        value["content"][0]["text"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_one_tool_per_action() {
        let (server, _) = server();
        let names: BTreeSet<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        let expected: BTreeSet<String> = Action::ALL.iter().map(|a| a.tool_name()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_tool_error_codes() {
        let invalid = tool_error(&BearError::InvalidParameters("trash requires 'id'".into()));
        assert_eq!(invalid.code, ErrorCode(-32602));
        assert_eq!(invalid.data, Some(serde_json::json!({"kind": "InvalidParameters"})));

        let timeout = tool_error(&BearError::CallbackTimeout(std::time::Duration::from_secs(10)));
        assert_eq!(timeout.code, ErrorCode(-32603));
        assert_eq!(timeout.data, Some(serde_json::json!({"kind": "CallbackTimeout"})));
    }

    #[tokio::test]
    async fn test_trash_tool_acknowledges() {
        let (server, recorder) = server();
        let result = server
            .trash(Parameters(NoteTarget {
                id: Some("abc123".into()),
                search: None,
            }))
            .await
            .unwrap();

        let body: serde_json::Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(body, serde_json::json!({"action": "trash", "acknowledged": true}));
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_tag_tool_rejects_missing_name() {
        let (server, recorder) = server();
        let err = server
            .rename_tag(Parameters(RenameTag {
                name: Some("old".into()),
                new_name: None,
            }))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode(-32602));
        assert!(err.message.contains("new_name"));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_note_returns_note() {
        let server = answering(vec![
            ("note", "# Groceries\nmilk, eggs"),
            ("identifier", "ABC-1"),
            ("title", "Groceries"),
            ("tags", r#"["food","home"]"#),
            ("is_trashed", "no"),
            ("modificationDate", "2024-05-01T10:00:00Z"),
            ("creationDate", "2024-04-30T09:00:00Z"),
        ]);

        let result = server
            .open_note(Parameters(OpenNote {
                id: Some("ABC-1".into()),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(
            json_of(&result),
            serde_json::json!({
                "note": "# Groceries\nmilk, eggs",
                "identifier": "ABC-1",
                "title": "Groceries",
                "tags": ["food", "home"],
                "is_trashed": false,
                "modificationDate": "2024-05-01T10:00:00Z",
                "creationDate": "2024-04-30T09:00:00Z",
            })
        );
    }

    #[tokio::test]
    async fn test_search_decodes_string_encoded_tags() {
        let server = answering(vec![(
            "notes",
            r#"[{"title":"Groceries","identifier":"ABC-1","tags":"[\"food\"]","modificationDate":"m1","creationDate":"c1","pin":"yes"},{"title":"Ideas","identifier":"DEF-2"}]"#,
        )]);

        let result = server
            .search(Parameters(Search {
                term: Some("groceries".into()),
                tag: None,
            }))
            .await
            .unwrap();

        let notes = json_of(&result);
        assert_eq!(notes[0]["tags"], serde_json::json!(["food"]));
        assert_eq!(notes[0]["pin"], "yes");
        assert_eq!(notes[1]["identifier"], "DEF-2");
        assert_eq!(notes[1]["tags"], serde_json::json!([]));
        assert_eq!(notes[1]["pin"], "no");
    }

    #[tokio::test]
    async fn test_tags_returns_names() {
        let server = answering(vec![("tags", r#"[{"name":"food"},{"name":"work/2024"}]"#)]);

        let result = server.tags().await.unwrap();
        assert_eq!(json_of(&result), serde_json::json!(["food", "work/2024"]));
    }

    #[tokio::test]
    async fn test_listing_with_bad_notes_json_is_malformed_response() {
        let server = answering(vec![("notes", "not json")]);

        let err = server
            .today(Parameters(SidebarSearch::default()))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode(-32603));
        assert_eq!(err.data, Some(serde_json::json!({"kind": "MalformedResponse"})));
    }
}
