//
// backend.rs
//
// Method registration, lifecycle handling and the serve loop
//

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tower_lsp::jsonrpc::Response;
use tower_lsp::lsp_types::*;

use crate::config::parse_server_config;
use crate::dispatcher::Dispatcher;
use crate::handlers;
use crate::state::{ServerPhase, WorldState};
use crate::transport::{Transport, TransportError};

pub const SERVER_NAME: &str = "just-lsp";

/// The language server: its state plus the method table that drives it
pub struct Backend {
    state: WorldState,
    dispatcher: Dispatcher<WorldState>,
}

impl Default for Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend {
    pub fn new() -> Self {
        let mut dispatcher = Dispatcher::new();
        register_methods(&mut dispatcher);
        Self {
            state: WorldState::default(),
            dispatcher,
        }
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Process one decoded message and return the reply, if any.
    pub fn handle(&mut self, message: Value) -> Option<Response> {
        if log::log_enabled!(log::Level::Debug) {
            let method = message.get("method").and_then(Value::as_str);
            log::debug!("<- {:?} (id {:?})", method, message.get("id"));
        }
        self.dispatcher.dispatch(&mut self.state, message)
    }

    /// Read, handle and answer messages one at a time until the stream ends
    /// or a shutdown/exit has been processed.
    pub async fn serve<R, W>(&mut self, transport: &mut Transport<R, W>) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let message = match transport.receive().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    log::info!("Input stream closed");
                    break;
                }
                Err(TransportError::Decode(e)) => {
                    log::warn!("Skipping undecodable message: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(response) = self.handle(message) {
                transport.send(&response).await?;
            }

            if self.state.is_shutting_down() {
                break;
            }
        }

        self.state.advance(ServerPhase::Terminated);
        Ok(())
    }
}

/// Register every supported LSP method.
pub fn register_methods(dispatcher: &mut Dispatcher<WorldState>) {
    dispatcher
        .on_request("initialize", initialize)
        .on_notification("initialized", |_, _| {
            log::info!("{} initialized", SERVER_NAME);
            Ok(())
        })
        .on_request("shutdown", shutdown)
        .on_notification("exit", exit)
        .on_notification("textDocument/didOpen", did_open)
        .on_notification("textDocument/didChange", did_change)
        .on_notification("textDocument/didClose", did_close)
        .on_notification("workspace/didChangeConfiguration", did_change_configuration)
        .on_request("textDocument/definition", goto_definition)
        .on_request("textDocument/hover", hover);
}

pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        position_encoding: Some(PositionEncodingKind::UTF16),
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::FULL),
                ..Default::default()
            },
        )),
        definition_provider: Some(OneOf::Left(true)),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        ..Default::default()
    }
}

// Only `initializationOptions` is read, so clients that send partial
// capabilities still initialize.
fn initialize(state: &mut WorldState, params: Value) -> anyhow::Result<Value> {
    log::info!("Initializing {}", SERVER_NAME);

    if let Some(client) = params.get("clientInfo").and_then(|c| c.get("name")) {
        log::info!("Client: {}", client);
    }
    if let Some(config) = params
        .get("initializationOptions")
        .and_then(parse_server_config)
    {
        state.config = config;
    }

    state.advance(ServerPhase::Ready);

    let result = InitializeResult {
        capabilities: server_capabilities(),
        server_info: Some(ServerInfo {
            name: String::from(SERVER_NAME),
            version: Some(String::from(env!("CARGO_PKG_VERSION"))),
        }),
    };
    Ok(serde_json::to_value(result)?)
}

fn shutdown(state: &mut WorldState, _: Value) -> anyhow::Result<Value> {
    log::info!("{} shutting down", SERVER_NAME);
    state.advance(ServerPhase::ShuttingDown);
    Ok(Value::Null)
}

fn exit(state: &mut WorldState, _: Value) -> anyhow::Result<()> {
    log::info!("{} received exit", SERVER_NAME);
    state.advance(ServerPhase::ShuttingDown);
    Ok(())
}

fn did_open(state: &mut WorldState, params: Value) -> anyhow::Result<()> {
    let params: DidOpenTextDocumentParams = serde_json::from_value(params)?;
    let doc = params.text_document;
    state.documents.open(doc.uri, doc.version, doc.text);
    Ok(())
}

fn did_change(state: &mut WorldState, params: Value) -> anyhow::Result<()> {
    let params: DidChangeTextDocumentParams = serde_json::from_value(params)?;
    state.documents.change(
        params.text_document.uri,
        params.text_document.version,
        params.content_changes,
    );
    Ok(())
}

fn did_close(state: &mut WorldState, params: Value) -> anyhow::Result<()> {
    let params: DidCloseTextDocumentParams = serde_json::from_value(params)?;
    state.documents.close(&params.text_document.uri);
    Ok(())
}

fn did_change_configuration(state: &mut WorldState, params: Value) -> anyhow::Result<()> {
    let params: DidChangeConfigurationParams = serde_json::from_value(params)?;
    if let Some(config) = parse_server_config(&params.settings) {
        state.config = config;
    }
    Ok(())
}

fn goto_definition(state: &mut WorldState, params: Value) -> anyhow::Result<Value> {
    let params: GotoDefinitionParams = serde_json::from_value(params)?;
    let position = params.text_document_position_params;
    let response =
        handlers::goto_definition(state, &position.text_document.uri, position.position);
    Ok(serde_json::to_value(response)?)
}

fn hover(state: &mut WorldState, params: Value) -> anyhow::Result<Value> {
    let params: HoverParams = serde_json::from_value(params)?;
    let position = params.text_document_position_params;
    let response = handlers::hover(state, &position.text_document.uri, position.position);
    Ok(serde_json::to_value(response)?)
}

pub async fn start_lsp() -> anyhow::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let mut transport = Transport::new(stdin, stdout);
    Backend::new().serve(&mut transport).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URI: &str = "file:///repo/justfile";

    fn request(backend: &mut Backend, id: i64, method: &str, params: Value) -> Value {
        let response = backend
            .handle(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .expect("requests get a reply");
        serde_json::to_value(response).unwrap()
    }

    fn notify(backend: &mut Backend, method: &str, params: Value) {
        assert!(backend
            .handle(json!({"jsonrpc": "2.0", "method": method, "params": params}))
            .is_none());
    }

    fn open(backend: &mut Backend, text: &str) {
        notify(
            backend,
            "textDocument/didOpen",
            json!({"textDocument": {"uri": URI, "languageId": "just", "version": 1, "text": text}}),
        );
    }

    fn position(line: u32, character: u32) -> Value {
        json!({"textDocument": {"uri": URI}, "position": {"line": line, "character": character}})
    }

    #[test]
    fn initialize_advertises_capabilities() {
        let mut backend = Backend::new();
        let reply = request(&mut backend, 1, "initialize", json!({"capabilities": {}}));
        let caps = &reply["result"]["capabilities"];
        assert_eq!(caps["positionEncoding"], "utf-16");
        assert_eq!(caps["textDocumentSync"]["openClose"], true);
        assert_eq!(caps["textDocumentSync"]["change"], 1);
        assert_eq!(caps["definitionProvider"], true);
        assert_eq!(caps["hoverProvider"], true);
        assert_eq!(reply["result"]["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(backend.state().phase(), ServerPhase::Ready);
    }

    #[test]
    fn initialize_reads_initialization_options() {
        let mut backend = Backend::new();
        request(
            &mut backend,
            1,
            "initialize",
            json!({"initializationOptions": {"hover": {"followContext": false}}}),
        );
        assert!(!backend.state().config.hover_follows_context);
    }

    #[test]
    fn did_change_configuration_reloads_settings() {
        let mut backend = Backend::new();
        notify(
            &mut backend,
            "workspace/didChangeConfiguration",
            json!({"settings": {"hover": {"followContext": false}}}),
        );
        assert!(!backend.state().config.hover_follows_context);
        notify(
            &mut backend,
            "workspace/didChangeConfiguration",
            json!({"settings": {"unrelated": true}}),
        );
        assert!(!backend.state().config.hover_follows_context);
    }

    #[test]
    fn shutdown_returns_null_and_moves_phase() {
        let mut backend = Backend::new();
        request(&mut backend, 1, "initialize", json!({}));
        let reply = request(&mut backend, 2, "shutdown", Value::Null);
        assert_eq!(reply["result"], Value::Null);
        assert!(reply.get("error").is_none());
        assert_eq!(backend.state().phase(), ServerPhase::ShuttingDown);
    }

    #[test]
    fn exit_sets_shutting_down() {
        let mut backend = Backend::new();
        notify(&mut backend, "exit", Value::Null);
        assert!(backend.state().is_shutting_down());
    }

    #[test]
    fn document_lifecycle() {
        let mut backend = Backend::new();
        let uri = Url::parse(URI).unwrap();
        open(&mut backend, "a:\n");
        assert!(backend.state().documents.contains(&uri));

        notify(
            &mut backend,
            "textDocument/didChange",
            json!({"textDocument": {"uri": URI, "version": 2}, "contentChanges": [{"text": "b:\n"}]}),
        );
        let doc = backend.state().documents.get(&uri).unwrap();
        assert_eq!(doc.text(), "b:\n");
        assert_eq!(doc.version, 2);

        notify(
            &mut backend,
            "textDocument/didClose",
            json!({"textDocument": {"uri": URI}}),
        );
        assert!(!backend.state().documents.contains(&uri));
    }

    #[test]
    fn empty_change_list_leaves_document_alone() {
        let mut backend = Backend::new();
        let uri = Url::parse(URI).unwrap();
        open(&mut backend, "x := 1\nbuild: x\n");
        let before = backend.state().documents.get(&uri).unwrap().clone();

        notify(
            &mut backend,
            "textDocument/didChange",
            json!({"textDocument": {"uri": URI, "version": 9}, "contentChanges": []}),
        );

        let after = backend.state().documents.get(&uri).unwrap();
        assert_eq!(after.text(), before.text());
        assert_eq!(after.parse(), before.parse());
        assert_eq!(after.index(), before.index());
    }

    #[test]
    fn definition_and_hover_round_trip() {
        let mut backend = Backend::new();
        open(
            &mut backend,
            "greeting := \"hi\"\nbuild: greeting\n\techo {{greeting}}\n",
        );

        let reply = request(&mut backend, 3, "textDocument/definition", position(2, 10));
        assert_eq!(
            reply["result"],
            json!([{
                "uri": URI,
                "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 8}}
            }])
        );

        let reply = request(&mut backend, 4, "textDocument/hover", position(1, 1));
        assert_eq!(reply["result"]["contents"], "recipe: build");
        assert_eq!(
            reply["result"]["range"],
            json!({"start": {"line": 1, "character": 0}, "end": {"line": 1, "character": 5}})
        );
    }

    #[test]
    fn misses_are_null_results() {
        let mut backend = Backend::new();
        let reply = request(&mut backend, 5, "textDocument/definition", position(0, 0));
        assert_eq!(reply["result"], Value::Null);
        assert!(reply.get("error").is_none());

        open(&mut backend, "a:\n");
        let reply = request(&mut backend, 6, "textDocument/hover", position(30, 2));
        assert_eq!(reply["result"], Value::Null);
    }

    #[test]
    fn malformed_params_are_handler_failures() {
        let mut backend = Backend::new();
        let reply = request(&mut backend, 7, "textDocument/hover", json!({"nope": true}));
        assert_eq!(reply["error"]["code"], crate::dispatcher::HANDLER_FAILURE);
        assert!(reply["error"]["data"].is_string());
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let mut backend = Backend::new();
        let reply = serde_json::to_value(backend.handle(json!({"id": 1, "method": "foo"}))).unwrap();
        assert_eq!(reply["error"]["code"], -32601);
    }
}
