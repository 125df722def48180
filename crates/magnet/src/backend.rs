//
// backend.rs
//
// LSP front end: wires editor notifications into the index and answers queries
//

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::LspService;
use tower_lsp::Server;

use crate::cross_file::{IndexConfig, IndexEvent};
use crate::handlers;
use crate::state::WorldState;

pub struct Backend {
    client: Client,
    state: Arc<RwLock<Arc<WorldState>>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(RwLock::new(Arc::new(WorldState::for_workspace(
                None,
                IndexConfig::default(),
                None,
            )))),
        }
    }

    async fn state(&self) -> Arc<WorldState> {
        self.state.read().await.clone()
    }

    async fn publish_diagnostics(&self, uri: &Url) {
        let state = self.state().await;
        publish(&self.client, &state, uri).await;
    }
}

async fn publish(client: &Client, state: &WorldState, uri: &Url) {
    if !state.documents().contains(uri) {
        return;
    }
    let version = state.documents().version(uri);
    let diagnostics = state
        .scheduler()
        .diagnostics()
        .get(uri)
        .iter()
        .map(|d| d.to_lsp())
        .collect();
    client.publish_diagnostics(uri.clone(), diagnostics, version).await;
}

/// Forward index events to the client until the state is dropped.
async fn publish_events(client: Client, state: Weak<WorldState>, mut events: UnboundedReceiver<IndexEvent>) {
    while let Some(event) = events.recv().await {
        let Some(state) = state.upgrade() else {
            break;
        };
        match event {
            IndexEvent::Scanned(uri) => publish(&client, &state, &uri).await,
            IndexEvent::Removed(uri) => {
                client.publish_diagnostics(uri, Vec::new(), None).await;
            }
        }
    }
    log::trace!("Diagnostics publisher stopped");
}

/// Filesystem root for `require` patterns: first workspace folder, else the root URI.
pub fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    #[allow(deprecated)]
    let root_uri = params.root_uri.as_ref();
    params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(root_uri)
        .and_then(|uri| uri.to_file_path().ok())
}

pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::INCREMENTAL),
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(true),
            })),
            ..Default::default()
        })),
        completion_provider: Some(CompletionOptions::default()),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(true)),
        ..Default::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        log::info!("Initializing magnet");

        let config = params
            .initialization_options
            .as_ref()
            .map(IndexConfig::from_settings)
            .unwrap_or_default();
        let root = workspace_root(&params);
        log::info!("Workspace root: {:?}", root);

        let (sender, receiver) = unbounded_channel();
        let state = Arc::new(WorldState::for_workspace(root, config, Some(sender)));
        tokio::spawn(publish_events(
            self.client.clone(),
            Arc::downgrade(&state),
            receiver,
        ));
        *self.state.write().await = state;

        Ok(InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(ServerInfo {
                name: String::from("magnet"),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("magnet initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        log::info!("magnet shutting down");
        crate::perf::log_summary();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let state = self.state().await;
        state.on_document_opened(doc.uri, doc.text, Some(doc.version));
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let state = self.state().await;
        if !state.apply_changes(&uri, params.content_changes, Some(params.text_document.version)) {
            log::warn!("Change for unopened document {}", uri);
            return;
        }
        state.on_document_edited(&uri, None, true);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        let state = self.state().await;
        if let Err(e) = state.on_document_edited(&uri, params.text, false).await {
            log::error!("Rescan of {} after save failed: {}", uri, e);
        }
        self.publish_diagnostics(&uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let state = self.state().await;
        state.on_document_closed(&params.text_document.uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        log::trace!("Configuration changed");
        let config = IndexConfig::from_settings(&params.settings);
        self.state().await.update_config(config);
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let state = self.state().await;
        let position = params.text_document_position_params;
        Ok(handlers::hover(&state, &position.text_document.uri, position.position).await)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let state = self.state().await;
        let position = params.text_document_position_params;
        Ok(handlers::goto_definition(&state, &position.text_document.uri, position.position).await)
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let state = self.state().await;
        let position = params.text_document_position;
        Ok(handlers::completion(&state, &position.text_document.uri, position.position).await)
    }
}

pub async fn start_lsp() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(Backend::new).finish();
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
