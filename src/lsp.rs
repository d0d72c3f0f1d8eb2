//! Language Server Protocol implementation for yaml-assist
//!
//! LSP positions are 0-based; the service works in 1-based lines and
//! columns. Conversion happens only at this boundary.

use crate::completion::{Suggestion, SuggestionKind};
use crate::config::ServerSettings;
use crate::diagnostics::{self, Severity};
use crate::schema::SchemaFormat;
use crate::LanguageService;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};

/// Schema loading state
#[derive(Debug, Clone)]
enum SchemaState {
    /// Load has not finished yet
    Pending,
    Ready(Arc<LanguageService>),
    /// Terminal until the client sends new configuration
    Failed(String),
}

/// yaml-assist Language Server
pub struct YamlAssistServer {
    client: Client,
    document_map: Arc<RwLock<HashMap<Url, String>>>,
    settings: Arc<RwLock<ServerSettings>>,
    workspace_root: Arc<RwLock<Option<PathBuf>>>,
    state: Arc<RwLock<SchemaState>>,
}

impl YamlAssistServer {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            document_map: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(RwLock::new(ServerSettings::default())),
            workspace_root: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(SchemaState::Pending)),
        }
    }

    async fn service(&self) -> Option<Arc<LanguageService>> {
        match &*self.state.read().await {
            SchemaState::Ready(service) => Some(Arc::clone(service)),
            _ => None,
        }
    }

    /// Load (or reload) the configured schema
    async fn load_schema(&self) {
        *self.state.write().await = SchemaState::Pending;

        let settings = self.settings.read().await.clone();
        let Some(schema_path) = settings.schema.clone() else {
            *self.state.write().await = SchemaState::Failed("no schema configured".to_string());
            return;
        };
        let root = self.workspace_root.read().await.clone();
        let schema_path = resolve_schema_path(&schema_path, root.as_deref());

        let state = match read_service(&schema_path, settings).await {
            Ok(service) => {
                info!(schema = %schema_path.display(), "Schema ready");
                SchemaState::Ready(Arc::new(service))
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(schema = %schema_path.display(), error = %reason, "Schema load failed");
                self.client
                    .log_message(MessageType::ERROR, format!("yaml-assist: {reason}"))
                    .await;
                SchemaState::Failed(reason)
            }
        };
        *self.state.write().await = state;
    }

    /// Diagnostics for a document under the current schema state
    async fn get_diagnostics(&self, text: &str) -> Vec<Diagnostic> {
        let state = self.state.read().await.clone();
        let source = self.settings.read().await.service.source.clone();
        let diagnostics = match state {
            SchemaState::Ready(service) => service.validate(text),
            SchemaState::Pending => {
                vec![diagnostics::schema_unavailable("schema is still loading", &source)]
            }
            SchemaState::Failed(reason) => vec![diagnostics::schema_unavailable(&reason, &source)],
        };
        diagnostics.iter().map(to_lsp_diagnostic).collect()
    }

    async fn publish(&self, uri: Url, text: &str) {
        let diagnostics = self.get_diagnostics(text).await;
        self.client.publish_diagnostics(uri, diagnostics, None).await;
    }

    async fn republish_all(&self) {
        let documents: Vec<(Url, String)> = self
            .document_map
            .read()
            .await
            .iter()
            .map(|(uri, text)| (uri.clone(), text.clone()))
            .collect();
        for (uri, text) in documents {
            self.publish(uri, &text).await;
        }
    }

    async fn document(&self, uri: &Url) -> Option<String> {
        self.document_map.read().await.get(uri).cloned()
    }
}

async fn read_service(path: &Path, settings: ServerSettings) -> anyhow::Result<LanguageService> {
    use anyhow::Context;

    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read schema: {}", path.display()))?;
    let format = SchemaFormat::from_path(path).unwrap_or(SchemaFormat::Json);
    LanguageService::from_text(&text, format, settings.service)
}

/// Resolve a configured schema path against the workspace root
fn resolve_schema_path(path: &Path, root: Option<&Path>) -> PathBuf {
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

#[allow(deprecated)]
fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    let uri = params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(params.root_uri.as_ref())?;
    uri.to_file_path().ok()
}

/// LSP position (0-based) to service position (1-based)
fn to_service_position(position: Position) -> crate::Position {
    crate::Position::new(position.line as usize + 1, position.character as usize + 1)
}

fn to_lsp_range(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Range {
    Range {
        start: Position {
            line: start_line.saturating_sub(1) as u32, // LSP is 0-indexed
            character: start_col.saturating_sub(1) as u32,
        },
        end: Position {
            line: end_line.saturating_sub(1) as u32,
            character: end_col.saturating_sub(1) as u32,
        },
    }
}

fn to_lsp_diagnostic(diagnostic: &crate::Diagnostic) -> Diagnostic {
    let severity = match diagnostic.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
    };

    Diagnostic {
        range: to_lsp_range(
            diagnostic.start_line,
            diagnostic.start_col,
            diagnostic.end_line,
            diagnostic.end_col,
        ),
        severity: Some(severity),
        source: Some(diagnostic.source.clone()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

fn to_completion_item(suggestion: Suggestion) -> CompletionItem {
    let kind = match suggestion.kind {
        SuggestionKind::Property => CompletionItemKind::PROPERTY,
        SuggestionKind::Value => CompletionItemKind::VALUE,
        SuggestionKind::EnumMember => CompletionItemKind::ENUM_MEMBER,
    };

    CompletionItem {
        sort_text: Some(format!("{}_{}", suggestion.sort_bucket, suggestion.label)),
        kind: Some(kind),
        documentation: suggestion.documentation.map(Documentation::String),
        insert_text: Some(suggestion.insert_text),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        label: suggestion.label,
        ..Default::default()
    }
}

fn to_lsp_hover(hover: crate::Hover) -> Hover {
    let range = hover.range;
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: hover.markdown(),
        }),
        range: Some(to_lsp_range(
            range.start_line,
            range.start_col,
            range.end_line,
            range.end_col,
        )),
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for YamlAssistServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        *self.workspace_root.write().await = workspace_root(&params);
        *self.settings.write().await = ServerSettings::from_json(params.initialization_options);

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "yaml-assist".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec![":".to_string(), " ".to_string()]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "yaml-assist language server initialized")
            .await;
        self.load_schema().await;
        self.republish_all().await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let text = params.text_document.text;

        self.document_map
            .write()
            .await
            .insert(uri.clone(), text.clone());

        self.publish(uri, &text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;

        // Full sync: the last change carries the whole document
        if let Some(change) = params.content_changes.into_iter().last() {
            let text = change.text;
            self.document_map
                .write()
                .await
                .insert(uri.clone(), text.clone());
            self.publish(uri, &text).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.document_map.write().await.remove(&uri);
        self.client.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        debug!("Configuration changed, reloading schema");
        *self.settings.write().await = ServerSettings::from_json(Some(params.settings));
        self.load_schema().await;
        self.republish_all().await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = to_service_position(params.text_document_position.position);

        let (Some(service), Some(text)) = (self.service().await, self.document(&uri).await) else {
            return Ok(None);
        };

        let items: Vec<CompletionItem> = service
            .complete(&text, position)
            .into_iter()
            .map(to_completion_item)
            .collect();
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = to_service_position(params.text_document_position_params.position);

        let (Some(service), Some(text)) = (self.service().await, self.document(&uri).await) else {
            return Ok(None);
        };

        Ok(service.hover(&text, position).map(to_lsp_hover))
    }
}

/// Run the LSP server
pub async fn run_server() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(YamlAssistServer::new);
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
