//! Request routing and the connection pump.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use rustc_hash::FxHashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::base::ClientId;
use crate::config::ServerConfig;
use crate::index::{PackageInfo, PackageRegistry, SystemInfo, WorkspaceIndex};
use crate::scope::{CrossReference, CrossReferenceContext, ScopeResolver};
use crate::sync::{
    ModelPayload, ModelPersistence, ModelSyncEngine, Notification, NotificationSink,
    SystemUpdateReason, SystemUpdatedEvent,
};

use super::jsonrpc::{
    INVALID_REQUEST, JSONRPC_VERSION, NotificationMessage, PARSE_ERROR, Request, RequestId,
    Response, RpcError,
};

/// Method names.
pub mod methods {
    pub const OPEN: &str = "server/open";
    pub const CLOSE: &str = "server/close";
    pub const REQUEST: &str = "server/request";
    pub const REQUEST_DIAGRAM_NODE: &str = "server/requestModelDiagramNode";
    pub const UPDATE: &str = "server/update";
    pub const SAVE: &str = "server/save";
    pub const UNDO: &str = "server/undo";
    pub const REDO: &str = "server/redo";
    pub const COMPLETE: &str = "server/complete";
    pub const RESOLVE: &str = "server/resolve";
    pub const SYSTEMS: &str = "server/systems";
    pub const SYSTEM: &str = "server/system";
}

// ============================================================================
// PARAMS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenParams {
    uri: String,
    client_id: String,
    #[allow(dead_code)]
    #[serde(default)]
    language_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientModelParams {
    uri: String,
    client_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    uri: String,
    client_id: String,
    model: ModelPayload,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UriParams {
    Uri(String),
    Object { uri: String },
}

impl UriParams {
    fn into_uri(self) -> String {
        match self {
            UriParams::Uri(uri) | UriParams::Object { uri } => uri,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiagramNodeParams {
    uri: String,
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemParams {
    context_uri: String,
}

/// Decode request params. A single positional param stands for the whole
/// params object.
fn parse_params<T: DeserializeOwned>(request: &Request) -> Result<T, RpcError> {
    let params = match request.params.clone() {
        Some(Value::Array(mut items)) if items.len() == 1 => items.remove(0),
        Some(params) => params,
        None => Value::Null,
    };
    serde_json::from_value(params).map_err(|e| {
        RpcError::invalid_params(format!("invalid params for {}: {}", request.method, e))
    })
}

fn to_result(value: impl Serialize) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

// ============================================================================
// CONNECTION
// ============================================================================

/// One client channel to the gateway.
///
/// Every client id used on the connection is bound to its notification
/// sink, so a transport that multiplexes several editors gets all their
/// notifications.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    sink: NotificationSink,
    clients: Mutex<IndexSet<ClientId>>,
}

impl Connection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Client ids bound to this connection.
    pub fn clients(&self) -> Vec<ClientId> {
        self.clients.lock().iter().cloned().collect()
    }

    fn bind(&self, engine: &ModelSyncEngine, client_id: &str) {
        let mut clients = self.clients.lock();
        if clients.contains(client_id) {
            return;
        }
        let client_id: ClientId = Arc::from(client_id);
        engine.connect(client_id.clone(), self.sink.clone());
        clients.insert(client_id);
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

/// Exposes the index, scope resolver and synchronization engine as JSON-RPC.
#[derive(Debug)]
pub struct Gateway {
    index: Arc<WorkspaceIndex>,
    engine: Arc<ModelSyncEngine>,
    resolver: ScopeResolver,
    connections: RwLock<IndexMap<Uuid, NotificationSink>>,
}

impl Gateway {
    pub fn new(engine: Arc<ModelSyncEngine>) -> Self {
        let index = engine.index().clone();
        Self {
            resolver: ScopeResolver::new(index.clone()),
            index,
            engine,
            connections: RwLock::new(IndexMap::new()),
        }
    }

    /// Build the whole service from configuration.
    pub fn from_config(config: &ServerConfig, persistence: Arc<dyn ModelPersistence>) -> Self {
        let packages = PackageRegistry::new(config.fallback_package.as_str());
        let index = Arc::new(WorkspaceIndex::with_packages(packages));
        for system in &config.systems {
            index.register_package(system.to_package());
        }
        let engine = ModelSyncEngine::new(index, persistence).with_undo_limit(config.undo_limit);
        Self::new(Arc::new(engine))
    }

    pub fn index(&self) -> &Arc<WorkspaceIndex> {
        &self.index
    }

    pub fn engine(&self) -> &Arc<ModelSyncEngine> {
        &self.engine
    }

    pub fn resolver(&self) -> &ScopeResolver {
        &self.resolver
    }

    /// Open a connection. Notifications for it arrive on the returned receiver.
    pub fn connect(&self) -> (Connection, mpsc::UnboundedReceiver<Notification>) {
        let (sink, receiver) = mpsc::unbounded_channel();
        let connection = Connection {
            id: Uuid::new_v4(),
            sink: sink.clone(),
            clients: Mutex::new(IndexSet::new()),
        };
        self.connections.write().insert(connection.id, sink);
        tracing::debug!("connection {} opened", connection.id);
        (connection, receiver)
    }

    /// Close a connection and disconnect every client bound to it.
    pub async fn disconnect(&self, connection: &Connection) {
        self.connections.write().shift_remove(&connection.id);
        for client_id in connection.clients() {
            self.engine.disconnect(&client_id).await;
        }
        tracing::debug!("connection {} closed", connection.id);
    }

    // ========================================================================
    // SYSTEMS
    // ========================================================================

    /// Register a package and tell every connection about it.
    pub fn add_system(&self, package: PackageInfo) -> SystemInfo {
        self.index.register_package(package.clone());
        let system = self.index.system_info(&package);
        self.broadcast(Notification::SystemUpdated(SystemUpdatedEvent {
            system: system.clone(),
            reason: SystemUpdateReason::Added,
        }));
        system
    }

    pub fn remove_system(&self, id: &str) -> Option<SystemInfo> {
        let package = self.index.packages().get(id)?;
        let system = self.index.system_info(&package);
        self.index.unregister_package(id);
        self.broadcast(Notification::SystemUpdated(SystemUpdatedEvent {
            system: system.clone(),
            reason: SystemUpdateReason::Removed,
        }));
        Some(system)
    }

    fn broadcast(&self, notification: Notification) {
        for (id, sink) in self.connections.read().iter() {
            if sink.send(notification.clone()).is_err() {
                tracing::trace!("connection {} no longer receives notifications", id);
            }
        }
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    /// Decode and handle one message. Returns the response to send, if any.
    pub async fn handle_message(&self, connection: &Connection, text: &str) -> Option<Response> {
        match decode(text) {
            Ok(request) => self.dispatch(connection, request).await,
            Err(response) => Some(*response),
        }
    }

    /// Handle a request. Requests without an id get no response.
    pub async fn dispatch(&self, connection: &Connection, request: Request) -> Option<Response> {
        tracing::debug!("{} on connection {}", request.method, connection.id);
        let result = self.call(connection, &request).await;
        if let Err(error) = &result {
            tracing::debug!("{} failed: {}", request.method, error.message);
        }
        request.id.map(|id| Response::from_result(id, result))
    }

    async fn call(&self, connection: &Connection, request: &Request) -> Result<Value, RpcError> {
        match request.method.as_str() {
            methods::OPEN => {
                let params: OpenParams = parse_params(request)?;
                connection.bind(&self.engine, &params.client_id);
                to_result(self.engine.open(&params.uri, &params.client_id).await?)
            }
            methods::CLOSE => {
                let params: ClientModelParams = parse_params(request)?;
                self.engine.close(&params.uri, &params.client_id).await;
                Ok(Value::Null)
            }
            methods::REQUEST => {
                let params: UriParams = parse_params(request)?;
                to_result(self.engine.request(&params.into_uri()))
            }
            methods::REQUEST_DIAGRAM_NODE => {
                let params: DiagramNodeParams = parse_params(request)?;
                to_result(self.engine.request_diagram_node(&params.uri, &params.id))
            }
            methods::UPDATE => {
                let params: UpdateParams = parse_params(request)?;
                connection.bind(&self.engine, &params.client_id);
                let model = self
                    .engine
                    .update(&params.uri, &params.client_id, params.model)
                    .await?;
                to_result(model)
            }
            methods::SAVE => {
                let params: UpdateParams = parse_params(request)?;
                connection.bind(&self.engine, &params.client_id);
                self.engine
                    .save(&params.uri, &params.client_id, params.model)
                    .await?;
                Ok(Value::Null)
            }
            methods::UNDO | methods::REDO => {
                let params: ClientModelParams = parse_params(request)?;
                connection.bind(&self.engine, &params.client_id);
                let model = if request.method == methods::UNDO {
                    self.engine.undo(&params.uri, &params.client_id).await?
                } else {
                    self.engine.redo(&params.uri, &params.client_id).await?
                };
                to_result(model)
            }
            methods::COMPLETE => {
                let context: CrossReferenceContext = parse_params(request)?;
                to_result(self.resolver.complete(&context))
            }
            methods::RESOLVE => {
                let reference: CrossReference = parse_params(request)?;
                to_result(self.resolver.resolve_reference(&reference))
            }
            methods::SYSTEMS => to_result(self.index.systems()),
            methods::SYSTEM => {
                let params: SystemParams = parse_params(request)?;
                to_result(self.index.system(&params.context_uri))
            }
            method => Err(RpcError::method_not_found(method)),
        }
    }

    // ========================================================================
    // TRANSPORT
    // ========================================================================

    /// Serve one connection speaking newline-delimited JSON.
    ///
    /// Requests run concurrently, except that requests naming the same
    /// `uri` run and are answered in the order they were read. Responses
    /// and notifications are interleaved on `writer`. At end of input the
    /// requests still running are answered, then every client bound to the
    /// connection is disconnected.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (connection, mut notifications) = self.connect();
        let connection = Arc::new(connection);
        let (responder, mut responses) = mpsc::unbounded_channel();
        // Dropped at end of input; `responses` then ends with the last task.
        let mut responder = Some(responder);
        let mut queues = UriQueues::default();
        let mut in_flight = JoinSet::new();
        let mut lines = reader.lines();
        let result = loop {
            tokio::select! {
                biased;
                response = responses.recv() => match response {
                    Some(response) => {
                        if let Err(err) = write_json(&mut writer, &response).await {
                            break Err(err);
                        }
                    }
                    None => break Ok(()),
                },
                Some(notification) = notifications.recv() => {
                    if let Err(err) = write_notification(&mut writer, &notification).await {
                        break Err(err);
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(err) = joined {
                        tracing::warn!("request on connection {} failed: {}", connection.id, err);
                    }
                }
                line = lines.next_line(), if responder.is_some() => match line {
                    Ok(Some(line)) => {
                        let Some(responder) = responder.as_ref() else {
                            continue;
                        };
                        if line.trim().is_empty() {
                            continue;
                        }
                        match decode(&line) {
                            Ok(request) => {
                                let after = request_uri(&request).map(|uri| queues.enqueue(uri));
                                let task = Arc::clone(&self).answer(
                                    Arc::clone(&connection),
                                    request,
                                    after,
                                    responder.clone(),
                                );
                                in_flight.spawn(task);
                            }
                            Err(response) => {
                                if let Err(err) = write_json(&mut writer, &response).await {
                                    break Err(err);
                                }
                            }
                        }
                    }
                    Ok(None) => responder = None,
                    Err(err) => break Err(err),
                },
            }
        };
        in_flight.abort_all();
        self.disconnect(&connection).await;
        result
    }

    /// Run one request once its predecessor on the same uri is answered.
    async fn answer(
        self: Arc<Self>,
        connection: Arc<Connection>,
        request: Request,
        after: Option<(Option<oneshot::Receiver<()>>, oneshot::Sender<()>)>,
        responder: mpsc::UnboundedSender<Response>,
    ) {
        let (previous, done) = after.unzip();
        if let Some(previous) = previous.flatten() {
            // An error only means the predecessor is gone.
            let _ = previous.await;
        }
        if let Some(response) = self.dispatch(&connection, request).await {
            if responder.send(response).is_err() {
                tracing::trace!("connection {} closed before a response", connection.id);
            }
        }
        if let Some(done) = done {
            let _ = done.send(());
        }
    }
}

/// Decode one message into a request, or the error response for it.
fn decode(text: &str) -> Result<Request, Box<Response>> {
    let request = serde_json::from_str::<Request>(text).map_err(|error| {
        Box::new(Response::error(
            RequestId::Null,
            RpcError::new(PARSE_ERROR, "Parse error")
                .with_data(json!({ "reason": error.to_string() })),
        ))
    })?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(Box::new(Response::error(
            request.id.unwrap_or(RequestId::Null),
            RpcError::new(INVALID_REQUEST, "Invalid Request"),
        )));
    }
    Ok(request)
}

/// The model a request addresses: its `uri` param or a bare uri.
fn request_uri(request: &Request) -> Option<String> {
    let params = match request.params.as_ref()? {
        Value::Array(items) if items.len() == 1 => &items[0],
        params => params,
    };
    match params {
        Value::String(uri) => Some(uri.clone()),
        Value::Object(fields) => fields.get("uri")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Per-uri request order on one connection.
///
/// Holds the completion signal of the last request read for each uri.
#[derive(Debug, Default)]
struct UriQueues {
    tails: FxHashMap<String, oneshot::Receiver<()>>,
}

impl UriQueues {
    /// Queue a request on `uri`. Returns the signal to wait for, if a
    /// request on `uri` is still running, and the signal to fire when this
    /// one is answered.
    fn enqueue(&mut self, uri: String) -> (Option<oneshot::Receiver<()>>, oneshot::Sender<()>) {
        self.tails
            .retain(|_, tail| matches!(tail.try_recv(), Err(TryRecvError::Empty)));
        let (done, tail) = oneshot::channel();
        (self.tails.insert(uri, tail), done)
    }
}

async fn write_notification<W>(writer: &mut W, notification: &Notification) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let params = notification.params().map_err(std::io::Error::other)?;
    write_json(writer, &NotificationMessage::new(notification.method(), params)).await
}

async fn write_json<W>(writer: &mut W, message: &impl Serialize) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(message).map_err(std::io::Error::other)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
