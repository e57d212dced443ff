//! The client facade: remote function calls, RPCs, and state
//! subscriptions on top of one managed socket.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hfn_protocol::MessagePayload;
use hfn_schema::{Model, RpcDescriptor, Schema, SchemaIndex};
use hfn_transport::{Connector, WebSocketConnector};
use hfn_wire::{encode, Value};
use tokio::sync::{broadcast, mpsc, watch};

use crate::cookie::CookieJar;
use crate::rpc::RpcCorrelator;
use crate::socket::{self, SocketConfig, SocketEvent, SocketHandle};
use crate::storage::{MemoryStorage, Storage};
use crate::{util, HfnError};

const CID_KEY: &str = "CID";
const COOKIES_KEY: &str = "COOKIES";
const STATE_CHANNEL_CAPACITY: usize = 64;

/// A pushed state update for one module.
#[derive(Debug, Clone)]
pub struct StateChange {
    /// The owning package.
    pub package_id: u32,
    /// The module whose state changed.
    pub module_id: u32,
    /// The module's name.
    pub module: String,
    /// The new state, decoded against the module's state schema.
    pub state: Model,
}

/// Client construction options.
pub struct ClientOptions {
    /// Where the client id and cookie jar persist. Defaults to
    /// process-local memory.
    pub storage: Arc<dyn Storage>,
    /// Default RPC deadline.
    pub rpc_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            rpc_timeout: Duration::from_secs(60),
        }
    }
}

/// A connected HyperFunction client.
///
/// Cheap to share: all methods take `&self`, and the underlying socket
/// task owns the connection.
pub struct HfnClient {
    index: Arc<SchemaIndex>,
    storage: Arc<dyn Storage>,
    prefix: String,
    socket: SocketHandle,
    correlator: Arc<Mutex<RpcCorrelator>>,
    cookies: Arc<Mutex<CookieJar>>,
    state_tx: broadcast::Sender<StateChange>,
    ready_rx: watch::Receiver<bool>,
    rpc_timeout: Duration,
}

impl HfnClient {
    /// Connects over WebSocket using the application's configuration
    /// payload (the positional JSON form).
    pub fn connect(
        config_json: &str,
        options: ClientOptions,
    ) -> Result<Self, HfnError> {
        Self::connect_with(WebSocketConnector, config_json, options)
    }

    /// Connects through a custom [`Connector`]. The connection is
    /// established in the background; await [`HfnClient::ready`] to block
    /// until it is usable.
    pub fn connect_with<C: Connector>(
        connector: C,
        config_json: &str,
        options: ClientOptions,
    ) -> Result<Self, HfnError> {
        let index = Arc::new(SchemaIndex::from_json(config_json)?);
        let storage = options.storage;
        let prefix = format!("_HFN_{}_", index.app_id());

        let client_id = match storage.get(&format!("{prefix}{CID_KEY}")) {
            Some(cid) if !cid.is_empty() => cid,
            _ => {
                let cid = util::unique_id();
                storage.set(&format!("{prefix}{CID_KEY}"), &cid);
                cid
            }
        };

        let now = util::now_ms();
        let cookies = match storage.get(&format!("{prefix}{COOKIES_KEY}")) {
            Some(json) => CookieJar::from_json(&json, now),
            None => CookieJar::new(),
        };
        storage.set(&format!("{prefix}{COOKIES_KEY}"), &cookies.to_json());
        let cookies = Arc::new(Mutex::new(cookies));

        let config = SocketConfig {
            app_id: index.app_id().to_owned(),
            client_id,
            runway: index.runway().map(str::to_owned),
            towers: index.towers().to_vec(),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let socket = socket::spawn(connector, config, event_tx);

        let correlator = Arc::new(Mutex::new(RpcCorrelator::new()));
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = watch::channel(false);

        tokio::spawn(dispatch(
            event_rx,
            index.clone(),
            correlator.clone(),
            cookies.clone(),
            storage.clone(),
            prefix.clone(),
            state_tx.clone(),
            ready_tx,
        ));

        Ok(Self {
            index,
            storage,
            prefix,
            socket,
            correlator,
            cookies,
            state_tx,
            ready_rx,
            rpc_timeout: options.rpc_timeout,
        })
    }

    /// The parsed schema index.
    pub fn index(&self) -> &Arc<SchemaIndex> {
        &self.index
    }

    /// Whether the connection is currently open.
    pub fn is_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Waits until the connection is open. Returns an error if the
    /// socket gave up reconnecting.
    pub async fn ready(&self) -> Result<(), HfnError> {
        let mut rx = self.ready_rx.clone();
        rx.wait_for(|ready| *ready)
            .await
            .map_err(|_| HfnError::ConnectionClosed)?;
        Ok(())
    }

    /// Calls a remote function by its dotted name, fire-and-forget. The
    /// payload is validated against the function's request schema.
    pub async fn hfn(
        &self,
        name: &str,
        payload: Option<&Value>,
    ) -> Result<(), HfnError> {
        self.ready().await?;
        let desc = self
            .index
            .hfn(name)
            .ok_or_else(|| HfnError::HfnNotFound(name.to_owned()))?
            .clone();
        let data = self.encode_payload(&desc.schema, payload)?;
        self.call_function(desc.package_id, desc.module_id, desc.id, data);
        Ok(())
    }

    /// Like [`HfnClient::hfn`] with an already-built [`Model`] payload.
    pub async fn hfn_model(
        &self,
        name: &str,
        model: &Model,
    ) -> Result<(), HfnError> {
        self.ready().await?;
        let desc = self
            .index
            .hfn(name)
            .ok_or_else(|| HfnError::HfnNotFound(name.to_owned()))?
            .clone();
        self.call_function(
            desc.package_id,
            desc.module_id,
            desc.id,
            Some(model.encode()),
        );
        Ok(())
    }

    /// Calls a named RPC and waits for its response, decoded against the
    /// RPC's response schema. Times out after the client default.
    pub async fn rpc(
        &self,
        name: &str,
        payload: Option<&Value>,
    ) -> Result<Model, HfnError> {
        self.rpc_with_timeout(name, payload, self.rpc_timeout).await
    }

    /// [`HfnClient::rpc`] with an explicit deadline.
    pub async fn rpc_with_timeout(
        &self,
        name: &str,
        payload: Option<&Value>,
        timeout: Duration,
    ) -> Result<Model, HfnError> {
        self.ready().await?;
        let desc = self
            .index
            .rpc(name)
            .ok_or_else(|| HfnError::RpcNotFound(name.to_owned()))?
            .clone();
        let data = self.encode_payload(&desc.request, payload)?;
        self.rpc_inner(&desc, data, timeout).await
    }

    /// [`HfnClient::rpc`] with an already-built [`Model`] payload.
    pub async fn rpc_model(
        &self,
        name: &str,
        model: &Model,
    ) -> Result<Model, HfnError> {
        self.ready().await?;
        let desc = self
            .index
            .rpc(name)
            .ok_or_else(|| HfnError::RpcNotFound(name.to_owned()))?
            .clone();
        self.rpc_inner(&desc, Some(model.encode()), self.rpc_timeout)
            .await
    }

    /// Creates an empty [`Model`] for a named model descriptor.
    pub fn model(&self, name: &str) -> Result<Model, HfnError> {
        let desc = self
            .index
            .model(name)
            .ok_or_else(|| HfnError::ModelNotFound(name.to_owned()))?;
        Ok(Model::new(desc.schema.clone(), self.index.clone()))
    }

    /// Subscribes to pushed state updates. Slow subscribers lose the
    /// oldest updates first.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Closes the connection and stops the socket task.
    pub fn close(&self) {
        self.socket.close();
    }

    async fn rpc_inner(
        &self,
        desc: &RpcDescriptor,
        data: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<Model, HfnError> {
        let cookies = self.cookie_bytes(desc.package_id);
        let (ack_id, response) = lock(&self.correlator).register();

        let request = MessagePayload::RpcRequest {
            rpc_id: desc.id,
            ack_id,
            cookies,
            payload: data,
        };
        self.socket.send(desc.package_id, Vec::new(), &request);

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(payload)) => {
                let mut model =
                    Model::new(desc.response.clone(), self.index.clone());
                if let Some(bytes) = payload {
                    if let Err(error) = model.decode(&bytes) {
                        tracing::warn!(
                            rpc = %desc.name,
                            %error,
                            "rpc response decoded partially"
                        );
                    }
                }
                Ok(model)
            }
            Ok(Err(_)) => Err(HfnError::ConnectionClosed),
            Err(_) => {
                lock(&self.correlator).forget(ack_id);
                Err(HfnError::RpcTimeout(timeout))
            }
        }
    }

    fn call_function(
        &self,
        package_id: u32,
        module_id: u32,
        function_id: u32,
        data: Option<Vec<u8>>,
    ) {
        let message = MessagePayload::CallFunction {
            module_id,
            function_id,
            cookies: self.cookie_bytes(package_id),
            payload: data,
        };
        self.socket.send(package_id, Vec::new(), &message);
    }

    fn encode_payload(
        &self,
        schema: &Arc<Schema>,
        payload: Option<&Value>,
    ) -> Result<Option<Vec<u8>>, HfnError> {
        let Some(obj) = payload else {
            return Ok(None);
        };
        let mut model = Model::new(schema.clone(), self.index.clone());
        model.from_object(obj)?;
        Ok(Some(model.encode()))
    }

    /// Wire-encoded `[name, value]` cookie pairs applicable to a call
    /// into `package_id`, or `None` when there are none.
    fn cookie_bytes(&self, package_id: u32) -> Option<Vec<u8>> {
        let pairs =
            lock(&self.cookies).for_package(package_id as i64, util::now_ms());
        if pairs.is_empty() {
            return None;
        }
        let value = Value::List(
            pairs
                .into_iter()
                .map(|(name, value)| {
                    Value::List(vec![Value::Str(name), Value::Str(value)])
                })
                .collect(),
        );
        Some(encode(&value))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[allow(clippy::too_many_arguments)]
async fn dispatch(
    mut events: mpsc::UnboundedReceiver<SocketEvent>,
    index: Arc<SchemaIndex>,
    correlator: Arc<Mutex<RpcCorrelator>>,
    cookies: Arc<Mutex<CookieJar>>,
    storage: Arc<dyn Storage>,
    prefix: String,
    state_tx: broadcast::Sender<StateChange>,
    ready_tx: watch::Sender<bool>,
) {
    while let Some(event) = events.recv().await {
        match event {
            SocketEvent::Open => {
                let _ = ready_tx.send(true);
            }
            SocketEvent::Disconnected { reason } => {
                tracing::debug!(%reason, "socket disconnected");
                let _ = ready_tx.send(false);
                // Pending RPCs stay registered: each one keeps waiting
                // for its own deadline rather than failing eagerly.
            }
            SocketEvent::GaveUp => {
                let _ = ready_tx.send(false);
                return;
            }
            SocketEvent::Message {
                package_id,
                payload,
            } => handle_message(
                package_id,
                payload,
                &index,
                &correlator,
                &cookies,
                storage.as_ref(),
                &prefix,
                &state_tx,
            ),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_message(
    package_id: u32,
    payload: MessagePayload,
    index: &Arc<SchemaIndex>,
    correlator: &Arc<Mutex<RpcCorrelator>>,
    cookies: &Arc<Mutex<CookieJar>>,
    storage: &dyn Storage,
    prefix: &str,
    state_tx: &broadcast::Sender<StateChange>,
) {
    match payload {
        MessagePayload::SetState {
            package_id,
            module_id,
            payload,
        } => {
            let Some(schema) = index.state_schema(package_id, module_id)
            else {
                tracing::warn!(
                    package_id,
                    module_id,
                    "state update for unknown module"
                );
                return;
            };
            let mut state = Model::new(schema, index.clone());
            if let Err(error) = state.decode(&payload) {
                tracing::warn!(%error, "state decoded partially");
            }
            let module = index
                .module_name(package_id, module_id)
                .unwrap_or_default()
                .to_owned();
            let _ = state_tx.send(StateChange {
                package_id,
                module_id,
                module,
                state,
            });
        }
        MessagePayload::SetCookie {
            name,
            value,
            max_age,
            is_private,
        } => {
            let json = {
                let mut jar = lock(cookies);
                jar.set(
                    package_id as i64,
                    &name,
                    &value,
                    max_age,
                    is_private,
                    util::now_ms(),
                );
                jar.to_json()
            };
            storage.set(&format!("{prefix}{COOKIES_KEY}"), &json);
        }
        MessagePayload::RpcResponse {
            ack_id, payload, ..
        } => {
            lock(correlator).resolve(ack_id, payload);
        }
        other => {
            tracing::debug!(
                package_id,
                tag = other.tag(),
                "ignoring unhandled inbound message"
            );
        }
    }
}
