//
// dispatcher.rs
//
// Routes decoded JSON-RPC messages to registered request and notification
// handlers
//

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tower_lsp::jsonrpc::{Error, ErrorCode, Id, Response};

/// JSON-RPC code for a handler that returned an error
pub const HANDLER_FAILURE: i64 = -32000;

type RequestHandler<S> = Box<dyn Fn(&mut S, Value) -> anyhow::Result<Value>>;
type NotificationHandler<S> = Box<dyn Fn(&mut S, Value) -> anyhow::Result<()>>;

/// The parts of a JSON-RPC envelope the dispatcher looks at
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<Id>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

/// Method-name routing over server state `S`.
///
/// Requests and notifications live in separate maps, so the same method name
/// may be registered once in each.
pub struct Dispatcher<S> {
    requests: HashMap<String, RequestHandler<S>>,
    notifications: HashMap<String, NotificationHandler<S>>,
}

impl<S> Default for Dispatcher<S> {
    fn default() -> Self {
        Self {
            requests: HashMap::new(),
            notifications: HashMap::new(),
        }
    }
}

impl<S> Dispatcher<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request handler. Replaces any handler already registered
    /// for `method`.
    pub fn on_request<F>(&mut self, method: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut S, Value) -> anyhow::Result<Value> + 'static,
    {
        if self
            .requests
            .insert(method.to_string(), Box::new(handler))
            .is_some()
        {
            log::debug!("Replaced request handler for {}", method);
        }
        self
    }

    /// Register a notification handler. Replaces any handler already
    /// registered for `method`.
    pub fn on_notification<F>(&mut self, method: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut S, Value) -> anyhow::Result<()> + 'static,
    {
        if self
            .notifications
            .insert(method.to_string(), Box::new(handler))
            .is_some()
        {
            log::debug!("Replaced notification handler for {}", method);
        }
        self
    }

    pub fn has_request(&self, method: &str) -> bool {
        self.requests.contains_key(method)
    }

    pub fn has_notification(&self, method: &str) -> bool {
        self.notifications.contains_key(method)
    }

    /// Route one decoded message. Returns the reply for requests and `None`
    /// for notifications.
    pub fn dispatch(&self, state: &mut S, message: Value) -> Option<Response> {
        let envelope: Envelope = match serde_json::from_value(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!("Message is not a JSON-RPC envelope: {}", e);
                return Some(Response::from_error(Id::Null, Error::invalid_request()));
            }
        };

        let Some(method) = envelope.method else {
            log::debug!("Dropping message without a method (id {:?})", envelope.id);
            return None;
        };

        match envelope.id {
            Some(id) => Some(self.handle_request(state, id, &method, envelope.params)),
            None => {
                self.handle_notification(state, &method, envelope.params);
                None
            }
        }
    }

    fn handle_request(&self, state: &mut S, id: Id, method: &str, params: Value) -> Response {
        let Some(handler) = self.requests.get(method) else {
            log::debug!("No request handler for {}", method);
            return Response::from_error(id, Error::method_not_found());
        };

        match handler(state, params) {
            Ok(result) => Response::from_ok(id, result),
            Err(err) => {
                log::warn!("Request {} failed: {:#}", method, err);
                Response::from_error(id, handler_failure(&err))
            }
        }
    }

    fn handle_notification(&self, state: &mut S, method: &str, params: Value) {
        let Some(handler) = self.notifications.get(method) else {
            log::debug!("Ignoring notification {}", method);
            return;
        };

        if let Err(err) = handler(state, params) {
            log::warn!("Notification {} failed: {:#}", method, err);
        }
    }
}

fn handler_failure(err: &anyhow::Error) -> Error {
    Error {
        code: ErrorCode::ServerError(HANDLER_FAILURE),
        message: "Request handler failed".into(),
        data: Some(Value::String(format!("{err:#}"))),
    }
}
