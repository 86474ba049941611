//! Shared application state: validated config, the method registry, and the
//! request/reply context used by HTTP round trips.

use std::sync::Arc;

use rpcwire_core::{Result, RpcWireError};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::services::{AddMethod, MulMethod, NowMethod, PingMethod, ShutdownMethod, SubscribeMethod};
use crate::session::{ConnectionCtx, ShutdownSignal};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    dispatcher: Arc<Dispatcher>,
}

struct AppStateInner {
    cfg: ServerConfig,
    http_conn: ConnectionCtx,
}

impl AppState {
    /// Validate `cfg` and register the built-in methods.
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        cfg.validate()?;

        let dispatcher = Dispatcher::new();
        dispatcher.register(Arc::new(PingMethod::new()));
        dispatcher.register(Arc::new(AddMethod::new()));
        dispatcher.register(Arc::new(MulMethod::new()));
        dispatcher.register(Arc::new(NowMethod::new()));
        dispatcher.register(Arc::new(SubscribeMethod::new(&cfg.subscription)));
        dispatcher.register(Arc::new(ShutdownMethod::new()));

        let mut methods = dispatcher.registered_methods();
        if methods.is_empty() {
            return Err(RpcWireError::Internal("no methods registered".into()));
        }
        methods.sort_unstable();
        tracing::debug!(?methods, "methods registered");

        let http_conn = ConnectionCtx::request_reply(ShutdownSignal::new());
        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, http_conn }),
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn cfg(&self) -> &ServerConfig {
        &self.inner.cfg
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Context shared by every HTTP round trip.
    pub fn http_conn(&self) -> &ConnectionCtx {
        &self.inner.http_conn
    }
}
