use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::{BearerBackend, XmmBackend};
use crate::bearer::Bearer;
use crate::channel::CommandChannel;
use crate::charset::{Charset, CharsetEncoder};
use crate::error::BearerError;
use crate::types::BearerConfig;

/// A network data port and the hardware descriptor it was probed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPort {
    name: String,
    properties: HashMap<String, String>,
}

impl DataPort {
    pub fn new(name: impl Into<String>) -> Self {
        DataPort {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// A sub-interface index; `None` when absent or not a non-negative number.
    pub fn property_as_index(&self, key: &str) -> Option<u32> {
        self.property(key)?.trim().parse().ok()
    }
}

/// The ports of one modem plus the backend its bearers use.
pub struct Modem {
    primary: Arc<dyn CommandChannel>,
    secondary: Option<Arc<dyn CommandChannel>>,
    data_ports: Vec<Arc<DataPort>>,
    charset: Arc<dyn CharsetEncoder>,
    backend: Arc<dyn BearerBackend>,
    active_cids: Mutex<HashSet<u32>>,
}

impl Modem {
    pub fn new(primary: Arc<dyn CommandChannel>) -> Self {
        Modem {
            primary,
            secondary: None,
            data_ports: Vec::new(),
            charset: Arc::new(Charset::default()),
            backend: Arc::new(XmmBackend),
            active_cids: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn CommandChannel>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_data_port(mut self, port: DataPort) -> Self {
        self.data_ports.push(Arc::new(port));
        self
    }

    pub fn with_charset(mut self, charset: impl CharsetEncoder + 'static) -> Self {
        self.charset = Arc::new(charset);
        self
    }

    pub fn with_backend(mut self, backend: impl BearerBackend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    pub fn primary(&self) -> &Arc<dyn CommandChannel> {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&Arc<dyn CommandChannel>> {
        self.secondary.as_ref()
    }

    pub fn charset(&self) -> &Arc<dyn CharsetEncoder> {
        &self.charset
    }

    pub fn backend(&self) -> &Arc<dyn BearerBackend> {
        &self.backend
    }

    pub fn best_data_port(&self) -> Option<Arc<DataPort>> {
        self.data_ports.first().cloned()
    }

    /// Creates a bearer for `config.cid`. A cid may back one live bearer at a
    /// time.
    pub fn create_bearer(self: &Arc<Self>, config: BearerConfig) -> Result<Arc<Bearer>, BearerError> {
        if config.cid == 0 {
            return Err(BearerError::InvalidArgs("context id must be 1 or greater".into()));
        }

        let mut cids = self.active_cids.lock().unwrap_or_else(PoisonError::into_inner);
        if !cids.insert(config.cid) {
            return Err(BearerError::WrongState(format!(
                "context id {} is already used by another bearer",
                config.cid
            )));
        }
        drop(cids);

        let bearer = Arc::new(Bearer::new(Arc::clone(self), config));
        tracing::debug!(id = %bearer.id(), cid = bearer.config().cid, "new XMM bearer created");
        Ok(bearer)
    }

    pub(crate) fn release_cid(&self, cid: u32) {
        self.active_cids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&cid);
    }
}
