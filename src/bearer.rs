use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::BearerError;
use crate::modem::{DataPort, Modem};
use crate::types::{BearerConfig, BearerStatus, ConnectResult};

struct BearerState {
    status: BearerStatus,
    busy: bool,
    connection: Option<ConnectResult>,
    cancel: Option<CancellationToken>,
}

/// A packet data session on one context id of a modem.
///
/// Connect, get-IP-config and disconnect are single-flight: a request made
/// while another one runs fails with [`BearerError::WrongState`].
pub struct Bearer {
    id: Uuid,
    modem: Arc<Modem>,
    config: BearerConfig,
    state: Mutex<BearerState>,
}

/// Holds the busy flag for one operation and puts things back on every exit
/// path unless [`OperationGuard::complete`] ran.
struct OperationGuard<'a> {
    bearer: &'a Bearer,
    restore: Option<BearerStatus>,
}

impl OperationGuard<'_> {
    fn complete(mut self, status: BearerStatus, connection: Option<ConnectResult>) {
        {
            let mut state = self.bearer.lock();
            state.status = status;
            state.connection = connection;
        }
        self.restore = None;
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.bearer.lock();
        state.busy = false;
        state.cancel = None;
        if let Some(status) = self.restore.take() {
            state.status = status;
        }
    }
}

impl Bearer {
    pub(crate) fn new(modem: Arc<Modem>, config: BearerConfig) -> Self {
        Bearer {
            id: Uuid::new_v4(),
            modem,
            config,
            state: Mutex::new(BearerState {
                status: BearerStatus::Disconnected,
                busy: false,
                connection: None,
                cancel: None,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &BearerConfig {
        &self.config
    }

    pub fn status(&self) -> BearerStatus {
        self.lock().status
    }

    /// Configuration found by the last successful connect or get-IP-config.
    pub fn connection(&self) -> Option<ConnectResult> {
        self.lock().connection.clone()
    }

    /// Asks the running operation to stop at its next step boundary.
    pub fn cancel(&self) {
        if let Some(cancel) = &self.lock().cancel {
            cancel.cancel();
        }
    }

    fn lock(&self) -> MutexGuard<'_, BearerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(
        &self,
        operation: &str,
        required: BearerStatus,
        transitional: BearerStatus,
        cancel: CancellationToken,
    ) -> Result<OperationGuard<'_>, BearerError> {
        let mut state = self.lock();
        if state.busy {
            return Err(BearerError::WrongState(format!(
                "cannot {operation}: another operation is in progress"
            )));
        }
        if state.status != required {
            return Err(BearerError::WrongState(format!(
                "cannot {operation}: bearer is {:?}",
                state.status
            )));
        }

        state.busy = true;
        state.status = transitional;
        state.cancel = Some(cancel);
        Ok(OperationGuard {
            bearer: self,
            restore: Some(required),
        })
    }

    fn connected_port(&self) -> Result<Arc<DataPort>, BearerError> {
        self.lock()
            .connection
            .as_ref()
            .map(|c| Arc::clone(&c.data))
            .ok_or_else(|| BearerError::WrongState("bearer has no data port".into()))
    }

    /// Dials the context and reads its IP configuration. Returns the data port
    /// the session runs on.
    pub async fn connect(&self) -> Result<Arc<DataPort>, BearerError> {
        let cancel = CancellationToken::new();
        let guard = self.begin(
            "connect",
            BearerStatus::Disconnected,
            BearerStatus::Connecting,
            cancel.clone(),
        )?;

        let result = self.connect_sequence(cancel).await;

        match result {
            Ok(result) => {
                log_ip_config(self.id, &result);
                let data = Arc::clone(&result.data);
                guard.complete(BearerStatus::Connected, Some(result));
                Ok(data)
            }
            Err(e) => {
                tracing::info!(id = %self.id, "connection attempt failed: {e}");
                Err(e)
            }
        }
    }

    async fn connect_sequence(&self, cancel: CancellationToken) -> Result<ConnectResult, BearerError> {
        let backend = self.modem.backend();
        let modem = self.modem.as_ref();
        let config = &self.config;

        tracing::info!(id = %self.id, cid = config.cid, family = ?config.ip_family, "connecting");
        let data = backend.dial(modem, config, cancel.clone()).await?;

        match backend
            .get_ip_config(modem, Arc::clone(&data), config.cid, config.ip_family, cancel)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(id = %self.id, "IP configuration retrieval failed, tearing down: {e}");
                backend.disconnect(modem, data, config.cid).await;
                Err(e)
            }
        }
    }

    /// Re-reads the IP configuration of a connected bearer.
    pub async fn get_ip_config(&self) -> Result<ConnectResult, BearerError> {
        let cancel = CancellationToken::new();
        let guard = self.begin(
            "get IP config",
            BearerStatus::Connected,
            BearerStatus::Connected,
            cancel.clone(),
        )?;
        let data = self.connected_port()?;

        let result = self
            .modem
            .backend()
            .get_ip_config(&self.modem, data, self.config.cid, self.config.ip_family, cancel)
            .await?;

        guard.complete(BearerStatus::Connected, Some(result.clone()));
        Ok(result)
    }

    /// Tears the session down. Only fails when another operation is running.
    pub async fn disconnect(&self) -> Result<(), BearerError> {
        {
            let state = self.lock();
            if !state.busy && state.status == BearerStatus::Disconnected {
                return Ok(());
            }
        }

        let guard = self.begin(
            "disconnect",
            BearerStatus::Connected,
            BearerStatus::Disconnecting,
            CancellationToken::new(),
        )?;
        let data = self.connected_port()?;

        self.modem
            .backend()
            .disconnect(&self.modem, data, self.config.cid)
            .await;

        tracing::info!(id = %self.id, "disconnected");
        guard.complete(BearerStatus::Disconnected, None);
        Ok(())
    }
}

impl Drop for Bearer {
    fn drop(&mut self) {
        self.modem.release_cid(self.config.cid);
    }
}

fn log_ip_config(id: Uuid, result: &ConnectResult) {
    tracing::info!(%id, port = result.data.name(), "connected");
    for (family, config) in [("IPv4", &result.ipv4), ("IPv6", &result.ipv6)] {
        if let Some(config) = config {
            tracing::info!(%id, "{family} address {}/{}", config.address, config.prefix);
            for (i, dns) in config.dns.iter().enumerate() {
                tracing::info!(%id, "{family} DNS #{} {dns}", i + 1);
            }
        }
    }
}
