use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::dial::run_dial;
use crate::disconnect::run_disconnect;
use crate::error::BearerError;
use crate::ip_config::run_ip_config;
use crate::modem::{DataPort, Modem};
use crate::types::{BearerConfig, ConnectResult, IpFamily};

/// Modem-family specific connection handling, picked when the modem is built.
#[async_trait]
pub trait BearerBackend: Send + Sync {
    async fn dial(
        &self,
        modem: &Modem,
        config: &BearerConfig,
        cancel: CancellationToken,
    ) -> Result<Arc<DataPort>, BearerError>;

    async fn get_ip_config(
        &self,
        modem: &Modem,
        data: Arc<DataPort>,
        cid: u32,
        ip_family: IpFamily,
        cancel: CancellationToken,
    ) -> Result<ConnectResult, BearerError>;

    /// Never fails; teardown errors are logged by the implementation.
    async fn disconnect(&self, modem: &Modem, data: Arc<DataPort>, cid: u32);
}

/// Intel XMM based modules: +WPPP/+XDNS setup, +XDATACHANNEL mapping and
/// raw-IP framing over NCM.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmmBackend;

#[async_trait]
impl BearerBackend for XmmBackend {
    async fn dial(
        &self,
        modem: &Modem,
        config: &BearerConfig,
        cancel: CancellationToken,
    ) -> Result<Arc<DataPort>, BearerError> {
        run_dial(modem, config, cancel).await
    }

    async fn get_ip_config(
        &self,
        modem: &Modem,
        data: Arc<DataPort>,
        cid: u32,
        ip_family: IpFamily,
        cancel: CancellationToken,
    ) -> Result<ConnectResult, BearerError> {
        run_ip_config(modem, data, cid, ip_family, cancel).await
    }

    async fn disconnect(&self, modem: &Modem, data: Arc<DataPort>, cid: u32) {
        run_disconnect(modem, data, cid).await
    }
}
