use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channel::CommandChannel;
use crate::charset::CharsetEncoder;
use crate::commands::*;
use crate::error::BearerError;
use crate::log::log_step;
use crate::modem::{DataPort, Modem};
use crate::parser::parse_cgact_read_response;
use crate::types::{BearerConfig, DialStep};

/// State of one dial attempt. Dropped as soon as the attempt finishes, which
/// releases its port references.
pub(crate) struct DialContext {
    primary: Arc<dyn CommandChannel>,
    data: Arc<DataPort>,
    charset: Arc<dyn CharsetEncoder>,
    config: BearerConfig,
    acm_index: Option<u32>,
    ncm_index: Option<u32>,
    step: DialStep,
    cancel: CancellationToken,
}

impl DialContext {
    /// Picks the data port and reads its USB sub-interface indices. Fails
    /// before any command is sent if either is missing.
    pub fn new(
        modem: &Modem,
        config: &BearerConfig,
        cancel: CancellationToken,
    ) -> Result<Self, BearerError> {
        let data = modem.best_data_port().ok_or_else(|| {
            BearerError::NotFound("No valid data port found to launch connection".into())
        })?;

        if let Some(secondary) = modem.secondary() {
            tracing::debug!(port = secondary.name(), "secondary AT port available");
        }

        let ctx = DialContext {
            primary: Arc::clone(modem.primary()),
            acm_index: data.property_as_index(ACM_ID_PROPERTY),
            ncm_index: data.property_as_index(NCM_ID_PROPERTY),
            data,
            charset: Arc::clone(modem.charset()),
            config: config.clone(),
            step: DialStep::CheckActive,
            cancel,
        };
        ctx.sub_interfaces()?;
        Ok(ctx)
    }

    fn sub_interfaces(&self) -> Result<(u32, u32), BearerError> {
        match (self.acm_index, self.ncm_index) {
            (Some(acm), Some(ncm)) => Ok((acm, ncm)),
            _ => Err(BearerError::NotFound(format!(
                "data port '{}' lacks a valid {ACM_ID_PROPERTY}/{NCM_ID_PROPERTY} pair",
                self.data.name()
            ))),
        }
    }

    /// Command for the current step; `None` once done.
    fn command(&self) -> Result<Option<AtCommand>, BearerError> {
        let cid = self.config.cid;
        let command = match self.step {
            DialStep::CheckActive => build_cgact_query(),
            DialStep::Auth => build_wppp(&self.config, self.charset.as_ref()),
            DialStep::DnsFamily => build_xdns_set(cid, self.config.ip_family),
            DialStep::Activate => build_cgact_set(true, cid),
            DialStep::MapDataChannel => {
                let (acm, ncm) = self.sub_interfaces()?;
                build_xdatachannel(acm, ncm, cid)
            }
            DialStep::StartFraming => build_cgdata(cid),
            DialStep::Done => return Ok(None),
        };
        Ok(Some(command))
    }

    /// Consumes the reply of the current step and moves to the next one.
    fn advance(&mut self, reply: &str) -> Result<(), BearerError> {
        let next = match self.step {
            DialStep::CheckActive => {
                let contexts = parse_cgact_read_response(reply)?;
                let already_active = contexts
                    .iter()
                    .any(|ctx| ctx.cid == self.config.cid && ctx.active);
                if already_active {
                    tracing::debug!(
                        cid = self.config.cid,
                        "selected CID is currently active, skipping to data channel setup"
                    );
                    DialStep::MapDataChannel
                } else {
                    DialStep::Auth
                }
            }
            DialStep::Auth => DialStep::DnsFamily,
            DialStep::DnsFamily => DialStep::Activate,
            DialStep::Activate => DialStep::MapDataChannel,
            DialStep::MapDataChannel => DialStep::StartFraming,
            DialStep::StartFraming | DialStep::Done => DialStep::Done,
        };

        debug_assert!(next >= self.step);
        self.step = next;
        Ok(())
    }

    pub async fn run(mut self) -> Result<Arc<DataPort>, BearerError> {
        loop {
            log_step("dial", self.step);

            if self.cancel.is_cancelled() {
                return Err(BearerError::Canceled);
            }

            let Some(command) = self.command()? else {
                return Ok(self.data);
            };
            let reply = self.primary.command(&command, &self.cancel).await?;
            self.advance(&reply)?;
        }
    }
}

/// Activates `config.cid` and brings up raw-IP framing on the best data port.
pub async fn run_dial(
    modem: &Modem,
    config: &BearerConfig,
    cancel: CancellationToken,
) -> Result<Arc<DataPort>, BearerError> {
    DialContext::new(modem, config, cancel)?.run().await
}
