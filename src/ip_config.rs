use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channel::CommandChannel;
use crate::commands::{build_cgpaddr, build_xdns_query, AtCommand};
use crate::error::BearerError;
use crate::log::log_step;
use crate::modem::{DataPort, Modem};
use crate::parser::{parse_cgpaddr_response, parse_xdns_query_response};
use crate::types::{ConnectResult, IpConfig, IpConfigStep, IpFamily};

pub(crate) struct IpConfigContext {
    primary: Arc<dyn CommandChannel>,
    data: Arc<DataPort>,
    cid: u32,
    step: IpConfigStep,
    ipv4: Option<IpConfig>,
    ipv6: Option<IpConfig>,
    cancel: CancellationToken,
}

impl IpConfigContext {
    pub fn new(modem: &Modem, data: Arc<DataPort>, cid: u32, cancel: CancellationToken) -> Self {
        IpConfigContext {
            primary: Arc::clone(modem.primary()),
            data,
            cid,
            step: IpConfigStep::QueryAddress,
            ipv4: None,
            ipv6: None,
            cancel,
        }
    }

    fn command(&self) -> Option<AtCommand> {
        match self.step {
            IpConfigStep::QueryAddress => Some(build_cgpaddr(self.cid)),
            // +XDNS? lists every context; the parser filters ours.
            IpConfigStep::QueryDns => Some(build_xdns_query()),
            IpConfigStep::Done => None,
        }
    }

    fn advance(&mut self, reply: &str) -> Result<(), BearerError> {
        self.step = match self.step {
            IpConfigStep::QueryAddress => {
                let addresses = parse_cgpaddr_response(reply)?;
                if addresses.cid != self.cid {
                    tracing::warn!(
                        expected = self.cid,
                        got = addresses.cid,
                        "+CGPADDR reply is for another context"
                    );
                }
                self.ipv4 = addresses.ipv4.map(IpConfig::new_static);
                self.ipv6 = addresses.ipv6.map(IpConfig::new_static);
                IpConfigStep::QueryDns
            }
            IpConfigStep::QueryDns => {
                let dns = parse_xdns_query_response(reply, self.cid)?;
                if let Some(config) = self.ipv4.as_mut() {
                    config.dns = dns.ipv4;
                }
                if let Some(config) = self.ipv6.as_mut() {
                    config.dns = dns.ipv6;
                }
                IpConfigStep::Done
            }
            IpConfigStep::Done => IpConfigStep::Done,
        };
        Ok(())
    }

    pub async fn run(mut self) -> Result<ConnectResult, BearerError> {
        loop {
            log_step("get IP config", self.step);

            if self.cancel.is_cancelled() {
                return Err(BearerError::Canceled);
            }

            let Some(command) = self.command() else {
                return Ok(ConnectResult {
                    data: self.data,
                    ipv4: self.ipv4,
                    ipv6: self.ipv6,
                });
            };
            let reply = self.primary.command(&command, &self.cancel).await?;
            self.advance(&reply)?;
        }
    }
}

/// Reads the addresses and DNS servers the network assigned to `cid`.
pub async fn run_ip_config(
    modem: &Modem,
    data: Arc<DataPort>,
    cid: u32,
    ip_family: IpFamily,
    cancel: CancellationToken,
) -> Result<ConnectResult, BearerError> {
    tracing::debug!(cid, ?ip_family, port = data.name(), "retrieving IP configuration");
    IpConfigContext::new(modem, data, cid, cancel).run().await
}
