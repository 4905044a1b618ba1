use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::channel::CommandChannel;
use crate::commands::build_cgact_set;
use crate::log::log_step;
use crate::modem::{DataPort, Modem};
use crate::types::DisconnectStep;

pub(crate) struct DisconnectContext {
    primary: Arc<dyn CommandChannel>,
    data: Arc<DataPort>,
    cid: u32,
    step: DisconnectStep,
}

impl DisconnectContext {
    pub fn new(modem: &Modem, data: Arc<DataPort>, cid: u32) -> Self {
        DisconnectContext {
            primary: Arc::clone(modem.primary()),
            data,
            cid,
            step: DisconnectStep::Deactivate,
        }
    }

    /// Deactivates the context. Whatever the modem answers, the bearer is
    /// considered disconnected afterwards.
    pub async fn run(mut self) {
        loop {
            log_step("disconnect", self.step);

            match self.step {
                DisconnectStep::Deactivate => {
                    let command = build_cgact_set(false, self.cid);
                    let result = self
                        .primary
                        .command(&command, &CancellationToken::new())
                        .await;

                    match result {
                        Err(e) if !e.is_no_carrier() => tracing::debug!(
                            cid = self.cid,
                            port = self.data.name(),
                            "PDP context deactivation failed (not fatal): {e}"
                        ),
                        _ => {}
                    }
                    self.step = DisconnectStep::Done;
                }
                DisconnectStep::Done => return,
            }
        }
    }
}

pub async fn run_disconnect(modem: &Modem, data: Arc<DataPort>, cid: u32) {
    DisconnectContext::new(modem, data, cid).run().await
}
