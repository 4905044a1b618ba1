#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use xmm_bearer::commands::{AtCommand, ACM_ID_PROPERTY, NCM_ID_PROPERTY};
use xmm_bearer::{BearerConfig, BearerError, CommandChannel, DataPort, Modem};

/// How the scripted modem answers a command.
#[derive(Clone)]
pub enum Reply {
    Ok(&'static str),
    Err(BearerError),
    /// Fires the caller's cancellation token, then answers `OK`.
    CancelAfter(&'static str),
    /// Waits until notified, then answers an empty `OK`.
    Block(Arc<Notify>),
}

/// Command channel answering by body prefix. The first matching rule wins;
/// unmatched commands get an empty `OK`.
#[derive(Default)]
pub struct ScriptedChannel {
    rules: Vec<(&'static str, Reply)>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, prefix: &'static str, reply: Reply) -> Self {
        self.rules.push((prefix, reply));
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.sent().iter().filter(|body| body.starts_with(prefix)).count()
    }
}

#[async_trait]
impl CommandChannel for ScriptedChannel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn command(
        &self,
        command: &AtCommand,
        cancel: &CancellationToken,
    ) -> Result<String, BearerError> {
        self.sent.lock().unwrap().push(command.body.clone());

        let reply = self
            .rules
            .iter()
            .find(|(prefix, _)| command.body.starts_with(prefix))
            .map(|(_, reply)| reply.clone())
            .unwrap_or(Reply::Ok(""));

        match reply {
            Reply::Ok(text) => Ok(text.to_string()),
            Reply::Err(e) => Err(e),
            Reply::CancelAfter(text) => {
                cancel.cancel();
                Ok(text.to_string())
            }
            Reply::Block(notify) => {
                tokio::select! {
                    _ = notify.notified() => Ok(String::new()),
                    _ = cancel.cancelled() => Err(BearerError::Canceled),
                }
            }
        }
    }
}

pub const CGPADDR_DUAL: &str = "+CGPADDR: 1,\"10.11.12.133\",\"FE80:0:0:0:0:6B:B43D:6A01\"";
pub const XDNS_DUAL: &str =
    "+XDNS: 1, \"172.26.38.1\", \"2001:4888:53:FF00:524:D:0:0\"\r\n+XDNS: 2, \"0.0.0.0\", \"0.0.0.0\"";

/// A channel that completes a full connect on cid 1.
pub fn happy_channel() -> ScriptedChannel {
    ScriptedChannel::new()
        .on("+CGACT?", Reply::Ok("+CGACT: 1,0"))
        .on("+CGPADDR", Reply::Ok(CGPADDR_DUAL))
        .on("+XDNS?", Reply::Ok(XDNS_DUAL))
}

pub fn data_port() -> DataPort {
    DataPort::new("wwan0")
        .with_property(ACM_ID_PROPERTY, "0")
        .with_property(NCM_ID_PROPERTY, "1")
}

pub fn modem(channel: &Arc<ScriptedChannel>) -> Arc<Modem> {
    Arc::new(Modem::new(Arc::clone(channel) as Arc<dyn CommandChannel>).with_data_port(data_port()))
}

pub fn config(cid: u32) -> BearerConfig {
    BearerConfig {
        user: Some("user".into()),
        password: Some("pass".into()),
        cid,
        ..BearerConfig::default()
    }
}
