use std::time::Duration;

use crate::charset::CharsetEncoder;
use crate::types::{AllowedAuth, BearerConfig, IpFamily};

pub const SHORT_TIMEOUT: Duration = Duration::from_secs(3);
pub const CGACT_TIMEOUT: Duration = Duration::from_secs(30);
pub const CGDATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw-IP framing mode for the data channel.
pub const RAW_IP_MODE: &str = "M-RAW_IP";

/// Hardware descriptor keys carrying the USB sub-interface indices.
pub const ACM_ID_PROPERTY: &str = "ID_MM_XMM_ACM_ID";
pub const NCM_ID_PROPERTY: &str = "ID_MM_XMM_NCM_ID";

/// Command body (without the `AT` prefix) and how long to wait for it.
#[derive(Clone, PartialEq, Eq)]
pub struct AtCommand {
    pub body: String,
    pub timeout: Duration,
    /// Embeds credentials; never logged verbatim.
    pub sensitive: bool,
}

impl AtCommand {
    fn new(body: impl Into<String>, timeout: Duration) -> Self {
        AtCommand {
            body: body.into(),
            timeout,
            sensitive: false,
        }
    }

    /// What the logs may show of this command.
    pub fn loggable(&self) -> &str {
        if self.sensitive {
            self.body.split('=').next().unwrap_or("")
        } else {
            &self.body
        }
    }
}

impl std::fmt::Debug for AtCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AT{} ({:?})", self.loggable(), self.timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthMethod {
    None = 0,
    Pap = 1,
    Chap = 2,
}

/// Picks the +WPPP method. CHAP wins over PAP; an unspecified allowed set
/// means CHAP.
pub fn select_auth_method(config: &BearerConfig) -> AuthMethod {
    if config.user.is_none() && config.password.is_none() {
        return AuthMethod::None;
    }

    let allowed = config.allowed_auth;
    if allowed.contains(AllowedAuth::CHAP) {
        AuthMethod::Chap
    } else if allowed.contains(AllowedAuth::PAP) {
        AuthMethod::Pap
    } else if allowed.is_unknown() {
        AuthMethod::Chap
    } else {
        AuthMethod::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DnsRequest {
    Ipv4 = 1,
    Ipv6 = 2,
    Dual = 3,
}

impl From<IpFamily> for DnsRequest {
    fn from(family: IpFamily) -> Self {
        match family {
            IpFamily::Ipv4 => DnsRequest::Ipv4,
            IpFamily::Ipv6 => DnsRequest::Ipv6,
            IpFamily::Ipv4v6 | IpFamily::Any => DnsRequest::Dual,
        }
    }
}

pub fn build_cgact_query() -> AtCommand {
    AtCommand::new("+CGACT?", SHORT_TIMEOUT)
}

pub fn build_wppp(config: &BearerConfig, encoder: &dyn CharsetEncoder) -> AtCommand {
    let cid = config.cid;
    let body = if config.user.is_none() && config.password.is_none() {
        format!("+WPPP=0,{cid},\"\",\"\"")
    } else {
        let encode = |text: &Option<String>| {
            text.as_deref()
                .and_then(|t| encoder.encode(t))
                .unwrap_or_default()
        };
        format!(
            "+WPPP={},{cid},\"{}\",\"{}\"",
            select_auth_method(config) as u8,
            encode(&config.user),
            encode(&config.password)
        )
    };

    AtCommand {
        sensitive: true,
        ..AtCommand::new(body, SHORT_TIMEOUT)
    }
}

pub fn build_xdns_set(cid: u32, family: IpFamily) -> AtCommand {
    let request = DnsRequest::from(family);
    AtCommand::new(format!("+XDNS={cid},{}", request as u8), SHORT_TIMEOUT)
}

pub fn build_cgact_set(activate: bool, cid: u32) -> AtCommand {
    AtCommand::new(format!("+CGACT={},{cid}", u8::from(activate)), CGACT_TIMEOUT)
}

pub fn build_xdatachannel(acm_index: u32, ncm_index: u32, cid: u32) -> AtCommand {
    AtCommand::new(
        format!("+XDATACHANNEL=1,1,\"/USBCDC/{acm_index}\",\"/USBHS/NCM/{ncm_index}\",2,{cid}"),
        SHORT_TIMEOUT,
    )
}

pub fn build_cgdata(cid: u32) -> AtCommand {
    AtCommand::new(format!("+CGDATA=\"{RAW_IP_MODE}\",{cid}"), CGDATA_TIMEOUT)
}

pub fn build_cgpaddr(cid: u32) -> AtCommand {
    AtCommand::new(format!("+CGPADDR={cid}"), SHORT_TIMEOUT)
}

pub fn build_xdns_query() -> AtCommand {
    AtCommand::new("+XDNS?", SHORT_TIMEOUT)
}
