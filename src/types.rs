use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::modem::DataPort;

/// IP family requested for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpFamily {
    Ipv4,
    Ipv6,
    #[default]
    Ipv4v6,
    Any,
}

impl FromStr for IpFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipv4" | "v4" => Ok(IpFamily::Ipv4),
            "ipv6" | "v6" => Ok(IpFamily::Ipv6),
            "ipv4v6" | "v4v6" => Ok(IpFamily::Ipv4v6),
            "any" | "" => Ok(IpFamily::Any),
            other => Err(format!("unknown IP family '{other}'")),
        }
    }
}

/// Authentication methods the user allows. An empty set means "unspecified",
/// which is different from an explicit `NONE`.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct AllowedAuth(u8);

impl AllowedAuth {
    pub const UNKNOWN: AllowedAuth = AllowedAuth(0);
    pub const NONE: AllowedAuth = AllowedAuth(1 << 0);
    pub const PAP: AllowedAuth = AllowedAuth(1 << 1);
    pub const CHAP: AllowedAuth = AllowedAuth(1 << 2);

    pub fn contains(self, other: AllowedAuth) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_unknown(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for AllowedAuth {
    type Output = AllowedAuth;

    fn bitor(self, rhs: AllowedAuth) -> AllowedAuth {
        AllowedAuth(self.0 | rhs.0)
    }
}

impl fmt::Debug for AllowedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return f.write_str("unknown");
        }
        let names: Vec<&str> = [
            (AllowedAuth::NONE, "none"),
            (AllowedAuth::PAP, "pap"),
            (AllowedAuth::CHAP, "chap"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
        f.write_str(&names.join("|"))
    }
}

impl FromStr for AllowedAuth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(['|', ','])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .try_fold(AllowedAuth::UNKNOWN, |acc, item| {
                let flag = match item.to_ascii_lowercase().as_str() {
                    "none" => AllowedAuth::NONE,
                    "pap" => AllowedAuth::PAP,
                    "chap" => AllowedAuth::CHAP,
                    other => return Err(format!("unknown auth method '{other}'")),
                };
                Ok(acc | flag)
            })
    }
}

/// User-requested bearer settings.
#[derive(Clone, Default)]
pub struct BearerConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub allowed_auth: AllowedAuth,
    pub ip_family: IpFamily,
    pub cid: u32,
}

impl fmt::Debug for BearerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerConfig")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<hidden>"))
            .field("allowed_auth", &self.allowed_auth)
            .field("ip_family", &self.ip_family)
            .field("cid", &self.cid)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpMethod {
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpConfig {
    pub method: IpMethod,
    pub address: String,
    /// The modem never reports one.
    pub prefix: u8,
    pub dns: Vec<String>,
}

impl IpConfig {
    pub fn new_static(address: impl Into<String>) -> Self {
        IpConfig {
            method: IpMethod::Static,
            address: address.into(),
            prefix: 0,
            dns: Vec::new(),
        }
    }
}

/// Outcome of IP configuration retrieval.
#[derive(Debug, Clone)]
pub struct ConnectResult {
    pub data: Arc<DataPort>,
    pub ipv4: Option<IpConfig>,
    pub ipv6: Option<IpConfig>,
}

/// Dial steps, in execution order. The only non-sequential transition is
/// `CheckActive -> MapDataChannel` when the context is already up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DialStep {
    CheckActive,
    Auth,
    DnsFamily,
    Activate,
    MapDataChannel,
    StartFraming,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IpConfigStep {
    QueryAddress,
    QueryDns,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DisconnectStep {
    Deactivate,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerStatus {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}
