pub mod backend;
pub mod bearer;
pub mod channel;
pub mod charset;
pub mod commands;
pub mod config;
pub mod dial;
pub mod disconnect;
pub mod error;
pub mod ip_config;
pub mod log;
pub mod modem;
pub mod parser;
pub mod types;

pub use backend::{BearerBackend, XmmBackend};
pub use bearer::Bearer;
pub use channel::{AtPort, CommandChannel};
pub use charset::{Charset, CharsetEncoder};
pub use error::{BearerError, ParseError};
pub use modem::{DataPort, Modem};
pub use types::{AllowedAuth, BearerConfig, BearerStatus, ConnectResult, IpConfig, IpFamily};
