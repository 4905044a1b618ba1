use std::env;

use anyhow::{anyhow, bail, Context, Result};
use dotenvy::dotenv;

use crate::charset::Charset;
use crate::types::{AllowedAuth, BearerConfig, IpFamily};

const USAGE: &str = "Please either use 'useEnv' with XMM_* environment variables or \
'useInline <device> <data-port> <acm-id> <ncm-id> <cid> [<user> <password>]'";

/// Everything the daemon needs to bring one bearer up.
#[derive(Debug, Clone)]
pub struct Settings {
    /// AT command tty, e.g. `/dev/ttyACM0`.
    pub device: String,
    /// Network interface of the data port, e.g. `wwan0`.
    pub data_port: String,
    pub acm_id: String,
    pub ncm_id: String,
    pub charset: Charset,
    pub bearer: BearerConfig,
}

pub fn load_settings() -> Result<Settings> {
    let args: Vec<String> = env::args().collect();
    settings_from_args(&args)
}

pub fn settings_from_args(args: &[String]) -> Result<Settings> {
    match args {
        // Case 1: useEnv
        [_, mode] if mode == "useEnv" => {
            if let Err(e) = dotenv() {
                tracing::debug!("no .env file loaded: {e}");
            }
            settings_from_env(|key| env::var(key).ok())
        }

        // Case 2: useInline device data_port acm ncm cid [user password]
        [_, mode, device, data_port, acm_id, ncm_id, cid, credentials @ ..]
            if mode == "useInline" =>
        {
            let (user, password) = match credentials {
                [] => (None, None),
                [user, password] => (Some(user.clone()), Some(password.clone())),
                _ => bail!(USAGE),
            };
            Ok(Settings {
                device: device.clone(),
                data_port: data_port.clone(),
                acm_id: acm_id.clone(),
                ncm_id: ncm_id.clone(),
                charset: Charset::default(),
                bearer: BearerConfig {
                    user,
                    password,
                    cid: parse_cid(cid)?,
                    ..BearerConfig::default()
                },
            })
        }

        // Anything else
        _ => bail!(USAGE),
    }
}

/// Reads the `XMM_*` variables through `var`.
pub fn settings_from_env(var: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} is not set"));
    let non_empty = |key: &str| var(key).filter(|v| !v.is_empty());

    let cid = match var("XMM_CID") {
        Some(cid) => parse_cid(&cid)?,
        None => 1,
    };
    let ip_family = non_empty("XMM_IP_TYPE")
        .map(|v| v.parse::<IpFamily>())
        .transpose()
        .map_err(|e| anyhow!(e))
        .context("XMM_IP_TYPE")?
        .unwrap_or_default();
    let allowed_auth = non_empty("XMM_ALLOWED_AUTH")
        .map(|v| v.parse::<AllowedAuth>())
        .transpose()
        .map_err(|e| anyhow!(e))
        .context("XMM_ALLOWED_AUTH")?
        .unwrap_or_default();
    let charset = non_empty("XMM_CHARSET")
        .map(|v| v.parse::<Charset>())
        .transpose()
        .map_err(|e| anyhow!(e))
        .context("XMM_CHARSET")?
        .unwrap_or_default();

    Ok(Settings {
        device: required("XMM_DEVICE")?,
        data_port: required("XMM_DATA_PORT")?,
        acm_id: required("XMM_ACM_ID")?,
        ncm_id: required("XMM_NCM_ID")?,
        charset,
        bearer: BearerConfig {
            user: non_empty("XMM_USER"),
            password: non_empty("XMM_PASSWORD"),
            allowed_auth,
            ip_family,
            cid,
        },
    })
}

fn parse_cid(text: &str) -> Result<u32> {
    let cid: u32 = text
        .trim()
        .parse()
        .with_context(|| format!("invalid context id '{text}'"))?;
    if cid == 0 {
        bail!("context id must be 1 or greater");
    }
    Ok(cid)
}
