use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tokio::signal::ctrl_c;

use xmm_bearer::commands::{ACM_ID_PROPERTY, NCM_ID_PROPERTY};
use xmm_bearer::config::load_settings;
use xmm_bearer::{log, AtPort, DataPort, Modem};

#[tokio::main]
async fn main() -> Result<()> {
    log::init()?;
    let settings = load_settings()?;

    // === 1. Open the AT port ===
    let tty = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&settings.device)
        .await
        .with_context(|| format!("failed to open AT port {}", settings.device))?;
    tracing::info!(device = %settings.device, "AT port opened");

    let data_port = DataPort::new(&settings.data_port)
        .with_property(ACM_ID_PROPERTY, &settings.acm_id)
        .with_property(NCM_ID_PROPERTY, &settings.ncm_id);
    let modem = Arc::new(
        Modem::new(Arc::new(AtPort::new(&settings.device, tty)))
            .with_charset(settings.charset)
            .with_data_port(data_port),
    );

    // === 2. Dial ===
    let bearer = modem.create_bearer(settings.bearer.clone())?;
    let connect = bearer.connect();
    tokio::pin!(connect);

    let data = tokio::select! {
        result = &mut connect => result?,
        _ = ctrl_c() => {
            tracing::info!("interrupted, cancelling connection attempt");
            bearer.cancel();
            match connect.await {
                Ok(_) => bearer.disconnect().await?,
                Err(e) => tracing::info!("connection attempt ended: {e}"),
            }
            return Ok(());
        }
    };

    // === 3. Hold the session until Ctrl-C ===
    tracing::info!(port = data.name(), "session up, press Ctrl-C to disconnect");
    ctrl_c().await.context("failed to wait for Ctrl-C")?;

    bearer.disconnect().await?;
    Ok(())
}
