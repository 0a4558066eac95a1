use super::compatible::CompatibleBackend;
use super::echo::EchoBackend;
use super::traits::ChatBackend;
use crate::config::{BackendConfig, BackendKind};
use anyhow::{Result, bail};
use std::sync::Arc;

pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn ChatBackend>> {
    match config.kind {
        BackendKind::Echo => Ok(Arc::new(EchoBackend::new())),
        BackendKind::Compatible => {
            let Some(base_url) = config.base_url.as_deref().filter(|url| !url.trim().is_empty())
            else {
                bail!("backend.base_url is required for the compatible backend");
            };
            Ok(Arc::new(CompatibleBackend::new(
                "compatible",
                base_url,
                config.api_key.as_deref(),
            )))
        }
    }
}
