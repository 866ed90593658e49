//! Typed loading of per-proxy deployment parameters.
//!
//! Each proxy kind keeps a `params.json` in its own directory under the
//! deterministic config root. The schema depends on the kind: implementation
//! proxies use [`DeterministicProxyConfig`], the upgrade gate uses
//! [`GenericDeployConfig`]. Malformed or missing fields fail here, before any
//! value reaches a signing request.

use crate::ConfigError;
use deployer_types::{DeterministicProxyConfig, GenericDeployConfig, ProxyKind};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// File name of the parameters file inside a proxy kind directory.
pub const PARAMS_FILE: &str = "params.json";

/// Parameters loaded for one proxy kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentParams {
	Proxy(DeterministicProxyConfig),
	Generic(GenericDeployConfig),
}

/// Returns `<dir>/<proxy_kind>/params.json`.
pub fn params_path(dir: &Path, proxy_kind: ProxyKind) -> PathBuf {
	dir.join(proxy_kind.as_str()).join(PARAMS_FILE)
}

/// Loads the parameters for `proxy_kind` from the deterministic config directory.
pub async fn load_params(
	dir: &Path,
	proxy_kind: ProxyKind,
) -> Result<DeploymentParams, ConfigError> {
	let path = params_path(dir, proxy_kind);
	let params = match proxy_kind.implementation() {
		Some(_) => DeploymentParams::Proxy(read_json(&path).await?),
		None => DeploymentParams::Generic(read_json(&path).await?),
	};
	tracing::debug!(proxy_kind = %proxy_kind, path = %path.display(), "Loaded deployment params");
	Ok(params)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
	let bytes = tokio::fs::read(path).await.map_err(|e| {
		ConfigError::Io(std::io::Error::new(
			e.kind(),
			format!("Cannot read {}: {}", path.display(), e),
		))
	})?;
	serde_json::from_slice(&bytes)
		.map_err(|e| ConfigError::Parse(format!("Invalid {}: {}", path.display(), e)))
}
