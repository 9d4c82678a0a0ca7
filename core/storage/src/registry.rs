//! Connection selection for a provider configuration.

use std::sync::Arc;
use tracing::debug;

use skyshelf_common::{Error, Result};

use crate::credentials::{Credentials, ProviderConfig};
use crate::local::LocalConnection;
use crate::memory::MemoryConnection;
use crate::provider::Connection;

/// Whether to talk to real providers or to in-memory mocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    Mock,
    Live,
}

/// Open the connection matching `config`'s provider.
///
/// # Errors
/// - `Error::Connection` when no live client is available for the provider
pub async fn open_connection(
    config: &ProviderConfig,
    mode: ConnectionMode,
) -> Result<Arc<dyn Connection>> {
    debug!(provider = %config.provider(), ?mode, "Opening connection");

    if mode == ConnectionMode::Mock {
        return Ok(Arc::new(MemoryConnection::new()));
    }

    match config.credentials() {
        Credentials::Local(local) => Ok(Arc::new(LocalConnection::new(&local.root)?)),
        #[cfg(feature = "s3")]
        Credentials::Aws(aws) => Ok(Arc::new(crate::s3::S3Connection::aws(aws).await)),
        #[cfg(feature = "s3")]
        Credentials::Google(google) => Ok(Arc::new(crate::s3::S3Connection::google(google).await)),
        #[cfg(not(feature = "s3"))]
        Credentials::Aws(_) | Credentials::Google(_) => Err(Error::Connection(format!(
            "{} requires the `s3` feature",
            config.provider()
        ))),
        Credentials::Rackspace(_) => Err(Error::Connection(
            "No live client is available for Rackspace".to_string(),
        )),
    }
}
