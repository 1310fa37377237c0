use tracing::{info, warn};

use twinmem_config::ServerConfig;
use twinmem_core::MemorySource;
use twinmem_provider::{HttpProviderClient, ProviderClient};
use twinmem_replication::ReplicationManager;

use crate::tools::{MemoryTools, SlotInfo};

/// Build the memory tools from `config`.
///
/// A slot whose settings are invalid is logged and left unset; the server
/// still starts with whatever remains.
pub(crate) async fn build_tools(config: &ServerConfig) -> MemoryTools {
    info!(mode = config.mode().as_str(), "configuring memory providers");

    let ((primary, primary_info), (secondary, secondary_info)) = tokio::join!(
        connect(config, MemorySource::Primary),
        connect(config, MemorySource::Secondary),
    );

    MemoryTools::new(
        ReplicationManager::new(primary, secondary),
        config.server.user_id.clone(),
        primary_info,
        secondary_info,
    )
}

async fn connect(
    config: &ServerConfig,
    slot: MemorySource,
) -> (Option<Box<dyn ProviderClient>>, SlotInfo) {
    let provider = match config.resolve(slot) {
        Ok(provider) => provider,
        Err(error) => {
            warn!(%slot, %error, "provider slot left unconfigured");
            return (None, SlotInfo::unconfigured());
        }
    };
    let info = SlotInfo::from(&provider);

    let client = match HttpProviderClient::new(&provider) {
        Ok(client) => client,
        Err(error) => {
            warn!(%slot, %error, "failed to build provider client");
            return (None, info);
        }
    };

    // The client is kept even when /configure fails.
    match client.configure().await {
        Ok(()) => info!(%slot, %provider, "memory provider ready"),
        Err(error) => warn!(
            %slot,
            service_url = client.service_url(),
            %error,
            "failed to configure memory service"
        ),
    }
    (Some(Box::new(client)), info)
}
