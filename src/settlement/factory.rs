use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{HttpSettlementClient, SimulatedSettlement};
use crate::config::SettlementConfig;
use crate::error::{Result, SealError};

use super::{SettlementClient, SettlementKind};

/// Which backend a settlement section selects.
///
/// Dry-run wins over an endpoint; no endpoint at all means simulated.
pub fn settlement_kind_for(config: &SettlementConfig) -> SettlementKind {
    match (&config.endpoint, config.dry_run) {
        (Some(_), false) => SettlementKind::Http,
        _ => SettlementKind::Simulated,
    }
}

/// Create the runtime settlement client from the `settlement` config section.
pub fn build_settlement_client(config: &SettlementConfig) -> Result<Arc<dyn SettlementClient>> {
    build_settlement_client_for(settlement_kind_for(config), config)
}

/// Create a settlement client for an explicit backend kind.
pub fn build_settlement_client_for(
    kind: SettlementKind,
    config: &SettlementConfig,
) -> Result<Arc<dyn SettlementClient>> {
    match kind {
        SettlementKind::Http => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                SealError::Validation(
                    "settlement.endpoint is required for the http backend".to_string(),
                )
            })?;
            info!("Using HTTP settlement gateway at {}", endpoint);
            let client = HttpSettlementClient::new(endpoint, config.request_timeout())?;
            Ok(Arc::new(client))
        }
        SettlementKind::Simulated => {
            if config.endpoint.is_some() {
                warn!("settlement.dry_run is set; ignoring configured endpoint");
            }
            info!("Using simulated settlement backend");
            Ok(Arc::new(SimulatedSettlement::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_selection() {
        let mut config = SettlementConfig::default();
        assert_eq!(settlement_kind_for(&config), SettlementKind::Simulated);

        config.endpoint = Some("http://localhost:8545".into());
        assert_eq!(settlement_kind_for(&config), SettlementKind::Http);

        config.dry_run = true;
        assert_eq!(settlement_kind_for(&config), SettlementKind::Simulated);
    }

    #[test]
    fn test_http_without_endpoint_is_rejected() {
        let config = SettlementConfig::default();
        let result = build_settlement_client_for(SettlementKind::Http, &config);
        assert!(matches!(result, Err(SealError::Validation(_))));
    }

    #[test]
    fn test_build_simulated() {
        let client = build_settlement_client(&SettlementConfig::default()).unwrap();
        assert_eq!(client.kind(), SettlementKind::Simulated);
    }
}
