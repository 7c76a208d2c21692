//! DNS pre-validation of webhook targets

use tokio::net::lookup_host;

use crate::endpoint::WebhookTarget;
use crate::error::ConfigError;

/// Check that a target's host resolves to at least one address
pub async fn check_resolvable(target: &WebhookTarget) -> Result<(), ConfigError> {
    let unresolvable = |reason: String| ConfigError::Unresolvable {
        url: target.to_string(),
        reason,
    };

    let mut addrs = lookup_host((target.host(), target.port()))
        .await
        .map_err(|e| unresolvable(e.to_string()))?;

    match addrs.next() {
        Some(addr) => {
            tracing::debug!("{} resolves to {}", target, addr);
            Ok(())
        }
        None => Err(unresolvable("no addresses found".to_string())),
    }
}

/// Validate every target, failing on the first that does not resolve
pub async fn validate_targets(targets: &[WebhookTarget]) -> Result<(), ConfigError> {
    for target in targets {
        check_resolvable(target).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ip_literal_resolves() {
        let target = WebhookTarget::parse("http://127.0.0.1:8080/hook").unwrap();
        assert!(check_resolvable(&target).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_tld_does_not_resolve() {
        let targets = vec![
            WebhookTarget::parse("http://127.0.0.1/hook").unwrap(),
            WebhookTarget::parse("http://no-such-host.invalid/hook").unwrap(),
        ];
        let result = validate_targets(&targets).await;
        assert!(matches!(result, Err(ConfigError::Unresolvable { .. })));
    }
}
