//! Secret lookup seam.

/// Source of credentials and private keys.
pub trait SecretProvider: Send + Sync {
    /// Value of secret `name`, or `None` when it is not configured.
    fn get_secret(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the process environment. Blank values count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretProvider;

impl SecretProvider for EnvSecretProvider {
    fn get_secret(&self, name: &str) -> Option<String> {
        match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => Some(value),
            _ => {
                tracing::debug!(secret = %name, "secret not set in environment");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_secret_provider_missing_is_none() {
        let provider = EnvSecretProvider;
        assert!(provider
            .get_secret("DROIDRELAY_SURELY_UNSET_SECRET_NAME")
            .is_none());
    }
}
