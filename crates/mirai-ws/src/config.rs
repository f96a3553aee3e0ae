//! Client configuration.

use mirai_ws_registry::DEFAULT_CAPACITY;
use mirai_ws_transport::Endpoint;
use serde::{Deserialize, Serialize};

use crate::reassembly::DEFAULT_MAX_MESSAGE_SIZE;

/// Settings for one [`Client`](crate::Client).
///
/// Every field has a default matching a stock mirai-api-http install on the
/// local machine, so `ClientConfig::default()` plus a verify key is usually
/// enough. Deserializable, so it can be loaded from any serde format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host name or IP address of the server.
    pub server_name: String,
    pub port: u16,
    /// Use `wss://` instead of `ws://`. Requires the `tls` feature.
    pub secure: bool,
    /// Channel path on the server. `/all` carries both events and commands.
    pub path: String,
    /// Sent as the `verifyKey` request header when set.
    pub verify_key: Option<String>,
    /// Bot account to bind, sent as the `qq` request header when set.
    pub qq: Option<i64>,
    /// Calls that may await responses at once.
    pub max_pending_calls: usize,
    /// Largest inbound message, in bytes, the receive buffer will hold.
    pub max_message_size: usize,
    /// The `syncId` the server stamps on pushed events.
    pub reserved_sync_id: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_name: "127.0.0.1".to_string(),
            port: 8080,
            secure: false,
            path: "/all".to_string(),
            verify_key: None,
            qq: None,
            max_pending_calls: DEFAULT_CAPACITY,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            reserved_sync_id: 0,
        }
    }
}

impl ClientConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// The transport endpoint this configuration points at, including the
    /// authentication headers.
    pub fn endpoint(&self) -> Endpoint {
        let mut endpoint = Endpoint::new(self.server_name.clone(), self.port, self.secure)
            .path(self.path.clone())
            .max_message_size(self.max_message_size);
        if let Some(key) = &self.verify_key {
            endpoint = endpoint.header("verifyKey", key.clone());
        }
        if let Some(qq) = self.qq {
            endpoint = endpoint.header("qq", qq.to_string());
        }
        endpoint
    }
}

/// Builder for [`ClientConfig`].
///
/// ```rust
/// use mirai_ws::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .server_name("10.0.0.2")
///     .port(8081)
///     .verify_key("INITKEY")
///     .qq(10001)
///     .build();
/// assert_eq!(config.endpoint().url(), "ws://10.0.0.2:8081/all");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the server host name or IP address.
    pub fn server_name(mut self, server_name: impl Into<String>) -> Self {
        self.config.server_name = server_name.into();
        self
    }

    /// Sets the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Selects `wss://`.
    pub fn secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    /// Sets the channel path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Sets the verify key.
    pub fn verify_key(mut self, key: impl Into<String>) -> Self {
        self.config.verify_key = Some(key.into());
        self
    }

    /// Sets the bot account to bind.
    pub fn qq(mut self, qq: i64) -> Self {
        self.config.qq = Some(qq);
        self
    }

    /// Sets the pending-call limit.
    pub fn max_pending_calls(mut self, max: usize) -> Self {
        self.config.max_pending_calls = max;
        self
    }

    /// Sets the receive buffer capacity in bytes.
    pub fn max_message_size(mut self, max: usize) -> Self {
        self.config.max_message_size = max;
        self
    }

    /// Sets the `syncId` used by the server for pushed events.
    pub fn reserved_sync_id(mut self, id: i64) -> Self {
        self.config.reserved_sync_id = id;
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server_name, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.path, "/all");
        assert_eq!(config.max_pending_calls, 1024);
        assert_eq!(config.max_message_size, 65536);
        assert_eq!(config.reserved_sync_id, 0);
    }

    #[test]
    fn test_endpoint_carries_auth_headers() {
        let config = ClientConfig::builder().verify_key("k").qq(42).build();
        let endpoint = config.endpoint();
        assert_eq!(endpoint.url(), "ws://127.0.0.1:8080/all");
        assert_eq!(
            endpoint.headers,
            vec![
                ("verifyKey".to_string(), "k".to_string()),
                ("qq".to_string(), "42".to_string()),
            ]
        );
    }

    #[test]
    fn test_endpoint_without_credentials_has_no_headers() {
        assert!(ClientConfig::default().endpoint().headers.is_empty());
    }

    #[test]
    fn test_endpoint_carries_message_limit() {
        let config = ClientConfig::builder().max_message_size(4096).build();
        assert_eq!(config.endpoint().max_message_size, Some(4096));
    }

    #[test]
    fn test_secure_endpoint_uses_wss() {
        let config = ClientConfig::builder().secure(true).port(443).build();
        assert!(config.endpoint().url().starts_with("wss://"));
    }

    #[test]
    fn test_deserialize_fills_missing_fields_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"port": 9000, "verify_key": "abc"}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.verify_key.as_deref(), Some("abc"));
        assert_eq!(config.path, "/all");
    }
}
