//! Tunnel client configuration.

/// Connection settings for one tunnel.
#[derive(Debug, Clone)]
pub struct Config {
    /// Local HTTP server that forwarded requests are replayed against.
    pub target: String,

    /// Relay host:port.
    pub server: String,

    /// Upgrade path on the relay.
    pub path: String,

    /// Bearer token presented on the dial.
    pub access_token: String,

    /// Dial with wss/https instead of ws/http.
    pub secure: bool,
}

impl Config {
    /// WebSocket URL for the tunnel dial.
    pub fn websocket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}{}", scheme, self.server, self.path)
    }

    /// Base HTTP URL of the relay.
    pub fn server_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let config = Config {
            target: "localhost:3000".to_string(),
            server: "bounce.example.com".to_string(),
            path: "/_websocket".to_string(),
            access_token: "t".to_string(),
            secure: true,
        };
        assert_eq!(config.websocket_url(), "wss://bounce.example.com/_websocket");
        assert_eq!(config.server_url(), "https://bounce.example.com");

        let plain = Config { secure: false, ..config };
        assert_eq!(plain.websocket_url(), "ws://bounce.example.com/_websocket");
        assert_eq!(plain.server_url(), "http://bounce.example.com");
    }
}
