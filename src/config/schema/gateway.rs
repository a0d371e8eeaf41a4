use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Allow binding to non-localhost addresses (default: false)
    #[serde(default)]
    pub allow_public_bind: bool,
    /// Concurrent control sessions accepted before new ones are refused
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Outbound messages buffered per session before broadcasts drop
    #[serde(default = "default_session_queue")]
    pub session_queue: usize,
    /// Browser origins allowed to call the HTTP endpoints (empty: no CORS layer)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_max_sessions() -> usize {
    64
}

fn default_session_queue() -> usize {
    64
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            allow_public_bind: false,
            max_sessions: default_max_sessions(),
            session_queue: default_session_queue(),
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_config() {
        let config = GatewayConfig::default();

        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "127.0.0.1");
        assert!(!config.allow_public_bind);
        assert_eq!(config.max_sessions, 64);
        assert_eq!(config.session_queue, 64);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn gateway_config_toml_round_trip() {
        let original = GatewayConfig {
            port: 4001,
            host: "0.0.0.0".into(),
            allow_public_bind: true,
            max_sessions: 3,
            session_queue: 8,
            cors_origins: vec!["http://localhost:5173".into()],
        };

        let toml = toml::to_string(&original).unwrap();
        let decoded: GatewayConfig = toml::from_str(&toml).unwrap();

        assert_eq!(decoded.port, original.port);
        assert_eq!(decoded.host, original.host);
        assert_eq!(decoded.allow_public_bind, original.allow_public_bind);
        assert_eq!(decoded.max_sessions, original.max_sessions);
        assert_eq!(decoded.session_queue, original.session_queue);
        assert_eq!(decoded.cors_origins, original.cors_origins);
    }

    #[test]
    fn partial_section_fills_defaults() {
        let decoded: GatewayConfig = toml::from_str("port = 9100").unwrap();
        assert_eq!(decoded.port, 9100);
        assert_eq!(decoded.host, "127.0.0.1");
        assert_eq!(decoded.session_queue, 64);
    }
}
