use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port_str) =
            std::env::var("MOTION_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Ok(host) =
            std::env::var("MOTION_GATEWAY_HOST").or_else(|_| std::env::var("HOST"))
            && !host.is_empty()
        {
            self.gateway.host = host;
        }

        if let Ok(dir) = std::env::var("MOTION_GATEWAY_CACHE_DIR")
            && !dir.is_empty()
        {
            self.cache.dir = dir;
        }

        if let Ok(level) = std::env::var("MOTION_GATEWAY_LOG")
            && level.parse::<tracing::Level>().is_ok()
        {
            self.observability.log_level = level;
        }
    }
}
