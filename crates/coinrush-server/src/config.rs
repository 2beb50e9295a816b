use coinrush_lib::game_state::SimConfig;

pub const DEFAULT_PORT: u16 = 8080;

/// Process configuration. Only the port comes from the environment, the simulation
/// constants are fixed.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub sim: SimConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            sim: SimConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::with_port(std::env::var("PORT").ok().as_deref())
    }

    fn with_port(port: Option<&str>) -> Self {
        let port = match port {
            None => DEFAULT_PORT,
            Some(p) => p.trim().parse().unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid PORT {p:?} ({e}), using {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
        };
        Self {
            port,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Config, DEFAULT_PORT};

    #[test]
    fn port() {
        assert_eq!(Config::with_port(None).port, DEFAULT_PORT);
        assert_eq!(Config::with_port(Some("9001")).port, 9001);
        assert_eq!(Config::with_port(Some(" 9001\n")).port, 9001);
        assert_eq!(Config::with_port(Some("http")).port, DEFAULT_PORT);
        assert_eq!(Config::with_port(Some("70000")).port, DEFAULT_PORT);
    }

    #[test]
    fn simulation_defaults() {
        let config = Config::default();
        assert_eq!(config.sim.tick_rate, 60);
        assert_eq!(config.sim.arena.width, 800.);
        assert_eq!(config.sim.arena.height, 600.);
    }
}
