use serde::Deserialize;

#[derive(Deserialize)]
pub struct NetworkConfig {
    /// Listening port when `--port` isn't passed.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum number of simultaneously registered actors.
    #[serde(default = "default_actors_limit")]
    pub actors_limit: usize,
}

fn default_port() -> u16 {
    35555
}

fn default_actors_limit() -> usize {
    2
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            actors_limit: default_actors_limit(),
        }
    }
}
