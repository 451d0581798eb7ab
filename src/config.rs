use mdholo_server::HostConfig;
use std::{fs, path::Path};
use tracing::warn;

pub const DEFAULT_HOST_CONFIG_PATH: &str = "config/host.toml";

/// Load host configuration from `path`, falling back to defaults on errors.
pub fn load_host_config(path: &Path) -> HostConfig {
    match fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<HostConfig>(&contents) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("Failed to parse {}: {err}. Using defaults", path.display());
                HostConfig::default()
            }
        },
        Err(err) => {
            if path != Path::new(DEFAULT_HOST_CONFIG_PATH)
                || err.kind() != std::io::ErrorKind::NotFound
            {
                warn!("Failed to read {}: {err}. Using defaults", path.display());
            } else {
                warn!(
                    "Host config not found at {}. Using defaults",
                    path.display()
                );
            }
            HostConfig::default()
        }
    }
}
