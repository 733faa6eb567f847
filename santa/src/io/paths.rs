//! Canonical file locations, resolved against the config file's directory.

use std::path::{Path, PathBuf};

use crate::io::config::SantaConfig;

#[derive(Debug, Clone)]
pub struct SantaPaths {
    pub root: PathBuf,
    pub state_path: PathBuf,
    pub maildir: PathBuf,
}

impl SantaPaths {
    pub fn new(config_path: &Path, cfg: &SantaConfig) -> Self {
        let root = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            state_path: root.join(&cfg.state_path),
            maildir: root.join(&cfg.inbox.maildir),
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let cfg = SantaConfig::default();
        let paths = SantaPaths::new(Path::new("/games/2026/santa.toml"), &cfg);
        assert_eq!(paths.root, PathBuf::from("/games/2026"));
        assert_eq!(
            paths.state_path,
            PathBuf::from("/games/2026/.santa/game_state.json")
        );
        assert_eq!(paths.maildir, PathBuf::from("/games/2026/Maildir"));
    }

    #[test]
    fn bare_file_name_uses_current_dir() {
        let paths = SantaPaths::new(Path::new("santa.toml"), &SantaConfig::default());
        assert_eq!(paths.root, PathBuf::from("."));
    }

    #[test]
    fn absolute_state_path_is_kept() {
        let cfg = SantaConfig {
            state_path: PathBuf::from("/var/lib/santa/state.json"),
            ..SantaConfig::default()
        };
        let paths = SantaPaths::new(Path::new("/etc/santa.toml"), &cfg);
        assert_eq!(paths.state_path, PathBuf::from("/var/lib/santa/state.json"));
    }
}
