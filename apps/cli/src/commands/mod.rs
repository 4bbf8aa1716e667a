//! CLI command implementations.

mod chat;
mod countries;
mod state;

pub use chat::chat;
pub use countries::countries;
pub use state::{reset, status};

use anyhow::{Context as _, Result};
use widget_config_and_utils::{Config, Paths, Secrets};
use widget_storage::FileStateStore;

/// Everything a command needs from the environment.
pub struct Context {
    pub paths: Paths,
    pub config: Config,
    pub secrets: Secrets,
}

impl Context {
    /// Resolve paths, read `config.json` and pick up credentials from the
    /// environment.
    pub fn load() -> Result<Self> {
        let paths = Paths::new().context("cannot resolve the biogate directory")?;
        paths.ensure_dirs()?;
        let config = Config::load(&paths).context("invalid configuration")?;
        Ok(Self {
            paths,
            config,
            secrets: Secrets::from_env(),
        })
    }

    /// The store the interactive widget persists to.
    fn state_store(&self) -> FileStateStore {
        FileStateStore::new(self.paths.state_file())
    }
}
