//! Directory management for the seeder.

use crate::{
    args::DataDirArgs,
    constants::{CONFIG_FILE_NAME, DATA_DIR_MODE, DEFAULT_DATA_DIR_NAME},
};
use directories::BaseDirs;
use eyre::{Result, WrapErr};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Returns the default data directory, `$HOME/.seeder`.
pub fn default_data_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(DEFAULT_DATA_DIR_NAME))
}

/// Resolved data directory.
#[derive(Debug, Clone)]
pub struct DataDirs {
    /// Root data directory
    pub root: PathBuf,
}

impl DataDirs {
    /// Resolve the data directory from command line args and make sure it exists.
    pub fn new(args: &DataDirArgs) -> Result<Self> {
        let root = args
            .datadir
            .clone()
            .unwrap_or_else(|| default_data_dir().unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR_NAME)));

        create_private_dir(&root)
            .wrap_err_with(|| format!("Failed to create directory {}", root.display()))?;

        Ok(Self { root })
    }

    /// Returns the path to the config file.
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }
}

fn create_private_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DATA_DIR_MODE);
    }

    builder.create(path)
}
