use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The DOCWATCH_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/docwatch/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("DOCWATCH_DATA_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("docwatch")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Default settings file, used when `--config` is not given. It may
    /// not exist yet; [`Config::load`](crate::Config::load) then falls
    /// back to defaults.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Directory holding the committed inverted index.
    pub fn index_dir(&self) -> Result<PathBuf> {
        let path = self.root.join("index");
        std::fs::create_dir_all(&path)
            .map_err(|_| Error::DataDir(path.clone()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.config_file(), tmp.path().join("config.json"));
    }

    #[test]
    fn missing_config_file_loads_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert!(!dir.config_file().exists());
        let config = crate::Config::load(&dir.config_file()).unwrap();
        assert_eq!(config.max_results, crate::Config::default().max_results);
    }

    #[test]
    fn index_dir_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();
        let index = dir.index_dir().unwrap();

        assert!(index.exists());
        assert_eq!(index, tmp.path().join("index"));
    }
}
