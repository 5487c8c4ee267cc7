use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the snapshot directory.
pub const DIR_ENV: &str = "MODELTRACK_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where and how snapshots are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub pretty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            extension: default_extension(),
            pretty: false,
        }
    }
}

impl StorageConfig {
    /// `<directory>/<name>.<extension>`.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.{}", self.extension))
    }

    /// Anchor a relative directory at `root`.
    #[must_use]
    pub fn rooted_at(mut self, root: &Path) -> Self {
        if self.directory.is_relative() {
            self.directory = root.join(&self.directory);
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Overrides the project's storage directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub pretty: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub storage: StorageConfig,
}

/// Read `<project_root>/.modeltrack/config.toml`, or defaults if absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".modeltrack/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Read `<config_dir>/modeltrack/config.toml`, or defaults if absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_user_config_from(&config_dir.join("modeltrack/config.toml"))
}

fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project, user and environment settings.
///
/// Precedence for the storage directory: `MODELTRACK_DIR`, then the user
/// config, then the project config. Relative directories are anchored at
/// `project_root`.
///
/// # Errors
///
/// Returns an error if either config file fails to load.
pub fn resolve_config(project_root: &Path) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;
    let env_dir = env::var_os(DIR_ENV).map(PathBuf::from);

    let storage = resolve_storage(project_root, &project, &user, env_dir);
    tracing::debug!(directory = %storage.directory.display(), "resolved storage");

    Ok(EffectiveConfig {
        project,
        user,
        storage,
    })
}

fn resolve_storage(
    project_root: &Path,
    project: &ProjectConfig,
    user: &UserConfig,
    env_dir: Option<PathBuf>,
) -> StorageConfig {
    let mut storage = project.storage.clone();
    if let Some(pretty) = user.pretty {
        storage.pretty = pretty;
    }
    if let Some(dir) = env_dir
        .filter(|d| !d.as_os_str().is_empty())
        .or_else(|| user.directory.clone())
    {
        storage.directory = dir;
    }
    storage.rooted_at(project_root)
}

fn default_directory() -> PathBuf {
    PathBuf::from(".modeltrack/models")
}

fn default_extension() -> String {
    "snapshot".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.storage, StorageConfig::default());
        assert_eq!(cfg.storage.directory, PathBuf::from(".modeltrack/models"));
        assert_eq!(cfg.storage.extension, "snapshot");
        assert!(!cfg.storage.pretty);
    }

    #[test]
    fn project_config_parses_storage_table() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(root.path().join(".modeltrack")).expect("create dir");
        std::fs::write(
            root.path().join(".modeltrack/config.toml"),
            "[storage]\ndirectory = \"builds\"\npretty = true\n",
        )
        .expect("write config");

        let cfg = load_project_config(root.path()).expect("load");
        assert_eq!(cfg.storage.directory, PathBuf::from("builds"));
        assert_eq!(cfg.storage.extension, "snapshot");
        assert!(cfg.storage.pretty);
    }

    #[test]
    fn bad_project_config_names_the_file() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(root.path().join(".modeltrack")).expect("create dir");
        std::fs::write(root.path().join(".modeltrack/config.toml"), "[storage\n")
            .expect("write config");

        let err = load_project_config(root.path()).expect_err("parse must fail");
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn user_config_parses_overrides() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "directory = \"/srv/kits\"\npretty = true\n").expect("write");

        let cfg = load_user_config_from(&path).expect("load");
        assert_eq!(cfg.directory, Some(PathBuf::from("/srv/kits")));
        assert_eq!(cfg.pretty, Some(true));
    }

    #[test]
    fn env_beats_user_beats_project() {
        let root = Path::new("/work/kit");
        let project = ProjectConfig::default();
        let user = UserConfig {
            directory: Some(PathBuf::from("/home/me/kits")),
            pretty: Some(true),
        };

        let from_user = resolve_storage(root, &project, &user, None);
        assert_eq!(from_user.directory, PathBuf::from("/home/me/kits"));
        assert!(from_user.pretty);

        let from_env = resolve_storage(root, &project, &user, Some(PathBuf::from("/tmp/kits")));
        assert_eq!(from_env.directory, PathBuf::from("/tmp/kits"));

        let empty_env = resolve_storage(root, &project, &user, Some(PathBuf::new()));
        assert_eq!(empty_env.directory, PathBuf::from("/home/me/kits"));
    }

    #[test]
    fn relative_directory_is_anchored_at_root() {
        let root = Path::new("/work/kit");
        let storage = resolve_storage(root, &ProjectConfig::default(), &UserConfig::default(), None);
        assert_eq!(storage.directory, PathBuf::from("/work/kit/.modeltrack/models"));
        assert_eq!(
            storage.path_for("buggy"),
            PathBuf::from("/work/kit/.modeltrack/models/buggy.snapshot")
        );
    }
}
