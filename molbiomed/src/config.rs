// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::app::types::BackendId;

const APP_DIR_NAME: &str = "molbiomed";
const CONFIG_FILE_NAME: &str = "molbiomed.toml";
const CONFIG_ENV_VAR: &str = "MOLBIOMED_CONFIG_PATH";
const WORKSPACE_DIR_NAME: &str = "md_custom_workdir";
const STATE_DIR_NAME: &str = "state";
const PROTOCOLS_DIR_NAME: &str = "protocols";
const MMPBSA_DIR_NAME: &str = "mmpbsa";
const DEFAULT_SHELL: &str = "bash";
const DEFAULT_SSH_PORT: u16 = 22;
const DEFAULT_REMOTE_SUBMIT: &str = "sbatch";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    workspace_dir: Option<String>,
    state_dir: Option<String>,
    protocols_dir: Option<String>,
    mmpbsa_workdir: Option<String>,
    shell: Option<String>,
    verbose: Option<bool>,
    #[serde(default)]
    local: FileLocal,
    #[serde(default)]
    remotes: BTreeMap<String, FileRemote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLocal {
    submit_command: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRemote {
    host: String,
    user: String,
    port: Option<u16>,
    identity_path: Option<String>,
    work_dir: String,
    submit_command: Option<String>,
}

/// Connection and scheduler settings for one named cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_path: Option<PathBuf>,
    pub work_dir: String,
    pub submit_command: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalConfig {
    /// Scheduler used for local submissions; `None` launches the descriptor directly.
    pub submit_command: Option<String>,
}

#[derive(Debug)]
pub struct Config {
    pub workspace_dir: PathBuf,
    pub state_dir: PathBuf,
    pub protocols_dir: PathBuf,
    pub mmpbsa_workdir: PathBuf,
    pub shell: String,
    pub verbose: bool,
    pub local: LocalConfig,
    pub remotes: BTreeMap<String, RemoteConfig>,
    pub config_path: Option<PathBuf>,
}

impl Config {
    pub fn remote(&self, id: BackendId) -> Option<&RemoteConfig> {
        self.remotes.get(id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Override => "override",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile => "config",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub config_file_present: bool,
    pub workspace_dir: ConfigValue<PathBuf>,
    pub state_dir: ConfigValue<PathBuf>,
    pub protocols_dir: ConfigValue<PathBuf>,
    pub mmpbsa_workdir: ConfigValue<PathBuf>,
    pub shell: ConfigValue<String>,
    pub verbose: ConfigValue<bool>,
    pub remotes: Vec<String>,
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub workspace_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub protocols_dir: Option<PathBuf>,
    pub verbose: Option<bool>,
}

pub fn load(config_path_override: Option<PathBuf>, overrides: Overrides) -> Result<Config> {
    Ok(load_with_report(config_path_override, overrides)?.config)
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let (config_path, config_path_source, required) = match config_path_override {
        Some(path) => (Some(expand_path(path)), Some(ConfigSource::Override), true),
        None => match config_path_from_env()? {
            Some(path) => (Some(expand_path(path)), Some(ConfigSource::Env), true),
            None => match default_config_path().ok() {
                Some(path) => (Some(path), Some(ConfigSource::Default), false),
                None => (None, None, false),
            },
        },
    };
    let config_file_present = config_path
        .as_deref()
        .map(|path| path.exists())
        .unwrap_or(false);

    let file_config = match config_path.as_deref() {
        Some(path) => read_config_file(path, required)?,
        None => FileConfig::default(),
    };
    let base_dir = config_path.as_deref().and_then(|path| path.parent());

    let workspace_dir = resolve_dir(
        overrides.workspace_dir,
        file_config.workspace_dir.as_deref(),
        base_dir,
        WORKSPACE_DIR_NAME,
        "workspace_dir",
    )?;
    let state_dir = resolve_dir(
        overrides.state_dir,
        file_config.state_dir.as_deref(),
        base_dir,
        STATE_DIR_NAME,
        "state_dir",
    )?;
    let protocols_dir = resolve_dir(
        overrides.protocols_dir,
        file_config.protocols_dir.as_deref(),
        base_dir,
        PROTOCOLS_DIR_NAME,
        "protocols_dir",
    )?;
    let mmpbsa_workdir = resolve_dir(
        None,
        file_config.mmpbsa_workdir.as_deref(),
        base_dir,
        MMPBSA_DIR_NAME,
        "mmpbsa_workdir",
    )?;

    let (shell, shell_source) = match file_config
        .shell
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        Some(shell) => (shell, ConfigSource::ConfigFile),
        None => (DEFAULT_SHELL.to_string(), ConfigSource::Default),
    };

    let (verbose, verbose_source) = match overrides.verbose {
        Some(verbose) => (verbose, ConfigSource::Override),
        None => match file_config.verbose {
            Some(verbose) => (verbose, ConfigSource::ConfigFile),
            None => (false, ConfigSource::Default),
        },
    };

    let local = LocalConfig {
        submit_command: file_config
            .local
            .submit_command
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    };

    let mut remotes = BTreeMap::new();
    for (name, remote) in file_config.remotes {
        let id = BackendId::parse_supported(&name, REMOTE_BACKENDS)
            .with_context(|| format!("invalid [remotes.{name}] section"))?;
        remotes.insert(id.as_str().to_string(), build_remote(&name, remote, base_dir)?);
    }

    let config = Config {
        workspace_dir: workspace_dir.0,
        state_dir: state_dir.0,
        protocols_dir: protocols_dir.0,
        mmpbsa_workdir: mmpbsa_workdir.0,
        shell,
        verbose,
        local,
        remotes,
        config_path: config_path.clone(),
    };

    let report = ConfigReport {
        config_path,
        config_path_source,
        config_file_present,
        workspace_dir: ConfigValue {
            value: config.workspace_dir.clone(),
            source: workspace_dir.1,
        },
        state_dir: ConfigValue {
            value: config.state_dir.clone(),
            source: state_dir.1,
        },
        protocols_dir: ConfigValue {
            value: config.protocols_dir.clone(),
            source: protocols_dir.1,
        },
        mmpbsa_workdir: ConfigValue {
            value: config.mmpbsa_workdir.clone(),
            source: mmpbsa_workdir.1,
        },
        shell: ConfigValue {
            value: config.shell.clone(),
            source: shell_source,
        },
        verbose: ConfigValue {
            value: config.verbose,
            source: verbose_source,
        },
        remotes: config.remotes.keys().cloned().collect(),
    };

    Ok(LoadResult { config, report })
}

const REMOTE_BACKENDS: &[BackendId] = &[BackendId::Picard, BackendId::Csuc, BackendId::Slurm];

fn build_remote(name: &str, raw: FileRemote, base_dir: Option<&Path>) -> Result<RemoteConfig> {
    let host = raw.host.trim().to_string();
    if host.is_empty() {
        anyhow::bail!("[remotes.{name}] host must not be empty");
    }
    let user = raw.user.trim().to_string();
    if user.is_empty() {
        anyhow::bail!("[remotes.{name}] user must not be empty");
    }
    let port = raw.port.unwrap_or(DEFAULT_SSH_PORT);
    if port == 0 {
        anyhow::bail!("[remotes.{name}] port must be between 1 and 65535");
    }
    let work_dir = raw.work_dir.trim().to_string();
    if work_dir.is_empty() {
        anyhow::bail!("[remotes.{name}] work_dir must not be empty");
    }
    Ok(RemoteConfig {
        host,
        user,
        port,
        identity_path: raw
            .identity_path
            .as_deref()
            .map(|raw| resolve_path(raw, base_dir)),
        work_dir,
        submit_command: raw
            .submit_command
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_REMOTE_SUBMIT.to_string()),
    })
}

fn resolve_dir(
    override_value: Option<PathBuf>,
    file_value: Option<&str>,
    base_dir: Option<&Path>,
    default_name: &str,
    key: &str,
) -> Result<(PathBuf, ConfigSource)> {
    if let Some(path) = override_value {
        return Ok((expand_path(path), ConfigSource::Override));
    }
    if let Some(raw) = file_value {
        return Ok((resolve_path(raw, base_dir), ConfigSource::ConfigFile));
    }
    let path = default_data_dir()
        .with_context(|| format!("failed to resolve default {key}; set {key} in the config file"))?
        .join(default_name);
    Ok((path, ConfigSource::Default))
}

fn read_config_file(path: &Path, required: bool) -> Result<FileConfig> {
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return path;
    }
    match base_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn config_path_from_env() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) => {
            if value.is_empty() {
                anyhow::bail!("{CONFIG_ENV_VAR} is set but empty");
            }
            Ok(Some(PathBuf::from(value)))
        }
        None => Ok(None),
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("failed to resolve config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("failed to resolve data directory")?;
    Ok(base.join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        prev: Option<OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var_os(key);
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn clear(key: &'static str) -> Self {
            let prev = std::env::var_os(key);
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => {
                    // SAFETY: tests serialize env mutations with ENV_LOCK.
                    unsafe {
                        std::env::set_var(self.key, value);
                    }
                }
                None => {
                    // SAFETY: tests serialize env mutations with ENV_LOCK.
                    unsafe {
                        std::env::remove_var(self.key);
                    }
                }
            }
        }
    }

    const ALL_DIRS: &str = "workspace_dir = \"ws\"\nstate_dir = \"state\"\nprotocols_dir = \"/opt/protocols\"\nmmpbsa_workdir = \"~/mmpbsa\"\n";

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let config_dir = dir.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join("molbiomed.toml");
        fs::write(&config_path, body).unwrap();
        config_path
    }

    #[test]
    fn missing_optional_config_file_is_ok() {
        let dir = TempDir::new().unwrap();
        let cfg = read_config_file(&dir.path().join("missing.toml"), false).unwrap();
        assert!(cfg.workspace_dir.is_none());
        assert!(cfg.remotes.is_empty());
    }

    #[test]
    fn missing_required_config_file_errors() {
        let dir = TempDir::new().unwrap();
        let err = read_config_file(&dir.path().join("missing.toml"), true).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn resolves_relative_dirs_from_config_dir() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, ALL_DIRS);
        let config_dir = config_path.parent().unwrap().to_path_buf();

        let config = load(Some(config_path.clone()), Overrides::default()).unwrap();
        assert_eq!(config.workspace_dir, config_dir.join("ws"));
        assert_eq!(config.state_dir, config_dir.join("state"));
        assert_eq!(config.protocols_dir, PathBuf::from("/opt/protocols"));
        assert!(!config.mmpbsa_workdir.to_string_lossy().starts_with('~'));
        assert_eq!(config.shell, DEFAULT_SHELL);
        assert!(config.local.submit_command.is_none());
        assert_eq!(config.config_path, Some(config_path));
    }

    #[test]
    fn cli_overrides_take_precedence_over_file_config() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, &format!("{ALL_DIRS}verbose = false\n"));

        let LoadResult { config, report } = load_with_report(
            Some(config_path),
            Overrides {
                workspace_dir: Some(PathBuf::from("from_flag")),
                state_dir: None,
                protocols_dir: None,
                verbose: Some(true),
            },
        )
        .unwrap();

        assert_eq!(config.workspace_dir, PathBuf::from("from_flag"));
        assert_eq!(report.workspace_dir.source, ConfigSource::Override);
        assert_eq!(report.state_dir.source, ConfigSource::ConfigFile);
        assert!(config.verbose);
    }

    #[test]
    fn remotes_get_port_and_submitter_defaults() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            &format!(
                "{ALL_DIRS}\n[local]\nsubmit_command = \"sbatch\"\n\n[remotes.picard]\nhost = \"picard.example.org\"\nuser = \"alice\"\nwork_dir = \"/scratch/alice\"\nidentity_path = \"keys/id_ed25519\"\n\n[remotes.csuc]\nhost = \"login.csuc.cat\"\nuser = \"bob\"\nport = 2222\nwork_dir = \"/home/bob/md\"\nsubmit_command = \"/opt/slurm/bin/sbatch\"\n"
            ),
        );
        let config_dir = config_path.parent().unwrap().to_path_buf();

        let config = load(Some(config_path), Overrides::default()).unwrap();
        assert_eq!(config.local.submit_command.as_deref(), Some("sbatch"));

        let picard = config.remote(BackendId::Picard).unwrap();
        assert_eq!(picard.port, DEFAULT_SSH_PORT);
        assert_eq!(picard.submit_command, "sbatch");
        assert_eq!(
            picard.identity_path,
            Some(config_dir.join("keys").join("id_ed25519"))
        );

        let csuc = config.remote(BackendId::Csuc).unwrap();
        assert_eq!(csuc.port, 2222);
        assert_eq!(csuc.submit_command, "/opt/slurm/bin/sbatch");
        assert!(config.remote(BackendId::Slurm).is_none());
    }

    #[test]
    fn unknown_remote_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            &format!(
                "{ALL_DIRS}\n[remotes.local]\nhost = \"h\"\nuser = \"u\"\nwork_dir = \"/w\"\n"
            ),
        );
        let err = load(Some(config_path), Overrides::default()).unwrap_err();
        assert!(format!("{err:#}").contains("remotes.local"));
    }

    #[test]
    fn empty_remote_host_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            &format!(
                "{ALL_DIRS}\n[remotes.slurm]\nhost = \" \"\nuser = \"u\"\nwork_dir = \"/w\"\n"
            ),
        );
        let err = load(Some(config_path), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("host must not be empty"));
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, &format!("{ALL_DIRS}database_path = \"x\"\n"));
        let err = load(Some(config_path), Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn env_config_path_used_when_no_override() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::clear(CONFIG_ENV_VAR);
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, &format!("{ALL_DIRS}shell = \"/bin/bash\"\n"));
        let _env = EnvVarGuard::set(CONFIG_ENV_VAR, config_path.to_str().unwrap());

        let LoadResult { config, report } = load_with_report(None, Overrides::default()).unwrap();
        assert_eq!(config.shell, "/bin/bash");
        assert_eq!(config.config_path, Some(config_path));
        assert_eq!(report.config_path_source, Some(ConfigSource::Env));
        assert_eq!(report.shell.source, ConfigSource::ConfigFile);
    }

    #[test]
    fn cli_config_path_takes_precedence_over_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::clear(CONFIG_ENV_VAR);
        let dir = TempDir::new().unwrap();
        let env_path = dir.path().join("env.toml");
        let cli_path = dir.path().join("cli.toml");
        fs::write(&env_path, format!("{ALL_DIRS}shell = \"zsh\"\n")).unwrap();
        fs::write(&cli_path, format!("{ALL_DIRS}shell = \"bash\"\n")).unwrap();
        let _env = EnvVarGuard::set(CONFIG_ENV_VAR, env_path.to_str().unwrap());

        let LoadResult { config, report } =
            load_with_report(Some(cli_path.clone()), Overrides::default()).unwrap();
        assert_eq!(config.shell, "bash");
        assert_eq!(config.config_path, Some(cli_path));
        assert_eq!(report.config_path_source, Some(ConfigSource::Override));
    }

    #[test]
    fn empty_env_config_path_errors() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _env = EnvVarGuard::set(CONFIG_ENV_VAR, "");
        let err = load_with_report(None, Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("set but empty"));
    }
}
