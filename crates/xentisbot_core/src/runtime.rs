use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const CONFIG_FILENAME: &str = "xentisbot.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Flag,
    Env,
    Default,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Env => "env",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub config: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub cwd: PathBuf,
}

impl ResolutionContext {
    pub fn from_process() -> Result<Self> {
        let cwd = env::current_dir().context("failed to read current directory")?;
        Ok(Self { cwd })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub config_source: ValueSource,
    pub data_source: ValueSource,
}

impl ResolvedPaths {
    pub fn diagnostics(&self) -> String {
        format!(
            "config_path={} ({})\ndata_dir={} ({})",
            normalize_for_display(&self.config_path),
            self.config_source.as_str(),
            normalize_for_display(&self.data_dir),
            self.data_source.as_str(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeStatus {
    pub config_exists: bool,
    pub data_dir_exists: bool,
    pub warnings: Vec<String>,
}

pub fn inspect_runtime(paths: &ResolvedPaths) -> RuntimeStatus {
    let config_exists = paths.config_path.exists();
    let data_dir_exists = paths.data_dir.is_dir();

    let mut warnings = Vec::new();
    if !config_exists {
        warnings.push(format!(
            "{} is missing; running with defaults (create it with `xentisbot init`)",
            normalize_for_display(&paths.config_path)
        ));
    }
    if !data_dir_exists {
        warnings.push(format!(
            "data directory {} is missing; relative source paths will not load",
            normalize_for_display(&paths.data_dir)
        ));
    }

    RuntimeStatus {
        config_exists,
        data_dir_exists,
        warnings,
    }
}

pub fn resolve_paths(context: &ResolutionContext, overrides: &PathOverrides) -> ResolvedPaths {
    resolve_paths_with_lookup(context, overrides, |key| env::var(key).ok())
}

/// Config: flag > XENTISBOT_CONFIG > `<cwd>/xentisbot.toml`.
/// Data directory: flag > XENTISBOT_DATA_DIR > directory of the config file.
pub fn resolve_paths_with_lookup<F>(
    context: &ResolutionContext,
    overrides: &PathOverrides,
    lookup_env: F,
) -> ResolvedPaths
where
    F: Fn(&str) -> Option<String>,
{
    let env_path = |key: &str| {
        lookup_env(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    };

    let (config_path, config_source) = if let Some(path) = overrides.config.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(path) = env_path("XENTISBOT_CONFIG") {
        (absolutize(&path, &context.cwd), ValueSource::Env)
    } else {
        (context.cwd.join(CONFIG_FILENAME), ValueSource::Default)
    };

    let (data_dir, data_source) = if let Some(path) = overrides.data_dir.as_deref() {
        (absolutize(path, &context.cwd), ValueSource::Flag)
    } else if let Some(path) = env_path("XENTISBOT_DATA_DIR") {
        (absolutize(&path, &context.cwd), ValueSource::Env)
    } else {
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| context.cwd.clone());
        (config_dir, ValueSource::Default)
    };

    ResolvedPaths {
        config_path,
        data_dir,
        config_source,
        data_source,
    }
}

/// Write the commented default config. Returns `false` when a config exists and
/// `force` is not set.
pub fn init_config(paths: &ResolvedPaths, force: bool) -> Result<bool> {
    write_text_file(&paths.config_path, &render_default_config(), force)
}

pub fn render_default_config() -> String {
    "# xentisbot configuration (written by `xentisbot init`)\n\
     # Relative source paths resolve against the data directory.\n\
     \n\
     [bot]\n\
     name = \"xentisbot\"\n\
     # user_id = \"U0123456\"\n\
     # admin_user = \"admin\"\n\
     observed_channels = []\n\
     \n\
     [sources]\n\
     # schema = \"xentis_schema.xml\"\n\
     # key_migration = \"keymigration.xml\"\n\
     # syscodes = \"syscodes.txt\"\n\
     # syssubsets = \"syssubsets.txt\"\n\
     \n\
     # [[sources.glossary]]\n\
     # source = \"messages_en.properties\"\n\
     # target = \"messages_de.properties\"\n\
     \n\
     [servers]\n\
     search_hosts = []\n\
     # search_command = \"xentis stat\"\n\
     # prefix_host = \"pdvmapp\"\n\
     # prefix_command = \"xentis stat\"\n\
     # prefix_user = \"xen\"\n\
     # connect_timeout_secs = 10\n\
     \n\
     [db_status]\n\
     # url = \"http://dbstatus.example/overview.html\"\n\
     # timeout_ms = 30000\n\
     # user_agent = \"xentisbot/0.2\"\n"
        .to_string()
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn write_text_file(path: &Path, content: &str, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }

    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create parent directory {}", parent.display()))?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

pub fn normalize_for_display(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
