use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{debug, info};
use machine_learning::arch::DataFormat;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaggerError};

/// Overrides the directory holding `config.json` and the downloaded models.
pub const HOME_VAR: &str = "AUDIO_CONV_RNN_HOME";
/// Overrides the configured backend.
pub const BACKEND_VAR: &str = "AUDIO_CONV_RNN_BACKEND";
/// Overrides the configured data format.
pub const DATA_FORMAT_VAR: &str = "AUDIO_CONV_RNN_DATA_FORMAT";

const CONFIG_FILE: &str = "config.json";

/// The numeric backend the pretrained weights were exported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Theano,
    #[default]
    Tensorflow,
}

impl FromStr for Backend {
    type Err = TaggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "theano" => Ok(Backend::Theano),
            "tensorflow" => Ok(Backend::Tensorflow),
            other => Err(TaggerError::InvalidConfig(format!(
                "unknown backend `{other}`, expected theano or tensorflow"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Theano => write!(f, "theano"),
            Backend::Tensorflow => write!(f, "tensorflow"),
        }
    }
}

/// A read-only snapshot of the process-wide backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    #[serde(alias = "image_dim_ordering")]
    pub image_data_format: DataFormat,
    pub backend: Backend,
    /// Seeds the random initialization of the layers.
    pub seed: Option<u64>,
    /// Where `config.json` and the `models` cache live.
    #[serde(skip)]
    pub home: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            image_data_format: DataFormat::default(),
            backend: Backend::default(),
            seed: None,
            home: default_home(),
        }
    }
}

impl BackendConfig {
    /// Loads the configuration of this process: `config.json` under the default home and the
    /// environment overrides on top.
    pub fn load() -> Result<Self> {
        Self::load_from(default_home())?.apply_overrides(|var| env::var(var).ok())
    }

    /// Reads `<home>/config.json`, falling back to the defaults if it doesn't exist.
    ///
    /// # Returns
    /// The configuration or an error if the file exists but can't be read or parsed.
    pub fn load_from<P: Into<PathBuf>>(home: P) -> Result<Self> {
        let home = home.into();
        let path = home.join(CONFIG_FILE);

        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => {
                debug!("reading backend config from {}", path.display());
                serde_json::from_str::<Self>(&contents).map_err(|e| {
                    TaggerError::InvalidConfig(format!("{}: {e}", path.display()))
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };

        config.home = home;
        Ok(config)
    }

    /// Applies the environment overrides.
    ///
    /// # Arguments
    /// * `var` - Looks up an environment variable.
    pub fn apply_overrides<F>(mut self, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = var(BACKEND_VAR) {
            self.backend = backend.parse()?;
        }

        if let Some(format) = var(DATA_FORMAT_VAR) {
            self.image_data_format = format
                .parse()
                .map_err(|e| TaggerError::InvalidConfig(format!("{DATA_FORMAT_VAR}: {e}")))?;
        }

        info!(
            "backend config loaded: backend={} format={}",
            self.backend, self.image_data_format
        );
        Ok(self)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }
}

/// `$AUDIO_CONV_RNN_HOME`, else `$HOME/.audio-conv-rnn`, else the same under the temp dir.
pub fn default_home() -> PathBuf {
    if let Some(home) = env::var_os(HOME_VAR) {
        return PathBuf::from(home);
    }

    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
        .join(".audio-conv-rnn")
}
