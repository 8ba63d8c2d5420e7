use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::{debug, info};

use crate::{
    config::Backend,
    error::{Result, TaggerError},
};

// Both point at the published Keras HDF5 files. The cache only reads safetensors, so these are
// informative: a working cache is pre-seeded with converted weights under
// `<home>/models/<WeightsOrigin::file_name>`.
pub const THEANO_WEIGHTS_URL: &str =
    "https://github.com/keunwoochoi/music-auto_tagging-keras/blob/master/data/rnn_weights_theano.hdf5";
pub const TENSORFLOW_WEIGHTS_URL: &str =
    "https://github.com/keunwoochoi/music-auto_tagging-keras/blob/master/data/rnn_weights_tensorflow.hdf5";

/// Subdirectory of the home the weights are cached in.
pub const CACHE_SUBDIR: &str = "models";

/// Which parameters to start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weights {
    /// Pretrained on the Million Song Dataset.
    Msd,
}

impl FromStr for Weights {
    type Err = TaggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "msd" => Ok(Weights::Msd),
            other => Err(TaggerError::InvalidArgument(format!(
                "the `weights` argument should be either absent (random initialization) or \
                 `msd` (pre-training on the Million Song Dataset), got `{other}`"
            ))),
        }
    }
}

impl fmt::Display for Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weights::Msd => write!(f, "msd"),
        }
    }
}

/// Where the pretrained weights for a backend come from.
///
/// `file_name` is the safetensors file looked up in the cache, keyed `"{layer}.{param}"`.
/// `url` is the upstream HDF5 release of the same weights. It is only fetched when the cache
/// is empty, and since it isn't safetensors the load then fails with `TaggerError::Weights`,
/// so the cache has to be pre-seeded with converted weights. The Theano file stores its
/// convolution kernels flipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightsOrigin {
    pub file_name: &'static str,
    pub url: &'static str,
}

impl WeightsOrigin {
    pub fn for_backend(backend: Backend) -> Self {
        match backend {
            Backend::Theano => Self {
                file_name: "rnn_weights_theano.safetensors",
                url: THEANO_WEIGHTS_URL,
            },
            Backend::Tensorflow => Self {
                file_name: "rnn_weights_tensorflow.safetensors",
                url: TENSORFLOW_WEIGHTS_URL,
            },
        }
    }
}

/// Returns the path of a cached file, downloading it first if it isn't cached yet.
///
/// # Arguments
/// * `fname` - The name of the file in the cache.
/// * `origin` - Where to download it from.
/// * `cache_subdir` - The cache directory, relative to `home`.
/// * `home` - The root of every cache.
///
/// # Returns
/// The path of the file or an error if the download failed, in which case nothing is left in
/// the cache.
pub fn get_file(fname: &str, origin: &str, cache_subdir: &str, home: &Path) -> Result<PathBuf> {
    let dir = home.join(cache_subdir);
    let path = dir.join(fname);

    if path.exists() {
        debug!("using cached {}", path.display());
        return Ok(path);
    }

    fs::create_dir_all(&dir)?;
    info!("downloading {fname} from {origin}");

    let part = dir.join(format!("{fname}.part"));
    if let Err(e) = download(origin, &part).and_then(|()| Ok(fs::rename(&part, &path)?)) {
        let _ = fs::remove_file(&part);
        return Err(e);
    }

    info!("saved {}", path.display());
    Ok(path)
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let wrap = |source| TaggerError::Download {
        url: url.to_string(),
        source,
    };

    let bytes = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .map_err(wrap)?;

    debug!(bytes = bytes.len(); "downloaded {url}");
    fs::write(dest, &bytes)?;
    Ok(())
}
