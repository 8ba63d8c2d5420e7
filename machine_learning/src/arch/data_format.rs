use std::{fmt, str::FromStr};

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// How the axes of an image-like 4D tensor are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    /// `(batch, channels, rows, cols)`.
    #[serde(alias = "th")]
    ChannelsFirst,
    /// `(batch, rows, cols, channels)`.
    #[default]
    #[serde(alias = "tf")]
    ChannelsLast,
}

/// Axis indices of a 4D tensor, counted with the batch axis at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Axes {
    pub channel: usize,
    pub rows: usize,
    pub cols: usize,
}

impl DataFormat {
    /// Returns where each of the non-batch axes lives for this format.
    pub fn axes(self) -> Axes {
        match self {
            DataFormat::ChannelsFirst => Axes {
                channel: 1,
                rows: 2,
                cols: 3,
            },
            DataFormat::ChannelsLast => Axes {
                channel: 3,
                rows: 1,
                cols: 2,
            },
        }
    }

    /// Orders a `(channels, rows, cols)` triple as a non-batch shape for this format.
    pub fn image_shape(self, channels: usize, rows: usize, cols: usize) -> Vec<usize> {
        match self {
            DataFormat::ChannelsFirst => vec![channels, rows, cols],
            DataFormat::ChannelsLast => vec![rows, cols, channels],
        }
    }

    /// Splits a non-batch image shape into `(channels, rows, cols)`.
    ///
    /// # Arguments
    /// * `shape` - A rank 3 shape, batch axis excluded.
    ///
    /// # Returns
    /// The triple or an error if the shape isn't rank 3.
    pub fn split_shape(self, shape: &[usize]) -> Result<(usize, usize, usize)> {
        let &[a, b, c] = shape else {
            return Err(MlErr::InvalidShape {
                what: "image",
                shape: shape.to_vec(),
            });
        };

        Ok(match self {
            DataFormat::ChannelsFirst => (a, b, c),
            DataFormat::ChannelsLast => (c, a, b),
        })
    }

    /// Brings a batch of images in this format to `(batch, channels, rows, cols)`.
    pub fn to_channels_first(self, x: Array4<f32>) -> Array4<f32> {
        match self {
            DataFormat::ChannelsFirst => x,
            DataFormat::ChannelsLast => x.permuted_axes([0, 3, 1, 2]),
        }
    }

    /// Inverse of [`DataFormat::to_channels_first`].
    pub fn from_channels_first(self, x: Array4<f32>) -> Array4<f32> {
        match self {
            DataFormat::ChannelsFirst => x,
            DataFormat::ChannelsLast => x.permuted_axes([0, 2, 3, 1]),
        }
    }
}

impl FromStr for DataFormat {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "channels_first" | "th" => Ok(DataFormat::ChannelsFirst),
            "channels_last" | "tf" => Ok(DataFormat::ChannelsLast),
            other => Err(MlErr::InvalidSpec(format!(
                "unknown data format `{other}`, expected channels_first (th) or channels_last (tf)"
            ))),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::ChannelsFirst => write!(f, "channels_first"),
            DataFormat::ChannelsLast => write!(f, "channels_last"),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array;

    use super::*;

    #[test]
    fn axes_per_format() {
        let th = DataFormat::ChannelsFirst.axes();
        assert_eq!((th.channel, th.rows, th.cols), (1, 2, 3));

        let tf = DataFormat::ChannelsLast.axes();
        assert_eq!((tf.channel, tf.rows, tf.cols), (3, 1, 2));
    }

    #[test]
    fn image_shape_round_trips_through_split() {
        for format in [DataFormat::ChannelsFirst, DataFormat::ChannelsLast] {
            let shape = format.image_shape(1, 96, 1366);
            assert_eq!(format.split_shape(&shape).unwrap(), (1, 96, 1366));
        }

        assert_eq!(DataFormat::ChannelsLast.image_shape(1, 96, 1366), [96, 1366, 1]);
        assert!(DataFormat::ChannelsFirst.split_shape(&[1, 2]).is_err());
    }

    #[test]
    fn channels_last_permutation() {
        let x = Array::from_shape_fn((1, 2, 3, 4), |(_, r, c, ch)| (r * 100 + c * 10 + ch) as f32);
        let first = DataFormat::ChannelsLast.to_channels_first(x.clone());

        assert_eq!(first.shape(), [1, 4, 2, 3]);
        assert_eq!(first[[0, 3, 1, 2]], 123.);

        let back = DataFormat::ChannelsLast.from_channels_first(first);
        assert_eq!(back, x);
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("th".parse::<DataFormat>().unwrap(), DataFormat::ChannelsFirst);
        assert_eq!("channels_last".parse::<DataFormat>().unwrap(), DataFormat::ChannelsLast);
        assert!("nchw".parse::<DataFormat>().is_err());

        let parsed: DataFormat = serde_json::from_str("\"tf\"").unwrap();
        assert_eq!(parsed, DataFormat::ChannelsLast);
    }
}
