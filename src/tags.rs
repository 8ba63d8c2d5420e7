use machine_learning::{MlErr, Result};
use ndarray::{ArrayView2, Axis};

use crate::architecture::N_TAGS;

/// The Million Song Dataset tags, in output order.
pub const TAGS: [&str; N_TAGS] = [
    "rock",
    "pop",
    "alternative",
    "indie",
    "electronic",
    "female vocalists",
    "dance",
    "00s",
    "alternative rock",
    "jazz",
    "beautiful",
    "metal",
    "chillout",
    "male vocalists",
    "classic rock",
    "soul",
    "indie rock",
    "Mellow",
    "electronica",
    "80s",
    "folk",
    "90s",
    "chill",
    "instrumental",
    "punk",
    "oldies",
    "blues",
    "hard rock",
    "ambient",
    "acoustic",
    "experimental",
    "female vocalist",
    "guitar",
    "Hip-Hop",
    "70s",
    "party",
    "country",
    "easy listening",
    "sexy",
    "catchy",
    "funk",
    "electro",
    "heavy metal",
    "Progressive rock",
    "60s",
    "rnb",
    "indie pop",
    "sad",
    "House",
    "happy",
];

/// Picks the most likely tags of every prediction.
///
/// # Arguments
/// * `preds` - A `(batch, 50)` matrix of tag probabilities.
/// * `top_n` - How many tags to keep per row.
///
/// # Returns
/// Per row, the `top_n` tags with their probability by decreasing probability, or an error if
/// the rows aren't 50 wide.
pub fn decode_predictions(
    preds: ArrayView2<f32>,
    top_n: usize,
) -> Result<Vec<Vec<(&'static str, f32)>>> {
    if preds.ncols() != N_TAGS {
        return Err(MlErr::SizeMismatch {
            what: "tag predictions",
            got: preds.ncols(),
            expected: N_TAGS,
        });
    }

    Ok(preds
        .axis_iter(Axis(0))
        .map(|row| {
            let mut tagged: Vec<_> = TAGS.iter().copied().zip(row.iter().copied()).collect();
            tagged.sort_by(|a, b| b.1.total_cmp(&a.1));
            tagged.truncate(top_n);
            tagged
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    #[test]
    fn orders_by_probability() {
        let mut preds = Array2::zeros((2, N_TAGS));
        preds[[0, 9]] = 0.9;
        preds[[0, 0]] = 0.4;
        preds[[0, 49]] = 0.7;
        preds[[1, 33]] = 1.;

        let decoded = decode_predictions(preds.view(), 3).unwrap();

        assert_eq!(decoded[0], [("jazz", 0.9), ("happy", 0.7), ("rock", 0.4)]);
        assert_eq!(decoded[1][0], ("Hip-Hop", 1.));
        assert_eq!(decoded[1].len(), 3);
    }

    #[test]
    fn top_n_is_capped_and_width_checked() {
        let preds = Array2::from_elem((1, N_TAGS), 0.5);
        assert_eq!(decode_predictions(preds.view(), 100).unwrap()[0].len(), N_TAGS);

        let narrow = Array2::<f32>::zeros((1, 10));
        assert!(decode_predictions(narrow.view(), 5).is_err());
    }
}
