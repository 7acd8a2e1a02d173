use anyhow::{bail, Result};
use ndarray::Array2;

use crate::features::positional::PositionalEncoder;

/// The twenty standard residues in the column order of the one-hot encoding.
pub const AMINO_ACIDS: [char; 20] = [
    'A', 'R', 'N', 'D', 'C', 'Q', 'E', 'G', 'H', 'I', 'L', 'K', 'M', 'F', 'P', 'S', 'T', 'W', 'Y',
    'V',
];

/// Residues plus the pad sentinel, i.e. the categories of every slot.
pub fn alphabet(pad: char) -> Vec<char> {
    let mut cats = AMINO_ACIDS.to_vec();
    cats.push(pad);
    cats
}

/// `W x 21` one-hot matrix of the positional profiles.
///
/// A character outside the alphabet is a data error.
pub fn positional_one_hot<S: AsRef<str>>(
    encoder: &PositionalEncoder,
    repeats: &[S],
) -> Result<Array2<f64>> {
    let cats = alphabet(encoder.pad());
    let width = encoder.width();
    let mut x = Array2::<f64>::zeros((repeats.len(), width * cats.len()));

    for (row, (slots, repeat)) in encoder.transform(repeats).into_iter().zip(repeats).enumerate() {
        for (slot, ch) in slots.into_iter().enumerate() {
            let Some(cat) = cats.iter().position(|&c| c == ch) else {
                bail!("unknown residue '{}' in repeat '{}' (row {})", ch, repeat.as_ref(), row);
            };
            x[[row, slot * cats.len() + cat]] = 1.0;
        }
    }
    Ok(x)
}
