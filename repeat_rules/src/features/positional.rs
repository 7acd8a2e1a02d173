/// Right-aligns repeats into `width` slots, left-padding with `pad`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionalEncoder {
    width: usize,
    pad: char,
}

impl PositionalEncoder {
    pub fn new(width: usize, pad: char) -> Self {
        Self { width, pad }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn pad(&self) -> char {
        self.pad
    }

    /// Keep the last `width` characters and left-pad to exactly `width` slots.
    pub fn encode(&self, repeat: &str) -> Vec<char> {
        let chars: Vec<char> = repeat.chars().collect();
        let tail = &chars[chars.len().saturating_sub(self.width)..];
        let mut slots = vec![self.pad; self.width - tail.len()];
        slots.extend_from_slice(tail);
        slots
    }

    pub fn transform<S: AsRef<str>>(&self, repeats: &[S]) -> Vec<Vec<char>> {
        repeats.iter().map(|r| self.encode(r.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAD;

    #[test]
    fn short_repeats_are_left_padded() {
        let enc = PositionalEncoder::new(5, PAD);
        assert_eq!(enc.encode("AN"), vec!['_', '_', '_', 'A', 'N']);
        for r in ["", "K", "KLV", "QRSTV"] {
            let slots = enc.encode(r);
            assert_eq!(slots.len(), 5);
            let pads = slots.iter().take_while(|&&c| c == PAD).count();
            assert_eq!(pads, 5 - r.len());
            let tail: String = slots[pads..].iter().collect();
            assert_eq!(tail, r);
        }
    }

    #[test]
    fn long_repeats_keep_the_suffix() {
        let enc = PositionalEncoder::new(3, PAD);
        assert_eq!(enc.encode("ABCDEFG"), vec!['E', 'F', 'G']);
    }

    #[test]
    fn empty_repeat_is_all_pad() {
        let enc = PositionalEncoder::new(4, PAD);
        assert_eq!(enc.encode(""), vec![PAD; 4]);
    }
}
