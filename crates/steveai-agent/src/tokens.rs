//! Heuristic token estimation

/// Converts text to an approximate token count. Swap in a real tokenizer by
/// implementing this trait.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// `ceil(chars * tokens_per_char)`; no tokenizer involved.
#[derive(Clone, Copy, Debug)]
pub struct CharRatioEstimator {
    tokens_per_char: f64,
}

impl CharRatioEstimator {
    pub fn new(tokens_per_char: f64) -> Self {
        Self { tokens_per_char }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        (text.chars().count() as f64 * self.tokens_per_char).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimation() {
        let est = CharRatioEstimator::default();
        assert_eq!(est.estimate(""), 0);
        assert_eq!(est.estimate("hi"), 1);
        assert_eq!(est.estimate("hello"), 2);
        assert_eq!(est.estimate("hello world"), 3);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let est = CharRatioEstimator::default();
        assert_eq!(est.estimate("éééé"), 1);
    }
}
