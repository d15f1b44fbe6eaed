//! Token estimation helpers
//!
//! The engine does not run a real tokenizer. Usage numbers feed cost
//! estimation and observability, not billing, so a coarse heuristic is
//! sufficient.

/// Estimate the token count of a text.
///
/// Roughly four characters per token for English prose.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() / 4) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimate_tokens_short_text() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn test_estimate_tokens_rounds_down() {
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("abcdefg"), 1);
    }
}
