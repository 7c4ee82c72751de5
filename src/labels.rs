//! Stance labels and the extraction of a label from a model reply.

use crate::error::{Result, StanceError};

/// A classified stance.
///
/// The extraction procedure cannot guarantee the model answered with one of
/// the three expected words, so anything else is kept as [`StanceLabel::Unknown`]
/// with the offending token preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StanceLabel {
    Favor,
    Neutral,
    Oppose,
    /// The reply's trailing token was not a recognized stance word.
    Unknown(String),
}

impl StanceLabel {
    /// Map an already-lowercased token onto the closed label set.
    pub fn parse(token: &str) -> Self {
        match token {
            "favor" => StanceLabel::Favor,
            "neutral" => StanceLabel::Neutral,
            "oppose" => StanceLabel::Oppose,
            other => StanceLabel::Unknown(other.to_string()),
        }
    }

    /// The string written to the output table.
    ///
    /// Unrecognized tokens pass through unchanged, matching what a reader of
    /// the output column would have seen from the raw model reply.
    pub fn as_str(&self) -> &str {
        match self {
            StanceLabel::Favor => "favor",
            StanceLabel::Neutral => "neutral",
            StanceLabel::Oppose => "oppose",
            StanceLabel::Unknown(raw) => raw,
        }
    }

    /// Sentinel recorded when an item failed to produce any label.
    pub fn unknown() -> Self {
        StanceLabel::Unknown("unknown".to_string())
    }
}

impl std::fmt::Display for StanceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reduces a free-text model reply to a [`StanceLabel`].
///
/// The reply's last whitespace-separated token is lowercased and matched
/// against the label set. Models often end a sentence with the answer
/// ("I would say Oppose."), so trailing ASCII punctuation is trimmed from the
/// token by default; disable `strip_punctuation` to keep the token exactly as
/// produced.
#[derive(Debug, Clone)]
pub struct LabelExtractor {
    pub strip_punctuation: bool,
}

impl Default for LabelExtractor {
    fn default() -> Self {
        Self {
            strip_punctuation: true,
        }
    }
}

impl LabelExtractor {
    pub fn new(strip_punctuation: bool) -> Self {
        Self { strip_punctuation }
    }

    /// Extract the label from one completion.
    ///
    /// Returns [`StanceError::EmptyCompletion`] when the reply contains no
    /// tokens at all.
    pub fn extract(&self, completion: &str) -> Result<StanceLabel> {
        let token = completion
            .split_whitespace()
            .last()
            .ok_or(StanceError::EmptyCompletion)?
            .to_lowercase();

        let candidate = if self.strip_punctuation {
            let trimmed = token.trim_end_matches(|c: char| c.is_ascii_punctuation());
            // An all-punctuation token would trim to nothing; keep it whole.
            if trimmed.is_empty() {
                token.as_str()
            } else {
                trimmed
            }
        } else {
            token.as_str()
        };

        Ok(StanceLabel::parse(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_token_is_lowercased() {
        let extractor = LabelExtractor::default();
        assert_eq!(
            extractor.extract("Answer: Oppose").unwrap(),
            StanceLabel::Oppose
        );
        assert_eq!(extractor.extract("FAVOR").unwrap(), StanceLabel::Favor);
    }

    #[test]
    fn trailing_punctuation_is_trimmed_by_default() {
        let extractor = LabelExtractor::default();
        assert_eq!(
            extractor.extract("The stance is Oppose.").unwrap(),
            StanceLabel::Oppose
        );
    }

    #[test]
    fn literal_policy_keeps_punctuation() {
        let extractor = LabelExtractor::new(false);
        assert_eq!(
            extractor.extract("The stance is Oppose.").unwrap(),
            StanceLabel::Unknown("oppose.".to_string())
        );
    }

    #[test]
    fn unrecognized_token_is_preserved() {
        let extractor = LabelExtractor::default();
        assert_eq!(
            extractor.extract("I cannot decide").unwrap(),
            StanceLabel::Unknown("decide".to_string())
        );
    }

    #[test]
    fn whitespace_only_reply_is_an_error() {
        let extractor = LabelExtractor::default();
        assert!(matches!(
            extractor.extract("   "),
            Err(StanceError::EmptyCompletion)
        ));
        assert!(matches!(
            extractor.extract(""),
            Err(StanceError::EmptyCompletion)
        ));
    }

    #[test]
    fn all_punctuation_token_is_kept_whole() {
        let extractor = LabelExtractor::default();
        assert_eq!(
            extractor.extract("..?!").unwrap(),
            StanceLabel::Unknown("..?!".to_string())
        );
    }

    #[test]
    fn label_strings_round_trip() {
        assert_eq!(StanceLabel::parse("favor").as_str(), "favor");
        assert_eq!(StanceLabel::parse("neutral").as_str(), "neutral");
        assert_eq!(StanceLabel::parse("oppose").as_str(), "oppose");
        assert_eq!(StanceLabel::parse("maybe").as_str(), "maybe");
        assert_eq!(StanceLabel::unknown().as_str(), "unknown");
    }
}
