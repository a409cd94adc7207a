//! Built-in trial generators

use std::sync::Arc;

use campaign_core::{CampaignConfig, TrialError, TrialGenerator, TrialInput};
use serde_json::Value;

/// Numbered inputs: `{prefix}{sequence}`, optionally zero-padded
///
/// The `prefix` campaign parameter, when set to a string, replaces the
/// generator's own prefix.
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    prefix: String,
    width: usize,
}

impl SequenceGenerator {
    /// Create a generator with the given prefix and no padding
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            width: 0,
        }
    }

    /// Zero-pad the sequence number to `width` digits
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

impl TrialGenerator for SequenceGenerator {
    fn name(&self) -> &str {
        "sequence"
    }

    fn generate(&self, sequence: u64, config: &CampaignConfig) -> Result<TrialInput, TrialError> {
        let prefix = config
            .param("prefix")
            .and_then(Value::as_str)
            .unwrap_or(&self.prefix);
        Ok(TrialInput::new(format!(
            "{prefix}{sequence:0width$}",
            width = self.width
        )))
    }
}

/// Walks a wordlist in order, one candidate per trial
///
/// A `wordlist` campaign parameter holding an array of strings takes
/// precedence over the built-in list. Once the list is exhausted, further
/// trials fail with a generation error unless cycling is enabled.
#[derive(Debug, Clone)]
pub struct WordlistGenerator {
    words: Arc<[String]>,
    cycle: bool,
}

impl WordlistGenerator {
    /// Create a generator over `words`
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
            cycle: false,
        }
    }

    /// Start over from the first word once the list is exhausted
    pub fn cycling(mut self, cycle: bool) -> Self {
        self.cycle = cycle;
        self
    }

    /// Number of built-in words
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the built-in list is empty
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn index(&self, sequence: u64, len: usize) -> Result<usize, TrialError> {
        if len == 0 {
            return Err(TrialError::Generation("wordlist is empty".into()));
        }
        let offset = usize::try_from(sequence.saturating_sub(1)).unwrap_or(usize::MAX);
        if self.cycle {
            Ok(offset % len)
        } else if offset < len {
            Ok(offset)
        } else {
            Err(TrialError::Generation(format!(
                "wordlist exhausted after {len} entries"
            )))
        }
    }
}

impl TrialGenerator for WordlistGenerator {
    fn name(&self) -> &str {
        "wordlist"
    }

    fn generate(&self, sequence: u64, config: &CampaignConfig) -> Result<TrialInput, TrialError> {
        if let Some(list) = config.param("wordlist").and_then(Value::as_array) {
            let index = self.index(sequence, list.len())?;
            return list[index].as_str().map(TrialInput::new).ok_or_else(|| {
                TrialError::Generation(format!("wordlist entry {index} is not a string"))
            });
        }

        let index = self.index(sequence, self.words.len())?;
        Ok(TrialInput::new(self.words[index].as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::{CampaignBounds, TrialRate};
    use serde_json::json;

    fn config() -> CampaignConfig {
        CampaignConfig::new(TrialRate::PerSecond(1.0), CampaignBounds::attempts(10))
    }

    #[test]
    fn test_sequence_generator() {
        let generator = SequenceGenerator::new("pkt-");
        let input = generator.generate(7, &config()).unwrap();
        assert_eq!(input.as_str(), "pkt-7");

        let padded = SequenceGenerator::new("").with_width(4);
        assert_eq!(padded.generate(42, &config()).unwrap().as_str(), "0042");
    }

    #[test]
    fn test_sequence_prefix_param() {
        let generator = SequenceGenerator::new("pkt-");
        let config = config().with_param("prefix", json!("syn-"));
        assert_eq!(generator.generate(1, &config).unwrap().as_str(), "syn-1");
    }

    #[test]
    fn test_wordlist_in_order_then_exhausted() {
        let generator = WordlistGenerator::new(["alpha", "bravo"]);
        let config = config();

        assert_eq!(generator.generate(1, &config).unwrap().as_str(), "alpha");
        assert_eq!(generator.generate(2, &config).unwrap().as_str(), "bravo");
        assert!(matches!(
            generator.generate(3, &config),
            Err(TrialError::Generation(_))
        ));
    }

    #[test]
    fn test_wordlist_cycling() {
        let generator = WordlistGenerator::new(["alpha", "bravo"]).cycling(true);
        assert_eq!(generator.generate(3, &config()).unwrap().as_str(), "alpha");
        assert_eq!(generator.generate(4, &config()).unwrap().as_str(), "bravo");
    }

    #[test]
    fn test_wordlist_param_overrides_builtin() {
        let generator = WordlistGenerator::new(["alpha"]);
        let config = config().with_param("wordlist", json!(["hunter2", 7]));

        assert_eq!(generator.generate(1, &config).unwrap().as_str(), "hunter2");
        assert!(generator.generate(2, &config).is_err());
        assert!(generator.generate(3, &config).is_err());
    }

    #[test]
    fn test_empty_wordlist() {
        let generator = WordlistGenerator::new(Vec::<String>::new());
        assert!(generator.is_empty());
        assert!(generator.generate(1, &config()).is_err());
    }
}
