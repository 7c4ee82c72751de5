use candle_core::Tensor;
use candle_transformers::generation::{LogitsProcessor as CandleLogitsProcessor, Sampling};

use crate::error::{Result, StanceError};
use crate::loaders::GenerationConfig;

pub use candle_transformers::utils::apply_repeat_penalty;

/// Combined prompt + completion token budget used when nothing overrides it.
pub const DEFAULT_MAX_TOTAL_TOKENS: usize = 50;

/// User overrides for generation parameters.
/// All fields are optional - only set fields will override model defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerationOverrides {
    pub temperature: Option<f64>,
    pub repeat_penalty: Option<f32>,
    pub repeat_last_n: Option<usize>,
    pub seed: Option<u64>,
    pub max_total_tokens: Option<usize>,
    pub num_return_sequences: Option<usize>,
    pub top_p: Option<f64>,
    pub top_k: Option<usize>,
    pub min_p: Option<f64>,
}

/// Resolved parameters controlling generation.
///
/// The decoding strategy is pinned explicitly: temperature and seed must be
/// supplied (by the caller or the model's `generation_config.json`) rather
/// than silently inherited from a library default, so a run is reproducible
/// from its configuration alone.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Randomness of sampling. 0.0 = greedy/deterministic.
    pub temperature: f64,
    /// Penalty for repeating tokens. 1.0 = no penalty.
    pub repeat_penalty: f32,
    /// Number of recent tokens to consider for repeat penalty.
    pub repeat_last_n: usize,
    /// Seed for the sampling RNG.
    pub seed: u64,
    /// Cap on combined prompt + completion length, in tokens.
    pub max_total_tokens: usize,
    /// Completions generated per conversation.
    pub num_return_sequences: usize,
    /// Nucleus sampling: only consider tokens with cumulative probability <= p.
    pub top_p: Option<f64>,
    /// Only consider the top k most likely tokens.
    pub top_k: Option<usize>,
    /// Filter tokens with probability < min_p * max_probability.
    pub min_p: Option<f64>,
}

impl GenerationParams {
    /// Resolve generation params from model config + user overrides.
    pub fn resolve(config: &GenerationConfig, overrides: &GenerationOverrides) -> Result<Self> {
        let temperature = overrides
            .temperature
            .or(config.temperature)
            .ok_or_else(|| {
                StanceError::Config(
                    "Missing 'temperature': set it explicitly or ensure the model's generation_config.json has it".into(),
                )
            })?;

        let seed = overrides.seed.ok_or_else(|| {
            StanceError::Config(
                "Missing 'seed': generation must be explicitly seeded for reproducible runs".into(),
            )
        })?;

        let max_total_tokens = overrides
            .max_total_tokens
            .unwrap_or(DEFAULT_MAX_TOTAL_TOKENS);
        if max_total_tokens == 0 {
            return Err(StanceError::Config(
                "'max_total_tokens' must be at least 1".into(),
            ));
        }

        let num_return_sequences = overrides.num_return_sequences.unwrap_or(1);
        if num_return_sequences == 0 {
            return Err(StanceError::Config(
                "'num_return_sequences' must be at least 1".into(),
            ));
        }

        let repeat_penalty = overrides
            .repeat_penalty
            .or(config.repeat_penalty)
            .unwrap_or(1.0);
        let repeat_last_n = overrides
            .repeat_last_n
            .or(config.repeat_last_n)
            .unwrap_or(64);

        let top_p = overrides.top_p.or(config.top_p);
        let top_k = overrides.top_k.or(config.top_k.map(|k| k as usize));
        let min_p = overrides.min_p.or(config.min_p);

        Ok(Self {
            temperature,
            repeat_penalty,
            repeat_last_n,
            seed,
            max_total_tokens,
            num_return_sequences,
            top_p,
            top_k,
            min_p,
        })
    }

    pub(crate) fn sampling_strategy(&self) -> Sampling {
        if self.temperature <= 0.0 {
            return Sampling::ArgMax;
        }

        let temperature = self.temperature.max(1e-7);
        let top_k = self.top_k.unwrap_or(0);
        let top_p = self.top_p.unwrap_or(1.0);

        match (top_k > 0, top_p < 1.0) {
            (true, true) => Sampling::TopKThenTopP {
                k: top_k,
                p: top_p,
                temperature,
            },
            (true, false) => Sampling::TopK {
                k: top_k,
                temperature,
            },
            (false, true) => Sampling::TopP {
                p: top_p,
                temperature,
            },
            (false, false) => Sampling::All { temperature },
        }
    }
}

pub struct LogitsProcessor {
    inner: CandleLogitsProcessor,
    min_p: Option<f32>,
}

impl LogitsProcessor {
    pub fn new(seed: u64, sampling: Sampling, min_p: Option<f64>) -> Self {
        Self {
            inner: CandleLogitsProcessor::from_sampling(seed, sampling),
            min_p: min_p.map(|p| p as f32),
        }
    }

    pub fn sample(&mut self, logits: &Tensor) -> candle_core::Result<u32> {
        let min_p = self.min_p;
        self.inner.sample_f(logits, |prs| {
            if let Some(min_p) = min_p {
                apply_min_p(prs, min_p);
            }
        })
    }
}

pub fn initialize_logits_processor(params: &GenerationParams) -> LogitsProcessor {
    LogitsProcessor::new(params.seed, params.sampling_strategy(), params.min_p)
}

fn apply_min_p(prs: &mut [f32], min_p: f32) {
    if min_p <= 0.0 || min_p >= 1.0 {
        return;
    }
    let max_prob = prs.iter().copied().fold(0.0f32, f32::max);
    let threshold = min_p * max_prob;
    for p in prs.iter_mut() {
        if *p < threshold {
            *p = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_config() -> GenerationConfig {
        GenerationConfig {
            temperature: None,
            top_p: None,
            top_k: None,
            min_p: None,
            repeat_penalty: None,
            repeat_last_n: None,
            eos_token_ids: vec![1],
        }
    }

    #[test]
    fn zero_temperature_means_greedy() {
        let params = GenerationParams::resolve(
            &empty_config(),
            &GenerationOverrides {
                temperature: Some(0.0),
                seed: Some(42),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(params.sampling_strategy(), Sampling::ArgMax));
    }

    #[test]
    fn missing_seed_is_rejected() {
        let err = GenerationParams::resolve(
            &empty_config(),
            &GenerationOverrides {
                temperature: Some(0.0),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, StanceError::Config(_)));
    }

    #[test]
    fn missing_temperature_is_rejected() {
        let err = GenerationParams::resolve(
            &empty_config(),
            &GenerationOverrides {
                seed: Some(42),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, StanceError::Config(_)));
    }

    #[test]
    fn budget_defaults_to_fifty_tokens() {
        let params = GenerationParams::resolve(
            &empty_config(),
            &GenerationOverrides {
                temperature: Some(0.0),
                seed: Some(42),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(params.max_total_tokens, 50);
        assert_eq!(params.num_return_sequences, 1);
    }

    #[test]
    fn config_defaults_feed_sampling_knobs() {
        let config = GenerationConfig {
            temperature: Some(0.7),
            top_p: Some(0.9),
            top_k: Some(40),
            ..empty_config()
        };
        let params = GenerationParams::resolve(
            &config,
            &GenerationOverrides {
                seed: Some(7),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(params.temperature, 0.7);
        assert!(matches!(
            params.sampling_strategy(),
            Sampling::TopKThenTopP { k: 40, .. }
        ));
    }

    #[test]
    fn min_p_filters_low_probs() {
        let mut prs = vec![0.5, 0.3, 0.15, 0.05];
        apply_min_p(&mut prs, 0.5);
        assert_eq!(prs, vec![0.5, 0.3, 0.0, 0.0]);
    }

    #[test]
    fn min_p_noop_when_zero() {
        let mut prs = vec![0.5, 0.3, 0.2];
        apply_min_p(&mut prs, 0.0);
        assert_eq!(prs, vec![0.5, 0.3, 0.2]);
    }
}
