use crate::error::Result;
use crate::labels::LabelExtractor;
use crate::models::{CausalLanguageModel, Gemma3Size, ModelConfig};
use crate::pipelines::generation::{CompletionEngine, GenerationOverrides, GenerationParams};
use crate::pipelines::stance::StancePipeline;
use crate::pipelines::utils::DeviceRequest;
use crate::prompt::PromptSpec;

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 42;

/// Builder for [`StancePipeline`] instances backed by a local model.
///
/// Decoding defaults to greedy (`temperature = 0.0`) with a fixed seed, so
/// re-running the same input yields the same output; both can be overridden.
///
/// # Example
///
/// ```rust,no_run
/// use stance_classifier::pipelines::stance::StancePipelineBuilder;
/// use stance_classifier::models::Gemma3Size;
///
/// # fn main() -> stance_classifier::error::Result<()> {
/// let pipeline = StancePipelineBuilder::gemma3(Gemma3Size::Size12B)
///     .auto_device()
///     .hf_token("hf_...")
///     .max_total_tokens(50)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct StancePipelineBuilder<C: ModelConfig> {
    config: C,
    overrides: GenerationOverrides,
    device_request: DeviceRequest,
    hf_token: Option<String>,
    prompt: PromptSpec,
    strip_punctuation: bool,
}

impl<C: ModelConfig> StancePipelineBuilder<C> {
    /// Create a builder with the given model configuration.
    pub fn new(config: C) -> Self {
        let overrides = GenerationOverrides {
            temperature: Some(0.0),
            seed: Some(DEFAULT_SEED),
            ..Default::default()
        };

        Self {
            config,
            overrides,
            device_request: DeviceRequest::Cpu,
            hf_token: None,
            prompt: PromptSpec::default(),
            strip_punctuation: true,
        }
    }

    /// Use CPU for inference (default).
    pub fn cpu(mut self) -> Self {
        self.device_request = DeviceRequest::Cpu;
        self
    }

    /// Use a specific CUDA GPU for inference.
    pub fn cuda(mut self, index: usize) -> Self {
        self.device_request = DeviceRequest::Cuda(index);
        self
    }

    /// Prefer CUDA 0 when available, fall back to CPU.
    pub fn auto_device(mut self) -> Self {
        self.device_request = DeviceRequest::Auto;
        self
    }

    /// Hugging Face access token for gated model repositories.
    pub fn hf_token(mut self, token: &str) -> Self {
        self.hf_token = Some(token.to_string());
        self
    }

    /// Replace the built-in instruction/template pair.
    pub fn prompt_spec(mut self, prompt: PromptSpec) -> Self {
        self.prompt = prompt;
        self
    }

    /// Set sampling temperature. 0.0 = greedy/deterministic.
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.overrides.temperature = Some(temperature);
        self
    }

    /// Set the sampling seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.overrides.seed = Some(seed);
        self
    }

    /// Cap combined prompt + completion length, in tokens.
    pub fn max_total_tokens(mut self, max_total_tokens: usize) -> Self {
        self.overrides.max_total_tokens = Some(max_total_tokens);
        self
    }

    /// Set nucleus sampling threshold (0.0-1.0).
    pub fn top_p(mut self, top_p: f64) -> Self {
        self.overrides.top_p = Some(top_p.clamp(0.0, 1.0));
        self
    }

    /// Only sample from the top k most likely tokens.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.overrides.top_k = Some(top_k);
        self
    }

    /// Filter tokens below min_p * max_probability (0.0-1.0).
    pub fn min_p(mut self, min_p: f64) -> Self {
        self.overrides.min_p = Some(min_p.clamp(0.0, 1.0));
        self
    }

    /// Set penalty for repeating tokens. 1.0 = no penalty.
    pub fn repeat_penalty(mut self, repeat_penalty: f32) -> Self {
        self.overrides.repeat_penalty = Some(repeat_penalty);
        self
    }

    /// Set how many recent tokens to consider for repeat penalty.
    pub fn repeat_last_n(mut self, repeat_last_n: usize) -> Self {
        self.overrides.repeat_last_n = Some(repeat_last_n);
        self
    }

    /// Completions generated per conversation. The pipeline consumes the
    /// first one.
    pub fn num_return_sequences(mut self, num_return_sequences: usize) -> Self {
        self.overrides.num_return_sequences = Some(num_return_sequences);
        self
    }

    /// Keep trailing punctuation on the extracted label token instead of
    /// trimming it before matching.
    pub fn keep_trailing_punctuation(mut self) -> Self {
        self.strip_punctuation = false;
        self
    }

    /// Resolve the device, load the model and tokenizer, and assemble the
    /// pipeline. This is the expensive step; everything it loads is shared
    /// read-only across all subsequent classifications.
    pub fn build(self) -> Result<StancePipeline<CompletionEngine<C::Model>>> {
        let device = self.device_request.resolve()?;

        let model = self.config.build(&device, self.hf_token.as_deref())?;
        let params = GenerationParams::resolve(model.generation_defaults(), &self.overrides)?;

        let engine = CompletionEngine::new(model, params, device)?;
        Ok(StancePipeline::new(
            engine,
            self.prompt,
            LabelExtractor::new(self.strip_punctuation),
        ))
    }
}

impl StancePipelineBuilder<Gemma3Size> {
    /// Create a builder for a Gemma 3 model.
    pub fn gemma3(size: Gemma3Size) -> Self {
        Self::new(size)
    }
}
