//! The completion engine: one conversation in, one decoded reply out.
//!
//! Composition is `decode(generate(encode(conversation)))`. Each call stands
//! alone: the KV cache is reset before generating, so nothing carries over
//! between comments except the read-only model weights.

pub(crate) mod params;
mod stats;

use std::sync::Mutex;

use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use crate::error::{Result, StanceError};
use crate::models::{CausalLanguageModel, ModelContext};
use crate::prompt::Message;

pub use params::{GenerationOverrides, GenerationParams, DEFAULT_MAX_TOTAL_TOKENS};
pub use stats::GenerationStats;

use params::{apply_repeat_penalty, initialize_logits_processor};

/// One decoded completion plus its run statistics.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub stats: GenerationStats,
}

/// Anything that can turn a conversation into a reply.
///
/// The stance pipeline depends on this seam rather than on a concrete model,
/// so tests substitute a canned implementation.
pub trait CompletionSource {
    /// Generate a complete reply for the conversation.
    fn complete(&self, messages: &[Message]) -> Result<String>;
}

impl<T: CompletionSource + ?Sized> CompletionSource for &T {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        (**self).complete(messages)
    }
}

/// Runs a loaded causal language model under a fixed [`GenerationParams`].
pub struct CompletionEngine<M: CausalLanguageModel> {
    model: M,
    tokenizer: Tokenizer,
    context: Mutex<M::Context>,
    params: GenerationParams,
    device: Device,
}

impl<M: CausalLanguageModel> CompletionEngine<M> {
    pub fn new(model: M, params: GenerationParams, device: Device) -> Result<Self> {
        let tokenizer = model.tokenizer()?;
        let context = Mutex::new(model.new_context());

        Ok(Self {
            model,
            tokenizer,
            context,
            params,
            device,
        })
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Serialize the conversation through the model's chat template and
    /// tokenize the result.
    pub fn encode(&self, messages: &[Message]) -> Result<Vec<u32>> {
        let templated = self.model.apply_chat_template(messages)?;

        let encoding = self.tokenizer.encode(templated.as_str(), true).map_err(|e| {
            StanceError::Encoding(format!(
                "Tokenization failed on '{}...': {}",
                templated.chars().take(50).collect::<String>(),
                e
            ))
        })?;

        Ok(encoding.get_ids().to_vec())
    }

    /// Generate `num_return_sequences` completions for the prompt, each
    /// bounded by the combined prompt + completion token budget.
    fn generate(
        &self,
        input_tokens: &[u32],
        stats: &mut GenerationStats,
    ) -> Result<Vec<Vec<u32>>> {
        let params = &self.params;

        let eos_tokens = self.model.eos_tokens();
        if eos_tokens.is_empty() {
            return Err(StanceError::Generation(
                "No EOS tokens configured for model. Cannot determine when to stop.".to_string(),
            ));
        }

        let budget = params.max_total_tokens.saturating_sub(input_tokens.len());
        if budget == 0 {
            warn!(
                prompt_tokens = input_tokens.len(),
                max_total_tokens = params.max_total_tokens,
                "prompt alone exhausts the token budget; nothing will be generated"
            );
        }

        let mut context = self.context.lock().unwrap();
        let mut sequences = Vec::with_capacity(params.num_return_sequences);

        for _ in 0..params.num_return_sequences {
            context.reset();

            let mut generated: Vec<u32> = Vec::with_capacity(budget);
            if budget == 0 {
                sequences.push(generated);
                continue;
            }

            let mut logits_processor = initialize_logits_processor(params);

            // Process the entire prompt at once.
            let input = Tensor::new(input_tokens, &self.device)?.unsqueeze(0)?;
            let logits = context.forward(&input)?;
            let last_logits = logits.squeeze(0)?;

            let mut next_token = logits_processor.sample(&last_logits)?;
            generated.push(next_token);
            stats.record_token();

            while generated.len() < budget {
                if eos_tokens.contains(&next_token) {
                    break;
                }

                let input = Tensor::new(&[next_token], &self.device)?.unsqueeze(0)?;
                let logits = context.forward(&input)?.squeeze(0)?;

                let start_at = generated.len().saturating_sub(params.repeat_last_n);
                let penalty_context = &generated[start_at..];

                let logits = if params.repeat_penalty <= 1. || penalty_context.is_empty() {
                    logits
                } else {
                    apply_repeat_penalty(&logits, params.repeat_penalty, penalty_context)?
                };

                next_token = logits_processor.sample(&logits)?;
                generated.push(next_token);
                stats.record_token();
            }

            generated.retain(|token| !eos_tokens.contains(token));
            sequences.push(generated);
        }

        Ok(sequences)
    }

    /// Map generated tokens back to text, skipping special tokens.
    pub fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(tokens, /*skip_special_tokens=*/ true)
            .map_err(|e| StanceError::Encoding(format!("Decode error: {e}")))
    }

    /// Run the full encode -> generate -> decode chain for one conversation.
    pub fn infer(&self, messages: &[Message]) -> Result<Completion> {
        let mut stats = GenerationStats::new();

        let input_tokens = self.encode(messages)?;
        if input_tokens.len() > self.model.max_seq_len() {
            return Err(StanceError::Encoding(format!(
                "Prompt is {} tokens but the model context holds {}",
                input_tokens.len(),
                self.model.max_seq_len()
            )));
        }
        stats.set_prompt_tokens(input_tokens.len());

        let sequences = self.generate(&input_tokens, &mut stats)?;
        let first = sequences.into_iter().next().unwrap_or_default();
        let text = self.decode(&first)?;

        stats.finalize();
        debug!(
            prompt_tokens = stats.prompt_tokens,
            tokens_generated = stats.tokens_generated,
            elapsed_ms = stats.total_time.as_millis() as u64,
            "completion finished"
        );

        Ok(Completion { text, stats })
    }
}

impl<M: CausalLanguageModel> CompletionSource for CompletionEngine<M> {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        Ok(self.infer(messages)?.text)
    }
}
