//! Model capability traits.
//!
//! The classification pipeline only needs a small surface from a model:
//! load it once, template a conversation, and run forward passes against a
//! resettable generation context.

use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use crate::error::Result;
use crate::loaders::GenerationConfig;
use crate::prompt::Message;

/// A per-run generation context (KV cache + position).
///
/// One context serves the whole run; it is reset between comments so no
/// state leaks from one item to the next.
pub trait ModelContext: Send {
    /// Forward the input tokens through the model, returning the logits for
    /// the next token.
    fn forward(&mut self, input: &Tensor) -> candle_core::Result<Tensor>;

    /// Clear the internal state (kv-cache, position).
    fn reset(&mut self);
}

/// Core trait for causal language models used by the completion engine.
pub trait CausalLanguageModel {
    /// Type used to configure model loading (e.g. which checkpoint size).
    type Options;
    /// The generation context type for this model.
    type Context: ModelContext;

    /// Download (if needed) and load the model.
    ///
    /// `hf_token` authorizes access to gated Hub repositories; it is
    /// resolved once at process start.
    fn load(options: Self::Options, device: &Device, hf_token: Option<&str>) -> Result<Self>
    where
        Self: Sized;

    /// Get the tokenizer paired with this model.
    fn tokenizer(&self) -> Result<Tokenizer>;

    /// Serialize a conversation into the prompt string this model expects,
    /// ending with the generation prompt marker so the model continues as
    /// the assistant.
    fn apply_chat_template(&self, messages: &[Message]) -> Result<String>;

    /// All end-of-sequence token IDs.
    fn eos_tokens(&self) -> Vec<u32>;

    /// Maximum sequence length this model supports.
    fn max_seq_len(&self) -> usize;

    /// Create a fresh generation context.
    fn new_context(&self) -> Self::Context;

    /// Decoding defaults shipped with the model repo.
    fn generation_defaults(&self) -> &GenerationConfig;
}

/// Maps a model selection onto a loaded model, so builders stay generic
/// over the checkpoint family.
pub trait ModelConfig {
    /// The model type this configuration builds.
    type Model: CausalLanguageModel;

    /// Load the configured model onto `device`.
    fn build(self, device: &Device, hf_token: Option<&str>) -> Result<Self::Model>;
}
