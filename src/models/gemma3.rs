//! Quantized Gemma 3 instruction-tuned models.
//!
//! Weights come from the `unsloth` GGUF mirrors; the tokenizer, chat template
//! and generation defaults come from the gated `google/gemma-3-*-it` repos,
//! which is why a Hugging Face token is threaded through loading.

use std::str::FromStr;
use std::sync::Arc;

use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::models::quantized_gemma3 as candle_gemma3;
use minijinja::UndefinedBehavior;
use minijinja::{context, Environment};
use minijinja_contrib::{add_to_environment, pycompat};
use tokenizers::Tokenizer;

use crate::error::{Result, StanceError};
use crate::loaders::{GenerationConfig, GenerationConfigLoader, GgufModelLoader, HfLoader, TokenizerLoader};
use crate::models::capabilities::{CausalLanguageModel, ModelConfig, ModelContext};
use crate::prompt::Message;

/// Gemma 3 model size selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gemma3Size {
    /// 1 billion parameters.
    Size1B,
    /// 4 billion parameters.
    Size4B,
    /// 12 billion parameters.
    Size12B,
    /// 27 billion parameters.
    Size27B,
}

impl Gemma3Size {
    pub(crate) fn weight_repo_id(&self) -> &str {
        match self {
            Gemma3Size::Size1B => "unsloth/gemma-3-1b-it-GGUF",
            Gemma3Size::Size4B => "unsloth/gemma-3-4b-it-GGUF",
            Gemma3Size::Size12B => "unsloth/gemma-3-12b-it-GGUF",
            Gemma3Size::Size27B => "unsloth/gemma-3-27b-it-GGUF",
        }
    }

    pub(crate) fn weight_filename(&self) -> &str {
        match self {
            Gemma3Size::Size1B => "gemma-3-1b-it-Q4_K_M.gguf",
            Gemma3Size::Size4B => "gemma-3-4b-it-Q4_K_M.gguf",
            Gemma3Size::Size12B => "gemma-3-12b-it-Q4_K_M.gguf",
            Gemma3Size::Size27B => "gemma-3-27b-it-Q4_K_M.gguf",
        }
    }

    pub(crate) fn config_repo_id(&self) -> &str {
        match self {
            Gemma3Size::Size1B => "google/gemma-3-1b-it",
            Gemma3Size::Size4B => "google/gemma-3-4b-it",
            Gemma3Size::Size12B => "google/gemma-3-12b-it",
            Gemma3Size::Size27B => "google/gemma-3-27b-it",
        }
    }
}

impl std::fmt::Display for Gemma3Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Gemma3Size::Size1B => "gemma3-1b",
            Gemma3Size::Size4B => "gemma3-4b",
            Gemma3Size::Size12B => "gemma3-12b",
            Gemma3Size::Size27B => "gemma3-27b",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Gemma3Size {
    type Err = StanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1b" => Ok(Gemma3Size::Size1B),
            "4b" => Ok(Gemma3Size::Size4B),
            "12b" => Ok(Gemma3Size::Size12B),
            "27b" => Ok(Gemma3Size::Size27B),
            other => Err(StanceError::Config(format!(
                "Unknown Gemma 3 size '{other}' (expected 1b, 4b, 12b or 27b)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
struct ModelInfo {
    max_seq_len: usize,
}

/// A loaded quantized Gemma 3 model.
pub struct Gemma3Model {
    weights: Arc<candle_gemma3::ModelWeights>,
    info: ModelInfo,
    tokenizer_repo_id: String,
    generation_config: GenerationConfig,
    chat_template_env: Arc<Environment<'static>>,
    hf_token: Option<String>,
}

impl Gemma3Model {
    fn parse_metadata(content: &gguf_file::Content) -> Result<ModelInfo> {
        if !content.metadata.contains_key("gemma3.block_count") {
            return Err(StanceError::Unexpected(
                "Missing 'gemma3.block_count' in Gemma3 model metadata".to_string(),
            ));
        }

        let max_seq_len = content
            .metadata
            .get("gemma3.context_length")
            .and_then(|v| v.to_u32().ok())
            .unwrap_or(131_072) as usize;

        Ok(ModelInfo { max_seq_len })
    }

    fn parse_chat_template(
        tokenizer_config_path: std::path::PathBuf,
    ) -> Result<Arc<Environment<'static>>> {
        let tokenizer_config_content = std::fs::read_to_string(tokenizer_config_path)?;
        let config_json: serde_json::Value = serde_json::from_str(&tokenizer_config_content)?;

        let chat_template_str = config_json["chat_template"].as_str().ok_or_else(|| {
            StanceError::Unexpected(
                "Missing 'chat_template' in tokenizer config for Gemma3".to_string(),
            )
        })?;

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        add_to_environment(&mut env);
        env.set_unknown_method_callback(pycompat::unknown_method_callback);
        env.add_filter("tojson", minijinja::filters::tojson);

        env.add_template_owned("chat", chat_template_str.to_string())
            .map_err(|e| {
                StanceError::Encoding(format!("Failed to parse chat template for Gemma3: {e}"))
            })?;

        Ok(Arc::new(env))
    }

    fn ensure_eos_tokens(config: &GenerationConfig) -> Result<()> {
        if config.eos_token_ids.is_empty() {
            return Err(StanceError::Config(
                "Missing 'eos_token_ids' in generation config for Gemma3".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn from_hf(
        device: &Device,
        size: Gemma3Size,
        hf_token: Option<&str>,
    ) -> Result<Self> {
        let loader = GgufModelLoader::new(size.weight_repo_id(), size.weight_filename(), hf_token);
        let (mut file, content) = loader.load()?;

        let info = Self::parse_metadata(&content)?;
        let weights = Arc::new(
            candle_gemma3::ModelWeights::from_gguf(content, &mut file, device).map_err(|e| {
                StanceError::Unexpected(format!("Failed to build Gemma3 weights: {e}"))
            })?,
        );

        let tokenizer_repo_id = size.config_repo_id().to_string();
        let generation_config =
            GenerationConfigLoader::new(&tokenizer_repo_id, "generation_config.json", hf_token)
                .load()?;
        Self::ensure_eos_tokens(&generation_config)?;

        let tokenizer_config_loader =
            HfLoader::new(&tokenizer_repo_id, "tokenizer_config.json", hf_token);
        let chat_template_env = Self::parse_chat_template(tokenizer_config_loader.load()?)?;

        Ok(Self {
            weights,
            info,
            tokenizer_repo_id,
            generation_config,
            chat_template_env,
            hf_token: hf_token.map(str::to_string),
        })
    }
}

/// Generation context over shared Gemma 3 weights.
///
/// `candle`'s quantized Gemma keeps its KV cache inside the weights value,
/// so the context works on a clone (tensor storage is shared) and resets by
/// re-cloning the pristine base.
pub struct Gemma3Context {
    base: Arc<candle_gemma3::ModelWeights>,
    weights: candle_gemma3::ModelWeights,
    position: usize,
}

impl Gemma3Context {
    fn new(base: Arc<candle_gemma3::ModelWeights>) -> Self {
        let weights = (*base).clone();
        Self {
            base,
            weights,
            position: 0,
        }
    }
}

impl ModelContext for Gemma3Context {
    fn forward(&mut self, input: &Tensor) -> candle_core::Result<Tensor> {
        let input = if input.dtype() != DType::I64 {
            input.to_dtype(DType::I64)?
        } else {
            input.clone()
        };
        let seq_len = input.dim(1)?;
        let logits = self.weights.forward(&input, self.position)?;
        self.position += seq_len;
        Ok(logits)
    }

    fn reset(&mut self) {
        self.weights = (*self.base).clone();
        self.position = 0;
    }
}

impl CausalLanguageModel for Gemma3Model {
    type Options = Gemma3Size;
    type Context = Gemma3Context;

    fn load(options: Self::Options, device: &Device, hf_token: Option<&str>) -> Result<Self> {
        Gemma3Model::from_hf(device, options, hf_token)
    }

    fn tokenizer(&self) -> Result<Tokenizer> {
        TokenizerLoader::new(
            &self.tokenizer_repo_id,
            "tokenizer.json",
            self.hf_token.as_deref(),
        )
        .load()
    }

    fn apply_chat_template(&self, messages: &[Message]) -> Result<String> {
        let message_count = messages.len();

        let rendered = self
            .chat_template_env
            .get_template("chat")
            .map_err(|e| {
                StanceError::Encoding(format!("Failed to get chat template for Gemma3: {e}"))
            })?
            .render(context! {
                messages => messages,
                add_generation_prompt => true,
            })
            .map_err(|e| {
                StanceError::Encoding(format!(
                    "Failed to render template for Gemma3 ({message_count} messages): {e}"
                ))
            })?;
        Ok(rendered)
    }

    fn eos_tokens(&self) -> Vec<u32> {
        self.generation_config
            .eos_token_ids
            .iter()
            .map(|&id| id as u32)
            .collect()
    }

    fn max_seq_len(&self) -> usize {
        self.info.max_seq_len
    }

    fn new_context(&self) -> Self::Context {
        Gemma3Context::new(Arc::clone(&self.weights))
    }

    fn generation_defaults(&self) -> &GenerationConfig {
        &self.generation_config
    }
}

impl ModelConfig for Gemma3Size {
    type Model = Gemma3Model;

    fn build(self, device: &Device, hf_token: Option<&str>) -> Result<Self::Model> {
        Gemma3Model::load(self, device, hf_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_parses_from_cli_spelling() {
        assert_eq!(Gemma3Size::from_str("12b").unwrap(), Gemma3Size::Size12B);
        assert_eq!(Gemma3Size::from_str("1B").unwrap(), Gemma3Size::Size1B);
        assert!(Gemma3Size::from_str("2b").is_err());
    }

    #[test]
    fn repo_ids_match_size() {
        let size = Gemma3Size::Size12B;
        assert_eq!(size.weight_repo_id(), "unsloth/gemma-3-12b-it-GGUF");
        assert_eq!(size.config_repo_id(), "google/gemma-3-12b-it");
        assert_eq!(size.to_string(), "gemma3-12b");
    }
}
