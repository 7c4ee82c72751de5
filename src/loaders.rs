//! Download helpers for model assets hosted on the Hugging Face Hub.
//!
//! Every loader carries the access token resolved at startup so that gated
//! repositories (the `google/gemma-3-*-it` family) can be fetched. Secrets
//! never end up in error messages.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tokenizers::Tokenizer;

use crate::error::{Result, StanceError};

/// Decoding defaults shipped with a model repo's `generation_config.json`.
#[derive(Clone)]
pub struct GenerationConfig {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub top_k: Option<u64>,
    pub min_p: Option<f64>,
    pub repeat_penalty: Option<f32>,
    pub repeat_last_n: Option<usize>,
    pub eos_token_ids: Vec<u64>,
}

/// Fetches a single file from a Hub repository into the local cache.
#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub filename: String,
    token: Option<String>,
}

impl HfLoader {
    pub fn new(repo: &str, filename: &str, token: Option<&str>) -> Self {
        Self {
            repo: repo.into(),
            filename: filename.into(),
            token: token.map(str::to_string),
        }
    }

    pub fn load(&self) -> Result<PathBuf> {
        let hf_api = hf_hub::api::sync::ApiBuilder::new()
            .with_token(self.token.clone())
            .build()
            .map_err(|e| {
                StanceError::Download(format!("Failed to initialize HuggingFace API: {e}"))
            })?;
        let hf_repo = hf_api.model(self.repo.clone());

        let max_retries = 3;

        for attempt in 0..max_retries {
            match hf_repo.get(self.filename.as_str()) {
                Ok(path) => return Ok(path),
                Err(e) => {
                    let error_msg = e.to_string();
                    if error_msg.contains("Lock acquisition failed") && attempt < max_retries - 1 {
                        let wait_time = Duration::from_millis(100 * (1 << attempt));
                        std::thread::sleep(wait_time);
                        continue;
                    }
                    if error_msg.contains("401") || error_msg.contains("403") {
                        return Err(StanceError::Auth(format!(
                            "Access to '{}' was denied: {}. The repo is gated; supply a valid \
                             Hugging Face token via --token-file or HF_TOKEN.",
                            self.repo, error_msg
                        )));
                    }
                    return Err(StanceError::Download(format!(
                        "Failed to download '{}' from '{}': {}",
                        self.filename, self.repo, error_msg
                    )));
                }
            }
        }

        Err(StanceError::Download(format!(
            "Download of '{}' from '{}' did not complete after {} attempts",
            self.filename, self.repo, max_retries
        )))
    }
}

#[derive(Debug, Clone)]
pub struct TokenizerLoader {
    tokenizer_file_loader: HfLoader,
}

impl TokenizerLoader {
    pub fn new(repo: &str, filename: &str, token: Option<&str>) -> Self {
        Self {
            tokenizer_file_loader: HfLoader::new(repo, filename, token),
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let tokenizer_file_path = self.tokenizer_file_loader.load()?;
        let path_str = tokenizer_file_path.display().to_string();

        Tokenizer::from_file(&tokenizer_file_path).map_err(|e| {
            StanceError::Encoding(format!("Failed to load tokenizer from '{path_str}': {e}"))
        })
    }
}

pub struct GenerationConfigLoader {
    generation_config_file_loader: HfLoader,
}

#[derive(Deserialize)]
struct RawGenerationConfig {
    temperature: Option<f64>,
    top_p: Option<f64>,
    top_k: Option<u64>,
    min_p: Option<f64>,
    #[serde(alias = "repetition_penalty", alias = "repeat_penalty")]
    repeat_penalty: Option<f32>,
    repeat_last_n: Option<usize>,
    #[serde(alias = "eos_token_id", alias = "eos_token_ids")]
    eos_token_ids: Option<serde_json::Value>,
}

impl GenerationConfigLoader {
    pub fn new(repo: &str, filename: &str, token: Option<&str>) -> Self {
        Self {
            generation_config_file_loader: HfLoader::new(repo, filename, token),
        }
    }

    pub fn load(&self) -> Result<GenerationConfig> {
        let generation_config_file_path = self.generation_config_file_loader.load()?;

        let generation_config_content = std::fs::read_to_string(generation_config_file_path)?;

        let raw: RawGenerationConfig = serde_json::from_str(&generation_config_content)?;

        let eos_token_ids = match raw.eos_token_ids {
            Some(serde_json::Value::Number(n)) => {
                vec![n.as_u64().ok_or_else(|| {
                    StanceError::Config(format!(
                        "Invalid eos_token_id: expected unsigned integer, got {n}"
                    ))
                })?]
            }
            Some(serde_json::Value::Array(arr)) => arr
                .into_iter()
                .enumerate()
                .map(|(i, v)| {
                    v.as_u64().ok_or_else(|| {
                        StanceError::Config(format!(
                            "Invalid eos_token_ids[{i}]: expected unsigned integer, got {v}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(GenerationConfig {
            temperature: raw.temperature,
            top_p: raw.top_p,
            top_k: raw.top_k,
            min_p: raw.min_p,
            repeat_penalty: raw.repeat_penalty,
            repeat_last_n: raw.repeat_last_n,
            eos_token_ids,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GgufModelLoader {
    model_file_loader: HfLoader,
}

impl GgufModelLoader {
    pub fn new(model_repo: &str, model_filename: &str, token: Option<&str>) -> Self {
        Self {
            model_file_loader: HfLoader::new(model_repo, model_filename, token),
        }
    }

    pub fn load(
        &self,
    ) -> Result<(std::fs::File, candle_core::quantized::gguf_file::Content)> {
        let model_file_path = self.model_file_loader.load()?;

        let mut file = std::fs::File::open(&model_file_path)?;
        let file_content = candle_core::quantized::gguf_file::Content::read(&mut file)
            .map_err(|e| {
                StanceError::Download(format!(
                    "Invalid GGUF file: {}",
                    e.with_path(model_file_path)
                ))
            })?;

        Ok((file, file_content))
    }
}
