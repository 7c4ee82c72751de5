//! Stance classification for short comments with a local LLM.
//!
//! Powered by [Candle](https://github.com/huggingface/candle). Each comment
//! is wrapped in a fixed two-turn conversation, run through a quantized
//! instruction-tuned model under a bounded token budget, and the reply is
//! reduced to a `favor` / `neutral` / `oppose` label.

pub mod dataset;
pub mod error;
pub mod labels;
pub mod loaders;
pub mod models;
pub mod pipelines;
pub mod prompt;

pub use dataset::{CommentRecord, CommentTable};
pub use error::{Result, StanceError};
pub use labels::{LabelExtractor, StanceLabel};
pub use pipelines::generation::{Completion, CompletionSource};
pub use pipelines::stance::{RunOutcome, StancePipeline, StancePipelineBuilder};
pub use prompt::{Message, PromptSpec, Role};
