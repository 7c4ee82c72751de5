// ============ Model capability traits ============

pub(crate) mod capabilities;

// ============ Model implementations ============

pub(crate) mod gemma3;

pub use capabilities::{CausalLanguageModel, ModelConfig, ModelContext};
pub use gemma3::{Gemma3Model, Gemma3Size};
