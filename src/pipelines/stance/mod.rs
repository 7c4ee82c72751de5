//! Stance classification pipeline.
//!
//! Composes the prompt builder, the completion engine and the label
//! extractor into one sequential per-comment loop.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use stance_classifier::dataset::CommentTable;
//! use stance_classifier::models::Gemma3Size;
//! use stance_classifier::pipelines::stance::StancePipelineBuilder;
//!
//! # fn main() -> stance_classifier::error::Result<()> {
//! let table = CommentTable::from_path(Path::new("comments.csv"))?;
//!
//! let pipeline = StancePipelineBuilder::gemma3(Gemma3Size::Size12B)
//!     .auto_device()
//!     .build()?;
//!
//! let outcome = pipeline.classify_all(table.records());
//! table.write_with_labels(Path::new("comments_with_stance.csv"), &outcome.label_strings())?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod pipeline;

pub use builder::{StancePipelineBuilder, DEFAULT_SEED};
pub use pipeline::{ItemFailure, RunOutcome, StancePipeline};
