use tracing::{info, warn};

use crate::dataset::CommentRecord;
use crate::labels::{LabelExtractor, StanceLabel};
use crate::pipelines::generation::CompletionSource;
use crate::prompt::PromptSpec;

/// One item that failed to classify, with the row it came from.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub row: usize,
    pub message: String,
}

/// The labels for a full run, 1:1 with the input rows, plus the failures
/// that were recorded along the way.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub labels: Vec<StanceLabel>,
    pub failures: Vec<ItemFailure>,
}

impl RunOutcome {
    /// Label column values, in input order.
    pub fn label_strings(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.as_str().to_string()).collect()
    }
}

/// Classifies comment stance with a language model.
///
/// Construct with [`StancePipelineBuilder`](super::StancePipelineBuilder),
/// or directly with [`StancePipeline::new`] to supply a custom
/// [`CompletionSource`].
pub struct StancePipeline<S: CompletionSource> {
    engine: S,
    prompt: PromptSpec,
    extractor: LabelExtractor,
}

impl<S: CompletionSource> StancePipeline<S> {
    pub fn new(engine: S, prompt: PromptSpec, extractor: LabelExtractor) -> Self {
        Self {
            engine,
            prompt,
            extractor,
        }
    }

    /// Classify a single comment.
    pub fn classify(&self, record: &CommentRecord) -> crate::error::Result<StanceLabel> {
        let conversation = self.prompt.conversation(&record.text);
        let completion = self.engine.complete(&conversation)?;
        self.extractor.extract(&completion)
    }

    /// Classify every comment, isolating per-item failures.
    ///
    /// A failed item is recorded with the `unknown` sentinel label and an
    /// error note, and the loop moves on; completed work is never thrown
    /// away because one comment misbehaved. The output is 1:1 with the
    /// input, in input order.
    pub fn classify_all<I>(&self, records: I) -> RunOutcome
    where
        I: IntoIterator<Item = CommentRecord>,
    {
        let mut labels = Vec::new();
        let mut failures = Vec::new();

        for record in records {
            match self.classify(&record) {
                Ok(label) => {
                    info!(row = record.id, label = %label, "comment classified");
                    labels.push(label);
                }
                Err(e) => {
                    warn!(row = record.id, error = %e, "classification failed, recording sentinel");
                    failures.push(ItemFailure {
                        row: record.id,
                        message: e.to_string(),
                    });
                    labels.push(StanceLabel::unknown());
                }
            }
        }

        RunOutcome { labels, failures }
    }
}
