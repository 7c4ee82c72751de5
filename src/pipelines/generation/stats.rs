use std::time::{Duration, Instant};

/// Timing and token counts for one completion.
#[derive(Debug, Clone)]
pub struct GenerationStats {
    pub prompt_tokens: usize,
    pub tokens_generated: usize,
    pub total_time: Duration,
    pub tokens_per_second: f64,
    start_time: Instant,
}

impl GenerationStats {
    pub(crate) fn new() -> Self {
        Self {
            prompt_tokens: 0,
            tokens_generated: 0,
            total_time: Duration::default(),
            tokens_per_second: 0.0,
            start_time: Instant::now(),
        }
    }

    pub(crate) fn set_prompt_tokens(&mut self, prompt_tokens: usize) {
        self.prompt_tokens = prompt_tokens;
    }

    pub(crate) fn record_token(&mut self) {
        self.tokens_generated += 1;
    }

    pub(crate) fn finalize(&mut self) {
        self.total_time = self.start_time.elapsed();
        if self.total_time.as_secs_f64() > 0.0 {
            self.tokens_per_second = self.tokens_generated as f64 / self.total_time.as_secs_f64();
        } else {
            self.tokens_per_second = 0.0;
        }
    }
}
