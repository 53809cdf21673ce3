//! Two-step orchestration: reasoning, an optional pause, then the answer.
//!
//! The answer request always embeds the reasoning output; nothing flows the
//! other way. Either step failing aborts the run with the error wrapped in
//! [`TwoStepError::Step`], so callers see which step failed and the original
//! failure kind. There is no partial result.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::{ChatTransport, CompletionClient};
use crate::config::TwoStepConfig;
use crate::prompt::PromptTemplater;
use crate::{Result, TwoStepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Reasoning,
    Answering,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Reasoning => f.write_str("reasoning"),
            Step::Answering => f.write_str("answer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoStepOutput {
    pub chain_of_thought: String,
    pub final_answer: String,
}

pub struct TwoStepPipeline<T> {
    client: CompletionClient<T>,
    templater: PromptTemplater,
    pause: Duration,
    deadline: Option<Duration>,
}

impl<T: ChatTransport> TwoStepPipeline<T> {
    pub fn new(cfg: &TwoStepConfig, transport: T) -> Self {
        Self {
            client: CompletionClient::new(transport, cfg),
            templater: PromptTemplater::from_config(cfg),
            pause: cfg.step_pause,
            deadline: cfg.overall_timeout,
        }
    }

    /// Override the inter-step pause; `Duration::ZERO` skips it.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Run both steps. The pause is a non-blocking sleep, so other tasks on the
    /// same runtime keep making progress.
    pub async fn run(&self, user_prompt: &str) -> Result<TwoStepOutput> {
        match self.deadline {
            Some(limit) => tokio::time::timeout(limit, self.run_steps(user_prompt))
                .await
                .map_err(|_| TwoStepError::DeadlineExceeded(limit))?,
            None => self.run_steps(user_prompt).await,
        }
    }

    /// Blocking variant for synchronous callers. Inside a tokio runtime it
    /// fails with a configuration error; use [`run`](Self::run) there.
    pub fn run_blocking(&self, user_prompt: &str) -> Result<TwoStepOutput> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(TwoStepError::config(
                "run_blocking called from within an async runtime; await run() instead",
            ));
        }
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TwoStepError::config(format!("Failed to start runtime: {e}")))?;
        rt.block_on(self.run(user_prompt))
    }

    async fn run_steps(&self, user_prompt: &str) -> Result<TwoStepOutput> {
        info!(target = "pipeline", step = %Step::Reasoning, "Requesting chain of thought");
        let chain_of_thought = self
            .client
            .complete(self.templater.reasoning(user_prompt))
            .await
            .map_err(|e| e.in_step(Step::Reasoning))?;
        debug!(target = "pipeline", chars = chain_of_thought.len(), "Chain of thought received");

        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }

        info!(target = "pipeline", step = %Step::Answering, "Requesting final answer");
        let final_answer = self
            .client
            .complete(self.templater.answer(user_prompt, &chain_of_thought))
            .await
            .map_err(|e| e.in_step(Step::Answering))?;

        Ok(TwoStepOutput {
            chain_of_thought,
            final_answer,
        })
    }
}
