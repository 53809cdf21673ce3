//! Prompt templating for the reasoning and answer requests.
//!
//! Both requests are a two-turn conversation: the system persona followed by a
//! single user turn rendered from a template. Placeholders are substituted in a
//! single left-to-right pass, so text coming from the user or from the model is
//! never re-read as a placeholder.

use serde::{Deserialize, Serialize};

use crate::config::{TwoStepConfig, DEFAULT_SYSTEM_PROMPT};

pub const PROMPT_VAR: &str = "prompt";
pub const CHAIN_OF_THOUGHT_VAR: &str = "chain_of_thought";

pub const REASONING_TEMPLATE: &str = "Make a chain of thoughts on the user's prompt before \
answering. Reason step by step, but do not write a ready-made response: {prompt}";

pub const ANSWER_TEMPLATE: &str = "Based on the chain of thoughts, write a complete response \
to the user's prompt.\nUser Prompt: {prompt}\nChain of thoughts: {chain_of_thought}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One (role, text) unit sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplater {
    system_prompt: String,
    reasoning_template: String,
    answer_template: String,
}

impl Default for PromptTemplater {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reasoning_template: REASONING_TEMPLATE.to_string(),
            answer_template: ANSWER_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplater {
    pub fn from_config(cfg: &TwoStepConfig) -> Self {
        Self {
            system_prompt: cfg.system_prompt.clone(),
            reasoning_template: cfg.reasoning_template.clone(),
            answer_template: cfg.answer_template.clone(),
        }
    }

    /// Request asking for step-by-step reasoning only.
    pub fn reasoning(&self, user_prompt: &str) -> Vec<Turn> {
        let text = render(&self.reasoning_template, &[(PROMPT_VAR, user_prompt)]);
        vec![Turn::system(&self.system_prompt), Turn::user(text)]
    }

    /// Request asking for the complete answer, embedding the chain of thought verbatim.
    pub fn answer(&self, user_prompt: &str, chain_of_thought: &str) -> Vec<Turn> {
        let text = render(
            &self.answer_template,
            &[
                (PROMPT_VAR, user_prompt),
                (CHAIN_OF_THOUGHT_VAR, chain_of_thought),
            ],
        );
        vec![Turn::system(&self.system_prompt), Turn::user(text)]
    }
}

/// Replace `{name}` occurrences with their values. Unknown names and unmatched
/// braces are copied through unchanged.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let extra: usize = vars.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];
        match vars.iter().find(|(k, _)| *k == name) {
            Some((_, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
