use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::Step;

#[derive(Error, Debug)]
pub enum TwoStepError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Empty response: first completion choice carried no text")]
    EmptyResponse,

    #[error("{step} step failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: Box<TwoStepError>,
    },

    #[error("Pipeline deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

pub type Result<T> = std::result::Result<T, TwoStepError>;

/// Coarse classification used by callers that only care about the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Provider,
    EmptyResponse,
    DeadlineExceeded,
}

impl TwoStepError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn in_step(self, step: Step) -> Self {
        Self::Step {
            step,
            source: Box::new(self),
        }
    }

    /// Kind of the underlying failure, looking through step wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Provider(_) => ErrorKind::Provider,
            Self::EmptyResponse => ErrorKind::EmptyResponse,
            Self::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            Self::Step { source, .. } => source.kind(),
        }
    }

    /// Step the error was raised in, if it came out of the pipeline.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn root(&self) -> &TwoStepError {
        let mut cur = self;
        while let Self::Step { source, .. } = cur {
            cur = source;
        }
        cur
    }

    /// Whether the retry policy may try the call again.
    pub fn is_transient(&self) -> bool {
        match self.root() {
            Self::Provider(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Failure reported by (or on the way to) the completion provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Provider error ({kind}): {message}")]
pub struct ProviderError {
    pub kind: ProviderFailure,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailure {
    RateLimited,
    Timeout,
    ServerError(u16),
    Network,
    Rejected(u16),
    MalformedResponse,
}

impl ProviderFailure {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Timeout | Self::ServerError(_) | Self::Network
        )
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => f.write_str("rate limited"),
            Self::Timeout => f.write_str("timeout"),
            Self::ServerError(status) => write!(f, "server error {status}"),
            Self::Network => f.write_str("network"),
            Self::Rejected(status) => write!(f, "rejected {status}"),
            Self::MalformedResponse => f.write_str("malformed response"),
        }
    }
}
