//! Errors raised by the rewriting engine.
//!
//! Only hard failures are errors. A rule that does not match, or whose
//! constraint turns out unsatisfiable, is an ordinary attempt outcome.

use std::fmt;

use crate::term::Sort;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A built-in function could not be evaluated (division by zero or
    /// overflow). `trace` lists the frames the error
    /// crossed on its way out, innermost first.
    Evaluation { message: String, trace: Vec<String> },
    /// A rule asked for a fresh value of a sort the generator cannot produce.
    NoFreshValue { sort: Sort, trace: Vec<String> },
    /// A rule or pattern is structurally unusable.
    MalformedRule { message: String },
}

impl EngineError {
    pub fn evaluation(message: impl Into<String>) -> Self {
        EngineError::Evaluation {
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn no_fresh_value(sort: Sort) -> Self {
        EngineError::NoFreshValue {
            sort,
            trace: Vec::new(),
        }
    }

    /// Record a frame of context, e.g. the rule being applied.
    pub fn add_trace_frame(mut self, frame: impl Into<String>) -> Self {
        match &mut self {
            EngineError::Evaluation { trace, .. } | EngineError::NoFreshValue { trace, .. } => {
                trace.push(frame.into())
            }
            EngineError::MalformedRule { .. } => {}
        }
        self
    }

    pub fn trace(&self) -> &[String] {
        match self {
            EngineError::Evaluation { trace, .. } | EngineError::NoFreshValue { trace, .. } => trace,
            EngineError::MalformedRule { .. } => &[],
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Evaluation { message, .. } => write!(f, "evaluation error: {}", message)?,
            EngineError::NoFreshValue { sort, .. } => {
                write!(f, "cannot generate a fresh value of sort {}", sort)?
            }
            EngineError::MalformedRule { message } => write!(f, "malformed rule: {}", message)?,
        }
        for frame in self.trace() {
            write!(f, "\n  {}", frame)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;
