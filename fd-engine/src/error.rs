use crate::{resolver::ResolveError, validation::ValidationFailure};

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    Script(String),
    NoScriptEngine,
    Expression(String),
    UnexpectedResult {
        expected: &'static str,
        found: &'static str,
    },
    Unsupported(&'static str),
    Resolve(ResolveError),
    Acquire(String),
}

impl std::fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationError::Script(message) => f.write_str(message),
            EvaluationError::NoScriptEngine => write!(f, "no script engine configured"),
            EvaluationError::Expression(message) => write!(f, "expression error: {message}"),
            EvaluationError::UnexpectedResult { expected, found } => {
                write!(f, "unexpected result: expected {expected}, got {found}")
            }
            EvaluationError::Unsupported(what) => write!(f, "{what} is not yet supported"),
            EvaluationError::Resolve(err) => write!(f, "invalid override: {err}"),
            EvaluationError::Acquire(message) => write!(f, "evaluator unavailable: {message}"),
        }
    }
}

impl std::error::Error for EvaluationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvaluationError::Resolve(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResolveError> for EvaluationError {
    fn from(err: ResolveError) -> Self {
        EvaluationError::Resolve(err)
    }
}

/// Failure attached to a single element. Structural validation failures keep
/// their message verbatim; everything else is rendered through `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementError {
    Validation(ValidationFailure),
    Evaluation(EvaluationError),
}

impl std::fmt::Display for ElementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementError::Validation(failure) => f.write_str(failure.message()),
            ElementError::Evaluation(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ElementError {}

impl From<ValidationFailure> for ElementError {
    fn from(failure: ValidationFailure) -> Self {
        ElementError::Validation(failure)
    }
}

impl From<EvaluationError> for ElementError {
    fn from(err: EvaluationError) -> Self {
        ElementError::Evaluation(err)
    }
}
