pub mod derive;
pub mod element;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod logging;
pub mod patch;
pub mod resolver;
pub mod snapshot;
pub mod state;
pub mod validation;

pub use derive::{DEFAULT_MAX_DEPTH, DerivationError, DeriveOptions, Deriver, Phase};
pub use element::{
    Behavior, ElementKind, ElementNode, ElementType, LegacyFunction, LegacyRule, Mechanism,
    Script, SelectOption, Shape, ValidationRule, resolved_id,
};
pub use error::{ElementError, EvaluationError};
pub use evaluator::{
    EvalContext, EvalResult, Evaluator, EvaluatorProvider, ResultShape, ScriptEngine,
    StandardEvaluator, StandardProvider,
};
pub use expression::{Expression, ExpressionEvaluator};
pub use logging::init as init_logging;
pub use patch::merge_patch;
pub use resolver::{ElementResolver, JsonElementResolver, ResolveError, patch_element};
pub use snapshot::{DerivationSnapshot, ElementSnapshot};
pub use state::DerivationState;
pub use validation::{StructuralValidator, ValidationFailure, ValidatorRegistry};
