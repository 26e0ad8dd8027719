//! Weighted settings resolution.
//!
//! [`ResolutionEngine`] turns an effective weight table into one set of
//! resolved settings per attempt: categorical and multiselect draws, ordered
//! conditional rules, literal and starting-pool directives, type coercion and
//! pruning of redundant settings. [`GenerationLoop`] wraps it in the
//! draw/validate/retry cycle around an external generator.

pub mod coerce;
pub mod conditionals;
pub mod config;
pub mod draw;
pub mod engine;
pub mod errors;
pub mod external;
pub mod multiselect;
pub mod output;
pub mod params;
pub mod prune;
pub mod retry;
pub mod starting;

pub use conditionals::{
    AttemptCache, ConditionalRule, RuleContext, RulePlan, RuleRegistry, RuleScope,
};
pub use config::ResolveConfig;
pub use engine::{Resolution, ResolutionEngine};
pub use errors::{Result, RollError};
pub use external::{ExternalGenerator, GeneratorConfig, GeneratorSettings};
pub use output::{PlandoDocument, PlandoMeta, PlandoWriter};
pub use prune::prune;
pub use retry::{GenerationLoop, GenerationOutcome, PlandoValidator, RetryPolicy, ValidationOutcome};
