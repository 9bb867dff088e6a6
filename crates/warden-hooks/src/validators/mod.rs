//! The built-in validators, in canonical order.

mod intent;
mod lock;
mod risk;
mod scope;

pub use intent::{
    IntentConsistencyValidator, IntentDeclaredValidator, IntentSelectionValidator,
    SELECT_INTENT_TOOL,
};
pub use lock::OptimisticLockValidator;
pub use risk::RiskGateValidator;
pub use scope::ScopeValidator;
