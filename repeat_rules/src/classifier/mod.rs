//! Rule-based virus classifier: inference over the ranked rule table,
//! training, grid search and model persistence.

pub mod grid;
pub mod inference;
pub mod training;

pub use inference::{rule_precedence, RuleClassifier};
pub use training::{train_rule_classifier, Evaluation, RuleModel};
