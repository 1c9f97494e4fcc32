pub mod backend;
pub mod error;
pub mod keyword;
pub mod learner;
pub mod matcher;
pub mod normalize;
pub mod operator;
pub mod pipeline;
pub mod rules;

pub use backend::{MemoryRules, RuleBackend, TomlRuleFile};
pub use error::{ConfigLoadError, ConfigWriteError, UnresolvedReason, Warning};
pub use keyword::KeywordPolicy;
pub use learner::{parse_selection, Learner, LearnerConfig, Resolution};
pub use matcher::{match_category, RuleMatch};
pub use normalize::normalize;
pub use operator::{ConsoleOperator, Operator, OperatorError, Prompt, ScriptedOperator};
pub use pipeline::{BatchReport, BatchStats, Pipeline};
pub use rules::{LearnOutcome, RuleStore};
