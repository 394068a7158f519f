//! Model training
//!
//! Regressors over encoded feature vectors and the pipeline that fits them:
//! - CART regression trees, random forests and gradient boosting
//! - Ridge regression
//! - Seeded holdout split and held-out metrics
//! - [`TrainingPipeline`] tying encoder fit, regressor fit and evaluation together

mod config;
mod metrics;
mod models;
mod pipeline;
mod split;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;

pub use config::{ModelConfig, ModelKind, TrainingConfig};
pub use decision_tree::{DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use linear_models::RidgeRegression;
pub use metrics::Metrics;
pub use models::{Estimator, Regressor};
pub use pipeline::{default_candidates, ComparisonEntry, TrainingOutcome, TrainingPipeline, TrainingReport};
pub use random_forest::{MaxFeatures, RandomForest};
pub use split::HoldoutSplit;
