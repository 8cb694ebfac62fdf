//! Check aggregation and letter grading.
//!
//! Two modes turn a list of [`CheckResult`](crate::check::CheckResult)s into a
//! [`Score`]: penalty mode for required-field categories and validity mode for
//! format and consistency categories.

pub mod aggregate;
pub mod grade;
pub mod types;
pub mod utility;

pub use aggregate::{category_status, penalty_score, unscored, validity_score, weighted_score};
pub use grade::grade;
pub use types::{Breakdown, PenaltyConfig, Score, WeightedComponent};
pub use utility::round1;
