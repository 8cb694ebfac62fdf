use crate::check::{CheckResult, Status};
use crate::rules::Genre;
use crate::scoring::grade::grade;
use crate::scoring::types::{
    Breakdown, CheckValidity, PenaltyConfig, PenaltyDetail, Score, StatusCounts, WeightedComponent,
};
use crate::scoring::utility::{mean, round1};

/// Scores a list of checks by subtracting a penalty per error and warning.
///
/// Starts from `max_score`, subtracts the weighted penalty of every check,
/// adds the bonus when at least one check passed and none failed, then
/// clamps to `[min_score, max_score]`.
pub fn penalty_score(checks: &[CheckResult], config: &PenaltyConfig) -> Score {
    let mut score = config.max_score;
    let mut penalties = Vec::with_capacity(checks.len());
    let mut total_penalty = 0.0;
    let mut counts = StatusCounts::default();

    for check in checks {
        let base_penalty = config.penalty(check.status);
        let weight = config.weight(&check.name);
        let weighted_penalty = base_penalty * weight;

        score -= weighted_penalty;
        total_penalty += weighted_penalty;

        match check.status {
            Status::Error => counts.errors += 1,
            Status::Warning => counts.warnings += 1,
            Status::Pass => counts.passes += 1,
            Status::Info | Status::Critical => {}
        }

        penalties.push(PenaltyDetail {
            check: check.name.clone(),
            status: check.status,
            base_penalty,
            weight,
            weighted_penalty,
        });
    }

    let bonus_applied = if counts.errors == 0 && counts.warnings == 0 && counts.passes > 0 {
        config.bonus_all_pass
    } else {
        0.0
    };
    score += bonus_applied;
    let score = score.clamp(config.min_score, config.max_score);

    let percentage = if config.max_score > 0.0 {
        round1(score / config.max_score * 100.0)
    } else {
        0.0
    };

    Score {
        value: round1(score),
        max_score: config.max_score,
        percentage,
        grade: grade(percentage),
        breakdown: Breakdown::Penalty {
            initial_score: config.max_score,
            checks_evaluated: checks.len(),
            penalties,
            total_penalty,
            bonus_applied,
            status_counts: counts,
        },
    }
}

/// Contribution of one check to the validity average, `None` when the check
/// is left out.
fn check_validity(check: &CheckResult) -> Option<f64> {
    if check.is_missing_column() && check.genre == Some(Genre::Optional) {
        return None;
    }
    if let Some(stats) = check.statistics {
        return stats.validity_percent();
    }
    match check.status {
        Status::Pass => Some(100.0),
        Status::Error | Status::Critical => Some(0.0),
        Status::Warning | Status::Info => None,
    }
}

/// Scores a list of checks by their average share of valid rows.
///
/// Checks with statistics contribute `valid / total`; a passing check without
/// statistics contributes 100 and a failing one 0. An optional column that is
/// missing is left out entirely. An empty list scores 0.
pub fn validity_score(checks: &[CheckResult]) -> Score {
    let mut counted = Vec::new();
    let mut excluded = Vec::new();

    for check in checks {
        match check_validity(check) {
            Some(percentage) => counted.push(CheckValidity {
                check: check.name.clone(),
                percentage,
            }),
            None => excluded.push(check.name.clone()),
        }
    }

    let percentages: Vec<f64> = counted.iter().map(|c| c.percentage).collect();
    let average = round1(mean(&percentages));

    Score {
        value: average,
        max_score: 100.0,
        percentage: average,
        grade: grade(average),
        breakdown: Breakdown::Validity { counted, excluded },
    }
}

/// Weighted average of already computed percentages.
pub fn weighted_score(components: Vec<WeightedComponent>) -> Score {
    let weight_sum: f64 = components.iter().map(|c| c.weight).sum();
    let value = if weight_sum == 0.0 {
        0.0
    } else {
        round1(components.iter().map(|c| c.value * c.weight).sum::<f64>() / weight_sum)
    };

    Score {
        value,
        max_score: 100.0,
        percentage: value,
        grade: grade(value),
        breakdown: Breakdown::Weighted { components },
    }
}

/// A zero score for categories that could not be evaluated.
pub fn unscored() -> Score {
    Score {
        value: 0.0,
        max_score: 100.0,
        percentage: 0.0,
        grade: "F".into(),
        breakdown: Breakdown::Unscored,
    }
}

/// Overall status of a category: the most severe status among its checks.
pub fn category_status(checks: &[CheckResult]) -> Status {
    Status::most_severe(checks.iter().map(|c| c.status))
}
