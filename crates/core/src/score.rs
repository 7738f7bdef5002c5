use std::cmp::Ordering;

use crate::model::{
    Cohort, Graduation, ProgressHolder, RatingSystem, Requirement, RequirementId,
    ScoreboardDisplay, User, Username,
};

//
// ─── SCORES & TARGETS ──────────────────────────────────────────────────────────
//

/// Achieved count for a requirement.
///
/// A global counter applies regardless of the cohort being viewed; otherwise
/// the cohort's own counter is used, defaulting to 0.
#[must_use]
pub fn score_for<H: ProgressHolder + ?Sized>(
    holder: &H,
    requirement: &Requirement,
    cohort: &Cohort,
) -> i64 {
    progress_score(holder, &requirement.id, cohort)
}

fn progress_score<H: ProgressHolder + ?Sized>(
    holder: &H,
    requirement_id: &RequirementId,
    cohort: &Cohort,
) -> i64 {
    holder
        .progress_for(requirement_id)
        .and_then(|progress| progress.counts.resolve(cohort))
        .unwrap_or(0)
}

/// Target count for a requirement, defaulting to 1 when no counter applies.
#[must_use]
pub fn target_for(requirement: &Requirement, cohort: &Cohort) -> i64 {
    requirement.counts.resolve(cohort).unwrap_or(1)
}

/// Requirements that apply to `cohort` and are not hidden on the scoreboard.
pub fn visible_requirements<'a>(
    requirements: &'a [Requirement],
    cohort: &'a Cohort,
) -> impl Iterator<Item = &'a Requirement> + 'a {
    requirements
        .iter()
        .filter(move |r| !r.is_hidden() && r.applies_to(cohort))
}

/// Sum of scores across the visible requirements of a cohort.
#[must_use]
pub fn cohort_score<H: ProgressHolder + ?Sized>(
    holder: &H,
    cohort: &Cohort,
    requirements: &[Requirement],
) -> i64 {
    visible_requirements(requirements, cohort)
        .map(|r| score_for(holder, r, cohort))
        .sum()
}

/// Sum of scores for the visible requirements of one category.
#[must_use]
pub fn category_score<H: ProgressHolder + ?Sized>(
    holder: &H,
    cohort: &Cohort,
    requirements: &[Requirement],
    category: &str,
) -> i64 {
    visible_requirements(requirements, cohort)
        .filter(|r| r.category == category)
        .map(|r| score_for(holder, r, cohort))
        .sum()
}

/// Percentage of the cohort's total target achieved, clamped to `[0, 100]`.
///
/// Returns 0 when there is nothing to achieve.
#[must_use]
pub fn percent_complete<H: ProgressHolder + ?Sized>(
    holder: &H,
    cohort: &Cohort,
    requirements: &[Requirement],
) -> f64 {
    let (score, target) = visible_requirements(requirements, cohort).fold(
        (0_i64, 0_i64),
        |(score, target), r| {
            (
                score + score_for(holder, r, cohort),
                target + target_for(r, cohort),
            )
        },
    );
    if target <= 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let percent = 100.0 * score as f64 / target as f64;
    percent.clamp(0.0, 100.0)
}

//
// ─── COLUMNS ───────────────────────────────────────────────────────────────────
//

/// How a score cell is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellDisplay {
    Checkbox,
    ProgressBar,
}

impl CellDisplay {
    /// `None` for hidden requirements, which get no column at all.
    #[must_use]
    pub fn for_display(display: ScoreboardDisplay) -> Option<Self> {
        match display {
            ScoreboardDisplay::Hidden => None,
            ScoreboardDisplay::Checkbox => Some(Self::Checkbox),
            ScoreboardDisplay::ProgressBar | ScoreboardDisplay::Unspecified => {
                Some(Self::ProgressBar)
            }
        }
    }
}

/// Display descriptor for one requirement column of a cohort scoreboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreColumn {
    pub field: RequirementId,
    pub header_name: String,
    pub category: String,
    pub display: CellDisplay,
    pub cohort: Cohort,
    pub target: i64,
}

impl ScoreColumn {
    /// Renders the cell for one scoreboard subject.
    #[must_use]
    pub fn cell<H: ProgressHolder + ?Sized>(&self, holder: &H) -> ScoreCell {
        ScoreCell {
            value: progress_score(holder, &self.field, &self.cohort),
            max: self.target,
            display: self.display,
        }
    }
}

/// A rendered score: `value` out of `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreCell {
    pub value: i64,
    pub max: i64,
    pub display: CellDisplay,
}

impl ScoreCell {
    /// Fill ratio of the progress bar, in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.max <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.value as f64 / self.max as f64;
        ratio.clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.value >= self.max
    }
}

/// Column descriptor for a requirement, or `None` if it is hidden.
#[must_use]
pub fn column_for(requirement: &Requirement, cohort: &Cohort) -> Option<ScoreColumn> {
    let display = CellDisplay::for_display(requirement.scoreboard_display)?;
    Some(ScoreColumn {
        field: requirement.id.clone(),
        header_name: requirement.name.clone(),
        category: requirement.category.clone(),
        display,
        cohort: cohort.clone(),
        target: target_for(requirement, cohort),
    })
}

/// Columns for every visible requirement, in input order.
#[must_use]
pub fn columns_for(requirements: &[Requirement], cohort: &Cohort) -> Vec<ScoreColumn> {
    visible_requirements(requirements, cohort)
        .filter_map(|r| column_for(r, cohort))
        .collect()
}

/// A named group of column fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnGroup {
    pub group_id: String,
    pub children: Vec<String>,
}

/// Groups shown before the requirement categories.
#[must_use]
pub fn default_column_groups() -> Vec<ColumnGroup> {
    let group = |id: &str, fields: &[&str]| ColumnGroup {
        group_id: id.to_owned(),
        children: fields.iter().map(|f| (*f).to_owned()).collect(),
    };
    vec![
        group(
            "User Info",
            &[
                "displayName",
                "previousCohort",
                "ratingSystem",
                "startRating",
                "currentRating",
                "ratingChange",
            ],
        ),
        group("Progress", &["cohortScore", "percentComplete"]),
    ]
}

/// One group per category, in the order categories are first encountered.
#[must_use]
pub fn column_groups(columns: &[ScoreColumn]) -> Vec<ColumnGroup> {
    let mut groups: Vec<ColumnGroup> = Vec::new();
    for column in columns {
        let field = column.field.as_str().to_owned();
        match groups.iter_mut().find(|g| g.group_id == column.category) {
            Some(group) => group.children.push(field),
            None => groups.push(ColumnGroup {
                group_id: column.category.clone(),
                children: vec![field],
            }),
        }
    }
    groups
}

//
// ─── ORDERING ──────────────────────────────────────────────────────────────────
//

/// Total display order: category priority, then name, then id.
#[must_use]
pub fn compare_requirements(a: &Requirement, b: &Requirement) -> Ordering {
    a.category_rank()
        .cmp(&b.category_rank())
        .then_with(|| a.category.cmp(&b.category))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

//
// ─── ROWS ──────────────────────────────────────────────────────────────────────
//

/// One scoreboard line, derived fresh from a user (or graduation) and the
/// requirement catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreboardRow {
    pub username: Username,
    pub display_name: String,
    /// Up to the last three graduation cohorts, else the previous cohort.
    pub graduated: Vec<Cohort>,
    pub rating_system: RatingSystem,
    pub start_rating: i64,
    pub current_rating: i64,
    pub rating_change: i64,
    pub cohort_score: i64,
    pub percent_complete: f64,
    pub category_scores: Vec<(String, i64)>,
    pub cells: Vec<(RequirementId, ScoreCell)>,
}

const MAX_GRADUATION_ICONS: usize = 3;

impl ScoreboardRow {
    #[must_use]
    pub fn from_user(user: &User, cohort: &Cohort, requirements: &[Requirement]) -> Self {
        let graduated = if user.graduation_cohorts.is_empty() {
            user.previous_cohort.iter().cloned().collect()
        } else {
            let skip = user
                .graduation_cohorts
                .len()
                .saturating_sub(MAX_GRADUATION_ICONS);
            user.graduation_cohorts[skip..].to_vec()
        };
        let scores = ScoreFields::compute(user, cohort, requirements);
        Self {
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            graduated,
            rating_system: user.rating_system,
            start_rating: user.start_rating(),
            current_rating: user.current_rating(),
            rating_change: user.rating_change(),
            cohort_score: scores.cohort_score,
            percent_complete: scores.percent_complete,
            category_scores: scores.category_scores,
            cells: scores.cells,
        }
    }

    #[must_use]
    pub fn from_graduation(
        graduation: &Graduation,
        cohort: &Cohort,
        requirements: &[Requirement],
    ) -> Self {
        let scores = ScoreFields::compute(graduation, cohort, requirements);
        Self {
            username: graduation.username.clone(),
            display_name: graduation.display_name.clone(),
            graduated: vec![graduation.previous_cohort.clone()],
            rating_system: graduation.rating_system,
            start_rating: graduation.start_rating,
            current_rating: graduation.current_rating,
            rating_change: graduation.rating_change(),
            cohort_score: scores.cohort_score,
            percent_complete: scores.percent_complete,
            category_scores: scores.category_scores,
            cells: scores.cells,
        }
    }
}

struct ScoreFields {
    cohort_score: i64,
    percent_complete: f64,
    category_scores: Vec<(String, i64)>,
    cells: Vec<(RequirementId, ScoreCell)>,
}

impl ScoreFields {
    fn compute<H: ProgressHolder + ?Sized>(
        holder: &H,
        cohort: &Cohort,
        requirements: &[Requirement],
    ) -> Self {
        let columns = columns_for(requirements, cohort);
        let category_scores = column_groups(&columns)
            .into_iter()
            .map(|group| {
                let score = category_score(holder, cohort, requirements, &group.group_id);
                (group.group_id, score)
            })
            .collect();
        Self {
            cohort_score: cohort_score(holder, cohort, requirements),
            percent_complete: percent_complete(holder, cohort, requirements),
            category_scores,
            cells: columns
                .iter()
                .map(|column| (column.field.clone(), column.cell(holder)))
                .collect(),
        }
    }
}
