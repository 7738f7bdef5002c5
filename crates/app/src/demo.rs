//! Seeded in-memory data for running the CLI without a backend.

use chrono::Duration;
use storage::{InMemoryRepository, StorageError};
use tracker_core::Clock;
use tracker_core::model::{
    AvailabilityStatus, AvailabilityType, Cohort, Counts, Event, EventId, EventType, Participant,
    RatingSystem, Requirement, RequirementId, RequirementProgress, ScoreboardDisplay, User,
    Username,
};

pub const DEMO_USER: &str = "demo";

fn cohort(name: &str) -> Result<Cohort, StorageError> {
    Cohort::new(name).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn with_progress(mut user: User, requirement: &str, counts: Counts) -> User {
    let id = RequirementId::new(requirement);
    user.progress
        .insert(id.clone(), RequirementProgress::new(id, counts));
    user
}

/// A small cohort with a handful of requirements, members and meetings.
///
/// # Errors
///
/// Returns `StorageError` if the repository rejects the seed data.
pub fn repository(clock: Clock) -> Result<InMemoryRepository, StorageError> {
    let repo = InMemoryRepository::new().with_page_size(3).with_clock(clock);
    let c1500 = cohort("1500-1600")?;
    let c1400 = cohort("1400-1500")?;

    for requirement in [
        Requirement::new(
            "discord",
            "Join the Discord",
            "Welcome to the Dojo",
            ScoreboardDisplay::Checkbox,
            Counts::global(1),
        ),
        Requirement::new(
            "classical-games",
            "Play classical games",
            "Games + Analysis",
            ScoreboardDisplay::ProgressBar,
            Counts::new().with(c1500.clone(), 10).with(c1400.clone(), 8),
        ),
        Requirement::new(
            "polgar-m1",
            "Polgar mates in one",
            "Tactics",
            ScoreboardDisplay::ProgressBar,
            Counts::global(306),
        ),
        Requirement::new(
            "rook-endgames",
            "Rook endgame drills",
            "Endgame",
            ScoreboardDisplay::Unspecified,
            Counts::new().with(c1500.clone(), 12),
        ),
        Requirement::new(
            "journal",
            "Training journal",
            "Non-Dojo",
            ScoreboardDisplay::Hidden,
            Counts::global(1),
        ),
    ] {
        repo.insert_requirement(requirement)?;
    }

    let mut demo = User::new(DEMO_USER, "Demo Player", c1500.clone());
    demo.rating_system = RatingSystem::Lichess;
    demo.ratings.start_lichess_rating = 1580;
    demo.ratings.current_lichess_rating = 1642;
    demo.previous_cohort = Some(c1400.clone());
    let demo = with_progress(demo, "polgar-m1", Counts::global(120));
    let demo = with_progress(demo, "discord", Counts::global(1));

    let mut rival = User::new("rival", "Rival", c1500.clone());
    rival.rating_system = RatingSystem::Chesscom;
    rival.ratings.start_chesscom_rating = 1500;
    rival.ratings.current_chesscom_rating = 1555;
    let rival = with_progress(rival, "classical-games", Counts::new().with(c1500.clone(), 7));

    let newcomer = User::new("newcomer", "Newcomer", c1500.clone());
    let elsewhere = User::new("elsewhere", "Elsewhere", c1400);

    for user in [demo, rival, newcomer, elsewhere] {
        repo.insert_user(user)?;
    }
    repo.sign_in(Username::new(DEMO_USER))?;

    let start_time = clock.now() + Duration::hours(2);
    repo.insert_event(Event {
        id: EventId::new("meeting-1"),
        kind: EventType::Availability,
        owner: Username::new("rival"),
        owner_display_name: "Rival".into(),
        title: String::new(),
        start_time,
        end_time: start_time + Duration::hours(1),
        types: vec![AvailabilityType::ClassicalGame],
        booked_type: Some(AvailabilityType::ClassicalGame),
        cohorts: vec![c1500.clone()],
        status: AvailabilityStatus::Booked,
        location: "Lichess".into(),
        max_participants: AvailabilityType::ClassicalGame.default_max_participants(),
        participants: vec![Participant {
            username: Username::new(DEMO_USER),
            display_name: "Demo Player".into(),
            cohort: c1500,
        }],
    })?;

    Ok(repo)
}
