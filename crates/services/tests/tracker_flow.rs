use services::{AppServices, Clock, LoadOutcome, RequestStatus};
use storage::{InMemoryRepository, Storage};
use tracker_core::model::{Cohort, Counts, Requirement, RequirementId, ScoreboardDisplay, User, Username};
use tracker_core::time::fixed_now;
use tracker_core::timeline::history_items;

fn cohort() -> Cohort {
    Cohort::new("1500-1600").expect("cohort")
}

fn seeded_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new()
        .with_page_size(2)
        .with_clock(Clock::fixed(fixed_now()));
    let requirements = [
        Requirement::new(
            "games",
            "Play classical games",
            "Games + Analysis",
            ScoreboardDisplay::ProgressBar,
            Counts::new().with(cohort(), 10),
        ),
        Requirement::new(
            "polgar",
            "Polgar mates in one",
            "Tactics",
            ScoreboardDisplay::ProgressBar,
            Counts::global(5),
        ),
        Requirement::new(
            "discord",
            "Join Discord",
            "Welcome to the Dojo",
            ScoreboardDisplay::Checkbox,
            Counts::global(1),
        ),
    ];
    for r in requirements {
        repo.insert_requirement(r).expect("seed requirement");
    }
    for name in ["alice", "bob", "carol"] {
        repo.insert_user(User::new(name, name, cohort()))
            .expect("seed user");
    }
    repo.sign_in(Username::new("alice")).expect("sign in");
    repo
}

#[tokio::test]
async fn progress_flows_into_the_scoreboard() {
    let repo = seeded_repo();
    let services = AppServices::new(Storage::from_repository(repo.clone()), Clock::fixed(fixed_now()));
    let scoreboard = services.scoreboard();
    let progress = services.progress();

    let viewer = services.current_user().await.expect("current user");
    let board = scoreboard
        .scoreboard(Some(&viewer), &cohort())
        .await
        .expect("initial scoreboard");
    assert_eq!(board.members.len(), 3);
    assert_eq!(board.members[0].username.as_str(), "alice");
    assert_eq!(board.members[0].percent_complete, 0.0);

    let polgar = RequirementId::new("polgar");
    let viewer = progress
        .record_progress(&cohort(), &polgar, 5, 90)
        .await
        .expect("record progress");
    scoreboard.put_member(viewer.clone());

    let board = scoreboard.build(Some(&viewer), &cohort());
    let alice = &board.members[0];
    assert_eq!(alice.cohort_score, 5);
    // 5 of (10 + 5 + 1)
    assert!((alice.percent_complete - 31.25).abs() < 1e-9);
    let polgar_cell = alice
        .cells
        .iter()
        .find(|(id, _)| id == &polgar)
        .map(|(_, cell)| *cell)
        .expect("polgar cell");
    assert!(polgar_cell.is_complete());

    // the global counter applies in any cohort
    let other = Cohort::new("2000-2100").expect("cohort");
    let requirements = services
        .requirements()
        .fetch_requirements(&other, true)
        .await
        .expect("requirements for other cohort");
    assert_eq!(requirements.len(), 2);
    let percent = tracker_core::score::percent_complete(&viewer, &other, &requirements);
    assert!((percent - 500.0 / 6.0).abs() < 1e-9);
}

#[tokio::test]
async fn timeline_edits_replace_the_slice_atomically() {
    let repo = seeded_repo();
    let services = AppServices::new(Storage::from_repository(repo), Clock::fixed(fixed_now()));
    let progress = services.progress();
    let games = RequirementId::new("games");

    for count in [3, 1, 4] {
        progress
            .record_progress(&cohort(), &games, count, 20)
            .await
            .expect("record progress");
    }
    let user = services.current_user().await.expect("current user");
    let mut items = history_items(&user.timeline, &games, &cohort());
    assert_eq!(items.len(), 3);

    items[1].count = "-1".into();
    items.remove(2);
    let user = progress
        .save_timeline(&items, &games, &cohort())
        .await
        .expect("save timeline");

    let chain: Vec<(i64, i64)> = user
        .timeline
        .iter()
        .map(|e| (e.previous_count, e.new_count))
        .collect();
    assert_eq!(chain, vec![(0, 3), (3, 2)]);
    assert_eq!(user.progress[&games].counts.resolve(&cohort()), Some(2));
    assert_eq!(user.progress[&games].minutes_spent.resolve(&cohort()), Some(40));

    items[0].minutes = "x".into();
    let before = services.current_user().await.expect("current user");
    assert!(progress.save_timeline(&items, &games, &cohort()).await.is_err());
    let after = services.current_user().await.expect("current user");
    assert_eq!(before, after);
}

#[tokio::test]
async fn concurrent_scoreboard_loads_fetch_each_partition_once() {
    let repo = seeded_repo();
    let services = AppServices::new(Storage::from_repository(repo.clone()), Clock::fixed(fixed_now()));
    let requirements = services.requirements();

    let cohort = cohort();
    let (a, b) = tokio::join!(requirements.load(&cohort), requirements.load(&cohort));
    let outcomes = [a.expect("first load"), b.expect("second load")];
    assert!(outcomes.contains(&LoadOutcome::Loaded { items: 3 }));
    assert!(
        outcomes.contains(&LoadOutcome::InFlight) || outcomes.contains(&LoadOutcome::Cached)
    );
    // three requirements at two per page
    assert_eq!(repo.page_requests(), 2);
    assert_eq!(requirements.status(&cohort), RequestStatus::Success);
}

#[tokio::test]
async fn events_load_through_app_services() {
    let repo = seeded_repo();
    let services = AppServices::new(Storage::from_repository(repo), Clock::fixed(fixed_now()));
    let events = services.events();
    assert_eq!(events.load().await.expect("load events"), LoadOutcome::Loaded { items: 0 });
    assert_eq!(events.upcoming_meetings(&Username::new("alice")), 0);
}
