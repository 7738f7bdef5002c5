use storage::{
    EntityCache, InMemoryRepository, RequirementRepository, UserRepository, collect_pages,
};
use tracker_core::model::{Cohort, Counts, Requirement, ScoreboardDisplay, User};
use tracker_core::score::compare_requirements;

fn cohort(name: &str) -> Cohort {
    Cohort::new(name).unwrap()
}

fn requirement(id: &str, category: &str, counts: Counts) -> Requirement {
    Requirement::new(id, id, category, ScoreboardDisplay::ProgressBar, counts)
}

#[tokio::test]
async fn merge_marks_partition_after_every_page() {
    let repo = InMemoryRepository::new().with_page_size(2);
    for i in 0..5 {
        repo.insert_requirement(requirement(
            &format!("r{i}"),
            "Tactics",
            Counts::new().with(cohort("1500-1600"), 1),
        ))
        .unwrap();
    }
    repo.insert_requirement(requirement("global", "Opening", Counts::global(2)))
        .unwrap();

    let partition = cohort("1500-1600");
    let mut cache: EntityCache<Requirement> = EntityCache::new();
    let fetched = collect_pages(|start_key| repo.list_requirements(&partition, start_key))
        .await
        .unwrap();
    assert!(!cache.is_fetched(&partition));
    cache.merge_partition(partition.clone(), fetched);

    assert!(cache.is_fetched(&partition));
    assert_eq!(cache.len(), 6);
    assert_eq!(repo.page_requests(), 3);

    let listed = cache.list(|r| r.applies_to(&partition), compare_requirements);
    assert_eq!(listed.len(), 6);
    assert_eq!(listed[0].category, "Tactics");
    assert_eq!(listed.last().unwrap().id.as_str(), "global");
}

#[tokio::test]
async fn refetching_a_partition_does_not_duplicate_items() {
    let repo = InMemoryRepository::new().with_page_size(1);
    for name in ["ann", "bob", "cy"] {
        repo.insert_user(User::new(name, name, cohort("0-300"))).unwrap();
    }

    let partition = cohort("0-300");
    let mut cache: EntityCache<User> = EntityCache::new();
    for _ in 0..2 {
        let users = collect_pages(|start_key| repo.list_users_by_cohort(&partition, start_key))
            .await
            .unwrap();
        cache.merge_partition(partition.clone(), users);
    }

    assert_eq!(cache.len(), 3);
    assert!(cache.invalidate(&partition));
    assert!(!cache.is_fetched(&partition));
    assert_eq!(cache.len(), 3);
}
