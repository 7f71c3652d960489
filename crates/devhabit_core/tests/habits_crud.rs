use devhabit_core::model::habit::{
    CreateHabitDto, Frequency, FrequencyType, HabitDto, HabitStatus, HabitType,
    HabitWithTagsDto, Target,
};
use devhabit_core::model::tag::CreateTagDto;
use devhabit_core::repo::habit_repo::SqliteHabitRepository;
use devhabit_core::repo::tag_repo::SqliteTagRepository;
use devhabit_core::{
    build_sort_registry, open_db, open_db_in_memory, HabitService, PagingConfig, QueryEngine,
    ServiceError, TagService,
};
use rusqlite::Connection;
use serde_json::{json, Value};

struct Services<'conn> {
    habits: HabitService<SqliteHabitRepository<'conn>>,
    tags: TagService<SqliteTagRepository<'conn>>,
}

fn services(conn: &Connection) -> Services<'_> {
    let engine = QueryEngine::new(build_sort_registry().unwrap());
    Services {
        habits: HabitService::new(
            SqliteHabitRepository::new(conn),
            engine.clone(),
            PagingConfig::default(),
        ),
        tags: TagService::new(SqliteTagRepository::new(conn), engine, PagingConfig::default()),
    }
}

fn reading() -> CreateHabitDto {
    CreateHabitDto {
        name: "Read".to_string(),
        description: Some("Read technical books".to_string()),
        kind: HabitType::Measurable,
        frequency: Frequency {
            kind: FrequencyType::Daily,
            times_per_period: 1,
        },
        target: Target {
            value: 30,
            unit: "pages".to_string(),
        },
        end_date: Some("2026-12-31".to_string()),
        milestone_target: Some(500),
    }
}

fn tag(services: &Services<'_>, name: &str) -> String {
    services
        .tags
        .create_tag(CreateTagDto {
            name: name.to_string(),
            description: None,
        })
        .unwrap()
        .id
}

#[test]
fn create_then_get_returns_full_detail_with_tags() {
    let conn = open_db_in_memory().unwrap();
    let services = services(&conn);
    let created = services.habits.create_habit(reading()).unwrap();
    assert_eq!(created.status, HabitStatus::Ongoing);
    assert_eq!(created.milestone.as_ref().map(|m| m.current), Some(0));

    let learning = tag(&services, "learning");
    let focus = tag(&services, "Focus");
    assert!(services
        .habits
        .upsert_habit_tags(&created.id, &[learning, focus])
        .unwrap());

    let detail = services.habits.get_habit(&created.id, None).unwrap();
    assert_eq!(detail.get("tags"), Some(&json!(["Focus", "learning"])));

    // Full shape carries every field of the detail view.
    let round_trip: HabitWithTagsDto =
        serde_json::from_value(serde_json::to_value(&detail).unwrap()).unwrap();
    assert_eq!(round_trip.habit, created);
    assert_eq!(round_trip.tags, vec!["Focus", "learning"]);
}

#[test]
fn detail_fields_select_a_subset() {
    let conn = open_db_in_memory().unwrap();
    let services = services(&conn);
    let created = services.habits.create_habit(reading()).unwrap();

    let detail = services
        .habits
        .get_habit(&created.id, Some("tags, target,id"))
        .unwrap();
    assert_eq!(detail.keys().collect::<Vec<_>>(), vec!["id", "target", "tags"]);
    assert_eq!(detail.get("target"), Some(&json!({ "value": 30, "unit": "pages" })));

    let err = services
        .habits
        .get_habit(&created.id, Some("id,owner"))
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[test]
fn upserting_the_same_tag_set_is_a_no_op() {
    let conn = open_db_in_memory().unwrap();
    let services = services(&conn);
    let habit = services.habits.create_habit(reading()).unwrap();
    let health = tag(&services, "health");

    let tags = vec![health.clone(), format!(" {health} ")];
    assert!(services.habits.upsert_habit_tags(&habit.id, &tags).unwrap());
    assert!(!services.habits.upsert_habit_tags(&habit.id, &tags).unwrap());

    assert!(services.habits.upsert_habit_tags(&habit.id, &[]).unwrap());
    let detail = services.habits.get_habit(&habit.id, Some("tags")).unwrap();
    assert_eq!(detail.get("tags"), Some(&json!([])));
}

#[test]
fn unknown_tag_ids_are_rejected_without_changes() {
    let conn = open_db_in_memory().unwrap();
    let services = services(&conn);
    let habit = services.habits.create_habit(reading()).unwrap();
    let health = tag(&services, "health");
    services
        .habits
        .upsert_habit_tags(&habit.id, &[health.clone()])
        .unwrap();

    let err = services
        .habits
        .upsert_habit_tags(&habit.id, &[health, "t_missing".to_string()])
        .unwrap_err();
    match &err {
        ServiceError::UnknownTags(ids) => assert_eq!(ids, &vec!["t_missing".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.status_code(), 400);

    let detail = services.habits.get_habit(&habit.id, Some("tags")).unwrap();
    assert_eq!(detail.get("tags"), Some(&json!(["health"])));
}

#[test]
fn removing_a_missing_link_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let services = services(&conn);
    let habit = services.habits.create_habit(reading()).unwrap();
    let health = tag(&services, "health");
    services
        .habits
        .upsert_habit_tags(&habit.id, &[health.clone()])
        .unwrap();

    services.habits.remove_habit_tag(&habit.id, &health).unwrap();
    let err = services
        .habits
        .remove_habit_tag(&habit.id, &health)
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn deleting_a_tag_cascades_to_habit_links() {
    let conn = open_db_in_memory().unwrap();
    let services = services(&conn);
    let habit = services.habits.create_habit(reading()).unwrap();
    let health = tag(&services, "health");
    services
        .habits
        .upsert_habit_tags(&habit.id, &[health.clone()])
        .unwrap();

    services.tags.delete_tag(&health).unwrap();
    let detail = services.habits.get_habit(&habit.id, Some("tags")).unwrap();
    assert_eq!(detail.get("tags"), Some(&Value::Array(Vec::new())));
}

#[test]
fn invalid_payload_is_a_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let services = services(&conn);
    let mut dto = reading();
    dto.frequency.times_per_period = 0;

    let err = services.habits.create_habit(dto).unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(err.is_client_error());
}

#[test]
fn habits_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devhabit.db");

    let created: HabitDto = {
        let conn = open_db(&path).unwrap();
        let services = services(&conn);
        services.habits.create_habit(reading()).unwrap()
    };

    let conn = open_db(&path).unwrap();
    let services = services(&conn);
    let detail = services
        .habits
        .get_habit(&created.id, Some("name,frequency,endDate"))
        .unwrap();
    assert_eq!(detail.get("name"), Some(&json!("Read")));
    assert_eq!(
        detail.get("frequency"),
        Some(&json!({ "type": "daily", "timesPerPeriod": 1 }))
    );
    assert_eq!(detail.get("endDate"), Some(&json!("2026-12-31")));
}
