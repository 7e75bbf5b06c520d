use chrono::{Days, Duration, NaiveDate, TimeZone, Utc};
use levelup_core::leaderboard::Leaderboard;
use levelup_core::materials::{MaterialDraft, MaterialUpload, Materials};
use levelup_core::memory::{InMemoryDatabase, InMemoryStorage};
use levelup_core::mentors::Mentoring;
use levelup_core::profiles::Profiles;
use levelup_core::{
    AwardRequest, CooldownTable, DatabaseService, MaterialType, PortError, ProfileUpdate,
    RevisionScheduler, Role, XpEngine, XpEventType,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    db: Arc<InMemoryDatabase>,
    storage: Arc<InMemoryStorage>,
    xp: Arc<XpEngine>,
    scheduler: Arc<RevisionScheduler>,
    materials: Materials,
}

fn harness() -> Harness {
    let db = Arc::new(InMemoryDatabase::new());
    let storage = Arc::new(InMemoryStorage::new());
    let xp = Arc::new(XpEngine::new(db.clone(), CooldownTable::default()));
    let scheduler = Arc::new(RevisionScheduler::new(db.clone(), xp.clone()));
    let materials = Materials::new(db.clone(), storage.clone(), scheduler.clone());
    Harness {
        db,
        storage,
        xp,
        scheduler,
        materials,
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn profile(db: &InMemoryDatabase, name: &str, role: Role) -> Uuid {
    db.create_profile(&format!("{}@example.com", name), name, "hash", role)
        .await
        .expect("create profile")
        .id
}

fn link_draft(topic_id: Uuid, material_type: MaterialType) -> MaterialDraft {
    MaterialDraft {
        topic_id,
        title: "Cell biology".to_string(),
        material_type,
        url: Some("https://videos.example.com/cells".to_string()),
        upload: None,
    }
}

#[tokio::test]
async fn first_open_schedules_four_revisions_once() {
    let h = harness();
    let mentor = profile(&h.db, "mina", Role::Mentor).await;
    let student = profile(&h.db, "sam", Role::Student).await;
    let topic = Uuid::new_v4();
    let material = h
        .materials
        .publish(mentor, Role::Mentor, link_draft(topic, MaterialType::Video))
        .await
        .expect("publish");

    let opened_on = day(2024, 9, 1);
    let first = h
        .materials
        .open(student, Role::Student, material.id, opened_on)
        .await
        .expect("open");
    let due: Vec<NaiveDate> = first.scheduled.iter().map(|e| e.due_date).collect();
    assert_eq!(
        due,
        vec![day(2024, 9, 2), day(2024, 9, 8), day(2024, 9, 15), day(2024, 10, 1)]
    );

    let second = h
        .materials
        .open(student, Role::Student, material.id, day(2024, 9, 3))
        .await
        .expect("second open");
    assert!(second.scheduled.is_empty());
    assert_eq!(h.db.list_revision_entries(student).await.unwrap().len(), 4);

    // Mentors browsing a material do not get a schedule.
    let preview = h
        .materials
        .open(mentor, Role::Mentor, material.id, opened_on)
        .await
        .expect("mentor open");
    assert!(preview.scheduled.is_empty());
}

#[tokio::test]
async fn buckets_split_pending_revisions_by_today() {
    let h = harness();
    let student = profile(&h.db, "sam", Role::Student).await;
    h.scheduler
        .schedule_on_first_open(student, Uuid::new_v4(), MaterialType::Notes, day(2024, 1, 1))
        .await
        .expect("schedule");

    // Due dates: Jan 2, Jan 8, Jan 15, Jan 31.
    let buckets = h.scheduler.buckets(student, day(2024, 1, 8)).await.expect("buckets");
    assert_eq!(buckets.overdue.len(), 1);
    assert_eq!(buckets.overdue[0].due_date, day(2024, 1, 2));
    assert_eq!(buckets.today.len(), 1);
    assert_eq!(buckets.upcoming.len(), 2);
}

#[tokio::test]
async fn completing_a_revision_grants_xp_once() {
    let h = harness();
    let student = profile(&h.db, "sam", Role::Student).await;
    let entries = h
        .scheduler
        .schedule_on_first_open(student, Uuid::new_v4(), MaterialType::Flashcards, day(2024, 2, 1))
        .await
        .expect("schedule");
    let now = Utc.with_ymd_and_hms(2024, 2, 2, 9, 0, 0).unwrap();

    let done = h
        .scheduler
        .complete(student, entries[0].id, now)
        .await
        .expect("complete");
    assert!(done.entry.completed);
    assert_eq!(done.award.xp_earned, 25);
    assert_eq!(h.db.level_row(student).map(|r| r.total_xp), Some(25));

    let again = h.scheduler.complete(student, entries[0].id, now).await;
    assert!(matches!(again, Err(PortError::Invalid(_))));

    let buckets = h.scheduler.buckets(student, day(2024, 2, 2)).await.unwrap();
    assert!(buckets.today.is_empty());
    assert_eq!(buckets.upcoming.len(), 3);

    // The second revision is not due until Feb 8.
    let early = h.scheduler.complete(student, entries[1].id, now).await;
    assert!(matches!(early, Err(PortError::Invalid(_))));
    assert_eq!(h.db.level_row(student).map(|r| r.total_xp), Some(25));

    // Each revision is its own action, so the next one is not held by the cooldown.
    let due_day = Utc.with_ymd_and_hms(2024, 2, 8, 9, 0, 0).unwrap();
    let next = h
        .scheduler
        .complete(student, entries[1].id, due_day + Duration::seconds(5))
        .await
        .expect("complete second");
    assert_eq!(next.award.xp_earned, 25);
}

#[tokio::test]
async fn future_revisions_cannot_be_completed() {
    let h = harness();
    let student = profile(&h.db, "sam", Role::Student).await;
    let entries = h
        .scheduler
        .schedule_on_first_open(student, Uuid::new_v4(), MaterialType::Notes, day(2024, 3, 1))
        .await
        .expect("schedule");
    let opened_day = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    for entry in &entries {
        let result = h.scheduler.complete(student, entry.id, opened_day).await;
        assert!(matches!(result, Err(PortError::Invalid(_))));
    }
    assert!(h.db.level_row(student).is_none());
    let pending = h.db.list_revision_entries(student).await.unwrap();
    assert!(pending.iter().all(|e| !e.completed));
}

#[tokio::test]
async fn failed_grant_leaves_the_revision_pending() {
    let h = harness();
    let student = profile(&h.db, "sam", Role::Student).await;
    let entries = h
        .scheduler
        .schedule_on_first_open(student, Uuid::new_v4(), MaterialType::Video, day(2024, 4, 1))
        .await
        .expect("schedule");
    let now = Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap();

    h.db.fail_level_upserts.store(true, Ordering::SeqCst);
    let failed = h.scheduler.complete(student, entries[0].id, now).await;
    assert!(failed.is_err());
    let entry = h.db.get_revision_entry(entries[0].id).await.unwrap();
    assert!(!entry.completed);
    assert!(entry.completed_at.is_none());

    h.db.fail_level_upserts.store(false, Ordering::SeqCst);
    let retry = h
        .scheduler
        .complete(student, entries[0].id, now)
        .await
        .expect("retry completes");
    assert!(retry.entry.completed);
    assert_eq!(retry.award.xp_earned, 25);
}

#[tokio::test]
async fn racing_first_open_reports_only_its_own_rows() {
    let h = harness();
    let student = profile(&h.db, "sam", Role::Student).await;
    let topic = Uuid::new_v4();
    h.scheduler
        .schedule_on_first_open(student, topic, MaterialType::Test, day(2024, 5, 1))
        .await
        .expect("winner");

    // The loser read the schedule before the winner's rows landed.
    h.db.miss_next_revision_read.store(true, Ordering::SeqCst);
    let loser = h
        .scheduler
        .schedule_on_first_open(student, topic, MaterialType::Test, day(2024, 5, 1))
        .await
        .expect("loser");
    assert!(loser.is_empty());
    assert_eq!(h.db.list_revision_entries(student).await.unwrap().len(), 4);
}

#[tokio::test]
async fn completing_someone_elses_revision_is_forbidden() {
    let h = harness();
    let owner = profile(&h.db, "sam", Role::Student).await;
    let other = profile(&h.db, "lee", Role::Student).await;
    let entries = h
        .scheduler
        .schedule_on_first_open(owner, Uuid::new_v4(), MaterialType::Test, day(2024, 2, 1))
        .await
        .unwrap();

    let result = h.scheduler.complete(other, entries[0].id, Utc::now()).await;
    assert!(matches!(result, Err(PortError::Forbidden(_))));
    assert!(h.db.level_row(other).is_none());
}

#[tokio::test]
async fn uploads_are_stored_and_removed_with_the_material() {
    let h = harness();
    let mentor = profile(&h.db, "mina", Role::Mentor).await;
    let other_mentor = profile(&h.db, "omar", Role::Mentor).await;
    let admin = profile(&h.db, "ada", Role::Admin).await;
    let topic = Uuid::new_v4();

    let mut draft = link_draft(topic, MaterialType::Notes);
    draft.url = None;
    draft.upload = Some(MaterialUpload {
        file_name: "chapter 1.pdf".to_string(),
        data: b"%PDF-1.4".to_vec(),
    });
    let material = h
        .materials
        .publish(mentor, Role::Mentor, draft)
        .await
        .expect("publish upload");
    assert!(material.url.starts_with("mem://materials/"));
    assert!(material.url.ends_with("chapter_1.pdf"));
    assert_eq!(h.storage.len(), 1);

    let denied = h.materials.remove(other_mentor, Role::Mentor, material.id).await;
    assert!(matches!(denied, Err(PortError::Forbidden(_))));

    h.materials
        .remove(admin, Role::Admin, material.id)
        .await
        .expect("admin removes");
    assert!(h.storage.is_empty());
    assert!(h.materials.list(Some(topic), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn removing_a_link_never_deletes_a_stored_file() {
    let h = harness();
    let owner = profile(&h.db, "mina", Role::Mentor).await;
    let other = profile(&h.db, "omar", Role::Mentor).await;
    let topic = Uuid::new_v4();

    let mut draft = link_draft(topic, MaterialType::Notes);
    draft.url = None;
    draft.upload = Some(MaterialUpload {
        file_name: "notes.pdf".to_string(),
        data: b"%PDF-1.4".to_vec(),
    });
    let upload = h
        .materials
        .publish(owner, Role::Mentor, draft)
        .await
        .expect("publish upload");

    let mut link = link_draft(topic, MaterialType::Notes);
    link.url = Some(upload.url.clone());
    let pointer = h
        .materials
        .publish(other, Role::Mentor, link)
        .await
        .expect("publish link");
    assert!(pointer.storage_key.is_none());

    h.materials
        .remove(other, Role::Mentor, pointer.id)
        .await
        .expect("remove link");
    assert_eq!(h.storage.len(), 1);
}

#[tokio::test]
async fn failed_insert_discards_the_upload() {
    let h = harness();
    let mentor = profile(&h.db, "mina", Role::Mentor).await;
    h.db.fail_material_inserts.store(true, Ordering::SeqCst);

    let mut draft = link_draft(Uuid::new_v4(), MaterialType::Flashcards);
    draft.url = None;
    draft.upload = Some(MaterialUpload {
        file_name: "cards.csv".to_string(),
        data: b"q,a".to_vec(),
    });
    let result = h.materials.publish(mentor, Role::Mentor, draft).await;
    assert!(result.is_err());
    assert!(h.storage.is_empty());
}

#[tokio::test]
async fn students_cannot_publish_and_drafts_need_content() {
    let h = harness();
    let student = profile(&h.db, "sam", Role::Student).await;
    let mentor = profile(&h.db, "mina", Role::Mentor).await;

    let denied = h
        .materials
        .publish(student, Role::Student, link_draft(Uuid::new_v4(), MaterialType::Video))
        .await;
    assert!(matches!(denied, Err(PortError::Forbidden(_))));

    let mut empty = link_draft(Uuid::new_v4(), MaterialType::Video);
    empty.url = None;
    let invalid = h.materials.publish(mentor, Role::Mentor, empty).await;
    assert!(matches!(invalid, Err(PortError::Invalid(_))));
}

#[tokio::test]
async fn leaderboard_ranks_by_total_xp() {
    let h = harness();
    let a = profile(&h.db, "ann", Role::Student).await;
    let b = profile(&h.db, "ben", Role::Student).await;
    let c = profile(&h.db, "cat", Role::Student).await;
    let quiet = profile(&h.db, "dot", Role::Student).await;
    let now = Utc::now();

    let mentor = profile(&h.db, "mina", Role::Mentor).await;
    let topic = Uuid::new_v4();
    let mut published = Vec::new();
    for material_type in [MaterialType::Video, MaterialType::Notes, MaterialType::Flashcards] {
        let material = h
            .materials
            .publish(mentor, Role::Mentor, link_draft(topic, material_type))
            .await
            .expect("publish");
        published.push(material.id);
    }
    let (video, notes, cards) = (published[0], published[1], published[2]);

    for (student, event, material) in [
        (a, XpEventType::VideoWatched, video),
        (a, XpEventType::NotesRead, notes),
        (b, XpEventType::NotesRead, notes),
        (c, XpEventType::FlashcardsCompleted, cards),
    ] {
        h.xp.award(
            &AwardRequest {
                event_type: event,
                material_id: Some(material),
                student_id: student,
                topic_id: None,
                score: None,
            },
            now,
        )
        .await
        .expect("award");
    }

    let board = Leaderboard::new(h.db.clone());
    let top = board.top(10).await.expect("top");
    assert_eq!(top.len(), 3);
    assert_eq!(top[0].student_id, a);
    assert_eq!(top[0].total_xp, 35);
    assert_eq!(top[1].rank, 2);
    assert_eq!(top[2].rank, 2);

    let standing = board.standing(b).await.expect("standing");
    assert_eq!(standing.rank, Some(2));
    assert_eq!(standing.xp_to_next, 985);

    let unranked = board.standing(quiet).await.expect("standing");
    assert_eq!(unranked.rank, None);
    assert_eq!(unranked.level, 1);
}

#[tokio::test]
async fn mentor_assignment_replaces_previous_link() {
    let h = harness();
    let student = profile(&h.db, "sam", Role::Student).await;
    let first = profile(&h.db, "mina", Role::Mentor).await;
    let second = profile(&h.db, "omar", Role::Mentor).await;
    let mentoring = Mentoring::new(h.db.clone());

    mentoring.assign(student, first).await.expect("assign first");
    let current = mentoring.assign(student, second).await.expect("assign second");
    assert!(current.active);

    assert!(mentoring.students_of(first).await.unwrap().is_empty());
    let students = mentoring.students_of(second).await.unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].profile.id, student);
    assert_eq!(students[0].progress.level, 1);

    mentoring.unassign(current.id).await.expect("unassign");
    assert!(mentoring.students_of(second).await.unwrap().is_empty());

    let wrong_role = mentoring.assign(first, second).await;
    assert!(matches!(wrong_role, Err(PortError::Invalid(_))));
}

#[tokio::test]
async fn profiles_are_edited_by_owner_or_admin() {
    let h = harness();
    let profiles = Profiles::new(h.db.clone());
    let student = profile(&h.db, "sam", Role::Student).await;
    let other = profile(&h.db, "lee", Role::Student).await;
    let admin = profile(&h.db, "ada", Role::Admin).await;

    let view = profiles.view(student).await.expect("view");
    assert!(view.student.is_some());
    assert!(view.mentor.is_none());

    let update = ProfileUpdate {
        full_name: Some("  Sam Park ".to_string()),
        phone: Some("555-0100".to_string()),
    };
    let updated = profiles
        .update(student, Role::Student, student, update.clone())
        .await
        .expect("own update");
    assert_eq!(updated.full_name, "Sam Park");

    let denied = profiles.update(other, Role::Student, student, update.clone()).await;
    assert!(matches!(denied, Err(PortError::Forbidden(_))));
    assert!(profiles.update(admin, Role::Admin, student, update).await.is_ok());

    let promoted = profiles
        .change_role(admin, Role::Admin, other, Role::Mentor)
        .await
        .expect("change role");
    assert_eq!(promoted.role, Role::Mentor);
    assert!(profiles.change_role(admin, Role::Admin, admin, Role::Student).await.is_err());
    assert_eq!(
        profiles.list(Role::Admin, Some(Role::Student)).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn schedule_covers_month_boundaries() {
    let h = harness();
    let student = profile(&h.db, "sam", Role::Student).await;
    let opened = day(2024, 12, 20);
    let entries = h
        .scheduler
        .schedule_on_first_open(student, Uuid::new_v4(), MaterialType::Video, opened)
        .await
        .unwrap();
    assert_eq!(entries[3].due_date, opened.checked_add_days(Days::new(30)).unwrap());
    assert_eq!(entries[3].due_date, day(2025, 1, 19));
}
