use queuemate::{
    QueueError,
    model::{Member, Reposition, UserProfile},
    persist::SqliteStorage,
    service::QueueService,
};

const CHAT: i64 = -1001;
const ADMIN: i64 = 1;

fn person(user_id: i64, first: &str) -> UserProfile {
    UserProfile {
        user_id,
        username: Some(first.to_lowercase()),
        first_name: first.to_string(),
        last_name: None,
    }
}

fn service_with(names: &[(i64, &str)]) -> QueueService {
    let service = QueueService::new(SqliteStorage::open_in_memory().expect("open"));
    service.register_chat(CHAT, Some("Class")).expect("chat");
    service.ensure_user(&person(ADMIN, "Admin")).expect("admin");
    for (id, name) in names {
        service.ensure_user(&person(*id, name)).expect("user");
    }
    service
}

fn names(members: &[Member]) -> Vec<(String, u32)> {
    members
        .iter()
        .map(|m| (m.display_name.clone(), m.position))
        .collect()
}

fn pairs(list: &[(&str, u32)]) -> Vec<(String, u32)> {
    list.iter().map(|(n, p)| (n.to_string(), *p)).collect()
}

#[test]
fn join_leave_rejoin_walkthrough() {
    let service = service_with(&[(10, "A"), (20, "B")]);
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");

    let a = service.join_queue("Math", CHAT, 10).expect("join A");
    assert_eq!(a.position, 1);
    let b = service.join_queue("Math", CHAT, 20).expect("join B");
    assert_eq!(b.position, 2);
    assert_eq!(names(&b.members), pairs(&[("A", 1), ("B", 2)]));

    let left = service.leave_queue("Math", CHAT, 10).expect("leave A");
    assert_eq!(names(&left), pairs(&[("B", 1)]));

    let again = service.rejoin_queue("Math", CHAT, 20).expect("rejoin B");
    assert_eq!(again.position, 1);
    assert_eq!(names(&again.members), pairs(&[("B", 1)]));

    service.into_storage().close().expect("close");
}

#[test]
fn rejoin_moves_to_back_or_joins() {
    let service = service_with(&[(10, "A"), (20, "B"), (30, "C")]);
    service.create_queue("Lab", CHAT, ADMIN, true).expect("create");
    service.join_queue("Lab", CHAT, 10).expect("join");
    service.join_queue("Lab", CHAT, 20).expect("join");

    let out = service.rejoin_queue("Lab", CHAT, 10).expect("rejoin member");
    assert_eq!(names(&out.members), pairs(&[("B", 1), ("A", 2)]));

    let out = service.rejoin_queue("Lab", CHAT, 30).expect("rejoin non-member");
    assert_eq!(out.position, 3);
    assert_eq!(names(&out.members), pairs(&[("B", 1), ("A", 2), ("C", 3)]));
}

#[test]
fn admin_moves_last_member_to_front() {
    let service = service_with(&[(10, "A"), (20, "B"), (30, "C"), (40, "D")]);
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    for user in [10, 20, 30, 40] {
        service.join_queue("Math", CHAT, user).expect("join");
    }

    let moved = service
        .set_member_position("Math", CHAT, "@d", 1, true)
        .expect("reposition");
    assert_eq!(moved, Reposition { old: 4, new: 1 });

    let view = service.view_one("Math", CHAT).expect("view");
    assert_eq!(names(&view.members), pairs(&[("D", 1), ("A", 2), ("B", 3), ("C", 4)]));
}

#[test]
fn set_member_position_to_current_slot_is_reported_noop() {
    let service = service_with(&[(10, "A"), (20, "B")]);
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    service.join_queue("Math", CHAT, 10).expect("join");
    service.join_queue("Math", CHAT, 20).expect("join");

    let moved = service
        .set_member_position("Math", CHAT, "B", 2, true)
        .expect("noop");
    assert!(!moved.changed());
    let view = service.view_one("Math", CHAT).expect("view");
    assert_eq!(names(&view.members), pairs(&[("A", 1), ("B", 2)]));
}

#[test]
fn set_member_position_rejects_bad_positions() {
    let service = service_with(&[(10, "A"), (20, "B")]);
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    service.join_queue("Math", CHAT, 10).expect("join");
    service.join_queue("Math", CHAT, 20).expect("join");

    for bad in [0, 3, -1, i64::MAX] {
        let err = service
            .set_member_position("Math", CHAT, "A", bad, true)
            .expect_err("invalid");
        assert!(
            matches!(err, QueueError::InvalidPosition { requested, count: 2 } if requested == bad),
            "{bad}: {err:?}"
        );
    }
    assert!(matches!(
        service.set_member_position("Math", CHAT, "Z", 1, true),
        Err(QueueError::MemberNotFound)
    ));
    assert!(matches!(
        service.set_member_position("Nope", CHAT, "A", 1, true),
        Err(QueueError::QueueNotFound)
    ));
}

#[test]
fn skip_turn_swaps_with_next_member() {
    let service = service_with(&[(10, "A"), (20, "B"), (30, "C")]);
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    for user in [10, 20, 30] {
        service.join_queue("Math", CHAT, user).expect("join");
    }

    assert!(service.skip_turn("Math", CHAT, 10).expect("skip"));
    let view = service.view_one("Math", CHAT).expect("view");
    assert_eq!(names(&view.members), pairs(&[("B", 1), ("A", 2), ("C", 3)]));

    assert!(!service.skip_turn("Math", CHAT, 30).expect("last"));
    assert!(!service.skip_turn("Math", CHAT, ADMIN).expect("not member"));
}

#[test]
fn membership_errors_are_distinct() {
    let service = service_with(&[(10, "A")]);
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    service.join_queue("Math", CHAT, 10).expect("join");

    assert!(matches!(
        service.join_queue("Math", CHAT, 10),
        Err(QueueError::AlreadyMember)
    ));
    assert!(matches!(
        service.leave_queue("Math", CHAT, ADMIN),
        Err(QueueError::NotAMember)
    ));
    assert!(matches!(
        service.join_queue("Physics", CHAT, 10),
        Err(QueueError::QueueNotFound)
    ));
    assert!(matches!(
        service.create_queue("Math", CHAT, ADMIN, true),
        Err(QueueError::DuplicateQueue)
    ));
}

#[test]
fn admin_only_operations_require_the_flag() {
    let service = service_with(&[(10, "A")]);
    assert!(matches!(
        service.create_queue("Math", CHAT, 10, false),
        Err(QueueError::AdminRequired)
    ));
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    service.join_queue("Math", CHAT, 10).expect("join");

    assert!(matches!(
        service.delete_queue("Math", CHAT, false),
        Err(QueueError::AdminRequired)
    ));
    assert!(matches!(
        service.remove_member("Math", CHAT, "A", false),
        Err(QueueError::AdminRequired)
    ));
    assert!(matches!(
        service.set_member_position("Math", CHAT, "A", 1, false),
        Err(QueueError::AdminRequired)
    ));
}

#[test]
fn remove_member_compacts_and_returns_name() {
    let service = service_with(&[(10, "A"), (20, "B"), (30, "C")]);
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    for user in [10, 20, 30] {
        service.join_queue("Math", CHAT, user).expect("join");
    }

    assert_eq!(service.remove_member("Math", CHAT, "b", true).expect("remove"), "B");
    let view = service.view_one("Math", CHAT).expect("view");
    assert_eq!(names(&view.members), pairs(&[("A", 1), ("C", 2)]));
    assert!(matches!(
        service.remove_member("Math", CHAT, "b", true),
        Err(QueueError::MemberNotFound)
    ));
}

#[test]
fn delete_and_views() {
    let service = service_with(&[(10, "A"), (20, "B")]);
    assert!(service.view_all(CHAT).expect("empty").is_empty());

    service.create_queue("Physics", CHAT, ADMIN, true).expect("create");
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    service.join_queue("Math", CHAT, 10).expect("join");
    service.join_queue("Math", CHAT, 20).expect("join");

    let all = service.view_all(CHAT).expect("all");
    let listed: Vec<(&str, u32)> = all.iter().map(|s| (s.name.as_str(), s.member_count)).collect();
    assert_eq!(listed, vec![("Math", 2), ("Physics", 0)]);

    let view = service.view_one("Math", CHAT).expect("view");
    assert_eq!(view.creator_name, "Admin");
    assert_eq!(view.members.len(), 2);
    assert_eq!(view.members[0].username.as_deref(), Some("a"));

    assert_eq!(service.delete_queue("Math", CHAT, true).expect("delete"), 2);
    assert!(matches!(service.view_one("Math", CHAT), Err(QueueError::QueueNotFound)));
    assert!(matches!(
        service.delete_queue("Math", CHAT, true),
        Err(QueueError::QueueNotFound)
    ));
}

#[test]
fn display_name_is_kept_across_sightings() {
    let service = service_with(&[(10, "A")]);
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    service.join_queue("Math", CHAT, 10).expect("join");

    service.set_display_name(10, "Alice").expect("rename");
    service.ensure_user(&person(10, "A")).expect("seen again");
    let view = service.view_one("Math", CHAT).expect("view");
    assert_eq!(view.members[0].display_name, "Alice");

    service.reset_display_name(&person(10, "A")).expect("reset");
    let view = service.view_one("Math", CHAT).expect("view");
    assert_eq!(view.members[0].display_name, "A");

    service.set_display_name(999, "Nobody").expect("unknown user is not an error");
}

#[test]
fn unregistered_user_is_an_internal_error() {
    let service = service_with(&[]);
    service.create_queue("Math", CHAT, ADMIN, true).expect("create");
    let err = service.join_queue("Math", CHAT, 555).expect_err("unknown user");
    assert!(err.is_internal(), "{err:?}");
    assert_eq!(service.view_one("Math", CHAT).expect("view").members.len(), 0);
}
