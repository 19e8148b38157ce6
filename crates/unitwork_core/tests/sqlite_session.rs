mod common;

use common::{copy_id_back, require_name, stamp_id, to_contact, Contact, ContactForm};
use unitwork_core::{
    EntityService, EntityState, Manipulation, ManipulationOptions, PersistenceSession,
    SqliteSession, NOT_PERSISTED, TRANSACTION_FAILED_CODE,
};
use uuid::Uuid;

fn contact(id: Uuid, name: &str) -> Contact {
    Contact {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        revision: 1,
    }
}

#[test]
fn pipeline_writes_rows_and_detaches() {
    let mut session = SqliteSession::open_in_memory().unwrap();

    let outcome = Manipulation::insert(ContactForm::new("Ada", "ada@x.io"), to_contact)
        .validator(require_name)
        .on_committing(stamp_id)
        .on_committed(copy_id_back)
        .execute(&mut session);

    assert!(outcome.succeeded());
    let result = outcome.into_value().unwrap();
    let id = result.model.id.unwrap();
    assert_eq!(result.affected, 1);
    assert_eq!(session.count::<Contact>().unwrap(), 1);
    assert!(session.find_tracked::<Contact>(&id).is_none());
    assert!(session.connection().is_autocommit());

    let stored = session.fetch::<Contact>(&id).unwrap().unwrap();
    assert_eq!(stored.name, "Ada");
    assert_eq!(stored.revision, 1);
}

#[test]
fn duplicate_insert_fails_without_partial_rows() {
    let mut session = SqliteSession::open_in_memory().unwrap();
    let existing = contact(Uuid::new_v4(), "Ada");
    let entry = session.add(&existing).unwrap();
    assert!(session.save().succeeded());
    session.detach(&entry);

    session.add(&contact(Uuid::new_v4(), "Bob")).unwrap();
    session.add(&existing).unwrap();
    let outcome = session.save();

    assert!(!outcome.succeeded());
    assert_eq!(outcome.errors()[0].code, "duplicate_key");
    assert_eq!(session.count::<Contact>().unwrap(), 1);
    assert!(session.has_changes());
}

#[test]
fn delete_of_missing_row_is_not_found() {
    let mut session = SqliteSession::open_in_memory().unwrap();
    let id = Uuid::new_v4();

    let outcome = Manipulation::delete(id, |id: &Uuid| Some(contact(*id, "Ghost")))
        .execute(&mut session);

    assert!(!outcome.succeeded());
    assert_eq!(outcome.errors()[0].code, "not_found");
    assert_eq!(outcome.value().unwrap().model, id);
    assert_eq!(session.tracked_count(), 0);
}

#[test]
fn caller_transaction_rollback_discards_pipeline_writes() {
    let mut session = SqliteSession::open_in_memory().unwrap();
    let tx = session.begin_transaction().unwrap();

    for name in ["Ada", "Bob"] {
        let outcome = Manipulation::insert(ContactForm::new(name, "x@x.io"), to_contact)
            .on_committing(stamp_id)
            .transaction(tx)
            .execute(&mut session);
        assert!(outcome.succeeded());
    }
    assert_eq!(session.count::<Contact>().unwrap(), 2);
    assert!(!session.connection().is_autocommit());

    session.rollback(tx).unwrap();
    assert_eq!(session.count::<Contact>().unwrap(), 0);
}

#[test]
fn validation_failure_rolls_back_pipeline_transaction() {
    let mut session = SqliteSession::open_in_memory().unwrap();

    let outcome = Manipulation::insert(ContactForm::new(" ", "x@x.io"), to_contact)
        .validator(require_name)
        .execute(&mut session);

    assert!(!outcome.succeeded());
    assert!(session.connection().is_autocommit());
    // The session accepts a new transaction, so the abandoned one was closed.
    let tx = session.begin_transaction().unwrap();
    session.commit(tx).unwrap();
}

#[test]
fn fetch_attached_tracks_unchanged() {
    let mut session = SqliteSession::open_in_memory().unwrap();
    let stored = contact(Uuid::new_v4(), "Ada");
    session.add(&stored).unwrap();
    assert!(session.save().succeeded());
    session.detach(&session.find_tracked::<Contact>(&stored.id).unwrap());

    let loaded = session.fetch_attached::<Contact>(&stored.id).unwrap();
    assert_eq!(loaded, Some(stored.clone()));
    assert_eq!(
        session.find_tracked::<Contact>(&stored.id).unwrap().state,
        EntityState::Unchanged
    );
    assert!(!session.has_changes());
}

#[test]
fn file_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.db");
    let id = Uuid::new_v4();

    {
        let mut service = EntityService::new(SqliteSession::open(&path).unwrap());
        let outcome = service.insert(id, |id: &Uuid| Some(contact(*id, "Ada")));
        assert!(outcome.succeeded());
    }

    let mut service = EntityService::new(SqliteSession::open(&path).unwrap());
    assert_eq!(
        service.find::<Contact>(&id).unwrap().map(|c| c.name),
        Some("Ada".to_string())
    );

    let updated = service.update(id, |id: &Uuid| Some(contact(*id, "Ada Lovelace")));
    assert!(updated.succeeded());
    let listed = service.session().list::<Contact>().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Ada Lovelace");

    let deleted = service.delete(id, |id: &Uuid| Some(contact(*id, "")));
    assert!(deleted.succeeded());
    assert_eq!(service.session().count::<Contact>().unwrap(), 0);
}

#[test]
fn service_options_apply_to_every_call() {
    let session = SqliteSession::open_in_memory().unwrap();
    let mut service = EntityService::with_options(
        session,
        ManipulationOptions {
            persist: false,
            use_transaction: true,
        },
    );
    let id = Uuid::new_v4();

    let outcome = service.insert(id, |id: &Uuid| Some(contact(*id, "Ada")));
    assert!(outcome.succeeded());
    assert_eq!(outcome.value().unwrap().affected, NOT_PERSISTED);
    assert_eq!(service.session().count::<Contact>().unwrap(), 0);
    assert_eq!(
        service.session().find_tracked::<Contact>(&id).unwrap().state,
        EntityState::Added
    );

    let saved = service.session_mut().save();
    assert_eq!(saved.value(), Some(&1));
}

#[test]
fn committed_handle_cannot_be_reused() {
    let mut session = SqliteSession::open_in_memory().unwrap();
    let tx = session.begin_transaction().unwrap();
    session.commit(tx).unwrap();

    let outcome = Manipulation::insert(ContactForm::new("Ada", "ada@x.io"), to_contact)
        .on_committing(stamp_id)
        .transaction(tx)
        .execute(&mut session);

    assert!(!outcome.succeeded());
    assert_eq!(outcome.errors()[0].code, TRANSACTION_FAILED_CODE);
    assert!(outcome.errors()[0].error.contains("not active"));
    assert_eq!(session.count::<Contact>().unwrap(), 0);
    assert_eq!(session.tracked_count(), 0);
    assert!(session.connection().is_autocommit());
}

#[test]
fn handle_from_another_session_is_rejected() {
    let mut owner = SqliteSession::open_in_memory().unwrap();
    let mut other = SqliteSession::open_in_memory().unwrap();
    let foreign = owner.begin_transaction().unwrap();
    let local = other.begin_transaction().unwrap();
    other.commit(local).unwrap();
    // Both sessions number their first transaction alike; the second one
    // on `other` is a different handle from `foreign`.
    let _reopened = other.begin_transaction().unwrap();

    let outcome = Manipulation::insert(ContactForm::new("Ada", "ada@x.io"), to_contact)
        .on_committing(stamp_id)
        .transaction(foreign)
        .execute(&mut other);

    assert!(!outcome.succeeded());
    assert_eq!(outcome.errors()[0].code, TRANSACTION_FAILED_CODE);
    assert_eq!(other.count::<Contact>().unwrap(), 0);
    owner.rollback(foreign).unwrap();
}

#[test]
fn rollback_after_save_returns_entity_to_pending() {
    let mut session = SqliteSession::open_in_memory().unwrap();
    let ada = contact(Uuid::new_v4(), "Ada");
    let tx = session.begin_transaction().unwrap();
    session.add(&ada).unwrap();
    assert!(session.save().succeeded());

    session.rollback(tx).unwrap();
    assert_eq!(session.count::<Contact>().unwrap(), 0);
    assert_eq!(
        session.find_tracked::<Contact>(&ada.id).unwrap().state,
        EntityState::Added
    );

    assert_eq!(session.save().value(), Some(&1));
    assert_eq!(session.count::<Contact>().unwrap(), 1);
}
