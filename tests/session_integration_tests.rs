/// Session integration tests
///
/// CRUD through a session against the seeded `person` fixture, inside and
/// outside explicit transactions.
/// Run with: cargo test --test session_integration_tests

mod common;

use common::*;

#[test]
fn test_rolled_back_delete_is_reverted() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);

    session.begin_transaction()?;
    let john: Person = session.get(1)?.expect("John is seeded");
    session.delete(&john)?;
    session.rollback_transaction()?;

    let mut fresh = new_session(&db);
    let john: Option<Person> = fresh.get(1)?;
    assert_eq!(john, Some(Person::with_id(1, "John")));
    Ok(())
}

#[test]
fn test_committed_delete_is_persisted() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);

    session.begin_transaction()?;
    session.delete(&Person::with_id(1, "John"))?;
    session.commit_transaction()?;

    let mut fresh = new_session(&db);
    let john: Option<Person> = fresh.get(1)?;
    assert!(john.is_none());
    Ok(())
}

#[test]
fn test_idle_update_is_visible_immediately() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);
    let mut other = new_session(&db);

    session.update(&Person::with_id(2, "Maria"))?;

    let mine: Option<Person> = session.get(2)?;
    let theirs: Option<Person> = other.get(2)?;
    assert_eq!(mine, Some(Person::with_id(2, "Maria")));
    assert_eq!(theirs, mine);
    Ok(())
}

#[test]
fn test_insert_assigns_next_key() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);

    let mut ann = Person::new("Ann");
    session.insert(&mut ann)?;
    assert_eq!(ann.id, Some(4));

    let stored: Option<Person> = session.get(4)?;
    assert_eq!(stored, Some(ann));
    Ok(())
}

#[test]
fn test_insert_in_transaction_writes_back_key() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);

    session.begin_transaction()?;
    let mut ann = Person::new("Ann");
    session.insert(&mut ann)?;
    assert_eq!(ann.id, Some(4));
    session.commit_transaction()?;

    assert_eq!(db.row_count("person")?, 4);
    Ok(())
}

#[test]
fn test_rolled_back_insert_leaves_no_trace() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);

    session.begin_transaction()?;
    let mut ann = Person::new("Ann");
    session.insert(&mut ann)?;
    assert_eq!(ann.id, Some(4));
    session.rollback_transaction()?;

    let mut fresh = new_session(&db);
    let mut bob = Person::new("Bob");
    fresh.insert(&mut bob)?;
    assert_eq!(bob.id, Some(4));
    assert_eq!(db.row_count("person")?, 4);
    Ok(())
}

#[test]
fn test_keyless_entity_insert_discards_key() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);

    let mut note = Note {
        body: "remember the milk".into(),
    };
    session.insert(&mut note)?;

    let notes: Vec<Note> = session.query("SELECT body FROM note")?.collect();
    assert_eq!(notes, vec![note]);
    Ok(())
}

#[test]
fn test_dropped_session_reverts_transaction() -> anyhow::Result<()> {
    let db = setup();
    {
        let mut session = new_session(&db);
        session.begin_transaction()?;
        session.delete(&Person::with_id(3, "Jeff"))?;
        session.insert(&mut Person::new("Ann"))?;
    }

    assert_eq!(db.row_count("person")?, 3);
    let mut fresh = new_session(&db);
    let jeff: Option<Person> = fresh.get(3)?;
    assert!(jeff.is_some());
    assert_released(&db);
    Ok(())
}

#[test]
fn test_pending_writes_are_isolated() -> anyhow::Result<()> {
    let db = setup();
    let mut writer = new_session(&db);
    let mut reader = new_session(&db);

    writer.begin_transaction()?;
    writer.update(&Person::with_id(1, "Johnny"))?;

    let seen: Option<Person> = reader.get(1)?;
    assert_eq!(seen.map(|p| p.name), Some("John".to_string()));

    writer.commit_transaction()?;
    let seen: Option<Person> = reader.get(1)?;
    assert_eq!(seen.map(|p| p.name), Some("Johnny".to_string()));
    Ok(())
}

#[test]
fn test_transaction_reads_its_own_writes() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);

    session.begin_transaction()?;
    session.delete(&Person::with_id(2, "Mary"))?;
    let mut ann = Person::new("Ann");
    session.insert(&mut ann)?;

    let names: Vec<String> = session
        .query::<Person>("SELECT * FROM person ORDER BY id")?
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["John", "Jeff", "Ann"]);

    session.rollback_transaction()?;
    let names: Vec<String> = session
        .query::<Person>("SELECT * FROM person ORDER BY id")?
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["John", "Mary", "Jeff"]);
    Ok(())
}

#[test]
fn test_query_with_filter_and_projection() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);

    let people: Vec<Person> = session
        .query("SELECT id, name FROM person WHERE name <> 'Mary' ORDER BY name DESC")?
        .collect();
    assert_eq!(
        people,
        vec![Person::with_id(1, "John"), Person::with_id(3, "Jeff")]
    );
    Ok(())
}

#[test]
fn test_get_missing_row_is_none() -> anyhow::Result<()> {
    let db = setup();
    let mut session = new_session(&db);
    let nobody: Option<Person> = session.get(99)?;
    assert!(nobody.is_none());
    Ok(())
}

#[test]
fn test_update_without_id_is_a_mapping_error() {
    let db = setup();
    let mut session = new_session(&db);

    let err = session.update(&Person::new("Nobody")).unwrap_err();
    assert!(matches!(err, dbsession::DbError::MappingError(_)));
    assert_released(&db);
}
