use kasten_core::persist::schema::SCHEMA_VERSION;
use kasten_core::{
    load, save, CardSide, ErrorKind, Kasten, NoteId, PersistError, RowCounts, TemplateId,
};
use rusqlite::Connection;
use std::path::Path;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn sample_kasten() -> (Kasten, TemplateId, NoteId) {
    let mut kasten = Kasten::new();
    let template_id = kasten
        .register_template(
            "Basic",
            strings(&["{{Front}}"]),
            strings(&["{{Back}}"]),
            strings(&["Front", "Back"]),
        )
        .unwrap();
    let deck_id = kasten.resolve_deck("Lang::Spanish").unwrap();
    let note_id = kasten
        .create_note(template_id, strings(&["Hola", "Hello"]), deck_id)
        .unwrap();
    (kasten, template_id, note_id)
}

fn assert_same_collection(original: &Kasten, reloaded: &Kasten) {
    assert_eq!(reloaded.templates().len(), original.templates().len());
    for template in original.templates().iter() {
        assert_eq!(reloaded.template(template.id).unwrap(), template);
    }

    assert_eq!(reloaded.notes().note_count(), original.notes().note_count());
    assert_eq!(reloaded.notes().card_count(), original.notes().card_count());
    for note in original.notes().notes() {
        assert_eq!(reloaded.note(note.id).unwrap(), note);
        for card in &note.cards {
            assert_eq!(reloaded.card(card.id).unwrap(), card);
        }
    }

    assert_eq!(reloaded.decks().len(), original.decks().len());
    for deck in original.decks().iter() {
        let restored = reloaded.deck(deck.id).unwrap();
        assert_eq!(restored.name, deck.name);
        assert_eq!(restored.parents, deck.parents);
        assert_eq!(restored.card_ids, deck.card_ids);
    }
}

fn table_count(path: &Path, table: &str) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn save_then_load_restores_structurally_equal_collection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kasten.sqlite3");
    let (kasten, template_id, note_id) = sample_kasten();

    let counts = save(&kasten, &path).unwrap();
    assert_eq!(
        counts,
        RowCounts {
            cards: 1,
            notes: 1,
            decks: 2,
            templates: 1,
        }
    );

    let reloaded = load(&path).unwrap();
    assert_same_collection(&kasten, &reloaded);

    let lang = reloaded.deck_by_name("Lang").unwrap();
    let spanish = reloaded.deck_by_name("Lang::Spanish").unwrap();
    assert_eq!(Some(lang), kasten.deck_by_name("Lang"));
    assert_eq!(reloaded.deck_ancestors(spanish).unwrap(), vec![lang]);

    let card = &reloaded.note(note_id).unwrap().cards[0];
    assert_eq!(card.variant.template_id, template_id);
    assert_eq!(card.deck_id, spanish);
    assert_eq!(reloaded.render(card.id, CardSide::Front).unwrap(), "Hola");
    assert_eq!(reloaded.render(card.id, CardSide::Back).unwrap(), "Hello");
}

#[test]
fn review_history_and_multi_slot_order_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kasten.sqlite3");
    let mut kasten = Kasten::new();
    let template_id = kasten
        .register_template(
            "Reversible",
            strings(&["{{Front}}", "{{Back}}", "{{Front}}?"]),
            strings(&["{{Back}}", "{{Front}}", "{{Back}}!"]),
            strings(&["Front", "Back"]),
        )
        .unwrap();
    let deck_id = kasten.resolve_deck("A::B::C").unwrap();
    let note_id = kasten
        .create_note(template_id, strings(&["perro", "dog"]), deck_id)
        .unwrap();
    let second_note = kasten
        .create_note(template_id, strings(&["", "empty front"]), deck_id)
        .unwrap();
    let card_id = kasten.note(note_id).unwrap().cards[1].id;
    kasten.record_review_at(card_id, 2, 1_000).unwrap();
    kasten.record_review_at(card_id, 4, 90_000).unwrap();

    save(&kasten, &path).unwrap();
    let reloaded = load(&path).unwrap();

    assert_same_collection(&kasten, &reloaded);
    assert_eq!(
        reloaded.card(card_id).unwrap().history,
        kasten.card(card_id).unwrap().history
    );
    assert_eq!(reloaded.note(second_note).unwrap().fields[0], "");
    assert_eq!(reloaded.deck_by_name("A::B::C"), Some(deck_id));
}

#[test]
fn single_empty_field_and_empty_back_layout_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kasten.sqlite3");
    let mut kasten = Kasten::new();
    let template_id = kasten
        .register_template(
            "Echo",
            strings(&["{{Word}}"]),
            strings(&[""]),
            strings(&["Word"]),
        )
        .unwrap();
    let deck_id = kasten.resolve_deck("Blank").unwrap();
    let note_id = kasten
        .create_note(template_id, strings(&[""]), deck_id)
        .unwrap();

    save(&kasten, &path).unwrap();
    let reloaded = load(&path).unwrap();
    assert_same_collection(&kasten, &reloaded);

    let template = reloaded.template(template_id).unwrap();
    assert_eq!(template.back_layouts, strings(&[""]));
    let note = reloaded.note(note_id).unwrap();
    assert_eq!(note.fields, strings(&[""]));
    let card_id = note.cards[0].id;
    assert_eq!(reloaded.render(card_id, CardSide::Front).unwrap(), "");
    assert_eq!(reloaded.render(card_id, CardSide::Back).unwrap(), "");
}

#[test]
fn deck_membership_order_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kasten.sqlite3");
    let mut kasten = Kasten::new();
    let template_id = kasten
        .register_template(
            "Basic",
            strings(&["{{Front}}"]),
            strings(&["{{Back}}"]),
            strings(&["Front", "Back"]),
        )
        .unwrap();
    let verbs = kasten.resolve_deck("Lang::Verbs").unwrap();
    let nouns = kasten.resolve_deck("Lang::Nouns").unwrap();
    for (index, word) in ["ser", "estar", "ir", "tener", "hacer", "poder", "decir"]
        .iter()
        .enumerate()
    {
        let deck_id = if index % 3 == 2 { nouns } else { verbs };
        kasten
            .create_note(template_id, strings(&[*word, "meaning"]), deck_id)
            .unwrap();
    }

    save(&kasten, &path).unwrap();
    let reloaded = load(&path).unwrap();

    assert_eq!(
        reloaded.deck(verbs).unwrap().card_ids,
        kasten.deck(verbs).unwrap().card_ids
    );
    assert_eq!(
        reloaded.deck(nouns).unwrap().card_ids,
        kasten.deck(nouns).unwrap().card_ids
    );
    assert_eq!(reloaded.deck(verbs).unwrap().card_ids.len(), 5);
    assert_same_collection(&kasten, &reloaded);
}

#[test]
fn saving_over_existing_file_replaces_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kasten.sqlite3");
    let (mut kasten, template_id, _) = sample_kasten();
    save(&kasten, &path).unwrap();

    let deck_id = kasten.resolve_deck("Lang::French").unwrap();
    kasten
        .create_note(template_id, strings(&["Bonjour", "Hello"]), deck_id)
        .unwrap();
    save(&kasten, &path).unwrap();

    assert_eq!(table_count(&path, "notes"), 2);
    assert_eq!(table_count(&path, "boxes"), 3);
    assert!(!dir.path().join("kasten.sqlite3.tmp").exists());

    let conn = Connection::open(&path).unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[test]
fn failed_rename_leaves_target_untouched_and_removes_temp() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("occupied");
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join("keep.txt"), "keep").unwrap();
    let (kasten, _, _) = sample_kasten();

    let err = save(&kasten, &target).unwrap_err();
    assert!(matches!(err, PersistError::Io { .. }));
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(target.join("keep.txt").exists());
    assert!(!dir.path().join("occupied.tmp").exists());
}

#[test]
fn save_into_missing_directory_is_open_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("kasten.sqlite3");
    let (kasten, _, _) = sample_kasten();

    let err = save(&kasten, &path).unwrap_err();
    assert!(matches!(err, PersistError::Open(_)));
    assert_eq!(err.code(), "storage_open_failed");
    assert!(!path.exists());
}

#[test]
fn load_missing_file_is_open_failure() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(dir.path().join("absent.sqlite3")).unwrap_err();
    assert!(matches!(err, PersistError::Open(_)));
}

#[test]
fn malformed_history_token_is_a_decode_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kasten.sqlite3");
    let (kasten, _, _) = sample_kasten();
    save(&kasten, &path).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE cardPile SET elapsedTimeHistory = 'soon', timestampHistory = '1', ratingHistory = '3';",
        [],
    )
    .unwrap();
    drop(conn);

    let err = load(&path).unwrap_err();
    match err {
        PersistError::Decode {
            table,
            column,
            source,
        } => {
            assert_eq!(table, "cardPile");
            assert_eq!(column, "elapsedTimeHistory");
            assert_eq!(source.token, "soon");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn misaligned_history_lists_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kasten.sqlite3");
    let (kasten, _, _) = sample_kasten();
    save(&kasten, &path).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute("UPDATE cardPile SET elapsedTimeHistory = '0';", [])
        .unwrap();
    drop(conn);

    let err = load(&path).unwrap_err();
    assert!(matches!(
        err,
        PersistError::InvalidRow {
            table: "cardPile",
            ..
        }
    ));
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kasten.sqlite3");
    let (kasten, _, _) = sample_kasten();
    save(&kasten, &path).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 99;").unwrap();
    drop(conn);

    let err = load(&path).unwrap_err();
    assert!(matches!(
        err,
        PersistError::UnsupportedSchemaVersion {
            file_version: 99,
            ..
        }
    ));
}

#[test]
fn file_without_required_collections_is_schema_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE notes (noteId INTEGER, fields TEXT);")
        .unwrap();
    drop(conn);

    let err = load(&path).unwrap_err();
    assert!(matches!(err, PersistError::MissingTable("cardPile")));
    assert_eq!(err.code(), "storage_schema_failed");
}

#[test]
fn unversioned_file_with_expected_layout_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE cardPile (cardId INTEGER, templateId INTEGER, noteId INTEGER,
            layoutSlotIndex INTEGER, deckId INTEGER, elapsedTimeHistory TEXT,
            timestampHistory TEXT, ratingHistory TEXT);
         CREATE TABLE notes (noteId INTEGER, fields TEXT);
         CREATE TABLE boxes (deckId INTEGER, deckName TEXT);
         CREATE TABLE templateCollection (templateId INTEGER, templateName TEXT,
            frontLayouts TEXT, backLayouts TEXT, fieldNames TEXT);
         INSERT INTO cardPile VALUES (10, 30, 20, 0, 41, '', '', '');
         INSERT INTO notes VALUES (20, 'uno' || char(31) || 'one');
         INSERT INTO boxes VALUES (41, 'Lang::Spanish');
         INSERT INTO boxes VALUES (40, 'Lang');
         INSERT INTO templateCollection VALUES (30, 'Basic', '{{Front}}', '{{Back}}',
            'Front' || char(31) || 'Back');",
    )
    .unwrap();
    drop(conn);

    let kasten = load(&path).unwrap();
    assert_eq!(kasten.deck_by_name("Lang"), Some(40));
    assert_eq!(kasten.deck_by_name("Lang::Spanish"), Some(41));
    assert_eq!(kasten.deck_ancestors(41).unwrap(), vec![40]);
    assert_eq!(kasten.deck(41).unwrap().card_ids, vec![10]);
    assert_eq!(kasten.render(10, CardSide::Front).unwrap(), "uno");
    assert_eq!(kasten.render(10, CardSide::Back).unwrap(), "one");
}

#[test]
fn duplicate_deck_ids_in_file_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kasten.sqlite3");
    let (kasten, _, _) = sample_kasten();
    save(&kasten, &path).unwrap();

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO boxes (deckId, deckName) SELECT deckId, 'Other' FROM boxes LIMIT 1;",
        [],
    )
    .unwrap();
    drop(conn);

    let err = load(&path).unwrap_err();
    assert!(matches!(err, PersistError::Store(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
}
