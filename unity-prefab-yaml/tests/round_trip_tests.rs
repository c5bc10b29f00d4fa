//! Round-trip and parsing tests against realistic Unity files

use anyhow::Result;
use pretty_assertions::assert_eq;
use unity_prefab_core::{ObjectData, PrefabInstance, Reference, Value};
use unity_prefab_yaml::{
    LineEnding, ParseMode, load_document, load_from_reader, parse_document, parse_document_with,
    save_document, serialize_document,
};

const DOOR: &str = include_str!("fixtures/Door.prefab");
const WINDOWS: &str = include_str!("fixtures/Windows.prefab");

#[test]
fn test_unedited_document_round_trips_byte_identical() -> Result<()> {
    for text in [DOOR, WINDOWS] {
        let doc = parse_document(text)?;
        assert_eq!(serialize_document(&doc), text);
    }
    Ok(())
}

#[test]
fn test_round_trip_without_trailing_newline() -> Result<()> {
    let text = "--- !u!1 &1\nGameObject:\n  m_Name: Last";
    let doc = parse_document(text)?;
    assert_eq!(serialize_document(&doc), text);
    Ok(())
}

#[test]
fn test_negative_identifiers_are_kept() -> Result<()> {
    let doc = parse_document(DOOR)?;
    let transform = doc.require(-3742660215815977075)?;
    assert_eq!(transform.class_name, "Transform");

    let game_object = doc.require(1523907788412716570)?;
    let components = game_object
        .get("m_Component")
        .and_then(Value::as_sequence)
        .map(|items| items.len());
    assert_eq!(components, Some(2));
    assert_eq!(doc.len(), 5);
    Ok(())
}

#[test]
fn test_scalar_forms() -> Result<()> {
    let doc = parse_document(DOOR)?;
    let behaviour = doc.require(6127813912384416001)?;

    assert_eq!(behaviour.get("openAngle"), Some(&Value::from(95.5)));
    assert_eq!(
        behaviour.get("lockedMessage"),
        Some(&Value::from("The door is locked.\n  Find the key first."))
    );
    assert_eq!(behaviour.get("tooltip"), Some(&Value::from("Press 'E' to open")));
    assert_eq!(
        behaviour.get("description"),
        Some(&Value::from("This door leads to the courtyard and the old well."))
    );
    assert_eq!(behaviour.get("m_Name"), Some(&Value::null()));
    assert_eq!(behaviour.get("hinges"), Some(&Value::Sequence(vec![])));

    let sounds = behaviour.get("sounds").and_then(Value::as_sequence).unwrap();
    assert_eq!(
        sounds[0].as_reference(),
        Some(&Reference::external(8300000, "0000000000000000e000000000000000", 0))
    );
    Ok(())
}

#[test]
fn test_stripped_and_prefab_instance() -> Result<()> {
    let doc = parse_document(DOOR)?;

    let stripped = doc.require(8800912370013517208)?;
    assert!(matches!(
        stripped.data(),
        ObjectData::Stripped {
            owner: 8800912370013517207,
            ..
        }
    ));

    let instance = PrefabInstance::from_object(doc.require(8800912370013517207)?).unwrap();
    assert_eq!(
        instance.source_guid.as_deref(),
        Some("1d2c3b4a596877665544332211009988")
    );
    assert_eq!(
        instance.transform_parent,
        Some(Reference::local(-3742660215815977075))
    );
    assert_eq!(instance.modifications.len(), 2);
    assert_eq!(instance.modifications[0].value, Some(Value::from(0.25)));
    assert_eq!(instance.name_override().as_deref(), Some("Handle"));
    Ok(())
}

#[test]
fn test_windows_line_endings() -> Result<()> {
    let doc = parse_document(WINDOWS)?;
    assert_eq!(doc.line_ending, LineEnding::Windows);
    assert_eq!(doc.require(-1)?.name(), Some("Windows"));
    Ok(())
}

#[test]
fn test_edit_rerenders_only_the_edited_object() -> Result<()> {
    let mut doc = parse_document(DOOR)?;
    let game_object = doc.get_mut(1523907788412716570).unwrap();
    let content = game_object.content_mut().unwrap();
    content.as_mapping_mut().unwrap()["m_Name"] = Value::from("Gate");

    let text = serialize_document(&doc);
    assert!(text.contains("  m_Name: Gate\n"));
    assert!(text.contains("  lockedMessage: \"The door is locked.\\n  Find the key first.\"\n"));

    let reparsed = parse_document(&text)?;
    assert_eq!(reparsed.require(1523907788412716570)?.name(), Some("Gate"));
    assert_eq!(
        reparsed.require(1523907788412716570)?.content(),
        doc.require(1523907788412716570)?.content()
    );
    assert_eq!(reparsed.len(), doc.len());
    Ok(())
}

#[test]
fn test_best_effort_keeps_skipped_text() -> Result<()> {
    let text = "%YAML 1.1\n--- !u!1 &1\nGameObject:\n  m_Name: A\n--- !u!1 &2\nGameObject:\n  m_Name: B\n   broken: 1\n--- !u!1 &3\nGameObject:\n  m_Name: C\n";

    let err = parse_document(text).unwrap_err();
    assert_eq!(err.line(), Some(8));

    let doc = parse_document_with(text, ParseMode::BestEffort)?;
    assert_eq!(doc.file_ids().collect::<Vec<_>>(), vec![1, 3]);
    assert!(doc.ensure_complete().is_err());
    assert_eq!(serialize_document(&doc), text);
    Ok(())
}

#[test]
fn test_file_io() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Door.prefab");
    std::fs::write(&path, DOOR)?;

    let doc = load_document(&path)?;
    assert_eq!(doc.path(), Some(path.as_path()));

    let copy = dir.path().join("Copy.prefab");
    save_document(&doc, &copy)?;
    assert_eq!(std::fs::read_to_string(&copy)?, DOOR);

    let from_reader = load_from_reader(std::io::Cursor::new(DOOR.as_bytes()))?;
    assert_eq!(from_reader.len(), doc.len());
    Ok(())
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_async_loading() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Door.prefab");
    tokio::fs::write(&path, DOOR).await?;

    let doc = unity_prefab_yaml::load_document_async(&path).await?;
    assert_eq!(doc.len(), 5);
    Ok(())
}
