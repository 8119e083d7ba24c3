mod common;

use anyhow::Result;
use serde_json::json;

use fieldkit::session::FieldSession;

// Render-then-read round trips through the hidden carrier: the
// serialized canonical value must reflect the visible controls after
// every mutation, and honor declared property order.

#[test]
fn stored_value_round_trips_through_carrier() -> Result<()> {
    let stored = r#"{"title":"Hello","tags":["a","b"]}"#;
    let session = FieldSession::render("content", common::title_and_tags(), Some(stored), common::ctx())?;

    assert_eq!(
        session.submission_value()?,
        json!({"title": "Hello", "tags": ["a", "b"]})
    );
    Ok(())
}

#[test]
fn recompute_twice_is_byte_identical() -> Result<()> {
    let stored = r#"{"title":"Hello","tags":["a","b"]}"#;
    let schema = common::title_and_tags();
    let value = fieldkit::value::parse_stored(Some(stored), &schema);
    let mut f = fieldkit::Fragment::new("div");
    let parent = f.root();
    let mut templates = fieldkit::template::TemplateRegistry::new();
    let root = fieldkit::render::composite::render_field(
        &mut f,
        parent,
        &schema,
        "content",
        "content",
        &value,
        &common::ctx(),
        &mut templates,
    );

    // Two recomputes with no intervening edit serialize identically.
    let first = fieldkit::sync::recompute(&mut f, root, &schema)?;
    let second = fieldkit::sync::recompute(&mut f, root, &schema)?;
    assert_eq!(first, second);
    let carrier = f.carrier(root).expect("root carrier");
    assert_eq!(f.value(carrier), Some(&serde_json::Value::String(second)));
    Ok(())
}

#[test]
fn identical_edit_keeps_serialization() -> Result<()> {
    let stored = r#"{"title":"Hello","tags":["a","b"]}"#;
    let mut session =
        FieldSession::render("content", common::title_and_tags(), Some(stored), common::ctx())?;

    let first = session.submission_text()?;
    // Re-applying the identical value must not perturb the serialization.
    let control = session.control_named("content.title").expect("title control");
    session.edit(control, json!("Hello"))?;
    assert_eq!(session.submission_text()?, first);
    Ok(())
}

#[test]
fn malformed_stored_json_renders_empty() -> Result<()> {
    common::init_logging();
    let session = FieldSession::render(
        "content",
        common::title_and_tags(),
        Some("{not json"),
        common::ctx(),
    )?;

    assert_eq!(session.submission_value()?, json!({"title": "", "tags": []}));
    Ok(())
}

#[test]
fn editing_a_leaf_updates_the_carrier() -> Result<()> {
    let stored = r#"{"title":"Hello","tags":[]}"#;
    let mut session =
        FieldSession::render("content", common::title_and_tags(), Some(stored), common::ctx())?;

    let control = session.control_named("content.title").expect("title control");
    session.edit(control, json!("Goodbye"))?;
    assert_eq!(
        session.submission_value()?,
        json!({"title": "Goodbye", "tags": []})
    );
    Ok(())
}

#[test]
fn moving_a_nested_item_reorders_the_parent_value() -> Result<()> {
    let stored = r#"{"title":"Hello","tags":["a","b"]}"#;
    let mut session =
        FieldSession::render("content", common::title_and_tags(), Some(stored), common::ctx())?;

    let list = session.list_named("content.tags").expect("tags list");
    let items = session.items(list);
    session.move_item_up(items[1])?;

    assert_eq!(
        session.submission_value()?,
        json!({"title": "Hello", "tags": ["b", "a"]})
    );
    Ok(())
}

#[test]
fn added_item_is_editable_and_serialized() -> Result<()> {
    let stored = r#"{"title":"Hello","tags":["a"]}"#;
    let mut session =
        FieldSession::render("content", common::title_and_tags(), Some(stored), common::ctx())?;

    let list = session.list_named("content.tags").expect("tags list");
    let item = session.add_array_item(list)?;
    assert_eq!(session.items(list).last().copied(), Some(item));

    let control = session
        .control_named("content.tags.1.value")
        .expect("new item control");
    session.edit(control, json!("fresh"))?;
    assert_eq!(
        session.submission_value()?,
        json!({"title": "Hello", "tags": ["a", "fresh"]})
    );
    Ok(())
}

#[test]
fn removing_an_item_drops_it_from_the_value() -> Result<()> {
    let stored = r#"{"title":"Hello","tags":["a","b","c"]}"#;
    let mut session =
        FieldSession::render("content", common::title_and_tags(), Some(stored), common::ctx())?;

    let list = session.list_named("content.tags").expect("tags list");
    let items = session.items(list);
    session.remove_item(items[1])?;

    assert_eq!(
        session.submission_value()?,
        json!({"title": "Hello", "tags": ["a", "c"]})
    );
    Ok(())
}

#[test]
fn wrong_shaped_stored_composite_renders_empty() -> Result<()> {
    // Stored value is an array where the schema expects an object.
    let session = FieldSession::render(
        "content",
        common::title_and_tags(),
        Some(r#"["not","an","object"]"#),
        common::ctx(),
    )?;
    assert_eq!(session.submission_value()?, json!({"title": "", "tags": []}));
    Ok(())
}

#[test]
fn html_serialization_is_deterministic() -> Result<()> {
    let stored = r#"{"title":"Hello","tags":["a"]}"#;
    let session =
        FieldSession::render("content", common::title_and_tags(), Some(stored), common::ctx())?;
    assert_eq!(session.to_html(), session.to_html());
    assert!(session.to_html().contains("data-carrier"));
    Ok(())
}
