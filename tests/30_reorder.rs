mod common;

use anyhow::Result;
use serde_json::json;

use fieldkit::error::{ReorderError, SessionError};
use fieldkit::reorder::ItemGeometry;
use fieldkit::session::FieldSession;

fn tags_session(tags: &[&str]) -> Result<FieldSession> {
    let stored = json!({"title": "t", "tags": tags}).to_string();
    Ok(FieldSession::render(
        "content",
        common::title_and_tags(),
        Some(&stored),
        common::ctx(),
    )?)
}

fn tag_values(session: &FieldSession) -> Result<Vec<String>> {
    let value = session.submission_value()?;
    Ok(value["tags"]
        .as_array()
        .expect("tags array")
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect())
}

/// Uniform 100px rows starting at y=0, matching current item order
fn geometry(session: &FieldSession, list: fieldkit::NodeId) -> Vec<ItemGeometry> {
    session
        .items(list)
        .into_iter()
        .enumerate()
        .map(|(i, item)| ItemGeometry {
            item,
            top: i as f64 * 100.0,
            height: 100.0,
        })
        .collect()
}

#[test]
fn moves_permute_without_losing_values() -> Result<()> {
    let mut session = tags_session(&["a", "b", "c"])?;
    let list = session.list_named("content.tags").expect("tags list");

    let items = session.items(list);
    session.move_item_down(items[0])?;
    let items = session.items(list);
    session.move_item_up(items[2])?;

    // Every element survives; only the order changed.
    let mut sorted = tag_values(&session)?;
    sorted.sort();
    assert_eq!(sorted, vec!["a", "b", "c"]);
    assert_eq!(tag_values(&session)?, vec!["b", "c", "a"]);
    Ok(())
}

#[test]
fn boundary_moves_error_and_change_nothing() -> Result<()> {
    let mut session = tags_session(&["a", "b"])?;
    let list = session.list_named("content.tags").expect("tags list");
    let items = session.items(list);

    let err = session.move_item_up(items[0]).unwrap_err();
    assert!(matches!(err, SessionError::Reorder(ReorderError::AtBoundary)));
    let err = session.move_item_down(items[1]).unwrap_err();
    assert!(matches!(err, SessionError::Reorder(ReorderError::AtBoundary)));
    assert_eq!(tag_values(&session)?, vec!["a", "b"]);
    Ok(())
}

#[test]
fn stale_item_ids_error_instead_of_panicking() -> Result<()> {
    let mut session = tags_session(&["a", "b"])?;
    let list = session.list_named("content.tags").expect("tags list");
    let items = session.items(list);
    session.remove_item(items[0])?;

    // The removed item's id must be rejected by every reorder entry
    // point, as edit and remove_item already do.
    let err = session.move_item_up(items[0]).unwrap_err();
    assert!(matches!(err, SessionError::Reorder(ReorderError::NotAnItem(_))));
    let err = session.move_item_down(items[0]).unwrap_err();
    assert!(matches!(err, SessionError::Reorder(ReorderError::NotAnItem(_))));
    let err = session.drag_item(items[0], 50.0, &[]).unwrap_err();
    assert!(matches!(err, SessionError::Reorder(ReorderError::NotAnItem(_))));

    // The surviving item is untouched.
    assert_eq!(tag_values(&session)?, vec!["b"]);
    Ok(())
}

#[test]
fn drag_repositions_by_midpoint() -> Result<()> {
    let mut session = tags_session(&["a", "b", "c"])?;
    let list = session.list_named("content.tags").expect("tags list");
    let items = session.items(list);
    let geo = geometry(&session, list);

    // Pointer past b's midpoint (150) but short of c's (250).
    let to = session.drag_item(items[0], 180.0, &geo)?;
    assert_eq!(to, 1);
    assert_eq!(tag_values(&session)?, vec!["b", "a", "c"]);
    Ok(())
}

#[test]
fn drag_past_the_last_midpoint_appends() -> Result<()> {
    let mut session = tags_session(&["a", "b", "c"])?;
    let list = session.list_named("content.tags").expect("tags list");
    let items = session.items(list);
    let geo = geometry(&session, list);

    let to = session.drag_item(items[0], 500.0, &geo)?;
    assert_eq!(to, 2);
    assert_eq!(tag_values(&session)?, vec!["b", "c", "a"]);
    Ok(())
}

#[test]
fn order_labels_and_boundary_buttons_track_position() -> Result<()> {
    let mut session = tags_session(&["a", "b"])?;
    let list = session.list_named("content.tags").expect("tags list");
    let items = session.items(list);
    session.move_item_down(items[0])?;

    let f = session.fragment();
    let first = f.items(list)[0];
    let label = f
        .child_with_attr(first, "data-order-label", "true")
        .expect("order label");
    assert_eq!(f.text(label), Some("#1"));
    let up = f
        .child_with_attr(first, "data-action", "move-up")
        .expect("move-up button");
    assert!(f.has_attr(up, "disabled"));
    Ok(())
}
