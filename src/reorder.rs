//! Reorder controller for array/blocks items.
//!
//! Order is defined purely by fragment position: explicit moves swap
//! neighbors, drags reposition by the midpoint rule, and display-only
//! order labels are recomputed after every mutation. The engine never
//! measures layout itself; drag callers supply the item geometry they
//! observed.

use crate::error::ReorderError;
use crate::fragment::{attr, Fragment, NodeId};

/// Observed vertical extent of one item, supplied by the drag caller
#[derive(Debug, Clone, Copy)]
pub struct ItemGeometry {
    pub item: NodeId,
    pub top: f64,
    pub height: f64,
}

impl ItemGeometry {
    fn midpoint(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

fn item_list(f: &Fragment, item: NodeId) -> Result<NodeId, ReorderError> {
    // A caller may hold an id for an item that has since been removed.
    if !f.contains(item) || !f.has_attr(item, attr::ITEM) {
        return Err(ReorderError::NotAnItem(item));
    }
    f.parent(item)
        .filter(|&p| f.has_attr(p, attr::LIST))
        .ok_or(ReorderError::NotAnItem(item))
}

/// Swap an item with its previous sibling
pub fn move_up(f: &mut Fragment, item: NodeId) -> Result<(), ReorderError> {
    let list = item_list(f, item)?;
    let index = f.child_index(item).ok_or(ReorderError::NotAnItem(item))?;
    if index == 0 {
        return Err(ReorderError::AtBoundary);
    }
    f.swap_children(list, index - 1, index);
    refresh_list_chrome(f, list);
    Ok(())
}

/// Swap an item with its next sibling
pub fn move_down(f: &mut Fragment, item: NodeId) -> Result<(), ReorderError> {
    let list = item_list(f, item)?;
    let index = f.child_index(item).ok_or(ReorderError::NotAnItem(item))?;
    if index + 1 >= f.children(list).len() {
        return Err(ReorderError::AtBoundary);
    }
    f.swap_children(list, index, index + 1);
    refresh_list_chrome(f, list);
    Ok(())
}

/// Drop an item at the position implied by the pointer. The moving
/// item is excluded from target calculation; the drop target is the
/// first remaining sibling whose vertical midpoint the pointer has not
/// yet passed. Returns the item's new index.
pub fn drag_to(
    f: &mut Fragment,
    item: NodeId,
    pointer_y: f64,
    geometry: &[ItemGeometry],
) -> Result<usize, ReorderError> {
    let list = item_list(f, item)?;
    let from = f.child_index(item).ok_or(ReorderError::NotAnItem(item))?;

    let remaining: Vec<NodeId> = f
        .items(list)
        .into_iter()
        .filter(|&i| i != item)
        .collect();
    let to = remaining
        .iter()
        .position(|sibling| {
            geometry
                .iter()
                .find(|g| g.item == *sibling)
                .map(|g| pointer_y < g.midpoint())
                .unwrap_or(false)
        })
        .unwrap_or(remaining.len());

    f.move_child(list, from, to);
    refresh_list_chrome(f, list);
    Ok(to)
}

/// Recompute display order labels and boundary button state for every
/// item in a list
pub fn refresh_list_chrome(f: &mut Fragment, list: NodeId) {
    let items = f.items(list);
    let last = items.len().saturating_sub(1);
    for (index, item) in items.into_iter().enumerate() {
        if let Some(label) = f.child_with_attr(item, attr::ORDER_LABEL, "true") {
            f.set_text(label, format!("#{}", index + 1));
        }
        set_disabled(f, item, "move-up", index == 0);
        set_disabled(f, item, "move-down", index == last);
    }
}

fn set_disabled(f: &mut Fragment, item: NodeId, action: &str, disabled: bool) {
    if let Some(button) = f.child_with_attr(item, attr::ACTION, action) {
        if disabled {
            f.set_attr(button, "disabled", "disabled");
        } else {
            f.remove_attr(button, "disabled");
        }
    }
}
