//! Queue ordering policy: children before parents, cheap before expensive.

use crate::core::item::WorkItem;
use crate::document::Document;

/// Build the ordered work queue from the document.
///
/// Items with a parent come first so children complete before their parents
/// are considered, independent of complexity. Within each group items are
/// bucketed by complexity (`low < medium < high`) and sorted by id ascending.
/// Pure function of the document: rebuilding any number of times yields the
/// same queue and never touches `analyzed` flags.
pub fn build_queue(doc: &Document) -> Vec<WorkItem> {
    order_items(doc.work_items())
}

/// Apply the queue ordering policy to an arbitrary item set (used for retry
/// runs, where the source is the outstanding failure set).
pub fn order_items(items: Vec<WorkItem>) -> Vec<WorkItem> {
    let (mut children, mut top_level): (Vec<_>, Vec<_>) =
        items.into_iter().partition(|item| item.key.is_child());
    sort_group(&mut children);
    sort_group(&mut top_level);
    children.extend(top_level);
    children
}

fn sort_group(group: &mut [WorkItem]) {
    group.sort_by(|a, b| {
        a.complexity
            .cmp(&b.complexity)
            .then_with(|| a.key.id.cmp(&b.key.id))
            .then_with(|| a.key.parent_id.cmp(&b.key.parent_id))
    });
}
