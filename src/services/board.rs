//! The status board: a flat column/task projection of the forest.

use tracing::debug;

use crate::models::board::{BoardColumn, BoardPosition, BoardTask, find_task};
use crate::models::node::WbsNode;
use crate::models::status::{Canonical, Status};
use crate::services::normalizer::StatusNormalizer;
use crate::services::tree;

/// Status a card takes when dropped in `column`: an explicit status when
/// given, otherwise whatever the column stands for, otherwise the first
/// status of the vocabulary.
pub fn column_status(column: &BoardColumn, requested: Option<&str>, statuses: &StatusNormalizer) -> Status {
    if let Some(status) = statuses.normalize(requested) {
        return status;
    }
    stands_for(column, statuses).unwrap_or_else(|| statuses.first())
}

/// The status a column represents, when its status, id or label names one.
fn stands_for(column: &BoardColumn, statuses: &StatusNormalizer) -> Option<Status> {
    column
        .status
        .filter(|status| statuses.position(*status).is_some())
        .or_else(|| statuses.resolve(&column.id))
        .or_else(|| statuses.resolve(&column.label))
}

/// Move the card `task_id` from `from` to `to`.
///
/// The card at `from` must be `task_id`; otherwise, or when either column
/// is unknown, the columns come back unchanged. Dropping a card where it
/// already is changes nothing.
pub fn reorder(
    columns: &[BoardColumn],
    from: &BoardPosition,
    to: &BoardPosition,
    task_id: &str,
    new_status: Option<&str>,
    statuses: &StatusNormalizer,
) -> Vec<BoardColumn> {
    if from == to {
        return columns.to_vec();
    }

    let Some(source) = columns.iter().position(|c| c.id == from.column_id) else {
        debug!(column = %from.column_id, "source column not found");
        return columns.to_vec();
    };
    let Some(destination) = columns.iter().position(|c| c.id == to.column_id) else {
        debug!(column = %to.column_id, "destination column not found");
        return columns.to_vec();
    };
    if columns[source].tasks.get(from.index).is_none_or(|task| task.id != task_id) {
        debug!(task = task_id, index = from.index, "card not at source index");
        return columns.to_vec();
    }

    let mut next = columns.to_vec();
    let mut task = next[source].tasks.remove(from.index);
    task.status = column_status(&next[destination], new_status, statuses);
    task.board_column_id = Some(next[destination].id.clone());

    let cards = &mut next[destination].tasks;
    let at = to.index.min(cards.len());
    debug!(task = task_id, column = %to.column_id, index = at, status = %task.status, "card moved");
    cards.insert(at, task);
    next
}

fn card_for(node: &WbsNode, status: Status, column_id: &str) -> BoardTask {
    BoardTask {
        id: node.id.clone(),
        title: node.title.clone(),
        status,
        board_column_id: Some(column_id.to_string()),
        priority: node.priority,
        code: node.wbs_code.clone(),
        start_date: node.start_date,
        end_date: node.end_date,
        responsible: node.responsible.as_ref().map(|r| r.name.clone()),
    }
}

/// Bring the card of `node` back in line with the node after an edit.
///
/// The card is rebuilt from the node and sits in the column standing for
/// the node's status. It keeps its index when that column does not change
/// and goes to the end of the column otherwise. A deleted node leaves the
/// board. A node without a card gets one. When no column stands for the
/// status, the card stays where it was, or goes to the first column.
pub fn refresh_card(columns: &[BoardColumn], node: &WbsNode, statuses: &StatusNormalizer) -> Vec<BoardColumn> {
    let mut next = columns.to_vec();
    let current = find_task(&next, &node.id).map(|(position, _)| position);
    if let Some(position) = &current
        && let Some(column) = next.iter_mut().find(|c| c.id == position.column_id)
    {
        column.tasks.remove(position.index);
    }
    if node.is_deleted() {
        return next;
    }

    let status = match statuses.position(node.status) {
        Some(_) => node.status,
        None => statuses.first(),
    };
    let target = next
        .iter()
        .position(|column| stands_for(column, statuses) == Some(status))
        .or_else(|| {
            current
                .as_ref()
                .and_then(|position| next.iter().position(|c| c.id == position.column_id))
        })
        .or_else(|| (!next.is_empty()).then_some(0));
    let Some(target) = target else {
        return next;
    };

    let column = &mut next[target];
    let at = match &current {
        Some(position) if position.column_id == column.id => position.index.min(column.tasks.len()),
        _ => column.tasks.len(),
    };
    let card = card_for(node, status, &column.id);
    debug!(task = %node.id, column = %column.id, index = at, %status, "card refreshed");
    column.tasks.insert(at, card);
    next
}

/// One column per status of the vocabulary, labelled for display, holding
/// the active nodes in tree order. Nodes whose status is not on this board
/// land in the first column.
pub fn project_board(forest: &[WbsNode], statuses: &StatusNormalizer) -> Vec<BoardColumn> {
    let mut columns: Vec<BoardColumn> = statuses
        .order()
        .iter()
        .map(|status| BoardColumn {
            status: Some(*status),
            ..BoardColumn::new(status.as_str(), statuses.label_for(*status))
        })
        .collect();

    let active = tree::active(forest);
    for (node, _) in tree::walk(&active) {
        let (index, status) = match statuses.position(node.status) {
            Some(index) => (index, node.status),
            None => (0, statuses.first()),
        };
        let column = &mut columns[index];
        let card = card_for(node, status, &column.id);
        column.tasks.push(card);
    }
    columns
}
