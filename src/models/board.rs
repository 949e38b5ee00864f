use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::models::node::NodeId;
use crate::models::status::{Priority, Status};
use crate::models::wire;

/// A task card as shown on the status board.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BoardTask {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    /// Always canonical once the card has been through a move
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub board_column_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, alias = "wbsCode")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "wire::lenient_date")]
    pub start_date: Option<Date>,
    #[serde(default, deserialize_with = "wire::lenient_date")]
    pub end_date: Option<Date>,
    #[serde(default)]
    pub responsible: Option<String>,
}

/// One column of the board. On a status-partitioned board the column id is
/// the canonical status spelling.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub id: String,
    #[serde(default, alias = "title")]
    pub label: String,
    /// Status the column stands for, when the backend states it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,
    #[serde(default)]
    pub tasks: Vec<BoardTask>,
}

impl BoardColumn {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn is_over_limit(&self) -> bool {
        self.wip_limit
            .is_some_and(|limit| self.tasks.len() > limit as usize)
    }
}

/// Where a card sits: column id plus index within the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPosition {
    pub column_id: String,
    pub index: usize,
}

impl BoardPosition {
    pub fn new(column_id: impl Into<String>, index: usize) -> Self {
        Self {
            column_id: column_id.into(),
            index,
        }
    }
}

/// Locate a card by id.
pub fn find_task<'a>(columns: &'a [BoardColumn], task_id: &str) -> Option<(BoardPosition, &'a BoardTask)> {
    columns.iter().find_map(|column| {
        column
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .map(|index| (BoardPosition::new(column.id.clone(), index), &column.tasks[index]))
    })
}
