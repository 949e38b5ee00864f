use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::services::normalizer::{DEFAULT_PRIORITIES, DEFAULT_STATUSES};

/// A closed vocabulary with a fixed canonical spelling per value.
///
/// `ALL` lists every value in its default total order. Deployments may narrow
/// or reorder it through configuration, but never extend it.
pub trait Canonical: Copy + Eq + fmt::Debug + 'static {
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// Exact, case-insensitive match against the canonical spelling.
    fn from_canonical(raw: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|value| value.as_str().eq_ignore_ascii_case(raw))
    }
}

/// Workflow status of a node or board task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Status {
    #[default]
    Backlog,
    Todo,
    InProgress,
    Review,
    Delayed,
    Risk,
    Blocked,
    Done,
}

impl Canonical for Status {
    const ALL: &'static [Self] = &[
        Status::Backlog,
        Status::Todo,
        Status::InProgress,
        Status::Review,
        Status::Delayed,
        Status::Risk,
        Status::Blocked,
        Status::Done,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Status::Backlog => "BACKLOG",
            Status::Todo => "TODO",
            Status::InProgress => "IN_PROGRESS",
            Status::Review => "REVIEW",
            Status::Delayed => "DELAYED",
            Status::Risk => "RISK",
            Status::Blocked => "BLOCKED",
            Status::Done => "DONE",
        }
    }
}

/// Importance of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Canonical for Priority {
    const ALL: &'static [Self] = &[
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Always written in canonical form. Reading is lenient: whatever the backend
// or an old snapshot carries goes through the built-in vocabulary.

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(DEFAULT_STATUSES
            .normalize(raw.as_deref())
            .unwrap_or_else(|| DEFAULT_STATUSES.first()))
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(DEFAULT_PRIORITIES
            .normalize(raw.as_deref())
            .unwrap_or_default())
    }
}
