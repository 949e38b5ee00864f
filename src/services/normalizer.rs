//! Status and priority normalization.
//!
//! Values arrive from many places: the backend's enum spelling, display labels
//! shown in older screens, imported spreadsheets in Portuguese, free text typed
//! by users. A [`Vocabulary`] folds all of them onto one canonical value from a
//! fixed, totally ordered enumeration.
//!
//! Lookup order for a non-empty input:
//!
//! 1. canonical spelling (`IN_PROGRESS`, case-insensitive);
//! 2. exact label (`Em andamento`, case-insensitive);
//! 3. keyword fragment contained in the input (`andam`), in table order;
//! 4. the first value of the enumeration.
//!
//! Empty or absent input yields `None` so the caller can pick a fallback that
//! fits its context (a column's own status, for example).

use std::sync::LazyLock;

use crate::models::status::{Canonical, Priority, Status};

pub type StatusNormalizer = Vocabulary<Status>;
pub type PriorityNormalizer = Vocabulary<Priority>;

/// Built-in tables, used when deserializing snapshots.
pub static DEFAULT_STATUSES: LazyLock<StatusNormalizer> = LazyLock::new(StatusNormalizer::default);
pub static DEFAULT_PRIORITIES: LazyLock<PriorityNormalizer> =
    LazyLock::new(PriorityNormalizer::default);

#[derive(Debug, Clone)]
struct Label<T> {
    folded: String,
    display: String,
    value: T,
}

#[derive(Debug, Clone)]
pub struct Vocabulary<T: Canonical> {
    order: Vec<T>,
    labels: Vec<Label<T>>,
    keywords: Vec<(String, T)>,
}

fn fold(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl<T: Canonical> Vocabulary<T> {
    /// An empty vocabulary over `order`. An empty `order` means every value
    /// of `T` in its default order.
    pub fn new(order: Vec<T>) -> Self {
        let mut deduped: Vec<T> = Vec::with_capacity(order.len());
        for value in order {
            if !deduped.contains(&value) {
                deduped.push(value);
            }
        }
        if deduped.is_empty() {
            deduped = T::ALL.to_vec();
        }
        Self {
            order: deduped,
            labels: Vec::new(),
            keywords: Vec::new(),
        }
    }

    /// Add a display label. A label that is already known is remapped.
    pub fn with_label(mut self, label: &str, value: T) -> Self {
        self.insert_label(label, value);
        self
    }

    pub fn with_keyword(mut self, fragment: &str, value: T) -> Self {
        self.insert_keyword(fragment, value);
        self
    }

    pub fn insert_label(&mut self, label: &str, value: T) {
        let folded = fold(label);
        if folded.is_empty() {
            return;
        }
        match self.labels.iter_mut().find(|l| l.folded == folded) {
            Some(existing) => {
                existing.value = value;
                existing.display = label.trim().to_string();
            }
            None => self.labels.push(Label {
                folded,
                display: label.trim().to_string(),
                value,
            }),
        }
    }

    pub fn insert_keyword(&mut self, fragment: &str, value: T) {
        let folded = fold(fragment);
        if folded.is_empty() {
            return;
        }
        match self.keywords.iter_mut().find(|(f, _)| *f == folded) {
            Some(existing) => existing.1 = value,
            None => self.keywords.push((folded, value)),
        }
    }

    pub fn set_order(&mut self, order: Vec<T>) {
        let labels = std::mem::take(&mut self.labels);
        let keywords = std::mem::take(&mut self.keywords);
        *self = Self::new(order);
        self.labels = labels;
        self.keywords = keywords;
    }

    /// The enumeration, in column order.
    pub fn order(&self) -> &[T] {
        &self.order
    }

    /// The safe default: the first value of the enumeration.
    pub fn first(&self) -> T {
        self.order[0]
    }

    pub fn position(&self, value: T) -> Option<usize> {
        self.order.iter().position(|v| *v == value)
    }

    /// Strict lookup: canonical spelling, label, then keyword. `None` when
    /// nothing matches or the match is outside this deployment's enumeration.
    pub fn resolve(&self, raw: &str) -> Option<T> {
        let folded = fold(raw);
        if folded.is_empty() {
            return None;
        }

        let found = T::from_canonical(&folded)
            .or_else(|| {
                self.labels
                    .iter()
                    .find(|label| label.folded == folded)
                    .map(|label| label.value)
            })
            .or_else(|| {
                self.keywords
                    .iter()
                    .find(|(fragment, _)| folded.contains(fragment.as_str()))
                    .map(|(_, value)| *value)
            })?;

        self.position(found).map(|_| found)
    }

    /// Total normalization for non-empty input; `None` only for empty or
    /// absent input.
    pub fn normalize(&self, raw: Option<&str>) -> Option<T> {
        let raw = raw?;
        if raw.trim().is_empty() {
            return None;
        }
        Some(self.resolve(raw).unwrap_or_else(|| self.first()))
    }

    pub fn normalize_or(&self, raw: Option<&str>, fallback: T) -> T {
        self.normalize(raw).unwrap_or(fallback)
    }

    /// First display label registered for `value`, or its canonical spelling.
    pub fn label_for(&self, value: T) -> String {
        self.labels
            .iter()
            .find(|label| label.value == value)
            .map(|label| label.display.clone())
            .unwrap_or_else(|| value.as_str().to_string())
    }
}

impl Default for Vocabulary<Status> {
    fn default() -> Self {
        use Status::*;

        Self::new(Status::ALL.to_vec())
            .with_label("Não iniciado", Backlog)
            .with_label("Nao iniciado", Backlog)
            .with_label("Backlog", Backlog)
            .with_label("Planejado", Todo)
            .with_label("A fazer", Todo)
            .with_label("To do", Todo)
            .with_label("Em andamento", InProgress)
            .with_label("In progress", InProgress)
            .with_label("Doing", InProgress)
            .with_label("Homologação", Review)
            .with_label("Homologacao", Review)
            .with_label("Em revisão", Review)
            .with_label("In review", Review)
            .with_label("IN_REVIEW", Review)
            .with_label("Em atraso", Delayed)
            .with_label("Atrasado", Delayed)
            .with_label("LATE", Delayed)
            .with_label("Em risco", Risk)
            .with_label("AT_RISK", Risk)
            .with_label("Bloqueado", Blocked)
            .with_label("Finalizado", Done)
            .with_label("Concluído", Done)
            .with_label("Concluido", Done)
            .with_keyword("backlog", Backlog)
            .with_keyword("não iniciado", Backlog)
            .with_keyword("nao iniciado", Backlog)
            .with_keyword("todo", Backlog)
            .with_keyword("planej", Todo)
            .with_keyword("andam", InProgress)
            .with_keyword("progress", InProgress)
            .with_keyword("doing", InProgress)
            .with_keyword("homolog", Review)
            .with_keyword("revis", Review)
            .with_keyword("review", Review)
            .with_keyword("final", Done)
            .with_keyword("done", Done)
            .with_keyword("conclu", Done)
            .with_keyword("atras", Delayed)
            .with_keyword("delay", Delayed)
            .with_keyword("late", Delayed)
            .with_keyword("overdue", Delayed)
            .with_keyword("risco", Risk)
            .with_keyword("risk", Risk)
            .with_keyword("blocked", Blocked)
            .with_keyword("bloque", Blocked)
    }
}

impl Default for Vocabulary<Priority> {
    fn default() -> Self {
        use Priority::*;

        Self::new(Priority::ALL.to_vec())
            .with_label("Urgente", Critical)
            .with_label("Urgent", Critical)
            .with_label("Alta", High)
            .with_label("Média", Medium)
            .with_label("Media", Medium)
            .with_label("Baixa", Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_label_matches_canonical() {
        let statuses = StatusNormalizer::default();
        assert_eq!(
            statuses.normalize(Some("Em Andamento")),
            statuses.normalize(Some("IN_PROGRESS"))
        );
        assert_eq!(statuses.normalize(Some("  in_progress ")), Some(Status::InProgress));
    }

    #[test]
    fn test_empty_input_is_none() {
        let statuses = StatusNormalizer::default();
        assert_eq!(statuses.normalize(None), None);
        assert_eq!(statuses.normalize(Some("   ")), None);
        assert_eq!(statuses.normalize_or(Some(""), Status::Done), Status::Done);
    }

    #[test]
    fn test_unknown_falls_back_to_first() {
        let statuses = StatusNormalizer::default();
        assert_eq!(statuses.normalize(Some("something else")), Some(Status::Backlog));
        assert_eq!(statuses.resolve("something else"), None);
    }

    #[test]
    fn test_keywords_in_table_order() {
        let statuses = StatusNormalizer::default();
        assert_eq!(statuses.normalize(Some("Tarefa atrasada")), Some(Status::Delayed));
        assert_eq!(statuses.normalize(Some("work in progress")), Some(Status::InProgress));
        assert_eq!(statuses.normalize(Some("Aguardando homologação")), Some(Status::Review));
    }

    #[test]
    fn test_restricted_order_falls_back() {
        let mut statuses = StatusNormalizer::default();
        statuses.set_order(vec![Status::Done, Status::InProgress]);

        assert_eq!(statuses.first(), Status::Done);
        assert_eq!(statuses.normalize(Some("Em andamento")), Some(Status::InProgress));
        // Known value, but not part of this deployment's board.
        assert_eq!(statuses.normalize(Some("BLOCKED")), Some(Status::Done));
    }

    #[test]
    fn test_label_override_and_display() {
        let statuses = StatusNormalizer::default().with_label("em andamento", Status::Review);
        assert_eq!(statuses.normalize(Some("Em andamento")), Some(Status::Review));
        assert_eq!(statuses.label_for(Status::Backlog), "Não iniciado");
        assert_eq!(
            StatusNormalizer::new(vec![]).label_for(Status::Done),
            "DONE"
        );
    }

    #[test]
    fn test_priority_vocabulary() {
        let priorities = PriorityNormalizer::default();
        assert_eq!(priorities.normalize(Some("URGENTE")), Some(Priority::Critical));
        assert_eq!(priorities.normalize(Some("média")), Some(Priority::Medium));
        assert_eq!(priorities.normalize(Some("baixa")), Some(Priority::Low));
        assert_eq!(priorities.normalize(Some("whatever")), Some(Priority::Critical));
    }

    #[test]
    fn test_duplicate_order_entries_collapse() {
        let statuses = StatusNormalizer::new(vec![Status::Done, Status::Done, Status::Backlog]);
        assert_eq!(statuses.order(), &[Status::Done, Status::Backlog]);
    }
}
