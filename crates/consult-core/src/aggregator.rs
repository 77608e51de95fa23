//! Aggregator — turns outcomes settled in any order into a request-ordered batch

use tracing::warn;

/// Error text for a slot whose provider call never reported back
pub const INCOMPLETE_CALL_MESSAGE: &str = "Provider call did not complete";

/// The names attached to one requested model id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLabel {
    pub addressable_id: String,
    pub display_name: String,
    pub provider_display_name: String,
}

impl ModelLabel {
    pub fn new(
        addressable_id: impl Into<String>,
        display_name: impl Into<String>,
        provider_display_name: impl Into<String>,
    ) -> Self {
        Self {
            addressable_id: addressable_id.into(),
            display_name: display_name.into(),
            provider_display_name: provider_display_name.into(),
        }
    }

    pub fn success(self, text: String, elapsed_ms: u64) -> ModelOutcome {
        ModelOutcome::Success {
            addressable_id: self.addressable_id,
            display_name: self.display_name,
            provider_display_name: self.provider_display_name,
            text,
            elapsed_ms,
        }
    }

    pub fn failure(self, error_message: impl Into<String>) -> ModelOutcome {
        ModelOutcome::Failure {
            addressable_id: self.addressable_id,
            display_name: self.display_name,
            provider_display_name: self.provider_display_name,
            error_message: error_message.into(),
        }
    }
}

/// Result of asking one model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOutcome {
    Success {
        addressable_id: String,
        display_name: String,
        provider_display_name: String,
        text: String,
        elapsed_ms: u64,
    },
    Failure {
        addressable_id: String,
        display_name: String,
        provider_display_name: String,
        error_message: String,
    },
}

impl ModelOutcome {
    pub fn addressable_id(&self) -> &str {
        match self {
            Self::Success { addressable_id, .. } | Self::Failure { addressable_id, .. } => {
                addressable_id
            }
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Success { display_name, .. } | Self::Failure { display_name, .. } => {
                display_name
            }
        }
    }

    pub fn provider_display_name(&self) -> &str {
        match self {
            Self::Success {
                provider_display_name,
                ..
            }
            | Self::Failure {
                provider_display_name,
                ..
            } => provider_display_name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Answer text for a success
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success { text, .. } => Some(text),
            Self::Failure { .. } => None,
        }
    }

    /// Call duration for a success
    pub fn elapsed_ms(&self) -> Option<u64> {
        match self {
            Self::Success { elapsed_ms, .. } => Some(*elapsed_ms),
            Self::Failure { .. } => None,
        }
    }

    /// Error text for a failure
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_message, .. } => Some(error_message),
        }
    }
}

/// Every outcome of one consultation, in request order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponseBatch {
    outcomes: Vec<ModelOutcome>,
}

/// Counts and timing over a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Mean `elapsed_ms` over successful outcomes
    pub average_elapsed_ms: Option<u64>,
}

impl ChatResponseBatch {
    pub fn outcomes(&self) -> &[ModelOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModelOutcome> {
        self.outcomes.iter()
    }

    pub fn summary(&self) -> BatchSummary {
        let timings: Vec<u64> = self.outcomes.iter().filter_map(ModelOutcome::elapsed_ms).collect();
        let succeeded = timings.len();
        let average_elapsed_ms = (succeeded > 0).then(|| {
            let total: u128 = timings.iter().map(|&t| u128::from(t)).sum();
            (total / succeeded as u128) as u64
        });

        BatchSummary {
            total: self.outcomes.len(),
            succeeded,
            failed: self.outcomes.len() - succeeded,
            average_elapsed_ms,
        }
    }
}

impl<'a> IntoIterator for &'a ChatResponseBatch {
    type Item = &'a ModelOutcome;
    type IntoIter = std::slice::Iter<'a, ModelOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

/// Collects outcomes by request position.
///
/// One slot per requested id; outcomes may be recorded in any order and
/// [`finish`](Aggregator::finish) emits them in slot order. A slot that is
/// never filled becomes a failure, so the batch always has one outcome per
/// requested id.
#[derive(Debug)]
pub struct Aggregator {
    slots: Vec<(ModelLabel, Option<ModelOutcome>)>,
}

impl Aggregator {
    pub fn new(labels: Vec<ModelLabel>) -> Self {
        Self {
            slots: labels.into_iter().map(|label| (label, None)).collect(),
        }
    }

    /// Record the outcome for request position `index`.
    ///
    /// The first outcome for a slot wins; later ones and out-of-range
    /// positions are dropped.
    pub fn record(&mut self, index: usize, outcome: ModelOutcome) {
        let Some((label, slot)) = self.slots.get_mut(index) else {
            warn!(index, "Outcome recorded for an unknown slot");
            return;
        };
        if slot.is_some() {
            warn!(index, model = %label.addressable_id, "Slot already settled, dropping outcome");
            return;
        }
        if label.addressable_id != outcome.addressable_id() {
            warn!(
                index,
                expected = %label.addressable_id,
                got = %outcome.addressable_id(),
                "Outcome recorded against a different model id"
            );
            return;
        }
        *slot = Some(outcome);
    }

    /// Number of slots still waiting for an outcome
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|(_, o)| o.is_none()).count()
    }

    pub fn finish(self) -> ChatResponseBatch {
        let outcomes = self
            .slots
            .into_iter()
            .map(|(label, outcome)| {
                outcome.unwrap_or_else(|| label.failure(INCOMPLETE_CALL_MESSAGE))
            })
            .collect();
        ChatResponseBatch { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ids: &[&str]) -> Vec<ModelLabel> {
        ids.iter().map(|id| ModelLabel::new(*id, *id, "Test")).collect()
    }

    #[test]
    fn test_finish_restores_request_order() {
        let ids = ["a:1", "b:2", "c:3"];
        let mut agg = Aggregator::new(labels(&ids));

        agg.record(2, ModelLabel::new("c:3", "c:3", "Test").success("third".into(), 5));
        agg.record(0, ModelLabel::new("a:1", "a:1", "Test").failure("boom"));
        agg.record(1, ModelLabel::new("b:2", "b:2", "Test").success("second".into(), 9));
        assert_eq!(agg.pending(), 0);

        let batch = agg.finish();
        let got: Vec<&str> = batch.iter().map(ModelOutcome::addressable_id).collect();
        assert_eq!(got, ids);
        assert_eq!(batch.outcomes()[1].text(), Some("second"));
        assert_eq!(batch.outcomes()[0].error_message(), Some("boom"));
    }

    #[test]
    fn test_unfilled_slot_becomes_failure() {
        let mut agg = Aggregator::new(labels(&["a:1", "b:2"]));
        agg.record(0, ModelLabel::new("a:1", "a:1", "Test").success("ok".into(), 1));
        assert_eq!(agg.pending(), 1);

        let batch = agg.finish();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.outcomes()[1].addressable_id(), "b:2");
        assert_eq!(
            batch.outcomes()[1].error_message(),
            Some(INCOMPLETE_CALL_MESSAGE)
        );
    }

    #[test]
    fn test_first_outcome_wins() {
        let mut agg = Aggregator::new(labels(&["a:1"]));
        agg.record(0, ModelLabel::new("a:1", "a:1", "Test").success("first".into(), 1));
        agg.record(0, ModelLabel::new("a:1", "a:1", "Test").success("second".into(), 2));
        assert_eq!(agg.finish().outcomes()[0].text(), Some("first"));
    }

    #[test]
    fn test_mismatched_and_out_of_range_are_dropped() {
        let mut agg = Aggregator::new(labels(&["a:1"]));
        agg.record(0, ModelLabel::new("z:9", "z:9", "Test").success("wrong".into(), 1));
        agg.record(7, ModelLabel::new("a:1", "a:1", "Test").success("far".into(), 1));
        assert_eq!(agg.pending(), 1);
    }

    #[test]
    fn test_duplicate_ids_keep_their_own_slots() {
        let mut agg = Aggregator::new(labels(&["a:1", "a:1"]));
        agg.record(1, ModelLabel::new("a:1", "a:1", "Test").success("later".into(), 2));
        agg.record(0, ModelLabel::new("a:1", "a:1", "Test").success("earlier".into(), 1));
        let batch = agg.finish();
        assert_eq!(batch.outcomes()[0].text(), Some("earlier"));
        assert_eq!(batch.outcomes()[1].text(), Some("later"));
    }

    #[test]
    fn test_summary() {
        let mut agg = Aggregator::new(labels(&["a:1", "b:2", "c:3"]));
        agg.record(0, ModelLabel::new("a:1", "a:1", "T").success("x".into(), 100));
        agg.record(1, ModelLabel::new("b:2", "b:2", "T").success("y".into(), 301));
        agg.record(2, ModelLabel::new("c:3", "c:3", "T").failure("nope"));

        let summary = agg.finish().summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.average_elapsed_ms, Some(200));
    }

    #[test]
    fn test_summary_all_failed() {
        let mut agg = Aggregator::new(labels(&["a:1"]));
        agg.record(0, ModelLabel::new("a:1", "a:1", "T").failure("nope"));
        let summary = agg.finish().summary();
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.average_elapsed_ms, None);
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = ModelLabel::new("openai:gpt-4o", "GPT-4o", "OpenAI").success("hi".into(), 42);
        assert!(ok.is_success());
        assert_eq!(ok.display_name(), "GPT-4o");
        assert_eq!(ok.provider_display_name(), "OpenAI");
        assert_eq!(ok.elapsed_ms(), Some(42));
        assert_eq!(ok.error_message(), None);

        let err = ModelLabel::new("openai:gpt-4o", "GPT-4o", "OpenAI").failure("bad key");
        assert!(!err.is_success());
        assert_eq!(err.text(), None);
        assert_eq!(err.elapsed_ms(), None);
    }
}
