//! Snapshot diff.

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::ReconcileError;
use crate::ids::IdentifierIssuer;
use crate::models::{Blueprint, BlueprintKey, CorporationId, EventKind, ReconciliationEvent};

/// Compare a fetched snapshot against the stored one.
///
/// Stored records are matched by [`Blueprint::identity_key`]. When several
/// records share a key they are paired one-to-one in order. Added and changed
/// records come first, in fetched order, then removed ones in stored order.
pub fn diff(
    issuer: &IdentifierIssuer,
    corporation_id: CorporationId,
    fetched: &[Blueprint],
    stored: &[Blueprint],
    observed_at: DateTime<Utc>,
) -> Vec<ReconciliationEvent> {
    let mut index: HashMap<BlueprintKey, VecDeque<usize>> = HashMap::new();
    for (i, record) in stored.iter().enumerate() {
        index.entry(record.identity_key()).or_default().push_back(i);
    }

    let mut matched = vec![false; stored.len()];
    let mut events = Vec::new();
    let mut event = |kind, before: Option<&Blueprint>, after: Option<&Blueprint>| {
        events.push(ReconciliationEvent {
            id: issuer.issue(),
            corporation_id,
            kind,
            before: before.cloned(),
            after: after.cloned(),
            observed_at,
        });
    };

    for after in fetched {
        let slot = index
            .get_mut(&after.identity_key())
            .and_then(VecDeque::pop_front);
        match slot {
            None => event(EventKind::Added, None, Some(after)),
            Some(i) => {
                matched[i] = true;
                let before = &stored[i];
                if !before.same_quality(after) {
                    event(EventKind::Changed, Some(before), Some(after));
                }
            }
        }
    }

    for (before, _) in stored.iter().zip(&matched).filter(|(_, m)| !**m) {
        event(EventKind::Removed, Some(before), None);
    }

    events
}

/// Turns a fetch into change events.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    issuer: IdentifierIssuer,
}

impl Reconciler {
    pub fn new(issuer: IdentifierIssuer) -> Self {
        Self { issuer }
    }

    /// Run `fetch` and diff its result against `stored`.
    ///
    /// A failed fetch aborts with no events; `stored` is only ever read.
    pub async fn reconcile<F, Fut, E>(
        &self,
        corporation_id: CorporationId,
        fetch: F,
        stored: &[Blueprint],
    ) -> Result<Vec<ReconciliationEvent>, ReconcileError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Blueprint>, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let fetched = fetch().await.map_err(|e| ReconcileError::Aborted {
            corporation_id,
            source: e.into(),
        })?;
        Ok(self.diff(corporation_id, &fetched, stored, Utc::now()))
    }

    pub fn diff(
        &self,
        corporation_id: CorporationId,
        fetched: &[Blueprint],
        stored: &[Blueprint],
        observed_at: DateTime<Utc>,
    ) -> Vec<ReconciliationEvent> {
        let events = diff(&self.issuer, corporation_id, fetched, stored, observed_at);
        debug!(
            corporation_id,
            fetched = fetched.len(),
            stored = stored.len(),
            events = events.len(),
            "diffed blueprint snapshot"
        );
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bp(type_id: i32, location_id: i64, quantity: i32, me: i32, te: i32, runs: i32) -> Blueprint {
        Blueprint {
            item_id: 0,
            type_id,
            location_id,
            location_flag: "CorpSAG1".into(),
            quantity,
            material_efficiency: me,
            time_efficiency: te,
            runs,
        }
    }

    fn kinds(events: &[ReconciliationEvent]) -> Vec<EventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    fn run(fetched: &[Blueprint], stored: &[Blueprint]) -> Vec<ReconciliationEvent> {
        Reconciler::default().diff(98000001, fetched, stored, Utc::now())
    }

    #[test]
    fn changed_runs_and_new_type() {
        let stored = vec![bp(1, 10, 1, 10, 20, 5)];
        let fetched = vec![bp(1, 10, 1, 10, 20, 1), bp(2, 10, 1, 0, 0, -1)];

        let events = run(&fetched, &stored);
        assert_eq!(kinds(&events), vec![EventKind::Changed, EventKind::Added]);

        let changed = &events[0];
        assert_eq!(changed.before.as_ref().map(|b| b.runs), Some(5));
        assert_eq!(changed.after.as_ref().map(|b| b.runs), Some(1));

        let added = &events[1];
        assert!(added.before.is_none());
        assert_eq!(added.after.as_ref().map(|b| b.type_id), Some(2));
    }

    #[test]
    fn vanished_record_is_removed() {
        let stored = vec![bp(1, 10, 1, 10, 20, 5)];
        let events = run(&[], &stored);
        assert_eq!(kinds(&events), vec![EventKind::Removed]);
        assert!(events[0].after.is_none());
        assert_eq!(events[0].subject(), Some(&stored[0]));
    }

    #[test]
    fn identical_snapshot_is_quiet() {
        let snapshot = vec![bp(1, 10, 1, 10, 20, 5), bp(2, 10, -1, 0, 0, -1)];
        assert!(run(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn applying_a_diff_then_rerunning_is_quiet() {
        let stored = vec![bp(1, 10, 1, 10, 20, 5), bp(3, 11, 1, 0, 0, 10)];
        let fetched = vec![bp(1, 10, 1, 10, 20, 1), bp(2, 10, 1, 0, 0, -1)];
        assert_eq!(run(&fetched, &stored).len(), 3);
        assert!(run(&fetched, &fetched).is_empty());
    }

    #[test]
    fn noise_fields_do_not_produce_changes() {
        let stored = vec![bp(1, 10, 1, 10, 20, 5)];
        let mut moved = stored[0].clone();
        moved.item_id = 1000000010495;
        moved.location_flag = "CorpSAG4".into();
        assert!(run(&[moved], &stored).is_empty());
    }

    #[test]
    fn added_and_changed_precede_removed() {
        let stored = vec![bp(9, 10, 1, 0, 0, 1), bp(1, 10, 1, 0, 0, 1), bp(8, 10, 1, 0, 0, 1)];
        let fetched = vec![bp(3, 10, 1, 0, 0, 1), bp(1, 10, 1, 0, 0, 2)];

        let events = run(&fetched, &stored);
        assert_eq!(
            kinds(&events),
            vec![
                EventKind::Added,
                EventKind::Changed,
                EventKind::Removed,
                EventKind::Removed
            ]
        );
        let removed: Vec<i32> = events[2..]
            .iter()
            .filter_map(|e| e.before.as_ref().map(|b| b.type_id))
            .collect();
        assert_eq!(removed, vec![9, 8]);
    }

    #[test]
    fn duplicate_keys_pair_one_to_one() {
        let stored = vec![bp(1, 10, -2, 0, 0, 10), bp(1, 10, -2, 0, 0, 10)];
        let fetched = vec![
            bp(1, 10, -2, 0, 0, 10),
            bp(1, 10, -2, 0, 0, 10),
            bp(1, 10, -2, 0, 0, 10),
        ];
        assert_eq!(kinds(&run(&fetched, &stored)), vec![EventKind::Added]);
        assert_eq!(kinds(&run(&stored, &fetched)), vec![EventKind::Removed]);
    }

    #[test]
    fn events_are_stamped() {
        let now = Utc::now();
        let events = Reconciler::default().diff(
            42,
            &[bp(1, 10, 1, 0, 0, 1), bp(2, 10, 1, 0, 0, 1)],
            &[],
            now,
        );
        assert!(events.iter().all(|e| e.corporation_id == 42 && e.observed_at == now));
        assert!(events[1].id > events[0].id);
    }

    #[tokio::test]
    async fn failed_fetch_emits_nothing() {
        let stored = vec![bp(1, 10, 1, 10, 20, 5)];
        let err = Reconciler::default()
            .reconcile(
                7,
                || async { Err::<Vec<Blueprint>, _>("HTTP 502 from ESI") },
                &stored,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Aborted { corporation_id: 7, .. }));
    }

    #[tokio::test]
    async fn reconcile_diffs_fetch_result() {
        let stored = vec![bp(1, 10, 1, 10, 20, 5)];
        let events = Reconciler::default()
            .reconcile(
                7,
                || async { Ok::<_, std::io::Error>(vec![bp(1, 10, 1, 10, 20, 4)]) },
                &stored,
            )
            .await
            .unwrap();
        assert_eq!(kinds(&events), vec![EventKind::Changed]);
    }
}
