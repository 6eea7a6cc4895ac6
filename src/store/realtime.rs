//! Change notifications for the remote table.
//!
//! A background task polls the row fingerprint (`id`, `updated_at`) and
//! diffs it against the previous poll. The first poll only records the
//! baseline. Dropping the [`Subscription`] stops the task.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::remote::{RemoteStore, RowStamp};
use super::Scope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChangeEvent {
    Insert(String),
    Update(String),
    Delete(String),
}

type Fingerprint = BTreeMap<String, Option<String>>;

pub(crate) struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Wait for the next event. `None` once the watcher has stopped.
    pub(crate) async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Take every event already queued without waiting.
    pub(crate) fn drain(&mut self) -> Vec<ChangeEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn fingerprint(rows: Vec<RowStamp>) -> Fingerprint {
    rows.into_iter().map(|r| (r.id, r.updated_at)).collect()
}

pub(crate) fn diff(prev: &Fingerprint, next: &Fingerprint) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for (id, stamp) in next {
        match prev.get(id) {
            None => events.push(ChangeEvent::Insert(id.clone())),
            Some(old) if old != stamp => events.push(ChangeEvent::Update(id.clone())),
            Some(_) => {}
        }
    }
    for id in prev.keys() {
        if !next.contains_key(id) {
            events.push(ChangeEvent::Delete(id.clone()));
        }
    }
    events
}

pub(crate) fn watch(store: RemoteStore, scope: Scope, interval: Duration) -> Subscription {
    let (tx, events) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut baseline: Option<Fingerprint> = None;

        loop {
            ticker.tick().await;
            let next = match store.fingerprint(&scope).await {
                Ok(rows) => fingerprint(rows),
                Err(e) => {
                    warn!(error = %e, "change feed poll failed");
                    continue;
                }
            };
            if let Some(prev) = &baseline {
                for event in diff(prev, &next) {
                    debug!(?event, "change detected");
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
            baseline = Some(next);
        }
    });
    Subscription { events, task }
}
