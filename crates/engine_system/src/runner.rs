//! System runner: per-system membership tracking and callback dispatch.

use std::collections::HashSet;
use std::fmt;

use anyhow::{Context, Result};
use engine_component::{ComponentId, ComponentRecord, ComponentRegistry};
use parking_lot::Mutex;
use tracing::debug;

use crate::system::{MembershipCallback, System};

/// The outcome of comparing two membership snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// The full current membership, in registry order.
    pub current: Vec<ComponentRecord>,
    /// Present now but not in the previous snapshot, in registry order.
    pub added: Vec<ComponentRecord>,
    /// Present in the previous snapshot but not now, in previous order.
    pub removed: Vec<ComponentRecord>,
}

impl MembershipDiff {
    /// Compare two snapshots by component identity.
    #[must_use]
    pub fn between(previous: &[ComponentRecord], current: Vec<ComponentRecord>) -> Self {
        let before: HashSet<ComponentId> = previous.iter().map(|r| r.id).collect();
        let now: HashSet<ComponentId> = current.iter().map(|r| r.id).collect();

        let added = current
            .iter()
            .filter(|r| !before.contains(&r.id))
            .cloned()
            .collect();
        let removed = previous
            .iter()
            .filter(|r| !now.contains(&r.id))
            .cloned()
            .collect();

        Self {
            current,
            added,
            removed,
        }
    }
}

/// Owns one [`System`] and the membership it saw on its last tick.
pub struct SystemRunner {
    system: System,
    previous: Mutex<Vec<ComponentRecord>>,
}

impl SystemRunner {
    /// Wrap a system. Its first tick diffs against an empty snapshot.
    #[must_use]
    pub fn new(system: System) -> Self {
        Self {
            system,
            previous: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped system.
    #[must_use]
    pub fn system(&self) -> &System {
        &self.system
    }

    /// Recompute membership, diff it, and run the callbacks.
    ///
    /// The new snapshot is committed before any callback runs, so a failing
    /// callback does not cause the same additions to be reported again.
    /// `on_update`, `on_added` and `on_removed` run strictly one after the
    /// other; the first failure skips the rest.
    ///
    /// # Errors
    ///
    /// Returns the first callback failure, annotated with the system kind.
    pub async fn tick(&self, registry: &ComponentRegistry) -> Result<MembershipDiff> {
        let current = registry.get_by_type(&self.system.kind);
        let diff = {
            let mut previous = self.previous.lock();
            let diff = MembershipDiff::between(&previous, current);
            *previous = diff.current.clone();
            diff
        };

        debug!(
            system = %self.system.id,
            kind = self.system.kind,
            current = diff.current.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            "system tick"
        );

        let kind = &self.system.kind;
        run(&self.system.on_update, &diff.current)
            .await
            .with_context(|| format!("system '{kind}' on_update failed"))?;
        run(&self.system.on_added, &diff.added)
            .await
            .with_context(|| format!("system '{kind}' on_added failed"))?;
        run(&self.system.on_removed, &diff.removed)
            .await
            .with_context(|| format!("system '{kind}' on_removed failed"))?;

        Ok(diff)
    }
}

async fn run(callback: &Option<MembershipCallback>, records: &[ComponentRecord]) -> Result<()> {
    match callback {
        Some(callback) => callback(records.to_vec()).await,
        None => Ok(()),
    }
}

impl fmt::Debug for SystemRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRunner")
            .field("system", &self.system)
            .field("previous", &self.previous.lock().len())
            .finish()
    }
}
