// Status projection - effective status of every module for one user
//
// Pure function of the catalog order and the user's stored records. A stored
// `done` always wins; anything else is recomputed from the prefix rule.

use std::collections::HashMap;

use super::types::{ModuleView, ProgressRecord, ProgressStatus, StatusProjection, UserId};
use crate::catalog::{Catalog, ModuleId};

pub fn project(catalog: &Catalog, user_id: &UserId, records: &[ProgressRecord]) -> StatusProjection {
    let by_module: HashMap<&ModuleId, &ProgressRecord> = records
        .iter()
        .filter(|r| &r.user_id == user_id)
        .map(|r| (&r.module_id, r))
        .collect();

    let mut prefix_done = true;
    let mut gap_seen = false;
    let mut modules = Vec::with_capacity(catalog.len());

    for (index, module) in catalog.list().iter().enumerate() {
        let stored = by_module.get(&module.id).copied();
        let stored_done = stored.is_some_and(|r| r.status == ProgressStatus::Done);

        let status = if stored_done {
            ProgressStatus::Done
        } else if index == 0 || prefix_done {
            ProgressStatus::Active
        } else {
            ProgressStatus::Locked
        };

        if stored_done && !prefix_done {
            gap_seen = true;
        }
        prefix_done = prefix_done && status == ProgressStatus::Done;

        modules.push(ModuleView {
            module_id: module.id.clone(),
            sequence_position: module.sequence_position,
            title: module.title.clone(),
            description: module.description.clone(),
            status,
            started_at: stored.and_then(|r| r.started_at),
            completed_at: stored.and_then(|r| r.completed_at),
        });
    }

    if gap_seen {
        tracing::warn!(
            user_id = %user_id,
            "Stored progress has completed modules outside the completed prefix"
        );
    }

    StatusProjection {
        user_id: user_id.clone(),
        modules,
    }
}
