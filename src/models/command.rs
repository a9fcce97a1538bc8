use serde::{Deserialize, Serialize};

use super::plan::PlanRef;

/// A shell script bound to one step of a build or deploy plan.
///
/// `sort_order` is a dense 0-based position within the (plan, step) group,
/// renumbered on every reorder. `deleted_at` is the soft-delete tombstone;
/// retired commands are excluded from active queries but recoverable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub name: String,
    pub user: Option<String>,
    pub script: String,
    pub target: PlanRef,
    pub step: i64,
    pub sort_order: i64,
    pub optional: bool,
    pub default_on: bool,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}
