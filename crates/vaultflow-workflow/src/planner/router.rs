//! Writes generated plans to the folder their approval flag selects.

use std::path::PathBuf;

use tracing::{info, warn};
use vaultflow_core::{Folder, VaultLayout};

use super::{Plan, PREVIEW_HEADING, RISKS_HEADING, ROLLBACK_HEADING};
use crate::error::Result;
use crate::record::RecordStore;

pub struct PlanRouter {
    layout: VaultLayout,
    store: RecordStore,
}

impl PlanRouter {
    pub fn new(layout: VaultLayout, store: RecordStore) -> Self {
        Self { layout, store }
    }

    /// Destination folder for a plan.
    pub fn target_folder(plan: &Plan) -> Folder {
        if plan.requires_approval {
            Folder::PendingApproval
        } else {
            Folder::Plans
        }
    }

    /// Write `plan` as `filename` into Pending_Approval or Plans.
    pub fn route(&self, plan: &Plan, filename: &str) -> Result<PathBuf> {
        for folder in [Folder::Plans, Folder::PendingApproval] {
            std::fs::create_dir_all(self.layout.folder(folder))?;
        }

        let folder = Self::target_folder(plan);
        let path = self.layout.file(folder, filename);
        self.store.write(&path, &plan.to_record())?;

        if plan.requires_approval {
            info!(plan = %filename, folder = %folder, "Plan routed for approval");
        } else {
            info!(plan = %filename, folder = %folder, "Plan routed for auto-execution");
        }
        Ok(path)
    }

    /// Check that an approval plan carries everything a reviewer needs.
    /// Failures are logged, never fatal.
    pub fn validate_routing(plan: &Plan) -> bool {
        if !plan.requires_approval {
            return true;
        }
        let body = plan.render_body();
        let mut valid = true;
        for heading in [RISKS_HEADING, ROLLBACK_HEADING, PREVIEW_HEADING] {
            if !body.contains(heading) {
                warn!(task = %plan.task_id, section = heading, "Approval plan missing section");
                valid = false;
            }
        }
        valid
    }
}
