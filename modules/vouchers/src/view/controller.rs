use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::contract::client::VouchersApi;
use crate::contract::error::VouchersError;
use crate::contract::model::{BulkDeleteFailure, BulkDeleteReport, Voucher};
use crate::view::list_state::ListViewState;

pub const LOAD_FAILED: &str = "Failed to load voucher data.";
pub const DELETE_SUCCEEDED: &str = "Voucher successfully deleted!";
pub const DELETE_FAILED: &str = "Failed to delete voucher.";
pub const EMPTY_SELECTION: &str = "Select at least one voucher to delete.";
pub const BULK_DELETE_FAILED: &str =
    "Failed to delete multiple vouchers. Please check your connection or permissions.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// One user-facing message, as a toast would show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("{}", EMPTY_SELECTION)]
    EmptySelection,

    #[error(transparent)]
    Api(#[from] VouchersError),
}

impl ControllerError {
    pub fn notice(&self) -> Notice {
        match self {
            Self::EmptySelection => Notice::error(EMPTY_SELECTION),
            Self::Api(_) => Notice::error(LOAD_FAILED),
        }
    }
}

/// Per-id report plus the single aggregate message shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkDeleteOutcome {
    pub report: BulkDeleteReport,
    pub notice: Notice,
}

/// Owns the fetched rows and the view state, and issues commands through the gateway.
pub struct VoucherListController {
    api: Arc<dyn VouchersApi>,
    raw: Vec<Voucher>,
    state: ListViewState,
}

impl VoucherListController {
    pub fn new(api: Arc<dyn VouchersApi>) -> Self {
        Self {
            api,
            raw: Vec::new(),
            state: ListViewState::default(),
        }
    }

    pub fn raw(&self) -> &[Voucher] {
        &self.raw
    }

    pub fn state(&self) -> &ListViewState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ListViewState {
        &mut self.state
    }

    pub fn visible(&self, today: NaiveDate) -> Vec<Voucher> {
        self.state.visible(&self.raw, today)
    }

    pub fn toggle_select_all(&mut self, today: NaiveDate) {
        self.state.toggle_select_all(&self.raw, today);
    }

    pub fn is_all_visible_selected(&self, today: NaiveDate) -> bool {
        self.state.is_all_visible_selected(&self.raw, today)
    }

    /// Reloads the raw rows; on failure the previous rows stay.
    pub async fn refresh(&mut self) -> Result<usize, ControllerError> {
        match self.api.list_vouchers().await {
            Ok(rows) => {
                self.raw = rows;
                Ok(self.raw.len())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load vouchers");
                Err(e.into())
            }
        }
    }

    pub async fn delete_one(&mut self, id: Uuid) -> Notice {
        match self.api.delete_voucher(id).await {
            Ok(()) => {
                self.raw.retain(|v| v.id != id);
                self.state.deselect(id);
                info!(voucher_id = %id, "Voucher deleted");
                Notice::success(DELETE_SUCCEEDED)
            }
            Err(e) => {
                warn!(voucher_id = %id, error = %e, "Failed to delete voucher");
                Notice::error(DELETE_FAILED)
            }
        }
    }

    /// One concurrent delete per selected id, hidden selections included.
    pub async fn bulk_delete_selected(&mut self) -> Result<BulkDeleteOutcome, ControllerError> {
        if self.state.selected().is_empty() {
            return Err(ControllerError::EmptySelection);
        }

        let mut ids: Vec<Uuid> = self.state.selected().iter().copied().collect();
        ids.sort();
        let api = &self.api;
        let results = join_all(ids.iter().map(|id| api.delete_voucher(*id))).await;

        let mut report = BulkDeleteReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(()) => report.succeeded.push(id),
                Err(e) => report.failed.push(BulkDeleteFailure {
                    id,
                    reason: e.to_string(),
                }),
            }
        }

        for id in &report.succeeded {
            self.state.deselect(*id);
        }
        self.raw.retain(|v| !report.succeeded.contains(&v.id));

        let notice = if report.is_complete_success() {
            Notice::success(format!(
                "{} vouchers successfully deleted!",
                report.succeeded.len()
            ))
        } else {
            warn!(
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Bulk delete partially failed"
            );
            Notice::error(BULK_DELETE_FAILED)
        };
        Ok(BulkDeleteOutcome { report, notice })
    }
}
