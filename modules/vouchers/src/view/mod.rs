//! Toolkit-independent dashboard state: list view, list controller and edit form.

pub mod controller;
pub mod form;
pub mod list_state;

pub use controller::{BulkDeleteOutcome, ControllerError, Notice, NoticeKind, VoucherListController};
pub use form::{FormErrors, FormMode, SubmitOutcome, VoucherForm};
pub use list_state::ListViewState;
