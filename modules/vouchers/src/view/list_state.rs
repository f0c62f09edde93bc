use std::collections::HashSet;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::contract::model::Voucher;
use crate::domain::listing::{self, ListQuery, SearchTerm, SortKey, SortState, StatusFilter, TypeFilter};

/// Search, filter, sort and selection chosen by the user.
///
/// The selection is independent of filtering: changing a filter never prunes
/// ids that became hidden, and those ids still count for bulk delete.
#[derive(Debug, Clone, Default)]
pub struct ListViewState {
    pub search: String,
    pub status_filter: StatusFilter,
    pub type_filter: TypeFilter,
    pub sort: SortState,
    selected: HashSet<Uuid>,
}

impl ListViewState {
    pub fn query(&self) -> ListQuery {
        ListQuery {
            search: SearchTerm::new(self.search.clone()),
            status: self.status_filter,
            discount_type: self.type_filter,
            sort: self.sort,
        }
    }

    /// Rows to render, recomputed from the full raw collection.
    pub fn visible(&self, raw: &[Voucher], today: NaiveDate) -> Vec<Voucher> {
        listing::apply(raw, &self.query(), today)
    }

    pub fn request_sort(&mut self, key: SortKey) {
        self.sort.toggle(key);
    }

    pub fn toggle_selected(&mut self, id: Uuid) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    pub fn is_selected(&self, id: Uuid) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected(&self) -> &HashSet<Uuid> {
        &self.selected
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// False for an empty view.
    pub fn is_all_visible_selected(&self, raw: &[Voucher], today: NaiveDate) -> bool {
        let visible = self.visible(raw, today);
        !visible.is_empty() && visible.iter().all(|v| self.selected.contains(&v.id))
    }

    /// Clears everything when every visible row is selected, otherwise selects exactly
    /// the visible rows.
    pub fn toggle_select_all(&mut self, raw: &[Voucher], today: NaiveDate) {
        if self.is_all_visible_selected(raw, today) {
            self.selected.clear();
        } else {
            self.selected = self
                .visible(raw, today)
                .into_iter()
                .map(|v| v.id)
                .collect();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn deselect(&mut self, id: Uuid) {
        self.selected.remove(&id);
    }
}
