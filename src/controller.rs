use tracing::{trace, warn};

use crate::domain::{GridConfig, Message};
use crate::query::{SortBy, ViewState, ViewStateUpdate};

/// Turns user actions into view state updates.
pub struct Controller {
    page_size_options: Vec<usize>,
}

impl Controller {
    pub fn new(cfg: &GridConfig) -> Self {
        Self {
            page_size_options: cfg.page_size_options.clone(),
        }
    }

    /// `None` when the action changes nothing, or is not a state change at all
    /// (exports).
    pub fn handle_message(
        &self,
        message: &Message,
        state: &ViewState,
        page_count: usize,
    ) -> Option<ViewStateUpdate> {
        let update = match message {
            Message::Search(text) => Some(ViewStateUpdate::default().search_query(text.as_str())),
            Message::ToggleColumn(id) => {
                let mut hidden = state.hidden_columns.clone();
                if !hidden.remove(id) {
                    hidden.insert(id.clone());
                }
                Some(ViewStateUpdate::default().hidden_columns(hidden))
            }
            Message::SortColumn(id) => Some(ViewStateUpdate::default().sort_by(Some(Self::next_sort(state, id)))),
            Message::ClearSort => Some(ViewStateUpdate::default().sort_by(None)),
            Message::NextPage if state.current_page < page_count => {
                Some(ViewStateUpdate::default().current_page(state.current_page + 1))
            }
            Message::PrevPage if state.current_page > 1 => {
                Some(ViewStateUpdate::default().current_page(state.current_page - 1))
            }
            Message::NextPage | Message::PrevPage => None,
            Message::GotoPage(page) if *page > 0 => Some(ViewStateUpdate::default().current_page(*page)),
            Message::GotoPage(page) => {
                warn!("Ignoring page {page}");
                None
            }
            Message::SetRowsPerPage(size) if self.page_size_options.contains(size) => Some(
                ViewStateUpdate::default()
                    .rows_per_page(*size)
                    .current_page(1),
            ),
            Message::SetRowsPerPage(size) => {
                warn!(
                    "Ignoring page size {size}, allowed sizes are {:?}",
                    self.page_size_options
                );
                None
            }
            Message::Export(_) => None,
        };
        trace!("Mapped: {message:?} => {update:?}");
        update
    }

    // Clicking the sorted column flips direction, any other column starts ascending
    fn next_sort(state: &ViewState, id: &str) -> SortBy {
        match &state.sort_by {
            Some(current) if current.id == id => SortBy {
                id: id.to_string(),
                descending: !current.descending,
            },
            _ => SortBy::ascending(id),
        }
    }
}
