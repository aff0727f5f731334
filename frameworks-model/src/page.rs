//! Cursor pagination primitives shared by the directory ports.

use serde::{Deserialize, Serialize};

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// A terminal page with no further results.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            end_cursor: None,
            has_next_page: false,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::last(Vec::new())
    }
}
