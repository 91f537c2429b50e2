use serde::{Deserialize, Serialize};

/// An already-clamped window into a newest-first result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub has_more: bool,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            data,
            total,
            has_more: page.offset.saturating_add(page.limit) < total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_more_tracks_the_window_end() {
        let page = Page { limit: 2, offset: 0 };
        assert!(Paginated::new(vec![1, 2], 3, page).has_more);
        assert!(!Paginated::new(vec![1, 2], 2, page).has_more);

        let far = Page {
            limit: 100,
            offset: i64::MAX,
        };
        assert!(!Paginated::<i32>::new(Vec::new(), 3, far).has_more);
    }
}
