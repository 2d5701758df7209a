use serde::Deserialize;

/// Number of page links shown in the sliding window.
const WINDOW: i64 = 5;
const DEFAULT_PER_PAGE: i64 = 10;
const MAX_PER_PAGE: i64 = 100;

/// Pagination
///
/// Counters for one page of a listing. Built once per request from the
/// requested page, the page size and the total row count; templates read the
/// fields directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: i64,
    pub next_page: i64,
    pub showing_from: i64,
    pub showing_to: i64,
    /// Page numbers in the link window, ascending.
    pub pages: Vec<i64>,
}

impl Pagination {
    /// new
    ///
    /// Page and page size are clamped to at least 1 and the total to at least 0.
    /// A page past the end is kept as requested; the window is still clamped
    /// to existing pages. Row arithmetic saturates, so any page number from a
    /// query string is safe.
    pub fn new(current_page: i64, per_page: i64, total_items: i64) -> Self {
        let current_page = current_page.max(1);
        let per_page = per_page.max(1);
        let total_items = total_items.max(0);

        let total_pages = total_items / per_page + i64::from(total_items % per_page != 0);
        let has_prev = current_page > 1;
        let has_next = current_page < total_pages;

        let showing_from = if total_items == 0 {
            0
        } else {
            (current_page - 1).saturating_mul(per_page).saturating_add(1)
        };
        let showing_to = current_page.saturating_mul(per_page).min(total_items);

        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
            has_prev,
            has_next,
            prev_page: if has_prev { current_page - 1 } else { 1 },
            next_page: if has_next { current_page + 1 } else { current_page },
            showing_from,
            showing_to,
            pages: window(current_page, total_pages),
        }
    }

    /// Row offset for the repository call.
    pub fn offset(&self) -> i64 {
        (self.current_page - 1).saturating_mul(self.per_page)
    }
}

// Centred on `current` where possible, shifted to stay inside 1..=total.
fn window(current: i64, total: i64) -> Vec<i64> {
    if total <= 0 {
        return Vec::new();
    }
    let half = WINDOW / 2;
    let mut start = (current - half).max(1);
    let end = start.saturating_add(WINDOW - 1).min(total);
    start = (end - WINDOW + 1).max(1);
    (start..=end).collect()
}

/// PageQuery
///
/// Query-string extractor for listings (`?page=2&per_page=25`).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// Builds the pagination for this request against `total_items`.
    pub fn paginate(&self, total_items: i64) -> Pagination {
        Pagination::new(self.page(), self.per_page(), total_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_partial_page() {
        let p = Pagination::new(3, 10, 23);
        assert_eq!(p.showing_from, 21);
        assert_eq!(p.showing_to, 23);
        assert!(!p.has_next);
        assert!(p.has_prev);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.pages, vec![1, 2, 3]);
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn empty_result_set() {
        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.showing_from, 0);
        assert_eq!(p.showing_to, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_prev);
        assert!(p.pages.is_empty());
    }

    #[test]
    fn single_full_page() {
        let p = Pagination::new(1, 10, 10);
        assert_eq!((p.showing_from, p.showing_to), (1, 10));
        assert_eq!(p.total_pages, 1);
        assert!(!p.has_next);
        assert_eq!(p.pages, vec![1]);
    }

    #[test]
    fn window_is_centred_and_clamped() {
        assert_eq!(Pagination::new(1, 1, 20).pages, vec![1, 2, 3, 4, 5]);
        assert_eq!(Pagination::new(10, 1, 20).pages, vec![8, 9, 10, 11, 12]);
        assert_eq!(Pagination::new(20, 1, 20).pages, vec![16, 17, 18, 19, 20]);
        assert_eq!(Pagination::new(19, 1, 20).pages, vec![16, 17, 18, 19, 20]);
    }

    #[test]
    fn showing_range_holds_across_inputs() {
        for total in 0..40 {
            for per_page in 1..7 {
                for page in 1..10 {
                    let p = Pagination::new(page, per_page, total);
                    let expected_from = if total == 0 { 0 } else { (page - 1) * per_page + 1 };
                    assert_eq!(p.showing_from, expected_from);
                    assert_eq!(p.showing_to, (page * per_page).min(total));
                    assert!(p.pages.len() as i64 <= WINDOW);
                }
            }
        }
    }

    #[test]
    fn nonsense_input_is_clamped() {
        let p = Pagination::new(-4, 0, -1);
        assert_eq!(p.current_page, 1);
        assert_eq!(p.per_page, 1);
        assert_eq!(p.total_items, 0);
    }

    #[test]
    fn huge_page_numbers_saturate() {
        let p = Pagination::new(i64::MAX, 10, 23);
        assert_eq!(p.current_page, i64::MAX);
        assert_eq!(p.total_pages, 3);
        assert!(p.showing_from > 0);
        assert_eq!(p.showing_to, 23);
        assert!(p.offset() > 0);
        assert!(!p.has_next);
        assert_eq!(p.prev_page, i64::MAX - 1);
        assert_eq!(p.pages, vec![1, 2, 3]);

        let p = Pagination::new(i64::MAX, 100, i64::MAX);
        assert_eq!(p.total_pages, i64::MAX / 100 + 1);
        assert_eq!(p.offset(), i64::MAX);
    }

    #[test]
    fn page_query_defaults_and_ceiling() {
        let q = PageQuery { page: None, per_page: None };
        assert_eq!((q.page(), q.per_page()), (1, 10));
        let q = PageQuery { page: Some(0), per_page: Some(5000) };
        assert_eq!((q.page(), q.per_page()), (1, 100));
    }
}
