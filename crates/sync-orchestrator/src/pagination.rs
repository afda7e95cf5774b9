use std::collections::BTreeSet;

/// Tracks which pages of one collection have been handled.
///
/// Pages are 1-based. Until the server reports a total the cursor assumes a
/// single page, so the first request is always page 1.
#[derive(Debug, Clone)]
pub struct PaginationCursor {
    page_size: u32,
    pages_loaded: BTreeSet<u32>,
    total_pages: u32,
    total_records: Option<u64>,
}

impl PaginationCursor {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            pages_loaded: BTreeSet::new(),
            total_pages: 1,
            total_records: None,
        }
    }

    /// Record the server-reported total; `ceil(total / page_size)`, at least 1.
    pub fn set_total(&mut self, total: u64) {
        let pages = total.div_ceil(self.page_size as u64).max(1);
        self.total_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        self.total_records = Some(total);
    }

    pub fn mark_loaded(&mut self, page: u32) {
        self.pages_loaded.insert(page);
    }

    /// Lowest page not yet loaded, if any remain.
    pub fn next_page(&self) -> Option<u32> {
        (1..=self.total_pages).find(|page| !self.pages_loaded.contains(page))
    }

    pub fn has_more(&self) -> bool {
        self.next_page().is_some()
    }

    /// Record offset of `page`.
    pub fn offset(&self, page: u32) -> u64 {
        (page.saturating_sub(1) as u64) * self.page_size as u64
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn total_records(&self) -> Option<u64> {
        self.total_records
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages_loaded.len()
    }
}
