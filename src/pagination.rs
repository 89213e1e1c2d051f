use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One page as returned by a listing endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: Option<u64>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Page whose `items` may be fewer than the `received` records the server
    /// sent, after unusable ones were dropped. A full page from the server
    /// is taken to mean more may follow. This is wrong when the total is an
    /// exact multiple of the page size: the next fetch comes back empty.
    pub fn received(items: Vec<T>, received: usize, page: u32, limit: u32) -> Self {
        Self {
            items,
            page,
            limit,
            total: None,
            has_more: limit > 0 && received >= limit as usize,
        }
    }

    pub fn with_total(mut self, total: Option<u64>) -> Self {
        self.total = total;
        self
    }
}

/// `skip` value for endpoints that page by offset.
pub fn offset(page: u32, limit: u32) -> u32 {
    page.max(1).saturating_sub(1).saturating_mul(limit)
}

/// Ticket for an in-flight page fetch. A result is only applied while its
/// generation is current and its page is the next one expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub page: u32,
    pub limit: u32,
}

/// Accumulated list state for an infinitely scrolled listing. The feed keeps
/// one per session; single-page listings hand out [`Page`] directly.
#[derive(Debug, Clone, Serialize)]
pub struct PagedList<T> {
    items: Vec<T>,
    limit: u32,
    pages_loaded: u32,
    has_more: bool,
    loading: bool,
    error: Option<String>,
    #[serde(skip)]
    generation: u64,
    #[serde(skip)]
    in_flight: Option<PageRequest>,
}

impl<T> PagedList<T> {
    pub fn new(limit: u32) -> Self {
        Self {
            items: Vec::new(),
            limit: limit.max(1),
            pages_loaded: 0,
            has_more: true,
            loading: false,
            error: None,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drops everything and starts a new generation fetching page 1. Any
    /// fetch still in flight for the old generation becomes stale.
    pub fn restart(&mut self) -> PageRequest {
        self.generation = self.generation.wrapping_add(1);
        self.items.clear();
        self.pages_loaded = 0;
        self.has_more = true;
        self.error = None;
        self.mark_in_flight(1)
    }

    /// Next page to fetch, or `None` when a fetch is already running or the
    /// last page was short.
    pub fn next_request(&mut self) -> Option<PageRequest> {
        if self.loading || !self.has_more {
            return None;
        }
        Some(self.mark_in_flight(self.pages_loaded.saturating_add(1)))
    }

    /// Re-issues the page whose fetch failed.
    pub fn retry(&mut self) -> Option<PageRequest> {
        if self.loading || self.error.is_none() {
            return None;
        }
        self.error = None;
        Some(self.mark_in_flight(self.pages_loaded.saturating_add(1)))
    }

    fn mark_in_flight(&mut self, page: u32) -> PageRequest {
        let request = PageRequest {
            generation: self.generation,
            page,
            limit: self.limit,
        };
        self.loading = true;
        self.in_flight = Some(request);
        request
    }

    pub fn is_current(&self, request: &PageRequest) -> bool {
        request.generation == self.generation && request.page == self.pages_loaded.saturating_add(1)
    }

    /// Applies a finished fetch. Returns `false` when the result was stale
    /// and discarded.
    pub fn complete(&mut self, request: PageRequest, result: Result<Page<T>, String>) -> bool {
        if !self.is_current(&request) {
            return false;
        }
        if self.in_flight == Some(request) {
            self.in_flight = None;
            self.loading = false;
        }

        match result {
            Ok(page) => {
                self.has_more = page.has_more;
                if request.page == 1 {
                    self.items = page.items;
                } else {
                    self.items.extend(page.items);
                }
                self.pages_loaded = request.page;
                self.error = None;
            }
            Err(message) => {
                self.error = Some(message);
            }
        }
        true
    }
}
