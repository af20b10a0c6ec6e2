use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Idle,
    Fetching,
    Exhausted,
}

/// Parameters of one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub page_size: usize,
}

/// Deterministic "next page" sequencing for backward (older-post) loading.
///
/// `idle → fetching → idle` on success, `idle → fetching → exhausted` when a
/// short or empty page comes back. While `fetching`, further requests are
/// rejected so fast scrolling cannot issue duplicate network calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationCursor {
    state: CursorState,
    offset: usize,
    page_size: usize,
}

impl PaginationCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: CursorState::Idle,
            offset: 0,
            page_size,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted
    }

    /// Starts the next page request, or returns `None` when one is already
    /// in flight or the feed is exhausted.
    pub fn begin(&mut self) -> Option<PageRequest> {
        match self.state {
            CursorState::Idle => {
                self.state = CursorState::Fetching;
                Some(PageRequest {
                    offset: self.offset,
                    page_size: self.page_size,
                })
            }
            CursorState::Fetching => {
                debug!("page request already in flight, rejecting");
                None
            }
            CursorState::Exhausted => None,
        }
    }

    /// Records a successful fetch. The offset advances only on a full page;
    /// a short or empty page marks the feed exhausted.
    pub fn complete(&mut self, returned: usize) {
        if returned < self.page_size {
            self.state = CursorState::Exhausted;
        } else {
            self.offset += self.page_size;
            self.state = CursorState::Idle;
        }
    }

    /// Records a failed fetch. Back to `Idle`, not `Exhausted`, so the next
    /// attempt can retry the same offset.
    pub fn fail(&mut self) {
        self.state = CursorState::Idle;
    }

    /// Back to page zero. Used when the viewed scope changes or on refresh.
    pub fn reset(&mut self) {
        self.state = CursorState::Idle;
        self.offset = 0;
    }
}
