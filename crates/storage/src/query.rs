/// Window over a listing query.
///
/// Listings are ordered newest first; `offset` skips that many records and
/// `limit` caps the result. [`Page::all`] returns everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Number of records to skip.
    pub offset: usize,

    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl Page {
    /// Creates a page with no offset and no limit.
    pub fn all() -> Self {
        Self::default()
    }

    /// Creates a page with the given offset and limit.
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// Sets the maximum number of records to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of records to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Applies the window to an already ordered list.
    pub fn apply<T>(&self, records: Vec<T>) -> Vec<T> {
        let records = records.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => records.take(limit).collect(),
            None => records.collect(),
        }
    }
}
