use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Pagination {
    pub index: u64,
    pub size: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { index: 1, size: 10 }
    }
}

const MAX_PAGE_SIZE: u64 = 100;

impl Pagination {
    pub fn offset(&self) -> u64 {
        self.index.saturating_sub(1).saturating_mul(self.size)
    }

    pub fn limit(&self) -> u64 {
        self.size
    }

    /// Falls back to the first page on zero values and caps the page size,
    /// keeping the offset within SQLite's signed range.
    pub fn check(&self) -> Self {
        if self.index < 1 || self.size < 1 {
            return Self::default();
        }
        let size = self.size.min(MAX_PAGE_SIZE);
        let index = self.index.min(i64::MAX as u64 / size);
        Self { index, size }
    }
}
