//! Offset pagination: request parameters and the paged result view.

use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Zero-based page request (`page`, `size`) as received from a caller.
///
/// A negative page is accepted and clamped to the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    size: u64,
}

impl PageRequest {
    pub const DEFAULT_SIZE: u64 = 10;

    pub fn new(page: i64, size: u64) -> Self {
        Self {
            page: page.max(0),
            size,
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Rows to skip: `page * size`.
    pub fn offset(&self) -> u64 {
        (self.page as u64).saturating_mul(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_SIZE)
    }
}

/// A bounded slice of a larger result set plus the metadata to navigate it.
///
/// Built fresh for every query and never persisted. Navigation helpers are pure
/// functions of `current_page` and `total_pages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedCollection<T> {
    content: Vec<T>,
    total_elements: u64,
    current_page: u64,
    page_size: u64,
    total_pages: u64,
}

impl<T> PagedCollection<T> {
    pub fn new(content: Vec<T>, total_elements: u64, current_page: i64, page_size: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_elements.div_ceil(page_size)
        };

        Self {
            content,
            total_elements,
            current_page: current_page.max(0) as u64,
            page_size,
            total_pages,
        }
    }

    /// An empty page (used when the count query finds nothing).
    pub fn empty(current_page: i64, page_size: u64) -> Self {
        Self::new(Vec::new(), 0, current_page, page_size)
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn has_next(&self) -> bool {
        self.current_page + 1 < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 0
    }

    pub fn next_page(&self) -> u64 {
        if self.has_next() {
            self.current_page + 1
        } else {
            self.current_page
        }
    }

    pub fn previous_page(&self) -> u64 {
        if self.has_previous() {
            self.current_page - 1
        } else {
            self.current_page
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedCollection<U> {
        PagedCollection {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            current_page: self.current_page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }

    /// Map the content while keeping the paging metadata (rows -> entities).
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PagedCollection<U>, E> {
        let content = self.content.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(PagedCollection {
            content,
            total_elements: self.total_elements,
            current_page: self.current_page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        })
    }
}

/// Serialized in camelCase with the derived `hasNext`/`hasPrevious` flags.
impl<T: Serialize> Serialize for PagedCollection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PagedCollection", 7)?;
        state.serialize_field("content", &self.content)?;
        state.serialize_field("totalElements", &self.total_elements)?;
        state.serialize_field("currentPage", &self.current_page)?;
        state.serialize_field("pageSize", &self.page_size)?;
        state.serialize_field("totalPages", &self.total_pages)?;
        state.serialize_field("hasNext", &self.has_next())?;
        state.serialize_field("hasPrevious", &self.has_previous())?;
        state.end()
    }
}
