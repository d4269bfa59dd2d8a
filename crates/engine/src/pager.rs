//! Stateless pagination over a scoped collection.
//!
//! Items come back in the store's stable order (ascending id), so walking
//! pages `1..=n` partitions the collection. `total_hits` is the size of the
//! whole collection, even for a page past the end.

use serde::{Deserialize, Serialize};

use db::{EntityStore, Existing, Scope};

use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// 1-based.
    pub page_num: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: 100,
        }
    }
}

impl PageRequest {
    pub fn new(page_num: u32, page_size: u32) -> EngineResult<Self> {
        let request = Self {
            page_num,
            page_size,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.page_num < 1 {
            return Err(EngineError::Validation(format!(
                "pageNum must be at least 1, got {}",
                self.page_num
            )));
        }
        if self.page_size < 1 {
            return Err(EngineError::Validation(format!(
                "pageSize must be at least 1, got {}",
                self.page_size
            )));
        }
        Ok(())
    }

    /// Index of the first item of this page in the full ordered collection.
    pub fn offset(&self) -> usize {
        (self.page_num as usize - 1).saturating_mul(self.page_size as usize)
    }

    fn next(&self) -> Self {
        Self {
            page_num: self.page_num.saturating_add(1),
            ..*self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_hits: usize,
}

/// Items `[(page_num-1)*page_size, page_num*page_size)` of `scope`.
pub fn page<E>(
    store: &dyn EntityStore<E>,
    scope: &Scope,
    request: PageRequest,
) -> EngineResult<Page<Existing<E>>> {
    request.validate()?;
    let (items, total_hits) =
        store.list_window(scope, request.offset(), request.page_size as usize)?;
    Ok(Page { items, total_hits })
}

/// Every item of `scope`, fetched `page_size` at a time.
pub fn collect_all<E>(
    store: &dyn EntityStore<E>,
    scope: &Scope,
    page_size: u32,
) -> EngineResult<Vec<Existing<E>>> {
    let mut request = PageRequest::new(1, page_size)?;
    let mut all = Vec::new();
    loop {
        let Page { items, total_hits } = page(store, scope, request)?;
        let fetched = items.len();
        all.extend(items);
        // Stop on a short page too, in case rows were deleted meanwhile.
        if fetched < page_size as usize || request.offset() + fetched >= total_hits {
            return Ok(all);
        }
        request = request.next();
    }
}
