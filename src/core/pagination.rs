//! Page slicing of filtered listings.
use crate::core::filter::{FilterState, RegionSelection};
use crate::core::model::PriceRecord;
use anyhow::{Result, anyhow};
use std::fmt::Display;
use std::str::FromStr;

/// Page sizes a listing can be displayed with.
pub const PAGE_SIZES: [usize; 4] = [5, 10, 25, 50];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(usize);

impl PageSize {
    pub fn new(size: usize) -> Result<Self> {
        if PAGE_SIZES.contains(&size) {
            Ok(PageSize(size))
        } else {
            Err(anyhow!(
                "Invalid page size {size}, expected one of {:?}",
                PAGE_SIZES
            ))
        }
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

impl FromStr for PageSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let size = s
            .trim()
            .parse::<usize>()
            .map_err(|_| anyhow!("Invalid page size: {}", s))?;
        PageSize::new(size)
    }
}

impl Display for PageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of pages needed for `total` items. An empty listing still has one page.
pub fn page_count(total: usize, size: PageSize) -> usize {
    total.div_ceil(size.get()).max(1)
}

#[derive(Debug, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// Index actually shown, after clamping.
    pub index: usize,
    pub page_count: usize,
    pub total: usize,
}

/// Returns the slice `[index*size, index*size+size)`. An index past the last
/// page is clamped to the last page instead of yielding an empty slice.
pub fn paginate<T>(items: &[T], index: usize, size: PageSize) -> Page<'_, T> {
    let pages = page_count(items.len(), size);
    let index = index.min(pages - 1);
    let start = index * size.get();
    let end = (start + size.get()).min(items.len());
    Page {
        items: &items[start.min(items.len())..end],
        index,
        page_count: pages,
        total: items.len(),
    }
}

/// Filter and paging state of a price listing. Any filter change returns the
/// listing to the first page.
#[derive(Debug, Clone, Default)]
pub struct ListingView {
    filter: FilterState,
    page_index: usize,
    page_size: PageSize,
}

#[derive(Debug, PartialEq)]
pub struct ListingPage<'a> {
    pub rows: Vec<&'a PriceRecord>,
    pub index: usize,
    pub page_count: usize,
    pub total_matches: usize,
}

impl ListingView {
    pub fn new(page_size: PageSize) -> Self {
        ListingView {
            page_size,
            ..Default::default()
        }
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
        self.page_index = 0;
    }

    pub fn set_region(&mut self, region: RegionSelection) {
        self.filter.region = region;
        self.page_index = 0;
    }

    pub fn set_products(&mut self, products: Vec<String>) {
        self.filter.products = products;
        self.page_index = 0;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.search = search.into();
        self.page_index = 0;
    }

    pub fn set_page_size(&mut self, size: PageSize) {
        self.page_size = size;
        self.page_index = 0;
    }

    pub fn reset_filters(&mut self) {
        self.set_filter(FilterState::default());
    }

    pub fn go_to_page(&mut self, index: usize) {
        self.page_index = index;
    }

    /// Filters `records` and returns the current page. If the stored index no
    /// longer exists it is clamped and remembered.
    pub fn view<'a>(&mut self, records: &'a [PriceRecord]) -> ListingPage<'a> {
        let filtered = self.filter.apply(records);
        let page = paginate(&filtered, self.page_index, self.page_size);
        self.page_index = page.index;
        ListingPage {
            rows: page.items.to_vec(),
            index: page.index,
            page_count: page.page_count,
            total_matches: page.total,
        }
    }
}
