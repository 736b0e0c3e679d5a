//! This modules defines the common functionality for paging data.

use maud::{Markup, html};
use serde::Deserialize;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of products per page on the shop and product list pages.
    pub shop_page_size: u64,
    /// The number of products per page on the admin product list page.
    pub admin_page_size: u64,
    /// The maximum number of pages to show in the pagination indicator.
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            shop_page_size: 2,
            admin_page_size: 3,
            max_pages: 5,
        }
    }
}

/// The query string of a paginated page.
///
/// The page is kept as a string so that garbage such as `?page=abc` falls
/// back to the default page instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// The requested page, or `default_page` if it is missing, not a number, or zero.
    pub fn page_or(&self, default_page: u64) -> u64 {
        self.page
            .as_deref()
            .and_then(|page| page.trim().parse::<u64>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(default_page)
    }
}

/// The row offset of the first item on `page`.
///
/// Saturates for page numbers too large to have an offset, which puts them
/// past the last page.
pub fn page_offset(page: u64, page_size: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(page_size)
}

/// The number of pages needed to show `item_count` items.
pub fn page_count(item_count: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }

    item_count.div_ceil(page_size)
}

#[derive(Debug, PartialEq, Eq)]
pub enum PaginationIndicator {
    Page(u64),
    CurrPage(u64),
    Ellipsis,
    NextButton(u64),
    BackButton(u64),
}

pub fn create_pagination_indicators(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
) -> Vec<PaginationIndicator> {
    let map_page = |page| {
        if page == curr_page {
            PaginationIndicator::CurrPage(page)
        } else {
            PaginationIndicator::Page(page)
        }
    };

    let mut indicators: Vec<PaginationIndicator> = if page_count <= max_pages {
        (1..=page_count).map(map_page).collect()
    } else if curr_page <= (max_pages / 2) {
        (1..=max_pages).map(map_page).collect()
    } else if curr_page > (page_count - max_pages / 2) {
        ((page_count - max_pages + 1)..=page_count)
            .map(map_page)
            .collect()
    } else {
        ((curr_page - max_pages / 2)..=(curr_page + max_pages / 2))
            .map(map_page)
            .collect()
    };

    if page_count > max_pages {
        if curr_page > (max_pages / 2) + 1 {
            indicators.insert(0, PaginationIndicator::Page(1));
            indicators.insert(1, PaginationIndicator::Ellipsis);
        }

        if curr_page < (page_count - max_pages / 2) {
            indicators.push(PaginationIndicator::Ellipsis);
            indicators.push(PaginationIndicator::Page(page_count));
        }
    }

    if curr_page > 1 {
        indicators.insert(0, PaginationIndicator::BackButton(curr_page - 1));
    }

    if curr_page < page_count {
        indicators.push(PaginationIndicator::NextButton(curr_page + 1));
    }

    indicators
}

/// Render the page links for a paginated list served at `endpoint`.
pub fn pagination_view(endpoint: &str, indicators: &[PaginationIndicator]) -> Markup {
    let page_link = |page: &u64| format!("{endpoint}?page={page}");
    let link_style = "flex items-center justify-center px-3 h-8 leading-tight \
        text-gray-500 bg-white border border-gray-300 hover:bg-gray-100 \
        hover:text-gray-700 dark:bg-gray-800 dark:border-gray-700 \
        dark:text-gray-400 dark:hover:bg-gray-700 dark:hover:text-white";
    let current_style = "flex items-center justify-center px-3 h-8 \
        text-blue-600 border border-gray-300 bg-blue-50 dark:border-gray-700 \
        dark:bg-gray-700 dark:text-white";

    html! {
        @if !indicators.is_empty() {
            nav aria-label="Pagination" class="my-4"
            {
                ul class="pagination inline-flex -space-x-px text-sm"
                {
                    @for indicator in indicators {
                        li {
                            @match indicator {
                                PaginationIndicator::BackButton(page) => {
                                    a href=(page_link(page)) role="button" class=(link_style) { "Back" }
                                }
                                PaginationIndicator::Page(page) => {
                                    a href=(page_link(page)) class=(link_style) { (page) }
                                }
                                PaginationIndicator::CurrPage(page) => {
                                    p aria-current="page" class=(current_style) { (page) }
                                }
                                PaginationIndicator::Ellipsis => {
                                    p class=(link_style) { "..." }
                                }
                                PaginationIndicator::NextButton(page) => {
                                    a href=(page_link(page)) role="button" class=(link_style) { "Next" }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::pagination::{PaginationIndicator, create_pagination_indicators};

    #[test]
    fn shows_all_pages() {
        let max_pages = 5;
        let page_count = 5;
        let curr_page = 1;
        let want = [
            PaginationIndicator::CurrPage(1),
            PaginationIndicator::Page(2),
            PaginationIndicator::Page(3),
            PaginationIndicator::Page(4),
            PaginationIndicator::Page(5),
            PaginationIndicator::NextButton(2),
        ];

        let got = create_pagination_indicators(curr_page, page_count, max_pages);

        assert_eq!(want, got.as_slice());
    }

    #[test]
    fn shows_both_buttons_and_trailing_ellipsis() {
        let max_pages = 5;
        let page_count = 10;
        let curr_page = 3;
        let want = [
            PaginationIndicator::BackButton(2),
            PaginationIndicator::Page(1),
            PaginationIndicator::Page(2),
            PaginationIndicator::CurrPage(3),
            PaginationIndicator::Page(4),
            PaginationIndicator::Page(5),
            PaginationIndicator::Ellipsis,
            PaginationIndicator::Page(10),
            PaginationIndicator::NextButton(4),
        ];

        let got = create_pagination_indicators(curr_page, page_count, max_pages);

        assert_eq!(want, got.as_slice());
    }

    #[test]
    fn shows_page_subset_on_right() {
        let max_pages = 5;
        let page_count = 10;
        let curr_page = 10;
        let want = [
            PaginationIndicator::BackButton(9),
            PaginationIndicator::Page(1),
            PaginationIndicator::Ellipsis,
            PaginationIndicator::Page(6),
            PaginationIndicator::Page(7),
            PaginationIndicator::Page(8),
            PaginationIndicator::Page(9),
            PaginationIndicator::CurrPage(10),
        ];

        let got = create_pagination_indicators(curr_page, page_count, max_pages);

        assert_eq!(want, got.as_slice());
    }

    #[test]
    fn no_indicators_for_empty_list() {
        let got = create_pagination_indicators(1, 0, 5);

        assert!(got.is_empty(), "want no indicators, got {got:?}");
    }
}
