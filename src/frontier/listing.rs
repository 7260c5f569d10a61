use crate::config::{CategoryEntry, SiteConfig};
use crate::frontier::{Frontier, WorkItem};
use crate::UrlError;
use url::Url;

/// Number of listing pages to request for a category
///
/// `ceil(item_count / page_size)` pages hold every advert; one guard page is
/// added because the count is sampled before the crawl and adverts keep
/// arriving. A page size of zero is treated as one.
pub fn listing_page_count(item_count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = item_count.div_ceil(page_size) + 1;
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Builds every listing page URL for the configured categories
///
/// Pages are numbered from 1. `max_pages` caps the count per category.
pub fn listing_urls(
    site: &SiteConfig,
    categories: &[CategoryEntry],
    max_pages: Option<u32>,
) -> Result<Frontier, UrlError> {
    let base = Url::parse(&site.base_url).map_err(|e| UrlError::Parse(e.to_string()))?;
    let mut frontier = Frontier::new();

    for category in categories {
        let mut pages = listing_page_count(category.item_count, site.page_size);
        if let Some(cap) = max_pages {
            pages = pages.min(cap);
        }

        let path = site.listing_path.replace("{category}", &category.id);
        let mut category_url = base
            .join(&path)
            .map_err(|e| UrlError::Parse(format!("{}: {}", path, e)))?;

        tracing::debug!(
            "Category {}: {} adverts, {} listing pages",
            category.id,
            category.item_count,
            pages
        );

        for page in 1..=pages {
            category_url
                .query_pairs_mut()
                .clear()
                .append_pair(&site.page_param, &page.to_string());
            frontier.insert(WorkItem::from(category_url.clone()));
        }
    }

    Ok(frontier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: &str, item_count: u64) -> CategoryEntry {
        CategoryEntry {
            id: id.to_string(),
            item_count,
        }
    }

    #[test]
    fn test_page_count_adds_guard_page() {
        assert_eq!(listing_page_count(15, 20), 2);
        assert_eq!(listing_page_count(25, 20), 3);
        assert_eq!(listing_page_count(40, 20), 3);
        assert_eq!(listing_page_count(0, 20), 1);
    }

    #[test]
    fn test_page_count_zero_page_size() {
        assert_eq!(listing_page_count(3, 0), 4);
    }

    #[test]
    fn test_two_categories_scenario() {
        let site = SiteConfig::default();
        let frontier =
            listing_urls(&site, &[category("a", 15), category("b", 25)], None).unwrap();

        let urls: Vec<&str> = frontier.items().iter().map(WorkItem::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://kolesa.kz/cars/a/?page=1",
                "https://kolesa.kz/cars/a/?page=2",
                "https://kolesa.kz/cars/b/?page=1",
                "https://kolesa.kz/cars/b/?page=2",
                "https://kolesa.kz/cars/b/?page=3",
            ]
        );
    }

    #[test]
    fn test_max_pages_caps_each_category() {
        let site = SiteConfig::default();
        let frontier =
            listing_urls(&site, &[category("a", 1000), category("b", 5)], Some(2)).unwrap();

        assert_eq!(frontier.len(), 4);
    }

    #[test]
    fn test_custom_page_param() {
        let site = SiteConfig {
            base_url: "http://127.0.0.1:8080".to_string(),
            listing_path: "/list/{category}".to_string(),
            page_param: "p".to_string(),
            ..SiteConfig::default()
        };
        let frontier = listing_urls(&site, &[category("x", 1)], None).unwrap();

        assert_eq!(frontier.items()[0].as_str(), "http://127.0.0.1:8080/list/x?p=1");
    }
}
