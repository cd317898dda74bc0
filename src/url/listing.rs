use crate::config::ListingConfig;
use crate::{UrlError, UrlResult};
use url::Url;

/// Builds the URL of one listing page
///
/// The price and page parameters replace any existing pairs of the same name;
/// every other query pair in the base URL is kept in order.
///
/// # Examples
///
/// ```
/// use listing_scraper::url::listing_page_url;
///
/// let url = listing_page_url("https://auto.example/moskva/cars/all/", "price_to", Some(1_000_000), "page", 2).unwrap();
/// assert_eq!(url.as_str(), "https://auto.example/moskva/cars/all/?price_to=1000000&page=2");
/// ```
pub fn listing_page_url(
    base_url: &str,
    price_param: &str,
    max_price: Option<u64>,
    page_param: &str,
    page: u32,
) -> UrlResult<Url> {
    let mut url = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != price_param && key != page_param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        if let Some(price) = max_price {
            pairs.append_pair(price_param, &price.to_string());
        }
        pairs.append_pair(page_param, &page.to_string());
    }

    Ok(url)
}

/// Builds a listing page URL from the listing configuration
pub fn listing_url_for(config: &ListingConfig, page: u32) -> UrlResult<Url> {
    listing_page_url(
        &config.base_url,
        &config.price_param,
        config.max_price,
        &config.page_param,
        page,
    )
}

/// Reads the page number out of a pagination href
pub fn page_number_from_href(href: &str, page_param: &str, base: &Url) -> Option<u32> {
    let url = base.join(href.trim()).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == page_param)
        .and_then(|(_, value)| value.parse().ok())
}
