//! HTML extraction for listing and detail pages
//!
//! This module turns fetched HTML into crawl input and output:
//! - Detail links from a listing page
//! - One [`Record`] from an advert's detail page
//!
//! All selectors come from configuration, so a site layout change is a config
//! edit. Label/value parameter rows are resolved to named attribute fields
//! here, once, instead of travelling as a dictionary.

use crate::config::SelectorConfig;
use crate::storage::{Record, VehicleAttributes};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Errors raised when a page does not have the expected structure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("{url}: required field '{field}' not found")]
    MissingField { url: String, field: &'static str },
}

/// Site-specific extraction rules
pub trait Extractor: Send + Sync {
    /// Returns the raw `href` of every advert linked from a listing page
    fn detail_links(&self, listing_html: &str) -> Vec<String>;

    /// Builds the record for one advert detail page
    fn extract_record(&self, url: &str, detail_html: &str) -> Result<Record, ExtractError>;
}

/// [`Extractor`] driven by CSS selectors
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    listing_link: Selector,
    name: Selector,
    price: Selector,
    year: Selector,
    city: Selector,
    parameter_row: Selector,
    parameter_label: Selector,
    parameter_value: Selector,
}

impl SelectorExtractor {
    pub fn new(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            listing_link: compile("listing-link", &config.listing_link)?,
            name: compile("name", &config.name)?,
            price: compile("price", &config.price)?,
            year: compile("year", &config.year)?,
            city: compile("city", &config.city)?,
            parameter_row: compile("parameter-row", &config.parameter_row)?,
            parameter_label: compile("parameter-label", &config.parameter_label)?,
            parameter_value: compile("parameter-value", &config.parameter_value)?,
        })
    }

    /// Collects the label/value parameter rows of a detail page
    fn parameters(&self, document: &Html) -> Vec<(String, String)> {
        document
            .select(&self.parameter_row)
            .filter_map(|row| {
                let label = first_text(row, &self.parameter_label)?;
                let value = first_text(row, &self.parameter_value)?;
                Some((label, value))
            })
            .collect()
    }
}

impl Extractor for SelectorExtractor {
    fn detail_links(&self, listing_html: &str) -> Vec<String> {
        let document = Html::parse_document(listing_html);
        document
            .select(&self.listing_link)
            .filter_map(|element| element.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn extract_record(&self, url: &str, detail_html: &str) -> Result<Record, ExtractError> {
        let document = Html::parse_document(detail_html);

        let year_text = select_text(&document, &self.year);
        let name = select_text(&document, &self.name)
            .map(|title| match &year_text {
                // The year is often rendered inside the title element
                Some(year) => clean_text(&title.replace(year.as_str(), " ")),
                None => title,
            })
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ExtractError::MissingField {
                url: url.to_string(),
                field: "name",
            })?;

        let parameters = self.parameters(&document);
        let mut attributes = VehicleAttributes::default();
        let mut city_parameter = None;
        for (label, value) in parameters {
            match AttributeLabel::from_label(&label) {
                Some(AttributeLabel::City) => city_parameter = Some(value),
                Some(field) => field.assign(&mut attributes, value),
                None => tracing::trace!("Ignoring parameter '{}' on {}", label, url),
            }
        }

        let mut record = Record::new(url);
        record.name = Some(name);
        record.year = year_text.as_deref().and_then(parse_year);
        record.price = select_text(&document, &self.price)
            .as_deref()
            .and_then(parse_price);
        record.city = select_text(&document, &self.city).or(city_parameter);
        record.attributes = attributes;
        Ok(record)
    }
}

/// Parameter labels as printed on the site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeLabel {
    City,
    Body,
    Engine,
    Mileage,
    Transmission,
    Drive,
    Steering,
    Color,
    CustomsCleared,
}

impl AttributeLabel {
    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_end_matches(':').trim().to_lowercase();
        let field = match label.as_str() {
            "город" => Self::City,
            "кузов" => Self::Body,
            "объем двигателя, л" | "объем двигателя" => Self::Engine,
            "пробег" => Self::Mileage,
            "коробка передач" => Self::Transmission,
            "привод" => Self::Drive,
            "руль" => Self::Steering,
            "цвет" => Self::Color,
            "растаможен в казахстане" | "растаможен" => Self::CustomsCleared,
            _ => return None,
        };
        Some(field)
    }

    fn assign(self, attributes: &mut VehicleAttributes, value: String) {
        let slot = match self {
            Self::City => return,
            Self::Body => &mut attributes.body,
            Self::Engine => &mut attributes.engine,
            Self::Mileage => &mut attributes.mileage,
            Self::Transmission => &mut attributes.transmission,
            Self::Drive => &mut attributes.drive,
            Self::Steering => &mut attributes.steering,
            Self::Color => &mut attributes.color,
            Self::CustomsCleared => &mut attributes.customs_cleared,
        };
        *slot = Some(value);
    }
}

fn compile(field: &'static str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|_| ConfigError::InvalidSelector {
        field,
        selector: css.to_string(),
    })
}

fn select_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|element| clean_text(&element.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .map(|child| clean_text(&child.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

/// Collapses all whitespace (including no-break spaces) to single spaces
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keeps the digits of a price such as "12 500 000 ₸"
fn parse_price(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Takes the first run of four digits, e.g. "2018 г." or "2018, седан"
fn parse_year(text: &str) -> Option<u16> {
    let bytes = text.as_bytes();
    bytes
        .windows(4)
        .enumerate()
        .find(|(i, window)| {
            window.iter().all(u8::is_ascii_digit)
                && bytes.get(i + 4).map_or(true, |b| !b.is_ascii_digit())
                && (*i == 0 || !bytes[i - 1].is_ascii_digit())
        })
        .and_then(|(i, _)| text[i..i + 4].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> SelectorExtractor {
        SelectorExtractor::new(&SelectorConfig::default()).unwrap()
    }

    const LISTING: &str = r#"
        <html><body>
          <div class="a-card">
            <a class="list-link ddl_product_link" href="/a/show/101">Toyota Camry</a>
          </div>
          <div class="a-card">
            <a class="list-link ddl_product_link" href=" https://kolesa.kz/a/show/102 ">Lada</a>
          </div>
          <div class="banner"><a class="list-link" href="/promo">Promo</a></div>
          <a class="list-link ddl_product_link">no href</a>
        </body></html>
    "#;

    const DETAIL: &str = r#"
        <html><body>
          <h1 class="offer__title">
            <span itemprop="brand">Toyota</span>
            <span itemprop="name">Camry</span>
            <span class="year">2018</span>
          </h1>
          <div class="offer__price">12&nbsp;500&nbsp;000 ₸</div>
          <div class="offer__parameters">
            <dl><dt>Город</dt><dd>Алматы</dd></dl>
            <dl><dt>Кузов</dt><dd>седан</dd></dl>
            <dl><dt>Объем двигателя, л</dt><dd>2.5 (бензин)</dd></dl>
            <dl><dt>Пробег</dt><dd>85 000 км</dd></dl>
            <dl><dt>Коробка передач</dt><dd>автомат</dd></dl>
            <dl><dt>Привод</dt><dd>передний привод</dd></dl>
            <dl><dt>Руль</dt><dd>слева</dd></dl>
            <dl><dt>Цвет</dt><dd>белый</dd></dl>
            <dl><dt>Растаможен в Казахстане</dt><dd>Да</dd></dl>
            <dl><dt>VIN</dt><dd>hidden</dd></dl>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_detail_links() {
        let links = extractor().detail_links(LISTING);
        assert_eq!(links, vec!["/a/show/101", "https://kolesa.kz/a/show/102"]);
    }

    #[test]
    fn test_detail_links_empty_page() {
        let links = extractor().detail_links("<html><body></body></html>");
        assert!(links.is_empty());
    }

    #[test]
    fn test_extract_record() {
        let url = "https://kolesa.kz/a/show/101";
        let record = extractor()
            .extract_record(url, DETAIL)
            .unwrap();

        assert_eq!(record.url, url);
        assert_eq!(record.name.as_deref(), Some("Toyota Camry"));
        assert_eq!(record.year, Some(2018));
        assert_eq!(record.price, Some(12_500_000));
        // No `.offer__location` on the page, so the parameter row is used
        assert_eq!(record.city.as_deref(), Some("Алматы"));
        assert_eq!(record.coordinates, None);

        let attributes = &record.attributes;
        assert_eq!(attributes.body.as_deref(), Some("седан"));
        assert_eq!(attributes.engine.as_deref(), Some("2.5 (бензин)"));
        assert_eq!(attributes.mileage.as_deref(), Some("85 000 км"));
        assert_eq!(attributes.transmission.as_deref(), Some("автомат"));
        assert_eq!(attributes.drive.as_deref(), Some("передний привод"));
        assert_eq!(attributes.steering.as_deref(), Some("слева"));
        assert_eq!(attributes.color.as_deref(), Some("белый"));
        assert_eq!(attributes.customs_cleared.as_deref(), Some("Да"));
    }

    #[test]
    fn test_city_selector_wins_over_parameter() {
        let html = r#"<h1 class="offer__title">Lada Granta</h1>
            <div class="offer__location">Астана</div>
            <div class="offer__parameters"><dl><dt>Город</dt><dd>Алматы</dd></dl></div>"#;
        let record = extractor()
            .extract_record("https://kolesa.kz/a/show/1", html)
            .unwrap();
        assert_eq!(record.city.as_deref(), Some("Астана"));
        assert_eq!(record.year, None);
        assert_eq!(record.price, None);
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let err = extractor()
            .extract_record("https://kolesa.kz/a/show/1", "<html><p>Объявление удалено</p></html>")
            .unwrap_err();
        assert_eq!(
            err,
            ExtractError::MissingField {
                url: "https://kolesa.kz/a/show/1".to_string(),
                field: "name",
            }
        );
    }

    #[test]
    fn test_custom_selectors() {
        let config = SelectorConfig {
            listing_link: "a.card".to_string(),
            ..SelectorConfig::default()
        };
        let extractor = SelectorExtractor::new(&config).unwrap();
        let links = extractor.detail_links(r#"<a class="card" href="/a/show/7">x</a>"#);
        assert_eq!(links, vec!["/a/show/7"]);
    }

    #[test]
    fn test_invalid_selector() {
        let config = SelectorConfig {
            price: "div[".to_string(),
            ..SelectorConfig::default()
        };
        assert!(matches!(
            SelectorExtractor::new(&config),
            Err(ConfigError::InvalidSelector { field: "price", .. })
        ));
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2018 г."), Some(2018));
        assert_eq!(parse_year("  1999, седан"), Some(1999));
        assert_eq!(parse_year("123456"), None);
        assert_eq!(parse_year("год"), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("12\u{a0}500\u{a0}000 ₸"), Some(12_500_000));
        assert_eq!(parse_price("договорная"), None);
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(AttributeLabel::from_label(" Пробег: "), Some(AttributeLabel::Mileage));
        assert_eq!(AttributeLabel::from_label("ПРИВОД"), Some(AttributeLabel::Drive));
        assert_eq!(AttributeLabel::from_label("Наличие"), None);
    }
}
