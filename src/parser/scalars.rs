use std::sync::LazyLock;

use scraper::{Html, Selector};

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1.jum-heading.h3").unwrap());
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.current-price").unwrap());
static WEIGHT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2.jum-heading.product-subtitle.h6").unwrap());
static PRICE_PER_UNIT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.price-per-unit").unwrap());
static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

/// The five independently optional page fields. A missing element leaves
/// its field at None without touching the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarFields {
    pub title: Option<String>,
    pub price: Option<String>,
    pub weight: Option<String>,
    pub price_per_unit: Option<String>,
    pub image_url: Option<String>,
}

/// Pull the five scalar fields out of a product page. Each lookup stands
/// alone; the result is valid even when every field is absent.
pub fn extract_scalars(doc: &Html) -> ScalarFields {
    ScalarFields {
        title: first_text(doc, &TITLE),
        price: first_text(doc, &PRICE),
        weight: first_text(doc, &WEIGHT),
        price_per_unit: first_text(doc, &PRICE_PER_UNIT),
        image_url: doc
            .select(&IMAGE)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string),
    }
}

fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(fixture: &str) -> Html {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        Html::parse_document(&html)
    }

    #[test]
    fn full_page() {
        let doc = parse("kipfilet");
        let s = extract_scalars(&doc);
        assert_eq!(s.title.as_deref(), Some("Jumbo Scharrelkip Filet 800g"));
        assert_eq!(s.price.as_deref(), Some("€ 8,49"));
        assert_eq!(s.weight.as_deref(), Some("800 g"));
        assert_eq!(s.price_per_unit.as_deref(), Some("€ 10,61/kg"));
        assert_eq!(
            s.image_url.as_deref(),
            Some("https://jumbo.com/images/515026BAK.jpg")
        );
    }

    #[test]
    fn missing_title_leaves_others_intact() {
        let doc = parse("no_title");
        let s = extract_scalars(&doc);
        assert_eq!(s.title, None);
        assert!(s.price.is_some());
        assert!(s.weight.is_some());
        assert!(s.price_per_unit.is_some());
        assert!(s.image_url.is_some());
    }

    #[test]
    fn missing_price_is_isolated() {
        let doc = Html::parse_document(
            r#"<html><body>
                 <h1 class="jum-heading h3"> Kipfilet </h1>
                 <img src="/img/kip.jpg">
               </body></html>"#,
        );
        let s = extract_scalars(&doc);
        assert_eq!(s.price, None);
        assert_eq!(s.price_per_unit, None);
        assert_eq!(s.title.as_deref(), Some("Kipfilet"));
        assert_eq!(s.image_url.as_deref(), Some("/img/kip.jpg"));
    }

    #[test]
    fn image_without_src_is_absent() {
        let doc = Html::parse_document("<html><body><img alt='kip'></body></html>");
        assert_eq!(extract_scalars(&doc).image_url, None);
    }

    #[test]
    fn empty_document_yields_all_none() {
        let doc = parse("empty");
        let s = extract_scalars(&doc);
        assert_eq!(
            s,
            ScalarFields {
                title: None,
                price: None,
                weight: None,
                price_per_unit: None,
                image_url: None,
            }
        );
    }

    #[test]
    fn idempotent_on_same_document() {
        let doc = parse("kipfilet");
        assert_eq!(extract_scalars(&doc), extract_scalars(&doc));
    }
}
