//! Storefront catalog browsing: filters, sorting, paging and facets.
//!
//! The catalog is small enough (a few hundred handmade pieces) that the
//! storefront loads every active product once, caches it, and runs
//! [`CatalogQuery::apply`] in memory for each request.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::product::{Category, Material, Product};
use crate::types::Money;

/// Default number of products per page.
pub const DEFAULT_PER_PAGE: u32 = 24;

/// Largest page size a client may request.
pub const MAX_PER_PAGE: u32 = 60;

/// Sort order for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSort {
    /// Featured pieces first (by placement), then newest.
    #[default]
    Featured,
    PriceAsc,
    PriceDesc,
    Newest,
    Name,
}

impl CatalogSort {
    /// Parse a sort value from a URL.
    ///
    /// Accepts both the storefront's dropdown spelling (`price-ascending`) and
    /// the API spelling (`price_asc`). Unknown values fall back to
    /// [`CatalogSort::Featured`].
    #[must_use]
    pub fn from_param(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "price-asc" | "price-ascending" | "price-low-high" => Self::PriceAsc,
            "price-desc" | "price-descending" | "price-high-low" => Self::PriceDesc,
            "newest" | "created-descending" | "date" => Self::Newest,
            "name" | "name-ascending" | "title-ascending" | "alpha" => Self::Name,
            _ => Self::Featured,
        }
    }
}

impl<'de> Deserialize<'de> for CatalogSort {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_param(&value))
    }
}

/// Deserialize blank query values as `None`, so cleared filter inputs are
/// ignored rather than rejected.
///
/// # Errors
///
/// Returns the parse error for a non-blank value `T` does not accept.
pub fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn blank_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(empty_string_as_none(deserializer)?.unwrap_or(false))
}

/// Browse filters, as parsed from the storefront query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogQuery {
    #[serde(deserialize_with = "empty_string_as_none")]
    pub material: Option<Material>,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub gem_color: Option<String>,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub category: Option<Category>,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub min_price: Option<Decimal>,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub max_price: Option<Decimal>,
    #[serde(alias = "in_stock", deserialize_with = "blank_as_false")]
    pub in_stock_only: bool,
    pub sort: CatalogSort,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub page: Option<u32>,
    #[serde(deserialize_with = "empty_string_as_none")]
    pub per_page: Option<u32>,
}

/// One page of catalog results with facet values for the filter sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogPage {
    pub products: Vec<Product>,
    /// Number of products matching the filters (across all pages).
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub available_materials: Vec<Material>,
    pub available_gem_colors: Vec<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

impl CatalogQuery {
    /// The 1-based page, clamped to at least 1.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// The page size, clamped to `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// Whether `product` passes every filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if !product.is_visible() {
            return false;
        }
        if self.material.is_some_and(|m| m != product.material) {
            return false;
        }
        if self.category.is_some_and(|c| c != product.category) {
            return false;
        }
        if let Some(wanted) = self.gem_color.as_deref().map(str::trim)
            && !wanted.is_empty()
            && !product
                .gem_color
                .as_deref()
                .is_some_and(|color| color.eq_ignore_ascii_case(wanted))
        {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price.amount() < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| product.price.amount() > max) {
            return false;
        }
        !(self.in_stock_only && !product.in_stock())
    }

    /// Filter, sort and page `products`.
    #[must_use]
    pub fn apply(&self, products: &[Product]) -> CatalogPage {
        let mut matching: Vec<&Product> = products.iter().filter(|p| self.matches(p)).collect();

        let available_materials: Vec<Material> = matching
            .iter()
            .map(|p| p.material)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let available_gem_colors = gem_color_facet(&matching);
        let min_price = matching.iter().map(|p| p.price).min();
        let max_price = matching.iter().map(|p| p.price).max();

        sort_products(&mut matching, self.sort);

        let total = matching.len();
        let per_page = self.per_page();
        let page = self.page();
        let total_pages = u32::try_from(total.div_ceil(per_page as usize))
            .unwrap_or(u32::MAX)
            .max(1);
        let offset = (page as usize - 1).saturating_mul(per_page as usize);

        let products = matching
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .cloned()
            .collect();

        CatalogPage {
            products,
            total,
            page,
            per_page,
            total_pages,
            available_materials,
            available_gem_colors,
            min_price,
            max_price,
        }
    }
}

/// Distinct gem colors, deduplicated case-insensitively and sorted.
fn gem_color_facet(products: &[&Product]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut colors = Vec::new();
    for color in products.iter().filter_map(|p| p.gem_color.as_deref()) {
        if seen.insert(color.to_lowercase()) {
            colors.push(color.to_owned());
        }
    }
    colors.sort_by_key(|c| c.to_lowercase());
    colors
}

fn sort_products(products: &mut [&Product], sort: CatalogSort) {
    products.sort_by(|a, b| compare(a, b, sort).then_with(|| a.id.cmp(&b.id)));
}

fn compare(a: &Product, b: &Product, sort: CatalogSort) -> Ordering {
    match sort {
        CatalogSort::Featured => b
            .featured
            .cmp(&a.featured)
            .then_with(|| {
                if a.featured && b.featured {
                    placement_order(a.featured_order, b.featured_order)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| b.created_at.cmp(&a.created_at)),
        CatalogSort::PriceAsc => a.price.cmp(&b.price),
        CatalogSort::PriceDesc => b.price.cmp(&a.price),
        CatalogSort::Newest => b.created_at.cmp(&a.created_at),
        CatalogSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    }
}

/// Explicit placements first, ascending; unplaced last.
fn placement_order(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Featured, visible products in placement order, then by name.
#[must_use]
pub fn featured(products: &[Product]) -> Vec<Product> {
    let mut featured: Vec<&Product> = products
        .iter()
        .filter(|p| p.featured && p.is_visible())
        .collect();
    featured.sort_by(|a, b| {
        placement_order(a.featured_order, b.featured_order)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.id.cmp(&b.id))
    });
    featured.into_iter().cloned().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::types::{ProductId, ProductStatus};

    fn product(id: i64, name: &str, cents: i64, material: Material) -> Product {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::days(id);
        Product {
            id: ProductId::new(id),
            slug: crate::product::slugify(name),
            name: name.to_owned(),
            description: "Handmade.".to_owned(),
            category: Category::Rings,
            material,
            gem_type: None,
            gem_color: None,
            size: None,
            price: Money::from_cents(cents),
            stock: 1,
            status: ProductStatus::Active,
            featured: false,
            featured_order: None,
            images: vec![],
            created_at: created,
            updated_at: created,
        }
    }

    fn shelf() -> Vec<Product> {
        let mut garnet = product(1, "Garnet Band", 12_000, Material::Gold);
        garnet.gem_color = Some("Red".into());
        let mut ruby = product(2, "Ruby Drop", 30_000, Material::Gold);
        ruby.gem_color = Some("red".into());
        ruby.featured = true;
        ruby.featured_order = Some(1);
        let mut opal = product(3, "Opal Cuff", 9_000, Material::Silver);
        opal.gem_color = Some("White".into());
        opal.stock = 0;
        let mut draft = product(4, "Secret", 5_000, Material::Silver);
        draft.status = ProductStatus::Draft;
        let mut pearl = product(5, "Pearl Studs", 9_000, Material::Platinum);
        pearl.featured = true;
        pearl.featured_order = Some(0);
        vec![garnet, ruby, opal, draft, pearl]
    }

    fn ids(page: &CatalogPage) -> Vec<i64> {
        page.products.iter().map(|p| p.id.as_i64()).collect()
    }

    #[test]
    fn hides_non_active_products() {
        let page = CatalogQuery::default().apply(&shelf());
        assert_eq!(page.total, 4);
        assert!(!ids(&page).contains(&4));
    }

    #[test]
    fn featured_sort_puts_placements_first_then_newest() {
        let page = CatalogQuery::default().apply(&shelf());
        assert_eq!(ids(&page), [5, 2, 3, 1]);
    }

    #[test]
    fn filters_are_conjunctive_and_case_insensitive() {
        let query = CatalogQuery {
            material: Some(Material::Gold),
            gem_color: Some("RED".into()),
            max_price: Some(Decimal::new(200, 0)),
            ..CatalogQuery::default()
        };
        assert_eq!(ids(&query.apply(&shelf())), [1]);
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let query = CatalogQuery {
            min_price: Some(Decimal::new(90, 0)),
            max_price: Some(Decimal::new(120, 0)),
            sort: CatalogSort::PriceAsc,
            ..CatalogQuery::default()
        };
        assert_eq!(ids(&query.apply(&shelf())), [3, 5, 1]);
    }

    #[test]
    fn in_stock_only_drops_sold_out() {
        let query = CatalogQuery {
            in_stock_only: true,
            ..CatalogQuery::default()
        };
        assert!(!ids(&query.apply(&shelf())).contains(&3));
    }

    #[test]
    fn price_ties_break_by_id() {
        let query = CatalogQuery {
            sort: CatalogSort::PriceDesc,
            ..CatalogQuery::default()
        };
        assert_eq!(ids(&query.apply(&shelf())), [2, 1, 3, 5]);
    }

    #[test]
    fn facets_cover_filtered_set_before_paging() {
        let query = CatalogQuery {
            per_page: Some(1),
            ..CatalogQuery::default()
        };
        let page = query.apply(&shelf());
        assert_eq!(page.products.len(), 1);
        assert_eq!(page.total_pages, 4);
        assert_eq!(
            page.available_materials,
            [Material::Gold, Material::Silver, Material::Platinum]
        );
        assert_eq!(page.available_gem_colors, ["Red", "White"]);
        assert_eq!(page.min_price, Some(Money::from_cents(9_000)));
        assert_eq!(page.max_price, Some(Money::from_cents(30_000)));
    }

    #[test]
    fn paging_is_clamped() {
        let query = CatalogQuery {
            page: Some(0),
            per_page: Some(500),
            ..CatalogQuery::default()
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), MAX_PER_PAGE);

        let past_end = CatalogQuery {
            page: Some(9),
            ..CatalogQuery::default()
        };
        let page = past_end.apply(&shelf());
        assert!(page.products.is_empty());
        assert_eq!(page.total, 4);
    }

    #[test]
    fn sort_params() {
        assert_eq!(CatalogSort::from_param("price-ascending"), CatalogSort::PriceAsc);
        assert_eq!(CatalogSort::from_param("price_desc"), CatalogSort::PriceDesc);
        assert_eq!(CatalogSort::from_param("Name"), CatalogSort::Name);
        assert_eq!(CatalogSort::from_param("bogus"), CatalogSort::Featured);
    }

    #[test]
    fn featured_list_orders_by_placement() {
        let mut products = shelf();
        products[0].featured = true;
        let featured = featured(&products);
        let names: Vec<&str> = featured.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Pearl Studs", "Ruby Drop", "Garnet Band"]);
    }

    #[test]
    fn blank_query_values_are_unset() {
        let query: CatalogQuery = serde_json::from_value(serde_json::json!({
            "material": "",
            "min_price": " ",
            "in_stock": "",
            "page": ""
        }))
        .unwrap();
        assert_eq!(query, CatalogQuery::default());

        let query: CatalogQuery = serde_json::from_value(serde_json::json!({
            "material": "gold",
            "min_price": "40",
            "in_stock": "true"
        }))
        .unwrap();
        assert_eq!(query.material, Some(Material::Gold));
        assert_eq!(query.min_price, Some(Decimal::new(40, 0)));
        assert!(query.in_stock_only);

        let bad = serde_json::from_value::<CatalogQuery>(serde_json::json!({ "material": "tin" }));
        assert!(bad.is_err());
    }
}
