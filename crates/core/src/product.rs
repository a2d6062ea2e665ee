//! Catalog products and the admin editor payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text_enum;
use crate::types::{Money, ProductId, ProductStatus};
use crate::validation::{FieldError, ValidationErrors, non_blank};

/// Maximum length of a product name.
pub const MAX_NAME_LENGTH: usize = 120;

/// Maximum number of images attached to one product.
pub const MAX_IMAGES: usize = 10;

text_enum! {
    /// Storefront category.
    pub enum Category {
        Rings => "rings",
        Necklaces => "necklaces",
        Earrings => "earrings",
        Bracelets => "bracelets",
        Pendants => "pendants",
    }
}

text_enum! {
    /// Primary metal of a piece.
    pub enum Material {
        Gold => "gold",
        Silver => "silver",
        RoseGold => "rose_gold",
        Platinum => "platinum",
        Brass => "brass",
        Copper => "copper",
    }
}

/// A catalog product as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub material: Material,
    pub gem_type: Option<String>,
    pub gem_color: Option<String>,
    pub size: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub status: ProductStatus,
    pub featured: bool,
    pub featured_order: Option<i32>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether the storefront lists this product.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Whether at least one unit can be sold.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// The first image, used for cart thumbnails.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Product editor payload, as posted by the admin UI or loaded from seed YAML.
///
/// Optional text fields treat blanks as absent. `slug` may be omitted, in
/// which case it is derived from `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub slug: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub material: Material,
    #[serde(default)]
    pub gem_type: Option<String>,
    #[serde(default)]
    pub gem_color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub featured_order: Option<i32>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A [`ProductInput`] that passed validation, with every field normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedProduct {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub material: Material,
    pub gem_type: Option<String>,
    pub gem_color: Option<String>,
    pub size: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub status: ProductStatus,
    pub featured: bool,
    pub featured_order: Option<i32>,
    pub images: Vec<String>,
}

impl ProductInput {
    /// Validate and normalize the payload.
    ///
    /// # Errors
    ///
    /// Returns every field error found, not just the first.
    pub fn validate(self) -> Result<ValidatedProduct, Vec<FieldError>> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim().to_owned();
        errors.require("name", &name);
        errors.max_chars("name", &name, MAX_NAME_LENGTH);

        let description = self.description.trim().to_owned();
        errors.require("description", &description);

        if self.price.amount() <= rust_decimal::Decimal::ZERO {
            errors.push("price", "must be greater than zero");
        }

        if self.stock < 0 {
            errors.push("stock", "cannot be negative");
        }

        let slug = match non_blank(self.slug) {
            Some(slug) => slug,
            None => slugify(&name),
        };
        if slug.is_empty() {
            if !errors.has("name") {
                errors.push("slug", "could not be derived from the name");
            }
        } else if !is_valid_slug(&slug) {
            errors.push(
                "slug",
                "may only contain lowercase letters, digits and single hyphens",
            );
        }

        let images: Vec<String> = self
            .images
            .into_iter()
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty())
            .collect();
        if images.len() > MAX_IMAGES {
            errors.push("images", format!("at most {MAX_IMAGES} images are allowed"));
        }

        if self.featured_order.is_some_and(|order| order < 0) {
            errors.push("featured_order", "cannot be negative");
        }

        errors.into_result()?;

        Ok(ValidatedProduct {
            slug,
            name,
            description,
            category: self.category,
            material: self.material,
            gem_type: non_blank(self.gem_type),
            gem_color: non_blank(self.gem_color),
            size: non_blank(self.size),
            price: self.price,
            stock: self.stock,
            status: self.status,
            featured: self.featured,
            featured_order: if self.featured { self.featured_order } else { None },
            images,
        })
    }
}

/// Turn a product name into a URL slug.
///
/// ASCII letters and digits are kept (lowercased); every other run of
/// characters becomes a single hyphen.
///
/// ```
/// use atelier_core::product::slugify;
///
/// assert_eq!(slugify("Rose Gold  Band, 6mm!"), "rose-gold-band-6mm");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Whether `slug` is lowercase `[a-z0-9]` words joined by single hyphens.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.split('-').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}
