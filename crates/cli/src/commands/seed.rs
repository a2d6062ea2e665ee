//! Seed the catalog from a YAML file.
//!
//! The file is a list of product editor payloads:
//!
//! ```yaml
//! - name: Tide Ring
//!   description: Hammered band with a single opal.
//!   category: rings
//!   material: silver
//!   gem_type: Opal
//!   price: "145.00"
//!   stock: 3
//!   status: active
//! ```
//!
//! Every record is validated before the database is touched; one bad record
//! aborts the whole run. Existing slugs are skipped unless `--replace` is
//! given, in which case they are overwritten.

use std::path::Path;

use thiserror::Error;
use tracing::{error, info};

use atelier_core::product::ProductInput;
use atelier_core::product::ValidatedProduct;
use atelier_db::{PgProductRepository, ProductRepository, RepositoryError};

use super::{MissingEnvVar, database_url};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    MissingEnvVar(#[from] MissingEnvVar),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} invalid product record(s)")]
    Invalid(usize),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What a seeding run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub skipped: usize,
}

/// Parse and validate every record, logging each failure.
///
/// # Errors
///
/// Returns `Yaml` for malformed input and `Invalid` if any record fails
/// validation.
pub fn parse_products(yaml: &str) -> Result<Vec<ValidatedProduct>, SeedError> {
    let inputs: Vec<ProductInput> = serde_yaml::from_str(yaml)?;

    let mut products = Vec::with_capacity(inputs.len());
    let mut invalid = 0;
    for (index, input) in inputs.into_iter().enumerate() {
        let name = input.name.clone();
        match input.validate() {
            Ok(product) => products.push(product),
            Err(fields) => {
                invalid += 1;
                for field in fields {
                    error!(record = index + 1, name = %name, "{field}");
                }
            }
        }
    }

    if invalid > 0 {
        return Err(SeedError::Invalid(invalid));
    }
    Ok(products)
}

/// Write validated products through `repo`.
///
/// # Errors
///
/// Returns the first repository error; earlier records stay written.
pub async fn load(
    repo: &dyn ProductRepository,
    products: &[ValidatedProduct],
    replace: bool,
) -> Result<SeedSummary, RepositoryError> {
    let mut summary = SeedSummary::default();

    for product in products {
        match repo.get_by_slug(&product.slug).await? {
            Some(existing) if replace => {
                repo.update(existing.id, product).await?;
                summary.replaced += 1;
            }
            Some(_) => {
                info!(slug = %product.slug, "Skipping existing product");
                summary.skipped += 1;
            }
            None => {
                repo.create(product).await?;
                summary.inserted += 1;
            }
        }
    }

    Ok(summary)
}

/// Seed products from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or validated, or the
/// database write fails.
pub async fn products(file_path: &Path, replace: bool) -> Result<SeedSummary, SeedError> {
    info!(path = %file_path.display(), "Loading products from file");

    let yaml = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|source| SeedError::Read {
            path: file_path.display().to_string(),
            source,
        })?;

    let products = parse_products(&yaml)?;
    info!(count = products.len(), "Products validated");

    let pool = atelier_db::create_pool(&database_url()?).await?;
    let repo = PgProductRepository::new(pool);

    let summary = load(&repo, &products, replace).await?;
    info!(
        inserted = summary.inserted,
        replaced = summary.replaced,
        skipped = summary.skipped,
        "Seeding complete!"
    );
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use atelier_db::InMemoryStore;

    use super::*;

    const CATALOG: &str = r#"
- name: Tide Ring
  description: Hammered band with a single opal.
  category: rings
  material: silver
  gem_type: Opal
  price: "145.00"
  stock: 3
  status: active
- slug: ember-studs
  name: Ember Studs
  description: Garnet studs in rose gold.
  category: earrings
  material: rose_gold
  price: "98.50"
"#;

    #[test]
    fn parses_and_derives_slugs() {
        let products = parse_products(CATALOG).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].slug, "tide-ring");
        assert_eq!(products[1].slug, "ember-studs");
    }

    #[test]
    fn starter_catalog_is_valid() {
        let products = parse_products(include_str!("../../../../data/products.yaml")).unwrap();
        assert!(products.iter().any(|p| p.featured));
    }

    #[test]
    fn one_bad_record_rejects_the_file() {
        let yaml = format!(
            "{CATALOG}- name: Nameless\n  description: ''\n  category: rings\n  material: gold\n  price: \"0\"\n"
        );
        assert!(matches!(parse_products(&yaml), Err(SeedError::Invalid(1))));
    }

    #[tokio::test]
    async fn existing_slugs_are_skipped_unless_replacing() {
        let store = InMemoryStore::new();
        let products = parse_products(CATALOG).unwrap();

        let first = load(&store, &products, false).await.unwrap();
        assert_eq!(first.inserted, 2);

        let again = load(&store, &products, false).await.unwrap();
        assert_eq!(again.skipped, 2);
        assert_eq!(again.inserted, 0);

        let replaced = load(&store, &products, true).await.unwrap();
        assert_eq!(replaced.replaced, 2);
    }
}
