//! Search index builder.
//!
//! Builds a fresh in-RAM index from the active catalog and content pages.

use std::time::Duration;

use tantivy::{Index, IndexWriter};
use tracing::{error, info, instrument, warn};

use atelier_core::product::Product;

use super::{DocType, SearchError, SearchFields, SearchIndex, TOKENIZER};
use crate::content::ContentStore;
use crate::services::CatalogService;

/// Per-thread writer budget; tantivy's minimum is 15 MB.
const WRITER_MEMORY_BYTES: usize = 20_000_000;

/// Spawn the background task that builds the index now and rebuilds it
/// every `interval`.
///
/// Failures are logged and the previous index keeps serving.
pub fn spawn_index_refresh(
    search_index: SearchIndex,
    catalog: CatalogService,
    content: ContentStore,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    info!(?interval, "Spawning background search index task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            refresh(&search_index, &catalog, &content).await;
        }
    })
}

async fn refresh(search_index: &SearchIndex, catalog: &CatalogService, content: &ContentStore) {
    let products = match catalog.active_products().await {
        Ok(products) => products,
        Err(e) => {
            warn!(error = %e, "Failed to load catalog for search index");
            return;
        }
    };

    let search = search_index.clone();
    let content = content.clone();
    let rebuilt = tokio::task::spawn_blocking(move || search.rebuild(&products, &content)).await;

    match rebuilt {
        Ok(Ok(docs)) => info!(docs, "Search index is ready"),
        Ok(Err(e)) => error!(error = %e, "Failed to build search index"),
        Err(e) => error!(error = %e, "Search index build task panicked"),
    }
}

/// Build an index over `products` and every content page.
///
/// # Errors
///
/// Returns an error if the writer cannot be created or the commit fails.
#[instrument(skip_all, fields(products = products.len(), pages = content.len()))]
pub fn build_index(
    products: &[Product],
    content: &ContentStore,
) -> Result<(Index, SearchFields), SearchError> {
    let (schema, fields) = SearchIndex::build_schema();
    let index = Index::create_in_ram(schema);

    index.tokenizers().register(
        TOKENIZER,
        tantivy::tokenizer::TextAnalyzer::builder(tantivy::tokenizer::SimpleTokenizer::default())
            .filter(tantivy::tokenizer::RemoveLongFilter::limit(40))
            .filter(tantivy::tokenizer::LowerCaser)
            .filter(tantivy::tokenizer::Stemmer::new(
                tantivy::tokenizer::Language::English,
            ))
            .build(),
    );

    let mut writer: IndexWriter = index
        .writer_with_num_threads(1, WRITER_MEMORY_BYTES)
        .map_err(|e| SearchError::Build(format!("Failed to create writer: {e}")))?;

    let products_count = index_products(products, &writer, &fields);
    let pages_count = index_pages(content, &writer, &fields);

    writer
        .commit()
        .map_err(|e| SearchError::Build(format!("Failed to commit index: {e}")))?;

    info!(
        products = products_count,
        pages = pages_count,
        "Search index built"
    );
    Ok((index, fields))
}

fn index_products(products: &[Product], writer: &IndexWriter, fields: &SearchFields) -> usize {
    let mut count = 0;

    for product in products.iter().filter(|p| p.is_visible()) {
        let price_cents = product
            .price
            .to_cents()
            .and_then(|c| u64::try_from(c).ok())
            .unwrap_or(0);
        let tags = [
            Some(product.material.as_str().replace('_', " ")),
            Some(product.category.as_str().to_owned()),
            product.gem_type.clone(),
            product.gem_color.clone(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

        let doc = tantivy::doc!(
            fields.doc_type => DocType::Product.as_str(),
            fields.slug => product.slug.clone(),
            fields.title => product.name.clone(),
            fields.description => product.description.clone(),
            fields.image_url => product.primary_image().unwrap_or_default().to_owned(),
            fields.material => product.material.as_str(),
            fields.price_cents => price_cents,
            fields.available => u64::from(product.in_stock()),
            fields.title_text => product.name.clone(),
            fields.description_text => product.description.clone(),
            fields.tags_text => tags
        );

        if let Err(e) = writer.add_document(doc) {
            warn!(error = %e, slug = %product.slug, "Failed to index product");
        } else {
            count += 1;
        }
    }

    count
}

fn index_pages(content: &ContentStore, writer: &IndexWriter, fields: &SearchFields) -> usize {
    let mut count = 0;

    for page in content.pages() {
        let doc = tantivy::doc!(
            fields.doc_type => DocType::Page.as_str(),
            fields.slug => page.slug.clone(),
            fields.title => page.meta.title.clone(),
            fields.description => page.meta.description.clone().unwrap_or_default(),
            fields.image_url => String::new(),
            fields.material => String::new(),
            fields.price_cents => 0u64,
            fields.available => 1u64,
            fields.title_text => page.meta.title.clone(),
            fields.description_text => page.content_text.clone(),
            fields.tags_text => String::new()
        );

        if let Err(e) = writer.add_document(doc) {
            warn!(error = %e, slug = %page.slug, "Failed to index page");
        } else {
            count += 1;
        }
    }

    count
}
