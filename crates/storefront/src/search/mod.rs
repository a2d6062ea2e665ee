//! Full-text search using Tantivy.
//!
//! The index covers active products and content pages. It lives in RAM, is
//! built by a background task at startup and rebuilt on an interval; each
//! rebuild is swapped in whole. Until the first build finishes every query
//! returns empty results with `ready = false`.

mod indexer;

use std::ops::Bound;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tantivy::collector::TopDocs;
use tantivy::query::{
    AllQuery, BooleanQuery, FuzzyTermQuery, Occur, Query, QueryClone, RangeQuery, RegexQuery,
    TermQuery,
};
use tantivy::schema::{
    Field, IndexRecordOption, NumericOptions, STORED, STRING, Schema, TextFieldIndexing,
    TextOptions, Value,
};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, IndexReader, ReloadPolicy, Term};
use tracing::instrument;

use atelier_core::Money;
use atelier_core::product::{Material, Product};

use crate::content::ContentStore;

pub use indexer::{build_index, spawn_index_refresh};

/// Name under which the stemming analyzer is registered.
pub(crate) const TOKENIZER: &str = "en_stem";

/// Terms shorter than this are prefix-matched instead of fuzzy-matched.
const FUZZY_MIN_TERM_LEN: usize = 3;

/// Upper bound on documents scanned for facets.
const FACET_SCAN_LIMIT: usize = 10_000;

/// Document types that can be indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Product,
    Page,
}

impl DocType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Page => "page",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "product" => Some(Self::Product),
            "page" => Some(Self::Page),
            _ => None,
        }
    }
}

/// A search result item.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub kind: DocType,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub material: Option<Material>,
    pub price: Option<Money>,
    pub available: bool,
    pub score: f32,
}

/// Schema field handles for the search index.
#[derive(Debug, Clone)]
pub struct SearchFields {
    // Stored fields (returned in results)
    pub doc_type: Field,
    pub slug: Field,
    pub title: Field,
    pub description: Field,
    pub image_url: Field,
    pub material: Field,
    pub price_cents: Field,
    pub available: Field,
    // Indexed only
    pub title_text: Field,
    pub description_text: Field,
    pub tags_text: Field,
}

struct ReadyIndex {
    index: Index,
    reader: IndexReader,
    fields: SearchFields,
}

/// The search index.
///
/// Starts empty and is populated asynchronously by a background task.
#[derive(Clone)]
pub struct SearchIndex {
    inner: Arc<RwLock<Option<ReadyIndex>>>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Search filters. Only products are filtered; pages are dropped when any
/// filter is set.
#[derive(Debug, Default, Clone)]
pub struct SearchFilters {
    pub material: Option<Material>,
    pub in_stock_only: bool,
    /// Minimum price in cents (inclusive)
    pub min_price_cents: Option<u64>,
    /// Maximum price in cents (inclusive)
    pub max_price_cents: Option<u64>,
}

impl SearchFilters {
    const fn is_active(&self) -> bool {
        self.material.is_some()
            || self.in_stock_only
            || self.min_price_cents.is_some()
            || self.max_price_cents.is_some()
    }
}

/// Search sort order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchSort {
    #[default]
    Relevance,
    PriceAscending,
    PriceDescending,
}

impl SearchSort {
    /// Parse from URL parameter value. Unknown values mean relevance.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "price-ascending" | "price_asc" | "price-asc" => Self::PriceAscending,
            "price-descending" | "price_desc" | "price-desc" => Self::PriceDescending,
            _ => Self::Relevance,
        }
    }
}

/// Search response.
#[derive(Debug, Default, Serialize)]
pub struct SearchResults {
    pub query: String,
    /// Whether the index has been built.
    pub ready: bool,
    pub products: Vec<SearchHit>,
    pub pages: Vec<SearchHit>,
    /// Matching products before filters and limit
    pub total_products: usize,
    pub in_stock_count: usize,
    pub out_of_stock_count: usize,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
}

impl SearchResults {
    /// Check if there are any results.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.products.is_empty() && self.pages.is_empty()
    }
}

/// Search errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Index error: {0}")]
    Index(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Build error: {0}")]
    Build(String),
}

impl SearchIndex {
    /// Create a new empty search index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Check if the index is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Swap in a freshly built index.
    pub(crate) fn set_ready(&self, index: Index, fields: SearchFields) -> Result<(), SearchError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::Index(format!("Failed to create reader: {e}")))?;

        let ready = ReadyIndex {
            index,
            reader,
            fields,
        };

        *self
            .inner
            .write()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))? = Some(ready);

        Ok(())
    }

    /// Build an index over `products` and `content` on the calling thread and
    /// swap it in. Returns the document count.
    ///
    /// # Errors
    ///
    /// Returns an error if building or swapping in the index fails.
    pub fn rebuild(&self, products: &[Product], content: &ContentStore) -> Result<u64, SearchError> {
        let (index, fields) = build_index(products, content)?;
        self.set_ready(index, fields)?;
        Ok(self.num_docs())
    }

    /// Get the number of documents in the index, or 0 if not ready.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|r| r.reader.searcher().num_docs()))
            .unwrap_or(0)
    }

    /// Build the schema for the search index.
    pub(crate) fn build_schema() -> (Schema, SearchFields) {
        let mut schema_builder = Schema::builder();

        // STRING means indexed but not tokenized (exact match)
        let doc_type = schema_builder.add_text_field("doc_type", STRING | STORED);
        let slug = schema_builder.add_text_field("slug", STORED);
        let title = schema_builder.add_text_field("title", STORED);
        let description = schema_builder.add_text_field("description", STORED);
        let image_url = schema_builder.add_text_field("image_url", STORED);
        let material = schema_builder.add_text_field("material", STRING | STORED);

        let numeric = NumericOptions::default()
            .set_stored()
            .set_indexed()
            .set_fast();
        let price_cents = schema_builder.add_u64_field("price_cents", numeric.clone());
        let available = schema_builder.add_u64_field("available", numeric);

        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default().set_indexing_options(text_indexing);

        let title_text = schema_builder.add_text_field("title_text", text_options.clone());
        let description_text =
            schema_builder.add_text_field("description_text", text_options.clone());
        let tags_text = schema_builder.add_text_field("tags_text", text_options);

        let fields = SearchFields {
            doc_type,
            slug,
            title,
            description,
            image_url,
            material,
            price_cents,
            available,
            title_text,
            description_text,
            tags_text,
        };

        (schema_builder.build(), fields)
    }

    /// Search products and pages.
    ///
    /// An empty query lists every product (useful with filters). Returns
    /// empty results if the index isn't ready yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the index lock is poisoned or the search query fails.
    #[instrument(skip(self))]
    // The read guard must outlive `ready`, which borrows from it.
    #[allow(clippy::significant_drop_tightening)]
    pub fn search(
        &self,
        query_str: &str,
        filters: &SearchFilters,
        sort: SearchSort,
        limit: usize,
    ) -> Result<SearchResults, SearchError> {
        let query_str = query_str.trim().to_lowercase();

        let guard = self
            .inner
            .read()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))?;

        let Some(ready) = guard.as_ref() else {
            return Ok(SearchResults {
                query: query_str,
                ..Default::default()
            });
        };

        let searcher = ready.reader.searcher();
        let text_query = ready.text_query(&query_str);

        // Facets are computed over every matching product, before filters
        let facet_query = with_clauses(
            text_query.box_clone(),
            vec![doc_type_clause(&ready.fields, DocType::Product)],
        );
        let mut results = ready.facets(&searcher, facet_query.as_ref())?;
        results.query.clone_from(&query_str);
        results.ready = true;

        let product_query = with_clauses(
            text_query.box_clone(),
            ready.filter_clauses(filters, DocType::Product),
        );
        let fetch = if sort == SearchSort::Relevance {
            limit
        } else {
            FACET_SCAN_LIMIT
        };
        let top_docs = searcher
            .search(product_query.as_ref(), &TopDocs::with_limit(fetch.max(1)))
            .map_err(|e| SearchError::Query(format!("Search failed: {e}")))?;
        let mut products = ready.collect(&searcher, top_docs)?;
        match sort {
            SearchSort::Relevance => {}
            SearchSort::PriceAscending => {
                products.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.title.cmp(&b.title)));
            }
            SearchSort::PriceDescending => {
                products.sort_by(|a, b| b.price.cmp(&a.price).then_with(|| a.title.cmp(&b.title)));
            }
        }
        products.truncate(limit);
        results.products = products;

        if !filters.is_active() && !query_str.is_empty() {
            let page_query = with_clauses(text_query, vec![doc_type_clause(&ready.fields, DocType::Page)]);
            let top_docs = searcher
                .search(page_query.as_ref(), &TopDocs::with_limit(limit.max(1)))
                .map_err(|e| SearchError::Query(format!("Search failed: {e}")))?;
            results.pages = ready.collect(&searcher, top_docs)?;
        }

        Ok(results)
    }

    /// Title suggestions for a partial query.
    ///
    /// # Errors
    ///
    /// Returns an error if the index lock is poisoned or the search query fails.
    #[instrument(skip(self))]
    #[allow(clippy::significant_drop_tightening)]
    pub fn suggest(&self, query_str: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let query_str = query_str.trim().to_lowercase();
        if query_str.is_empty() {
            return Ok(Vec::new());
        }

        let guard = self
            .inner
            .read()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))?;
        let Some(ready) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let searcher = ready.reader.searcher();
        let query = ready.text_query(&query_str);
        let top_docs = searcher
            .search(query.as_ref(), &TopDocs::with_limit(limit.max(1)))
            .map_err(|e| SearchError::Query(format!("Search failed: {e}")))?;
        ready.collect(&searcher, top_docs)
    }
}

impl ReadyIndex {
    /// Run `text` through the same analyzer the index used.
    fn analyze(&self, text: &str) -> Vec<String> {
        let Ok(mut analyzer) = self.index.tokenizer_for_field(self.fields.title_text) else {
            return vec![text.to_owned()];
        };
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }

    /// Exact + fuzzy matching for longer terms, prefix matching for short
    /// ones. An empty query matches everything.
    fn text_query(&self, query_str: &str) -> Box<dyn Query> {
        if query_str.is_empty() {
            return Box::new(AllQuery);
        }

        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for raw in query_str.split_whitespace() {
            if raw.chars().count() < FUZZY_MIN_TERM_LEN {
                let pattern = format!("{}.*", regex::escape(raw));
                for field in [self.fields.title_text, self.fields.tags_text] {
                    if let Ok(regex_query) = RegexQuery::from_pattern(&pattern, field) {
                        subqueries.push((Occur::Should, Box::new(regex_query)));
                    }
                }
                continue;
            }

            for term in self.analyze(raw) {
                for field in [
                    self.fields.title_text,
                    self.fields.description_text,
                    self.fields.tags_text,
                ] {
                    let term = Term::from_field_text(field, &term);
                    subqueries.push((
                        Occur::Should,
                        Box::new(TermQuery::new(term.clone(), IndexRecordOption::WithFreqs)),
                    ));
                    subqueries.push((Occur::Should, Box::new(FuzzyTermQuery::new(term, 1, true))));
                }
            }
        }
        Box::new(BooleanQuery::new(subqueries))
    }

    fn filter_clauses(
        &self,
        filters: &SearchFilters,
        doc_type: DocType,
    ) -> Vec<(Occur, Box<dyn Query>)> {
        let fields = &self.fields;
        let mut clauses = vec![doc_type_clause(fields, doc_type)];

        if let Some(material) = filters.material {
            let term = Term::from_field_text(fields.material, material.as_str());
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        if filters.in_stock_only {
            let term = Term::from_field_u64(fields.available, 1);
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        if filters.min_price_cents.is_some() || filters.max_price_cents.is_some() {
            let min = filters.min_price_cents.unwrap_or(0);
            let max = filters.max_price_cents.unwrap_or(u64::MAX);
            clauses.push((
                Occur::Must,
                Box::new(RangeQuery::new(
                    Bound::Included(Term::from_field_u64(fields.price_cents, min)),
                    Bound::Included(Term::from_field_u64(fields.price_cents, max)),
                )),
            ));
        }

        clauses
    }

    fn facets(
        &self,
        searcher: &tantivy::Searcher,
        query: &dyn Query,
    ) -> Result<SearchResults, SearchError> {
        let docs = searcher
            .search(query, &TopDocs::with_limit(FACET_SCAN_LIMIT))
            .map_err(|e| SearchError::Query(format!("Facet query failed: {e}")))?;

        let mut results = SearchResults::default();
        for hit in self.collect(searcher, docs)? {
            results.total_products += 1;
            if hit.available {
                results.in_stock_count += 1;
            } else {
                results.out_of_stock_count += 1;
            }
            if let Some(price) = hit.price {
                results.min_price = Some(results.min_price.map_or(price, |m| m.min(price)));
                results.max_price = Some(results.max_price.map_or(price, |m| m.max(price)));
            }
        }
        Ok(results)
    }

    fn collect(
        &self,
        searcher: &tantivy::Searcher,
        top_docs: Vec<(f32, tantivy::DocAddress)>,
    ) -> Result<Vec<SearchHit>, SearchError> {
        top_docs
            .into_iter()
            .map(|(score, address)| {
                let doc = searcher
                    .doc::<tantivy::TantivyDocument>(address)
                    .map_err(|e| SearchError::Query(format!("Failed to retrieve doc: {e}")))?;
                self.doc_to_hit(&doc, score)
            })
            .collect()
    }

    fn doc_to_hit(
        &self,
        doc: &tantivy::TantivyDocument,
        score: f32,
    ) -> Result<SearchHit, SearchError> {
        let fields = &self.fields;
        let get_text = |field: Field| -> String {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let get_u64 =
            |field: Field| -> Option<u64> { doc.get_first(field).and_then(|v| v.as_u64()) };

        let doc_type_str = get_text(fields.doc_type);
        let kind = DocType::parse(&doc_type_str)
            .ok_or_else(|| SearchError::Query(format!("Invalid doc_type: {doc_type_str}")))?;

        let image_url = get_text(fields.image_url);
        let price = match kind {
            DocType::Product => get_u64(fields.price_cents)
                .and_then(|c| i64::try_from(c).ok())
                .map(Money::from_cents),
            DocType::Page => None,
        };

        Ok(SearchHit {
            kind,
            slug: get_text(fields.slug),
            title: get_text(fields.title),
            description: get_text(fields.description),
            image_url: (!image_url.is_empty()).then_some(image_url),
            material: get_text(fields.material).parse().ok(),
            price,
            available: get_u64(fields.available).is_some_and(|v| v == 1),
            score,
        })
    }
}

fn doc_type_clause(fields: &SearchFields, doc_type: DocType) -> (Occur, Box<dyn Query>) {
    let term = Term::from_field_text(fields.doc_type, doc_type.as_str());
    (
        Occur::Must,
        Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
    )
}

fn with_clauses(
    base: Box<dyn Query>,
    mut clauses: Vec<(Occur, Box<dyn Query>)>,
) -> Box<dyn Query> {
    clauses.insert(0, (Occur::Must, base));
    Box::new(BooleanQuery::new(clauses))
}
