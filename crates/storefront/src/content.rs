//! Markdown content pages (artisan story, crafting process, FAQ, shipping).
//!
//! Pages are loaded from `<content_dir>/pages/*.md` at startup. Each file
//! carries YAML front matter and a markdown body that is rendered to HTML
//! once, up front.
//!
//! # Shortcodes
//!
//! `{{product "moonstone-halo-ring" label="Shop the ring"}}` renders a link to
//! a product page. `label` defaults to the slug.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Front matter of a content page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<NaiveDate>,
    /// Navigation position; lower comes first.
    #[serde(default)]
    pub order: Option<i32>,
}

/// A rendered page.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub slug: String,
    #[serde(flatten)]
    pub meta: PageMeta,
    pub content_html: String,
    /// Plain text of the body, for indexing.
    #[serde(skip)]
    pub content_text: String,
}

/// All pages, held in memory.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    pages: Arc<HashMap<String, Page>>,
}

impl ContentStore {
    /// Load every page under `content_dir/pages`.
    ///
    /// A missing directory yields an empty store. Individual files that fail
    /// to parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let dir = content_dir.join("pages");
        let mut pages = HashMap::new();

        if !dir.exists() {
            tracing::warn!(dir = %dir.display(), "Pages directory does not exist");
            return Ok(Self::default());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| ContentError::Io(e.to_string()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                match load_page(&path) {
                    Ok(page) => {
                        tracing::info!(slug = %page.slug, "Loaded page");
                        pages.insert(page.slug.clone(), page);
                    }
                    Err(e) => {
                        tracing::error!(path = %path.display(), error = %e, "Failed to load page");
                    }
                }
            }
        }

        Ok(Self {
            pages: Arc::new(pages),
        })
    }

    /// Build a store from already-parsed markdown sources, keyed by slug.
    ///
    /// # Errors
    ///
    /// Returns the first parse error.
    pub fn from_sources<'a>(
        sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, ContentError> {
        let pages = sources
            .into_iter()
            .map(|(slug, source)| parse_page(slug, source).map(|p| (p.slug.clone(), p)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self {
            pages: Arc::new(pages),
        })
    }

    /// A page by slug.
    #[must_use]
    pub fn get_page(&self, slug: &str) -> Option<&Page> {
        self.pages.get(slug)
    }

    /// Every page in navigation order, then by title.
    #[must_use]
    pub fn pages(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.pages.values().collect();
        pages.sort_by(|a, b| {
            a.meta
                .order
                .unwrap_or(i32::MAX)
                .cmp(&b.meta.order.unwrap_or(i32::MAX))
                .then_with(|| a.meta.title.cmp(&b.meta.title))
        });
        pages
    }

    /// Number of loaded pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no pages were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

fn load_page(path: &Path) -> Result<Page, ContentError> {
    let source = std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;
    let slug = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ContentError::Parse("Invalid filename".to_string()))?;
    parse_page(slug, &source)
}

fn parse_page(slug: &str, source: &str) -> Result<Page, ContentError> {
    let matter = Matter::<YAML>::new();
    let parsed: ParsedEntity<PageMeta> = matter
        .parse(source)
        .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
    let meta = parsed
        .data
        .ok_or_else(|| ContentError::Parse("Missing frontmatter".to_string()))?;

    let content_html = render_markdown(&parsed.content);
    let content_text = strip_html(&content_html);

    Ok(Page {
        slug: slug.to_owned(),
        meta,
        content_html,
        content_text,
    })
}

/// Render markdown to HTML with GitHub Flavored Markdown extensions.
fn render_markdown(content: &str) -> String {
    let processed = process_shortcodes(content);

    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    markdown_to_html(&processed, &options)
}

// =============================================================================
// Shortcode Processing
// =============================================================================

/// Matches `{{product "slug" ...attributes}}`.
static PRODUCT_SHORTCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{product\s+"([a-z0-9-]+)"([^}]*)\}\}"#).expect("Invalid regex")
});

/// Matches `key="value"` attributes.
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)="([^"]*)""#).expect("Invalid regex"));

fn process_shortcodes(content: &str) -> String {
    PRODUCT_SHORTCODE_RE
        .replace_all(content, |caps: &regex::Captures| {
            let slug = caps.get(1).map_or("", |m| m.as_str());
            let attrs = caps.get(2).map_or("", |m| m.as_str());

            let label = ATTR_RE
                .captures_iter(attrs)
                .find(|c| c.get(1).is_some_and(|k| k.as_str() == "label"))
                .and_then(|c| c.get(2))
                .map_or(slug, |m| m.as_str());

            format!("[{label}](/products/{slug})")
        })
        .into_owned()
}

/// Strip HTML tags and decode the common entities.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    let decoded = result
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Content loading errors
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FAQ: &str = "---\ntitle: FAQ\ndescription: Common questions\norder: 3\n---\n\n## Do you resize?\n\nYes, see {{product \"moonstone-ring\" label=\"our moonstone ring\"}}.\n";

    #[test]
    fn parses_front_matter_and_renders_markdown() {
        let store = ContentStore::from_sources([("faq", FAQ)]).unwrap();
        let page = store.get_page("faq").unwrap();
        assert_eq!(page.meta.title, "FAQ");
        assert_eq!(page.meta.order, Some(3));
        assert!(page.content_html.contains("<h2"));
        assert!(
            page.content_html
                .contains(r#"<a href="/products/moonstone-ring">our moonstone ring</a>"#)
        );
        assert!(page.content_text.contains("Do you resize?"));
        assert!(!page.content_text.contains('<'));
    }

    #[test]
    fn missing_front_matter_is_an_error() {
        let result = ContentStore::from_sources([("bare", "# Just markdown\n")]);
        assert!(matches!(result, Err(ContentError::Parse(_))));
    }

    #[test]
    fn pages_sorted_by_order_then_title() {
        let store = ContentStore::from_sources([
            ("b", "---\ntitle: Bravo\n---\nx"),
            ("a", "---\ntitle: Alpha\n---\nx"),
            ("first", "---\ntitle: Zulu\norder: 1\n---\nx"),
        ])
        .unwrap();
        let titles: Vec<&str> = store.pages().iter().map(|p| p.meta.title.as_str()).collect();
        assert_eq!(titles, ["Zulu", "Alpha", "Bravo"]);
    }

    #[test]
    fn loads_pages_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let pages = dir.path().join("pages");
        std::fs::create_dir(&pages).unwrap();
        std::fs::write(pages.join("faq.md"), FAQ).unwrap();
        std::fs::write(pages.join("notes.txt"), "ignored").unwrap();

        let store = ContentStore::load(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get_page("faq").is_some());
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ContentStore::load(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn strip_html_collapses_whitespace() {
        assert_eq!(strip_html("<p>Gold &amp; silver</p>\n<p>rings</p>"), "Gold & silver rings");
    }
}
