//! Image gallery extraction from a record's detail page
//!
//! Detail pages mark gallery links with `data-lightbox="image-1"`. Each link
//! points at the full-size image and usually wraps an `<img>` thumbnail. The
//! registry appends one extra link at the end that opens the whole set
//! ("view all"); it either repeats an earlier image or is a thumbnail-less
//! link that does not point at an image file.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::markup::{first_attr, selector};
use crate::query;

static LIGHTBOX_LINK: LazyLock<Selector> = LazyLock::new(|| selector(r#"a[data-lightbox="image-1"]"#));
static THUMBNAIL: LazyLock<Selector> = LazyLock::new(|| selector("img"));

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"];

/// One gallery entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryImage {
    pub full_url: String,
    /// Falls back to `full_url` when the link has no thumbnail
    pub thumb_url: String,
}

/// Gallery extraction tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalleryOptions {
    /// Drop the trailing "view all" link when it is detected
    pub drop_trailing_view_all: bool,
    /// Minimum number of candidate links before the drop is considered
    pub drop_min_candidates: usize,
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self {
            drop_trailing_view_all: true,
            drop_min_candidates: 2,
        }
    }
}

/// A lightbox link that survived placeholder filtering
struct Candidate {
    full_url: String,
    thumb_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GalleryExtractor {
    base_url: String,
    options: GalleryOptions,
}

impl GalleryExtractor {
    pub fn new(base_url: impl Into<String>, options: GalleryOptions) -> Self {
        Self {
            base_url: base_url.into(),
            options,
        }
    }

    /// Parse a detail page and extract its gallery
    pub fn extract_page(&self, html: &str) -> Vec<GalleryImage> {
        let document = Html::parse_document(html);
        self.extract_document(&document)
    }

    /// Ordered, de-duplicated gallery images. An empty list is a valid outcome.
    pub fn extract_document(&self, document: &Html) -> Vec<GalleryImage> {
        let mut candidates: Vec<Candidate> = document
            .select(&LIGHTBOX_LINK)
            .filter_map(|link| self.candidate(&link))
            .collect();

        if self.is_trailing_view_all(&candidates) {
            if let Some(dropped) = candidates.pop() {
                debug!(url = %dropped.full_url, "dropped trailing view-all gallery link");
            }
        }

        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert(c.full_url.clone()))
            .map(|c| GalleryImage {
                thumb_url: c.thumb_url.unwrap_or_else(|| c.full_url.clone()),
                full_url: c.full_url,
            })
            .collect()
    }

    /// Resolve a lightbox link; placeholders (empty, `#`, site root) are skipped
    fn candidate(&self, link: &ElementRef) -> Option<Candidate> {
        let href = link.value().attr("href").map(str::trim).unwrap_or_default();
        if href.is_empty() || href == "#" {
            debug!("skipping placeholder gallery link");
            return None;
        }

        let full_url = query::resolve_href(&self.base_url, href);
        if query::is_site_root(&self.base_url, &full_url) {
            debug!(href, "skipping gallery link to site root");
            return None;
        }

        let thumb_url = first_attr(link, &THUMBNAIL, "src").map(|src| query::resolve_href(&self.base_url, &src));

        Some(Candidate { full_url, thumb_url })
    }

    /// The last link is a "view all" entry when it repeats an earlier image,
    /// or when it has no thumbnail and does not point at an image file.
    /// A distinct image without a thumbnail is kept.
    fn is_trailing_view_all(&self, candidates: &[Candidate]) -> bool {
        if !self.options.drop_trailing_view_all || candidates.len() < self.options.drop_min_candidates.max(2) {
            return false;
        }

        let Some((last, earlier)) = candidates.split_last() else {
            return false;
        };

        let repeats_earlier = earlier.iter().any(|c| c.full_url == last.full_url);
        let opens_set = last.thumb_url.is_none() && !is_image_file(&last.full_url);

        repeats_earlier || opens_set
    }
}

fn is_image_file(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            let last = u.path_segments()?.next_back()?.to_string();
            let (_, ext) = last.rsplit_once('.')?;
            Some(IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://irc.fda.gov.ir";

    fn extractor() -> GalleryExtractor {
        GalleryExtractor::new(BASE, GalleryOptions::default())
    }

    fn link(href: &str, thumb: Option<&str>) -> String {
        let img = thumb.map(|t| format!(r#"<img src="{t}">"#)).unwrap_or_default();
        format!(r#"<a data-lightbox="image-1" href="{href}">{img}</a>"#)
    }

    fn detail_page(links: &[String]) -> String {
        format!("<html><body><div class=\"gallery\">{}</div></body></html>", links.concat())
    }

    #[test]
    fn test_trailing_view_all_duplicate_is_dropped() {
        let html = detail_page(&[
            link("/Images/1.jpg", Some("/Thumbs/1.jpg")),
            link("/Images/2.jpg", Some("/Thumbs/2.jpg")),
            link("/Images/3.jpg", Some("/Thumbs/3.jpg")),
            link("/Images/1.jpg", None),
        ]);
        let images = extractor().extract_page(&html);
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].full_url, "https://irc.fda.gov.ir/Images/1.jpg");
        assert_eq!(images[0].thumb_url, "https://irc.fda.gov.ir/Thumbs/1.jpg");
        assert_eq!(images[2].full_url, "https://irc.fda.gov.ir/Images/3.jpg");
    }

    #[test]
    fn test_trailing_link_without_thumbnail_is_dropped() {
        let html = detail_page(&[
            link("/Images/1.jpg", Some("/Thumbs/1.jpg")),
            link("/Images/2.jpg", Some("/Thumbs/2.jpg")),
            link("/Images/3.jpg", Some("/Thumbs/3.jpg")),
            link("/Images/All", None),
        ]);
        let images = extractor().extract_page(&html);
        assert_eq!(images.len(), 3);
        assert!(images.iter().all(|i| !i.full_url.ends_with("/All")));
    }

    #[test]
    fn test_distinct_image_without_thumbnail_is_kept() {
        let html = detail_page(&[
            link("/Images/1.jpg", Some("/Thumbs/1.jpg")),
            link("/Images/2.jpg", None),
        ]);
        let images = extractor().extract_page(&html);
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].full_url, "https://irc.fda.gov.ir/Images/2.jpg");
        assert_eq!(images[1].thumb_url, images[1].full_url);
    }

    #[test]
    fn test_single_link_is_kept() {
        let html = detail_page(&[link("/Images/only.jpg", None)]);
        let images = extractor().extract_page(&html);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].thumb_url, images[0].full_url);
    }

    #[test]
    fn test_distinct_images_are_not_dropped() {
        let html = detail_page(&[
            link("/Images/1.jpg", Some("/Thumbs/1.jpg")),
            link("https://cdn.example.com/2.jpg", Some("https://cdn.example.com/t2.jpg")),
        ]);
        let images = extractor().extract_page(&html);
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].full_url, "https://cdn.example.com/2.jpg");
    }

    #[test]
    fn test_heuristic_can_be_disabled() {
        let options = GalleryOptions {
            drop_trailing_view_all: false,
            ..GalleryOptions::default()
        };
        let html = detail_page(&[
            link("/Images/1.jpg", Some("/Thumbs/1.jpg")),
            link("/Images/2.jpg", Some("/Thumbs/2.jpg")),
            link("/Images/All", None),
        ]);
        let images = GalleryExtractor::new(BASE, options).extract_page(&html);
        assert_eq!(images.len(), 3);
        assert_eq!(images[2].thumb_url, "https://irc.fda.gov.ir/Images/All");
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let options = GalleryOptions {
            drop_trailing_view_all: false,
            ..GalleryOptions::default()
        };
        let html = detail_page(&[
            link("/Images/b.jpg", None),
            link("/Images/a.jpg", None),
            link("/Images/b.jpg", None),
            link("/Images/A.jpg", None),
        ]);
        let images = GalleryExtractor::new(BASE, options).extract_page(&html);
        let urls: Vec<&str> = images.iter().map(|i| i.full_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://irc.fda.gov.ir/Images/b.jpg",
                "https://irc.fda.gov.ir/Images/a.jpg",
                "https://irc.fda.gov.ir/Images/A.jpg",
            ]
        );
    }

    #[test]
    fn test_placeholder_links_are_skipped() {
        let html = detail_page(&[
            link("#", None),
            link("", None),
            link("/", None),
            link("https://irc.fda.gov.ir", None),
            link("/Images/1.jpg", None),
        ]);
        let images = extractor().extract_page(&html);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].full_url, "https://irc.fda.gov.ir/Images/1.jpg");
    }

    #[test]
    fn test_page_without_gallery() {
        let html = r#"<html><body><a href="/Images/1.jpg"><img src="/x.jpg"></a></body></html>"#;
        assert!(extractor().extract_page(html).is_empty());
    }
}
