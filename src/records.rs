//! Search result page extraction
//!
//! Turns one registry result page into normalized [`DrugRecord`]s plus the
//! pagination links and "did you mean" suggestions found on it.
//!
//! The registry markup is not under our control, so every lookup is
//! optional: a missing node degrades the affected field only and never drops
//! the row or aborts the page. Registry structure used here:
//! - Each result row is `.RowSearchSty`
//! - Local (RTL) title link is `.titleSearch-Link-RtlAlter a`, Latin (LTR) title link is `.titleSearch-Link-ltrAlter a`
//! - Thumbnail is `.BoxImgSearch img`
//! - Details are label/value columns under `.searchRow`
//! - Pagination is `.pagination li a`; the no-results marker is `.titleNotFind`

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use crate::markup::{clean_text, first_attr, first_text, selector};
use crate::query::{self, PageTarget};

static ROW: LazyLock<Selector> = LazyLock::new(|| selector(".RowSearchSty"));
static TITLE_LOCAL: LazyLock<Selector> = LazyLock::new(|| selector(".titleSearch-Link-RtlAlter a"));
static TITLE_LATIN: LazyLock<Selector> = LazyLock::new(|| selector(".titleSearch-Link-ltrAlter a"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector(".BoxImgSearch img"));
static DETAIL_COLUMN: LazyLock<Selector> =
    LazyLock::new(|| selector(".searchRow .col-lg-4, .searchRow .col-md-4"));
static LABEL: LazyLock<Selector> = LazyLock::new(|| selector("label"));
static VALUE: LazyLock<Selector> = LazyLock::new(|| selector("span, bdo"));
static PAGINATION_LINK: LazyLock<Selector> = LazyLock::new(|| selector(".pagination li a"));
static NOT_FOUND: LazyLock<Selector> = LazyLock::new(|| selector(".titleNotFind"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a"));

/// One search-result entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrugRecord {
    /// Position on the current result page, in document order
    pub ordinal: usize,
    pub title_local: String,
    /// Transliterated name with the enclosing parentheses removed
    pub title_latin: String,
    pub image_url: Option<String>,
    pub detail_url: String,
    /// Brand owner, the filter dimension
    pub owner_name: Option<String>,
    pub license_holder: Option<String>,
    /// Consumer price in whole currency units
    pub price: Option<u64>,
    /// Price text as it appeared on the page
    pub price_text: Option<String>,
    pub generic_code: Option<String>,
    pub product_code: Option<String>,
    pub packaging: Option<String>,
}

/// A pagination link decoded from the result page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Visible link text ("2", ">", ">>", ...)
    pub label: String,
    pub target: PageTarget,
}

/// A "did you mean" link shown when nothing matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub term: String,
}

/// Result of one extraction pass over a result page
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// At least one row was found
    Records {
        records: Vec<DrugRecord>,
        pagination: Vec<PageLink>,
    },
    /// The page carries the explicit "no results" marker
    NoResults { suggestions: Vec<Suggestion> },
    /// No rows and no marker
    Empty,
}

/// Routes a detail value into a record field when its label matches
struct LabelRule {
    /// Lower-case substrings any of which identifies the label
    needles: &'static [&'static str],
    apply: fn(&mut DrugRecord, &str),
}

/// Label rules in precedence order; the first matching rule wins.
///
/// Matching is substring containment so that both historical wordings of
/// the packaging and license-holder labels, and any surrounding decoration,
/// are accepted.
const LABEL_RULES: &[LabelRule] = &[
    LabelRule {
        needles: &["قیمت", "price"],
        apply: |record: &mut DrugRecord, value: &str| {
            record.price = parse_price(value);
            record.price_text = Some(value.to_string());
        },
    },
    LabelRule {
        needles: &["برند", "brand"],
        apply: |record: &mut DrugRecord, value: &str| record.owner_name = Some(value.to_string()),
    },
    LabelRule {
        needles: &["ژنریک", "generic"],
        apply: |record: &mut DrugRecord, value: &str| record.generic_code = Some(value.to_string()),
    },
    LabelRule {
        needles: &["فرآورده", "فراورده", "product code", "irc"],
        apply: |record: &mut DrugRecord, value: &str| record.product_code = Some(value.to_string()),
    },
    LabelRule {
        needles: &["بسته بندی", "بسته‌بندی", "بسته", "packag"],
        apply: |record: &mut DrugRecord, value: &str| record.packaging = Some(value.to_string()),
    },
    LabelRule {
        needles: &["صاحب پروانه", "دارنده پروانه", "پروانه", "license holder", "licence holder"],
        apply: |record: &mut DrugRecord, value: &str| record.license_holder = Some(value.to_string()),
    },
];

/// Extracts records from registry result pages
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    base_url: String,
}

impl RecordExtractor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Parse raw markup and extract the page outcome
    pub fn extract_page(&self, html: &str) -> PageOutcome {
        let document = Html::parse_document(html);
        self.extract_document(&document)
    }

    pub fn extract_document(&self, document: &Html) -> PageOutcome {
        let rows: Vec<ElementRef> = document.select(&ROW).collect();

        if rows.is_empty() {
            return match document.select(&NOT_FOUND).next() {
                Some(marker) => PageOutcome::NoResults {
                    suggestions: extract_suggestions(&marker),
                },
                None => {
                    debug!("no result rows and no no-results marker");
                    PageOutcome::Empty
                }
            };
        }

        let records = rows
            .iter()
            .enumerate()
            .map(|(ordinal, row)| self.extract_row(ordinal, row))
            .collect();

        PageOutcome::Records {
            records,
            pagination: extract_pagination(document),
        }
    }

    /// Build one record; absent sub-elements leave their field unset
    fn extract_row(&self, ordinal: usize, row: &ElementRef) -> DrugRecord {
        let local_link = row.select(&TITLE_LOCAL).next();

        let title_local = local_link.map(|a| clean_text(&a)).unwrap_or_default();
        if title_local.is_empty() {
            debug!(ordinal, "row has no local title");
        }

        let title_latin = first_text(row, &TITLE_LATIN)
            .map(|t| strip_enclosing_parens(&t))
            .unwrap_or_default();

        let image_url = first_attr(row, &IMAGE, "src").map(|src| query::resolve_href(&self.base_url, &src));

        let detail_href = local_link
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default();
        if detail_href.trim().is_empty() {
            debug!(ordinal, "row has no detail link");
        }
        let detail_url = query::resolve_href(&self.base_url, detail_href);

        let mut record = DrugRecord {
            ordinal,
            title_local,
            title_latin,
            image_url,
            detail_url,
            ..Default::default()
        };

        for column in row.select(&DETAIL_COLUMN) {
            let (Some(label), Some(value)) = (first_text(&column, &LABEL), first_text(&column, &VALUE)) else {
                continue;
            };
            apply_detail(&mut record, &label, &value);
        }

        record
    }
}

/// Route one label/value pair through the precedence table
fn apply_detail(record: &mut DrugRecord, label: &str, value: &str) {
    let label = label.to_lowercase();
    match LABEL_RULES
        .iter()
        .find(|rule| rule.needles.iter().any(|needle| label.contains(needle)))
    {
        Some(rule) => (rule.apply)(record, value),
        None => debug!(label = %label, "unrecognized detail label"),
    }
}

/// Parse a displayed price into whole units.
///
/// Persian/Arabic-Indic digits are normalized and every thousands separator
/// is stripped, then the leading run of digits is read. Trailing text such
/// as a currency unit or decimals is ignored; no leading digit yields `None`.
pub fn parse_price(text: &str) -> Option<u64> {
    let normalized: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '٬' | '،'))
        .map(normalize_digit)
        .collect();

    let digits: String = normalized.chars().take_while(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u64>() {
        Ok(price) => Some(price),
        Err(_) => {
            debug!(text, "unparseable price");
            None
        }
    }
}

fn normalize_digit(c: char) -> char {
    match c {
        '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
        '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
        _ => c,
    }
}

/// Remove one leading `(` and one trailing `)` from a Latin title
fn strip_enclosing_parens(title: &str) -> String {
    let title = title.trim();
    let title = title.strip_prefix('(').unwrap_or(title);
    let title = title.strip_suffix(')').unwrap_or(title);
    title.trim().to_string()
}

fn extract_pagination(document: &Html) -> Vec<PageLink> {
    document
        .select(&PAGINATION_LINK)
        .filter_map(|link| {
            let href = link.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            Some(PageLink {
                label: clean_text(&link),
                target: query::resolve_pagination_target(href),
            })
        })
        .collect()
}

fn extract_suggestions(marker: &ElementRef) -> Vec<Suggestion> {
    marker
        .select(&LINK)
        .filter_map(|link| {
            let text = clean_text(&link);
            let href = link.value().attr("href").unwrap_or_default();
            let term = query::resolve_suggestion_term(href, &text);
            if term.is_empty() {
                return None;
            }
            Some(Suggestion { text, term })
        })
        .collect()
}
