//! Current result page with its sort and owner filter
//!
//! Records are held in extraction order; [`ResultViewState::project`]
//! derives the filtered and sorted list on demand. Sort and filter changes
//! are persisted as a side effect.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::collation;
use crate::records::DrugRecord;
use crate::storage::{FILTER_KEY, PreferenceStore, SORT_DIRECTION_KEY, SORT_KEY};

/// Stored filter value meaning "no filter"
pub const ALL_OWNERS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Extraction order
    #[default]
    None,
    PriceAsc,
    PriceDesc,
    /// Local-script title
    AlphaLocal,
    /// Latin title
    AlphaLatin,
}

impl SortKey {
    /// Next key in the UI cycle
    pub fn next(self) -> Self {
        match self {
            SortKey::None => SortKey::PriceAsc,
            SortKey::PriceAsc => SortKey::PriceDesc,
            SortKey::PriceDesc => SortKey::AlphaLocal,
            SortKey::AlphaLocal => SortKey::AlphaLatin,
            SortKey::AlphaLatin => SortKey::None,
        }
    }

    /// Stored (key, direction) pair
    fn to_stored(self) -> (&'static str, &'static str) {
        match self {
            SortKey::None => ("none", "asc"),
            SortKey::PriceAsc => ("price", "asc"),
            SortKey::PriceDesc => ("price", "desc"),
            SortKey::AlphaLocal => ("alphaLocal", "asc"),
            SortKey::AlphaLatin => ("alphaLatin", "asc"),
        }
    }

    fn from_stored(key: Option<&str>, direction: Option<&str>) -> Self {
        match (key, direction) {
            (Some("price"), Some("desc")) => SortKey::PriceDesc,
            (Some("price"), _) => SortKey::PriceAsc,
            // older single-key values
            (Some("priceAsc"), _) => SortKey::PriceAsc,
            (Some("priceDesc"), _) => SortKey::PriceDesc,
            (Some("alphaLocal") | Some("alpha"), _) => SortKey::AlphaLocal,
            (Some("alphaLatin"), _) => SortKey::AlphaLatin,
            (Some("none") | None, _) => SortKey::None,
            (Some(other), _) => {
                debug!(value = other, "unknown stored sort key");
                SortKey::None
            }
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortKey::None => "پیش‌فرض",
            SortKey::PriceAsc => "ارزان‌ترین",
            SortKey::PriceDesc => "گران‌ترین",
            SortKey::AlphaLocal => "الفبا (فارسی)",
            SortKey::AlphaLatin => "Alphabetical (Latin)",
        };
        f.write_str(label)
    }
}

/// Owner filter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OwnerFilter {
    #[default]
    All,
    Owner(String),
}

impl OwnerFilter {
    /// Parse a stored or user-supplied value; `"all"` or blank means no filter
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == ALL_OWNERS {
            OwnerFilter::All
        } else {
            OwnerFilter::Owner(value.to_string())
        }
    }

    pub fn as_stored(&self) -> &str {
        match self {
            OwnerFilter::All => ALL_OWNERS,
            OwnerFilter::Owner(name) => name,
        }
    }

    fn matches(&self, record: &DrugRecord) -> bool {
        match self {
            OwnerFilter::All => true,
            OwnerFilter::Owner(name) => record.owner_name.as_deref() == Some(name.as_str()),
        }
    }
}

/// Where records without a numeric price go under a price sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPricePolicy {
    /// Sort as if the price were 0 (cheapest first, most expensive last)
    #[default]
    AsZero,
    /// Always after priced records, whatever the direction
    Last,
}

pub struct ResultViewState {
    records: Vec<DrugRecord>,
    sort: SortKey,
    filter: OwnerFilter,
    missing_price: MissingPricePolicy,
    prefs: Arc<dyn PreferenceStore>,
}

impl ResultViewState {
    /// Empty view with sort/filter restored from `prefs`
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        let sort = SortKey::from_stored(
            prefs.get(SORT_KEY).as_deref(),
            prefs.get(SORT_DIRECTION_KEY).as_deref(),
        );
        let filter = prefs
            .get(FILTER_KEY)
            .map(|v| OwnerFilter::parse(&v))
            .unwrap_or_default();

        Self {
            records: Vec::new(),
            sort,
            filter,
            missing_price: MissingPricePolicy::default(),
            prefs,
        }
    }

    pub fn with_missing_price_policy(mut self, policy: MissingPricePolicy) -> Self {
        self.missing_price = policy;
        self
    }

    pub fn records(&self) -> &[DrugRecord] {
        &self.records
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn filter(&self) -> &OwnerFilter {
        &self.filter
    }

    /// Replace the held records; sort and filter are untouched
    pub fn set_records(&mut self, records: Vec<DrugRecord>) {
        self.records = records;
    }

    /// Drop the held records, returning them
    pub fn take_records(&mut self) -> Vec<DrugRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn set_sort(&mut self, key: SortKey) {
        self.sort = key;
        let (stored_key, direction) = key.to_stored();
        self.prefs.set(SORT_KEY, stored_key);
        self.prefs.set(SORT_DIRECTION_KEY, direction);
    }

    pub fn set_filter(&mut self, filter: OwnerFilter) {
        self.prefs.set(FILTER_KEY, filter.as_stored());
        self.filter = filter;
    }

    /// Back to the defaults for a fresh query
    pub fn reset_preferences(&mut self) {
        self.set_sort(SortKey::None);
        self.set_filter(OwnerFilter::All);
    }

    /// Distinct non-empty owners of the current records, collated
    pub fn owner_options(&self) -> Vec<String> {
        let mut owners: Vec<String> = self
            .records
            .iter()
            .filter_map(|r| r.owner_name.as_deref())
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        owners.sort_by(|a, b| collation::compare(a, b));
        owners.dedup();
        owners
    }

    /// Filter option following the active one (all → each owner → all)
    pub fn next_filter(&self) -> OwnerFilter {
        let options = self.owner_options();
        let next = match &self.filter {
            OwnerFilter::All => options.first(),
            OwnerFilter::Owner(current) => options
                .iter()
                .position(|o| o == current)
                .and_then(|i| options.get(i + 1)),
        };
        next.map(|o| OwnerFilter::Owner(o.clone()))
            .unwrap_or(OwnerFilter::All)
    }

    /// Filtered then sorted records. Sorting is stable, so ties keep
    /// extraction order.
    pub fn project(&self) -> Vec<DrugRecord> {
        let mut projected: Vec<DrugRecord> = self
            .records
            .iter()
            .filter(|r| self.filter.matches(r))
            .cloned()
            .collect();

        match self.sort {
            SortKey::None => {}
            SortKey::PriceAsc => projected.sort_by(|a, b| self.compare_price(a, b, false)),
            SortKey::PriceDesc => projected.sort_by(|a, b| self.compare_price(a, b, true)),
            SortKey::AlphaLocal => {
                projected.sort_by(|a, b| collation::compare(&a.title_local, &b.title_local))
            }
            SortKey::AlphaLatin => {
                projected.sort_by(|a, b| collation::compare(&a.title_latin, &b.title_latin))
            }
        }

        projected
    }

    fn compare_price(&self, a: &DrugRecord, b: &DrugRecord, descending: bool) -> Ordering {
        let directed = |x: u64, y: u64| if descending { y.cmp(&x) } else { x.cmp(&y) };
        match self.missing_price {
            MissingPricePolicy::AsZero => directed(a.price.unwrap_or(0), b.price.unwrap_or(0)),
            MissingPricePolicy::Last => match (a.price, b.price) {
                (Some(x), Some(y)) => directed(x, y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}
