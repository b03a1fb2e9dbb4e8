//! Scraped-product data model.
//!
//! One `ProductRecord` per visited product link, accumulated into a
//! column-oriented `ProductTable` whose JSON shape matches the historical
//! `link_and_product_data.json` dump (keys `uuid1`, `uuid4`, `link`,
//! `quantity_and_price`, `usage`, `product_category`).

use serde::{Deserialize, Serialize};

/// Sentinel written when the unique product code element is absent.
pub const UNIQUE_CODE_SENTINEL: &str = "unique code not found";
/// Sentinel written when the quantity/price element is absent.
pub const QUANTITY_PRICE_SENTINEL: &str = "quantity or price not found";
/// Sentinel written when the usage element is absent.
pub const USAGE_SENTINEL: &str = "usage not found";
/// Sentinel written when the product category element is absent.
pub const CATEGORY_SENTINEL: &str = "no category of product found";

/// Currency marker the raw quantity/price text is split on.
pub const CURRENCY_MARKER: char = '£';

/// Alphabet for human-friendly short codes. Excludes ambiguous glyphs
/// (0/o, 1/l/i).
const FRIENDLY_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

/// Length of a human-friendly short code.
const FRIENDLY_ID_LEN: usize = 5;

/// Result of one isolated field-extraction attempt.
///
/// Distinguishes "the locator matched nothing" from "the lookup itself
/// errored", so callers can tell the two apart even though both collapse
/// to the same sentinel in the output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    /// Element found; trimmed text or attribute value.
    Found(String),
    /// No element matched the locator within the bounded wait.
    Missing,
    /// The lookup failed for a reason other than absence.
    Failed(String),
}

impl FieldOutcome {
    /// Collapse to the extracted value, or the documented sentinel on
    /// absence/failure.
    pub fn value_or(&self, sentinel: &str) -> String {
        match self {
            Self::Found(text) => text.clone(),
            Self::Missing | Self::Failed(_) => sentinel.to_string(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Quantity/price column value.
///
/// The raw element text is split on the currency marker into ordered parts;
/// extraction failure stores the plain sentinel string instead. Serialized
/// untagged so the JSON column stays heterogeneous (array or string) exactly
/// like the historical dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityPrice {
    Parts(Vec<String>),
    Sentinel(String),
}

impl QuantityPrice {
    /// Build from an extraction outcome, splitting found text on the
    /// currency marker.
    pub fn from_outcome(outcome: &FieldOutcome) -> Self {
        match outcome {
            FieldOutcome::Found(text) => Self::Parts(
                text.split(CURRENCY_MARKER)
                    .map(ToString::to_string)
                    .collect(),
            ),
            FieldOutcome::Missing | FieldOutcome::Failed(_) => {
                Self::Sentinel(QUANTITY_PRICE_SENTINEL.to_string())
            }
        }
    }
}

/// One scraped product. Every field is always present; extraction failures
/// are sentinel-filled, never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Source URL for this record, unique within a run.
    pub link: String,
    /// Site-displayed unique code, or its sentinel.
    pub uuid_primary: String,
    /// Freshly generated UUIDv4, unique per record; namespaces the uploaded
    /// image copy.
    pub uuid_secondary: String,
    pub quantity_and_price: QuantityPrice,
    pub usage: String,
    pub product_category: String,
}

/// Column-oriented record table: field name to index-aligned value list.
///
/// All six columns always have equal length; `push` is the only way rows
/// are added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductTable {
    pub uuid1: Vec<String>,
    pub uuid4: Vec<String>,
    pub link: Vec<String>,
    pub quantity_and_price: Vec<QuantityPrice>,
    pub usage: Vec<String>,
    pub product_category: Vec<String>,
}

impl ProductTable {
    pub fn push(&mut self, record: ProductRecord) {
        self.uuid1.push(record.uuid_primary);
        self.uuid4.push(record.uuid_secondary);
        self.link.push(record.link);
        self.quantity_and_price.push(record.quantity_and_price);
        self.usage.push(record.usage);
        self.product_category.push(record.product_category);
    }

    pub fn len(&self) -> usize {
        self.link.len()
    }

    pub fn is_empty(&self) -> bool {
        self.link.is_empty()
    }

    /// Column names in dump order.
    pub fn column_names() -> [&'static str; 6] {
        [
            "uuid1",
            "uuid4",
            "link",
            "quantity_and_price",
            "usage",
            "product_category",
        ]
    }

    /// Row-oriented view for the pivot report and the relational sink.
    /// `quantity_and_price` is JSON-encoded per row.
    pub fn rows(&self) -> Vec<[String; 6]> {
        (0..self.len())
            .map(|i| {
                [
                    self.uuid1[i].clone(),
                    self.uuid4[i].clone(),
                    self.link[i].clone(),
                    serde_json::to_string(&self.quantity_and_price[i])
                        .unwrap_or_else(|_| String::from("null")),
                    self.usage[i].clone(),
                    self.product_category[i].clone(),
                ]
            })
            .collect()
    }
}

/// Compute the dedup key for a record's canonical image:
/// `{unique code}_{category}`, sanitised for filesystem use.
pub fn artifact_key(uuid_primary: &str, product_category: &str) -> String {
    let raw = format!("{uuid_primary}_{product_category}");
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '-',
            other => other,
        })
        .collect()
}

/// Generate a 5-character human-friendly short code.
pub fn friendly_id() -> String {
    (0..FRIENDLY_ID_LEN)
        .map(|_| FRIENDLY_ALPHABET[fastrand::usize(..FRIENDLY_ALPHABET.len())] as char)
        .collect()
}

/// Auxiliary (artifact key, friendly id) pairs, appended only for records
/// that triggered a fresh image download.
///
/// Skipped duplicates never land here even though they are valid records in
/// the main table, so this is a per-run download log, not a history of all
/// records ever scraped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideIndex {
    images: Vec<String>,
    codes: Vec<String>,
}

impl SideIndex {
    pub fn push(&mut self, artifact_key: String, friendly_id: String) {
        self.images.push(artifact_key);
        self.codes.push(friendly_id);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Ordered (artifact key, friendly id) pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.images
            .iter()
            .map(String::as_str)
            .zip(self.codes.iter().map(String::as_str))
    }
}
