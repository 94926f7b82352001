//! Spreadsheet rows and the posts they describe.

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A spreadsheet row as exported: column name to cell value.
pub type Row = Map<String, Value>;

/// Spreadsheet serial dates count days from this epoch.
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Date formats tried, in order, for text cells.
const DATE_FORMATS: &[&str] = &[
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%m/%d/%Y",
    "%Y.%m.%d",
];

/// Format tried for text cells that carry a time part.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One post scheduled in the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    /// Zero-based data row index
    pub row_index: usize,
    /// Day the post should go out
    pub publish_date: Option<NaiveDate>,
    /// Caption body
    pub content: String,
    /// Hashtags appended to the caption
    pub tags: String,
    /// Image path, URL or empty
    pub image_source: String,
    /// Whether the row is marked as already published
    pub published: bool,
}

impl Post {
    /// Caption with tags appended after a blank line.
    ///
    /// # Examples
    ///
    /// ```
    /// use sheetpost_bot::Post;
    ///
    /// let post = Post {
    ///     row_index: 0,
    ///     publish_date: None,
    ///     content: "Hello".into(),
    ///     tags: "#a #b".into(),
    ///     image_source: String::new(),
    ///     published: false,
    /// };
    /// assert_eq!(post.full_caption(), "Hello\n\n#a #b");
    /// ```
    pub fn full_caption(&self) -> String {
        let tags = self.tags.trim();
        if tags.is_empty() || tags == "nan" {
            self.content.clone()
        } else {
            format!("{}\n\n{}", self.content, tags)
        }
    }

    /// Whether the post is scheduled for `date`.
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.publish_date == Some(date)
    }

    /// One-based sheet row, counting the header row.
    pub fn sheet_row(&self) -> usize {
        self.row_index + 2
    }

    /// Up to `limit` characters of the caption body, with an ellipsis when cut.
    pub fn preview(&self, limit: usize) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(limit).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let date = self
            .publish_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(f, "Post(row={}, date={}, content='{}')", self.sheet_row(), date, self.preview(50))
    }
}

/// Post fields that can be read from a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum PostField {
    /// Caption body
    Content,
    /// Hashtags
    Tags,
    /// Image source
    Image,
    /// Publish date
    Date,
    /// Published marker
    Published,
}

/// Column names accepted for each field, in priority order.
const COLUMN_ALIASES: &[(PostField, &[&str])] = &[
    (
        PostField::Content,
        &["tresc_postu", "treść_postu", "content", "tekst", "opis"],
    ),
    (PostField::Tags, &["tagi", "tags", "hashtags", "hash"]),
    (
        PostField::Image,
        &[
            "sciezka_zdjecia",
            "ścieżka_zdjęcia",
            "image",
            "zdjecie",
            "photo",
            "path",
        ],
    ),
    (
        PostField::Date,
        &["data_publikacji", "data", "date", "publikacja"],
    ),
    (
        PostField::Published,
        &["czy_opublikowano", "opublikowano", "published", "status"],
    ),
];

/// Cell values that mark a row as published.
const PUBLISHED_MARKERS: &[&str] = &["true", "tak", "1", "yes"];

/// Maps spreadsheet rows onto [`Post`]s using column aliases.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnMapper;

impl ColumnMapper {
    /// Column names accepted for `field`, in priority order.
    pub fn aliases(field: PostField) -> &'static [&'static str] {
        COLUMN_ALIASES
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, aliases)| *aliases)
            .unwrap_or(&[])
    }

    /// First non-blank cell among the aliases of `field`.
    pub fn find_value<'a>(row: &'a Row, field: PostField) -> Option<&'a Value> {
        Self::aliases(field)
            .iter()
            .filter_map(|key| row.get(*key))
            .find(|value| !is_blank(value))
    }

    /// Trimmed text of the first non-blank cell for `field`, or empty.
    pub fn find_text(row: &Row, field: PostField) -> String {
        Self::find_value(row, field)
            .map(cell_text)
            .unwrap_or_default()
    }

    /// Map a row to a post. Rows without content yield `None`.
    pub fn map_row(row: &Row, row_index: usize) -> Option<Post> {
        let content = Self::find_text(row, PostField::Content);
        if content.is_empty() {
            warn!(row = row_index + 2, "Row has no post content, skipping");
            return None;
        }

        let publish_date = Self::find_value(row, PostField::Date).and_then(|value| {
            let parsed = parse_date_value(value);
            if parsed.is_none() {
                warn!(row = row_index + 2, value = %value, "Unrecognized publish date");
            }
            parsed
        });

        let published = PUBLISHED_MARKERS
            .contains(&Self::find_text(row, PostField::Published).to_lowercase().as_str());

        let post = Post {
            row_index,
            publish_date,
            content,
            tags: Self::find_text(row, PostField::Tags),
            image_source: Self::find_text(row, PostField::Image),
            published,
        };
        debug!(%post, "Mapped row");
        Some(post)
    }

    /// Map every row, dropping those without content.
    pub fn map_rows(rows: &[Row]) -> Vec<Post> {
        rows.iter()
            .enumerate()
            .filter_map(|(index, row)| Self::map_row(row, index))
            .collect()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || s == "nan"
        }
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0 || f.is_nan()),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Parse a spreadsheet date cell.
///
/// Numbers, and text made only of digits, are serial dates counting days
/// from 1899-12-30. Other text is tried against the common day-first,
/// ISO and US layouts.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use serde_json::json;
/// use sheetpost_bot::parse_date_value;
///
/// let expected = NaiveDate::from_ymd_opt(2025, 8, 8);
/// assert_eq!(parse_date_value(&json!("08.08.2025")), expected);
/// assert_eq!(parse_date_value(&json!(45877)), expected);
/// assert_eq!(parse_date_value(&json!("soon")), None);
/// ```
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => n.as_f64().and_then(serial_date),
        Value::String(s) => parse_date_text(s.trim()),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse::<f64>().ok().and_then(serial_date);
    }
    if text.contains(' ') {
        return NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
            .ok()
            .map(|dt| dt.date());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn serial_date(days: f64) -> Option<NaiveDate> {
    if !days.is_finite() || days < 0.0 {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(days.trunc() as u64))
}
