//! Pattern extraction over listing, detail and profile HTML.
//!
//! The pages are scanned with regular expressions rather than a DOM; each
//! pattern targets one structural feature (a table row, an anchor's `href`,
//! a follower link) and tolerates attribute order and quoting differences.

use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<[^>]*>").expect("tag regex must compile")
});
static WS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").expect("whitespace regex must compile")
});

static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<tr\b([^>]*)>(.*?)</tr>").expect("row regex must compile")
});
static COIN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<a\b[^>]*?href\s*=\s*["']([^"']*/coins/([A-Za-z0-9_.\-]+))/?["'][^>]*>(.*?)</a>"#,
    )
    .expect("coin link regex must compile")
});
static SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<span\b[^>]*class\s*=\s*["'][^"']*(?:coin-symbol|tw-text-gray-500)[^"']*["'][^>]*>(.*?)</span>"#,
    )
    .expect("symbol regex must compile")
});
static COIN_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-coin-id\s*=\s*["']([^"']*)["']"#).expect("coin id regex must compile")
});
static PRICE_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-price\s*=\s*["']([^"']*)["']"#).expect("price attribute regex must compile")
});
static CAP_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-market-cap\s*=\s*["']([^"']*)["']"#).expect("market cap attribute regex must compile")
});
static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("cell regex must compile")
});

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#).expect("href regex must compile")
});

static FOLLOWERS_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?href\s*=\s*["'][^"']*/(?:verified_)?followers/?["'][^>]*>(.*?)</a>"#)
        .expect("followers link regex must compile")
});
static NUMBER_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9][0-9,]*(?:\.[0-9]+)?(?:\s?[KMB]\b)?").expect("number token regex must compile")
});
static JSON_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""followers_count"\s*:\s*([0-9]+)"#).expect("json count regex must compile")
});
static TEXT_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9][0-9,]*(?:\.[0-9]+)?\s?[KMB]?)\s*followers\b").expect("text count regex must compile")
});

/// Paths on social domains that are not accounts.
const RESERVED_PATHS: &[&str] = &["intent", "share", "home", "search", "i", "hashtag", "login"];

/// Visible text of an HTML fragment, whitespace-collapsed.
pub fn strip_tags(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = text
        .replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

/// Parse a displayed price or market cap (`"$1,234.5"`, `"$1.2T"`).
///
/// Unreadable or negative values become `0.0`.
pub fn parse_amount(text: &str) -> f64 {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' ') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    let (digits, multiplier) = match cleaned.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('T') => (&cleaned[..cleaned.len() - 1], 1e12),
        Some('B') => (&cleaned[..cleaned.len() - 1], 1e9),
        Some('M') => (&cleaned[..cleaned.len() - 1], 1e6),
        Some('K') => (&cleaned[..cleaned.len() - 1], 1e3),
        _ => (cleaned.as_str(), 1.0),
    };

    match digits.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value * multiplier,
        _ => 0.0,
    }
}

/// One project row found on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub name: String,
    pub symbol: String,
    pub source_id: String,
    /// Link to the detail page as written in the page (may be relative).
    pub href: String,
    pub price: f64,
    pub market_cap: f64,
}

/// Extract project rows from a listing page, in displayed order.
pub fn listing_rows(html: &str) -> Vec<ListingRow> {
    ROW_RE
        .captures_iter(html)
        .filter_map(|row| parse_row(&row[1], &row[2]))
        .collect()
}

fn parse_row(attrs: &str, body: &str) -> Option<ListingRow> {
    let link = COIN_LINK_RE.captures(body)?;
    let href = link[1].to_string();
    let slug = link[2].to_string();

    let name = strip_tags(&SYMBOL_RE.replace_all(&link[3], " "));
    if name.is_empty() {
        return None;
    }

    let symbol = SYMBOL_RE
        .captures(body)
        .map(|c| strip_tags(&c[1]).to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "?".to_string());

    let source_id = COIN_ID_RE
        .captures(attrs)
        .map(|c| c[1].trim().to_string())
        .filter(|id| !id.is_empty() && id != "null")
        .unwrap_or(slug);

    let cells: Vec<String> = CELL_RE
        .captures_iter(body)
        .map(|c| strip_tags(&c[1]))
        .collect();

    let price = attr_or_cell(body, &PRICE_ATTR_RE, &cells, 3);
    let market_cap = attr_or_cell(body, &CAP_ATTR_RE, &cells, 8);

    Some(ListingRow {
        name,
        symbol,
        source_id,
        href,
        price,
        market_cap,
    })
}

fn attr_or_cell(body: &str, attr: &Regex, cells: &[String], index: usize) -> f64 {
    attr.captures(body)
        .map(|c| parse_amount(&c[1]))
        .or_else(|| cells.get(index).map(|cell| parse_amount(cell)))
        .unwrap_or(0.0)
}

/// Finds the first social-profile link on a page.
#[derive(Debug, Clone)]
pub struct SocialLinkMatcher {
    pattern: Regex,
}

impl SocialLinkMatcher {
    pub fn new(domains: &[String]) -> Self {
        let alternatives = domains
            .iter()
            .map(|d| regex::escape(d))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(
            r"(?i)^(?:https?:)?//(?:www\.|mobile\.)?({alternatives})/@?([A-Za-z0-9_]{{2,15}})(?:[/?#]|$)"
        ))
        .expect("escaped social domains always form a valid regex");
        Self { pattern }
    }

    /// First anchor pointing at a social profile: `(handle, profile_url)`.
    pub fn find(&self, html: &str) -> Option<(String, String)> {
        HREF_RE.captures_iter(html).find_map(|anchor| {
            let caps = self.pattern.captures(anchor[1].trim())?;
            let domain = caps[1].to_ascii_lowercase();
            let handle = caps[2].to_string();
            if RESERVED_PATHS
                .iter()
                .any(|reserved| reserved.eq_ignore_ascii_case(&handle))
            {
                return None;
            }
            let profile_url = format!("https://{}/{}", domain, handle);
            Some((handle, profile_url))
        })
    }
}

/// Where on a profile page a follower count was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowerText {
    /// Text found; it may still fail to parse.
    Found(String),
    /// The follower link exists but holds no number.
    Empty(String),
    Missing,
}

/// Locate the displayed follower count on a profile page.
///
/// Tries the follower link first, then an embedded `"followers_count"`
/// field, then free text such as `"1.2M Followers"`.
pub fn follower_text(html: &str) -> FollowerText {
    let link_text = FOLLOWERS_LINK_RE
        .captures(html)
        .map(|c| strip_tags(&c[1]));

    if let Some(text) = &link_text {
        if let Some(token) = NUMBER_TOKEN_RE.find(text) {
            return FollowerText::Found(token.as_str().trim().to_string());
        }
    }

    if let Some(caps) = JSON_COUNT_RE.captures(html) {
        return FollowerText::Found(caps[1].to_string());
    }

    let visible = strip_tags(html);
    if let Some(caps) = TEXT_COUNT_RE.captures(&visible) {
        return FollowerText::Found(caps[1].trim().to_string());
    }

    match link_text {
        Some(text) => FollowerText::Empty(text),
        None => FollowerText::Missing,
    }
}
