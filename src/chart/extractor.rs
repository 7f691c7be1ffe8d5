//! Extraction of ranked entries from a chart page.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Labels the chart page renders next to entries that are not artist credits.
const STATUS_TOKENS: &[&str] = &["NEW", "RE-ENTRY", "REENTRY", "RE ENTRY", "RE-\nENTRY"];

lazy_static! {
    static ref ROW_SELECTOR: Selector =
        Selector::parse("div.o-chart-results-list-row-container").unwrap();
    static ref TITLE_SELECTOR: Selector = Selector::parse("h3").unwrap();
    static ref SPAN_SELECTOR: Selector = Selector::parse("span").unwrap();
    static ref LABEL_SELECTOR: Selector = Selector::parse("span.c-label").unwrap();
}

/// One ranked `(rank, title, raw artist credit)` triple as it appears on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChartEntry {
    pub rank: u32,
    pub title: String,
    pub raw_artist: String,
}

impl RawChartEntry {
    pub fn new(rank: u32, title: impl Into<String>, raw_artist: impl Into<String>) -> Self {
        Self {
            rank,
            title: title.into(),
            raw_artist: raw_artist.into(),
        }
    }
}

/// Parses every chart row of `html`, in page order.
///
/// Rows lacking a numeric rank, a title or an artist credit are dropped.
pub fn extract_chart_entries(html: &str) -> Vec<RawChartEntry> {
    let document = Html::parse_document(html);
    document
        .select(&ROW_SELECTOR)
        .filter_map(parse_row)
        .collect()
}

fn parse_row(row: ElementRef) -> Option<RawChartEntry> {
    let title_element = row.select(&TITLE_SELECTOR).next();
    let title = title_element.map(stripped_text).filter(|t| !t.is_empty());

    let rank = row
        .select(&SPAN_SELECTOR)
        .next()
        .map(stripped_text)
        .filter(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()))
        .and_then(|t| t.parse::<u32>().ok())
        .filter(|rank| *rank > 0);

    // The chart layout moves the artist label around; the title's container
    // is the most precise place to look, the whole row a fallback.
    let artist = title_element
        .and_then(|t| t.parent())
        .and_then(ElementRef::wrap)
        .and_then(first_artist_label)
        .or_else(|| first_artist_label(row));

    Some(RawChartEntry {
        rank: rank?,
        title: title?,
        raw_artist: artist?,
    })
}

fn first_artist_label(scope: ElementRef) -> Option<String> {
    scope
        .select(&LABEL_SELECTOR)
        .map(stripped_text)
        .find(|text| is_artist_label(text))
}

fn is_artist_label(text: &str) -> bool {
    let upper = text.to_uppercase();
    let is_numeric = !text.is_empty() && text.chars().all(|c| c.is_ascii_digit());
    !is_numeric && !STATUS_TOKENS.contains(&upper.as_str()) && text.chars().count() >= 2
}

/// Text of an element with each text node trimmed, then concatenated.
///
/// Adjacent nodes lose the whitespace between them, which is where glued
/// credits like "EilishFeaturing" come from.
fn stripped_text(element: ElementRef) -> String {
    element.text().map(str::trim).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(rank: &str, title: &str, labels: &[&str]) -> String {
        let spans: String = labels
            .iter()
            .map(|l| format!("<span class=\"c-label a-no-trucate\">{}</span>", l))
            .collect();
        format!(
            r#"<div class="o-chart-results-list-row-container">
                <ul class="o-chart-results-list-row">
                    <li><span class="c-label a-font-primary-bold-l">{rank}</span></li>
                    <li class="lrv-u-width-100p">
                        <h3 id="title-of-a-story" class="c-title">
                            {title}
                        </h3>
                        {spans}
                    </li>
                </ul>
            </div>"#
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            "<html><body><div class=\"chart-results-list\">{}</div></body></html>",
            rows.join("\n")
        )
    }

    #[test]
    fn extracts_rows_in_page_order() {
        let html = page(&[
            row("1", "Lose Control", &["Teddy Swims"]),
            row("2", "A Bar Song (Tipsy)", &["Shaboozey"]),
        ]);

        let entries = extract_chart_entries(&html);
        assert_eq!(
            entries,
            vec![
                RawChartEntry::new(1, "Lose Control", "Teddy Swims"),
                RawChartEntry::new(2, "A Bar Song (Tipsy)", "Shaboozey"),
            ]
        );
    }

    #[test]
    fn skips_status_and_numeric_labels() {
        let html = page(&[row("7", "Die With A Smile", &["NEW", "3", "Lady Gaga & Bruno Mars"])]);

        let entries = extract_chart_entries(&html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].raw_artist, "Lady Gaga & Bruno Mars");
    }

    #[test]
    fn glues_adjacent_text_nodes() {
        let html = page(&[row(
            "12",
            "Lovely",
            &["Billie Eilish <a href=\"#\">Featuring</a> Khalid"],
        )]);

        let entries = extract_chart_entries(&html);
        assert_eq!(entries[0].raw_artist, "Billie EilishFeaturingKhalid");
    }

    #[test]
    fn falls_back_to_row_wide_artist_search() {
        let html = page(&[r#"<div class="o-chart-results-list-row-container">
                <span>5</span>
                <div><h3>Espresso</h3></div>
                <span class="c-label">Sabrina Carpenter</span>
            </div>"#
            .to_string()]);

        let entries = extract_chart_entries(&html);
        assert_eq!(entries, vec![RawChartEntry::new(5, "Espresso", "Sabrina Carpenter")]);
    }

    #[test]
    fn drops_malformed_rows() {
        let html = page(&[
            row("", "No Rank", &["Somebody"]),
            row("3", "", &["Nobody"]),
            row("4", "No Artist", &["RE-ENTRY"]),
            row("x9", "Bad Rank", &["Someone"]),
            row("6", "Fine", &["Good Artist"]),
        ]);

        let entries = extract_chart_entries(&html);
        assert_eq!(entries, vec![RawChartEntry::new(6, "Fine", "Good Artist")]);
    }

    #[test]
    fn empty_page_has_no_entries() {
        assert!(extract_chart_entries("<html></html>").is_empty());
    }
}
