use crate::types::Market;

/// Keep markets whose `"{title} {ticker}"` contains `keyword`, ignoring case.
///
/// A missing or empty keyword returns `items` untouched. Missing fields read
/// as empty strings. Relative order is preserved.
pub fn filter_markets(items: Vec<Market>, keyword: Option<&str>) -> Vec<Market> {
    let Some(keyword) = keyword.filter(|k| !k.is_empty()) else {
        return items;
    };
    let needle = keyword.to_lowercase();

    items
        .into_iter()
        .filter(|market| matches_keyword(market, &needle))
        .collect()
}

fn matches_keyword(market: &Market, needle: &str) -> bool {
    let haystack = format!(
        "{} {}",
        market.title().unwrap_or_default(),
        market.ticker().unwrap_or_default()
    );
    haystack.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn market(title: Option<&str>, ticker: Option<&str>) -> Market {
        let mut value = json!({"volume": 10});
        if let Some(title) = title {
            value["title"] = json!(title);
        }
        if let Some(ticker) = ticker {
            value["ticker"] = json!(ticker);
        }
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> Vec<Market> {
        vec![
            market(Some("Will Bitcoin close above $100k?"), Some("KXBTC-100K")),
            market(Some("Fed cuts rates in December"), Some("FED-DEC")),
            market(None, Some("KXBTCD-25")),
            market(Some("NBA Finals winner"), None),
        ]
    }

    #[test]
    fn absent_or_empty_keyword_returns_input_unchanged() {
        assert_eq!(filter_markets(sample(), None), sample());
        assert_eq!(filter_markets(sample(), Some("")), sample());
    }

    #[test]
    fn match_is_case_insensitive() {
        let hits = filter_markets(sample(), Some("BITCOIN"));
        assert_eq!(hits, vec![sample()[0].clone()]);

        let hits = filter_markets(sample(), Some("nba finals"));
        assert_eq!(hits, vec![sample()[3].clone()]);
    }

    #[test]
    fn identifier_only_match_is_kept() {
        let hits = filter_markets(sample(), Some("kxbtcd"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ticker(), Some("KXBTCD-25"));
    }

    #[test]
    fn matches_preserve_relative_order() {
        let hits = filter_markets(sample(), Some("kxbtc"));
        let tickers: Vec<_> = hits.iter().map(|m| m.ticker()).collect();
        assert_eq!(tickers, vec![Some("KXBTC-100K"), Some("KXBTCD-25")]);
    }

    #[test]
    fn keyword_may_span_the_joining_space() {
        let hits = filter_markets(sample(), Some("december fed"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ticker(), Some("FED-DEC"));
    }

    #[test]
    fn no_match_yields_empty() {
        assert!(filter_markets(sample(), Some("election")).is_empty());
    }

    #[test]
    fn other_fields_pass_through() {
        let hits = filter_markets(sample(), Some("fed"));
        assert_eq!(hits[0].0.get("volume"), Some(&json!(10)));
    }
}
