use serde::Deserialize;
use urlencoding::encode;

use crate::config::Config;
use crate::error::Result;
use crate::market::Listing;
use crate::services::ensure_success;

/// Result of a sold-listing search. Failure is a designed branch: the
/// valuation continues without market data.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketSearch {
    Found(Vec<Listing>),
    Unavailable { reason: String },
}

impl MarketSearch {
    pub fn listings(&self) -> &[Listing] {
        match self {
            MarketSearch::Found(listings) => listings,
            MarketSearch::Unavailable { .. } => &[],
        }
    }
}

// Each listing decodes leniently, so a page is only lost when the body
// itself is not a search reply.
#[derive(Deserialize)]
struct SearchReply {
    #[serde(default)]
    organic_results: Option<Vec<Listing>>,
    error: Option<String>,
}

fn search_url(config: &Config, key: &str, query: &str) -> String {
    format!(
        "{}/search.json?engine=ebay&_nkw={}&LH_Complete=1&LH_Sold=1&_sop=13&api_key={}",
        config.endpoints.serpapi,
        encode(query),
        encode(key)
    )
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<SearchReply> {
    let response = client.get(url).send().await?;
    Ok(ensure_success("serpapi", response).await?.json().await?)
}

/// Most recent completed-and-sold eBay listings for `query`.
pub async fn search_sold(client: &reqwest::Client, config: &Config, query: &str) -> MarketSearch {
    let Some(key) = config.serpapi_key.as_deref() else {
        return MarketSearch::Unavailable {
            reason: "SERPAPI_KEY is not set".to_string(),
        };
    };

    match fetch(client, &search_url(config, key, query)).await {
        Ok(SearchReply { error: Some(reason), .. }) => MarketSearch::Unavailable { reason },
        Ok(SearchReply { organic_results, .. }) => {
            let organic_results = organic_results.unwrap_or_default();
            tracing::info!(query, results = organic_results.len(), "market search complete");
            MarketSearch::Found(organic_results)
        }
        Err(error) => {
            tracing::warn!(query, %error, "market search failed, continuing without market data");
            MarketSearch::Unavailable {
                reason: error.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoints;

    #[test]
    fn query_and_key_are_encoded() {
        let config = Config {
            endpoints: Endpoints::all("http://localhost:9"),
            ..Config::default()
        };
        let url = search_url(&config, "k&y", "Pyrex 4 qt bowl");
        assert_eq!(
            url,
            "http://localhost:9/search.json?engine=ebay&_nkw=Pyrex%204%20qt%20bowl&LH_Complete=1&LH_Sold=1&_sop=13&api_key=k%26y"
        );
    }

    #[tokio::test]
    async fn missing_key_skips_the_search() {
        let client = reqwest::Client::new();
        let search = search_sold(&client, &Config::default(), "lamp").await;
        assert!(matches!(search, MarketSearch::Unavailable { .. }));
        assert!(search.listings().is_empty());
    }

    #[test]
    fn mixed_listing_shapes_decode_as_one_reply() {
        let body = r#"{
            "organic_results": [
                {"title": "Vintage Pyrex bowls", "price": "$30.00"},
                {"title": null, "price": {"extracted": 18.5, "raw": "$18.50"}},
                {"title": "Pyrex set", "price": {"extracted": 42.0, "raw": "$42.00"}}
            ]
        }"#;
        let reply: SearchReply = serde_json::from_str(body).unwrap();
        let listings = reply.organic_results.unwrap();
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[0].price_value(), Some(30.0));
        assert_eq!(listings[1].price_value(), Some(18.5));

        let reply: SearchReply = serde_json::from_str(r#"{"organic_results": null}"#).unwrap();
        assert!(reply.organic_results.is_none());
    }
}
