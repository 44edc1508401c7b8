//! Stock image provider APIs.
//!
//! Each provider differs in endpoint, authentication and response shape;
//! this module hides those differences behind [`ImageProvider`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DaemonError, Result};

/// Supported stock image search APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    Unsplash,
    Pexels,
    Pixabay,
}

/// Best search result reduced to what the cache needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHit {
    /// Direct URL of the image file.
    pub image_url: String,
    /// Attribution line required by the provider license.
    pub attribution: String,
}

/// A provider search call, independent of the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub url: String,
    pub params: Vec<(&'static str, String)>,
    pub authorization: Option<String>,
}

impl ImageProvider {
    /// Parses a provider name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unsplash" => Some(ImageProvider::Unsplash),
            "pexels" => Some(ImageProvider::Pexels),
            "pixabay" => Some(ImageProvider::Pixabay),
            _ => None,
        }
    }

    /// Returns the string name of this provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageProvider::Unsplash => "unsplash",
            ImageProvider::Pexels => "pexels",
            ImageProvider::Pixabay => "pixabay",
        }
    }

    /// Returns the license images from this provider are published under.
    pub fn license(&self) -> &'static str {
        match self {
            ImageProvider::Unsplash => "Unsplash License",
            ImageProvider::Pexels => "Pexels License",
            ImageProvider::Pixabay => "Pixabay License",
        }
    }

    /// Returns the public API origin.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ImageProvider::Unsplash => "https://api.unsplash.com",
            ImageProvider::Pexels => "https://api.pexels.com",
            ImageProvider::Pixabay => "https://pixabay.com",
        }
    }

    /// Builds the search call for `query` against `base_url`.
    pub fn search_request(&self, base_url: &str, query: &str, api_key: &str) -> SearchRequest {
        let base = base_url.trim_end_matches('/');
        match self {
            ImageProvider::Unsplash => SearchRequest {
                url: format!("{}/search/photos", base),
                params: vec![("query", query.to_string()), ("per_page", "1".to_string())],
                authorization: Some(format!("Client-ID {}", api_key)),
            },
            ImageProvider::Pexels => SearchRequest {
                url: format!("{}/v1/search", base),
                params: vec![("query", query.to_string()), ("per_page", "1".to_string())],
                authorization: Some(api_key.to_string()),
            },
            ImageProvider::Pixabay => SearchRequest {
                url: format!("{}/api/", base),
                params: vec![
                    ("key", api_key.to_string()),
                    ("q", query.to_string()),
                    ("per_page", "3".to_string()),
                    ("image_type", "photo".to_string()),
                ],
                authorization: None,
            },
        }
    }

    /// Extracts the first hit from a search response.
    ///
    /// An empty or missing result list is `Ok(None)`. A first result
    /// without the expected fields is a provider error.
    pub fn parse_search_response(&self, body: &Value) -> Result<Option<ImageHit>> {
        let (list_field, url_path, author_path): (&str, &[&str], &[&str]) = match self {
            ImageProvider::Unsplash => ("results", &["urls", "regular"][..], &["user", "name"][..]),
            ImageProvider::Pexels => ("photos", &["src", "large"][..], &["photographer"][..]),
            ImageProvider::Pixabay => ("hits", &["largeImageURL"][..], &["user"][..]),
        };

        let Some(first) = body
            .get(list_field)
            .and_then(Value::as_array)
            .and_then(|list| list.first())
        else {
            return Ok(None);
        };

        let image_url = lookup_str(first, url_path).ok_or_else(|| {
            DaemonError::provider_failed(
                self.as_str(),
                format!("result has no {}", url_path.join(".")),
            )
        })?;
        let author = lookup_str(first, author_path).unwrap_or("Unknown");

        Ok(Some(ImageHit {
            image_url: image_url.to_string(),
            attribution: self.attribution(author),
        }))
    }

    fn attribution(&self, author: &str) -> String {
        match self {
            ImageProvider::Unsplash => format!("Photo by {} on Unsplash", author),
            ImageProvider::Pexels => format!("Photo by {} on Pexels", author),
            ImageProvider::Pixabay => format!("Image by {} from Pixabay", author),
        }
    }
}

impl std::fmt::Display for ImageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lookup_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, field| v.get(*field))
        .and_then(Value::as_str)
}

/// Cache key for a provider search: `"{provider}:{lowercased, trimmed query}"`.
pub fn cache_key(query: &str, provider: ImageProvider) -> String {
    format!("{}:{}", provider.as_str(), query.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_parse() {
        assert_eq!(ImageProvider::parse("unsplash"), Some(ImageProvider::Unsplash));
        assert_eq!(ImageProvider::parse(" Pexels "), Some(ImageProvider::Pexels));
        assert_eq!(ImageProvider::parse("PIXABAY"), Some(ImageProvider::Pixabay));
        assert_eq!(ImageProvider::parse("flickr"), None);
    }

    #[test]
    fn cache_key_normalizes_query() {
        assert_eq!(cache_key("  De Fiets ", ImageProvider::Unsplash), "unsplash:de fiets");
        assert_eq!(
            cache_key("de fiets", ImageProvider::Unsplash),
            cache_key("DE FIETS", ImageProvider::Unsplash)
        );
        assert_ne!(
            cache_key("kat", ImageProvider::Unsplash),
            cache_key("kat", ImageProvider::Pexels)
        );
    }

    #[test]
    fn unsplash_request_uses_client_id() {
        let req = ImageProvider::Unsplash.search_request("https://api.unsplash.com", "kat", "abc");
        assert_eq!(req.url, "https://api.unsplash.com/search/photos");
        assert_eq!(req.authorization.as_deref(), Some("Client-ID abc"));
        assert!(req.params.contains(&("per_page", "1".to_string())));
    }

    #[test]
    fn pixabay_request_puts_key_in_query() {
        let req = ImageProvider::Pixabay.search_request("https://pixabay.com/", "hond", "k");
        assert_eq!(req.url, "https://pixabay.com/api/");
        assert!(req.authorization.is_none());
        assert!(req.params.contains(&("key", "k".to_string())));
        assert!(req.params.contains(&("per_page", "3".to_string())));
        assert!(req.params.contains(&("image_type", "photo".to_string())));
    }

    #[test]
    fn parses_unsplash_response() {
        let body = json!({
            "total": 2,
            "results": [
                {
                    "urls": {"regular": "https://images.unsplash.com/a.jpg"},
                    "user": {"name": "Anna"}
                },
                {
                    "urls": {"regular": "https://images.unsplash.com/b.jpg"},
                    "user": {"name": "Bob"}
                }
            ]
        });
        let hit = ImageProvider::Unsplash.parse_search_response(&body).unwrap().unwrap();
        assert_eq!(hit.image_url, "https://images.unsplash.com/a.jpg");
        assert_eq!(hit.attribution, "Photo by Anna on Unsplash");
    }

    #[test]
    fn parses_pexels_response() {
        let body = json!({
            "photos": [{
                "src": {"large": "https://images.pexels.com/1.jpg"},
                "photographer": "Piet"
            }]
        });
        let hit = ImageProvider::Pexels.parse_search_response(&body).unwrap().unwrap();
        assert_eq!(hit.image_url, "https://images.pexels.com/1.jpg");
        assert_eq!(hit.attribution, "Photo by Piet on Pexels");
    }

    #[test]
    fn parses_pixabay_response() {
        let body = json!({
            "hits": [{"largeImageURL": "https://pixabay.com/get/x.jpg", "user": "kees"}]
        });
        let hit = ImageProvider::Pixabay.parse_search_response(&body).unwrap().unwrap();
        assert_eq!(hit.attribution, "Image by kees from Pixabay");
    }

    #[test]
    fn empty_results_are_none() {
        assert!(ImageProvider::Pexels
            .parse_search_response(&json!({"photos": []}))
            .unwrap()
            .is_none());
        assert!(ImageProvider::Pixabay
            .parse_search_response(&json!({"total": 0}))
            .unwrap()
            .is_none());
    }

    #[test]
    fn result_without_url_is_error() {
        let body = json!({"results": [{"user": {"name": "Anna"}}]});
        let err = ImageProvider::Unsplash.parse_search_response(&body).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ImageProviderFailed);
    }
}
