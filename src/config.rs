use std::collections::BTreeMap;
use std::env;

use url::Url;

use crate::error::{Error, Result};
use crate::tiers::BundleKey;

/// Upstream base URLs. Production values by default; tests point them at a
/// mock server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub stripe: String,
    pub resend: String,
    pub serpapi: String,
    pub anthropic: String,
    pub openai: String,
    pub convertkit: String,
    pub meta_graph: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            stripe: "https://api.stripe.com".to_string(),
            resend: "https://api.resend.com".to_string(),
            serpapi: "https://serpapi.com".to_string(),
            anthropic: "https://api.anthropic.com".to_string(),
            openai: "https://api.openai.com".to_string(),
            convertkit: "https://api.convertkit.com".to_string(),
            meta_graph: "https://graph.facebook.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Every upstream served from one base, as a mock server does.
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            stripe: base.clone(),
            resend: base.clone(),
            serpapi: base.clone(),
            anthropic: base.clone(),
            openai: base.clone(),
            convertkit: base.clone(),
            meta_graph: base,
        }
    }
}

/// Marketing-audience tags and sequences per bundle.
#[derive(Debug, Clone, Default)]
pub struct Audiences {
    pub tags: BTreeMap<BundleKey, String>,
    pub sequences: BTreeMap<BundleKey, String>,
    /// Applied when a purchase carries no recognisable product name.
    pub customer_tag: Option<String>,
}

impl Audiences {
    pub fn tag_for(&self, key: Option<BundleKey>) -> Option<&str> {
        key.and_then(|key| self.tags.get(&key))
            .or(self.customer_tag.as_ref())
            .map(String::as_str)
    }

    pub fn sequence_for(&self, key: BundleKey) -> Option<&str> {
        self.sequences.get(&key).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub resend_api_key: Option<String>,
    pub serpapi_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub convertkit_api_key: Option<String>,
    pub audiences: Audiences,
    pub meta_access_token: Option<String>,
    pub meta_pixel_id: String,
    pub meta_test_code: Option<String>,
    pub scan_log_url: Option<String>,
    pub from_email: String,
    pub admin_email: String,
    pub app_base_url: String,
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            resend_api_key: None,
            serpapi_key: None,
            anthropic_api_key: None,
            openai_api_key: None,
            convertkit_api_key: None,
            audiences: Audiences::default(),
            meta_access_token: None,
            meta_pixel_id: "1383551356849358".to_string(),
            meta_test_code: None,
            scan_log_url: None,
            from_email: "ItemValue <hello@itemvalue.app>".to_string(),
            admin_email: "hello@itemvalue.app".to_string(),
            app_base_url: "https://itemvalue.app".to_string(),
            endpoints: Endpoints::default(),
        }
    }
}

const TAG_VARS: [(BundleKey, &str); 6] = [
    (BundleKey::Single, "CK_TAG_SINGLE_SCAN"),
    (BundleKey::Starter, "CK_TAG_STARTER_PACK"),
    (BundleKey::Challenge, "CK_TAG_CHALLENGE"),
    (BundleKey::Weekend, "CK_TAG_WEEKEND"),
    (BundleKey::Moving, "CK_TAG_MOVING"),
    (BundleKey::Estate, "CK_TAG_ESTATE"),
];

const SEQUENCE_VARS: [(BundleKey, &str); 3] = [
    (BundleKey::Single, "CK_SEQUENCE_SINGLE"),
    (BundleKey::Starter, "CK_SEQUENCE_STARTER"),
    (BundleKey::Challenge, "CK_SEQUENCE_CHALLENGE"),
];

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Config::default();

        let audiences = Audiences {
            tags: TAG_VARS
                .iter()
                .filter_map(|(key, name)| var(*name).map(|tag| (*key, tag)))
                .collect(),
            sequences: SEQUENCE_VARS
                .iter()
                .filter_map(|(key, name)| var(*name).map(|sequence| (*key, sequence)))
                .collect(),
            customer_tag: var("CK_TAG_CUSTOMER"),
        };

        let base = |name: &str, default: String| -> Result<String> {
            let value = var(name).unwrap_or(default);
            validate_url(name, &value)?;
            Ok(value.trim_end_matches('/').to_string())
        };

        let endpoints = Endpoints {
            stripe: base("STRIPE_API_BASE", defaults.endpoints.stripe)?,
            resend: base("RESEND_API_BASE", defaults.endpoints.resend)?,
            serpapi: base("SERPAPI_BASE", defaults.endpoints.serpapi)?,
            anthropic: base("ANTHROPIC_API_BASE", defaults.endpoints.anthropic)?,
            openai: base("OPENAI_API_BASE", defaults.endpoints.openai)?,
            convertkit: base("CONVERTKIT_API_BASE", defaults.endpoints.convertkit)?,
            meta_graph: base("META_GRAPH_BASE", defaults.endpoints.meta_graph)?,
        };

        let scan_log_url = var("SCAN_LOG_URL");
        if let Some(url) = &scan_log_url {
            validate_url("SCAN_LOG_URL", url)?;
        }

        let app_base_url = base("APP_BASE_URL", defaults.app_base_url)?;

        Ok(Self {
            stripe_secret_key: var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            resend_api_key: var("RESEND_API_KEY"),
            serpapi_key: var("SERPAPI_KEY"),
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            openai_api_key: var("OPENAI_API_KEY"),
            convertkit_api_key: var("CONVERTKIT_API_KEY"),
            audiences,
            meta_access_token: var("META_ACCESS_TOKEN"),
            meta_pixel_id: var("META_PIXEL_ID").unwrap_or(defaults.meta_pixel_id),
            meta_test_code: var("META_TEST_CODE"),
            scan_log_url,
            from_email: var("FROM_EMAIL").unwrap_or(defaults.from_email),
            admin_email: var("ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            app_base_url,
            endpoints,
        })
    }

    /// A key the current function cannot run without.
    pub fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
        value
            .as_deref()
            .ok_or_else(|| Error::config(format!("{name} is not set")))
    }
}

fn validate_url(field_name: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| Error::config(format!("{field_name} is not a valid URL ({value}): {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::config(format!(
            "{field_name} uses unsupported URL scheme: {scheme}"
        ))),
    }
}
