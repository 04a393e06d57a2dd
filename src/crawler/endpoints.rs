//! URL construction for the platform's pages and REST endpoints

use crate::config::PlatformConfig;
use crate::record::ItemId;
use crate::ConfigError;
use chrono::NaiveDate;
use url::Url;

/// Builds every URL the crawler requests for one site
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
    site: String,
    locale: String,
}

impl Endpoints {
    pub fn new(base_url: &str, site: &str, locale: &str) -> Result<Self, ConfigError> {
        let base = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(format!(
                "base-url {} cannot carry a path",
                base_url
            )));
        }

        Ok(Self {
            base,
            site: site.trim_matches('/').to_string(),
            locale: locale.to_string(),
        })
    }

    pub fn from_config(config: &PlatformConfig) -> Result<Self, ConfigError> {
        Self::new(&config.base_url, &config.site, &config.locale)
    }

    /// Account landing page that embeds the anti-forgery token
    pub fn landing(&self) -> Url {
        self.build(
            "myaccount",
            &[
                ("onlineSiteId", "0"),
                ("from_original_cui", "true"),
                ("online", "true"),
                ("locale", &self.locale),
            ],
        )
    }

    pub fn sign_in(&self) -> Url {
        self.build("rest/user/signin", &[("locale", &self.locale)])
    }

    pub fn listing(&self) -> Url {
        self.build("rest/reservation/resource", &[("locale", &self.locale)])
    }

    pub fn detail(&self, id: &ItemId) -> Url {
        self.build_for_item("rest/reservation/resource/detail", id, &[])
    }

    /// Daily availability of one facility for a single date
    pub fn daily_availability(&self, id: &ItemId, date: NaiveDate) -> Url {
        let date = date.format("%Y-%m-%d").to_string();
        self.build_for_item(
            "rest/reservation/resource/availability/daily",
            id,
            &[
                ("start_date", &date),
                ("end_date", &date),
                ("customer_id", "0"),
                ("company_id", "0"),
                ("event_type_id", "-1"),
                ("attendee", "1"),
            ],
        )
    }

    fn build(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{}/{}/{}", prefix, self.site, path));

        url.set_query(None);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        url
    }

    /// Like `build`, with the item id appended as a single escaped segment
    fn build_for_item(&self, path: &str, id: &ItemId, query: &[(&str, &str)]) -> Url {
        let mut url = self.build(path, query);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&id.to_string());
        }
        url
    }
}
