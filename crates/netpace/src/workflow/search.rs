use std::collections::HashSet;

use url::Url;

use super::{absorb, Workflow};
use crate::config::SearchSettings;
use crate::error::{BotError, BotResult};
use crate::page::PageAdapter;

/// Job title, company and location, blank tokens dropped.
pub fn build_query(search: &SearchSettings) -> String {
    [&search.job_title, &search.company, &search.location]
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn search_url(base_url: &str, query: &str, page: u32) -> BotResult<String> {
    let endpoint = format!("{}/search/results/people/", base_url.trim_end_matches('/'));
    let page = page.to_string();
    let url = Url::parse_with_params(&endpoint, &[("keywords", query), ("page", page.as_str())])
        .map_err(|e| BotError::Config(format!("base_url '{base_url}': {e}")))?;
    Ok(url.into())
}

/// Absolute URL without query, fragment or trailing slash. `None` for
/// unparsable or non-http hrefs.
pub fn canonicalize_profile_url(base: &Url, href: &str) -> Option<String> {
    let mut url = base.join(href.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    Some(url.into())
}

impl Workflow {
    /// Collect candidate profile URLs, deduplicated, in page order.
    pub async fn search(&self, page: &mut dyn PageAdapter) -> BotResult<Vec<String>> {
        let config = &self.config;
        let base = Url::parse(&config.base_url)
            .map_err(|e| BotError::Config(format!("base_url '{}': {e}", config.base_url)))?;
        let query = build_query(&config.search);
        tracing::info!(query = %query, pages = config.search.pagination_pages, "searching");

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for n in 1..=config.search.pagination_pages {
            self.pacer().check_cancelled()?;
            let url = search_url(&config.base_url, &query, n)?;
            if let Err(e) = self.navigate_with_retry(page, &url).await {
                absorb(&url, "search", e)?;
                continue;
            }
            let links = match self.scan_results_page(page, &base).await {
                Ok(links) => links,
                Err(e) => {
                    absorb(&url, "search", e)?;
                    continue;
                }
            };

            let mut found = 0;
            for profile in links {
                if seen.insert(profile.clone()) {
                    candidates.push(profile);
                    found += 1;
                }
            }
            if found == 0 {
                tracing::warn!(page = n, "no new profiles on results page");
            } else {
                tracing::debug!(page = n, found, "results page scanned");
            }
        }
        tracing::info!(count = candidates.len(), "search complete");
        Ok(candidates)
    }

    /// Matching profile URLs on the loaded results page, in DOM order.
    async fn scan_results_page(&self, page: &mut dyn PageAdapter, base: &Url) -> BotResult<Vec<String>> {
        self.settle().await?;
        self.humanizer.scroll(page).await?;

        let mut profiles = Vec::new();
        for link in page.find_elements(&self.config.selectors.profile_link).await? {
            let Some(href) = page.read_attribute(&link, "href").await? else {
                continue;
            };
            let Some(profile) = canonicalize_profile_url(base, &href) else {
                continue;
            };
            if self.profile_pattern.is_match(&profile) {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }
}
