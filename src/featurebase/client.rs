//! REST client for the Featurebase v2 API.

use async_trait::async_trait;
use serde::Deserialize;

use super::FeaturebasePost;
use crate::error::{DashboardError, Result};
use crate::sources::{warn_if_truncated, CommunitySource};
use crate::text::strip_html;

const FEATUREBASE_API_URL: &str = "https://do.featurebase.app/v2/posts";
const PAGE_SIZE: u32 = 100;
const MAX_PAGES: u32 = 50;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostsPage {
    results: Vec<PostNode>,
    #[serde(default)]
    total_pages: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostNode {
    id: String,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    post_url: Option<String>,
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    upvotes: Option<u32>,
}

impl PostNode {
    fn into_post(self, board_base: &str) -> FeaturebasePost {
        let url = self.post_url.unwrap_or_else(|| match &self.slug {
            Some(slug) => format!("{}/p/{}", board_base.trim_end_matches('/'), slug),
            None => String::new(),
        });

        FeaturebasePost {
            id: self.id,
            title: self.title,
            content: self.content.map(|c| strip_html(&c)).unwrap_or_default(),
            url,
            upvotes: self.upvotes.unwrap_or(0),
        }
    }
}

pub struct FeaturebaseClient {
    client: reqwest::Client,
    api_key: String,
    board_base: String,
}

impl FeaturebaseClient {
    /// `board_base` is the public board URL, used to build post links when the
    /// API omits `postUrl`.
    pub fn new(api_key: &str, board_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            board_base: board_base.to_string(),
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<PostsPage> {
        let resp = self
            .client
            .get(FEATUREBASE_API_URL)
            .header("X-API-Key", self.api_key.clone())
            .query(&[("limit", PAGE_SIZE), ("page", page)])
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(DashboardError::RateLimited {
                service: "Featurebase",
            });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DashboardError::Api {
                service: "Featurebase",
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(resp.json().await?)
    }

    pub async fn fetch_posts(&self) -> Result<Vec<FeaturebasePost>> {
        let mut posts = Vec::new();
        let mut page = 1;

        loop {
            let body = self.fetch_page(page).await?;
            let total_pages = body.total_pages.unwrap_or(1);
            let received = body.results.len();
            posts.extend(
                body.results
                    .into_iter()
                    .map(|p| p.into_post(&self.board_base)),
            );

            if received == 0 || page >= total_pages {
                break;
            }
            if page >= MAX_PAGES {
                warn_if_truncated("Featurebase", true, MAX_PAGES as usize, posts.len());
                break;
            }
            page += 1;
        }

        log::info!("Featurebase: fetched {} posts", posts.len());
        Ok(posts)
    }
}

#[async_trait]
impl CommunitySource for FeaturebaseClient {
    async fn list_posts(&self) -> Result<Vec<FeaturebasePost>> {
        self.fetch_posts().await
    }
}
