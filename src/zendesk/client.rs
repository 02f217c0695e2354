//! REST client for the Zendesk tickets API (cursor pagination).

use async_trait::async_trait;
use serde::Deserialize;

use super::ZendeskTicket;
use crate::error::{DashboardError, Result};
use crate::sources::{warn_if_truncated, SupportSource};

const PAGE_SIZE: u32 = 100;
const MAX_PAGES: usize = 20;

#[derive(Deserialize)]
struct TicketsPage {
    tickets: Vec<TicketNode>,
    #[serde(default)]
    meta: Option<PageMeta>,
    #[serde(default)]
    links: Option<PageLinks>,
}

#[derive(Deserialize)]
struct PageMeta {
    has_more: bool,
}

#[derive(Deserialize)]
struct PageLinks {
    next: Option<String>,
}

#[derive(Deserialize)]
struct TicketNode {
    id: u64,
    subject: Option<String>,
    description: Option<String>,
    url: Option<String>,
}

impl From<TicketNode> for ZendeskTicket {
    fn from(t: TicketNode) -> Self {
        ZendeskTicket {
            id: t.id,
            subject: t.subject.unwrap_or_default(),
            description: t.description.unwrap_or_default(),
            url: t.url,
        }
    }
}

pub struct ZendeskClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl ZendeskClient {
    pub fn new(subdomain: &str, email: &str, api_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("https://{}.zendesk.com/api/v2", subdomain),
            email: email.to_string(),
            api_token: api_token.to_string(),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<TicketsPage> {
        let resp = self
            .client
            .get(url)
            .basic_auth(
                format!("{}/token", self.email),
                Some(self.api_token.clone()),
            )
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(DashboardError::RateLimited { service: "Zendesk" });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DashboardError::Api {
                service: "Zendesk",
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(resp.json().await?)
    }

    pub async fn fetch_tickets(&self) -> Result<Vec<ZendeskTicket>> {
        let mut tickets = Vec::new();
        let mut next = Some(format!(
            "{}/tickets.json?page[size]={}",
            self.base_url, PAGE_SIZE
        ));

        for _ in 0..MAX_PAGES {
            let Some(url) = next.take() else { break };
            let page = self.fetch_page(&url).await?;
            tickets.extend(page.tickets.into_iter().map(ZendeskTicket::from));

            let has_more = page.meta.map(|m| m.has_more).unwrap_or(false);
            if has_more {
                next = page.links.and_then(|l| l.next);
            }
        }
        warn_if_truncated("Zendesk", next.is_some(), MAX_PAGES, tickets.len());

        log::info!("Zendesk: fetched {} tickets", tickets.len());
        Ok(tickets)
    }
}

#[async_trait]
impl SupportSource for ZendeskClient {
    async fn list_tickets(&self) -> Result<Vec<ZendeskTicket>> {
        self.fetch_tickets().await
    }
}
