//! Trello REST client backing the ticket board.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::{
    http_json_client::{HttpClientSettings, HttpJsonClient},
    ticket_board::{BoardCard, BoardList, NewCard, TicketBoard},
};

pub const DEFAULT_TRELLO_API_BASE: &str = "https://api.trello.com/1";

#[derive(Debug, Deserialize)]
struct CreatedObject {
    id: String,
}

#[derive(Clone)]
pub struct TrelloApiClient {
    client: HttpJsonClient,
    api_base: String,
    api_key: String,
    token: String,
}

impl TrelloApiClient {
    pub fn new(
        api_base: &str,
        api_key: &str,
        token: &str,
        settings: HttpClientSettings,
    ) -> Result<Self> {
        Ok(Self {
            client: HttpJsonClient::new("trello", "drivewatch", HeaderMap::new(), settings)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            token: token.trim().to_string(),
        })
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> reqwest::RequestBuilder {
        self.client
            .http()
            .request(method, format!("{}/{path}", self.api_base))
            .query(&[("key", self.api_key.as_str()), ("token", self.token.as_str())])
            .query(params)
    }
}

#[async_trait]
impl TicketBoard for TrelloApiClient {
    async fn board_lists(&self, board_id: &str) -> Result<Vec<BoardList>> {
        let path = format!("boards/{board_id}/lists");
        Ok(self
            .client
            .request_json("boards.lists", || {
                self.request(reqwest::Method::GET, &path, &[("fields", "name")])
            })
            .await?)
    }

    async fn list_cards(&self, list_id: &str) -> Result<Vec<BoardCard>> {
        let path = format!("lists/{list_id}/cards");
        Ok(self
            .client
            .request_json("lists.cards", || {
                self.request(reqwest::Method::GET, &path, &[])
            })
            .await?)
    }

    async fn create_card(&self, card: &NewCard) -> Result<BoardCard> {
        Ok(self
            .client
            .request_json("cards.create", || {
                self.request(
                    reqwest::Method::POST,
                    "cards",
                    &[
                        ("idList", card.list_id.as_str()),
                        ("name", card.name.as_str()),
                        ("desc", card.desc.as_str()),
                        ("due", card.due.as_str()),
                    ],
                )
            })
            .await?)
    }

    async fn create_checklist(&self, card_id: &str, name: &str) -> Result<String> {
        let path = format!("cards/{card_id}/checklists");
        let created: CreatedObject = self
            .client
            .request_json("checklists.create", || {
                self.request(reqwest::Method::POST, &path, &[("name", name)])
            })
            .await?;
        Ok(created.id)
    }

    async fn add_checklist_item(&self, checklist_id: &str, name: &str) -> Result<()> {
        let path = format!("checklists/{checklist_id}/checkItems");
        self.client
            .request_empty("checkItems.create", || {
                self.request(reqwest::Method::POST, &path, &[("name", name)])
            })
            .await?;
        Ok(())
    }

    async fn attach_url(&self, card_id: &str, url: &str) -> Result<()> {
        let path = format!("cards/{card_id}/attachments");
        self.client
            .request_empty("attachments.create", || {
                self.request(reqwest::Method::POST, &path, &[("url", url)])
            })
            .await?;
        Ok(())
    }

    async fn close_card(&self, card_id: &str) -> Result<()> {
        let path = format!("cards/{card_id}");
        self.client
            .request_empty("cards.update", || {
                self.request(reqwest::Method::PUT, &path, &[("closed", "true")])
            })
            .await?;
        Ok(())
    }
}
