use serde::Deserialize;
use std::sync::Arc;

use super::error::FetchError;
use super::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRecord {
    pub id: u32,
    pub name: String,
    pub air_date: String,
    pub episode_code: String,
    pub character_refs: Vec<String>,
    pub source_url: String,
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub total_count: u32,
    pub total_pages: u32,
    pub next_page: Option<String>,
    pub prev_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodePage {
    pub episodes: Vec<EpisodeRecord>,
    pub info: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CharacterRecord {
    pub name: String,
    pub species: String,
    #[serde(rename = "image")]
    pub image_ref: String,
}

#[derive(Debug, Deserialize)]
struct EpisodeResponse {
    info: InfoData,
    results: Vec<EpisodeData>,
}

#[derive(Debug, Deserialize)]
struct InfoData {
    count: u32,
    pages: u32,
    next: Option<String>,
    #[serde(default)]
    prev: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeData {
    id: u32,
    name: String,
    air_date: String,
    episode: String,
    characters: Vec<String>,
    url: String,
    created: String,
}

impl From<EpisodeData> for EpisodeRecord {
    fn from(e: EpisodeData) -> Self {
        EpisodeRecord {
            id: e.id,
            name: e.name,
            air_date: e.air_date,
            episode_code: e.episode,
            character_refs: e.characters,
            source_url: e.url,
            created: e.created,
        }
    }
}

fn parse_episode_page(response: EpisodeResponse) -> EpisodePage {
    EpisodePage {
        episodes: response.results.into_iter().map(EpisodeRecord::from).collect(),
        info: PageInfo {
            total_count: response.info.count,
            total_pages: response.info.pages,
            next_page: response.info.next,
            prev_page: response.info.prev,
        },
    }
}

pub fn decode_episode_page(bytes: &[u8]) -> Result<EpisodePage, FetchError> {
    let response: EpisodeResponse = serde_json::from_slice(bytes)?;
    Ok(parse_episode_page(response))
}

pub fn decode_character(bytes: &[u8]) -> Result<CharacterRecord, FetchError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Fetches single pages of the episode list. Accumulating pages is the
/// caller's job, see [`super::pagination::Pagination`].
#[derive(Clone)]
pub struct EpisodeListFetcher {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl EpisodeListFetcher {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}/episode?page={}", self.base_url, page)
    }

    pub async fn fetch_page(&self, page: u32) -> Result<EpisodePage, FetchError> {
        if page == 0 {
            return Err(FetchError::InvalidPage(page));
        }

        let url = self.page_url(page);
        let bytes = self.transport.get_bytes(&url).await?;
        let parsed = decode_episode_page(&bytes)?;
        log::info!(
            "fetched episode page {page}: {} episodes ({} total, {} pages)",
            parsed.episodes.len(),
            parsed.info.total_count,
            parsed.info.total_pages
        );
        Ok(parsed)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const BASE_URL: &str = "https://rickandmortyapi.com/api";

    pub fn episode_json(id: u32, code: &str, characters: &[&str]) -> String {
        let refs: Vec<String> = characters.iter().map(|c| format!("\"{c}\"")).collect();
        format!(
            r#"{{
                "id": {id},
                "name": "Episode {id}",
                "air_date": "December 2, 2013",
                "episode": "{code}",
                "characters": [{}],
                "url": "https://rickandmortyapi.com/api/episode/{id}",
                "created": "2017-11-10T12:56:33.798Z"
            }}"#,
            refs.join(",")
        )
    }

    pub fn page_json(pages: u32, next: Option<&str>, results: &[String]) -> String {
        let next = next
            .map(|n| format!("\"{n}\""))
            .unwrap_or_else(|| "null".to_string());
        format!(
            r#"{{ "info": {{ "count": 36, "pages": {pages}, "next": {next}, "prev": null }},
                 "results": [{}] }}"#,
            results.join(",")
        )
    }

    pub const PILOT_PAGE: &str = r#"{
        "info": {
            "count": 36,
            "pages": 2,
            "next": "https://rickandmortyapi.com/api/episode?page=2",
            "prev": null
        },
        "results": [
            {
                "id": 1,
                "name": "Pilot",
                "air_date": "December 2, 2013",
                "episode": "S01E01",
                "characters": [
                    "https://rickandmortyapi.com/api/character/1",
                    "https://rickandmortyapi.com/api/character/2"
                ],
                "url": "https://rickandmortyapi.com/api/episode/1",
                "created": "2017-11-10T12:56:33.798Z"
            }
        ]
    }"#;

    pub const RICK_JSON: &str = r#"{
        "id": 1,
        "name": "Rick Sanchez",
        "status": "Alive",
        "species": "Human",
        "image": "https://rickandmortyapi.com/api/character/avatar/1.jpeg"
    }"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::backend::transport::fake::FakeTransport;

    fn fetcher(transport: &Arc<FakeTransport>) -> EpisodeListFetcher {
        EpisodeListFetcher::new(transport.clone(), BASE_URL)
    }

    #[tokio::test]
    async fn test_fetch_first_page() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(&format!("{BASE_URL}/episode?page=1"), PILOT_PAGE);

        let page = fetcher(&transport).fetch_page(1).await.unwrap();

        assert_eq!(page.info.total_count, 36);
        assert_eq!(page.info.total_pages, 2);
        assert_eq!(
            page.info.next_page.as_deref(),
            Some("https://rickandmortyapi.com/api/episode?page=2")
        );
        assert_eq!(page.info.prev_page, None);

        assert_eq!(page.episodes.len(), 1);
        let pilot = &page.episodes[0];
        assert_eq!(pilot.id, 1);
        assert_eq!(pilot.name, "Pilot");
        assert_eq!(pilot.air_date, "December 2, 2013");
        assert_eq!(pilot.episode_code, "S01E01");
        assert_eq!(pilot.character_refs.len(), 2);
        assert_eq!(pilot.source_url, "https://rickandmortyapi.com/api/episode/1");
        assert_eq!(pilot.created, "2017-11-10T12:56:33.798Z");
    }

    #[tokio::test]
    async fn test_request_carries_page_number() {
        let transport = Arc::new(FakeTransport::new());
        let body = page_json(3, None, &[episode_json(21, "S02E10", &[])]);
        transport.respond(&format!("{BASE_URL}/episode?page=3"), body);

        let page = fetcher(&transport).fetch_page(3).await.unwrap();

        assert_eq!(transport.requests(), vec![format!("{BASE_URL}/episode?page=3")]);
        assert_eq!(page.episodes[0].episode_code, "S02E10");
        assert_eq!(page.info.next_page, None);
    }

    #[tokio::test]
    async fn test_page_zero_is_rejected_without_request() {
        let transport = Arc::new(FakeTransport::new());
        let err = fetcher(&transport).fetch_page(0).await.unwrap_err();

        assert_eq!(err, FetchError::InvalidPage(0));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_field_is_decode_error() {
        let transport = Arc::new(FakeTransport::new());
        // no "air_date"
        let body = r#"{ "info": { "count": 1, "pages": 1, "next": null },
            "results": [ { "id": 1, "name": "Pilot", "episode": "S01E01",
                "characters": [], "url": "u", "created": "c" } ] }"#;
        transport.respond(&format!("{BASE_URL}/episode?page=1"), body);

        let err = fetcher(&transport).fetch_page(1).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(&format!("{BASE_URL}/episode?page=1"), "<html>oops</html>");

        let err = fetcher(&transport).fetch_page(1).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        let transport = Arc::new(FakeTransport::new());
        transport.fail(
            &format!("{BASE_URL}/episode?page=1"),
            FetchError::Transport("dns error".to_string()),
        );

        let err = fetcher(&transport).fetch_page(1).await.unwrap_err();
        assert_eq!(err, FetchError::Transport("dns error".to_string()));
    }

    #[test]
    fn test_decode_character_ignores_unknown_fields() {
        let rick = decode_character(RICK_JSON.as_bytes()).unwrap();
        assert_eq!(rick.name, "Rick Sanchez");
        assert_eq!(rick.species, "Human");
        assert_eq!(
            rick.image_ref,
            "https://rickandmortyapi.com/api/character/avatar/1.jpeg"
        );
    }

    #[test]
    fn test_decode_character_requires_image() {
        let err = decode_character(br#"{ "name": "Rick", "species": "Human" }"#).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
