use async_trait::async_trait;
use config::{ApiConfig, RetryPolicy};
use core_types::{
    ApiError, ApiResult, MergeRequest, Note, NoteApi, NoteAtRevision, NoteCreateInput,
    NoteUpdateInput, RevertRequest, Revision, RevisionDiff, RevisionId, ScoredNote, SearchQuery,
};
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// `NoteApi` over the note service's JSON HTTP interface.
pub struct HttpNoteApi {
    client: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpNoteApi {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let base_url = parse_base_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| {
                ApiError::InvalidRequest(format!("failed to build http client: {err}"))
            })?;
        Ok(Self {
            client,
            base_url,
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::InvalidRequest(format!(
                    "base url `{}` cannot hold a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<F>(&self, method: Method, url: Url, build: F) -> ApiResult<String>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Send + Sync,
    {
        let max_attempts = if is_idempotent(&method) {
            self.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            debug!(%method, url = %url, attempt, "note service request");
            let request = build(self.client.request(method.clone(), url.clone()));
            match read_response(request.send().await, &url).await {
                Ok(text) => {
                    debug!(%method, url = %url, bytes = text.len(), "note service response");
                    return Ok(text);
                }
                Err(err) if attempt < max_attempts && err.is_retriable() => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        %method,
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying note service request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(%method, url = %url, attempt, error = %err, "note service request failed");
                    return Err(err);
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        let url = self.endpoint(segments)?;
        let text = self.execute(Method::GET, url, |req| req).await?;
        decode_payload(&text)
    }
}

#[async_trait]
impl NoteApi for HttpNoteApi {
    async fn list_notes(&self, include_archived: bool) -> ApiResult<Vec<Note>> {
        let url = self.endpoint(&["notes"])?;
        let text = self
            .execute(Method::GET, url, |req| {
                req.query(&[("include_archived", include_archived)])
            })
            .await?;
        decode_payload(&text)
    }

    async fn get_note(&self, id: &str) -> ApiResult<Note> {
        self.get(&["notes", id]).await
    }

    async fn create_note(&self, input: &NoteCreateInput) -> ApiResult<Note> {
        let url = self.endpoint(&["notes"])?;
        let text = self
            .execute(Method::POST, url, |req| req.json(input))
            .await?;
        decode_payload(&text)
    }

    async fn update_note(&self, id: &str, input: &NoteUpdateInput) -> ApiResult<Note> {
        let url = self.endpoint(&["notes", id])?;
        let text = self.execute(Method::PUT, url, |req| req.json(input)).await?;
        decode_payload(&text)
    }

    async fn archive_note(&self, id: &str) -> ApiResult<Note> {
        let url = self.endpoint(&["notes", id, "archive"])?;
        let text = self.execute(Method::POST, url, |req| req).await?;
        decode_payload(&text)
    }

    async fn delete_note(&self, id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["notes", id])?;
        self.execute(Method::DELETE, url, |req| req).await?;
        Ok(())
    }

    async fn search_notes(&self, query: &SearchQuery) -> ApiResult<Vec<ScoredNote>> {
        let url = self.endpoint(&["notes", "search"])?;
        let body = SearchBody::from(query);
        let text = self
            .execute(Method::POST, url, |req| req.json(&body))
            .await?;
        decode_scored(&text)
    }

    async fn similar_notes(&self, id: &str, limit: usize) -> ApiResult<Vec<ScoredNote>> {
        let url = self.endpoint(&["notes", id, "similar"])?;
        let text = self
            .execute(Method::GET, url, |req| req.query(&[("limit", limit)]))
            .await?;
        decode_scored(&text)
    }

    async fn all_tags(&self) -> ApiResult<Vec<String>> {
        let list: TagList = self.get(&["notes", "tags", "all"]).await?;
        Ok(list.tags)
    }

    async fn notes_by_tag(&self, tag: &str) -> ApiResult<Vec<Note>> {
        self.get(&["notes", "tag", tag]).await
    }

    async fn merge_notes(&self, request: &MergeRequest) -> ApiResult<Note> {
        let url = self.endpoint(&["notes", "merge"])?;
        let text = self
            .execute(Method::POST, url, |req| req.json(request))
            .await?;
        decode_payload(&text)
    }

    async fn list_revisions(&self, note_id: &str) -> ApiResult<Vec<Revision>> {
        self.get(&["notes", note_id, "revisions"]).await
    }

    async fn get_revision(&self, revision_id: RevisionId) -> ApiResult<Revision> {
        let revision_id = revision_id.to_string();
        self.get(&["notes", "revision", revision_id.as_str()]).await
    }

    async fn revision_diff(&self, revision_id: RevisionId) -> ApiResult<RevisionDiff> {
        let revision_id = revision_id.to_string();
        self.get(&["notes", "revision", revision_id.as_str(), "diff"]).await
    }

    async fn revert_to_revision(
        &self,
        revision_id: RevisionId,
        request: &RevertRequest,
    ) -> ApiResult<Note> {
        let revision_id = revision_id.to_string();
        let url = self.endpoint(&["notes", "revision", revision_id.as_str(), "revert"])?;
        let text = self
            .execute(Method::POST, url, |req| req.query(request))
            .await?;
        decode_payload(&text)
    }

    async fn note_at_revision(
        &self,
        note_id: &str,
        revision_number: u32,
    ) -> ApiResult<NoteAtRevision> {
        let number = revision_number.to_string();
        self.get(&["notes", note_id, "revision", number.as_str(), "content"])
            .await
    }
}

fn parse_base_url(raw: &str) -> ApiResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|err| {
        ApiError::InvalidRequest(format!("invalid api base url `{raw}`: {err}"))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::InvalidRequest(format!(
            "api base url `{raw}` must use http or https"
        )));
    }
    Ok(url)
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::PUT | Method::DELETE)
}

async fn read_response(sent: reqwest::Result<reqwest::Response>, url: &Url) -> ApiResult<String> {
    let response = sent.map_err(map_transport_error)?;
    let status = response.status();
    let text = response.text().await.map_err(map_transport_error)?;
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(url.path().to_string()));
    }
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(err.to_string())
    } else if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Transport(err.to_string())
    }
}

/// Some server builds wrap payloads as `{"data": ..., "status": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

fn decode_payload<T: DeserializeOwned>(text: &str) -> ApiResult<T> {
    match serde_json::from_str::<Envelope<T>>(text) {
        Ok(Envelope::Wrapped { data }) | Ok(Envelope::Bare(data)) => Ok(data),
        // untagged errors are vague, so decode again for the real reason
        Err(_) => serde_json::from_str::<T>(text).map_err(|err| ApiError::Decode(err.to_string())),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchHit {
    Scored(ScoredNote),
    Bare(Note),
}

fn decode_scored(text: &str) -> ApiResult<Vec<ScoredNote>> {
    let hits: Vec<SearchHit> = decode_payload(text)?;
    Ok(hits
        .into_iter()
        .map(|hit| match hit {
            SearchHit::Scored(scored) => scored,
            SearchHit::Bare(note) => ScoredNote {
                note,
                similarity_score: 1.0,
            },
        })
        .collect())
}

#[derive(Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    tags: Option<&'a [String]>,
    semantic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(rename = "includeArchived")]
    include_archived: bool,
    // server versions differ on the flag name; send both
    archived: bool,
}

impl<'a> From<&'a SearchQuery> for SearchBody<'a> {
    fn from(query: &'a SearchQuery) -> Self {
        Self {
            query: &query.query,
            tags: query.tags.as_deref(),
            semantic: query.semantic,
            limit: query.limit,
            include_archived: query.include_archived,
            archived: query.include_archived,
        }
    }
}
