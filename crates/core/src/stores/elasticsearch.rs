use crate::traits::ProductIndex;
use crate::{Product, SearchError, SearchPage, SearchQuery};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

const BACKEND: &str = "elasticsearch";

pub struct ElasticsearchStore {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
    dedupe: bool,
}

impl ElasticsearchStore {
    pub fn new(endpoint: impl Into<String>, index_name: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index_name: index_name.into(),
            dedupe: false,
        }
    }

    /// Write documents under [`Product::document_id`] so re-indexing the same
    /// product overwrites instead of duplicating.
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.index_name)
    }
}

#[async_trait]
impl ProductIndex for ElasticsearchStore {
    async fn ensure_index(&self) -> Result<(), SearchError> {
        let response = self.client.head(self.index_url()).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response).await);
        }

        let response = self
            .client
            .put(self.index_url())
            .json(&index_definition())
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // Another process may have created it between HEAD and PUT.
        if error_type(&body).as_deref() == Some("resource_already_exists_exception") {
            return Ok(());
        }

        Err(SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: describe_failure(status, &body),
        })
    }

    async fn index_document(&self, product: &Product) -> Result<(), SearchError> {
        let request = if self.dedupe {
            self.client
                .put(format!("{}/_doc/{}", self.index_url(), product.document_id()))
        } else {
            self.client.post(format!("{}/_doc", self.index_url()))
        };

        let response = request.json(product).send().await?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let response = self
            .client
            .post(format!("{}/_search", self.index_url()))
            .json(&search_body(query))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let response_json: Value = response.json().await?;
        parse_search_response(&response_json)
    }
}

pub fn index_definition() -> Value {
    let text_with_keyword = json!({
        "type": "text",
        "fields": {
            "keyword": {"type": "keyword", "ignore_above": 256}
        }
    });

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 0
        },
        "mappings": {
            "properties": {
                "productName": text_with_keyword,
                "prices": text_with_keyword
            }
        }
    })
}

pub fn search_body(query: &SearchQuery) -> Value {
    json!({
        "size": query.top_k,
        "track_total_hits": true,
        "query": {
            "multi_match": {
                "query": query.text,
                "fields": [format!("productName^{}", query.name_boost), "prices"],
                "fuzziness": query.fuzziness
            }
        },
        "sort": [
            {"_score": {"order": "desc"}}
        ]
    })
}

pub fn parse_search_response(response_json: &Value) -> Result<SearchPage, SearchError> {
    let hits = response_json
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut products = Vec::with_capacity(hits.len());
    for raw in hits {
        let source = raw.pointer("/_source").cloned().unwrap_or(Value::Null);
        if source.is_null() {
            continue;
        }
        products.push(serde_json::from_value::<Product>(source)?);
    }

    // 7.x+ reports `{"value": n, "relation": ..}`, 6.x a bare number.
    let total = response_json
        .pointer("/hits/total/value")
        .and_then(Value::as_u64)
        .or_else(|| response_json.pointer("/hits/total").and_then(Value::as_u64))
        .unwrap_or(products.len() as u64);

    Ok(SearchPage {
        hits: products,
        total,
    })
}

async fn backend_error(response: Response) -> SearchError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: describe_failure(status, &body),
    }
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    let reason = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        value
            .pointer("/error/reason")
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    match reason {
        Some(reason) => format!("{status}: {reason}"),
        None if body.trim().is_empty() => status.to_string(),
        None => format!("{status}: {}", body.trim()),
    }
}

fn error_type(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body).ok().and_then(|value| {
        value
            .pointer("/error/type")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}
