//! Minimal GraphQL client for subgraphs hosted on The Graph.

use {
    anyhow::{Context, Result, anyhow},
    reqwest::{Client, IntoUrl, Url},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    serde_json::{Map, Value},
};

pub const DEFAULT_GRAPH_API_BASE_URL: &str = "https://api.thegraph.com/subgraphs/name/";

/// Client for the subgraph at `<base_url>/<org>/<name>`.
#[derive(Clone, Debug)]
pub struct SubgraphClient {
    client: Client,
    url: Url,
}

impl SubgraphClient {
    pub fn new(
        base_url: impl IntoUrl,
        org: impl AsRef<str>,
        name: impl AsRef<str>,
        client: Client,
    ) -> Result<Self> {
        let base_url = base_url.into_url().context("invalid subgraph base url")?;
        let url = base_url
            .join(&format!("{}/", org.as_ref()))
            .and_then(|org_url| org_url.join(name.as_ref()))
            .with_context(|| format!("invalid subgraph {}/{}", org.as_ref(), name.as_ref()))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Runs `query` and decodes its `data`. GraphQL errors in the response
    /// fail the query.
    pub async fn query<T>(&self, query: &str, variables: Option<Map<String, Value>>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url.clone())
            .json(&Request { query, variables })
            .send()
            .await
            .with_context(|| format!("subgraph request to {} failed", self.url))?
            .error_for_status()?
            .json::<Response<T>>()
            .await
            .context("malformed subgraph response")?;
        response.into_data()
    }
}

#[derive(Serialize)]
struct Request<'a> {
    query: &'a str,
    variables: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Response<T> {
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct ResponseError {
    message: String,
}

impl<T> Response<T> {
    /// Data is only trusted if the subgraph reported no errors at all; partial
    /// data next to errors is dropped.
    fn into_data(self) -> Result<T> {
        let mut errors = self.errors.into_iter();
        match (self.data, errors.next()) {
            (Some(data), None) => Ok(data),
            (_, Some(first)) => {
                for other in errors {
                    tracing::warn!(message = %other.message, "additional GraphQL error");
                }
                Err(anyhow!("{}", first.message))
            }
            (None, None) => Err(anyhow!("GraphQL response has neither data nor errors")),
        }
    }
}

/// Subgraph `_meta` query returning the latest indexed block.
pub(crate) mod block_number_query {
    use serde::Deserialize;

    pub const QUERY: &str = r#"{
        _meta {
            block { number }
        }
    }"#;

    #[derive(Debug, Deserialize, PartialEq)]
    pub struct Data {
        #[serde(rename = "_meta")]
        pub meta: Meta,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    pub struct Meta {
        pub block: Block,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    pub struct Block {
        pub number: u64,
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn decode<T: DeserializeOwned>(response: Value) -> Result<T> {
        serde_json::from_value::<Response<T>>(response)
            .unwrap()
            .into_data()
    }

    #[test]
    fn request_body() {
        let variables = json_map! {
            "first" => 1000,
            "where" => json!({ "id": "0x01" }),
            "block" => Value::Null,
        };
        assert_eq!(
            serde_json::to_value(Request {
                query: "{ pools { id } }",
                variables: Some(variables),
            })
            .unwrap(),
            json!({
                "query": "{ pools { id } }",
                "variables": {
                    "first": 1000,
                    "where": { "id": "0x01" },
                    "block": null,
                },
            }),
        );
    }

    #[test]
    fn joins_org_and_name() {
        let client = SubgraphClient::new(
            DEFAULT_GRAPH_API_BASE_URL,
            "balancer-labs",
            "balancer-gauges",
            Client::new(),
        )
        .unwrap();
        assert_eq!(
            client.url().as_str(),
            "https://api.thegraph.com/subgraphs/name/balancer-labs/balancer-gauges"
        );
        assert!(SubgraphClient::new("not a url", "org", "name", Client::new()).is_err());
    }

    #[test]
    fn data_without_errors() {
        assert_eq!(decode::<u64>(json!({ "data": 7 })).unwrap(), 7);
    }

    #[test]
    fn first_error_fails_the_query() {
        let err = decode::<u64>(json!({
            "data": null,
            "errors": [{ "message": "indexing error" }, { "message": "second" }],
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "indexing error");

        // Partial data is not trusted.
        assert!(decode::<u64>(json!({ "data": 7, "errors": [{ "message": "x" }] })).is_err());
    }

    #[test]
    fn empty_response_is_an_error() {
        assert!(decode::<u64>(json!({})).is_err());
        assert!(decode::<u64>(json!({ "data": null, "errors": [] })).is_err());
    }

    #[test]
    fn decode_meta_block() {
        assert_eq!(
            decode::<block_number_query::Data>(json!({
                "data": { "_meta": { "block": { "number": 16_000_000 } } },
            }))
            .unwrap()
            .meta
            .block
            .number,
            16_000_000
        );
    }
}
