//! Shopify Admin GraphQL catalog source.
//!
//! The HTTP client is abstracted via [`HttpClient`] so the engine does not
//! depend on a particular HTTP library.

use crate::config::ShopifyConfig;
use crate::error::{SyncError, SyncResult};
use crate::source::{CatalogSource, Page, RawMetafield, RawRecord, RawVariant};
use serde::Deserialize;
use tracing::debug;

/// Variants requested per product. Only the first is used for pricing.
const VARIANTS_PER_PRODUCT: u32 = 10;

/// Metafields requested per product.
const METAFIELDS_PER_PRODUCT: u32 = 20;

/// A raw HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// HTTP client abstraction.
///
/// Implementations only move bytes. An `Err` means no response was
/// received at all (connect failure, timeout, reset) and is treated as
/// transient.
pub trait HttpClient: Send + Sync {
    /// POSTs a JSON body with the given extra headers.
    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<HttpResponse, String>;
}

/// Catalog source backed by the Shopify products connection.
pub struct ShopifySource<C: HttpClient> {
    config: ShopifyConfig,
    client: C,
}

impl<C: HttpClient> ShopifySource<C> {
    /// Creates a source.
    pub fn new(config: ShopifyConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ShopifyConfig {
        &self.config
    }
}

impl<C: HttpClient> CatalogSource for ShopifySource<C> {
    fn fetch_page(&self, cursor: Option<&str>, page_size: u32) -> SyncResult<Page> {
        let query = products_query(cursor, page_size);
        let body = serde_json::to_vec(&serde_json::json!({ "query": query }))
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;

        let response = self
            .client
            .post_json(
                &self.config.endpoint(),
                &[("X-Shopify-Access-Token", self.config.access_token.as_str())],
                body,
            )
            .map_err(SyncError::source_retryable)?;

        check_status(response.status, &response.body)?;
        let page = decode_page(&response.body)?;

        debug!(
            cursor = cursor.unwrap_or("start"),
            records = page.records.len(),
            has_more = page.has_more,
            "fetched products page"
        );
        Ok(page)
    }
}

/// Builds the products query, newest first.
fn products_query(cursor: Option<&str>, page_size: u32) -> String {
    // A JSON string literal is also a valid GraphQL string literal.
    let after = match cursor {
        Some(c) => serde_json::Value::from(c).to_string(),
        None => "null".to_string(),
    };

    format!(
        r#"{{
  products(first: {page_size}, after: {after}, sortKey: CREATED_AT, reverse: true) {{
    edges {{
      node {{
        id
        title
        handle
        featuredImage {{ url }}
        variants(first: {VARIANTS_PER_PRODUCT}) {{
          edges {{ node {{ price compareAtPrice }} }}
        }}
        status
        vendor
        metafields(first: {METAFIELDS_PER_PRODUCT}) {{
          edges {{ node {{ key value }} }}
        }}
      }}
      cursor
    }}
    pageInfo {{ hasNextPage }}
  }}
}}"#
    )
}

fn check_status(status: u16, body: &[u8]) -> SyncResult<()> {
    if (200..300).contains(&status) {
        return Ok(());
    }

    let snippet = String::from_utf8_lossy(&body[..body.len().min(200)]).into_owned();
    let message = format!("HTTP {status}: {snippet}");
    if status == 429 || status >= 500 {
        Err(SyncError::source_retryable(message))
    } else {
        Err(SyncError::source_fatal(message))
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ProductsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
    #[serde(default)]
    extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct ErrorExtensions {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductsData {
    products: ProductConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductConnection {
    edges: Vec<ProductEdge>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct ProductEdge {
    node: ProductNode,
    cursor: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductNode {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    handle: String,
    featured_image: Option<ImageNode>,
    variants: Connection<VariantNode>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    vendor: String,
    metafields: Connection<MetafieldNode>,
}

#[derive(Debug, Deserialize)]
struct ImageNode {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantNode {
    price: String,
    compare_at_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetafieldNode {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

fn decode_page(body: &[u8]) -> SyncResult<Page> {
    let response: GraphqlResponse = serde_json::from_slice(body)
        .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}")))?;

    if let Some(error) = response.errors.first() {
        let transient = response.errors.iter().any(|e| {
            e.extensions
                .as_ref()
                .and_then(|x| x.code.as_deref())
                .is_some_and(is_transient_code)
        });
        let message = format!("graphql error: {}", error.message);
        return Err(if transient {
            SyncError::source_retryable(message)
        } else {
            SyncError::source_fatal(message)
        });
    }

    let connection = response
        .data
        .ok_or_else(|| SyncError::Protocol("response has neither data nor errors".into()))?
        .products;

    let next_cursor = connection.edges.last().map(|e| e.cursor.clone());
    let records = connection
        .edges
        .into_iter()
        .map(|edge| into_raw(edge.node))
        .collect();

    Ok(Page {
        records,
        has_more: connection.page_info.has_next_page,
        next_cursor,
    })
}

/// GraphQL error codes for rate limiting and server-side faults. Shopify
/// reports these with HTTP 200, so they stand in for 429 and 5xx.
fn is_transient_code(code: &str) -> bool {
    matches!(
        code,
        "THROTTLED"
            | "INTERNAL_SERVER_ERROR"
            | "SERVICE_UNAVAILABLE"
            | "BAD_GATEWAY"
            | "GATEWAY_TIMEOUT"
            | "TIMEOUT"
    )
}

fn into_raw(node: ProductNode) -> RawRecord {
    RawRecord {
        id: node.id,
        title: node.title,
        handle: node.handle,
        vendor: node.vendor,
        status: node.status,
        featured_image: node.featured_image.map(|i| i.url),
        variants: node
            .variants
            .edges
            .into_iter()
            .map(|e| RawVariant {
                price: e.node.price,
                compare_at_price: e.node.compare_at_price,
            })
            .collect(),
        metafields: node
            .metafields
            .edges
            .into_iter()
            .map(|e| RawMetafield::new(e.node.key, e.node.value))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct TestClient {
        response: Mutex<Result<HttpResponse, String>>,
        last_request: Mutex<Option<(String, Vec<(String, String)>, Vec<u8>)>>,
    }

    impl TestClient {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: Mutex::new(Ok(HttpResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                })),
                last_request: Mutex::new(None),
            }
        }

        fn unreachable() -> Self {
            Self {
                response: Mutex::new(Err("connection refused".into())),
                last_request: Mutex::new(None),
            }
        }
    }

    impl HttpClient for TestClient {
        fn post_json(
            &self,
            url: &str,
            headers: &[(&str, &str)],
            body: Vec<u8>,
        ) -> Result<HttpResponse, String> {
            *self.last_request.lock() = Some((
                url.to_string(),
                headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                body,
            ));
            self.response.lock().clone()
        }
    }

    const PAGE: &str = r#"{
      "data": {
        "products": {
          "edges": [
            {
              "cursor": "c1",
              "node": {
                "id": "gid://shopify/Product/2",
                "title": "Acme X Base",
                "handle": "acme-x-base",
                "featuredImage": { "url": "https://cdn.example.com/x.png" },
                "variants": { "edges": [
                  { "node": { "price": "19.99", "compareAtPrice": "24.99" } },
                  { "node": { "price": "29.99", "compareAtPrice": null } }
                ] },
                "status": "ACTIVE",
                "vendor": "Acme",
                "metafields": { "edges": [
                  { "node": { "key": "year", "value": "2020" } },
                  { "node": { "key": "make", "value": "Acme" } }
                ] }
              }
            },
            {
              "cursor": "c2",
              "node": {
                "id": "gid://shopify/Product/1",
                "title": "Plain",
                "handle": "plain",
                "featuredImage": null,
                "variants": { "edges": [ { "node": { "price": "5.00", "compareAtPrice": null } } ] },
                "status": "DRAFT",
                "vendor": "Acme",
                "metafields": { "edges": [] }
              }
            }
          ],
          "pageInfo": { "hasNextPage": true }
        }
      }
    }"#;

    fn source(client: TestClient) -> ShopifySource<TestClient> {
        ShopifySource::new(ShopifyConfig::new("acme", "shpat_secret"), client)
    }

    #[test]
    fn decodes_products_page() {
        let source = source(TestClient::new(200, PAGE));
        let page = source.fetch_page(None, 250).unwrap();

        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
        assert_eq!(page.records.len(), 2);

        let first = &page.records[0];
        assert_eq!(first.id, "gid://shopify/Product/2");
        assert_eq!(
            first.featured_image.as_deref(),
            Some("https://cdn.example.com/x.png")
        );
        assert_eq!(first.variants.len(), 2);
        assert_eq!(first.variants[0].compare_at_price.as_deref(), Some("24.99"));
        assert_eq!(first.metafields[0], RawMetafield::new("year", "2020"));

        assert!(page.records[1].featured_image.is_none());
    }

    #[test]
    fn sends_token_and_cursor() {
        let source = source(TestClient::new(200, PAGE));
        source.fetch_page(Some("abc\"def"), 50).unwrap();

        let (url, headers, body) = source.client.last_request.lock().clone().unwrap();
        assert_eq!(
            url,
            "https://acme.myshopify.com/admin/api/2025-07/graphql.json"
        );
        assert!(headers.contains(&(
            "X-Shopify-Access-Token".to_string(),
            "shpat_secret".to_string()
        )));

        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let query = body["query"].as_str().unwrap();
        assert!(query.contains("first: 50"));
        assert!(query.contains(r#"after: "abc\"def""#));
        assert!(query.contains("sortKey: CREATED_AT, reverse: true"));
    }

    #[test]
    fn first_page_has_null_cursor() {
        let query = products_query(None, 250);
        assert!(query.contains("after: null"));
        assert!(query.contains("first: 250"));
    }

    #[test]
    fn status_classification() {
        let err = source(TestClient::new(503, "unavailable"))
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(err.is_retryable());

        let err = source(TestClient::new(429, "slow down"))
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(err.is_retryable());

        let err = source(TestClient::new(401, "bad token"))
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(!err.is_retryable());

        let err = source(TestClient::unreachable())
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn graphql_errors() {
        let throttled = r#"{"errors":[{"message":"Throttled","extensions":{"code":"THROTTLED"}}]}"#;
        let err = source(TestClient::new(200, throttled))
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(err.is_retryable());

        let internal = r#"{"errors":[{"message":"Internal error. Looks like something went wrong on our end.","extensions":{"code":"INTERNAL_SERVER_ERROR"}}]}"#;
        let err = source(TestClient::new(200, internal))
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(err.is_retryable());

        let unavailable =
            r#"{"errors":[{"message":"Unavailable","extensions":{"code":"SERVICE_UNAVAILABLE"}}]}"#;
        let err = source(TestClient::new(200, unavailable))
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(err.is_retryable());

        let denied =
            r#"{"errors":[{"message":"Access denied","extensions":{"code":"ACCESS_DENIED"}}]}"#;
        let err = source(TestClient::new(200, denied))
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(!err.is_retryable());

        let invalid = r#"{"errors":[{"message":"Field 'nope' doesn't exist"}]}"#;
        let err = source(TestClient::new(200, invalid))
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(!err.is_retryable());

        let err = source(TestClient::new(200, "not json"))
            .fetch_page(None, 10)
            .unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
    }

    #[test]
    fn empty_last_page() {
        let body = r#"{"data":{"products":{"edges":[],"pageInfo":{"hasNextPage":false}}}}"#;
        let page = source(TestClient::new(200, body)).fetch_page(None, 10).unwrap();
        assert!(page.records.is_empty());
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
    }
}
