use std::time::Duration;

use asyncaws::{
    ApiResult, Bytes, Client, Error, GenericService, Json, Output, PaginatedOutput, Request,
    RequestContext, ResponseInfo,
};
use futures::TryStreamExt;
use http::{HeaderMap, Method};
use pretty_assertions::assert_eq;
use serde::Deserialize;

use crate::mock::{client, config, init, MockHttpSend};

#[derive(Debug, Clone)]
struct ListInput {
    prefix: String,
    token: Option<String>,
}

impl ListInput {
    fn request(&self) -> Request {
        let mut query = vec![("prefix".to_string(), self.prefix.clone())];
        if let Some(token) = &self.token {
            query.push(("token".to_string(), token.clone()));
        }
        Request::new(Method::GET, "/items", query, HeaderMap::new(), Bytes::new())
    }
}

#[derive(Debug, Deserialize)]
struct ListPage {
    items: Vec<String>,
    next: Option<String>,
}

impl Output for ListPage {
    fn populate(info: &ResponseInfo) -> asyncaws::Result<Self> {
        Json::<ListPage>::populate(info).map(|page| page.0)
    }
}

impl PaginatedOutput for ListPage {
    type Input = ListInput;
    type Item = String;

    fn next_token(&self) -> Option<String> {
        self.next.clone()
    }

    fn take_items(&mut self) -> Vec<String> {
        std::mem::take(&mut self.items)
    }

    fn next_input(input: &ListInput, token: &str) -> ListInput {
        ListInput {
            token: Some(token.to_string()),
            ..input.clone()
        }
    }
}

fn list(client: &Client, input: &ListInput) -> ApiResult<ListPage> {
    client.call(input.request(), RequestContext::new().with_operation("ListItems"))
}

fn paginate(client: &Client) -> asyncaws::Paginator<ListPage> {
    let input = ListInput {
        prefix: "p".to_string(),
        token: None,
    };
    let fetch_client = client.clone();
    list(client, &input).paginate(input, move |input| list(&fetch_client, &input))
}

#[tokio::test]
async fn test_single_page() -> asyncaws::Result<()> {
    init();
    let mock = MockHttpSend::new().reply(200, r#"{"items":["a","b"]}"#);
    let client = client(&mock, config(), GenericService::new("items"));

    let items: Vec<String> = paginate(&client).into_stream().try_collect().await?;
    assert_eq!(items, ["a", "b"]);
    assert_eq!(mock.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_follows_continuation_token() -> asyncaws::Result<()> {
    init();
    let mock = MockHttpSend::new()
        .reply(200, r#"{"items":["a","b"],"next":"t1"}"#)
        .reply(200, r#"{"items":["c"],"next":"t2"}"#)
        .reply(200, r#"{"items":["d"]}"#);
    let client = client(&mock, config(), GenericService::new("items"));

    let mut pages = paginate(&client);
    let mut items = Vec::new();
    while let Some(item) = pages.next().await {
        items.push(item?);
    }
    assert_eq!(items, ["a", "b", "c", "d"]);
    assert_eq!(pages.pages(), 3);
    assert!(pages.next().await.is_none());

    let uris: Vec<String> = mock.requests().into_iter().map(|r| r.uri).collect();
    assert_eq!(
        uris,
        [
            "https://items.us-east-1.amazonaws.com/items?prefix=p",
            "https://items.us-east-1.amazonaws.com/items?prefix=p&token=t1",
            "https://items.us-east-1.amazonaws.com/items?prefix=p&token=t2",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_next_page_is_prefetched() -> asyncaws::Result<()> {
    init();
    let mock = MockHttpSend::new()
        .reply(200, r#"{"items":["a","b"],"next":"t1"}"#)
        .reply(200, r#"{"items":["c"]}"#);
    let client = client(&mock, config(), GenericService::new("items"));

    let mut pages = paginate(&client);
    assert_eq!(pages.next().await.transpose()?.as_deref(), Some("a"));
    assert_eq!(pages.root().prefetch_count(), 1);

    // Page two is requested while page one is still being consumed.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.calls(), 2);

    assert_eq!(pages.next().await.transpose()?.as_deref(), Some("b"));
    assert_eq!(pages.next().await.transpose()?.as_deref(), Some("c"));
    assert_eq!(pages.root().prefetch_count(), 0);
    assert!(pages.next().await.is_none());
    assert_eq!(mock.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_empty_token_ends_listing() -> asyncaws::Result<()> {
    init();
    let mock = MockHttpSend::new().reply(200, r#"{"items":["a"],"next":""}"#);
    let client = client(&mock, config(), GenericService::new("items"));

    let items: Vec<String> = paginate(&client).into_stream().try_collect().await?;
    assert_eq!(items, ["a"]);
    assert_eq!(mock.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_error_on_later_page() {
    init();
    let mock = MockHttpSend::new()
        .reply(200, r#"{"items":["a"],"next":"t1"}"#)
        .reply(
            400,
            r#"{"__type":"com.example#ExpiredTokenException","message":"token expired"}"#,
        );
    let client = client(&mock, config(), GenericService::new("items"));

    let mut pages = paginate(&client);
    assert_eq!(pages.next().await.and_then(|r| r.ok()).as_deref(), Some("a"));

    let err = match pages.next().await {
        Some(Err(err)) => err,
        other => panic!("expected an error, got {other:?}"),
    };
    assert_eq!(err.code(), Some("ExpiredTokenException"));
    assert!(pages.next().await.is_none());
}

#[tokio::test]
async fn test_drop_cancels_prefetch() -> asyncaws::Result<()> {
    init();
    let mock = MockHttpSend::new()
        .reply(200, r#"{"items":["a","b"],"next":"t1"}"#)
        .reply(200, r#"{"items":["c"]}"#);
    let client = client(&mock, config(), GenericService::new("items"));

    let mut pages = paginate(&client);
    assert_eq!(pages.next().await.transpose()?.as_deref(), Some("a"));
    // The prefetch has been spawned but not polled yet.
    drop(pages);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_root_failure_ends_listing() {
    init();
    let mock = MockHttpSend::new().reply(403, "<Error><Code>AccessDenied</Code></Error>");
    let client = client(&mock, config(), GenericService::new("items"));

    let mut pages = paginate(&client);
    let err = pages
        .next()
        .await
        .and_then(|r| r.err())
        .expect("first item must be the error");
    assert!(matches!(err, Error::Http(_)));
    assert_eq!(err.code(), Some("AccessDenied"));
    assert!(pages.next().await.is_none());
}
