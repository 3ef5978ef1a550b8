use asyncaws_core::{RequestContext, Result};
use http::{Method, StatusCode};
use log::warn;

use super::{build_request, init_signing_test, load_static_credential, send_signed_request};

#[tokio::test]
async fn test_head_object() -> Result<()> {
    let Some((ctx, signer, url)) = init_signing_test() else {
        warn!("ASYNCAWS_TEST is not set, skipped");
        return Ok(());
    };

    let cred = load_static_credential();
    let req = build_request(Method::HEAD, &url, "not_exist_file", "");

    let (status, _body) =
        send_signed_request(&ctx, &signer, req, &cred, &RequestContext::new()).await?;
    assert_eq!(StatusCode::NOT_FOUND, status);
    Ok(())
}

#[tokio::test]
async fn test_put_object() -> Result<()> {
    let Some((ctx, signer, url)) = init_signing_test() else {
        warn!("ASYNCAWS_TEST is not set, skipped");
        return Ok(());
    };

    let cred = load_static_credential();
    let req = build_request(Method::PUT, &url, "put_object_test", "Hello, World!");

    let (status, _body) =
        send_signed_request(&ctx, &signer, req, &cred, &RequestContext::new()).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}

#[tokio::test]
async fn test_put_object_chunked() -> Result<()> {
    let Some((ctx, signer, url)) = init_signing_test() else {
        warn!("ASYNCAWS_TEST is not set, skipped");
        return Ok(());
    };

    let cred = load_static_credential();
    let signer = signer.with_send_chunked_body(true).with_chunk_size(8 * 1024);
    let req = build_request(Method::PUT, &url, "put_object_chunked_test", "Hello, chunked World!");

    let (status, _body) =
        send_signed_request(&ctx, &signer, req, &cred, &RequestContext::new()).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}

#[tokio::test]
async fn test_list_bucket() -> Result<()> {
    let Some((ctx, signer, url)) = init_signing_test() else {
        warn!("ASYNCAWS_TEST is not set, skipped");
        return Ok(());
    };

    let cred = load_static_credential();
    let mut req = build_request(Method::GET, &url, "", "");
    req.query_push("list-type", "2");
    req.query_push("delimiter", "/");
    req.query_push("encoding-type", "url");

    let (status, _body) =
        send_signed_request(&ctx, &signer, req, &cred, &RequestContext::new()).await?;
    assert_eq!(StatusCode::OK, status);
    Ok(())
}
