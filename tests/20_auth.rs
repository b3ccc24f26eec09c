mod common;

use anyhow::Result;
use coltech_api::database::models::permission::{ITEMS_READ, ITEMS_WRITE};
use reqwest::StatusCode;
use serde_json::Value;

async fn code_of(res: reqwest::Response) -> Result<String> {
    let body = res.json::<Value>().await?;
    Ok(body["code"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn anonymous_needs_authentication_on_every_gated_route() -> Result<()> {
    let server = common::spawn().await?;

    let res = server.client.get(server.url("/v1/coltech_items")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(code_of(res).await?, "AUTHENTICATION_REQUIRED");

    let res = server
        .client
        .post(server.url("/v1/coltech_items"))
        .json(&common::new_item("Projector flickers", "low", "open"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(code_of(res).await?, "AUTHENTICATION_REQUIRED");

    Ok(())
}

#[tokio::test]
async fn malformed_credentials_are_rejected_before_lookup() -> Result<()> {
    let server = common::spawn().await?;

    for value in ["Token abc", "Bearer", "Bearer abc"] {
        let res = server
            .client
            .get(server.url("/v1/coltech_items"))
            .header("authorization", value)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "accepted {:?}", value);
        assert_eq!(res.headers()["www-authenticate"], "Bearer");
        assert_eq!(code_of(res).await?, "INVALID_CREDENTIAL");
    }

    Ok(())
}

#[tokio::test]
async fn inactive_account_is_forbidden() -> Result<()> {
    let server = common::spawn().await?;
    let token = server.bearer_for(false, &[ITEMS_READ]);

    let res = server
        .client
        .get(server.url("/v1/coltech_items"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(code_of(res).await?, "INACTIVE_ACCOUNT");

    Ok(())
}

#[tokio::test]
async fn read_permission_does_not_grant_write() -> Result<()> {
    let server = common::spawn().await?;
    let token = server.bearer_for(true, &[ITEMS_READ]);

    let res = server
        .client
        .get(server.url("/v1/coltech_items"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .client
        .post(server.url("/v1/coltech_items"))
        .bearer_auth(&token)
        .json(&common::new_item("Projector flickers", "low", "open"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(code_of(res).await?, "NOT_PERMITTED");

    let writer = server.bearer_for(true, &[ITEMS_READ, ITEMS_WRITE]);
    let res = server
        .client
        .post(server.url("/v1/coltech_items"))
        .bearer_auth(&writer)
        .json(&common::new_item("Projector flickers", "low", "open"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    Ok(())
}
