mod common;

use anyhow::Result;
use coltech_api::database::models::permission::{ITEMS_READ, ITEMS_WRITE};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn create(server: &common::TestServer, token: &str, item: Value) -> Result<Value> {
    let res = server
        .client
        .post(server.url("/v1/coltech_items"))
        .bearer_auth(token)
        .json(&item)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    Ok(body["data"].clone())
}

#[tokio::test]
async fn create_show_and_delete() -> Result<()> {
    let server = common::spawn().await?;
    let token = server.bearer_for(true, &[ITEMS_READ, ITEMS_WRITE]);

    let res = server
        .client
        .post(server.url("/v1/coltech_items"))
        .bearer_auth(&token)
        .json(&json!({
            "summary": "Badge reader offline",
            "description": "East entrance reader shows no power",
            "category": "access",
            "department": "security",
            "created_by": "lee",
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let location = res.headers()["location"].to_str()?.to_string();
    let item = res.json::<Value>().await?["data"].clone();
    assert_eq!(location, format!("/v1/coltech_items/{}", item["id"]));
    assert_eq!(item["priority"], "normal");
    assert_eq!(item["status"], "open");
    assert_eq!(item["version"], 1);

    let res = server.client.get(server.url(&location)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"]["summary"], "Badge reader offline");

    let res = server.client.delete(server.url(&location)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.client.delete(server.url(&location)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = server.client.get(server.url(&location)).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn bad_ids_and_bodies() -> Result<()> {
    let server = common::spawn().await?;
    let token = server.bearer_for(true, &[ITEMS_READ, ITEMS_WRITE]);

    for path in ["/v1/coltech_items/0", "/v1/coltech_items/-4", "/v1/coltech_items/abc"] {
        let res = server.client.get(server.url(path)).bearer_auth(&token).send().await?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", path);
    }

    let res = server
        .client
        .post(server.url("/v1/coltech_items"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{\"summary\": ")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .post(server.url("/v1/coltech_items"))
        .bearer_auth(&token)
        .json(&json!({ "summary": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = res.json::<Value>().await?;
    assert!(body["field_errors"]["summary"].is_string());
    assert!(body["field_errors"]["department"].is_string());

    Ok(())
}

#[tokio::test]
async fn list_filters_sorts_and_paginates() -> Result<()> {
    let server = common::spawn().await?;
    let token = server.bearer_for(true, &[ITEMS_READ, ITEMS_WRITE]);

    create(&server, &token, common::new_item("Laptop battery swollen", "high", "open")).await?;
    create(&server, &token, common::new_item("Monitor cable missing", "low", "open")).await?;
    create(&server, &token, common::new_item("Desk phone dead", "high", "closed")).await?;

    // priority and status filters bind to their own columns
    let res = server
        .client
        .get(server.url("/v1/coltech_items?priority=high&status=open"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    let items = body["data"]["coltech_items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["summary"], "Laptop battery swollen");

    let res = server
        .client
        .get(server.url("/v1/coltech_items?sort=-id&page_size=2"))
        .bearer_auth(&token)
        .send()
        .await?;
    let body = res.json::<Value>().await?;
    let items = body["data"]["coltech_items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["summary"], "Desk phone dead");
    let metadata = &body["data"]["metadata"];
    assert_eq!(metadata["current_page"], 1);
    assert_eq!(metadata["page_size"], 2);
    assert_eq!(metadata["last_page"], 2);
    assert_eq!(metadata["total_records"], 3);

    let res = server
        .client
        .get(server.url("/v1/coltech_items?status=archived"))
        .bearer_auth(&token)
        .send()
        .await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["coltech_items"], json!([]));
    assert_eq!(body["data"]["metadata"], json!({}));

    let res = server
        .client
        .get(server.url("/v1/coltech_items?sort=summary&page=0"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = res.json::<Value>().await?;
    assert!(body["field_errors"]["sort"].is_string());
    assert!(body["field_errors"]["page"].is_string());

    Ok(())
}

#[tokio::test]
async fn update_bumps_version_and_detects_stale_writers() -> Result<()> {
    let server = common::spawn().await?;
    let token = server.bearer_for(true, &[ITEMS_READ, ITEMS_WRITE]);
    let item = create(&server, &token, common::new_item("Heater rattles", "normal", "open")).await?;
    let path = format!("/v1/coltech_items/{}", item["id"]);

    // Writer A and writer B both read version 1; A commits first
    let res = server
        .client
        .patch(server.url(&path))
        .bearer_auth(&token)
        .header("x-expected-version", "1")
        .json(&json!({ "status": "in progress", "assigned_to": "kim" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let updated = res.json::<Value>().await?["data"].clone();
    assert_eq!(updated["version"], 2);
    assert_eq!(updated["status"], "in progress");
    assert_eq!(updated["summary"], "Heater rattles");

    let res = server
        .client
        .patch(server.url(&path))
        .bearer_auth(&token)
        .header("x-expected-version", "1")
        .json(&json!({ "status": "closed" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(res.json::<Value>().await?["code"], "EDIT_CONFLICT");

    // The losing write changed nothing
    let res = server.client.get(server.url(&path)).bearer_auth(&token).send().await?;
    let current = res.json::<Value>().await?["data"].clone();
    assert_eq!(current["version"], 2);
    assert_eq!(current["status"], "in progress");

    // A body-supplied version is ignored
    let res = server
        .client
        .patch(server.url(&path))
        .bearer_auth(&token)
        .json(&json!({ "status": "closed", "version": 99 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["data"]["version"], 3);

    let res = server
        .client
        .patch(server.url(&path))
        .bearer_auth(&token)
        .json(&json!({ "summary": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = server
        .client
        .patch(server.url("/v1/coltech_items/9999"))
        .bearer_auth(&token)
        .json(&json!({ "status": "closed" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}
