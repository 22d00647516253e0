#![cfg(feature = "http-client")]

mod common;

use std::sync::Arc;

use app_manifest::manifest::{HttpMethod, MemoryFragmentSource, ManifestLoader};
use app_manifest::runtime::{ApiBody, ApiClient, ApiRequest, MultipartField, RuntimeError, ScreenRuntime};
use app_manifest::transport::ReqwestApiClient;
use bytes::Bytes;
use mockito::{Matcher, Server};
use serde_json::{json, Value};

fn request(method: HttpMethod, endpoint: &str, body: ApiBody) -> ApiRequest {
    ApiRequest {
        method,
        endpoint: endpoint.to_string(),
        query: Vec::new(),
        headers: Vec::new(),
        body,
        bearer_token: None,
    }
}

#[tokio::test]
async fn test_json_request_carries_auth_query_and_headers() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/posts")
        .match_header("authorization", "Bearer t0k")
        .match_header("x-client", "tests")
        .match_query(Matcher::UrlEncoded("draft".into(), "false".into()))
        .match_body(Matcher::Json(json!({"title": "hi"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 12}"#)
        .create_async()
        .await;

    let client = ReqwestApiClient::new(Some(&server.url())).unwrap();
    let mut req = request(HttpMethod::Post, "/api/posts", ApiBody::Json(json!({"title": "hi"})));
    req.bearer_token = Some("t0k".into());
    req.query = vec![("draft".into(), "false".into())];
    req.headers = vec![("x-client".into(), "tests".into())];

    let response = client.send(req).await.unwrap();
    assert_eq!(response, json!({"id": 12}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_multipart_uploads_file_parts() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/api/media")
        .match_header("content-type", Matcher::Regex("multipart/form-data".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"filename="cat.png""#.into()),
            Matcher::Regex("image/png".into()),
            Matcher::Regex("meow".into()),
            Matcher::Regex("PNGDATA".into()),
        ]))
        .with_status(204)
        .create_async()
        .await;

    let client = ReqwestApiClient::new(Some(&server.url())).unwrap();
    let body = ApiBody::Multipart(vec![
        MultipartField::Text {
            name: "caption".into(),
            value: "meow".into(),
        },
        MultipartField::File {
            name: "file".into(),
            file_name: "cat.png".into(),
            content_type: Some("image/png".into()),
            data: Bytes::from_static(b"PNGDATA"),
        },
    ]);

    let response = client.send(request(HttpMethod::Put, "/api/media", body)).await.unwrap();
    assert_eq!(response, Value::Null);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_maps_to_api_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("DELETE", "/api/posts/1")
        .with_status(422)
        .with_body(r#"{"error": {"message": "cannot delete"}}"#)
        .create_async()
        .await;

    let client = ReqwestApiClient::new(Some(&server.url())).unwrap();
    let err = client
        .send(request(HttpMethod::Delete, "/api/posts/1", ApiBody::Empty))
        .await
        .unwrap_err();
    match err {
        RuntimeError::Api { status, message } => {
            assert_eq!(status, Some(422));
            assert_eq!(message, "cannot delete");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_screen_api_action_end_to_end() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/feed")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 1}, {"id": 2}]"#)
        .create_async()
        .await;

    let source = Arc::new(MemoryFragmentSource::new().with_file("manifest.json", common::DESCRIPTOR).with_file(
        "app/views/feed.json",
        r#"{"screens": [{"id": "screen.feed", "route": "/feed", "layout": {"type": "Text", "props": {"text": "{{state.count}}"}}}]}"#,
    ));
    let manifest = ManifestLoader::with_source(source, "").load().await.manifest.unwrap();

    let screen = ScreenRuntime::builder(Arc::new(manifest), "screen.feed")
        .api_client(Arc::new(ReqwestApiClient::new(Some(&server.url())).unwrap()))
        .build()
        .unwrap();
    screen.initialize().unwrap();

    let load = app_manifest::runtime::Handler::from_value(&json!({
        "type": "api",
        "method": "GET",
        "endpoint": "/api/feed",
        "query": {"page": 1},
        "onSuccess": {"type": "setState", "key": "posts", "value": "{{payload}}"}
    }));
    let result = screen.dispatch(&load, Value::Null).await;
    assert_eq!(result, Some(json!([{"id": 1}, {"id": 2}])));
    assert_eq!(screen.state().get("posts[1].id"), Some(json!(2)));
    mock.assert_async().await;
}
