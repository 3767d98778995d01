//! Integration tests for the REST surface of `RestModelServerClient`.
//!
//! Every operation is exercised against a wiremock server speaking the model
//! server wire contract: `{data: ...}` payloads and `{type: "confirm" |
//! "success" | ...}` markers.

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use modelserver_client::{
    ClientError, LaunchOptions, ModelServerClient, RestModelServerClient, ServerConfiguration,
};

/// Launch options addressing the mock server under the base path `api/v1`.
fn options_for(server: &MockServer) -> LaunchOptions {
    let address = server.address();
    LaunchOptions {
        hostname: address.ip().to_string(),
        server_port: address.port(),
        base_url: "api/v1".to_string(),
        additional_args: Vec::new(),
    }
}

async fn initialized_client(server: &MockServer) -> RestModelServerClient {
    let client = RestModelServerClient::new();
    assert!(client.initialize(Some(options_for(server))).await);
    client
}

#[tokio::test]
async fn ping_issues_one_get_and_maps_the_success_marker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/server/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    let response = client.ping().await.unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, Some(true));
}

#[tokio::test]
async fn ping_with_foreign_marker_is_false_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/server/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "starting"})))
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    let response = client.ping().await.unwrap();

    assert_eq!(response.body, Some(false));
}

#[tokio::test]
async fn get_encodes_the_model_uri_into_the_query_value_only() {
    // A model uri with reserved characters must never leak into the path.
    let model_uri = "file:///tmp/machine.ecore#//@workflows.0/nodes";

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/models"))
        .and(query_param("modeluri", model_uri))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": "{\"eClass\": \"Machine\"}"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    let response = client.get(model_uri).await.unwrap();

    assert_eq!(response.body, Some(json!("{\"eClass\": \"Machine\"}")));
}

#[tokio::test]
async fn get_all_returns_the_server_side_model_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/models"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": ["file:///a.ecore", "file:///b.ecore"]})),
        )
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    let response = client.get_all().await.unwrap();

    assert_eq!(
        response.body,
        Some(json!(["file:///a.ecore", "file:///b.ecore"]))
    );
}

#[tokio::test]
async fn delete_is_true_only_for_the_confirm_marker() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/models"))
        .and(query_param("modeluri", "file:///a.ecore"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "confirm"})))
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    let response = client.delete("file:///a.ecore").await.unwrap();
    assert_eq!(response.body, Some(true));
}

#[tokio::test]
async fn delete_with_foreign_or_absent_marker_is_false() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/models"))
        .and(query_param("modeluri", "file:///missing.ecore"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"type": "error"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/models"))
        .and(query_param("modeluri", "file:///empty.ecore"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;

    let response = client.delete("file:///missing.ecore").await.unwrap();
    assert_eq!(response.body, Some(false));
    assert_eq!(response.status_code, 404);

    // Empty reply body: status fields still populated, marker check false.
    let response = client.delete("file:///empty.ecore").await.unwrap();
    assert_eq!(response.body, Some(false));
    assert_eq!(response.status_code, 204);
}

#[tokio::test]
async fn update_patches_the_new_model_and_returns_echoed_data() {
    let new_model = json!({"eClass": "Machine", "name": "renamed"});

    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/models"))
        .and(query_param("modeluri", "file:///a.ecore"))
        .and(body_json(&new_model))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": new_model})))
        .expect(1)
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    let response = client.update("file:///a.ecore", &new_model).await.unwrap();

    assert_eq!(response.body, Some(new_model));
}

#[tokio::test]
async fn get_schema_returns_schema_data_verbatim() {
    let schema = json!({"type": "object", "properties": {"name": {"type": "string"}}});

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/schema"))
        .and(query_param("modeluri", "file:///a.ecore"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": schema})))
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    let response = client.get_schema("file:///a.ecore").await.unwrap();

    assert_eq!(response.body, Some(schema));
}

#[tokio::test]
async fn configure_puts_the_workspace_root() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/server/configure"))
        .and(body_json(json!({"workspaceRoot": "/workspace"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    let configuration = ServerConfiguration {
        workspace_root: "/workspace".to_string(),
    };
    let response = client.configure(&configuration).await.unwrap();

    assert_eq!(response.body, Some(true));
}

#[tokio::test]
async fn edit_forwards_the_command_wrapped_in_data() {
    let command = json!({"type": "set", "owner": "//@nodes.0", "feature": "name"});

    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/edit"))
        .and(query_param("modeluri", "file:///a.ecore"))
        .and(body_json(json!({"data": command})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "success"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    client.edit("file:///a.ecore", &command).await.unwrap();
}

#[tokio::test]
async fn non_json_reply_body_is_a_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/server/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let client = initialized_client(&server).await;
    assert!(matches!(
        client.ping().await,
        Err(ClientError::SerializationFailed(_))
    ));
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let client = RestModelServerClient::new();
    let unreachable = LaunchOptions {
        hostname: "127.0.0.1".to_string(),
        server_port: 1,
        base_url: "api/v1".to_string(),
        additional_args: Vec::new(),
    };
    assert!(client.initialize(Some(unreachable)).await);

    assert!(matches!(
        client.ping().await,
        Err(ClientError::ConnectionFailed(_))
    ));
}

#[tokio::test]
async fn reinitialize_repoints_the_client() {
    // Last initialize wins: calls go to the second server afterwards.
    let first = MockServer::start().await;
    let second = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/server/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "success"})))
        .expect(1)
        .mount(&second)
        .await;

    let client = initialized_client(&first).await;
    assert!(client.initialize(Some(options_for(&second))).await);

    let response = client.ping().await.unwrap();
    assert_eq!(response.body, Some(true));
}
