use std::time::Duration;

use assert_matches::assert_matches;
use mockito::{Matcher, Server};

use iquery_tools::domain::{AlterationData, Query, TaskId};
use iquery_tools::error::IqueryError;
use iquery_tools::search::{SearchClient, SearchHttpClient};

fn client(server: &Server) -> SearchHttpClient {
    SearchHttpClient::new(&format!("{}/v1/", server.url()), Duration::from_secs(5)).unwrap()
}

fn task() -> TaskId {
    "abc-123".parse().unwrap()
}

#[test]
fn endpoint_trailing_slash_is_dropped() {
    let server = Server::new();
    let client = client(&server);
    assert_eq!(client.base_url(), format!("{}/v1", server.url()));
}

#[test]
fn status_probe_parses_body() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/v1/status")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"ok","restVersion":"0.7.1","load":[0.1,0.2,0.3]}"#)
        .create();

    let status = client(&server).check_service_alive().unwrap();

    mock.assert();
    assert_eq!(status.status.as_deref(), Some("ok"));
    assert_eq!(status.rest_version.as_deref(), Some("0.7.1"));
    assert_eq!(status.raw_json["load"][2], 0.3);
}

#[test]
fn status_probe_failure_is_service_unavailable() {
    let mut server = Server::new();
    server
        .mock("GET", "/v1/status")
        .with_status(503)
        .with_body("down")
        .create();

    let err = client(&server).check_service_alive().unwrap_err();
    assert_matches!(err, IqueryError::ServiceUnavailable { status: 503, message } if message == "down");
}

#[test]
fn source_list_reads_results_array() {
    let mut server = Server::new();
    server
        .mock("GET", "/v1/source")
        .with_status(200)
        .with_body(
            r#"{"results":[
                {"name":"enrichment","uuid":"u1","numberOfNetworks":"350","status":"ok"},
                {"name":"keyword","description":"keyword search"}
            ]}"#,
        )
        .create();

    let sources = client(&server).list_sources().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].name, "enrichment");
    assert_eq!(sources[0].number_of_networks.as_deref(), Some("350"));
    assert_eq!(sources[1].description.as_deref(), Some("keyword search"));
}

#[test]
fn source_list_requires_200() {
    let mut server = Server::new();
    server.mock("GET", "/v1/source").with_status(204).create();

    assert_matches!(
        client(&server).list_sources(),
        Err(IqueryError::SourceList { status: 204, .. })
    );
}

#[test]
fn submit_posts_query_and_expects_202() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1")
        .match_body(Matcher::Json(serde_json::json!({
            "geneList": ["mtor", "tp53"],
            "sourceList": ["enrichment", "keyword"]
        })))
        .with_status(202)
        .with_body(r#"{"id":"abc-123"}"#)
        .create();
    let query = Query::new(["mtor", "tp53"], ["enrichment", "keyword"]).unwrap();

    let task_id = client(&server).submit_query(&query).unwrap();

    mock.assert();
    assert_eq!(task_id, task());
}

#[test]
fn submit_body_carries_alteration_data() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/v1")
        .match_body(Matcher::Json(serde_json::json!({
            "geneList": ["tp53"],
            "sourceList": ["enrichment"],
            "alterationData": [{
                "gene": "TP53",
                "altered": 4437,
                "sequenced": 10336,
                "percentAltered": "43%"
            }]
        })))
        .with_status(202)
        .with_body(r#"{"id":"abc-123"}"#)
        .create();
    let query = Query::new(["tp53"], ["enrichment"])
        .unwrap()
        .with_alteration_data(vec![AlterationData {
            gene: "TP53".to_string(),
            altered: 4437,
            sequenced: 10336,
            percent_altered: "43%".to_string(),
        }]);

    client(&server).submit_query(&query).unwrap();

    mock.assert();
}

#[test]
fn submit_with_200_is_rejected() {
    let mut server = Server::new();
    server
        .mock("POST", "/v1")
        .with_status(200)
        .with_body(r#"{"id":"abc-123"}"#)
        .create();
    let query = Query::new(["mtor"], ["keyword"]).unwrap();

    assert_matches!(
        client(&server).submit_query(&query),
        Err(IqueryError::QueryRejected { status: 200, .. })
    );
}

#[test]
fn task_status_reads_source_progress() {
    let mut server = Server::new();
    server
        .mock("GET", "/v1/abc-123/status")
        .with_status(200)
        .with_body(
            r#"{"status":"processing","progress":50,"sources":[
                {"sourceName":"enrichment","progress":100},
                {"sourceName":"keyword","progress":50}
            ]}"#,
        )
        .create();

    let status = client(&server).task_status(&task()).unwrap();
    assert_eq!(status.sources.len(), 2);
    assert_eq!(status.overall_progress(), Some(50));
}

#[test]
fn task_status_error_and_garbage_body() {
    let mut server = Server::new();
    server
        .mock("GET", "/v1/abc-123/status")
        .with_status(500)
        .create();
    assert_matches!(
        client(&server).task_status(&task()),
        Err(IqueryError::SearchStatus { status: 500, .. })
    );

    let mut server = Server::new();
    server
        .mock("GET", "/v1/abc-123/status")
        .with_status(200)
        .with_body("not json")
        .create();
    assert_matches!(
        client(&server).task_status(&task()),
        Err(IqueryError::MalformedResponse(_))
    );
}

#[test]
fn overlay_request_carries_identifiers() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/v1/abc-123/overlaynetwork")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("sourceUUID".into(), "src-1".into()),
            Matcher::UrlEncoded("networkUUID".into(), "net-1".into()),
        ]))
        .with_status(200)
        .with_body(r#"[{"numberVerification":[]},{"nodes":[]},{"edges":[]},{"status":[]}]"#)
        .create();

    let overlay = client(&server)
        .fetch_overlay_network(&task(), "src-1", "net-1")
        .unwrap();

    mock.assert();
    assert_eq!(overlay.len(), 4);
    assert!(!overlay.is_empty());
}

#[test]
fn full_results_and_delete() {
    let mut server = Server::new();
    server
        .mock("GET", "/v1/abc-123")
        .with_status(200)
        .with_body(
            r#"{"status":"complete","sources":[{"sourceName":"keyword","sourceUUID":"s1",
                "results":[{"networkUUID":"n1","description":"d","nodes":3}]}]}"#,
        )
        .create();
    let delete = server.mock("DELETE", "/v1/abc-123").with_status(200).create();

    let client = client(&server);
    let result = client.fetch_full_results(&task()).unwrap();
    assert_eq!(result.sources[0].results[0].network_uuid, "n1");

    client.delete_task(&task()).unwrap();
    delete.assert();
}

#[test]
fn delete_requires_200() {
    let mut server = Server::new();
    server
        .mock("DELETE", "/v1/abc-123")
        .with_status(404)
        .with_body("unknown task")
        .create();

    let err = client(&server).delete_task(&task()).unwrap_err();
    assert_matches!(
        err,
        IqueryError::TaskDelete { status: 404, ref task_id, .. } if task_id == "abc-123"
    );
}

#[test]
fn mutation_frequency_lookup() {
    let mut server = Server::new();
    server
        .mock("POST", "/v1/mutationfrequency")
        .match_body(Matcher::Json(serde_json::json!({"genes": ["TP53"]})))
        .with_status(200)
        .with_body(r#"{"mutationFrequencies":{"TP53":0.42}}"#)
        .create();

    let result = client(&server)
        .mutation_frequencies(&["TP53".to_string()])
        .unwrap();
    assert_eq!(result.mutation_frequencies.get("TP53"), Some(&0.42));
}

#[test]
fn unreachable_server_is_http_error() {
    let client = SearchHttpClient::new("http://127.0.0.1:1/v1", Duration::from_secs(1)).unwrap();
    assert_matches!(client.check_service_alive(), Err(IqueryError::SearchHttp(_)));
}
