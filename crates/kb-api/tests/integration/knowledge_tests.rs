//! Knowledge record endpoint tests.

use axum::http::StatusCode;
use serde_json::{json, Value};

use super::common::{
    create_record, create_test_app, delete_request, get_request, ids, post_json_request,
    put_json_request, send_request,
};

async fn seed_attack_records(app: &axum::Router) {
    create_record(
        app,
        json!({
            "id": "t1566",
            "title": "Phishing",
            "abstract": "Adversaries send messages to gain access",
            "content": "Spearphishing attachment and link",
            "tags": ["email", "initial-access"],
            "knowledgeType": ["technique"],
            "tacticsId": ["TA0001"],
            "techniquesId": ["T1566"],
            "subTechniquesId": ["T1566.001"],
            "author": ["alice", "bob"]
        }),
    )
    .await;
    create_record(
        app,
        json!({
            "id": "t1003",
            "title": "OS Credential Dumping",
            "content": "Dumping LSASS memory to harvest phish-resistant tokens",
            "tags": ["credential-access"],
            "knowledgeType": ["technique"],
            "tacticsId": ["TA0006"],
            "techniquesId": ["T1003"],
            "author": ["alice"]
        }),
    )
    .await;
    create_record(
        app,
        json!({
            "id": "apt29",
            "title": "APT29",
            "abstract": "Known for phishing campaigns",
            "tags": ["email", "actor"],
            "knowledgeType": ["actor"],
            "author": ["carol"]
        }),
    )
    .await;
}

#[tokio::test]
async fn test_create_then_find_by_title() {
    let app = create_test_app().await;

    let (status, created): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request(
            "/api/knowledge",
            &json!({"title": "Lateral Movement", "tags": "network", "unknownField": 1}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], true);
    assert_eq!(created["message"], "Created successfully");
    assert_eq!(created["tags"], json!(["network"]));
    assert!(created.get("unknownField").is_none());
    let id = created["id"].as_str().unwrap();
    assert_eq!(id.len(), 24);

    let (status, found): (StatusCode, Value) = send_request(
        app.router,
        get_request("/api/knowledge/title?title=lateral"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&found), vec![id.to_string()]);
    assert!(found[0].get("success").is_none());
}

#[tokio::test]
async fn test_create_rejects_duplicates_and_mismatched_kinds() {
    let app = create_test_app().await;
    create_record(&app.router, json!({"id": "dup", "title": "First"})).await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request("/api/knowledge", &json!({"id": "dup", "title": "Second"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request("/api/knowledge", &json!({"title": ["not", "text"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _): (StatusCode, Value) = send_request(
        app.router,
        post_json_request("/api/knowledge", &json!(["not", "an", "object"])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_replaces_attributes() {
    let app = create_test_app().await;
    let id = create_record(
        &app.router,
        json!({"title": "Old", "content": "stale", "tags": ["a"]}),
    )
    .await;

    let (status, updated): (StatusCode, Value) = send_request(
        app.router.clone(),
        put_json_request(
            &format!("/api/knowledge/{}", id),
            &json!({"title": "New", "tags": ["b", "c"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "New");
    assert_eq!(updated["tags"], json!(["b", "c"]));
    assert!(updated.get("content").is_none());

    let (status, _): (StatusCode, Value) = send_request(
        app.router,
        put_json_request("/api/knowledge/missing", &json!({"title": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_reports_unknown_id() {
    let app = create_test_app().await;
    let id = create_record(&app.router, json!({"title": "Doomed"})).await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        delete_request(&format!("/api/knowledge/{}", id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "Deleted successfully"}));

    let (status, body): (StatusCode, Value) = send_request(
        app.router,
        delete_request(&format!("/api/knowledge/{}", id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "No document found with that ID");
}

#[tokio::test]
async fn test_tags_endpoint_requires_all_tags() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/tags?tags=email&tags=actor"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), ["apt29"]);

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/tags?type=technique&tags=email"),
    )
    .await;
    assert_eq!(ids(&body), ["t1566"]);

    let (status, _): (StatusCode, Value) =
        send_request(app.router, get_request("/api/knowledge/tags")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_filter_tags_match_any() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router,
        get_request("/api/knowledge/search?tags=actor&tags=credential-access"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), ["t1003", "apt29"]);
}

#[tokio::test]
async fn test_techniques_ids_are_sanitized() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    // T1566 followed by a zero-width space
    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/techniques?techniquesId=T1566%E2%80%8B"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), ["t1566"]);

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/techniques?TechniquesId=T1003"),
    )
    .await;
    assert_eq!(ids(&body), ["t1003"]);

    let (status, _): (StatusCode, Value) =
        send_request(app.router, get_request("/api/knowledge/techniques")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tactics_and_subtechniques() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/tactics?tacticsId=TA0001&tacticsId=TA0006"),
    )
    .await;
    assert_eq!(ids(&body), ["t1566", "t1003"]);

    let (status, _): (StatusCode, Value) =
        send_request(app.router.clone(), get_request("/api/knowledge/tactics")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/subtechniques?subTechniquesId=T1566.001"),
    )
    .await;
    assert_eq!(ids(&body), ["t1566"]);

    let (status, body): (StatusCode, Value) =
        send_request(app.router, get_request("/api/knowledge/subtechniques")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_nums_caps_results() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/type?type=technique&type=actor&nums=2"),
    )
    .await;
    assert_eq!(ids(&body), ["t1566", "t1003"]);

    let (_, body): (StatusCode, Value) = send_request(
        app.router,
        get_request("/api/knowledge/type?type=technique&type=actor&nums=-1"),
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_content_and_keyword_searches() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/content?type=technique&keyword=LSASS"),
    )
    .await;
    assert_eq!(ids(&body), ["t1003"]);

    // Matches id exactly, title by pattern, or a tag element.
    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/keyword?keyword=apt29&keyword=initial-access"),
    )
    .await;
    assert_eq!(ids(&body), ["t1566", "apt29"]);

    let (status, _): (StatusCode, Value) =
        send_request(app.router, get_request("/api/knowledge/keyword")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_keyword_scope_selects_fields() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/search?keyword=phish"),
    )
    .await;
    assert_eq!(ids(&body), ["t1566", "t1003", "apt29"]);

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/search?keyword=phish&nodedict=title"),
    )
    .await;
    assert_eq!(ids(&body), ["t1566"]);

    let (_, body): (StatusCode, Value) = send_request(
        app.router,
        get_request("/api/knowledge/search?keyword=phish&nodedict=abstract"),
    )
    .await;
    assert_eq!(ids(&body), ["apt29"]);
}

#[tokio::test]
async fn test_search_body_combines_filter_keywords_and_authors() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request(
            "/api/knowledge/search",
            &json!({
                "where": {"knowledgeType": ["technique"]},
                "keyword": ["dump"],
                "author": ["alice"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), ["t1003"]);

    // Authors are all-of.
    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request(
            "/api/knowledge/search",
            &json!({"author": ["alice", "bob"]}),
        ),
    )
    .await;
    assert_eq!(ids(&body), ["t1566"]);

    let (_, body): (StatusCode, Value) = send_request(
        app.router,
        post_json_request(
            "/api/knowledge/search",
            &json!({"where": {"AND": [{"tags": "email"}, {"title": "apt"}]}}),
        ),
    )
    .await;
    assert_eq!(ids(&body), ["apt29"]);
}

#[tokio::test]
async fn test_search_rejects_empty_and_invalid_filters() {
    let app = create_test_app().await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request("/api/knowledge/search", &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request(
            "/api/knowledge/search",
            &json!({"where": {"colour": "blue"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/title?title=%28unclosed"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body): (StatusCode, Value) = send_request(
        app.router,
        get_request("/api/knowledge/type?type=actor&nums=ten"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid nums parameter");
}

#[tokio::test]
async fn test_search_by_id_with_type() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/id?id=apt29&type=actor"),
    )
    .await;
    assert_eq!(ids(&body), ["apt29"]);
    assert_eq!(body[0]["success"], true);

    let (_, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        get_request("/api/knowledge/id?id=apt29&type=technique"),
    )
    .await;
    assert_eq!(body, json!([]));

    let (status, _): (StatusCode, Value) =
        send_request(app.router, get_request("/api/knowledge/id")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_batch_edit_reports_partial_failure() {
    let app = create_test_app().await;
    seed_attack_records(&app.router).await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request(
            "/api/knowledge/batchEdit",
            &json!({
                "idList": ["t1566", "apt29", "ghost"],
                "prevType": "technique",
                "repType": "procedure"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "partial update failed: apt29: previous type not found; ghost: not found"
    );
    assert_eq!(body["failures"].as_array().unwrap().len(), 2);

    let (_, body): (StatusCode, Value) = send_request(
        app.router,
        get_request("/api/knowledge/type?type=procedure"),
    )
    .await;
    assert_eq!(ids(&body), ["t1566"]);
}

#[tokio::test]
async fn test_batch_edit_empty_list_and_validation() {
    let app = create_test_app().await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router.clone(),
        post_json_request(
            "/api/knowledge/batchEdit",
            &json!({"idList": [], "prevType": "a", "repType": "b"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "id list is empty");

    for request in [json!({"idList": []}), json!({"idList": [], "prevType": "", "repType": ""})] {
        let (status, body): (StatusCode, Value) = send_request(
            app.router.clone(),
            post_json_request("/api/knowledge/batchEdit", &request),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "body {request}");
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "id list is empty");
    }

    let (status, _): (StatusCode, Value) = send_request(
        app.router,
        post_json_request(
            "/api/knowledge/batchEdit",
            &json!({"idList": ["x"], "prevType": "", "repType": "b"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_versioned_mount() {
    let app = create_test_app().await;
    create_record(&app.router, json!({"id": "v1", "knowledgeType": ["note"]})).await;

    let (status, body): (StatusCode, Value) = send_request(
        app.router,
        get_request("/api/v1/knowledge/type?type=note"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), ["v1"]);
}
