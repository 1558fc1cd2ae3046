mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

async fn project_with_guest(app: &TestApp) -> Result<String> {
    let project_id = app.create_project("owner", "Depot").await?;
    app.add_member(&project_id, "owner", "gus", "guest").await?;
    Ok(project_id)
}

#[tokio::test]
async fn presign_upload_and_download() -> Result<()> {
    let app = TestApp::new().with_users(&["owner", "gus"]).await;
    let project_id = project_with_guest(&app).await?;
    let base = format!("/api/project/{}/files", project_id);

    let res = app
        .post(
            &format!("{}/presign", base),
            "owner",
            json!({ "fileName": "../plans/site.pdf", "fileType": "application/pdf" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    let key = format!("projects/{}/site.pdf", project_id);
    assert_eq!(res.body["key"], key.as_str());
    assert!(res.body["uploadUrl"].as_str().unwrap_or_default().contains("method=PUT"));

    // Guests may download but not upload
    let res = app
        .post(
            &format!("{}/presign", base),
            "gus",
            json!({ "fileName": "x.pdf", "fileType": "application/pdf" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post(&format!("{}/presign-get", base), "gus", json!({ "key": key }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["url"].as_str().unwrap_or_default().contains("method=GET"));

    let res = app.post(&format!("{}/presign-get", base), "gus", json!({})).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "Missing file key");

    let res = app
        .post(
            &format!("{}/presign-get", base),
            "owner",
            json!({ "key": "projects/someone-else/secret.pdf" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn presign_requires_name_and_type() -> Result<()> {
    let app = TestApp::new();
    let project_id = app.create_project("owner", "Depot").await?;

    let res = app
        .post(
            &format!("/api/project/{}/files/presign", project_id),
            "owner",
            json!({ "fileName": "a.pdf" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn nested_folders_and_recursive_delete() -> Result<()> {
    let app = TestApp::new();
    let project_id = app.create_project("owner", "Depot").await?;
    let folder_uri = format!("/api/projects/{}/files/folder", project_id);

    let res = app
        .post(&folder_uri, "owner", json!({ "folderName": "Drawings", "path": [] }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["folder"]["name"], "Drawings");

    let res = app
        .post(&folder_uri, "owner", json!({ "folderName": "Civil", "path": ["Drawings"] }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .post(&folder_uri, "owner", json!({ "folderName": "Civil", "path": ["Drawings"] }))
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .post(&folder_uri, "owner", json!({ "folderName": "Soil", "path": ["Surveys"] }))
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let key = format!("projects/{}/grading.dwg", project_id);
    let res = app
        .post(
            &format!("/api/project/{}/files/metadata", project_id),
            "owner",
            json!({
                "path": ["Drawings", "Civil"],
                "name": "grading.dwg",
                "size": 52311,
                "uploadedAt": "2025-05-02T10:00:00Z",
                "key": key
            }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["file"]["name"], "grading.dwg");
    assert_eq!(res.body["file"]["size"], "52311");

    let res = app.get(&format!("/api/project/{}/directory", project_id), "owner").await?;
    assert_eq!(res.body["folders"][0]["folders"][0]["files"][0]["key"], key.as_str());

    let res = app
        .delete(&folder_uri, "owner", json!({ "folderName": "Drawings", "path": [] }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(app.blobs.deleted_keys().await, vec![key.clone()]);

    let res = app.get(&format!("/api/project/{}/directory", project_id), "owner").await?;
    assert_eq!(res.body["folders"], json!([]));
    Ok(())
}

#[tokio::test]
async fn failed_blob_delete_keeps_metadata() -> Result<()> {
    let app = TestApp::new();
    let project_id = app.create_project("owner", "Depot").await?;
    let key = format!("projects/{}/plan.pdf", project_id);

    app.post(
        &format!("/api/project/{}/files/folder", project_id),
        "owner",
        json!({ "folderName": "Plans" }),
    )
    .await?;
    app.post(
        &format!("/api/project/{}/files/metadata", project_id),
        "owner",
        json!({ "path": ["Plans"], "name": "plan.pdf", "key": key }),
    )
    .await?;

    app.blobs.set_fail_deletes(true);
    let res = app
        .delete(
            &format!("/api/project/{}/files/folder", project_id),
            "owner",
            json!({ "folderName": "Plans" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

    let res = app.get(&format!("/api/project/{}/directory", project_id), "owner").await?;
    assert_eq!(res.body["folders"][0]["name"], "Plans");
    assert_eq!(res.body["folders"][0]["files"][0]["key"], key.as_str());
    Ok(())
}

#[tokio::test]
async fn delete_file_reports_missing_metadata() -> Result<()> {
    let app = TestApp::new();
    let project_id = app.create_project("owner", "Depot").await?;
    let files_uri = format!("/api/project/{}/files", project_id);
    let key = format!("projects/{}/photo.jpg", project_id);

    app.post(
        &format!("{}/metadata", files_uri),
        "owner",
        json!({ "path": [], "name": "photo.jpg", "key": key }),
    )
    .await?;

    let res = app.delete(&files_uri, "owner", json!({ "key": key, "path": [] })).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "success": true }));

    let res = app.delete(&files_uri, "owner", json!({ "key": key, "path": [] })).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["warning"], "File not found in metadata, but deleted from S3");

    assert_eq!(app.blobs.deleted_keys().await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn folder_delete_scenario_with_plain_key() -> Result<()> {
    let app = TestApp::new();
    let res = app
        .post(
            "/api/projects",
            "owner",
            json!({ "name": "A", "startDate": "2024-01-01", "endDate": "2024-06-01" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let project_id = res.body["projectId"].as_str().unwrap_or_default().to_string();
    let files_uri = format!("/api/project/{}/files", project_id);

    for (name, path) in [("Drawings", json!([])), ("Civil", json!(["Drawings"]))] {
        let res = app
            .post(&format!("{}/folder", files_uri), "owner", json!({ "folderName": name, "path": path }))
            .await?;
        assert_eq!(res.status, StatusCode::OK);
    }

    let res = app
        .post(
            &format!("{}/metadata", files_uri),
            "owner",
            json!({ "path": ["Drawings", "Civil"], "name": "a.pdf", "key": "k1" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .delete(&format!("{}/folder", files_uri), "owner", json!({ "folderName": "Drawings", "path": [] }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["deletedKeys"], json!(["k1"]));
    assert_eq!(app.blobs.deleted_keys().await, vec!["k1".to_string()]);

    let res = app.get(&format!("/api/project/{}/directory", project_id), "owner").await?;
    assert_eq!(res.body["folders"], json!([]));
    Ok(())
}

#[tokio::test]
async fn stored_file_key_can_be_deleted() -> Result<()> {
    let app = TestApp::new();
    let project_id = app.create_project("owner", "Depot").await?;
    let files_uri = format!("/api/project/{}/files", project_id);

    let res = app
        .post(
            &format!("{}/metadata", files_uri),
            "owner",
            json!({ "path": [], "name": "b.pdf", "key": "k2" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.delete(&files_uri, "owner", json!({ "key": "k2", "path": [] })).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "success": true }));
    assert_eq!(app.blobs.deleted_keys().await, vec!["k2".to_string()]);

    let res = app.get(&format!("/api/project/{}/directory", project_id), "owner").await?;
    assert_eq!(res.body["files"], json!([]));
    Ok(())
}

#[tokio::test]
async fn directory_replace_checks_root() -> Result<()> {
    let app = TestApp::new();
    let project_id = app.create_project("owner", "Depot").await?;
    let uri = format!("/api/project/{}/directory", project_id);

    let res = app
        .patch(&uri, "owner", json!({ "name": "root", "folders": [{ "name": "Permits" }], "files": [] }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Directory updated");

    let res = app.patch(&uri, "owner", json!({ "name": "top", "folders": [] })).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.get(&uri, "owner").await?;
    assert_eq!(res.body["folders"][0]["name"], "Permits");
    Ok(())
}
