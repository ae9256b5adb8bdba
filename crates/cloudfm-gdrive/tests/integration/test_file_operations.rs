//! Listing, saving, loading and mutating Drive files

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use cloudfm_core::domain::{CloudContent, CloudMetadata};
use cloudfm_core::ports::{ICloudProvider, ListOptions, ProviderError};
use cloudfm_gdrive::multipart;

use crate::common;

#[tokio::test]
async fn test_list_root_sorts_and_types_entries() {
    let (server, provider) = common::authorized_provider().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'root' in parents and trashed = false"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"id": "f2", "name": "zebra.txt", "mimeType": "text/plain"},
                {"id": "d1", "name": "Archive", "mimeType": "application/vnd.google-apps.folder"},
                {"id": "f1", "name": "apple.txt", "mimeType": "text/plain"}
            ]
        })))
        .mount(&server)
        .await;

    let entries = provider.list(None, &ListOptions::default()).await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["apple.txt", "Archive", "zebra.txt"]);
    assert!(entries[1].is_folder());
    assert_eq!(entries[0].provider_data_str("id"), Some("f1"));
    assert!(entries.iter().all(|e| e.belongs_to(provider.name())));
}

#[tokio::test]
async fn test_list_follows_pagination_into_subfolder() {
    let (server, provider) = common::authorized_provider().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'d1' in parents and trashed = false"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"id": "f4", "name": "b.txt", "mimeType": "text/plain"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'d1' in parents and trashed = false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"id": "f3", "name": "a.txt", "mimeType": "text/plain"}],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;

    let folder = CloudMetadata::new_folder("Archive")
        .unwrap()
        .with_provider(provider.name().clone())
        .with_provider_data(json!({ "id": "d1" }));
    let entries = provider
        .list(Some(&folder), &ListOptions::with_extensions(vec!["txt".into()]))
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].path(), "Archive/a.txt");
    assert_eq!(entries[1].provider_data_str("id"), Some("f4"));
}

#[tokio::test]
async fn test_save_new_file_posts_multipart() {
    let (server, provider) = common::authorized_provider().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header("content-type", multipart::content_type().as_str()))
        .and(body_string_contains(r#""parents":["d1"]"#))
        .and(body_string_contains("hello drive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new-id", "name": "notes", "mimeType": "text/plain"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let folder = Arc::new(
        CloudMetadata::new_folder("Archive")
            .unwrap()
            .with_provider_data(json!({ "id": "d1" })),
    );
    let mut metadata = CloudMetadata::new_file("notes")
        .unwrap()
        .with_parent(Some(folder));
    provider
        .save(&CloudContent::raw("hello drive"), &mut metadata)
        .await
        .unwrap();

    assert_eq!(metadata.provider_data_str("id"), Some("new-id"));
    assert!(metadata.belongs_to(provider.name()));
    assert_eq!(provider.open_saved_id(&metadata).as_deref(), Some("new-id"));
}

#[tokio::test]
async fn test_save_existing_file_patches_by_id() {
    let (server, provider) = common::authorized_provider().await;
    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/existing-id"))
        .and(query_param("uploadType", "multipart"))
        .and(body_string_contains("second draft"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "existing-id", "name": "notes"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut metadata = CloudMetadata::new_file("notes")
        .unwrap()
        .with_provider(provider.name().clone())
        .with_provider_data(json!({ "id": "existing-id" }));
    provider
        .save(&CloudContent::raw("second draft"), &mut metadata)
        .await
        .unwrap();
    assert_eq!(metadata.provider_data_str("id"), Some("existing-id"));
}

#[tokio::test]
async fn test_load_downloads_media() {
    let (server, provider) = common::authorized_provider().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/f1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain body"))
        .mount(&server)
        .await;

    let metadata = CloudMetadata::new_file("apple.txt")
        .unwrap()
        .with_provider_data(json!({ "id": "f1" }));
    let content = provider.load(&metadata).await.unwrap();
    assert_eq!(content.text(), "plain body");
}

#[tokio::test]
async fn test_api_error_message_is_decoded() {
    let (server, provider) = common::authorized_provider().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/locked"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "The user does not have sufficient permissions for this file."
            }
        })))
        .mount(&server)
        .await;

    let metadata = CloudMetadata::new_file("locked")
        .unwrap()
        .with_provider_data(json!({ "id": "locked" }));
    let err = provider.load(&metadata).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Api("The user does not have sufficient permissions for this file.".into())
    );
}

#[tokio::test]
async fn test_rename_and_remove() {
    let (server, provider) = common::authorized_provider().await;
    Mock::given(method("PATCH"))
        .and(path("/drive/v3/files/f1"))
        .and(body_string_contains("renamed.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "f1", "name": "renamed.txt"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/f1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut metadata = CloudMetadata::new_file("apple.txt")
        .unwrap()
        .with_provider_data(json!({ "id": "f1" }));
    provider.rename(&mut metadata, "renamed.txt").await.unwrap();
    assert_eq!(metadata.name(), "renamed.txt");

    provider.remove(&metadata).await.unwrap();
}

#[tokio::test]
async fn test_open_saved_fetches_metadata() {
    let (server, provider) = common::authorized_provider().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/f9"))
        .and(query_param("fields", "id,name,mimeType,parents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "f9", "name": "report", "mimeType": "text/plain", "parents": ["root"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "File not found: gone."}
        })))
        .mount(&server)
        .await;

    let metadata = provider.open_saved("f9").await.unwrap();
    assert_eq!(metadata.name(), "report");
    assert_eq!(metadata.mime_type(), Some("text/plain"));

    let err = provider.open_saved("gone").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}
