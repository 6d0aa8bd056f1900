use anyhow::Result;
use bytes::Bytes;
use gallery_admin_core::{
    audit::{ActionLogger, LogStore},
    backend::faulty::{Fault, FaultyBackend},
    backend::memory::MemoryBackend,
    gallery::{FolderOrder, GalleryError, GalleryService, GalleryStore},
    identity::Actor,
};
use std::sync::Arc;

fn editor() -> Actor {
    Actor {
        id: "editor-id".into(),
        email: "editor@example.com".into(),
        name: "Editor".into(),
    }
}

fn setup() -> (Arc<FaultyBackend>, GalleryService) {
    let backend = Arc::new(FaultyBackend::new(Arc::new(MemoryBackend::new())));
    let service = GalleryService::new(
        backend.clone(),
        backend.clone(),
        ActionLogger::new(backend.clone()),
    );
    (backend, service)
}

#[tokio::test]
async fn folders_list_in_both_orders_and_search() -> Result<()> {
    let (_backend, gallery) = setup();
    for name in ["Holidays", "Cats", "holiday drafts"] {
        gallery.create_folder(&editor(), name).await?;
    }
    let desc: Vec<String> = gallery
        .list_folders(FolderOrder::Desc)
        .await?
        .into_iter()
        .map(|f| f.name)
        .collect();
    let asc: Vec<String> = gallery
        .list_folders(FolderOrder::Asc)
        .await?
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(asc, vec!["Holidays", "Cats", "holiday drafts"]);
    assert_eq!(desc, asc.iter().rev().cloned().collect::<Vec<_>>());

    let found = gallery.search_folders("HOLIDAY").await?;
    assert_eq!(found.len(), 2);
    Ok(())
}

#[tokio::test]
async fn blank_folder_name_is_rejected_without_writes() -> Result<()> {
    let (backend, gallery) = setup();
    let err = gallery.create_folder(&editor(), "   ").await.unwrap_err();
    assert!(matches!(err, GalleryError::InvalidInput(_)));
    assert!(backend.list_folders(FolderOrder::Asc).await?.is_empty());
    assert!(backend.list_logs().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn rename_updates_name_and_logs() -> Result<()> {
    let (backend, gallery) = setup();
    let folder = gallery.create_folder(&editor(), "old").await?.value;
    let renamed = gallery.rename_folder(&editor(), folder.id, "new").await?;
    assert_eq!(renamed.value.name, "new");
    assert_eq!(
        backend.get_folder(folder.id).await?.map(|f| f.name).as_deref(),
        Some("new")
    );
    let logs = backend.list_logs().await?;
    assert_eq!(logs[0].action, format!("Renamed folder {} to new", folder.id));
    Ok(())
}

#[tokio::test]
async fn upload_stores_object_and_row() -> Result<()> {
    let (backend, gallery) = setup();
    let folder = gallery.create_folder(&editor(), "cats").await?.value;
    let image = gallery
        .upload_image(&editor(), folder.id, "tom.png", Bytes::from_static(b"png"))
        .await?
        .value;
    assert!(image.uri.starts_with(&format!("memory://images/folder_{}/", folder.id)));
    assert!(image.uri.ends_with("_tom.png"));
    assert_eq!(gallery.list_images(folder.id).await?, vec![image]);
    assert_eq!(backend.inner().object_paths().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn upload_into_missing_folder_is_not_found() -> Result<()> {
    let (backend, gallery) = setup();
    let err = gallery
        .upload_image(&editor(), 42, "x.png", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::NotFound(_)));
    assert!(backend.inner().object_paths().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn delete_folder_cascades_to_objects_and_rows() -> Result<()> {
    let (backend, gallery) = setup();
    let keep = gallery.create_folder(&editor(), "keep").await?.value;
    let doomed = gallery.create_folder(&editor(), "doomed").await?.value;
    for (folder, name) in [(&doomed, "a.png"), (&doomed, "b.png"), (&keep, "c.png")] {
        gallery
            .upload_image(&editor(), folder.id, name, Bytes::from_static(b"img"))
            .await?;
    }

    gallery.delete_folder(&editor(), doomed.id).await?;

    assert!(backend.get_folder(doomed.id).await?.is_none());
    assert!(gallery.list_images(doomed.id).await?.is_empty());
    assert_eq!(gallery.list_images(keep.id).await?.len(), 1);
    let paths = backend.inner().object_paths().await;
    assert_eq!(paths.len(), 1);
    assert!(paths[0].starts_with(&format!("folder_{}/", keep.id)));
    Ok(())
}

#[tokio::test]
async fn delete_image_removes_object_then_row() -> Result<()> {
    let (backend, gallery) = setup();
    let folder = gallery.create_folder(&editor(), "f").await?.value;
    let image = gallery
        .upload_image(&editor(), folder.id, "a.png", Bytes::from_static(b"a"))
        .await?
        .value;
    gallery.delete_image(&editor(), image.id).await?;
    assert!(backend.get_image(image.id).await?.is_none());
    assert!(backend.inner().object_paths().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn storage_failure_keeps_image_row() -> Result<()> {
    let (backend, gallery) = setup();
    let folder = gallery.create_folder(&editor(), "f").await?.value;
    let image = gallery
        .upload_image(&editor(), folder.id, "a.png", Bytes::from_static(b"a"))
        .await?
        .value;
    backend.inject(Fault::ObjectRemove);
    let err = gallery.delete_image(&editor(), image.id).await.unwrap_err();
    assert!(matches!(err, GalleryError::Store(_)));
    assert!(backend.get_image(image.id).await?.is_some());

    backend.clear(Fault::ObjectRemove);
    gallery.delete_image(&editor(), image.id).await?;
    assert!(backend.get_image(image.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn failed_folder_insert_writes_no_log() -> Result<()> {
    let (backend, gallery) = setup();
    backend.inject(Fault::GalleryWrite);
    let err = gallery.create_folder(&editor(), "cats").await.unwrap_err();
    assert!(matches!(err, GalleryError::Store(_)));
    assert!(backend.list_logs().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn log_failure_does_not_undo_folder_creation() -> Result<()> {
    let (backend, gallery) = setup();
    backend.inject(Fault::LogAppend);
    let created = gallery.create_folder(&editor(), "still here").await?;
    assert!(created.warning.is_some());
    assert!(backend.get_folder(created.value.id).await?.is_some());
    Ok(())
}
