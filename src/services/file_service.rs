use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ProjectAccess, ServiceError, ServiceResult};
use crate::auth::Identity;
use crate::database::RecordStore;
use crate::directory::{Directory, FileEntry, Folder, RemoveOutcome};
use crate::storage::{self, BlobStore};

/// Result of deleting a file: the object is always gone; the metadata
/// entry may already have been missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFileOutcome {
    Deleted,
    NotInMetadata,
}

/// Pre-signed transfers plus the project's directory tree
pub struct FileService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
}

impl FileService {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { records, blobs }
    }

    async fn access(&self, identity: &Identity, project_id: &str) -> ServiceResult<ProjectAccess> {
        ProjectAccess::load(self.records.as_ref(), project_id, identity).await
    }

    async fn editable(&self, identity: &Identity, project_id: &str) -> ServiceResult<ProjectAccess> {
        let access = self.access(identity, project_id).await?;
        access.require_edit()?;
        Ok(access)
    }

    /// A key is usable from a project when it lives under the project's
    /// prefix or the project's tree already references it.
    fn require_project_key(access: &ProjectAccess, key: &str) -> ServiceResult<()> {
        if key.trim().is_empty() {
            return Err(ServiceError::invalid_field("key", "File key required"));
        }
        let project = &access.project;
        if !storage::belongs_to_project(key, &project.project_id) && !project.directory.contains_key(key) {
            return Err(ServiceError::Forbidden("File key does not belong to this project".to_string()));
        }
        Ok(())
    }

    /// Upload URL and object key for `file_name`
    pub async fn presign_upload(
        &self,
        identity: &Identity,
        project_id: &str,
        file_name: &str,
        file_type: &str,
    ) -> ServiceResult<(String, String)> {
        if file_name.trim().is_empty() || file_type.trim().is_empty() {
            return Err(ServiceError::validation("Missing fileName or fileType"));
        }
        let key = storage::object_key(project_id, file_name)?;
        self.editable(identity, project_id).await?;

        let url = self.blobs.presign_put(&key, file_type).await?;
        Ok((url, key))
    }

    pub async fn presign_download(&self, identity: &Identity, project_id: &str, key: &str) -> ServiceResult<String> {
        let access = self.access(identity, project_id).await?;
        Self::require_project_key(&access, key)?;
        Ok(self.blobs.presign_get(key).await?)
    }

    pub async fn get_directory(&self, identity: &Identity, project_id: &str) -> ServiceResult<Directory> {
        Ok(self.access(identity, project_id).await?.project.directory)
    }

    /// Replace the whole tree. Only the root name is checked.
    pub async fn replace_directory(
        &self,
        identity: &Identity,
        project_id: &str,
        directory: Directory,
    ) -> ServiceResult<()> {
        if directory.name != crate::directory::ROOT_NAME {
            return Err(ServiceError::invalid_field("name", "Directory root must be named 'root'"));
        }
        let access = self.editable(identity, project_id).await?;
        self.records.update_directory(&access.key(), &directory).await?;
        Ok(())
    }

    pub async fn create_folder(
        &self,
        identity: &Identity,
        project_id: &str,
        path: &[String],
        folder_name: &str,
    ) -> ServiceResult<Folder> {
        let access = self.editable(identity, project_id).await?;
        let mut directory = access.project.directory.clone();

        let folder = directory.create_folder(path, folder_name, Utc::now())?.clone();
        self.records.update_directory(&access.key(), &directory).await?;
        Ok(folder)
    }

    /// Remove a folder subtree and every object it references.
    ///
    /// The tree is resolved first; blobs are deleted next and the tree is
    /// written last, so a failed blob delete leaves the metadata intact.
    /// Returns the keys of the deleted objects.
    pub async fn delete_folder(
        &self,
        identity: &Identity,
        project_id: &str,
        path: &[String],
        folder_name: &str,
    ) -> ServiceResult<Vec<String>> {
        let access = self.editable(identity, project_id).await?;
        let mut directory = access.project.directory.clone();

        let files = directory.delete_folder(path, folder_name)?;
        let mut deleted = Vec::with_capacity(files.len());
        for file in &files {
            self.blobs.delete(&file.key).await?;
            deleted.push(file.key.clone());
        }

        self.records.update_directory(&access.key(), &directory).await?;
        info!(
            "Deleted folder '{}' from project {} ({} objects)",
            folder_name,
            project_id,
            deleted.len()
        );
        Ok(deleted)
    }

    pub async fn add_file_metadata(
        &self,
        identity: &Identity,
        project_id: &str,
        path: &[String],
        entry: FileEntry,
    ) -> ServiceResult<FileEntry> {
        if entry.name.trim().is_empty() || entry.key.trim().is_empty() {
            return Err(ServiceError::validation("Missing required fields"));
        }
        let access = self.editable(identity, project_id).await?;
        let mut directory = access.project.directory.clone();

        let added = directory.add_file(path, entry)?.clone();
        self.records.update_directory(&access.key(), &directory).await?;
        Ok(added)
    }

    /// Delete the object, then its metadata entries under `path`.
    pub async fn delete_file(
        &self,
        identity: &Identity,
        project_id: &str,
        path: &[String],
        key: &str,
    ) -> ServiceResult<DeleteFileOutcome> {
        let access = self.editable(identity, project_id).await?;
        Self::require_project_key(&access, key)?;

        self.blobs.delete(key).await?;

        let mut directory = access.project.directory.clone();
        match directory.remove_file(path, key)? {
            RemoveOutcome::Removed(count) => {
                self.records.update_directory(&access.key(), &directory).await?;
                info!("Deleted {} ({} metadata entries) from project {}", key, count, project_id);
                Ok(DeleteFileOutcome::Deleted)
            }
            RemoveOutcome::NotInMetadata => {
                warn!("Object {} deleted but not present in project {} metadata", key, project_id);
                Ok(DeleteFileOutcome::NotInMetadata)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewProject, Project};
    use crate::directory::DirectoryError;
    use crate::testing::{identity, TestContext};

    fn service(ctx: &TestContext) -> FileService {
        FileService::new(ctx.records.clone(), ctx.blobs.clone())
    }

    async fn project(ctx: &TestContext) -> Project {
        let project = Project::create(
            "owner",
            NewProject {
                name: Some("A".to_string()),
                ..Default::default()
            },
            Utc::now(),
        );
        ctx.records.put_project(&project).await.unwrap();
        project
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn entry(name: &str, key: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            size: Some("1024".to_string()),
            uploaded_at: None,
            key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn presign_upload_builds_project_key() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let (url, key) = service(&ctx)
            .presign_upload(&identity("owner"), &p.project_id, "plan.pdf", "application/pdf")
            .await
            .unwrap();
        assert_eq!(key, format!("projects/{}/plan.pdf", p.project_id));
        assert!(url.contains(&key));
    }

    #[tokio::test]
    async fn presign_download_rejects_foreign_keys() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let result = service(&ctx)
            .presign_download(&identity("owner"), &p.project_id, "projects/other/a.pdf")
            .await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn duplicate_folder_leaves_tree_unchanged() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let svc = service(&ctx);
        let owner = identity("owner");

        svc.create_folder(&owner, &p.project_id, &[], "Drawings").await.unwrap();
        let err = svc
            .create_folder(&owner, &p.project_id, &[], "Drawings")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Directory(DirectoryError::AlreadyExists(_))));

        let tree = svc.get_directory(&owner, &p.project_id).await.unwrap();
        assert_eq!(tree.folders.len(), 1);
    }

    #[tokio::test]
    async fn delete_folder_deletes_blobs_then_metadata() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let svc = service(&ctx);
        let owner = identity("owner");
        let k1 = format!("projects/{}/a.pdf", p.project_id);

        svc.create_folder(&owner, &p.project_id, &[], "Drawings").await.unwrap();
        svc.create_folder(&owner, &p.project_id, &path(&["Drawings"]), "Civil")
            .await
            .unwrap();
        svc.add_file_metadata(&owner, &p.project_id, &path(&["Drawings", "Civil"]), entry("a.pdf", &k1))
            .await
            .unwrap();

        let deleted = svc
            .delete_folder(&owner, &p.project_id, &[], "Drawings")
            .await
            .unwrap();
        assert_eq!(deleted, vec![k1.clone()]);
        assert_eq!(ctx.blobs.deleted_keys().await, vec![k1]);
        assert!(svc.get_directory(&owner, &p.project_id).await.unwrap().folders.is_empty());
    }

    #[tokio::test]
    async fn failed_blob_delete_keeps_metadata() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let svc = service(&ctx);
        let owner = identity("owner");
        let key = format!("projects/{}/a.pdf", p.project_id);

        svc.create_folder(&owner, &p.project_id, &[], "Drawings").await.unwrap();
        svc.add_file_metadata(&owner, &p.project_id, &path(&["Drawings"]), entry("a.pdf", &key))
            .await
            .unwrap();

        ctx.blobs.set_fail_deletes(true);
        assert!(matches!(
            svc.delete_folder(&owner, &p.project_id, &[], "Drawings").await,
            Err(ServiceError::Blob(_))
        ));
        let tree = svc.get_directory(&owner, &p.project_id).await.unwrap();
        assert_eq!(tree.folders[0].files.len(), 1);
    }

    #[tokio::test]
    async fn add_then_delete_restores_file_list() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let svc = service(&ctx);
        let owner = identity("owner");
        let existing = format!("projects/{}/keep.pdf", p.project_id);
        let key = format!("projects/{}/temp.pdf", p.project_id);

        svc.add_file_metadata(&owner, &p.project_id, &[], entry("keep.pdf", &existing))
            .await
            .unwrap();
        let before = svc.get_directory(&owner, &p.project_id).await.unwrap().files;

        svc.add_file_metadata(&owner, &p.project_id, &[], entry("temp.pdf", &key))
            .await
            .unwrap();
        let outcome = svc.delete_file(&owner, &p.project_id, &[], &key).await.unwrap();
        assert_eq!(outcome, DeleteFileOutcome::Deleted);

        let after = svc.get_directory(&owner, &p.project_id).await.unwrap().files;
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn deleting_unknown_key_warns_but_deletes_object() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let key = format!("projects/{}/ghost.pdf", p.project_id);

        let outcome = service(&ctx)
            .delete_file(&identity("owner"), &p.project_id, &[], &key)
            .await
            .unwrap();
        assert_eq!(outcome, DeleteFileOutcome::NotInMetadata);
        assert_eq!(ctx.blobs.deleted_keys().await, vec![key]);
    }

    #[tokio::test]
    async fn delete_folder_queues_plain_keys() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let svc = service(&ctx);
        let owner = identity("owner");

        svc.create_folder(&owner, &p.project_id, &[], "Drawings").await.unwrap();
        svc.create_folder(&owner, &p.project_id, &path(&["Drawings"]), "Civil")
            .await
            .unwrap();
        svc.add_file_metadata(&owner, &p.project_id, &path(&["Drawings", "Civil"]), entry("a.pdf", "k1"))
            .await
            .unwrap();

        let deleted = svc.delete_folder(&owner, &p.project_id, &[], "Drawings").await.unwrap();
        assert_eq!(deleted, vec!["k1".to_string()]);
        assert_eq!(ctx.blobs.deleted_keys().await, vec!["k1".to_string()]);
    }

    #[tokio::test]
    async fn recorded_keys_are_always_deletable() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let svc = service(&ctx);
        let owner = identity("owner");

        svc.add_file_metadata(&owner, &p.project_id, &[], entry("b.pdf", "k2"))
            .await
            .unwrap();
        svc.presign_download(&owner, &p.project_id, "k2").await.unwrap();

        let outcome = svc.delete_file(&owner, &p.project_id, &[], "k2").await.unwrap();
        assert_eq!(outcome, DeleteFileOutcome::Deleted);
        assert!(svc.get_directory(&owner, &p.project_id).await.unwrap().files.is_empty());

        // Once the record is gone the bare key is out of scope again
        let err = svc.delete_file(&owner, &p.project_id, &[], "k2").await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn metadata_under_missing_path_is_not_found() {
        let ctx = TestContext::new();
        let p = project(&ctx).await;
        let key = format!("projects/{}/a.pdf", p.project_id);
        let err = service(&ctx)
            .add_file_metadata(&identity("owner"), &p.project_id, &path(&["Nope"]), entry("a.pdf", &key))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Directory(DirectoryError::PathNotFound { .. })));
    }
}
