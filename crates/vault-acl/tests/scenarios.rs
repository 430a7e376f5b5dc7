//! End-to-end scenarios, mostly over the in-memory store.

use vault_acl::core::{
    CredentialUpdate, NewCredential, NewDocument, NewUser, Secret, UserId,
};
use vault_acl::{
    Actor, Basis, Decision, DocumentFlags, DocumentGrant, DocumentOp, FolderFlags, FolderGrant,
    FolderOp, MemoryStore, Role, Source, Store, Target, Vault, VaultConfig, VaultError,
};

struct Setup {
    vault: Vault<MemoryStore>,
    admin: Actor,
    junior: Actor,
    senior: Actor,
}

async fn setup(config: VaultConfig) -> Setup {
    let vault = Vault::new(MemoryStore::new(), config);
    for name in ["junior", "qa", "senior"] {
        vault.create_group(name, "").await.unwrap();
    }

    let admin = vault
        .create_user(&NewUser::new("root@example.com", Role::Admin, "senior"))
        .await
        .unwrap();
    let junior = vault
        .create_user(&NewUser::new("jun@example.com", Role::User, "junior"))
        .await
        .unwrap();
    let senior = vault
        .create_user(&NewUser::new("sen@example.com", Role::User, "senior"))
        .await
        .unwrap();

    Setup {
        admin: Actor::from(&admin),
        junior: Actor::from(&junior),
        senior: Actor::from(&senior),
        vault,
    }
}

fn password(folder_id: vault_acl::core::FolderId, service: &str) -> NewCredential {
    NewCredential {
        folder_id,
        service_name: service.into(),
        username: "svc".into(),
        password: Secret::from("s3cret"),
        notes: String::new(),
    }
}

fn upload(name: &str) -> NewDocument {
    NewDocument {
        filename: format!("blob-{name}"),
        original_filename: name.into(),
        size: 10,
        mime_type: "text/plain".into(),
        uploaded_by: UserId::new(1),
        description: String::new(),
    }
}

#[tokio::test]
async fn test_junior_without_entry_sees_nothing() {
    let s = setup(VaultConfig::default()).await;
    let prod = s.vault.create_folder("prod", "").await.unwrap().id;
    s.vault
        .create_credential(&s.admin, &password(prod, "db"))
        .await
        .unwrap();

    assert!(s
        .vault
        .credentials_in_folder(&s.junior, prod)
        .await
        .unwrap()
        .is_empty());
    assert!(s.vault.visible_credentials(&s.junior).await.unwrap().is_empty());
    assert!(s.vault.folders_for(&s.junior).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_prod_read_only_for_junior() {
    let s = setup(VaultConfig::default()).await;
    let prod = s.vault.create_folder("prod", "").await.unwrap().id;
    s.vault
        .replace_folder_matrix(prod, &[FolderGrant::new("junior", FolderFlags::read_only())])
        .await
        .unwrap();

    let read = s
        .vault
        .evaluate(&s.junior, Target::folder(prod, FolderOp::Read))
        .await
        .unwrap();
    let write = s
        .vault
        .evaluate(&s.junior, Target::folder(prod, FolderOp::Write))
        .await
        .unwrap();
    assert_eq!(read, Decision::Allow);
    assert_eq!(write, Decision::Deny);

    let err = s
        .vault
        .create_credential(&s.junior, &password(prod, "db"))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Denied(ref v) if v.basis == Basis::NotGranted));
}

#[tokio::test]
async fn test_delete_group_in_use_is_refused() {
    let s = setup(VaultConfig::default()).await;
    let qa = s.vault.group_by_name("qa").await.unwrap().unwrap();
    for email in ["qa1@example.com", "qa2@example.com"] {
        s.vault
            .create_user(&NewUser::new(email, Role::User, "qa"))
            .await
            .unwrap();
    }

    let err = s.vault.delete_group(qa.id).await.unwrap_err();
    assert!(matches!(err, VaultError::GroupInUse { users: 2, .. }));
    assert!(s.vault.group(qa.id).await.is_ok());
}

#[tokio::test]
async fn test_admin_bypasses_empty_matrix() {
    let s = setup(VaultConfig::default()).await;
    let prod = s.vault.create_folder("prod", "").await.unwrap().id;

    let verdict = s
        .vault
        .explain(&s.admin, Target::folder(prod, FolderOp::Delete))
        .await
        .unwrap();
    assert_eq!(verdict.basis, Basis::AdminBypass);

    let cred = s
        .vault
        .create_credential(&s.admin, &password(prod, "db"))
        .await
        .unwrap();
    s.vault.delete_credential(&s.admin, cred.id).await.unwrap();
}

#[tokio::test]
async fn test_folder_matrix_lists_every_group() {
    let s = setup(VaultConfig::default()).await;
    let prod = s.vault.create_folder("prod", "").await.unwrap().id;
    s.vault
        .upsert_folder_permission(prod, FolderGrant::new("senior", FolderFlags::new(true, true, false)))
        .await
        .unwrap();

    let matrix = s.vault.folder_matrix(prod).await.unwrap();
    let rows: Vec<_> = matrix
        .cells
        .iter()
        .map(|c| (c.group.as_str(), c.source))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("junior", Source::Default),
            ("qa", Source::Default),
            ("senior", Source::Explicit),
        ]
    );
}

#[tokio::test]
async fn test_download_implies_view_on_documents() {
    let s = setup(VaultConfig::default()).await;
    let doc = s.vault.create_document(&upload("runbook.md")).await.unwrap().id;
    s.vault
        .replace_document_matrix(doc, &[DocumentGrant::new("junior", DocumentFlags::new(false, true))])
        .await
        .unwrap();

    let verdict = s
        .vault
        .explain(&s.junior, Target::document(doc, DocumentOp::View))
        .await
        .unwrap();
    assert_eq!(verdict.decision, Decision::Allow);
    assert_eq!(verdict.basis, Basis::ImpliedByDownload);

    // Stored as given.
    let matrix = s.vault.document_matrix(doc).await.unwrap();
    assert!(!matrix.flags("junior").can_view);

    let visible = s.vault.documents_for(&s.junior).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].access, DocumentFlags::ALL);
    assert!(s.vault.documents_for(&s.senior).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_document_defaults_from_config() {
    let s = setup(VaultConfig {
        document_defaults: vec![
            DocumentGrant::new("senior", DocumentFlags::ALL),
            DocumentGrant::new("retired", DocumentFlags::ALL),
        ],
        ..VaultConfig::default()
    })
    .await;

    let doc = s.vault.create_document(&upload("notes.txt")).await.unwrap().id;
    let matrix = s.vault.document_matrix(doc).await.unwrap();
    assert_eq!(matrix.flags("senior"), DocumentFlags::ALL);
    assert_eq!(matrix.explicit().count(), 1);
}

#[tokio::test]
async fn test_rename_keeps_access() {
    let s = setup(VaultConfig::default()).await;
    let prod = s.vault.create_folder("prod", "").await.unwrap().id;
    s.vault
        .upsert_folder_permission(prod, FolderGrant::new("junior", FolderFlags::read_only()))
        .await
        .unwrap();

    let junior = s.vault.group_by_name("junior").await.unwrap().unwrap();
    s.vault
        .update_group(junior.id, vault_acl::core::GroupUpdate::rename("apprentice"))
        .await
        .unwrap();

    let user = s.vault.user(s.junior.id).await.unwrap();
    assert_eq!(user.group, "apprentice");
    let actor = Actor::from(&user);
    assert_eq!(
        s.vault
            .evaluate(&actor, Target::folder(prod, FolderOp::Read))
            .await
            .unwrap(),
        Decision::Allow
    );
}

#[tokio::test]
async fn test_credential_lifecycle_for_senior() {
    let s = setup(VaultConfig::default()).await;
    let prod = s.vault.create_folder("prod", "").await.unwrap().id;
    s.vault
        .replace_folder_matrix(
            prod,
            &[
                FolderGrant::new("senior", FolderFlags::new(true, true, false)),
                FolderGrant::new("junior", FolderFlags::read_only()),
            ],
        )
        .await
        .unwrap();

    let cred = s
        .vault
        .create_credential(&s.senior, &password(prod, "db"))
        .await
        .unwrap();
    assert_eq!(cred.created_by, s.senior.id);

    let updated = s
        .vault
        .update_credential(
            &s.senior,
            cred.id,
            &CredentialUpdate {
                username: Some("admin".into()),
                ..CredentialUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.username, "admin");
    assert_eq!(s.vault.credential(&s.junior, cred.id).await.unwrap().username, "admin");

    // Write without delete.
    let err = s.vault.delete_credential(&s.senior, cred.id).await.unwrap_err();
    assert!(matches!(err, VaultError::Denied(_)));

    let empty = CredentialUpdate {
        password: Some(Secret::from("")),
        ..CredentialUpdate::default()
    };
    assert!(matches!(
        s.vault.update_credential(&s.senior, cred.id, &empty).await,
        Err(VaultError::Validation(_))
    ));
}

#[tokio::test]
async fn test_delete_folder_removes_credentials() {
    let s = setup(VaultConfig::default()).await;
    let prod = s.vault.create_folder("prod", "").await.unwrap().id;
    let cred = s
        .vault
        .create_credential(&s.admin, &password(prod, "db"))
        .await
        .unwrap();

    s.vault.delete_folder(prod).await.unwrap();

    assert!(s.vault.visible_credentials(&s.admin).await.unwrap().is_empty());
    assert!(matches!(
        s.vault.credential(&s.admin, cred.id).await,
        Err(VaultError::NotFound { entity: "credential", .. })
    ));
}

#[tokio::test]
async fn test_folders_for_reports_effective_access() {
    let s = setup(VaultConfig::default()).await;
    let prod = s.vault.create_folder("prod", "").await.unwrap().id;
    let staging = s.vault.create_folder("staging", "").await.unwrap().id;
    s.vault.create_folder("vault", "").await.unwrap();
    s.vault
        .upsert_folder_permission(prod, FolderGrant::new("junior", FolderFlags::read_only()))
        .await
        .unwrap();
    s.vault
        .upsert_folder_permission(staging, FolderGrant::new("junior", FolderFlags::new(true, true, false)))
        .await
        .unwrap();

    let junior: Vec<_> = s
        .vault
        .folders_for(&s.junior)
        .await
        .unwrap()
        .into_iter()
        .map(|f| (f.folder.name, f.access))
        .collect();
    assert_eq!(
        junior,
        vec![
            ("prod".to_string(), FolderFlags::read_only()),
            ("staging".to_string(), FolderFlags::new(true, true, false)),
        ]
    );

    let admin = s.vault.folders_for(&s.admin).await.unwrap();
    assert_eq!(admin.len(), 3);
    assert!(admin.iter().all(|f| f.access == FolderFlags::ALL));
}

#[tokio::test]
async fn test_delete_document_removes_entries() {
    let s = setup(VaultConfig::default()).await;
    let keep = s.vault.create_document(&upload("keep.md")).await.unwrap().id;
    let doc = s.vault.create_document(&upload("runbook.md")).await.unwrap().id;
    s.vault
        .upsert_document_permission(doc, DocumentGrant::new("junior", DocumentFlags::ALL))
        .await
        .unwrap();
    s.vault
        .upsert_document_permission(doc, DocumentGrant::new("senior", DocumentFlags::new(true, false)))
        .await
        .unwrap();

    let listed: Vec<_> = s.vault.list_documents().await.unwrap().into_iter().map(|d| d.id).collect();
    assert_eq!(listed, vec![doc, keep]);
    assert_eq!(s.vault.documents_for(&s.junior).await.unwrap().len(), 1);

    s.vault.delete_document(doc).await.unwrap();

    for group in ["junior", "senior"] {
        assert_eq!(s.vault.store().document_permission(doc, group).await.unwrap(), None);
    }
    assert!(s.vault.documents_for(&s.junior).await.unwrap().is_empty());
    assert!(matches!(
        s.vault.delete_document(doc).await,
        Err(VaultError::NotFound { entity: "document", .. })
    ));
    assert!(matches!(
        s.vault.document_matrix(doc).await,
        Err(VaultError::NotFound { entity: "document", .. })
    ));
}

#[tokio::test]
async fn test_open_in_memory_sqlite_vault() {
    let vault = Vault::open(":memory:", VaultConfig::default()).unwrap();
    vault.create_group("junior", "").await.unwrap();
    let prod = vault.create_folder("prod", "").await.unwrap().id;

    let matrix = vault.folder_matrix(prod).await.unwrap();
    assert_eq!(matrix.flags("junior"), FolderFlags::NONE);
}
