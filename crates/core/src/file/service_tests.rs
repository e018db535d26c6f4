use std::collections::HashSet;

use rstest::rstest;

use super::*;
use crate::file::InMemoryFileRepository;
use crate::storage::{AdapterState, MemoryStorage};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0";

struct Fixture {
    storage: Arc<MemoryStorage>,
    repo: Arc<InMemoryFileRepository>,
    service: FileService,
}

fn fixture() -> Fixture {
    let storage = Arc::new(MemoryStorage::ready());
    let repo = Arc::new(InMemoryFileRepository::new());
    let service = FileService::new(storage.clone(), repo.clone());
    Fixture {
        storage,
        repo,
        service,
    }
}

/// Index that refuses every write.
struct BrokenRepository;

#[async_trait]
impl FileRepository for BrokenRepository {
    async fn insert(&self, _file: &File) -> Result<(), FileError> {
        Err(FileError::repository("connection refused"))
    }

    async fn find_by_id(&self, _attachment_id: &str) -> Result<Option<File>, FileError> {
        Ok(None)
    }

    async fn list_by_owner(
        &self,
        _owner_id: &str,
        _limit: u64,
        _window: TimeWindow,
    ) -> Result<Vec<File>, FileError> {
        Ok(Vec::new())
    }

    async fn count_by_owner(&self, _owner_id: &str, _window: TimeWindow) -> Result<u64, FileError> {
        Ok(0)
    }

    async fn update_name(&self, _attachment_id: &str, _name: &str) -> Result<(), FileError> {
        Err(FileError::repository("connection refused"))
    }

    async fn delete(&self, _attachment_id: &str) -> Result<bool, FileError> {
        Err(FileError::repository("connection refused"))
    }
}

#[tokio::test]
async fn test_upload_records_file() {
    let fx = fixture();

    let file = fx
        .service
        .upload("alice", "photo one.png", Bytes::from_static(PNG))
        .await
        .unwrap();

    assert_eq!(file.owner_id, "alice");
    assert_eq!(file.name, "photo one.png");
    assert_eq!(file.safe_name, "photo_one.png");
    assert_eq!(file.extension.as_deref(), Some("PNG"));
    assert_eq!(file.mime.as_deref(), Some("image/png"));
    assert_eq!(file.size, PNG.len() as u64);
    assert_eq!(file.url(), format!("/files/{}/photo%20one.png", file.attachment_id));

    let stored = fx.repo.find_by_id(&file.attachment_id).await.unwrap();
    assert_eq!(stored, Some(file));
    assert_eq!(fx.storage.len(), 1);
}

#[tokio::test]
async fn test_mime_comes_from_content_not_extension() {
    let fx = fixture();
    let file = fx
        .service
        .upload("alice", "notes.png", Bytes::from_static(b"just some text"))
        .await
        .unwrap();
    assert_eq!(file.extension.as_deref(), Some("PNG"));
    assert_eq!(file.mime, None);
}

#[rstest]
#[case(8_000_000, true)]
#[case(8_000_001, false)]
#[tokio::test]
async fn test_upload_size_bound(#[case] size: usize, #[case] accepted: bool) {
    let fx = fixture();
    let result = fx
        .service
        .upload("alice", "big.bin", Bytes::from(vec![0_u8; size]))
        .await;

    if accepted {
        assert!(result.is_ok());
    } else {
        assert!(matches!(result, Err(FileError::FileTooLarge { .. })));
        assert!(fx.storage.is_empty());
    }
}

#[rstest]
#[case(63, true)]
#[case(64, false)]
#[tokio::test]
async fn test_upload_name_bound(#[case] len: usize, #[case] accepted: bool) {
    let fx = fixture();
    let name = "n".repeat(len);
    let result = fx
        .service
        .upload("alice", &name, Bytes::from_static(b"x"))
        .await;

    if accepted {
        assert_eq!(result.unwrap().name, name);
    } else {
        match result {
            Err(FileError::InvalidName { field, constraints }) => {
                assert_eq!(field, "file.originalname");
                assert_eq!(constraints, "maximum length: 63 characters");
            }
            other => panic!("expected InvalidName, got {other:?}"),
        }
        assert!(fx.storage.is_empty());
    }
}

#[tokio::test]
async fn test_upload_fails_when_storage_not_ready() {
    let fx = fixture();
    fx.storage.set_state(AdapterState::Connecting);

    let err = fx
        .service
        .upload("alice", "a.txt", Bytes::from_static(b"a"))
        .await
        .unwrap_err();

    assert!(matches!(err, FileError::Storage(StorageError::NotReady)));
    assert_eq!(fx.repo.count_by_owner("alice", TimeWindow::unbounded()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_upload_index_failure_surfaces_error() {
    let storage = Arc::new(MemoryStorage::ready());
    let service = FileService::new(storage.clone(), Arc::new(BrokenRepository));

    let err = service
        .upload("alice", "a.txt", Bytes::from_static(b"a"))
        .await
        .unwrap_err();

    assert!(matches!(err, FileError::Repository(_)));
    // no compensation: the blob stays behind for reconciliation
    assert_eq!(storage.len(), 1);
}

#[tokio::test]
async fn test_retrieve_gates() {
    let fx = fixture();
    let file = fx
        .service
        .upload("alice", "a.txt", Bytes::from_static(b"a"))
        .await
        .unwrap();
    let id = file.attachment_id.as_str();

    assert_eq!(fx.service.retrieve(id, Some("a.txt"), Some("alice")).await.unwrap(), file);
    assert_eq!(fx.service.retrieve(id, None, None).await.unwrap(), file);
    assert!(matches!(
        fx.service.retrieve(id, Some("a.txt"), Some("bob")).await,
        Err(FileError::Forbidden)
    ));
    assert!(matches!(
        fx.service.retrieve(id, Some("b.txt"), Some("alice")).await,
        Err(FileError::NotFound)
    ));
    // a wrong name hides the file even from strangers
    assert!(matches!(
        fx.service.retrieve(id, Some("b.txt"), Some("bob")).await,
        Err(FileError::NotFound)
    ));
    assert!(matches!(
        fx.service.retrieve("0", Some("a.txt"), Some("alice")).await,
        Err(FileError::NotFound)
    ));
}

#[tokio::test]
async fn test_list_without_limit_returns_counts_only() {
    let fx = fixture();
    for i in 0..3 {
        fx.service
            .upload("alice", &format!("{i}.txt"), Bytes::from_static(b"x"))
            .await
            .unwrap();
    }

    for limit in [None, Some(0)] {
        let listing = fx
            .service
            .list(
                "alice",
                ListFilesQuery {
                    limit,
                    ..ListFilesQuery::default()
                },
            )
            .await
            .unwrap();
        assert!(listing.files.is_empty());
        assert_eq!(listing.total_file_count, 3);
        assert_eq!(listing.earlier_files_left, 0);
    }
}

#[tokio::test]
async fn test_list_is_owner_scoped_and_newest_first() {
    let fx = fixture();
    for (owner, name) in [("alice", "1"), ("bob", "2"), ("alice", "3")] {
        fx.service
            .upload(owner, name, Bytes::from_static(b"x"))
            .await
            .unwrap();
    }

    let listing = fx
        .service
        .list(
            "alice",
            ListFilesQuery {
                limit: Some(10),
                ..ListFilesQuery::default()
            },
        )
        .await
        .unwrap();

    let names: Vec<&str> = listing.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["3", "1"]);
    assert_eq!(listing.total_file_count, 2);
    assert_eq!(listing.earlier_files_left, 0);
}

#[rstest]
#[case(7, 1)]
#[case(7, 3)]
#[case(9, 3)]
#[case(4, 10)]
#[tokio::test]
async fn test_pagination_enumerates_each_file_once(#[case] total: usize, #[case] page: u64) {
    let fx = fixture();
    for i in 0..total {
        fx.service
            .upload("alice", &format!("{i}.txt"), Bytes::from_static(b"x"))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut before = None;
    loop {
        let listing = fx
            .service
            .list(
                "alice",
                ListFilesQuery {
                    limit: Some(page),
                    window: TimeWindow {
                        before,
                        after: None,
                    },
                },
            )
            .await
            .unwrap();
        let Some(last) = listing.files.last() else {
            break;
        };
        before = Some(last.upload_timestamp);
        let left = listing.earlier_files_left;
        seen.extend(listing.files);
        assert_eq!(left as usize, total - seen.len());
    }

    assert_eq!(seen.len(), total);
    assert!(seen.windows(2).all(|w| w[0].upload_timestamp > w[1].upload_timestamp));
    let unique: HashSet<&str> = seen.iter().map(|f| f.attachment_id.as_str()).collect();
    assert_eq!(unique.len(), total);
}

#[tokio::test]
async fn test_rename_keeps_extension_and_mime() {
    let fx = fixture();
    let file = fx
        .service
        .upload("alice", "photo.png", Bytes::from_static(PNG))
        .await
        .unwrap();

    let renamed = fx
        .service
        .rename(
            &file.attachment_id,
            "photo.png",
            "alice",
            FilePatch {
                name: Some("photo.jpg".to_string()),
            },
        )
        .await
        .unwrap();

    assert_eq!(renamed.name, "photo.jpg");
    assert_eq!(renamed.extension.as_deref(), Some("PNG"));
    assert_eq!(renamed.mime.as_deref(), Some("image/png"));
    assert_eq!(renamed.url(), format!("/files/{}/photo.jpg", file.attachment_id));

    let stored = fx.repo.find_by_id(&file.attachment_id).await.unwrap().unwrap();
    assert_eq!(stored.name, "photo.jpg");

    assert!(matches!(
        fx.service
            .retrieve(&file.attachment_id, Some("photo.png"), Some("alice"))
            .await,
        Err(FileError::NotFound)
    ));
}

#[tokio::test]
async fn test_rename_gates_and_validation() {
    let fx = fixture();
    let file = fx
        .service
        .upload("alice", "a.txt", Bytes::from_static(b"a"))
        .await
        .unwrap();
    let patch = |name: &str| FilePatch {
        name: Some(name.to_string()),
    };

    assert!(matches!(
        fx.service.rename(&file.attachment_id, "a.txt", "bob", patch("b")).await,
        Err(FileError::Forbidden)
    ));
    assert!(matches!(
        fx.service.rename(&file.attachment_id, "zzz", "alice", patch("b")).await,
        Err(FileError::NotFound)
    ));
    assert!(matches!(
        fx.service
            .rename(&file.attachment_id, "a.txt", "alice", patch(&"x".repeat(64)))
            .await,
        Err(FileError::InvalidName { .. })
    ));

    let unchanged = fx
        .service
        .rename(&file.attachment_id, "a.txt", "alice", FilePatch::default())
        .await
        .unwrap();
    assert_eq!(unchanged, file);
}

#[tokio::test]
async fn test_delete_removes_blob_then_row() {
    let fx = fixture();
    let file = fx
        .service
        .upload("alice", "a.txt", Bytes::from_static(b"a"))
        .await
        .unwrap();

    assert!(matches!(
        fx.service.delete(&file.attachment_id, "a.txt", "bob").await,
        Err(FileError::Forbidden)
    ));
    assert_eq!(fx.storage.len(), 1);

    fx.service
        .delete(&file.attachment_id, "a.txt", "alice")
        .await
        .unwrap();
    assert!(fx.storage.is_empty());
    assert_eq!(fx.repo.find_by_id(&file.attachment_id).await.unwrap(), None);

    // repeated and unknown deletes look the same
    let again = fx.service.delete(&file.attachment_id, "a.txt", "alice").await;
    let unknown = fx.service.delete("12345", "a.txt", "alice").await;
    assert!(matches!(again, Err(FileError::NotFound)));
    assert!(matches!(unknown, Err(FileError::NotFound)));
}

#[tokio::test]
async fn test_delete_tolerates_missing_blob() {
    let fx = fixture();
    let file = fx
        .service
        .upload("alice", "a.txt", Bytes::from_static(b"a"))
        .await
        .unwrap();
    fx.storage
        .delete_blob(&file.channel_id, &file.message_id)
        .await
        .unwrap();

    fx.service
        .delete(&file.attachment_id, "a.txt", "alice")
        .await
        .unwrap();
    assert_eq!(fx.repo.find_by_id(&file.attachment_id).await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_keeps_row_when_storage_unavailable() {
    let fx = fixture();
    let file = fx
        .service
        .upload("alice", "a.txt", Bytes::from_static(b"a"))
        .await
        .unwrap();
    fx.storage.set_state(AdapterState::Closed);

    let err = fx
        .service
        .delete(&file.attachment_id, "a.txt", "alice")
        .await
        .unwrap_err();

    assert!(matches!(err, FileError::Storage(StorageError::NotReady)));
    assert!(fx.repo.find_by_id(&file.attachment_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_fetch_content() {
    let fx = fixture();
    let file = fx
        .service
        .upload("alice", "photo.png", Bytes::from_static(PNG))
        .await
        .unwrap();

    let (found, content) = fx
        .service
        .fetch_content(&file.attachment_id, "photo.png")
        .await
        .unwrap();
    assert_eq!(found.attachment_id, file.attachment_id);
    assert_eq!(&content.bytes[..], PNG);
    assert_eq!(content.content_type.as_deref(), Some("image/png"));

    assert!(matches!(
        fx.service.fetch_content(&file.attachment_id, "other.png").await,
        Err(FileError::NotFound)
    ));
}

#[tokio::test]
async fn test_absolute_url() {
    let fx = fixture();
    let file = fx
        .service
        .upload("alice", "a b.txt", Bytes::from_static(b"a"))
        .await
        .unwrap();

    assert!(matches!(
        fx.service.absolute_url(&file),
        Err(FileError::Configuration(_))
    ));

    let service = fx
        .service
        .clone()
        .with_public_base(Some("https://debris.example".to_string()));
    assert_eq!(
        service.absolute_url(&file).unwrap(),
        format!("https://debris.example/files/{}/a%20b.txt", file.attachment_id)
    );
}
