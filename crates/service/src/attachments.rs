use std::path::Path;

use chrono::{Datelike, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder};
use tracing::info;
use uuid::Uuid;

use models::attachment::{self, validate_file_size};

use crate::errors::ServiceError;
use crate::requests;

/// Strip any path components and replace characters that do not belong in a
/// stored filename.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Persist an uploaded file for a caller-owned request.
///
/// The ownership check runs first so a foreign request is indistinguishable
/// from a missing one, then the size validator, then the disk write and the
/// row insert.
pub async fn store_attachment(
    db: &DatabaseConnection,
    media_root: &Path,
    user_id: Uuid,
    request_id: Uuid,
    original_name: &str,
    data: &[u8],
) -> Result<attachment::Model, ServiceError> {
    let request = requests::get_request(db, user_id, request_id).await?;
    validate_file_size(data.len() as u64)?;

    let now = Utc::now();
    let dir_rel = format!("attachments/{:04}/{:02}/{:02}", now.year(), now.month(), now.day());
    let dir_abs = media_root.join(&dir_rel);
    tokio::fs::create_dir_all(&dir_abs)
        .await
        .map_err(|e| ServiceError::Storage(format!("cannot create {}: {e}", dir_abs.display())))?;

    let mut name = sanitize_filename(original_name);
    if tokio::fs::try_exists(dir_abs.join(&name)).await.unwrap_or(false) {
        // Collision: keep the original name visible behind a short unique tag
        let tag = Uuid::new_v4().simple().to_string();
        name = format!("{}_{name}", &tag[..8]);
    }
    tokio::fs::write(dir_abs.join(&name), data)
        .await
        .map_err(|e| ServiceError::Storage(format!("cannot write {name}: {e}")))?;

    let rel = format!("{dir_rel}/{name}");
    let rec = attachment::create(db, request.id, &rel).await?;
    info!(
        attachment_id = %rec.id,
        request_id = %request.id,
        size = data.len(),
        "attachment_stored"
    );
    Ok(rec)
}

/// Attachments of a single request, oldest upload first.
pub async fn list_for_request(
    db: &DatabaseConnection,
    request_id: Uuid,
) -> Result<Vec<attachment::Model>, ServiceError> {
    attachment::Entity::find()
        .filter(attachment::Column::ServiceRequestId.eq(request_id))
        .order_by(attachment::Column::UploadedAt, Order::Asc)
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

/// Attachments for a whole page of requests in one query.
pub async fn list_for_requests(
    db: &DatabaseConnection,
    request_ids: &[Uuid],
) -> Result<Vec<attachment::Model>, ServiceError> {
    if request_ids.is_empty() {
        return Ok(Vec::new());
    }
    attachment::Entity::find()
        .filter(attachment::Column::ServiceRequestId.is_in(request_ids.iter().copied()))
        .order_by(attachment::Column::UploadedAt, Order::Asc)
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::get_db;
    use models::attachment::MAX_FILE_SIZE;

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\temp\\a b.txt"), "a_b.txt");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[tokio::test]
    async fn store_validates_size_and_ownership() -> Result<(), anyhow::Error> {
        if std::env::var("SKIP_DB_TESTS").is_ok() {
            return Ok(());
        }
        let db = get_db().await?;
        let media = tempfile::tempdir()?;

        let owner = models::user::create(
            &db,
            &format!("att_{}@example.com", Uuid::new_v4()),
            &format!("att_{}", Uuid::new_v4()),
            None,
        )
        .await?;
        let stranger = models::user::create(
            &db,
            &format!("att2_{}@example.com", Uuid::new_v4()),
            &format!("att2_{}", Uuid::new_v4()),
            None,
        )
        .await?;
        let request =
            crate::requests::create_request(&db, owner.id, "Fix printer", "jammed").await?;

        // Within the limit: row persisted, bytes on disk, filename derived
        let stored = store_attachment(
            &db,
            media.path(),
            owner.id,
            request.id,
            "scan one.png",
            b"binary-bytes",
        )
        .await?;
        assert_eq!(stored.filename(), "scan_one.png");
        let on_disk = tokio::fs::read(media.path().join(&stored.file)).await?;
        assert_eq!(on_disk, b"binary-bytes");

        // Same name again gets a collision tag but keeps the basename visible
        let again = store_attachment(
            &db,
            media.path(),
            owner.id,
            request.id,
            "scan one.png",
            b"more-bytes",
        )
        .await?;
        assert!(again.filename().ends_with("scan_one.png"));
        assert_ne!(again.file, stored.file);

        // Over the limit: field-level error, nothing persisted
        let oversize = vec![0u8; (MAX_FILE_SIZE + 1) as usize];
        match store_attachment(&db, media.path(), owner.id, request.id, "big.bin", &oversize).await
        {
            Err(ServiceError::Validation { field, .. }) => assert_eq!(field, "file"),
            other => panic!("expected validation error, got {other:?}"),
        }

        // Foreign request looks missing
        assert!(matches!(
            store_attachment(&db, media.path(), stranger.id, request.id, "x.txt", b"x").await,
            Err(ServiceError::NotFound(_))
        ));

        let listed = list_for_request(&db, request.id).await?;
        assert_eq!(listed.len(), 2);

        models::user::hard_delete(&db, owner.id).await?;
        models::user::hard_delete(&db, stranger.id).await?;
        Ok(())
    }
}
