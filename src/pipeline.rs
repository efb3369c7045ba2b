use crate::asset_store::AssetStore;
use crate::compositor::{self, Compositor, InviteCard};
use crate::invite_id::invite_id;
use crate::record_store::RecordStore;
use crate::scannable;
use crate::submission::{extension_for, InviteRecord, Submission};
use anyhow::{Context, Result};
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// The rendered invitation returned to the caller
#[derive(Debug, Clone)]
pub struct RenderedInvite {
    pub invite_id: String,
    pub photo_url: String,
    pub png: Vec<u8>,
}

/// Orchestrates one submission end to end.
///
/// Steps run strictly in sequence: upload photo, read record count, derive
/// invite ID, append record, generate scannable code, composite, encode. The
/// ordering is fixed: an upload failure appends no record, while a failure
/// after the append leaves the record and uploaded photo in place (orphaned,
/// by design — there is no rollback or compensation). Any step failure
/// aborts the pipeline and is surfaced once at the HTTP boundary.
pub struct SubmissionPipeline {
    record_store: Arc<dyn RecordStore>,
    asset_store: Arc<dyn AssetStore>,
    compositor: Arc<Compositor>,
}

impl SubmissionPipeline {
    pub fn new(
        record_store: Arc<dyn RecordStore>,
        asset_store: Arc<dyn AssetStore>,
        compositor: Arc<Compositor>,
    ) -> Self {
        Self {
            record_store,
            asset_store,
            compositor,
        }
    }

    /// Process one submission, returning the rendered invitation
    #[instrument(skip(self, submission), fields(name = %submission.name))]
    pub async fn process(&self, submission: Submission) -> Result<RenderedInvite> {
        match self.run(submission).await {
            Ok(rendered) => {
                counter!("invite_submissions_total", "status" => "success").increment(1);
                Ok(rendered)
            }
            Err(e) => {
                counter!("invite_submissions_total", "status" => "error").increment(1);
                Err(e)
            }
        }
    }

    async fn run(&self, submission: Submission) -> Result<RenderedInvite> {
        let filename = format!(
            "{}_profile_{}.{}",
            submission.name,
            Uuid::new_v4(),
            extension_for(&submission.photo_content_type)
        );

        let photo_url = self
            .asset_store
            .upload(
                submission.photo.clone(),
                &submission.photo_content_type,
                &filename,
            )
            .await
            .context("Failed to upload profile photo")?;

        // Count read and append are two separate remote calls; concurrent
        // submissions racing here can be assigned the same invite ID.
        let count = self
            .record_store
            .row_count()
            .await
            .context("Failed to read record count")?;
        let invite_id = invite_id(count);

        let record = InviteRecord {
            submitted_at: Utc::now(),
            name: submission.name.clone(),
            date: submission.date.clone(),
            mobile: submission.mobile.clone(),
            invite_id: invite_id.clone(),
            year: submission.year.clone(),
            section: submission.section.clone(),
            photo_url: photo_url.clone(),
        };
        self.record_store
            .append(record)
            .await
            .context("Failed to append invite record")?;

        // Raster decode happens only now, matching the reference behavior:
        // an undecodable photo still leaves the record and asset behind.
        let photo = image::load_from_memory(&submission.photo)
            .context("Failed to decode submitted photo")?;

        let payload = scannable::code_payload(&submission.name, &invite_id);
        let code = scannable::generate_code(&payload)?;

        let card = InviteCard {
            name: submission.name.clone(),
            year: submission.year,
            section: submission.section,
            invite_id: invite_id.clone(),
        };
        let rendered = self.compositor.render(&card, &photo, &code);
        let png = compositor::encode_png(&rendered)?;

        info!(
            invite_id = %invite_id,
            png_bytes = png.len(),
            "Invitation rendered"
        );

        Ok(RenderedInvite {
            invite_id,
            photo_url,
            png,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_store::MockAssetStore;
    use crate::config::AssetConfig;
    use crate::record_store::MockRecordStore;
    use anyhow::anyhow;

    const PIXEL_B64: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn test_compositor() -> Arc<Compositor> {
        let root = env!("CARGO_MANIFEST_DIR");
        let assets = AssetConfig {
            template_path: format!("{root}/assets/background.png"),
            name_font_path: format!("{root}/assets/fonts/DejaVuSans-Bold.ttf"),
            detail_font_path: format!("{root}/assets/fonts/DejaVuSans.ttf"),
        };
        Arc::new(Compositor::from_config(&assets).unwrap())
    }

    fn test_submission() -> Submission {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        Submission {
            name: "Alice".to_string(),
            date: "2024-05-01".to_string(),
            mobile: "555-0100".to_string(),
            year: "3rd".to_string(),
            section: "B".to_string(),
            photo: STANDARD.decode(PIXEL_B64).unwrap(),
            photo_content_type: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_submission_end_to_end() {
        let mut record_store = MockRecordStore::new();
        record_store.expect_row_count().times(1).returning(|| Ok(5));
        record_store
            .expect_append()
            .times(1)
            .withf(|record| {
                record.invite_id == "INV-006"
                    && record.name == "Alice"
                    && record.photo_url == "https://assets.example/alice.png"
            })
            .returning(|_| Ok(()));

        let mut asset_store = MockAssetStore::new();
        asset_store
            .expect_upload()
            .times(1)
            .withf(|_, content_type, filename| {
                content_type == "image/png" && filename.ends_with(".png")
            })
            .returning(|_, _, _| Ok("https://assets.example/alice.png".to_string()));

        let compositor = test_compositor();
        let (tw, th) = compositor.template_dimensions();

        let pipeline = SubmissionPipeline::new(
            Arc::new(record_store),
            Arc::new(asset_store),
            compositor,
        );

        let rendered = pipeline.process(test_submission()).await.unwrap();
        assert_eq!(rendered.invite_id, "INV-006");
        assert_eq!(rendered.photo_url, "https://assets.example/alice.png");

        let decoded = image::load_from_memory(&rendered.png).unwrap();
        assert_eq!(decoded.width(), tw);
        assert_eq!(decoded.height(), th);
    }

    #[tokio::test]
    async fn test_upload_failure_appends_no_record() {
        let mut record_store = MockRecordStore::new();
        record_store.expect_row_count().never();
        record_store.expect_append().never();

        let mut asset_store = MockAssetStore::new();
        asset_store
            .expect_upload()
            .times(1)
            .returning(|_, _, _| Err(anyhow!("quota exceeded")));

        let pipeline = SubmissionPipeline::new(
            Arc::new(record_store),
            Arc::new(asset_store),
            test_compositor(),
        );

        let err = pipeline.process(test_submission()).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to upload profile photo"));
    }

    #[tokio::test]
    async fn test_append_failure_aborts_after_upload() {
        let mut record_store = MockRecordStore::new();
        record_store.expect_row_count().times(1).returning(|| Ok(0));
        record_store
            .expect_append()
            .times(1)
            .returning(|_| Err(anyhow!("connection reset")));

        let mut asset_store = MockAssetStore::new();
        asset_store
            .expect_upload()
            .times(1)
            .returning(|_, _, _| Ok("https://assets.example/orphan.png".to_string()));

        let pipeline = SubmissionPipeline::new(
            Arc::new(record_store),
            Arc::new(asset_store),
            test_compositor(),
        );

        let err = pipeline.process(test_submission()).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to append invite record"));
    }

    #[tokio::test]
    async fn test_undecodable_photo_fails_after_persistence() {
        // The record and asset are already committed when raster decode
        // fails; the caller just gets the uniform error.
        let mut record_store = MockRecordStore::new();
        record_store.expect_row_count().times(1).returning(|| Ok(0));
        record_store.expect_append().times(1).returning(|_| Ok(()));

        let mut asset_store = MockAssetStore::new();
        asset_store
            .expect_upload()
            .times(1)
            .returning(|_, _, _| Ok("https://assets.example/bogus.png".to_string()));

        let pipeline = SubmissionPipeline::new(
            Arc::new(record_store),
            Arc::new(asset_store),
            test_compositor(),
        );

        let mut submission = test_submission();
        submission.photo = b"not an image".to_vec();

        let err = pipeline.process(submission).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to decode submitted photo"));
    }
}
