use std::sync::Arc;
use std::time::Duration;
use super::abort::AbortSignal;
use super::blocking::{run_blocking, within};
use super::crop_stage::{ConfirmedCrop, CropStage};
use super::error::ApplicationError;
use super::food_log::FoodLog;
use log::{info, warn};
use serde::Serialize;

use crate::domain::analysis::{AnalysisReport, ExerciseTimes};
use crate::domain::backend::{LabelUpload, NutritionBackend};
use crate::domain::capture::CaptureResult;
use crate::domain::crop::CropRegion;
use crate::domain::error::{BackendError, DomainError};
use crate::domain::history::{entry_id, group_by_date, today, DailyHistory, HistoryEntry, NewHistoryEntry};
use crate::domain::image::RasterizedImage;
use crate::domain::profile::UserProfile;
use crate::domain::rasterizer_trait::ImageRasterizer;

/// User-entered fields sent along with the label image.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanForm {
    pub food_name: String,
    pub weight_grams: f64,
    pub user_id: String,
}

impl ScanForm {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.food_name.trim().is_empty() || self.user_id.trim().is_empty() {
            return Err(DomainError::InvalidInput("Please fill out all fields".to_string()));
        }
        if !self.weight_grams.is_finite() || self.weight_grams <= 0.0 {
            return Err(DomainError::InvalidInput("Weight must be a positive number of grams".to_string()));
        }
        Ok(())
    }
}

/// How long to wait and how to give up on one upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub timeout: Option<Duration>,
    pub abort: AbortSignal,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            abort: AbortSignal::never(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub report: AnalysisReport,
    pub entry: HistoryEntry,
    pub rating_percent: f64,
    pub exercise: ExerciseTimes,
    /// False when the analysis succeeded but the history write did not.
    pub history_saved: bool,
    pub image_width: u32,
    pub image_height: u32,
}

pub struct ScanService {
    rasterizer: Arc<dyn ImageRasterizer + Send + Sync>,
    backend: Arc<dyn NutritionBackend>,
    food_log: FoodLog,
}

impl ScanService {
    pub fn new(
        rasterizer: Arc<dyn ImageRasterizer + Send + Sync>,
        backend: Arc<dyn NutritionBackend>,
        food_log: FoodLog,
    ) -> Self {
        Self { rasterizer, backend, food_log }
    }

    pub fn food_log(&self) -> &FoodLog {
        &self.food_log
    }

    // 画像のデコード・切り抜き・エンコードはブロッキングプールで行う

    /// Decodes the capture and applies `region`, or keeps the whole image.
    pub async fn confirm_crop(
        &self,
        capture: CaptureResult,
        region: Option<CropRegion>,
    ) -> Result<ConfirmedCrop, ApplicationError> {
        let rasterizer = self.rasterizer.clone();
        run_blocking(move || {
            let mut stage = CropStage::load(capture, rasterizer.as_ref())?;
            if let Some(region) = region {
                stage.set_region(region);
            }
            Ok::<_, ApplicationError>(stage.confirm())
        })
        .await
    }

    pub async fn rasterize(&self, crop: ConfirmedCrop) -> Result<RasterizedImage, ApplicationError> {
        let rasterizer = self.rasterizer.clone();
        run_blocking(move || rasterizer.rasterize(&crop.source, &crop.region)).await
    }

    pub async fn render_overlay(&self, crop: ConfirmedCrop) -> Result<Vec<u8>, ApplicationError> {
        let rasterizer = self.rasterizer.clone();
        run_blocking(move || rasterizer.render_overlay(&crop.source, &crop.region)).await
    }

    /// Rasterizes the crop, uploads it and records the analysis.
    ///
    /// Nothing is written to the food log or the history when the upload
    /// fails, times out or is aborted.
    pub async fn submit(
        &self,
        crop: ConfirmedCrop,
        form: ScanForm,
        options: UploadOptions,
    ) -> Result<ScanOutcome, ApplicationError> {
        form.validate()?;
        let image = self.rasterize(crop).await?;
        let (image_width, image_height) = (image.width(), image.height());
        info!(
            "Uploading {}x{} label for '{}' ({} g)",
            image_width, image_height, form.food_name, form.weight_grams
        );

        let mut abort = options.abort;
        if abort.is_aborted() {
            return Err(BackendError::Aborted.into());
        }

        let upload = LabelUpload {
            image,
            food_name: form.food_name.trim().to_string(),
            weight_grams: form.weight_grams,
            user_id: form.user_id.clone(),
        };
        // select! で負けた側の future は破棄され、送信中の接続も閉じられる
        let report = tokio::select! {
            result = within(options.timeout, self.backend.upload_label(upload)) => result?,
            _ = abort.aborted() => {
                warn!("Upload for '{}' aborted by the caller", form.food_name);
                return Err(BackendError::Aborted.into());
            }
        };

        let entry = HistoryEntry {
            date: today(),
            name: form.food_name.trim().to_string(),
            final_rating: report.final_rating(),
            calories: report.calories(),
        };
        self.food_log.record(&form.user_id, entry.clone());

        let new_entry = NewHistoryEntry {
            user_id: form.user_id,
            name: entry.name.clone(),
            final_rating: entry.final_rating,
            calories: entry.calories,
        };
        let history_saved = match self.backend.save_history(&new_entry).await {
            Ok(()) => true,
            Err(e) => {
                // 解析結果は返す。履歴だけ保存できなかったことを伝える
                warn!("Failed to save history for '{}': {}", entry.name, e);
                false
            }
        };

        Ok(ScanOutcome {
            rating_percent: report.rating_percent(),
            exercise: report.exercise_times(),
            report,
            entry,
            history_saved,
            image_width,
            image_height,
        })
    }

    pub async fn history(&self, user_id: &str) -> Result<Vec<DailyHistory>, ApplicationError> {
        let entries = self.backend.fetch_history(user_id).await?;
        Ok(group_by_date(&entries))
    }

    pub async fn delete_history_entry(&self, user_id: &str, date: &str, name: &str) -> Result<(), ApplicationError> {
        if user_id.trim().is_empty() || date.trim().is_empty() || name.trim().is_empty() {
            return Err(DomainError::InvalidInput("userId, date and name are required".to_string()).into());
        }
        Ok(self.backend.delete_history_entry(user_id, &entry_id(date, name)).await?)
    }

    pub async fn profile_exists(&self, user_id: &str) -> Result<bool, ApplicationError> {
        Ok(self.backend.profile_exists(user_id).await?)
    }

    pub async fn save_profile(&self, profile: UserProfile) -> Result<(), ApplicationError> {
        profile.validate()?;
        Ok(self.backend.save_profile(&profile).await?)
    }
}
