use crate::domain::advice::NutritionAdvice;
use crate::domain::analysis::AnalysisReport;
use crate::domain::error::BackendError;
use crate::domain::history::{HistoryEntry, NewHistoryEntry};
use crate::domain::image::RasterizedImage;
use crate::domain::profile::UserProfile;
use futures::future::BoxFuture;

/// Multipart body of one label upload.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelUpload {
    pub image: RasterizedImage,
    pub food_name: String,
    pub weight_grams: f64,
    pub user_id: String,
}

/// Backend calls resolve on the async runtime. Dropping the future
/// cancels the request and closes its connection.
pub type BackendFuture<T> = BoxFuture<'static, Result<T, BackendError>>;

// 解析バックエンドとの境界。HTTP 実装はインフラ層
#[cfg_attr(test, mockall::automock)]
pub trait NutritionBackend: Send + Sync {
    fn upload_label(&self, upload: LabelUpload) -> BackendFuture<AnalysisReport>;

    fn save_history(&self, entry: &NewHistoryEntry) -> BackendFuture<()>;

    fn fetch_history(&self, user_id: &str) -> BackendFuture<Vec<HistoryEntry>>;

    fn delete_history_entry(&self, user_id: &str, entry_id: &str) -> BackendFuture<()>;

    fn profile_exists(&self, user_id: &str) -> BackendFuture<bool>;

    fn save_profile(&self, profile: &UserProfile) -> BackendFuture<()>;

    /// Resolves to `None` when the backend has no profile for the user.
    fn fetch_profile(&self, user_id: &str) -> BackendFuture<Option<UserProfile>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait NutritionAdvisor: Send + Sync {
    fn advise(&self, prompt: &str) -> BackendFuture<NutritionAdvice>;
}
