use crate::application::abort::{abort_pair, AbortSignal, UploadAbortHandle};
use crate::application::advice_service::AdviceService;
use crate::application::error::ApplicationError;
use crate::application::scan_service::{ScanForm, ScanOutcome, ScanService, UploadOptions};
use crate::domain::analysis::AnalysisReport;
use crate::domain::capture::{CaptureResult, CaptureSource};
use crate::domain::crop::CropRegion;
use crate::domain::error::DomainError;
use crate::domain::history::{today, DailyHistory};
use crate::domain::profile::UserProfile;
use super::data_url::decode_data_url;
use super::file_capture::PickedFile;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Json, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use log::{debug, info};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// カメラ画像は既定の 2MB を超えることがある
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub struct AppState {
    pub scan_service: Arc<ScanService>,
    /// `None` when no advice API key is configured.
    pub advice_service: Option<Arc<AdviceService>>,
    in_flight: Mutex<HashMap<String, UploadAbortHandle>>,
}

impl AppState {
    pub fn new(scan_service: Arc<ScanService>, advice_service: Option<Arc<AdviceService>>) -> Self {
        Self {
            scan_service,
            advice_service,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn scans(&self) -> MutexGuard<'_, HashMap<String, UploadAbortHandle>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes the scan abortable under `scan_id` until the guard is dropped.
    fn register_scan(&self, scan_id: &str) -> Result<(InFlightScan<'_>, AbortSignal), DomainError> {
        let mut scans = self.scans();
        if scans.contains_key(scan_id) {
            return Err(DomainError::InvalidInput(format!("scan {} is already running", scan_id)));
        }
        let (handle, signal) = abort_pair();
        scans.insert(scan_id.to_string(), handle);
        Ok((
            InFlightScan {
                state: self,
                scan_id: scan_id.to_string(),
            },
            signal,
        ))
    }

    fn abort_scan(&self, scan_id: &str) -> bool {
        match self.scans().get(scan_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

struct InFlightScan<'a> {
    state: &'a AppState,
    scan_id: String,
}

impl Drop for InFlightScan<'_> {
    fn drop(&mut self) {
        self.state.scans().remove(&self.scan_id);
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/scan", post(scan_handler))
        .route("/scan/:scan_id/abort", post(abort_scan_handler))
        .route("/crop/preview", post(crop_preview_handler))
        .route("/crop/rasterize", post(crop_rasterize_handler))
        .route("/capture/data-url", post(data_url_handler))
        .route("/history/:user_id", get(history_handler))
        .route("/history/delete", post(delete_history_handler))
        .route("/food-log/:user_id", get(food_log_handler))
        .route("/profile/:user_id/exists", get(profile_exists_handler))
        .route("/profile", post(save_profile_handler))
        .route("/advice", post(advice_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Text fields of a multipart form plus the optional `image` file part.
#[derive(Default)]
struct UploadedForm {
    image: Option<PickedFile>,
    fields: HashMap<String, String>,
}

impl UploadedForm {
    fn take_image(&mut self) -> Result<CaptureResult, ApplicationError> {
        let mut file = self
            .image
            .take()
            .ok_or_else(|| DomainError::InvalidInput("No image provided".to_string()))?;
        debug!("Captured {} ({})", file.name(), file.mime_type());
        Ok(file.capture()?)
    }
}

fn multipart_error(e: impl std::fmt::Display) -> ApplicationError {
    DomainError::InvalidInput(format!("Multipart error: {}", e)).into()
}

async fn read_form(mut multipart: Multipart) -> Result<UploadedForm, ApplicationError> {
    let mut form = UploadedForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            form.image = Some(PickedFile::from_upload(file_name, bytes.to_vec(), content_type.as_deref())?);
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

fn non_empty<'a>(fields: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn number_field(fields: &HashMap<String, String>, key: &str) -> Result<Option<f64>, DomainError> {
    match non_empty(fields, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| DomainError::InvalidInput(format!("{} must be a number, got '{}'", key, raw))),
    }
}

/// `cropX/cropY/cropWidth/cropHeight`: all four or none.
pub fn crop_from_fields(fields: &HashMap<String, String>) -> Result<Option<CropRegion>, DomainError> {
    let values = [
        number_field(fields, "cropX")?,
        number_field(fields, "cropY")?,
        number_field(fields, "cropWidth")?,
        number_field(fields, "cropHeight")?,
    ];
    match values {
        [Some(x), Some(y), Some(width), Some(height)] => Ok(Some(CropRegion::new(x, y, width, height))),
        [None, None, None, None] => Ok(None),
        _ => Err(DomainError::InvalidInput(
            "cropX, cropY, cropWidth and cropHeight must be sent together".to_string(),
        )),
    }
}

pub fn scan_form_from_fields(fields: &HashMap<String, String>) -> Result<ScanForm, DomainError> {
    let (food_name, user_id) = match (non_empty(fields, "foodName"), non_empty(fields, "userId")) {
        (Some(food_name), Some(user_id)) => (food_name, user_id),
        _ => return Err(DomainError::InvalidInput("Please fill out all fields".to_string())),
    };
    let weight_grams = number_field(fields, "weight")?
        .ok_or_else(|| DomainError::InvalidInput("Please fill out all fields".to_string()))?;
    Ok(ScanForm {
        food_name: food_name.to_string(),
        weight_grams,
        user_id: user_id.to_string(),
    })
}

pub fn timeout_from_fields(fields: &HashMap<String, String>) -> Result<Option<Duration>, DomainError> {
    match number_field(fields, "timeoutSecs")? {
        None => Ok(None),
        Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|e| DomainError::InvalidInput(format!("timeoutSecs {} is out of range: {}", secs, e))),
        Some(secs) => Err(DomainError::InvalidInput(format!("timeoutSecs must be positive, got {}", secs))),
    }
}

fn png_response(data: Vec<u8>) -> Result<Response, ApplicationError> {
    Response::builder()
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(data))
        .map(IntoResponse::into_response)
        .map_err(|e| ApplicationError::ScanFailed(format!("Failed to build image response: {}", e)))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn scan_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ScanOutcome>, ApplicationError> {
    let mut form = read_form(multipart).await?;
    let scan_form = scan_form_from_fields(&form.fields)?;
    let region = crop_from_fields(&form.fields)?;
    let timeout = timeout_from_fields(&form.fields)?;
    let capture = form.take_image()?;
    let crop = state.scan_service.confirm_crop(capture, region).await?;

    let outcome = match non_empty(&form.fields, "scanId") {
        Some(scan_id) => {
            let (_guard, abort) = state.register_scan(scan_id)?;
            state
                .scan_service
                .submit(crop, scan_form, UploadOptions { timeout, abort })
                .await?
        }
        None => {
            let options = UploadOptions { timeout, ..UploadOptions::default() };
            state.scan_service.submit(crop, scan_form, options).await?
        }
    };
    info!(
        "Scan of '{}' done: rating {}, {} kcal",
        outcome.entry.name, outcome.entry.final_rating, outcome.entry.calories
    );
    Ok(Json(outcome))
}

pub async fn abort_scan_handler(
    State(state): State<Arc<AppState>>,
    Path(scan_id): Path<String>,
) -> Result<Json<Value>, ApplicationError> {
    if state.abort_scan(&scan_id) {
        info!("Abort requested for scan {}", scan_id);
        Ok(Json(json!({ "aborted": true })))
    } else {
        Err(ApplicationError::NotFound(format!("No scan in flight with id {}", scan_id)))
    }
}

pub async fn crop_preview_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApplicationError> {
    let mut form = read_form(multipart).await?;
    let region = crop_from_fields(&form.fields)?;
    let crop = state.scan_service.confirm_crop(form.take_image()?, region).await?;
    png_response(state.scan_service.render_overlay(crop).await?)
}

pub async fn crop_rasterize_handler(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApplicationError> {
    let mut form = read_form(multipart).await?;
    let region = crop_from_fields(&form.fields)?;
    let crop = state.scan_service.confirm_crop(form.take_image()?, region).await?;
    png_response(state.scan_service.rasterize(crop).await?.into_data())
}

#[derive(Deserialize, Debug)]
pub struct DataUrlParams {
    #[serde(rename = "dataUrl")]
    pub data_url: String,
    pub crop: Option<CropRegion>,
}

pub async fn data_url_handler(
    State(state): State<Arc<AppState>>,
    Json(params): Json<DataUrlParams>,
) -> Result<Response, ApplicationError> {
    let capture = decode_data_url(&params.data_url)?;
    let crop = state.scan_service.confirm_crop(capture, params.crop).await?;
    png_response(state.scan_service.rasterize(crop).await?.into_data())
}

pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<DailyHistory>>, ApplicationError> {
    Ok(Json(state.scan_service.history(&user_id).await?))
}

#[derive(Deserialize, Debug)]
pub struct DeleteEntryParams {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub date: String,
    pub name: String,
}

pub async fn delete_history_handler(
    State(state): State<Arc<AppState>>,
    Json(params): Json<DeleteEntryParams>,
) -> Result<Json<Value>, ApplicationError> {
    state
        .scan_service
        .delete_history_entry(&params.user_id, &params.date, &params.name)
        .await?;
    Ok(Json(json!({ "deleted": true })))
}

/// Entries recorded by this process for one user only.
pub async fn food_log_handler(State(state): State<Arc<AppState>>, Path(user_id): Path<String>) -> Json<Value> {
    let log = state.scan_service.food_log();
    Json(json!({
        "userId": user_id,
        "entries": log.entries(&user_id),
        "daily": log.daily(&user_id),
        "todayCalories": log.total_calories_on(&user_id, &today()),
    }))
}

pub async fn profile_exists_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApplicationError> {
    let exists = state.scan_service.profile_exists(&user_id).await?;
    Ok(Json(json!({ "exists": exists })))
}

pub async fn save_profile_handler(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<UserProfile>,
) -> Result<Json<Value>, ApplicationError> {
    state.scan_service.save_profile(profile).await?;
    Ok(Json(json!({ "saved": true })))
}

#[derive(Deserialize, Debug)]
pub struct AdviceParams {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub report: AnalysisReport,
}

pub async fn advice_handler(
    State(state): State<Arc<AppState>>,
    Json(params): Json<AdviceParams>,
) -> Result<Json<Value>, ApplicationError> {
    let service = state
        .advice_service
        .as_ref()
        .ok_or_else(|| ApplicationError::ConfigurationError("GEMINI_API_KEY is not set".to_string()))?;
    let advice = service.advise(&params.user_id, &params.report).await?;
    Ok(Json(json!({ "summary": advice.summary(), "advice": advice })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::food_log::FoodLog;
    use crate::domain::backend::MockNutritionBackend;
    use crate::domain::image::SourceImage;
    use crate::domain::rasterizer_trait::ImageRasterizer;
    use crate::infrastructure::image_rasterizer::DefaultRasterizer;
    use axum::http::StatusCode;
    use futures::FutureExt;
    use image::{Rgba, RgbaImage};
    use reqwest::multipart::{Form, Part};
    use std::collections::BTreeMap;

    // 1x1 の透明な PNG
    const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn state(backend: MockNutritionBackend) -> Arc<AppState> {
        let scan_service = ScanService::new(Arc::new(DefaultRasterizer::new()), Arc::new(backend), FoodLog::new());
        Arc::new(AppState::new(Arc::new(scan_service), None))
    }

    fn label_png() -> Vec<u8> {
        let source = SourceImage::new(RgbaImage::from_pixel(80, 60, Rgba([240, 240, 240, 255])));
        DefaultRasterizer::new()
            .rasterize(&source, &CropRegion::new(0.0, 0.0, 80.0, 60.0))
            .unwrap()
            .into_data()
    }

    fn scan_fields() -> Form {
        Form::new()
            .text("foodName", "Granola")
            .text("weight", "150")
            .text("userId", "user_1")
            .text("cropX", "10")
            .text("cropY", "5")
            .text("cropWidth", "40")
            .text("cropHeight", "30")
            .text("scanId", "scan-1")
    }

    // 実際のソケットでルーターを起動し、ベース URL を返す
    fn serve(state: Arc<AppState>) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(router(state).into_make_service());
        tokio::spawn(server);
        format!("http://{}", addr)
    }

    #[test]
    fn test_crop_fields_all_or_nothing() {
        let full = fields(&[("cropX", "10"), ("cropY", "5.5"), ("cropWidth", "40"), ("cropHeight", " 30 ")]);
        assert_eq!(crop_from_fields(&full).unwrap(), Some(CropRegion::new(10.0, 5.5, 40.0, 30.0)));
        assert_eq!(crop_from_fields(&fields(&[("foodName", "oats")])).unwrap(), None);

        let partial = fields(&[("cropX", "10"), ("cropY", "5")]);
        assert!(matches!(crop_from_fields(&partial), Err(DomainError::InvalidInput(_))));
        let garbage = fields(&[("cropX", "ten"), ("cropY", "5"), ("cropWidth", "1"), ("cropHeight", "1")]);
        assert!(matches!(crop_from_fields(&garbage), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn test_scan_form_requires_all_fields() {
        let form = scan_form_from_fields(&fields(&[("foodName", "Granola"), ("weight", "150"), ("userId", "user_1")]))
            .unwrap();
        assert_eq!(form.weight_grams, 150.0);

        let missing = scan_form_from_fields(&fields(&[("foodName", "Granola"), ("userId", "user_1")]));
        assert_eq!(
            missing,
            Err(DomainError::InvalidInput("Please fill out all fields".to_string()))
        );
        assert!(scan_form_from_fields(&fields(&[("foodName", "Granola"), ("weight", "heavy"), ("userId", "u")])).is_err());
    }

    #[test]
    fn test_timeout_field() {
        assert_eq!(timeout_from_fields(&fields(&[])).unwrap(), None);
        assert_eq!(
            timeout_from_fields(&fields(&[("timeoutSecs", "2.5")])).unwrap(),
            Some(Duration::from_millis(2500))
        );
        assert!(timeout_from_fields(&fields(&[("timeoutSecs", "0")])).is_err());
    }

    #[test]
    fn test_scan_registry_rejects_duplicates_and_cleans_up() {
        let state = state(MockNutritionBackend::new());
        {
            let (_guard, signal) = state.register_scan("scan-1").unwrap();
            assert!(state.register_scan("scan-1").is_err());
            assert!(state.abort_scan("scan-1"));
            assert!(signal.is_aborted());
        }
        assert!(!state.abort_scan("scan-1"));
        assert!(state.register_scan("scan-1").is_ok());
    }

    #[tokio::test]
    async fn test_abort_unknown_scan_is_not_found() {
        let err = abort_scan_handler(State(state(MockNutritionBackend::new())), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_data_url_is_rasterized_to_png() {
        let params = DataUrlParams {
            data_url: format!("data:image/png;base64,{}", TINY_PNG),
            crop: None,
        };
        let response = data_url_handler(State(state(MockNutritionBackend::new())), Json(params))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn test_bad_data_url_is_bad_request() {
        let params = DataUrlParams {
            data_url: "https://example.com/label.png".to_string(),
            crop: None,
        };
        let err = data_url_handler(State(state(MockNutritionBackend::new())), Json(params))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_advice_without_key_is_unavailable() {
        let params = AdviceParams {
            user_id: "user_1".to_string(),
            report: AnalysisReport { rating: 5.0, nutrients: BTreeMap::new() },
        };
        let err = advice_handler(State(state(MockNutritionBackend::new())), Json(params))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_scan_multipart_round_trip() {
        let mut backend = MockNutritionBackend::new();
        backend
            .expect_upload_label()
            .withf(|upload| {
                upload.food_name == "Granola"
                    && upload.user_id == "user_1"
                    && (upload.image.width(), upload.image.height()) == (40, 30)
            })
            .times(1)
            .returning(|_| {
                let mut nutrients = BTreeMap::new();
                nutrients.insert("ENERGY".to_string(), 4.0);
                async move { Ok(AnalysisReport { rating: 8.0, nutrients }) }.boxed()
            });
        backend
            .expect_save_history()
            .withf(|entry| entry.user_id == "user_1" && entry.name == "Granola")
            .times(1)
            .returning(|_| async { Ok(()) }.boxed());
        let base = serve(state(backend));
        let client = reqwest::Client::new();

        let image = Part::bytes(label_png()).file_name("label.png").mime_str("image/png").unwrap();
        let form = scan_fields().part("image", image);
        let response = client.post(format!("{}/scan", base)).multipart(form).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["entry"]["name"], "Granola");
        assert_eq!(body["entry"]["calories"], 80.0);
        assert_eq!(body["entry"]["date"], today());
        assert_eq!(body["image_width"], 40);
        assert_eq!(body["image_height"], 30);
        assert_eq!(body["history_saved"], true);

        let log: Value = client
            .get(format!("{}/food-log/user_1", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(log["entries"].as_array().unwrap().len(), 1);
        assert_eq!(log["todayCalories"], 80.0);

        let other: Value = client
            .get(format!("{}/food-log/user_2", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(other["entries"], json!([]));
        assert_eq!(other["todayCalories"], 0.0);
    }

    #[tokio::test]
    async fn test_scan_without_image_is_bad_request() {
        let mut backend = MockNutritionBackend::new();
        backend.expect_upload_label().times(0);
        let base = serve(state(backend));

        let response = reqwest::Client::new()
            .post(format!("{}/scan", base))
            .multipart(scan_fields())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "error": "Invalid input: No image provided" }));
    }

    #[tokio::test]
    async fn test_profile_exists_is_proxied() {
        let mut backend = MockNutritionBackend::new();
        backend
            .expect_profile_exists()
            .withf(|user_id| user_id == "user_1")
            .returning(|_| async { Ok(true) }.boxed());
        let Json(body) = profile_exists_handler(State(state(backend)), Path("user_1".to_string()))
            .await
            .unwrap();
        assert_eq!(body, json!({ "exists": true }));
    }
}
