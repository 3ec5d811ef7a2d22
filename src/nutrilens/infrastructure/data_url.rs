use super::error::InfrastructureError;
use crate::domain::capture::CaptureResult;
use base64::decode;

// canvas.toDataURL() で作られた "data:image/png;base64,..." を CaptureResult に変換する
pub fn decode_data_url(url: &str) -> Result<CaptureResult, InfrastructureError> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| InfrastructureError::DecodingError("Invalid data URL: missing data: scheme".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| InfrastructureError::DecodingError("Invalid data URL: missing comma".to_string()))?;

    let mut parts = header.split(';');
    let mime_type = parts.next().unwrap_or("").trim();
    if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(InfrastructureError::DecodingError(
            "Invalid data URL: only base64 payloads are supported".to_string(),
        ));
    }

    let bytes = decode(payload.trim()).map_err(InfrastructureError::Base64DecodeError)?;
    Ok(CaptureResult::new(bytes, mime_type)?)
}
