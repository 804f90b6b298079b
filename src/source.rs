//! Schema acquisition.
//!
//! Loads a perspective schema from a local JSON file or from the CloudHealth
//! API. This sits outside the conversion core: the core only ever sees the
//! finished `serde_json::Value`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::{PerspectiveError, PerspectiveResult};

/// Where a schema document comes from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// A JSON file on disk
    File(PathBuf),
    /// `GET /perspective_schemas/{id}` on the CloudHealth API
    Api {
        perspective_id: String,
        api_key: String,
    },
}

impl SchemaSource {
    /// Fetch and deserialize the schema document.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let source = SchemaSource::File("perspective.json".into());
    /// let doc = source.fetch(&config.api).await?;
    /// ```
    pub async fn fetch(&self, config: &ApiConfig) -> PerspectiveResult<Value> {
        match self {
            SchemaSource::File(path) => read_file(path).await,
            SchemaSource::Api {
                perspective_id,
                api_key,
            } => fetch_api(config, perspective_id, api_key).await,
        }
    }
}

async fn read_file(path: &Path) -> PerspectiveResult<Value> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            PerspectiveError::NotFound(format!("file '{}'", path.display()))
        }
        std::io::ErrorKind::PermissionDenied => {
            PerspectiveError::AccessDenied(format!("file '{}'", path.display()))
        }
        _ => PerspectiveError::Io(e),
    })?;
    Ok(serde_json::from_str(&content)?)
}

async fn fetch_api(
    config: &ApiConfig,
    perspective_id: &str,
    api_key: &str,
) -> PerspectiveResult<Value> {
    let url = schema_url(&config.base_url, perspective_id);
    tracing::debug!("Fetching perspective schema from {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| PerspectiveError::Transport(e.to_string()))?;

    let response = client
        .get(&url)
        .query(&[("api_key", api_key)])
        .send()
        .await
        .map_err(|e| transport_error(e, config.timeout_secs))?;

    if let Some(err) = status_error(response.status(), perspective_id) {
        return Err(err);
    }

    let body = response
        .text()
        .await
        .map_err(|e| transport_error(e, config.timeout_secs))?;
    Ok(serde_json::from_str(&body)?)
}

fn schema_url(base_url: &str, perspective_id: &str) -> String {
    format!(
        "{}/perspective_schemas/{}",
        base_url.trim_end_matches('/'),
        perspective_id
    )
}

/// Map a non-success status to the acquisition error taxonomy.
fn status_error(status: StatusCode, perspective_id: &str) -> Option<PerspectiveError> {
    match status {
        s if s.is_success() => None,
        StatusCode::UNAUTHORIZED => Some(PerspectiveError::InvalidCredential),
        StatusCode::FORBIDDEN => Some(PerspectiveError::AccessDenied(format!(
            "you may not have access to perspective '{}'",
            perspective_id
        ))),
        StatusCode::NOT_FOUND => Some(PerspectiveError::NotFound(format!(
            "perspective ID '{}'",
            perspective_id
        ))),
        s => Some(PerspectiveError::Transport(format!("HTTP {}", s))),
    }
}

fn transport_error(err: reqwest::Error, timeout_secs: u64) -> PerspectiveError {
    if err.is_timeout() {
        PerspectiveError::Timeout(timeout_secs)
    } else {
        PerspectiveError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_url() {
        assert_eq!(
            schema_url("https://chapi.cloudhealthtech.com/v1/", "5841155522569"),
            "https://chapi.cloudhealthtech.com/v1/perspective_schemas/5841155522569"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(status_error(StatusCode::OK, "1").is_none());
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "1"),
            Some(PerspectiveError::InvalidCredential)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "1"),
            Some(PerspectiveError::AccessDenied(_))
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "1"),
            Some(PerspectiveError::NotFound(_))
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "1"),
            Some(PerspectiveError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"schema": {"name": "Owners"}}"#).unwrap();

        let doc = SchemaSource::File(path)
            .fetch(&ApiConfig::default())
            .await
            .unwrap();
        assert_eq!(doc["schema"]["name"], "Owners");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchemaSource::File(dir.path().join("absent.json"))
            .fetch(&ApiConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PerspectiveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = SchemaSource::File(path)
            .fetch(&ApiConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PerspectiveError::InvalidJson(_)));
    }
}
