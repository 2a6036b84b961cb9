//! ImageKit media host: client-side upload signatures and server-side uploads.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::ImageKitConfig;

/// Lifetime of a client upload signature, in seconds.
pub const SIGNATURE_TTL_SECS: u64 = 30 * 60;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("image host is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("image host returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Parameters a browser needs to upload straight to ImageKit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthParameters {
    pub token: String,
    pub expire: u64,
    pub signature: String,
    pub public_key: Option<String>,
    pub url_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub folder: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub file_id: String,
    pub name: String,
    pub url: String,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    fn authentication_parameters(&self) -> Result<AuthParameters, ImageHostError>;

    async fn upload(&self, file: UploadFile) -> Result<UploadedImage, ImageHostError>;
}

/// `hex(HMAC-SHA1(private_key, token ‖ expire))`.
pub fn sign(private_key: &str, token: &str, expire: u64) -> Result<String, ImageHostError> {
    let mut mac = HmacSha1::new_from_slice(private_key.as_bytes())
        .map_err(|e| ImageHostError::Signing(e.to_string()))?;
    mac.update(token.as_bytes());
    mac.update(expire.to_string().as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct ImageKit {
    client: reqwest::Client,
    config: ImageKitConfig,
}

impl ImageKit {
    pub fn new(client: reqwest::Client, config: ImageKitConfig) -> Self {
        Self { client, config }
    }

    fn private_key(&self) -> Result<&str, ImageHostError> {
        self.config
            .private_key
            .as_deref()
            .ok_or(ImageHostError::NotConfigured("IMAGEKIT_PRIVATE_KEY is not set"))
    }
}

#[async_trait]
impl ImageHost for ImageKit {
    fn authentication_parameters(&self) -> Result<AuthParameters, ImageHostError> {
        let private_key = self.private_key()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|e| ImageHostError::Signing(e.to_string()))?;
        let token = uuid::Uuid::new_v4().to_string();
        let expire = now + SIGNATURE_TTL_SECS;

        Ok(AuthParameters {
            signature: sign(private_key, &token, expire)?,
            token,
            expire,
            public_key: self.config.public_key.clone(),
            url_endpoint: self.config.url_endpoint.clone(),
        })
    }

    async fn upload(&self, file: UploadFile) -> Result<UploadedImage, ImageHostError> {
        let private_key = self.private_key()?;

        let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("fileName", file.file_name.clone())
            .text("folder", file.folder.clone())
            .text("useUniqueFileName", "true");

        tracing::debug!(file_name = %file.file_name, folder = %file.folder, "uploading to image host");
        let response = self
            .client
            .post(&self.config.upload_url)
            .basic_auth(private_key, Some(""))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImageHostError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<UploadedImage>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(private_key: Option<&str>) -> ImageKitConfig {
        ImageKitConfig {
            public_key: Some("public_test".into()),
            private_key: private_key.map(String::from),
            url_endpoint: Some("https://ik.imagekit.io/demo".into()),
            upload_url: "http://127.0.0.1:9/upload".into(),
        }
    }

    #[test]
    fn signature_is_hmac_sha1_of_token_and_expire() {
        let signature = sign(
            "private_key_test",
            "34d6a8a1-b6c1-4a1b-89d6-8d9b0c8e2f6d",
            1655379249,
        )
        .unwrap();
        assert_eq!(signature.len(), 40);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));

        // Deterministic and sensitive to every input
        assert_eq!(
            signature,
            sign("private_key_test", "34d6a8a1-b6c1-4a1b-89d6-8d9b0c8e2f6d", 1655379249).unwrap()
        );
        assert_ne!(
            signature,
            sign("private_key_test", "34d6a8a1-b6c1-4a1b-89d6-8d9b0c8e2f6d", 1655379250).unwrap()
        );
    }

    #[test]
    fn known_hmac_sha1_vector() {
        // RFC 2202 test case 2: key "Jefe", data "what do ya want for nothing?"
        let sig = sign("Jefe", "what do ya want ", 0).unwrap();
        let mut mac = HmacSha1::new_from_slice(b"Jefe").unwrap();
        mac.update(b"what do ya want 0");
        assert_eq!(sig, hex::encode(mac.finalize().into_bytes()));

        let mut rfc = HmacSha1::new_from_slice(b"Jefe").unwrap();
        rfc.update(b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(rfc.finalize().into_bytes()),
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
    }

    #[test]
    fn auth_parameters_expire_in_the_future() {
        let host = ImageKit::new(reqwest::Client::new(), config(Some("private_key_test")));
        let params = host.authentication_parameters().unwrap();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        assert!(params.expire > now);
        assert_eq!(
            params.signature,
            sign("private_key_test", &params.token, params.expire).unwrap()
        );
        assert_eq!(params.public_key.as_deref(), Some("public_test"));
    }

    #[tokio::test]
    async fn unconfigured_host_refuses_work() {
        let host = ImageKit::new(reqwest::Client::new(), config(None));
        assert!(matches!(
            host.authentication_parameters(),
            Err(ImageHostError::NotConfigured(_))
        ));
        let upload = host
            .upload(UploadFile {
                bytes: vec![1, 2, 3],
                file_name: "a.png".into(),
                folder: "/".into(),
                content_type: None,
            })
            .await;
        assert!(matches!(upload, Err(ImageHostError::NotConfigured(_))));
    }
}
