//! # 照片服务 REST 客户端
//!
//! 持有已刷新的访问令牌，调用相册创建与共享接口。

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::VaultError;
use crate::{lwarn, logging::{LogComponent, LogStage}};

/// 已创建并共享的相册
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedAlbum {
    pub album_id: String,
    pub shareable_url: String,
}

#[derive(Debug, Deserialize)]
struct AlbumCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShareInfo {
    shareable_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumShared {
    share_info: ShareInfo,
}

/// 绑定访问令牌的照片服务客户端
pub struct PhotosClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl std::fmt::Debug for PhotosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotosClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl PhotosClient {
    #[must_use]
    pub const fn new(http: reqwest::Client, api_base: String, access_token: String) -> Self {
        Self {
            http,
            api_base,
            access_token,
        }
    }

    /// 创建相册，返回相册 id
    pub async fn create_album(&self, title: &str) -> Result<String, VaultError> {
        let body = json!({ "album": { "title": title } });
        let created: AlbumCreated = self
            .post_json("album create", &format!("{}/albums", self.api_base), &body)
            .await?;
        Ok(created.id)
    }

    /// 将相册设为可协作共享，返回共享链接
    pub async fn share_album(&self, album_id: &str) -> Result<String, VaultError> {
        let body = json!({
            "sharedAlbumOptions": { "isCollaborative": true, "isCommentable": true }
        });
        let url = format!("{}/albums/{}:share", self.api_base, urlencoding::encode(album_id));
        let shared: AlbumShared = self.post_json("album share", &url, &body).await?;
        Ok(shared.share_info.shareable_url)
    }

    /// 创建相册并立即共享
    pub async fn create_shared_album(&self, title: &str) -> Result<SharedAlbum, VaultError> {
        let album_id = self.create_album(title).await?;
        let shareable_url = self.share_album(&album_id).await?;
        Ok(SharedAlbum {
            album_id,
            shareable_url,
        })
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        operation: &'static str,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T, VaultError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| VaultError::RequestFailed {
                operation,
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            lwarn!(
                "system",
                LogStage::ExternalApi,
                LogComponent::PhotosApi,
                "remote_api_failed",
                &format!("照片服务 {operation} 请求失败"),
                status = status.as_u16()
            );
            return Err(VaultError::RemoteApiFailed {
                operation,
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| VaultError::RequestFailed {
            operation,
            reason: format!("malformed response: {}", e.without_url()),
        })
    }
}
