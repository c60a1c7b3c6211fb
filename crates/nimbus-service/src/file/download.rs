//! Downloads and range streaming.

use tracing::debug;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_core::traits::ByteStream;
use nimbus_entity::file::File;

use super::service::FileEngine;
use crate::context::RequestContext;
use crate::stream::{RangeRequest, StreamBody, parse_range};

impl FileEngine {
    /// A file and a stream of its full content.
    pub async fn download(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
    ) -> AppResult<(File, ByteStream)> {
        let file = self.readable(ctx, file_id).await?;
        let body = self.blobs.download(&file.storage_key).await?;
        debug!(user_id = %ctx.user_id, file_id = %file_id, size = file.size, "Download started");
        Ok((file, body))
    }

    /// Open a file for streaming, honoring an optional `Range` header.
    pub async fn open_stream(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        range_header: Option<&str>,
    ) -> AppResult<StreamBody> {
        let file = self.readable(ctx, file_id).await?;
        let total = file.size.unsigned_abs();

        match parse_range(range_header, total) {
            RangeRequest::Full => {
                let body = self.blobs.download(&file.storage_key).await?;
                Ok(StreamBody::Complete { file, body })
            }
            RangeRequest::Partial(range) => {
                let body = self
                    .blobs
                    .download_range(&file.storage_key, range.start, range.end)
                    .await?;
                debug!(file_id = %file_id, start = range.start, end = range.end, "Range read");
                Ok(StreamBody::Partial { file, range, body })
            }
            RangeRequest::Unsatisfiable => Ok(StreamBody::Unsatisfiable { total }),
        }
    }

    async fn readable(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let file = self.get(ctx, file_id).await?;
        if file.is_folder {
            return Err(AppError::validation("Folders cannot be downloaded"));
        }
        Ok(file)
    }
}
