use super::AppState;
use crate::application::{discard, IncomingUpload};
use crate::domain::shorts::{parse_tags, ClientState, CreatorKind, CreatorRef, NewShort, Short};
use crate::domain::upload::Rejection;
use crate::error::AppError;
use crate::ports::repository::Counter;
use axum::body::{Body, Bytes};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Json};
use futures::{Stream, TryStreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::io;
use std::path::{Path as FsPath, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use uuid::Uuid;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

fn multipart_error(err: MultipartError) -> AppError {
    AppError::bad_request("BAD_MULTIPART", err.body_text())
}

/// Multipart fields collected before the upload is handed to ingest.
#[derive(Default)]
struct UploadForm {
    short: NewShort,
    creator_id: Option<String>,
    creator_kind: CreatorKind,
    source: Option<PathBuf>,
}

impl UploadForm {
    fn into_upload(self) -> Result<IncomingUpload, AppError> {
        let source_path = self.source.ok_or(Rejection::MissingFile)?;
        let mut short = self.short;
        short.created_by = self.creator_id.map(|id| CreatorRef {
            kind: self.creator_kind,
            id,
        });
        Ok(IncomingUpload { source_path, short })
    }
}

fn non_empty(text: String) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut form = UploadForm::default();
    if let Err(e) = read_form(&state, multipart, &mut form).await {
        if let Some(source) = &form.source {
            discard(source).await;
        }
        return Err(e);
    }

    let short = state.ingest.accept(form.into_upload()?).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "id": short.id,
            "slug": short.slug,
            "status": ClientState::from(short.status),
        })),
    ))
}

async fn read_form(state: &AppState, mut multipart: Multipart, form: &mut UploadForm) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                if form.source.is_some() {
                    return Err(AppError::bad_request("BAD_MULTIPART", "only one video per upload"));
                }
                let file_name = field.file_name().ok_or(Rejection::MissingFile)?.to_string();
                let ext = state.ingest.policy().check_file(&file_name, field.content_type())?;

                tokio::fs::create_dir_all(&state.uploads_dir)
                    .await
                    .map_err(|e| AppError::Unexpected(e.into()))?;
                let path = state.uploads_dir.join(format!("{}.{}", Uuid::new_v4(), ext));
                form.source = Some(path.clone());

                let limit = state.ingest.policy().max_bytes;
                let written = stream_to_file(&path, field, limit).await?;
                if written == 0 {
                    return Err(Rejection::MissingFile.into());
                }
                state.ingest.policy().check_size(written)?;
                tracing::debug!(bytes = written, "saved upload to {:?}", path);
            }
            "title" => form.short.title = field.text().await.map_err(multipart_error)?,
            "description" => form.short.description = non_empty(field.text().await.map_err(multipart_error)?),
            "tags" => form.short.tags = parse_tags(&field.text().await.map_err(multipart_error)?),
            "province" => form.short.location.province = non_empty(field.text().await.map_err(multipart_error)?),
            "ward" => form.short.location.ward = non_empty(field.text().await.map_err(multipart_error)?),
            "createdBy" => form.creator_id = non_empty(field.text().await.map_err(multipart_error)?),
            "creatorKind" => {
                form.creator_kind = match field.text().await.map_err(multipart_error)?.trim() {
                    "admin" => CreatorKind::Admin,
                    _ => CreatorKind::User,
                }
            }
            other => tracing::debug!("ignoring multipart field {:?}", other),
        }
    }
    Ok(())
}

/// Saves a `Stream` to a file, reading at most `limit + 1` bytes.
/// Returns the number of bytes written; more than `limit` means too large.
async fn stream_to_file<S, E>(path: &FsPath, stream: S, limit: u64) -> Result<u64, AppError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let mut file = BufWriter::new(
        tokio::fs::File::create(path)
            .await
            .map_err(|e| AppError::Unexpected(e.into()))?,
    );

    let copied = async {
        let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);
        let mut limited = body_reader.take(limit + 1);

        let written = tokio::io::copy(&mut limited, &mut file).await?;
        file.flush().await?;
        Ok::<_, io::Error>(written)
    }
    .await;

    copied.map_err(|e| AppError::bad_request("UPLOAD_INTERRUPTED", e.to_string()))
}

async fn find_short(state: &AppState, id: &str) -> Result<Short, AppError> {
    state
        .shorts
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("short {} not found", id)))
}

pub async fn get_short(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Short>, AppError> {
    Ok(Json(find_short(&state, &id).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    id: String,
    status: ClientState,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<String>,
}

pub async fn status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<StatusView>, AppError> {
    let short = find_short(&state, &id).await?;
    let status = short.client_state();
    let video_url = (status == ClientState::Completed).then(|| format!("/shorts/playlist/{}", short.id));
    Ok(Json(StatusView {
        id: short.id,
        status,
        video_url,
    }))
}

pub async fn playlist(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, AppError> {
    let manifest = state.playback.manifest(&id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        manifest,
    )
        .into_response())
}

pub async fn segment(
    State(state): State<AppState>,
    Path((id, segment)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let object = state.playback.segment(&id, &segment, range).await?;

    let status = if object.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };
    let mut response = Response::new(Body::from_stream(object.body));
    *response.status_mut() = status;

    let out = response.headers_mut();
    let content_type = object.content_type.as_deref().unwrap_or("video/mp2t");
    if let Ok(value) = HeaderValue::from_str(content_type) {
        out.insert(header::CONTENT_TYPE, value);
    }
    if let Some(length) = object.content_length {
        out.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    if let Some(range) = object.content_range.as_deref().and_then(|r| HeaderValue::from_str(r).ok()) {
        out.insert(header::CONTENT_RANGE, range);
    }
    if object.accept_ranges {
        out.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    }
    Ok(response)
}

pub async fn interact(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let counter = Counter::parse(&kind)
        .ok_or_else(|| AppError::bad_request("UNKNOWN_INTERACTION", format!("unknown interaction {:?}", kind)))?;
    let value = state
        .shorts
        .increment(&id, counter)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("short {} is not available", id)))?;
    Ok(Json(json!({ "id": id, "kind": counter.field(), "value": value })))
}
