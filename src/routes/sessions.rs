//! Session routes
//!
//! HTTP endpoints for the two-file diff protocol:
//! - POST /upload/ - open a session
//! - POST /upload/:session_id - upload one of the session's two files
//! - GET /upload/:session_id - status phrase, or redirect to the result
//! - DELETE /upload/:session_id - drop the session
//!
//! The first upload's response is deliberately deferred until the second
//! upload has registered: its request body is the engine's left input and has
//! to stay open while the engine (running in the second request's task)
//! consumes it through the rendezvous channel.

use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use crate::diff::{diff_streams, ByteSource, LineReader};
use crate::error::{AppError, Result};
use crate::session::{upload_channel, SessionStatus, UploadSlot, UploadStream};
use crate::state::AppState;

/// POST /upload/
///
/// Open a session. Responds with the session id as hex text; the id drives
/// the rest of the query chain.
pub async fn register(State(state): State<AppState>) -> Result<Response> {
    let id = state.registry().create().await;
    Ok(id.simple().to_string().into_response())
}

/// GET /upload/:session_id
///
/// Status phrase for the session, or a 302 redirect to the result file once
/// the diff is complete.
pub async fn status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response> {
    let id = parse_session_id(&session_id)?;
    let (status, locator) = state.registry().peek(id).await?;

    if let (SessionStatus::Complete, Some(locator)) = (status, &locator) {
        return Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, locator.as_str())
            .body(Body::empty())
            .map_err(|e| AppError::Internal(e.to_string()));
    }
    Ok(status.to_string().into_response())
}

/// DELETE /upload/:session_id
///
/// Drop the session.
pub async fn drop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_session_id(&session_id)?;
    state.registry().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /upload/:session_id
///
/// Upload one of the session's two files as a multipart `file` field. The
/// first upload answers once its partner has arrived and its own bytes are
/// drained; the second upload runs the diff and answers with the outcome.
pub async fn upload(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Response> {
    let id = parse_session_id(&session_id)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadInput(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = sanitize_file_name(field.file_name());
        return handle_file(&state, id, field, file_name).await;
    }

    Err(AppError::BadInput("missing multipart field \"file\"".to_string()))
}

async fn handle_file(
    state: &AppState,
    id: Uuid,
    field: Field<'_>,
    file_name: String,
) -> Result<Response> {
    let (tx, stream) = upload_channel(file_name.clone());

    match state.registry().claim_upload(id, stream).await? {
        UploadSlot::First(handle) => {
            timeout(state.config().upload.timeout, handle.wait())
                .await
                .map_err(|_| AppError::Timeout("the second file"))?
                .map_err(|_| AppError::Gone(id.simple().to_string()))?;

            feed_engine(field, tx).await;

            Ok((StatusCode::CREATED, "First file OK").into_response())
        }
        UploadSlot::Second(partner) => {
            drop(tx);
            let locator = run_engine(state, id, partner, field, file_name).await?;

            tracing::info!(session_id = %id.simple(), locator = %locator, "diff complete");
            Ok((StatusCode::CREATED, "Second file OK").into_response())
        }
    }
}

/// Forward multipart chunks into the rendezvous channel until end of body, or
/// until the engine stops listening.
async fn feed_engine(mut field: Field<'_>, tx: mpsc::Sender<std::io::Result<Bytes>>) {
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if tx.send(Ok(chunk)).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                let _ = tx
                    .send(Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        e,
                    )))
                    .await;
                break;
            }
        }
    }
}

/// Run the one diff this session will ever see and record its outcome.
async fn run_engine(
    state: &AppState,
    id: Uuid,
    partner: UploadStream,
    second: Field<'_>,
    second_name: String,
) -> Result<String> {
    let config = state.config();
    let out_name = format!("{}_{}_{}", partner.file_name, second_name, id.simple());
    let out_path = config.upload.output_dir.join(&out_name);

    let file = tokio::fs::File::create(&out_path).await?;
    let mut sink = BufWriter::new(file);

    let mut left = LineReader::new(partner.chunks);
    let mut right = LineReader::new(FieldSource(second));

    let outcome = timeout(
        config.upload.timeout,
        diff_streams(&mut left, &mut right, &mut sink, &config.diff),
    )
    .await;

    match outcome {
        // Timed out mid-diff: the session keeps its last state and the TTL
        // reclaims it.
        Err(_) => Err(AppError::Timeout("the diff to finish")),
        Ok(Err(e)) => {
            if let Err(finish) = state.registry().finish(id, None).await {
                tracing::warn!(session_id = %id.simple(), error = %finish, "could not record failure");
            }
            Err(AppError::EngineFailure(e.to_string()))
        }
        Ok(Ok(())) => {
            sink.shutdown().await?;
            let locator = format!("/static/output/{out_name}");
            if let Err(finish) = state.registry().finish(id, Some(locator.clone())).await {
                tracing::warn!(session_id = %id.simple(), error = %finish, "could not record result");
            }
            Ok(locator)
        }
    }
}

/// Adapter from the in-request multipart field to the engine's byte source.
/// Lives here so the diff module stays free of HTTP types.
struct FieldSource<'a>(Field<'a>);

#[async_trait::async_trait]
impl<'a> ByteSource for FieldSource<'a> {
    async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
        self.0
            .chunk()
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e))
    }
}

fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(raw.to_string()))
}

/// Client file names feed the output file name; keep only characters that are
/// safe in a path segment.
fn sanitize_file_name(name: Option<&str>) -> String {
    let cleaned: String = name
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
