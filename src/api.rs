use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, App, Error, HttpResponse, HttpServer};
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use serde_json::json;
use tempfile::NamedTempFile;

use crate::engine::Fingerprinter;
use crate::error::EngineError;
use crate::models::{MatchCandidate, QueryStats, SongRecord};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct SongsResponse {
    songs: Vec<SongRecord>,
    count: usize,
}

#[derive(Serialize)]
struct FingerprintStats {
    duration: f64,
    peaks_found: usize,
    hashes_generated: usize,
}

#[derive(Serialize)]
struct FingerprintResponse {
    success: bool,
    song_id: i64,
    message: String,
    stats: FingerprintStats,
}

#[derive(Serialize)]
struct MatchDetails {
    coherent_matches: usize,
    total_matches: usize,
    song_offset: f64,
}

#[derive(Serialize)]
struct MatchInfo {
    song_info: SongRecord,
    confidence: f64,
    coherent_matches: usize,
    total_matches: usize,
    song_offset: f64,
}

#[derive(Serialize)]
struct IdentifyResponse {
    success: bool,
    match_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    song: Option<SongRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    match_details: Option<MatchDetails>,
    query_stats: QueryStats,
    all_matches: Vec<MatchInfo>,
    message: String,
}

#[derive(Serialize)]
struct DatabaseStats {
    total_songs: i64,
    total_fingerprints: i64,
    avg_fingerprints_per_song: f64,
}

#[derive(Serialize)]
struct StatsResponse {
    database_stats: DatabaseStats,
}

#[derive(Serialize)]
struct ResetResponse {
    success: bool,
    message: String,
}

/// One multipart upload, spooled to a temp file that keeps the original
/// extension so the decoder can gate on it.
struct UploadedAudio {
    file: NamedTempFile,
    filename: String,
    fields: HashMap<String, String>,
}

/// Drains a multipart payload: the `audio` part goes to a temp file, every
/// other part is collected as a text field.
async fn read_upload(mut payload: Multipart) -> Result<UploadedAudio, Error> {
    let mut audio: Option<(NamedTempFile, String)> = None;
    let mut fields = HashMap::new();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(actix_web::error::ErrorInternalServerError)?;

        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().unwrap_or("").to_string(),
                cd.get_filename().map(str::to_string),
            ),
            None => (String::new(), None),
        };

        if name == "audio" {
            let filename = filename.ok_or(EngineError::InputMissing)?;
            let ext = Path::new(&filename)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            let suffix = format!(".{}", ext);
            let mut builder = tempfile::Builder::new();
            if !ext.is_empty() {
                builder.suffix(&suffix);
            }
            let mut temp = builder
                .tempfile()
                .map_err(actix_web::error::ErrorInternalServerError)?;

            while let Some(chunk) = field.next().await {
                let data = chunk.map_err(actix_web::error::ErrorInternalServerError)?;
                temp.write_all(&data)
                    .map_err(actix_web::error::ErrorInternalServerError)?;
            }
            temp.flush()
                .map_err(actix_web::error::ErrorInternalServerError)?;
            audio = Some((temp, filename));
        } else {
            let mut data = Vec::new();
            while let Some(chunk) = field.next().await {
                let bytes = chunk.map_err(actix_web::error::ErrorInternalServerError)?;
                data.extend_from_slice(&bytes);
            }
            fields.insert(name, String::from_utf8_lossy(&data).into_owned());
        }
    }

    let (file, filename) = audio.ok_or(EngineError::InputMissing)?;
    Ok(UploadedAudio { file, filename, fields })
}

fn match_info(candidate: &MatchCandidate) -> MatchInfo {
    MatchInfo {
        song_info: candidate.song.clone(),
        confidence: candidate.confidence,
        coherent_matches: candidate.coherent_matches,
        total_matches: candidate.total_matches,
        song_offset: candidate.song_offset,
    }
}

async fn api_info() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Audio Fingerprinting API",
        "status": "running",
        "endpoints": {
            "GET /": "API information",
            "GET /health": "Health check",
            "GET /songs": "List all songs",
            "POST /fingerprint": "Add song to database (requires audio file)",
            "POST /identify": "Identify song from audio (requires audio file)",
            "GET /stats": "Database statistics",
            "POST /reset": "Reset database"
        },
        "usage": {
            "fingerprint": "Send POST with 'audio' file + optional 'title' and 'artist' form data",
            "identify": "Send POST with 'audio' file to identify"
        }
    }))
}

async fn api_health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn api_songs(engine: web::Data<Fingerprinter>) -> Result<HttpResponse, Error> {
    let songs = engine.store().list_songs()?;
    let count = songs.len();
    Ok(HttpResponse::Ok().json(SongsResponse { songs, count }))
}

async fn api_fingerprint(
    engine: web::Data<Fingerprinter>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let upload = read_upload(payload).await?;
    let title = upload.fields.get("title").cloned().unwrap_or_else(|| "Unknown".into());
    let artist = upload.fields.get("artist").cloned().unwrap_or_else(|| "Unknown".into());

    // The DSP stages are CPU-bound; keep them off the request executor.
    let engine = engine.into_inner();
    let (report, title, artist) = web::block(move || {
        let report =
            engine.enroll_file(upload.file.path(), &upload.filename, &title, &artist)?;
        Ok::<_, EngineError>((report, title, artist))
    })
    .await
    .map_err(actix_web::error::ErrorInternalServerError)??;

    Ok(HttpResponse::Ok().json(FingerprintResponse {
        success: true,
        song_id: report.song_id,
        message: format!("Successfully fingerprinted \"{}\" by {}", title, artist),
        stats: FingerprintStats {
            duration: report.duration,
            peaks_found: report.peaks_found,
            hashes_generated: report.hashes_generated,
        },
    }))
}

async fn api_identify(
    engine: web::Data<Fingerprinter>,
    payload: Multipart,
) -> Result<HttpResponse, Error> {
    let upload = read_upload(payload).await?;

    let engine = engine.into_inner();
    let result = web::block(move || engine.identify_file(upload.file.path()))
        .await
        .map_err(actix_web::error::ErrorInternalServerError)??;

    let query_stats = result.query_stats;
    if result.matches.is_empty() {
        return Ok(HttpResponse::Ok().json(IdentifyResponse {
            success: true,
            match_found: false,
            song: None,
            confidence: None,
            match_details: None,
            query_stats,
            all_matches: Vec::new(),
            message: "No matching song found".into(),
        }));
    }

    let top = &result.matches[0];
    Ok(HttpResponse::Ok().json(IdentifyResponse {
        success: true,
        match_found: true,
        song: Some(top.song.clone()),
        confidence: Some(top.confidence),
        match_details: Some(MatchDetails {
            coherent_matches: top.coherent_matches,
            total_matches: top.total_matches,
            song_offset: top.song_offset,
        }),
        query_stats,
        all_matches: result.matches.iter().map(match_info).collect(),
        message: format!(
            "Found matching song: {} by {}",
            top.song.title.as_deref().unwrap_or("Unknown"),
            top.song.artist.as_deref().unwrap_or("Unknown")
        ),
    }))
}

async fn api_stats(engine: web::Data<Fingerprinter>) -> Result<HttpResponse, Error> {
    let counts = engine.store().counts()?;
    Ok(HttpResponse::Ok().json(StatsResponse {
        database_stats: DatabaseStats {
            total_songs: counts.total_songs,
            total_fingerprints: counts.total_fingerprints,
            avg_fingerprints_per_song: counts.avg_fingerprints_per_song,
        },
    }))
}

async fn api_reset(engine: web::Data<Fingerprinter>) -> Result<HttpResponse, Error> {
    engine.store().reset()?;
    Ok(HttpResponse::Ok().json(ResetResponse {
        success: true,
        message: "Database reset successfully".into(),
    }))
}

async fn api_get_file(filename: web::Path<String>) -> Result<HttpResponse, Error> {
    // Uploads are served from the working directory only; no path segments.
    let name = filename.into_inner();
    let requested = Path::new(&name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| EngineError::NotFound(name.clone()))?;

    let path = std::env::current_dir()
        .map_err(EngineError::Io)?
        .join(&requested);
    if !path.is_file() {
        return Err(EngineError::NotFound(requested).into());
    }

    let bytes = std::fs::read(&path).map_err(EngineError::Io)?;
    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .body(bytes))
}

/// Route table, shared by the server and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(api_info))
        .route("/health", web::get().to(api_health))
        .route("/songs", web::get().to(api_songs))
        .route("/fingerprint", web::post().to(api_fingerprint))
        .route("/identify", web::post().to(api_identify))
        .route("/stats", web::get().to(api_stats))
        .route("/reset", web::post().to(api_reset))
        .route("/files/{filename}", web::get().to(api_get_file));
}

/// Configures and runs the web server until shutdown.
pub async fn start_server(
    engine: Arc<Fingerprinter>,
    host: &str,
    port: u16,
) -> std::io::Result<()> {
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(engine.clone()))
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await
}
