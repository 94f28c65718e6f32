//! End-to-end tests for botanai.
//!
//! The inference provider is replaced by a stub that returns canned reply
//! text, and history lives in a `MemoryBackend`, so these run offline:
//!
//!   cargo test --test pipeline

use async_trait::async_trait;
use botanai::pipeline::normalize::encode_jpeg;
use botanai::{
    analyze_bytes, AnalysisConfig, AnalysisRequest, AnalysisSource, BotanError, HealthStatus,
    HistoryBackend, Language, MemoryBackend, MockFallback, PlantAnalysis, Session, VisionProvider,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const POTHOS_REPLY: &str = r#"{"scientificName":"Epipremnum aureum","commonName":"Pothos","confidence":0.9,"healthStatus":"Healthy","diagnosis":"ok","symptoms":[],"treatment":[],"careInstructions":{"water":"w","light":"l","temperature":"t","humidity":"h"},"funFact":"f"}"#;

/// Provider that answers every request with the same text and records what
/// it was sent.
struct StubProvider {
    reply: Result<String, fn() -> BotanError>,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<AnalysisRequest>>,
}

impl StubProvider {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(err: fn() -> BotanError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            delay,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl VisionProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &AnalysisRequest) -> Result<String, BotanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(make) => Err(make()),
        }
    }
}

/// A 400×300 photo-like JPEG.
fn leaf_jpeg() -> (DynamicImage, Vec<u8>) {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(400, 300, |x, y| {
        Rgb([(x / 3) as u8, (120 + y / 4) as u8, ((x * y) % 97) as u8])
    }));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .expect("encode fixture");
    (img, bytes)
}

fn config_with(provider: Arc<dyn VisionProvider>) -> AnalysisConfig {
    AnalysisConfig::builder()
        .provider(provider)
        .build()
        .expect("valid config")
}

fn assert_status_literals(records: &[PlantAnalysis]) {
    for r in records {
        let json = serde_json::to_value(r).unwrap();
        let status = json["healthStatus"].as_str().unwrap();
        assert!(
            ["Healthy", "Sick", "Unknown"].contains(&status),
            "unexpected status {status}"
        );
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn small_jpeg_single_pass_and_healthy_record() {
    let (_, bytes) = leaf_jpeg();
    let stub = StubProvider::replying(POTHOS_REPLY);
    let backend = Arc::new(MemoryBackend::new());
    let session = Session::open(config_with(stub.clone()), backend.clone()).await;

    let record = session.analyze_bytes(bytes.clone()).await.expect("analysis");

    assert_eq!(record.health_status, HealthStatus::Healthy);
    assert_eq!(record.common_name, "Pothos");
    assert_eq!(record.source, AnalysisSource::Inference);

    // Single pass: the uploaded body is the quality-80 encode of the decoded pixels.
    let sent = stub.seen.lock().unwrap()[0].clone();
    let decoded = image::load_from_memory(&bytes).unwrap();
    let src = sent.image().unwrap();
    assert_eq!(src.media_type, "image/jpeg");
    assert_eq!(src.data, encode_jpeg(&decoded, 80).unwrap());
    assert_eq!(
        record.image.as_deref(),
        Some(format!("data:image/jpeg;base64,{}", src.data).as_str())
    );

    let history = session.history().await;
    assert_eq!(history.len(), 1);
    assert_status_literals(&history);
    assert!(backend.blob().unwrap().contains("\"healthStatus\":\"Healthy\""));
}

#[tokio::test]
async fn refusal_is_surfaced_verbatim_and_not_recorded() {
    let (_, bytes) = leaf_jpeg();
    let stub = StubProvider::replying("Sorry, I cannot identify this.");
    let session = Session::open(config_with(stub), Arc::new(MemoryBackend::new())).await;

    let err = session.analyze_bytes(bytes).await.unwrap_err();
    assert!(matches!(err, BotanError::Extraction { .. }));
    assert_eq!(err.to_string(), "Sorry, I cannot identify this.");
    assert!(session.history().await.is_empty());
}

#[tokio::test]
async fn fenced_reply_is_recovered() {
    let (_, bytes) = leaf_jpeg();
    let reply = format!(
        "```json\n{}\n```",
        POTHOS_REPLY
            .replace("\"Healthy\"", "\"Unknown\"")
            .replace("Pothos", "?")
    );
    let stub = StubProvider::replying(&reply);
    let record = analyze_bytes(bytes, &config_with(stub)).await.unwrap();
    assert_eq!(record.health_status, HealthStatus::Unknown);
    assert_eq!(record.common_name, "?");
}

#[tokio::test]
async fn missing_credential_with_mock_fallback_returns_mock() {
    let (_, bytes) = leaf_jpeg();
    for (lang, name) in [(Language::En, "Golden pothos"), (Language::Fr, "Pothos doré")] {
        let config = AnalysisConfig::builder()
            .language(lang)
            .mock_fallback(MockFallback::Enabled)
            .build()
            .unwrap();
        let record = analyze_bytes(bytes.clone(), &config).await.unwrap();
        assert_eq!(record.common_name, name);
        assert_eq!(record.health_status, HealthStatus::Healthy);
        assert!(record.is_mock());
    }
}

#[tokio::test]
async fn missing_credential_without_fallback_is_configuration_error() {
    let (_, bytes) = leaf_jpeg();
    let err = analyze_bytes(bytes, &AnalysisConfig::default()).await.unwrap_err();
    assert!(matches!(err, BotanError::ProviderNotConfigured { .. }));
    assert!(err.is_configuration_error());
}

#[tokio::test]
async fn unknown_model_falls_back_only_when_enabled() {
    let (_, bytes) = leaf_jpeg();
    let make = || BotanError::ModelNotFound {
        model: "claude-gone".into(),
        detail: "model: claude-gone".into(),
    };

    let enabled = AnalysisConfig::builder()
        .provider(StubProvider::failing(make))
        .mock_fallback(MockFallback::Enabled)
        .build()
        .unwrap();
    assert!(analyze_bytes(bytes.clone(), &enabled).await.unwrap().is_mock());

    let disabled = config_with(StubProvider::failing(make));
    let err = analyze_bytes(bytes, &disabled).await.unwrap_err();
    assert!(matches!(err, BotanError::ModelNotFound { .. }));
}

#[tokio::test]
async fn upstream_errors_never_fall_back() {
    let (_, bytes) = leaf_jpeg();
    let config = AnalysisConfig::builder()
        .provider(StubProvider::failing(|| BotanError::UpstreamError {
            status: 500,
            body: "boom".into(),
        }))
        .mock_fallback(MockFallback::Enabled)
        .build()
        .unwrap();
    let err = analyze_bytes(bytes, &config).await.unwrap_err();
    assert!(matches!(err, BotanError::UpstreamError { status: 500, .. }));
}

#[tokio::test]
async fn corrupt_upload_fails_without_touching_history() {
    let stub = StubProvider::replying(POTHOS_REPLY);
    let backend = Arc::new(MemoryBackend::new());
    let session = Session::open(config_with(stub.clone()), backend.clone()).await;
    session.analyze_bytes(leaf_jpeg().1).await.unwrap();

    let err = session.analyze_bytes(b"not an image".to_vec()).await.unwrap_err();
    assert!(matches!(err, BotanError::DecodeFailed { .. }));
    assert_eq!(session.history().await.len(), 1);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn large_photo_is_downscaled_before_upload() {
    let big = DynamicImage::ImageRgb8(RgbImage::from_fn(3200, 2400, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, 90])
    }));
    let mut bytes = Vec::new();
    big.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();

    let stub = StubProvider::replying(POTHOS_REPLY);
    analyze_bytes(bytes, &config_with(stub.clone())).await.unwrap();

    let sent = stub.seen.lock().unwrap()[0].clone();
    let body = base64_decode(&sent.image().unwrap().data);
    let uploaded = image::load_from_memory(&body).unwrap();
    assert_eq!((uploaded.width(), uploaded.height()), (1600, 1200));
}

#[tokio::test]
async fn french_request_keeps_english_status_literals() {
    let (_, bytes) = leaf_jpeg();
    let stub = StubProvider::replying(POTHOS_REPLY);
    let config = AnalysisConfig::builder()
        .provider(stub.clone())
        .language(Language::Fr)
        .build()
        .unwrap();
    analyze_bytes(bytes, &config).await.unwrap();

    let sent = stub.seen.lock().unwrap()[0].clone();
    let system = sent.system.unwrap();
    assert!(system.contains("français"));
    assert!(system.contains("'Healthy', 'Sick' ou 'Unknown'"));
}

#[tokio::test]
async fn concurrent_analyses_in_one_session_are_serialised() {
    let (_, bytes) = leaf_jpeg();
    let stub = StubProvider::slow(POTHOS_REPLY, Duration::from_millis(50));
    let backend = Arc::new(MemoryBackend::new());
    let session = Arc::new(Session::open(config_with(stub.clone()), backend.clone()).await);

    let a = tokio::spawn({
        let s = Arc::clone(&session);
        let b = bytes.clone();
        async move { s.analyze_bytes(b).await }
    });
    let b = tokio::spawn({
        let s = Arc::clone(&session);
        async move { s.analyze_bytes(bytes).await }
    });
    let first = a.await.unwrap().unwrap();
    let second = b.await.unwrap().unwrap();

    let history = session.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    let ids: Vec<_> = history.iter().map(|r| r.id.clone()).collect();
    assert!(ids.contains(&first.id) && ids.contains(&second.id));

    // Both records reached storage.
    let reloaded = Session::open(AnalysisConfig::default(), backend as Arc<dyn HistoryBackend>).await;
    assert_eq!(reloaded.history().await.len(), 2);
}

#[tokio::test]
async fn history_survives_corrupt_blob_and_clears() {
    let backend = Arc::new(MemoryBackend::with_blob("][ definitely not json"));
    let session = Session::open(
        config_with(StubProvider::replying(POTHOS_REPLY)),
        backend.clone(),
    )
    .await;
    assert!(session.history().await.is_empty());

    let record = session.analyze_bytes(leaf_jpeg().1).await.unwrap();
    assert_eq!(session.find(&record.id).await.unwrap().id, record.id);

    session.clear_history().await.unwrap();
    assert!(session.history().await.is_empty());
    assert_eq!(backend.blob().as_deref(), Some("[]"));
}

#[tokio::test]
async fn data_url_input_is_accepted() {
    let (_, bytes) = leaf_jpeg();
    let url = format!("data:image/jpeg;base64,{}", base64_encode(&bytes));
    let stub = StubProvider::replying(POTHOS_REPLY);
    let session = Session::open(config_with(stub), Arc::new(MemoryBackend::new())).await;
    let record = session.analyze(&url).await.unwrap();
    assert_eq!(record.scientific_name, "Epipremnum aureum");
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(s: &str) -> Vec<u8> {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.decode(s).unwrap()
}
