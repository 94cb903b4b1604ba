//! Data source strategies and the fallback chain that tries them in order.

use crate::config::SourceConfig;
use crate::dataset::{self, Dataset, ParseReport};
use crate::error::{Result, SacError};
use crate::types::{CallDuration, CallRecord};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Remote,
    Local,
    Synthetic,
    /// Every source failed.
    None,
}

/// A place call data can be loaded from.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Human-readable name used in logs and notices.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    async fn load(&self) -> Result<(Dataset, ParseReport)>;
}

const USER_AGENT: &str = concat!("sac-dashboard/", env!("CARGO_PKG_VERSION"));

/// Fetch a CSV body over HTTP(S).
pub struct RemoteSource {
    name: String,
    url: String,
    /// A client that failed to build is reported by `load`.
    client: std::result::Result<reqwest::Client, reqwest::Error>,
}

impl RemoteSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_user_agent(url, timeout, USER_AGENT)
    }

    fn with_user_agent(url: impl Into<String>, timeout: Duration, user_agent: &str) -> Self {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build();
        if let Err(e) = &client {
            tracing::warn!("Could not build HTTP client for {}: {}", url, e);
        }
        Self {
            name: format!("remote {}", url),
            url,
            client,
        }
    }
}

/// Only http and https URLs can be fetched.
pub(crate) fn validate_url(raw_url: &str) -> Result<Url> {
    let parsed = Url::parse(raw_url).map_err(|e| SacError::SourceUnavailable {
        name: raw_url.to_string(),
        message: format!("Invalid URL: {}", e),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(SacError::SourceUnavailable {
            name: raw_url.to_string(),
            message: format!("Scheme '{}' is not allowed (only http/https)", other),
        }),
    }
}

#[async_trait]
impl DataSource for RemoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    async fn load(&self) -> Result<(Dataset, ParseReport)> {
        let url = validate_url(&self.url)?;
        let client = self.client.as_ref().map_err(|e| SacError::SourceUnavailable {
            name: self.url.clone(),
            message: format!("HTTP client unavailable: {}", e),
        })?;

        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SacError::SourceUnavailable {
                name: self.url.clone(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = response.text().await?;
        Dataset::from_csv_str(&body)
    }
}

/// Read a CSV file or the first sheet of a workbook from disk.
pub struct LocalFileSource {
    name: String,
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("local file {}", path.display()),
            path,
        }
    }
}

#[async_trait]
impl DataSource for LocalFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    async fn load(&self) -> Result<(Dataset, ParseReport)> {
        if dataset::is_spreadsheet(&self.path) {
            let path = self.path.clone();
            return tokio::task::spawn_blocking(move || Dataset::from_workbook_path(&path))
                .await
                .map_err(|e| SacError::Other(e.into()))?;
        }

        let bytes = tokio::fs::read(&self.path).await?;
        Dataset::from_csv_reader(bytes.as_slice())
    }
}

const SAMPLE_ATTENDANTS: &[&str] = &["Ana", "Bruno", "Carla", "Diego", "Elisa"];

const SAMPLE_CALLS: &[(&str, &str)] = &[
    ("Positivo", "Cliente agradeceu pela solução rápida."),
    ("Positivo", "Problema resolvido na primeira ligação."),
    ("Neutro", "Cliente pediu a segunda via do boleto."),
    ("Neutro", "Consulta sobre prazo de entrega."),
    ("Negativo", "Reclamação sobre cobrança indevida."),
    ("Negativo", "Cliente insatisfeito com o tempo de espera."),
];

/// Deterministic generated sample, the last resort of the chain.
pub struct SyntheticSource {
    rows: usize,
    seed: u64,
}

impl SyntheticSource {
    pub fn new(rows: usize, seed: u64) -> Self {
        Self { rows, seed }
    }

    pub fn generate(&self) -> Dataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let records = (0..self.rows)
            .map(|_| {
                let attendant = SAMPLE_ATTENDANTS.choose(&mut rng).copied().unwrap_or("Ana");
                let (sentiment, text) = SAMPLE_CALLS
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or(("Neutro", ""));
                let secs = rng.gen_range(30..=900);
                CallRecord::new(attendant, sentiment, CallDuration::from_secs(secs).to_string())
                    .with_transcript(text)
            })
            .collect();
        Dataset::new(records)
    }
}

#[async_trait]
impl DataSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic sample"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    async fn load(&self) -> Result<(Dataset, ParseReport)> {
        let dataset = self.generate();
        let report = ParseReport {
            rows_read: dataset.len(),
            ..ParseReport::default()
        };
        Ok((dataset, report))
    }
}

/// Result of running the chain: always carries a dataset.
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    /// Name of the source that produced the dataset.
    pub origin: String,
    pub kind: SourceKind,
    /// Messages for the user: failed sources, dropped rows.
    pub notices: Vec<String>,
}

/// Ordered list of sources; the first one that yields rows wins.
#[derive(Default)]
pub struct LoaderChain {
    sources: Vec<Arc<dyn DataSource>>,
}

impl LoaderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote (if configured), then local (if configured), then synthetic.
    pub fn from_config(config: &SourceConfig) -> Self {
        let mut chain = Self::new();
        if let Some(url) = &config.url {
            chain.push(Arc::new(RemoteSource::new(
                url.clone(),
                Duration::from_secs(config.timeout_secs),
            )));
        }
        if let Some(path) = &config.local_path {
            chain.push(Arc::new(LocalFileSource::new(path.clone())));
        }
        chain.push(Arc::new(SyntheticSource::new(
            config.synthetic_rows,
            config.synthetic_seed,
        )));
        chain
    }

    pub fn push(&mut self, source: Arc<dyn DataSource>) {
        tracing::debug!("Registered data source: {}", source.name());
        self.sources.push(source);
    }

    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.push(source);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Try each source in order. Never fails: when nothing loads, the
    /// outcome holds an empty dataset and a notice saying so.
    pub async fn load(&self) -> LoadOutcome {
        let mut notices = Vec::new();

        for source in &self.sources {
            let result = match source.load().await {
                Ok((dataset, _)) if dataset.is_empty() => {
                    Err(SacError::EmptyDataset(source.name().to_string()))
                }
                other => other,
            };

            match result {
                Ok((dataset, report)) => {
                    tracing::info!("Loaded {} records from {}", dataset.len(), source.name());
                    if report.dropped_rows > 0 {
                        notices.push(format!(
                            "Dropped {} rows that were unreadable or lacked an attendant or sentiment",
                            report.dropped_rows
                        ));
                    }
                    if source.kind() == SourceKind::Synthetic {
                        notices.push("Showing a synthetic sample dataset".to_string());
                    }
                    return LoadOutcome {
                        dataset,
                        origin: source.name().to_string(),
                        kind: source.kind(),
                        notices,
                    };
                }
                Err(e) => {
                    tracing::warn!("Data source {} failed: {}", source.name(), e);
                    notices.push(format!("Could not load {}: {}", source.name(), e));
                }
            }
        }

        notices.push("No data source succeeded; the dataset is empty".to_string());
        LoadOutcome {
            dataset: Dataset::empty(),
            origin: "none".to_string(),
            kind: SourceKind::None,
            notices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct FailingSource;

    #[async_trait]
    impl DataSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Remote
        }

        async fn load(&self) -> Result<(Dataset, ParseReport)> {
            Err(SacError::SourceUnavailable {
                name: "failing".into(),
                message: "offline".into(),
            })
        }
    }

    fn csv_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    /// Answer one HTTP request on a local port with a canned response and
    /// return the URL to fetch.
    async fn serve_once(status: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: text/csv\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        format!("http://{}/sac.csv", addr)
    }

    #[test]
    fn test_validate_url_schemes() {
        assert!(validate_url("https://example.com/sac.csv").is_ok());
        assert!(validate_url("http://example.com/sac.csv").is_ok());

        let msg = validate_url("file:///etc/passwd").unwrap_err().to_string();
        assert!(msg.contains("not allowed"), "got: {msg}");

        let msg = validate_url("not a url").unwrap_err().to_string();
        assert!(msg.contains("Invalid URL"), "got: {msg}");
    }

    #[test]
    fn test_synthetic_is_deterministic() {
        let a = SyntheticSource::new(25, 7).generate();
        let b = SyntheticSource::new(25, 7).generate();
        assert_eq!(a.records(), b.records());
        assert_eq!(a.len(), 25);

        for record in a.records() {
            let secs = record.elapsed().unwrap().as_secs();
            assert!((30..=900).contains(&secs));
            assert!(SAMPLE_ATTENDANTS.contains(&record.attendant.as_str()));
        }
    }

    #[tokio::test]
    async fn test_local_file_source() {
        let file = csv_file("atendente,sentimento,duracao\nAna,Positivo,00:06:00\n");
        let source = LocalFileSource::new(file.path());
        let (dataset, report) = source.load().await.unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(report.rows_read, 1);
    }

    #[tokio::test]
    async fn test_local_file_missing() {
        let source = LocalFileSource::new("/nonexistent/sac.csv");
        assert!(matches!(source.load().await, Err(SacError::Io(_))));
    }

    #[tokio::test]
    async fn test_remote_rejects_bad_scheme() {
        let source = RemoteSource::new("ftp://example.com/sac.csv", Duration::from_secs(1));
        assert!(matches!(
            source.load().await,
            Err(SacError::SourceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_remote_client_build_failure_is_unavailable() {
        let source = RemoteSource::with_user_agent(
            "http://127.0.0.1:1/sac.csv",
            Duration::from_secs(1),
            "bad\nagent",
        );
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, SacError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("HTTP client unavailable"), "got: {err}");
    }

    #[tokio::test]
    async fn test_remote_ok_body_is_parsed() {
        let body = "attendant,sentiment,duration\nAna,Positivo,00:06:00\nBruno,Neutro,00:01:00\n";
        let url = serve_once("200 OK", body).await;
        let chain = LoaderChain::new()
            .with_source(Arc::new(RemoteSource::new(url, Duration::from_secs(5))))
            .with_source(Arc::new(SyntheticSource::new(5, 1)));

        let outcome = chain.load().await;
        assert_eq!(outcome.kind, SourceKind::Remote);
        assert_eq!(outcome.dataset.attendants(), vec!["Ana", "Bruno"]);
        assert!(outcome.notices.is_empty());
    }

    #[tokio::test]
    async fn test_remote_not_found_falls_through() {
        let url = serve_once("404 Not Found", "missing").await;
        let source = RemoteSource::new(url.clone(), Duration::from_secs(5));
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, SacError::SourceUnavailable { .. }));

        let url = serve_once("404 Not Found", "missing").await;
        let chain = LoaderChain::new()
            .with_source(Arc::new(RemoteSource::new(url, Duration::from_secs(5))))
            .with_source(Arc::new(SyntheticSource::new(5, 1)));

        let outcome = chain.load().await;
        assert_eq!(outcome.kind, SourceKind::Synthetic);
        let notice = &outcome.notices[0];
        assert!(notice.contains("Data source unavailable"), "got: {notice}");
        assert!(notice.contains("HTTP 404"), "got: {notice}");
    }

    #[tokio::test]
    async fn test_local_workbook_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("DF.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "atendente").unwrap();
        sheet.write_string(0, 1, "sentimento").unwrap();
        sheet.write_string(1, 0, "Ana").unwrap();
        sheet.write_string(1, 1, "Positivo").unwrap();
        workbook.save(&path).unwrap();

        let outcome = LoaderChain::new()
            .with_source(Arc::new(LocalFileSource::new(path.clone())))
            .load()
            .await;
        assert_eq!(outcome.kind, SourceKind::Local);
        assert_eq!(outcome.dataset.records()[0], CallRecord::new("Ana", "Positivo", ""));
    }

    #[tokio::test]
    async fn test_chain_first_success_wins() {
        let file = csv_file("attendant,sentiment,duration\nAna,Positivo,00:06:00\n");
        let chain = LoaderChain::new()
            .with_source(Arc::new(FailingSource))
            .with_source(Arc::new(LocalFileSource::new(file.path())))
            .with_source(Arc::new(SyntheticSource::new(10, 1)));

        let outcome = chain.load().await;
        assert_eq!(outcome.kind, SourceKind::Local);
        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.notices.len(), 1);
        assert!(outcome.notices[0].contains("failing"));
    }

    #[tokio::test]
    async fn test_chain_falls_back_to_synthetic() {
        let config = SourceConfig {
            url: Some("http://127.0.0.1:1/sac.csv".into()),
            local_path: Some(PathBuf::from("/nonexistent/sac.csv")),
            timeout_secs: 2,
            synthetic_rows: 12,
            synthetic_seed: 3,
        };
        let chain = LoaderChain::from_config(&config);
        assert_eq!(chain.source_names().len(), 3);

        let outcome = chain.load().await;
        assert_eq!(outcome.kind, SourceKind::Synthetic);
        assert_eq!(outcome.dataset.len(), 12);
        assert!(outcome.notices.iter().any(|n| n.contains("remote")));
        assert!(outcome.notices.iter().any(|n| n.contains("local file")));
        assert!(outcome.notices.iter().any(|n| n.contains("synthetic")));
    }

    #[tokio::test]
    async fn test_chain_skips_empty_dataset() {
        let file = csv_file("attendant,sentiment,duration\n");
        let chain = LoaderChain::new()
            .with_source(Arc::new(LocalFileSource::new(file.path())))
            .with_source(Arc::new(SyntheticSource::new(5, 1)));

        let outcome = chain.load().await;
        assert_eq!(outcome.kind, SourceKind::Synthetic);
        assert!(outcome.notices[0].contains("no usable rows"));
    }

    #[tokio::test]
    async fn test_chain_never_fails() {
        let chain = LoaderChain::new().with_source(Arc::new(FailingSource));
        let outcome = chain.load().await;
        assert_eq!(outcome.kind, SourceKind::None);
        assert!(outcome.dataset.is_empty());
        assert_eq!(outcome.notices.len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_rows_become_notice() {
        let file = csv_file("attendant,sentiment,duration\nAna,Positivo,00:06:00\n,Neutro,00:01:00\n");
        let chain = LoaderChain::new().with_source(Arc::new(LocalFileSource::new(file.path())));
        let outcome = chain.load().await;
        assert_eq!(outcome.dataset.len(), 1);
        assert!(outcome.notices[0].contains("Dropped 1 rows"));
    }
}
