//!
//! src/config.rs  Andrew Belles  Oct 2nd, 2025
//!
//! Reads the environment once at start and assembles every knob the
//! harvester, reconciler and sink need into an AppConfig
//!

use std::{path::PathBuf, str::FromStr, time};

use url::Url;

use crate::errors::HarvestError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

/// Constants for harvest passes
pub const RETRY_BUDGET: u32 = 10;
pub const COOLDOWN_RATE_LIMITED_MS: u64 = 5000;
pub const COOLDOWN_UNAVAILABLE_MS: u64 = 3000;
pub const COOLDOWN_DEFAULT_MS: u64 = 10000;
pub const PLAYLIST_QUIESCENCE_MS: u64 = 8500;
pub const FEATURES_QUIESCENCE_MS: u64 = 20000;
pub const DISCOVERY_INTERVAL_MS: u64 = 20000;
pub const FEATURE_BATCH_SIZE: usize = 50;
pub const FEATURE_BATCH_MAX: usize = 100;

/// Wrapper over env::var to return an invalid enviroment var error
fn env_check(s: &str) -> Result<String, HarvestError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(HarvestError::Config(format!("{s} was not set"))),
    }
}

fn env_present(s: &str) -> Option<String> {
    std::env::var(s).ok().filter(|v| !v.trim().is_empty())
}

/// Parses an override, falling back to default on absence or garbage
fn env_or<T: FromStr>(s: &str, default: T) -> T {
    env_present(s)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_millis(s: &str, default: time::Duration) -> time::Duration {
    time::Duration::from_millis(env_or(s, default.as_millis() as u64))
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

///
/// One client-credentials pair per independent identity
///
#[derive(Clone)]
pub struct ClientSecretPair {
    pub client_id: String,
    pub client_secret: String
}

impl std::fmt::Debug for ClientSecretPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretPair")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub pairs: Vec<ClientSecretPair>
}

/// Reads SPOTIFY_CLIENT_ID_1.. until the first gap, else the unnumbered pair
fn build_credentials() -> Result<CredentialConfig, HarvestError> {
    let mut pairs = Vec::new();
    for n in 1.. {
        let Some(client_id) = env_present(&format!("SPOTIFY_CLIENT_ID_{n}")) else {
            break;
        };
        let client_secret = env_check(&format!("SPOTIFY_CLIENT_SECRET_{n}"))?;
        pairs.push(ClientSecretPair { client_id, client_secret });
    }

    if pairs.is_empty() {
        if let Some(client_id) = env_present("SPOTIFY_CLIENT_ID") {
            let client_secret = env_check("SPOTIFY_CLIENT_SECRET")?;
            pairs.push(ClientSecretPair { client_id, client_secret });
        }
    }

    if pairs.is_empty() {
        return Err(HarvestError::Config(
            "no spotify credentials (SPOTIFY_CLIENT_ID_1 or SPOTIFY_CLIENT_ID)".to_string()
        ));
    }
    Ok( CredentialConfig { pairs } )
}

/// Configuration that Spotify expects when hitting endpoints
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub token_url: Url,
    pub api_base: Url,
    pub market: String,
    pub locale: String,
    pub category_limit: u32,
    pub playlist_limit: u32,
    pub playlist_max_pages: u32
}

fn build_spotify() -> Result<SpotifyConfig, HarvestError> {
    // form urls
    let token_url = std::env::var("SPOTIFY_TOKEN_URL")
        .unwrap_or_else(|_| "https://accounts.spotify.com/api/token".to_string());

    let api_base  = std::env::var("SPOTIFY_API_BASE")
        .unwrap_or_else(|_| "https://api.spotify.com/v1/".to_string());

    let token_url = Url::parse(&token_url)
        .map_err(|e| HarvestError::Config(format!("SPOTIFY_TOKEN_URL invalid {e}")))?;

    let mut api_base = Url::parse(&api_base)
        .map_err(|e| HarvestError::Config(format!("SPOTIFY_API_BASE invalid {e}")))?;

    // ensure valid https and hostname for both urls
    ensure_https(&token_url).map_err(HarvestError::Config)?;
    ensure_https(&api_base).map_err(HarvestError::Config)?;
    ensure_host(&token_url, "accounts.spotify.com").map_err(HarvestError::Config)?;
    ensure_host(&api_base, "api.spotify.com").map_err(HarvestError::Config)?;
    ensure_trailing_slash(&mut api_base);

    Ok( SpotifyConfig {
        token_url,
        api_base,
        market: env_or("SPOTIFY_MARKET", "US".to_string()),
        locale: env_or("SPOTIFY_LOCALE", "en".to_string()),
        category_limit: env_or("SPOTIFY_CATEGORY_LIMIT", 50_u32).clamp(1, 50),
        playlist_limit: env_or("SPOTIFY_PLAYLIST_LIMIT", 50_u32).clamp(1, 50),
        playlist_max_pages: env_or("SPOTIFY_PLAYLIST_MAX_PAGES", 1_u32).max(1)
    })
}

///
/// Configuration for Http timeouts, pooling, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS
        }
    }
}

fn build_http() -> HttpConfig {
    let d = HttpConfig::default();
    HttpConfig {
        timeout: env_millis("HTTP_TIMEOUT_MS", d.timeout),
        connect_timeout: env_millis("HTTP_CONNECT_TIMEOUT_MS", d.connect_timeout),
        pool_max_idle_per_host: env_or("HTTP_POOL_MAX_IDLE", d.pool_max_idle_per_host),
        pool_idle_timeout: env_millis("HTTP_POOL_IDLE_TIMEOUT_MS", d.pool_idle_timeout),
        max_redirects: env_or("HTTP_MAX_REDIRECTS", d.max_redirects)
    }
}

///
/// Cooldowns, quiescence and budgets applied per credential during a pass
///
#[derive(Debug, Clone)]
pub struct CooldownConfig {
    pub rate_limited: time::Duration,
    pub unavailable: time::Duration,
    pub unclassified: time::Duration
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            rate_limited: time::Duration::from_millis(COOLDOWN_RATE_LIMITED_MS),
            unavailable: time::Duration::from_millis(COOLDOWN_UNAVAILABLE_MS),
            unclassified: time::Duration::from_millis(COOLDOWN_DEFAULT_MS)
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub retry_budget: u32,
    pub cooldowns: CooldownConfig,
    pub playlist_quiescence: time::Duration,
    pub features_quiescence: time::Duration,
    pub discovery_interval: time::Duration,
    pub credential_min_interval: time::Duration,
    pub feature_batch_size: usize,
    pub pass_gap: time::Duration
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            retry_budget: RETRY_BUDGET,
            cooldowns: CooldownConfig::default(),
            playlist_quiescence: time::Duration::from_millis(PLAYLIST_QUIESCENCE_MS),
            features_quiescence: time::Duration::from_millis(FEATURES_QUIESCENCE_MS),
            discovery_interval: time::Duration::from_millis(DISCOVERY_INTERVAL_MS),
            credential_min_interval: time::Duration::ZERO,
            feature_batch_size: FEATURE_BATCH_SIZE,
            pass_gap: time::Duration::ZERO
        }
    }
}

fn build_harvest() -> HarvestConfig {
    let d = HarvestConfig::default();
    HarvestConfig {
        retry_budget: env_or("HARVEST_RETRY_BUDGET", d.retry_budget),
        cooldowns: CooldownConfig {
            rate_limited: env_millis("HARVEST_COOLDOWN_429_MS", d.cooldowns.rate_limited),
            unavailable: env_millis("HARVEST_COOLDOWN_UNAVAILABLE_MS", d.cooldowns.unavailable),
            unclassified: env_millis("HARVEST_COOLDOWN_DEFAULT_MS", d.cooldowns.unclassified)
        },
        playlist_quiescence: env_millis("HARVEST_PLAYLIST_QUIESCENCE_MS", d.playlist_quiescence),
        features_quiescence: env_millis("HARVEST_FEATURES_QUIESCENCE_MS", d.features_quiescence),
        discovery_interval: env_millis("HARVEST_DISCOVERY_INTERVAL_MS", d.discovery_interval),
        credential_min_interval: env_millis(
            "HARVEST_CREDENTIAL_MIN_INTERVAL_MS", d.credential_min_interval
        ),
        feature_batch_size: env_or("HARVEST_FEATURE_BATCH_SIZE", d.feature_batch_size)
            .clamp(1, FEATURE_BATCH_MAX),
        pass_gap: time::Duration::from_secs(env_or("HARVEST_PASS_GAP_SECS", d.pass_gap.as_secs()))
    }
}

///
/// Configuration for where reconciled rows and raw record sets land
///
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub output_root: PathBuf,
    pub zstd_level: i32,
    pub youtube_records: Option<PathBuf>
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./data"),
            zstd_level: 3,
            youtube_records: None
        }
    }
}

fn build_persistence() -> PersistenceConfig {
    let d = PersistenceConfig::default();
    PersistenceConfig {
        output_root: env_present("HARVEST_OUTPUT_ROOT")
            .map(PathBuf::from)
            .unwrap_or(d.output_root),
        zstd_level: env_or("HARVEST_ZSTD_LEVEL", d.zstd_level).clamp(0, 21),
        youtube_records: env_present("YOUTUBE_RECORDS_PATH").map(PathBuf::from)
    }
}

///
/// Configuration for Logger
///
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,rs_harvester=debug,reqwest=warn".to_string(),
            with_ansi: false,
            include_file_line: true,
            include_target: true
        }
    }
}

fn build_logging() -> LoggingConfig {
    let d = LoggingConfig::default();
    LoggingConfig {
        filter_directives: env_or("HARVEST_LOG", d.filter_directives),
        with_ansi: env_or("HARVEST_LOG_ANSI", d.with_ansi),
        include_file_line: env_or("HARVEST_LOG_FILE_LINE", d.include_file_line),
        include_target: env_or("HARVEST_LOG_TARGET", d.include_target)
    }
}

///
/// AppConfig which holds everything a reconciliation pass needs
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: CredentialConfig,
    pub spotify: SpotifyConfig,
    pub http: HttpConfig,
    pub harvest: HarvestConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, HarvestError> {
    dotenvy::dotenv().ok();

    let credentials = build_credentials()?;
    let spotify     = build_spotify()?;
    let http        = build_http();
    let harvest     = build_harvest();
    let persistence = build_persistence();
    let logging     = build_logging();

    Ok( AppConfig { credentials, spotify, http, harvest, persistence, logging } )
}
