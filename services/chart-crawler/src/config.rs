use serde::Deserialize;
use url::Url;
use std::{net::SocketAddr, path::PathBuf, time};
use crate::CrawlerError;
use crate::matcher::{NameRule, Roster};
use crate::retention::{DEFAULT_TRACKED_WINDOW_DAYS, MAX_TRACKED_WINDOW_DAYS};

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 20000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 5000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;
pub const HTTP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const CRAWL_INTERVAL: u64 = 3600;

/// Curated roster used when no ARTISTS_FILE is given
pub const DEFAULT_ARTISTS: &[&str] = &[
    "10CM", "(G)I-DLE", "A train to autumn", "ADORA", "ADYA", "aespa", "AKMU", "Apink", "ARIAZ",
    "BABYMONSTER", "BADVILLAIN", "Baek A Yeon", "BBGIRLS", "Billlie", "BLACKPINK", "BOL4",
    "Brave Girls", "BTS", "BVNDIT", "Choi Yoo jung", "Chung Ha", "CLASS : y", "CLC", "CSR",
    "DAY6", "Dreamcatcher", "EL7Z UP", "Ellui", "Eunha", "EVERGLOW", "FAVORITE", "FIFTY FIFTY",
    "fromis_9", "Geenius", "GFRIEND", "Girls Planet 999", "GOT the beat", "GREE", "IU",
    "KyoungSeo", "Kyung Dasom", "LA LIMA", "LE SSERAFIM", "LEE CHAE YEON", "LEE HI", "LIGHTSUM",
    "lilli lilli", "Lim Kim", "LIMELIGHT", "Limesoda", "Lisa", "LOONA", "LUNARSOLAR", "LUNCH",
    "Mamamoo", "mimiirose", "Minnie", "Miyeon", "MOMOLAND", "Moonbyul", "MRCH", "NANA", "NAYEON",
    "NewJeans", "NMIXX", "NND", "OH MY GIRL", "PIXY", "PLAYBACK", "PRODUCE 48", "Punch",
    "PURPLE KISS", "Qeendom2", "QWER", "Red Velvet", "RESCENE", "Rocket Punch", "Rolling Quartz",
    "Rosé", "Rothy", "Ryu Su Jeong", "Saebit", "SECRET NUMBER", "Seo Dahyun", "SEULGI", "Shaun",
    "SinB", "siso", "Solar", "Somi", "SOOJIN", "Soyeon", "STAYC", "Suzy", "SWAN", "T-ara",
    "TAEYEON", "TRI.BE", "tripleS", "TWICE", "TZUYU", "Umji", "VIVIZ", "Weeekly", "Weki Meki",
    "Wendy", "Wheein", "WINTER", "WJSN", "Woo Yerin", "woo!ah!", "WSG Wannabe", "X1", "XG",
    "Yein", "YENA", "Yerin", "YongYong", "YooA", "Younha", "Yuju", "Yunsae", "Yuqi",
];

/// Wrapper over env::var that treats blank values as unset
fn env_opt(s: &str) -> Option<String> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_or(s: &str, default: &str) -> String {
    env_opt(s).unwrap_or_else(|| default.to_string())
}

fn env_to_u64(s: &str, default: u64) -> u64 {
    env_opt(s).and_then(|v| v.parse::<u64>().ok()).unwrap_or(default)
}

fn env_flag(s: &str) -> bool {
    matches!(env_opt(s).as_deref(), Some("1" | "true" | "yes" | "on"))
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

///
/// Configuration for Http timeouts and identity sent to the listing site
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub max_redirects: u8,
    pub user_agent: String
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
            user_agent: HTTP_USER_AGENT.to_string()
        }
    }
}

fn build_http() -> HttpConfig {
    let defaults = HttpConfig::default();
    HttpConfig {
        timeout: time::Duration::from_millis(env_to_u64("HTTP_TIMEOUT_MS", HTTP_TIMEOUT)),
        connect_timeout: time::Duration::from_millis(
            env_to_u64("HTTP_CONNECT_TIMEOUT_MS", HTTP_CONNECT_TIMEOUT)
        ),
        user_agent: env_or("HTTP_USER_AGENT", &defaults.user_agent),
        ..defaults
    }
}

///
/// Where the newest-songs listing lives and how detail links are formed
///
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub listing_url: Url,    // https://www.genie.co.kr/newest/song
    pub detail_base: Url     // song id is appended as ?xgnm=<id>
}

fn build_source() -> Result<SourceConfig, CrawlerError> {
    let listing_url = env_or("LISTING_URL", "https://www.genie.co.kr/newest/song");
    let detail_base = env_or("DETAIL_URL_BASE", "https://www.genie.co.kr/detail/songInfo");

    let listing_url = Url::parse(&listing_url)
        .map_err(|e| CrawlerError::Config(format!("LISTING_URL invalid {e}")))?;
    let detail_base = Url::parse(&detail_base)
        .map_err(|e| CrawlerError::Config(format!("DETAIL_URL_BASE invalid {e}")))?;

    ensure_https(&listing_url).map_err(CrawlerError::Config)?;

    Ok( SourceConfig { listing_url, detail_base } )
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_file: PathBuf
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { data_file: PathBuf::from("songs_data.json") }
    }
}

///
/// Roster file layout, e.g.
/// { "artists": ["IU", ...], "name_rules": [{"term": "IU", "display": "아이유"}] }
///
#[derive(Debug, Clone, Deserialize)]
struct RosterFile {
    artists: Vec<String>,
    #[serde(default)]
    name_rules: Vec<NameRule>
}

pub fn default_roster() -> Roster {
    Roster::new(DEFAULT_ARTISTS.iter().map(|s| s.to_string()).collect(), Vec::new())
}

pub fn parse_roster(raw: &str) -> Result<Roster, CrawlerError> {
    let file: RosterFile = serde_json::from_str(raw)
        .map_err(|e| CrawlerError::Config(format!("roster file invalid: {e}")))?;
    Ok( Roster::new(file.artists, file.name_rules) )
}

fn build_roster() -> Result<Roster, CrawlerError> {
    match env_opt("ARTISTS_FILE") {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| CrawlerError::Config(format!("ARTISTS_FILE {path}: {e}")))?;
            parse_roster(&raw)
        }
        None => Ok(default_roster()),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    pub tracked_window_days: i64
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { tracked_window_days: DEFAULT_TRACKED_WINDOW_DAYS }
    }
}

/// Unset keeps the default; anything else must be a day count in range
fn parse_retention_days(raw: Option<&str>) -> Result<i64, CrawlerError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TRACKED_WINDOW_DAYS);
    };
    let days = raw.trim().parse::<i64>()
        .map_err(|e| CrawlerError::Config(format!("TRACKED_RETENTION_DAYS invalid {e}")))?;
    if !(1..=MAX_TRACKED_WINDOW_DAYS).contains(&days) {
        return Err(CrawlerError::Config(format!(
            "TRACKED_RETENTION_DAYS must be 1..={MAX_TRACKED_WINDOW_DAYS}, got {days}"
        )));
    }
    Ok(days)
}

fn build_retention() -> Result<RetentionConfig, CrawlerError> {
    let raw = env_opt("TRACKED_RETENTION_DAYS");
    Ok( RetentionConfig { tracked_window_days: parse_retention_days(raw.as_deref())? } )
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub interval: time::Duration,
    pub bind_addr: SocketAddr
}

fn build_schedule() -> Result<ScheduleConfig, CrawlerError> {
    let bind_addr = env_or("BIND_ADDR", "127.0.0.1:5000")
        .parse::<SocketAddr>()
        .map_err(|e| CrawlerError::Config(format!("BIND_ADDR invalid {e}")))?;
    let interval = time::Duration::from_secs(env_to_u64("CRAWL_INTERVAL_SECS", CRAWL_INTERVAL).max(1));
    Ok( ScheduleConfig { interval, bind_addr } )
}

///
/// Side upload of the data file after a successful cycle
///
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub enabled: bool,
    pub repo_dir: PathBuf,
    pub remote: String,
    pub branch: String
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repo_dir: PathBuf::from("."),
            remote: "origin".to_string(),
            branch: "main".to_string()
        }
    }
}

fn build_sync() -> SyncConfig {
    SyncConfig {
        enabled: env_flag("GIT_SYNC"),
        repo_dir: PathBuf::from(env_or("GIT_SYNC_REPO", ".")),
        remote: env_or("GIT_SYNC_REMOTE", "origin"),
        branch: env_or("GIT_SYNC_BRANCH", "main")
    }
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
    pub log_dir: Option<PathBuf>
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,chart_crawler=debug,reqwest=warn".to_string(),
            format: LogFormat::Json,
            with_ansi: true,
            include_file_line: true,
            include_target: true,
            log_dir: None
        }
    }
}

fn build_logging() -> LoggingConfig {
    let format = match env_opt("LOG_FORMAT").as_deref() {
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::Json,
    };
    let log_dir = env_opt("LOG_DIR").map(PathBuf::from);
    LoggingConfig {
        format,
        with_ansi: log_dir.is_none(),
        log_dir,
        ..LoggingConfig::default()
    }
}

///
/// AppConfig, read once at program start and shared by reference
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub roster: Roster,
    pub retention: RetentionConfig,
    pub schedule: ScheduleConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, CrawlerError> {
    dotenvy::dotenv().ok();

    let http      = build_http();
    let source    = build_source()?;
    let store     = StoreConfig {
        data_file: PathBuf::from(env_or("DATA_FILE", "songs_data.json"))
    };
    let roster    = build_roster()?;
    let retention = build_retention()?;
    let schedule  = build_schedule()?;
    let sync      = build_sync();
    let logging   = build_logging();

    Ok( AppConfig {
        http, source, store, roster, retention, schedule, sync, logging
    } )
}
