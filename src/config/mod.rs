//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, FlushArgs, FlushTarget, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use apalis_cron::Schedule;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::engine::EngineOptions;
use crate::application::jobs::{
    DEFAULT_DEBOUNCE, DEFAULT_FAST_PHASE_PAGES, DEFAULT_POLL_INTERVAL, DEFAULT_REWARM_CRON,
    DEFAULT_SLOW_PHASE_DELAY, SchedulerOptions, rewarm_schedule,
};
use crate::application::listing::ListingOptions;
use crate::application::pagination::DEFAULT_PAGE_SIZE;
use crate::application::providers::VirtualCategory;
use crate::cache::CacheConfig;
use crate::domain::slug::parse_category_slug;
use crate::presentation::views::DEFAULT_EMPTY_MESSAGE;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub listing: ListingSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub group: String,
    pub capacity: NonZeroUsize,
    pub meta_ttl: Duration,
    pub categories_ttl: Duration,
    pub root_ttl: Duration,
    pub invalidation_fallback_pages: u32,
    pub invalidation_margin_pages: u32,
}

#[derive(Debug, Clone)]
pub struct ListingSettings {
    pub page_size: NonZeroU32,
    pub content_types: Vec<String>,
    pub link_prefix: String,
    pub item_link_prefix: String,
    pub empty_message: String,
    pub virtual_categories: Vec<VirtualCategory>,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub debounce: Duration,
    pub slow_phase_delay: Duration,
    pub fast_phase_pages: NonZeroU32,
    pub poll_interval: Duration,
    pub warm_on_startup: bool,
    /// `None` disables the periodic rewarm.
    pub rewarm: Option<Schedule>,
}

impl Settings {
    /// Engine wiring derived from the cache, listing and scheduler sections.
    pub fn engine_options(&self) -> EngineOptions {
        let listing = ListingOptions {
            page_size: self.listing.page_size.get(),
            link_prefix: self.listing.link_prefix.clone(),
            item_link_prefix: self.listing.item_link_prefix.clone(),
            ..ListingOptions::default()
        };
        EngineOptions {
            cache: CacheConfig::from(&self.cache),
            listing,
            content_types: self.listing.content_types.clone(),
            virtual_categories: self.listing.virtual_categories.clone(),
            scheduler: SchedulerOptions {
                debounce: self.scheduler.debounce,
                slow_phase_delay: self.scheduler.slow_phase_delay,
                fast_phase_pages: self.scheduler.fast_phase_pages.get(),
            },
            poll_interval: self.scheduler.poll_interval,
            empty_message: self.listing.empty_message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Flush(_)) | None => {}
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    listing: RawListingSettings,
    scheduler: RawSchedulerSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(size) = overrides.page_size {
            self.listing.page_size = Some(size);
        }
        if let Some(seconds) = overrides.debounce_seconds {
            self.scheduler.debounce_seconds = Some(seconds);
        }
        if let Some(warm) = overrides.warm_on_startup {
            self.scheduler.warm_on_startup = Some(warm);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            listing,
            scheduler,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            listing: build_listing_settings(listing)?,
            scheduler: build_scheduler_settings(scheduler)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;
    if public_addr == admin_addr {
        return Err(LoadError::invalid(
            "server.admin_port",
            "admin listener must not share the public address",
        ));
    }

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let defaults = CacheConfig::default();

    let group = cache.group.unwrap_or(defaults.group);
    if group.trim().is_empty() {
        return Err(LoadError::invalid("cache.group", "must not be empty"));
    }

    let capacity = NonZeroUsize::new(cache.capacity.unwrap_or(defaults.capacity))
        .ok_or_else(|| LoadError::invalid("cache.capacity", "must be greater than zero"))?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(defaults.enabled),
        group,
        capacity,
        meta_ttl: Duration::from_secs(cache.meta_ttl_seconds.unwrap_or(defaults.meta_ttl_seconds)),
        categories_ttl: Duration::from_secs(
            cache
                .categories_ttl_seconds
                .unwrap_or(defaults.categories_ttl_seconds),
        ),
        root_ttl: Duration::from_secs(cache.root_ttl_seconds.unwrap_or(defaults.root_ttl_seconds)),
        invalidation_fallback_pages: cache
            .invalidation_fallback_pages
            .unwrap_or(defaults.invalidation_fallback_pages),
        invalidation_margin_pages: cache
            .invalidation_margin_pages
            .unwrap_or(defaults.invalidation_margin_pages),
    })
}

fn build_listing_settings(listing: RawListingSettings) -> Result<ListingSettings, LoadError> {
    let defaults = ListingOptions::default();

    let page_size = non_zero_u32(
        listing.page_size.unwrap_or(DEFAULT_PAGE_SIZE).into(),
        "listing.page_size",
    )?;

    let content_types: Vec<String> = listing
        .content_types
        .unwrap_or_else(|| vec!["post".to_string()])
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect();
    if content_types.is_empty() {
        return Err(LoadError::invalid(
            "listing.content_types",
            "at least one content type must be listed",
        ));
    }

    let mut virtual_categories = Vec::with_capacity(listing.virtual_categories.len());
    for category in listing.virtual_categories {
        let slug = parse_category_slug(&category.slug)
            .map_err(|err| LoadError::invalid("listing.virtual_categories.slug", err.to_string()))?;
        if category.content_type.trim().is_empty() {
            return Err(LoadError::invalid(
                "listing.virtual_categories.content_type",
                format!("virtual category `{slug}` has no content type"),
            ));
        }
        virtual_categories.push(VirtualCategory {
            name: if category.name.trim().is_empty() {
                slug.clone()
            } else {
                category.name
            },
            slug,
            content_type: category.content_type.trim().to_string(),
        });
    }

    Ok(ListingSettings {
        page_size,
        content_types,
        link_prefix: listing
            .link_prefix
            .map(|prefix| prefix.trim_end_matches('/').to_string())
            .unwrap_or(defaults.link_prefix),
        item_link_prefix: listing
            .item_link_prefix
            .map(|prefix| prefix.trim_end_matches('/').to_string())
            .unwrap_or(defaults.item_link_prefix),
        empty_message: listing
            .empty_message
            .unwrap_or_else(|| DEFAULT_EMPTY_MESSAGE.to_string()),
        virtual_categories,
    })
}

fn build_scheduler_settings(
    scheduler: RawSchedulerSettings,
) -> Result<SchedulerSettings, LoadError> {
    let fast_phase_pages = non_zero_u32(
        scheduler
            .fast_phase_pages
            .unwrap_or(DEFAULT_FAST_PHASE_PAGES)
            .into(),
        "scheduler.fast_phase_pages",
    )?;

    let poll_interval = match scheduler.poll_interval_ms {
        Some(0) => {
            return Err(LoadError::invalid(
                "scheduler.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        Some(ms) => Duration::from_millis(ms),
        None => DEFAULT_POLL_INTERVAL,
    };

    let expression = scheduler
        .rewarm_cron
        .unwrap_or_else(|| DEFAULT_REWARM_CRON.to_string());
    let expression = expression.trim();
    let rewarm = if expression.is_empty() || expression.eq_ignore_ascii_case("off") {
        None
    } else {
        Some(
            rewarm_schedule(expression)
                .map_err(|reason| LoadError::invalid("scheduler.rewarm_cron", reason))?,
        )
    };

    Ok(SchedulerSettings {
        debounce: scheduler
            .debounce_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DEBOUNCE),
        slow_phase_delay: scheduler
            .slow_phase_delay_seconds
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SLOW_PHASE_DELAY),
        fast_phase_pages,
        poll_interval,
        warm_on_startup: scheduler.warm_on_startup.unwrap_or(true),
        rewarm,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    group: Option<String>,
    capacity: Option<usize>,
    meta_ttl_seconds: Option<u64>,
    categories_ttl_seconds: Option<u64>,
    root_ttl_seconds: Option<u64>,
    invalidation_fallback_pages: Option<u32>,
    invalidation_margin_pages: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawListingSettings {
    page_size: Option<u32>,
    content_types: Option<Vec<String>>,
    link_prefix: Option<String>,
    item_link_prefix: Option<String>,
    empty_message: Option<String>,
    virtual_categories: Vec<VirtualCategory>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchedulerSettings {
    debounce_seconds: Option<u64>,
    slow_phase_delay_seconds: Option<u64>,
    fast_phase_pages: Option<u32>,
    poll_interval_ms: Option<u64>,
    warm_on_startup: Option<bool>,
    rewarm_cron: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
