//! Redis-backed influencer store.

use copytrade_core::{BoxFuture, Influencer};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};

/// Read access to the configured influencer set.
pub trait InfluencerSource: Send + Sync {
    fn list(&self) -> BoxFuture<'_, RegistryResult<Vec<Influencer>>>;

    /// Release the underlying connection.
    fn close(&self) {}
}

pub type DynInfluencerSource = Arc<dyn InfluencerSource>;

/// Redis connection and key settings.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// `host:port`.
    pub addr: String,
    /// Empty means no AUTH.
    pub password: String,
    pub db: i64,
    pub set_key: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:6379".to_string(),
            password: String::new(),
            db: 0,
            set_key: "ingestion:influencers:primary".to_string(),
        }
    }
}

/// Build connection parameters from `host:port`, password and DB index.
pub fn connection_info(config: &RegistryConfig) -> RegistryResult<redis::ConnectionInfo> {
    let (host, port) = config
        .addr
        .rsplit_once(':')
        .ok_or_else(|| RegistryError::Config(format!("redis addr {:?} is not host:port", config.addr)))?;
    if host.is_empty() {
        return Err(RegistryError::Config(format!(
            "redis addr {:?} has an empty host",
            config.addr
        )));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| RegistryError::Config(format!("invalid redis port in {:?}", config.addr)))?;
    if config.db < 0 {
        return Err(RegistryError::Config(format!(
            "redis db must be non-negative, got {}",
            config.db
        )));
    }

    Ok(redis::ConnectionInfo {
        addr: redis::ConnectionAddr::Tcp(host.to_string(), port),
        redis: redis::RedisConnectionInfo {
            db: config.db,
            password: (!config.password.is_empty()).then(|| config.password.clone()),
            ..Default::default()
        },
    })
}

/// Parse set members into influencers.
///
/// Malformed JSON and entries without an address are skipped. The result is
/// ordered by descending priority, then id.
pub fn parse_members(set_key: &str, members: &[String]) -> Vec<Influencer> {
    let mut influencers = Vec::with_capacity(members.len());
    for member in members {
        let influencer = match serde_json::from_str::<Influencer>(member) {
            Ok(inf) => inf.normalized(),
            Err(e) => {
                warn!(set_key, error = %e, "Skipping malformed influencer entry");
                continue;
            }
        };
        if influencer.address.is_empty() {
            debug!(set_key, id = %influencer.id, "Skipping influencer without address");
            continue;
        }
        influencers.push(influencer);
    }

    influencers.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
    influencers
}

fn require_key(set_key: &str) -> RegistryResult<()> {
    if set_key.trim().is_empty() {
        return Err(RegistryError::Config(
            "influencer set key is not configured".to_string(),
        ));
    }
    Ok(())
}

/// Influencer set stored as JSON members of a Redis SET.
pub struct RedisInfluencerRegistry {
    conn: parking_lot::Mutex<Option<MultiplexedConnection>>,
    set_key: String,
}

impl RedisInfluencerRegistry {
    /// Connect to Redis. Fails fast on bad configuration or an unreachable server.
    pub async fn connect(config: &RegistryConfig) -> RegistryResult<Self> {
        require_key(&config.set_key)?;
        let info = connection_info(config)?;
        let client = redis::Client::open(info)?;
        let conn = client.get_multiplexed_async_connection().await?;

        info!(addr = %config.addr, db = config.db, set_key = %config.set_key, "Connected to Redis");

        Ok(Self {
            conn: parking_lot::Mutex::new(Some(conn)),
            set_key: config.set_key.clone(),
        })
    }

    fn connection(&self) -> RegistryResult<MultiplexedConnection> {
        self.conn.lock().clone().ok_or(RegistryError::Closed)
    }

    /// Read every member of the set.
    pub async fn list_influencers(&self) -> RegistryResult<Vec<Influencer>> {
        require_key(&self.set_key)?;
        let mut conn = self.connection()?;
        let members: Vec<String> = conn.smembers(&self.set_key).await?;
        let influencers = parse_members(&self.set_key, &members);
        debug!(
            set_key = %self.set_key,
            members = members.len(),
            loaded = influencers.len(),
            "Loaded influencers"
        );
        Ok(influencers)
    }

    /// Add an influencer. Returns false when an identical member already exists.
    pub async fn add(&self, influencer: &Influencer) -> RegistryResult<bool> {
        require_key(&self.set_key)?;
        let influencer = influencer.clone().normalized();
        influencer.validate()?;

        let payload = serde_json::to_string(&influencer)?;
        let mut conn = self.connection()?;
        let added: i64 = conn.sadd(&self.set_key, payload).await?;
        info!(set_key = %self.set_key, id = %influencer.id, added = added > 0, "Influencer stored");
        Ok(added > 0)
    }
}

impl InfluencerSource for RedisInfluencerRegistry {
    fn list(&self) -> BoxFuture<'_, RegistryResult<Vec<Influencer>>> {
        Box::pin(self.list_influencers())
    }

    fn close(&self) {
        if self.conn.lock().take().is_some() {
            info!(set_key = %self.set_key, "Redis connection closed");
        }
    }
}

/// Fixed influencer list, for tests and local runs.
#[derive(Debug, Default)]
pub struct StaticInfluencerSource {
    influencers: Vec<Influencer>,
    failure: Option<String>,
    closed: std::sync::atomic::AtomicBool,
}

impl StaticInfluencerSource {
    pub fn new(influencers: Vec<Influencer>) -> Self {
        Self {
            influencers,
            ..Default::default()
        }
    }

    /// A source whose `list` always fails.
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Default::default()
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl InfluencerSource for StaticInfluencerSource {
    fn list(&self) -> BoxFuture<'_, RegistryResult<Vec<Influencer>>> {
        Box::pin(async move {
            if let Some(reason) = &self.failure {
                return Err(RegistryError::Unavailable(reason.clone()));
            }
            Ok(self.influencers.clone())
        })
    }

    fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}
