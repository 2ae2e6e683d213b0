use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_token: String,
    pub host: IpAddr,
    pub port: u16,
    pub site_base_url: String,
    pub sitemap_url: Option<String>,
    pub daily_quota: i64,
    pub batch_size: i64,
    pub endpoint_url: String,
    pub service_account_file: Option<String>,
    pub access_token: Option<String>,
    pub worker_interval_secs: u64,
    pub log_level: String,
}

const GOOGLE_PUBLISH_URL: &str =
    "https://indexing.googleapis.com/v3/urlNotifications:publish";

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let api_token = env_required("INDEXPING_API_TOKEN")?;

        let host: IpAddr = env_or("INDEXPING_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid INDEXPING_HOST: {e}"))?;

        let port: u16 = env_or("INDEXPING_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid INDEXPING_PORT: {e}"))?;

        let site_base_url = env_required("INDEXPING_SITE_BASE_URL")?;
        let sitemap_url = std::env::var("INDEXPING_SITEMAP_URL").ok();

        let daily_quota: i64 = env_or("INDEXPING_DAILY_QUOTA", "200")
            .parse()
            .map_err(|e| format!("Invalid INDEXPING_DAILY_QUOTA: {e}"))?;

        let batch_size: i64 = env_or("INDEXPING_BATCH_SIZE", "10")
            .parse()
            .map_err(|e| format!("Invalid INDEXPING_BATCH_SIZE: {e}"))?;

        let endpoint_url = env_or("INDEXPING_ENDPOINT_URL", GOOGLE_PUBLISH_URL);

        let service_account_file = std::env::var("INDEXPING_SERVICE_ACCOUNT_FILE").ok();
        let access_token = std::env::var("INDEXPING_ACCESS_TOKEN").ok();

        let worker_interval_secs: u64 = env_or("INDEXPING_WORKER_INTERVAL_SECS", "0")
            .parse()
            .map_err(|e| format!("Invalid INDEXPING_WORKER_INTERVAL_SECS: {e}"))?;

        let log_level = env_or("INDEXPING_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            api_token,
            host,
            port,
            site_base_url,
            sitemap_url,
            daily_quota,
            batch_size,
            endpoint_url,
            service_account_file,
            access_token,
            worker_interval_secs,
            log_level,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
