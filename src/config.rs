use serde::Deserialize;

const DEFAULT_REGULATOR_BASE_URL: &str = "https://register.fca.org.uk/services/V0.1";
const DEFAULT_REGISTRY_BASE_URL: &str = "https://api.company-information.service.gov.uk";
const DEFAULT_BUSINESS_DATA_BASE_URL: &str = "https://direct.dnb.com";
const DEFAULT_SCREENING_BASE_URL: &str = "https://sandbox.lexisnexis.com/bridger/ScreeningService";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub regulator_base_url: String,
    pub regulator_auth_email: String,
    pub regulator_auth_key: String,
    pub registry_base_url: String,
    pub registry_api_key: String,
    pub business_data_base_url: String,
    pub business_data_token: String,
    pub business_data_api_version: String,
    pub screening_base_url: String,
    pub screening_user: String,
    pub screening_pass: String,
    pub http_timeout_secs: u64,
    pub search_page_size: u32,
    pub screening_batch_limit: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            regulator_base_url: base_url("FCA_BASE_URL", DEFAULT_REGULATOR_BASE_URL)?,
            regulator_auth_email: required("FCA_AUTH_EMAIL")?,
            regulator_auth_key: required("FCA_AUTH_KEY")?,
            registry_base_url: base_url("COMPANIES_HOUSE_BASE_URL", DEFAULT_REGISTRY_BASE_URL)?,
            registry_api_key: required("COMPANIES_HOUSE_API_KEY")?,
            business_data_base_url: base_url("DNB_BASE_URL", DEFAULT_BUSINESS_DATA_BASE_URL)?,
            business_data_token: required("DNB_API_TOKEN")?,
            business_data_api_version: std::env::var("DNB_API_VERSION")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "5.0".to_string()),
            screening_base_url: base_url("BRIDGER_BASE_URL", DEFAULT_SCREENING_BASE_URL)?,
            screening_user: required("BRIDGER_USER")?,
            screening_pass: required("BRIDGER_PASS")?,
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a whole number of seconds"))
                .and_then(|secs: u64| {
                    if secs == 0 {
                        anyhow::bail!("HTTP_TIMEOUT_SECS must be greater than zero");
                    }
                    Ok(secs)
                })?,
            search_page_size: std::env::var("SEARCH_PAGE_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SEARCH_PAGE_SIZE must be a number"))
                .and_then(|size: u32| {
                    if !(1..=100).contains(&size) {
                        anyhow::bail!("SEARCH_PAGE_SIZE must be between 1 and 100");
                    }
                    Ok(size)
                })?,
            screening_batch_limit: std::env::var("SCREENING_BATCH_LIMIT")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SCREENING_BATCH_LIMIT must be a number"))?,
        };

        // Credentials are never logged
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("FCA Base URL: {}", config.regulator_base_url);
        tracing::debug!("Companies House Base URL: {}", config.registry_base_url);
        tracing::debug!(
            "D&B Base URL: {} (API V{})",
            config.business_data_base_url,
            config.business_data_api_version
        );
        tracing::debug!("Bridger Base URL: {}", config.screening_base_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))
        .and_then(|value| {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            Ok(value)
        })
}

fn base_url(name: &str, default: &str) -> anyhow::Result<String> {
    let raw = std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string());

    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }

    Ok(raw.trim().trim_end_matches('/').to_string())
}
