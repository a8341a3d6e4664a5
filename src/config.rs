use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Shared secret for inbound webhook signatures. Absence is reported per request.
    pub webhook_secret: Option<String>,
    pub pay_api_url: String,
    pub pay_client_id: String,
    pub pay_client_secret: String,
    pub fraud_api_url: String,
    pub fraud_username: String,
    pub fraud_password: String,
    /// ISO-2 country used when no source yields one.
    pub default_country: Option<String>,
    pub platform_id: String,
    pub seller_id: String,
}

fn required(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}

fn required_url(name: &str) -> anyhow::Result<String> {
    let url = required(name)?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            webhook_secret: optional("PAY_WEBHOOK_SECRET"),
            pay_api_url: required_url("PAY_API_URL")?,
            pay_client_id: required("PAY_CLIENT_ID")?,
            pay_client_secret: required("PAY_CLIENT_SECRET")?,
            fraud_api_url: required_url("FRAUD_API_URL")?,
            fraud_username: required("FRAUD_USERNAME")?,
            fraud_password: required("FRAUD_PASSWORD")?,
            default_country: optional("DEFAULT_COUNTRY")
                .map(|country| {
                    let country = country.trim().to_uppercase();
                    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
                        anyhow::bail!("DEFAULT_COUNTRY must be a 2-letter ISO code");
                    }
                    Ok(country)
                })
                .transpose()?,
            platform_id: optional("SCORING_PLATFORM_ID")
                .unwrap_or_else(|| "PayRepublic".to_string()),
            seller_id: optional("SCORING_SELLER_ID").unwrap_or_else(|| "PayRepublic".to_string()),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        if config.webhook_secret.is_none() {
            tracing::error!(
                "PAY_WEBHOOK_SECRET is not set: every signed webhook will be rejected with 500"
            );
        }
        tracing::debug!("Identity Provider URL: {}", config.pay_api_url);
        tracing::debug!("Scoring Provider URL: {}", config.fraud_api_url);
        tracing::debug!("Default country: {:?}", config.default_country);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
