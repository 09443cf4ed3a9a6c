use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub stripe: StripeConfig,
    pub ai: AiConfig,
    pub study: StudyConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Enables POST /auth/login, the exchange endpoint called after the upstream OAuth callback
    pub allow_login_exchange: bool,
    pub login_exchange_secret: Option<String>,
    /// Users logging in with these emails are promoted to admin
    pub admin_emails: Vec<String>,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayKind {
    Stripe,
    Dummy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub gateway: GatewayKind,
    pub api_base: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub webhook_tolerance_secs: i64,
    pub lifetime_price_id: Option<String>,
    pub monthly_price_id: Option<String>,
    pub yearly_price_id: Option<String>,
    /// May contain `{CHECKOUT_SESSION_ID}`, which Stripe substitutes
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub default_daily_limit: i32,
    pub default_reset_hour: i32,
    pub request_timeout_secs: u64,
    pub max_questions_per_request: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    pub default_queue_size: usize,
    pub max_queue_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = env::var("PREP_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.server.enable_request_logging = v.parse().unwrap_or(self.server.enable_request_logging);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ALLOW_LOGIN_EXCHANGE") {
            self.security.allow_login_exchange = v.parse().unwrap_or(self.security.allow_login_exchange);
        }
        if let Ok(v) = env::var("SECURITY_LOGIN_EXCHANGE_SECRET") {
            self.security.login_exchange_secret = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("SECURITY_ADMIN_EMAILS") {
            self.security.admin_emails = split_list(&v).map(|s| s.to_ascii_lowercase()).collect();
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v).collect();
        }

        // Stripe overrides
        if let Ok(v) = env::var("STRIPE_GATEWAY") {
            self.stripe.gateway = match v.to_ascii_lowercase().as_str() {
                "dummy" => GatewayKind::Dummy,
                "stripe" => GatewayKind::Stripe,
                _ => self.stripe.gateway,
            };
        }
        if let Ok(v) = env::var("STRIPE_API_BASE") {
            self.stripe.api_base = v;
        }
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            self.stripe.secret_key = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            self.stripe.webhook_secret = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_TOLERANCE_SECS") {
            self.stripe.webhook_tolerance_secs = v.parse().unwrap_or(self.stripe.webhook_tolerance_secs);
        }
        if let Ok(v) = env::var("STRIPE_LIFETIME_PRICE_ID") {
            self.stripe.lifetime_price_id = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("STRIPE_MONTHLY_PRICE_ID") {
            self.stripe.monthly_price_id = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("STRIPE_YEARLY_PRICE_ID") {
            self.stripe.yearly_price_id = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("STRIPE_SUCCESS_URL") {
            self.stripe.success_url = v;
        }
        if let Ok(v) = env::var("STRIPE_CANCEL_URL") {
            self.stripe.cancel_url = v;
        }

        // AI overrides
        if let Ok(v) = env::var("AI_ENABLED") {
            self.ai.enabled = v.parse().unwrap_or(self.ai.enabled);
        }
        if let Ok(v) = env::var("AI_API_BASE") {
            self.ai.api_base = v;
        }
        if let Ok(v) = env::var("AI_API_KEY") {
            self.ai.api_key = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("AI_MODEL") {
            self.ai.model = v;
        }
        if let Ok(v) = env::var("AI_DAILY_LIMIT") {
            self.ai.default_daily_limit = v.parse().unwrap_or(self.ai.default_daily_limit);
        }
        if let Ok(v) = env::var("AI_RESET_HOUR") {
            self.ai.default_reset_hour = v
                .parse::<i32>()
                .ok()
                .filter(|h| (0..24).contains(h))
                .unwrap_or(self.ai.default_reset_hour);
        }
        if let Ok(v) = env::var("AI_REQUEST_TIMEOUT_SECS") {
            self.ai.request_timeout_secs = v.parse().unwrap_or(self.ai.request_timeout_secs);
        }

        // Study overrides
        if let Ok(v) = env::var("STUDY_DEFAULT_QUEUE_SIZE") {
            self.study.default_queue_size = v.parse().unwrap_or(self.study.default_queue_size);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                enable_request_logging: true,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            security: SecurityConfig {
                jwt_secret: "dev-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                allow_login_exchange: true,
                login_exchange_secret: None,
                admin_emails: Vec::new(),
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            stripe: StripeConfig {
                gateway: GatewayKind::Dummy,
                api_base: "https://api.stripe.com/v1".to_string(),
                secret_key: String::new(),
                webhook_secret: "whsec_dev".to_string(),
                webhook_tolerance_secs: 300,
                lifetime_price_id: None,
                monthly_price_id: None,
                yearly_price_id: None,
                success_url: "http://localhost:3000/billing/success?session_id={CHECKOUT_SESSION_ID}".to_string(),
                cancel_url: "http://localhost:3000/billing".to_string(),
            },
            ai: AiConfig {
                enabled: false,
                api_base: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                default_daily_limit: 50,
                default_reset_hour: 0,
                request_timeout_secs: 60,
                max_questions_per_request: 10,
            },
            study: StudyConfig {
                default_queue_size: 20,
                max_queue_size: 100,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 24;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config.stripe.gateway = GatewayKind::Stripe;
        config.stripe.webhook_secret = String::new();
        config.ai.default_daily_limit = 20;
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.server.enable_request_logging = false;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.database.run_migrations = false;
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 24;
        config.security.allow_login_exchange = false;
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config.stripe.gateway = GatewayKind::Stripe;
        config.stripe.webhook_secret = String::new();
        config.ai.default_daily_limit = 20;
        config
    }

    /// Price id configured for a plan, if any
    pub fn price_for(&self, plan: crate::types::PlanType) -> Option<&str> {
        use crate::types::PlanType;
        match plan {
            PlanType::Lifetime => self.stripe.lifetime_price_id.as_deref(),
            PlanType::Monthly => self.stripe.monthly_price_id.as_deref(),
            PlanType::Yearly => self.stripe.yearly_price_id.as_deref(),
            PlanType::Free => None,
        }
    }

    /// Reverse lookup used when a webhook only tells us the price
    pub fn plan_for_price(&self, price_id: &str) -> Option<crate::types::PlanType> {
        use crate::types::PlanType;
        [PlanType::Lifetime, PlanType::Monthly, PlanType::Yearly]
            .into_iter()
            .find(|plan| self.price_for(*plan) == Some(price_id))
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.security
            .admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlanType;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.security.allow_login_exchange);
        assert_eq!(config.stripe.gateway, GatewayKind::Dummy);
        assert_eq!(config.study.default_queue_size, 20);
        assert!(config.server.enable_request_logging);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.security.allow_login_exchange);
        assert!(config.security.jwt_secret.is_empty());
        assert_eq!(config.stripe.gateway, GatewayKind::Stripe);
        assert!(!config.database.run_migrations);
        assert!(!config.server.enable_request_logging);
    }

    #[test]
    fn plan_price_lookup_round_trips() {
        let mut config = AppConfig::development();
        config.stripe.lifetime_price_id = Some("price_life".into());
        config.stripe.monthly_price_id = Some("price_month".into());
        assert_eq!(config.price_for(PlanType::Lifetime), Some("price_life"));
        assert_eq!(config.plan_for_price("price_month"), Some(PlanType::Monthly));
        assert_eq!(config.plan_for_price("price_other"), None);
        assert_eq!(config.price_for(PlanType::Free), None);
    }

    #[test]
    fn admin_email_match_ignores_case() {
        let mut config = AppConfig::development();
        config.security.admin_emails = vec!["admin@example.com".into()];
        assert!(config.is_admin_email("Admin@Example.com"));
        assert!(!config.is_admin_email("user@example.com"));
    }
}
