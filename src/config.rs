use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    /// Mount point of the admin routes, e.g. `/admin`. Empty mounts at the root.
    pub admin_prefix: String,
    /// Role names allowed to manage user accounts.
    pub manage_roles: Vec<String>,
    /// Credentials of an administrator created at startup if missing.
    pub bootstrap_admin: Option<(String, String)>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "useradmin".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "useradmin-panel".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let admin_prefix = normalize_prefix(
            &std::env::var("ADMIN_PREFIX").unwrap_or_else(|_| "/admin".into()),
        );
        let manage_roles = parse_list(
            &std::env::var("MANAGE_USERS_ROLES").unwrap_or_else(|_| "Administrator".into()),
        );
        let bootstrap_admin = match (
            std::env::var("ADMIN_EMAIL").ok(),
            std::env::var("ADMIN_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };
        Ok(Self {
            database_url,
            max_connections,
            jwt,
            admin_prefix,
            manage_roles,
            bootstrap_admin,
        })
    }

    /// Absolute URL of an admin page, e.g. `handles("users/5/edit")`.
    pub fn handles(&self, path: &str) -> String {
        format!("{}/{}", self.admin_prefix, path.trim_start_matches('/'))
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
