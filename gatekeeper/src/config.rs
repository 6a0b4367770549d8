use std::path::PathBuf;

/// Where the shared `access_requests` table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Postgres { database_url: String },
    Rest { base_url: String, api_key: String },
}

const NO_BACKEND: &str = "no request store configured. Set DATABASE_URL, or \
                          GATEKEEPER_SUPABASE_URL and GATEKEEPER_SUPABASE_KEY.";

#[derive(Debug)]
pub struct Config {
    /// `None` when neither backend is configured. Local-only commands still run.
    pub backend: Option<Backend>,
    /// Directory holding local state (saved codes, approval flag).
    pub state_dir: PathBuf,
    pub slack_webhook_url: Option<String>,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from any key lookup. `load()` uses the process environment.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let backend = match (
        non_empty("DATABASE_URL"),
        non_empty("GATEKEEPER_SUPABASE_URL"),
        non_empty("GATEKEEPER_SUPABASE_KEY"),
    ) {
        (Some(database_url), _, _) => Some(Backend::Postgres { database_url }),
        (None, Some(base_url), Some(api_key)) => Some(Backend::Rest { base_url, api_key }),
        (None, Some(_), None) => {
            anyhow::bail!("GATEKEEPER_SUPABASE_URL is set but GATEKEEPER_SUPABASE_KEY is missing")
        }
        (None, None, _) => None,
    };

    let state_dir = match non_empty("GATEKEEPER_STATE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => crate::local::FileKvStore::default_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine a data directory; set GATEKEEPER_STATE_DIR"))?,
    };

    Ok(Config {
        backend,
        state_dir,
        slack_webhook_url: non_empty("GATEKEEPER_SLACK_WEBHOOK_URL"),
    })
}

impl Config {
    /// The configured backend, or an error for commands that need one.
    pub fn require_backend(&self) -> anyhow::Result<&Backend> {
        self.backend.as_ref().ok_or_else(|| anyhow::anyhow!(NO_BACKEND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_database_url_selects_postgres() {
        let cfg = from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/gatekeeper"),
            ("GATEKEEPER_SUPABASE_URL", "https://x.supabase.co"),
            ("GATEKEEPER_SUPABASE_KEY", "anon"),
            ("GATEKEEPER_STATE_DIR", "/tmp/gk"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.backend,
            Some(Backend::Postgres { database_url: "postgres://localhost/gatekeeper".into() })
        );
        assert_eq!(cfg.state_dir, PathBuf::from("/tmp/gk"));
        assert_eq!(cfg.slack_webhook_url, None);
    }

    #[test]
    fn test_supabase_pair_selects_rest() {
        let cfg = from_lookup(lookup(&[
            ("GATEKEEPER_SUPABASE_URL", "https://x.supabase.co"),
            ("GATEKEEPER_SUPABASE_KEY", "anon"),
            ("GATEKEEPER_STATE_DIR", "/tmp/gk"),
            ("GATEKEEPER_SLACK_WEBHOOK_URL", "https://hooks.slack.com/x"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.backend,
            Some(Backend::Rest { base_url: "https://x.supabase.co".into(), api_key: "anon".into() })
        );
        assert_eq!(cfg.slack_webhook_url.as_deref(), Some("https://hooks.slack.com/x"));
    }

    #[test]
    fn test_missing_backend_loads_but_is_required_later() {
        let cfg = from_lookup(lookup(&[("GATEKEEPER_STATE_DIR", "/tmp/gk")])).unwrap();
        assert_eq!(cfg.backend, None);
        assert_eq!(cfg.state_dir, PathBuf::from("/tmp/gk"));
        let err = cfg.require_backend().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_supabase_url_without_key_is_an_error() {
        let err = from_lookup(lookup(&[
            ("GATEKEEPER_SUPABASE_URL", "https://x.supabase.co"),
            ("GATEKEEPER_STATE_DIR", "/tmp/gk"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GATEKEEPER_SUPABASE_KEY"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let cfg = from_lookup(lookup(&[("DATABASE_URL", "  "), ("GATEKEEPER_STATE_DIR", "/tmp/gk")]))
            .unwrap();
        assert_eq!(cfg.backend, None);
        assert!(cfg.require_backend().unwrap_err().to_string().contains("no request store configured"));
    }
}
