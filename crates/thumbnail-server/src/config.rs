use std::env;
use std::path::PathBuf;
use url::Url;

const MAX_EXPIRES_DAYS: i64 = 3650;

/// Service configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub port: u16,
    /// Directory holding the source images
    pub uploads_dir: PathBuf,
    /// Public URL prefix of the source images, absolute or path-only
    pub uploads_url: String,
    pub cache_dir: PathBuf,
    pub default_quality: u8,
    /// How far ahead the `Expires` header of a cached thumbnail points
    pub expires_days: i64,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            port: 3005,
            uploads_dir: PathBuf::from("./uploads"),
            uploads_url: "/uploads/".to_string(),
            cache_dir: PathBuf::from("./cache/thumbs"),
            default_quality: 80,
            expires_days: 30,
        }
    }
}

impl ThumbnailConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.uploads_dir);

        let uploads_url = env::var("UPLOADS_URL").unwrap_or(defaults.uploads_url);

        let cache_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let default_quality = env::var("DEFAULT_QUALITY")
            .ok()
            .and_then(|q| q.parse::<u8>().ok())
            .filter(|q| (1..=100).contains(q))
            .unwrap_or(defaults.default_quality);

        let expires_days = env::var("EXPIRES_DAYS")
            .ok()
            .and_then(|d| d.parse::<i64>().ok())
            .filter(|d| (0..=MAX_EXPIRES_DAYS).contains(d))
            .unwrap_or(defaults.expires_days);

        Self {
            port,
            uploads_dir,
            uploads_url,
            cache_dir,
            default_quality,
            expires_days,
        }
    }

    /// Public URL of an original upload, used when a thumbnail isn't worth rendering
    pub fn original_url(&self, filename: &str) -> String {
        let encoded = urlencoding::encode(filename);

        if let Ok(mut base) = Url::parse(&self.uploads_url) {
            // Url::join drops the last segment unless the base ends in a slash
            if !base.path().ends_with('/') {
                let path = format!("{}/", base.path());
                base.set_path(&path);
            }
            if let Ok(url) = base.join(&encoded) {
                return url.to_string();
            }
        }

        format!("{}/{}", self.uploads_url.trim_end_matches('/'), encoded)
    }
}
