use std::path::{Path, PathBuf};
use clap::Args;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct FlatConfig {
    #[arg(long, env = "FOLIO_WORKDIR", default_value = "folio-data", help = "Working directory holding the WAL, uploads and thumbnails")]
    workdir: String,

    #[arg(long, env = "FOLIO_UPLOAD_DIR", default_value = "uploads", help = "Upload directory, relative to the workdir unless absolute")]
    upload_dir: String,

    #[arg(long, env = "FOLIO_BIND", default_value = "127.0.0.1:1740", help = "Address the API server binds to")]
    bind: String,

    #[arg(long, env = "FOLIO_API_URL", default_value = "http://127.0.0.1:1740", help = "Base URL of the API, used by client commands")]
    api_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub workdir: PathBuf,
    pub upload_dir: PathBuf,
    pub wal_path: PathBuf,
    pub thumbnails_dir: PathBuf,
    pub content_cache_path: PathBuf,
    pub bind: String,
    pub api_url: String,
}

impl AppConfig {
    pub fn new(workdir: &str, upload_dir: &str, bind: &str, api_url: &str) -> anyhow::Result<Self> {
        let workdir = Self::get_or_create_workdir(workdir)?;
        let upload_dir = Self::get_or_create_upload_dir(&workdir, upload_dir)?;
        let wal_path = Self::get_or_create_wal_path(&workdir)?;
        let thumbnails_dir = Self::get_or_create_thumbnails_dir(&workdir)?;
        let content_cache_path = workdir.join("content-local.json");
        Ok(Self {
            workdir,
            upload_dir,
            wal_path,
            thumbnails_dir,
            content_cache_path,
            bind: bind.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn get_or_create_workdir(workdir: &str) -> anyhow::Result<PathBuf> {
        let workdir = Path::new(workdir);
        if !workdir.exists() {
            std::fs::create_dir_all(workdir)?;
        }
        let workdir = workdir.canonicalize()?;
        if !workdir.is_dir() {
            anyhow::bail!("workdir is not a directory");
        }
        info!("workdir: {}", workdir.display());
        Ok(workdir)
    }

    fn get_or_create_upload_dir(workdir: &Path, upload_dir: &str) -> anyhow::Result<PathBuf> {
        let upload_dir = Path::new(upload_dir);
        let upload_dir = if upload_dir.is_absolute() {
            upload_dir.to_path_buf()
        } else {
            workdir.join(upload_dir)
        };
        if !upload_dir.exists() {
            std::fs::create_dir_all(&upload_dir)?;
        }
        let upload_dir = upload_dir.canonicalize()?;
        if !upload_dir.is_dir() {
            anyhow::bail!("upload_dir is not a directory");
        }
        info!("upload_dir: {}", upload_dir.display());
        Ok(upload_dir)
    }

    fn get_or_create_wal_path(workdir: &Path) -> anyhow::Result<PathBuf> {
        let wal_path = workdir.join("folio.db.json");
        if !wal_path.exists() {
            std::fs::write(&wal_path, "")?;
        }
        if !wal_path.is_file() {
            anyhow::bail!("wal_path is not a file");
        }
        info!("wal_path: {}", wal_path.display());
        Ok(wal_path)
    }

    fn get_or_create_thumbnails_dir(workdir: &Path) -> anyhow::Result<PathBuf> {
        let thumbnails_dir = workdir.join("thumbnails");
        if !thumbnails_dir.exists() {
            std::fs::create_dir_all(&thumbnails_dir)?;
        }
        if !thumbnails_dir.is_dir() {
            anyhow::bail!("thumbnails_dir is not a directory");
        }
        info!("thumbnails_dir: {}", thumbnails_dir.display());
        Ok(thumbnails_dir)
    }
}

impl TryFrom<FlatConfig> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(value: FlatConfig) -> Result<Self, Self::Error> {
        AppConfig::new(&value.workdir, &value.upload_dir, &value.bind, &value.api_url)
    }
}
