use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use crate::client::bulk::{self, BulkDeleteController};
use crate::client::resolution::{Resolution, ResolutionFlow};
use crate::client::upload::{UploadOutcome, UploadRequest};
use crate::client::{ApiClient, ProgressFn};
use crate::config::AppConfig;
use crate::entities::content::default_content;
use crate::entities::Section;
use crate::http::{self, ApiContext};
use crate::storage::FileStorage;
use crate::store::CmsStore;

pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let mut store = CmsStore::new(&config, FileStorage::new(config.wal_path.clone()));
    store.init().await?;
    http::serve(ApiContext::new(config, store)).await
}

/// One-shot starter data: fills any section that has never been written.
pub async fn seed(config: AppConfig) -> anyhow::Result<()> {
    let mut store = CmsStore::new(&config, FileStorage::new(config.wal_path.clone()));
    store.init().await?;

    let mut inserted = 0;
    for section in Section::ALL {
        if store.section_is_set(section) {
            continue;
        }
        store.put_section(section, default_content(section)).await?;
        inserted += 1;
    }
    println!("Seeded {} sections ({} already present).", inserted, Section::ALL.len() - inserted);
    Ok(())
}

pub async fn upload(
    config: AppConfig,
    path: PathBuf,
    name: Option<String>,
    alt: Option<String>,
    description: Option<String>,
) -> anyhow::Result<()> {
    let client = ApiClient::new(config.api_url.clone());
    let request = UploadRequest {
        path,
        display_name: name,
        alt,
        description,
        action: None,
    };

    let progress: ProgressFn = Arc::new(|done, total| {
        if total > 0 {
            eprint!("\ruploading... {}%", done * 100 / total);
        }
    });

    match client.upload(&request, Some(progress)).await {
        Ok(UploadOutcome::Stored(stored)) => {
            eprintln!();
            println!("{}", stored.confirmation());
            Ok(())
        }
        Ok(UploadOutcome::Duplicate(conflict)) => {
            eprintln!();
            resolve_interactively(client, request, conflict).await
        }
        Err(err) => {
            eprintln!();
            anyhow::bail!("{err}")
        }
    }
}

async fn resolve_interactively(
    client: ApiClient,
    request: UploadRequest,
    conflict: crate::client::conflict::UploadConflict,
) -> anyhow::Result<()> {
    println!("A stored file matches this upload:");
    let shown_name = if conflict.existing.name.is_empty() {
        conflict.existing.url.as_str()
    } else {
        conflict.existing.name.as_str()
    };
    println!("  existing: {} ({} bytes, added {})", shown_name, conflict.existing.size, conflict.existing.created_at);
    println!("  yours:    {} ({} bytes, {})", conflict.uploaded.original_name, conflict.uploaded.size, conflict.uploaded.mimetype);

    let flow = ResolutionFlow::new(client);
    flow.open(conflict, request)?;

    loop {
        print!("[r]eplace the stored file, keep both under a [n]ew name, or [c]ancel: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        let choice = match line.trim() {
            "r" | "replace" => Some(Resolution::Replace),
            "n" | "rename" => Some(Resolution::Rename),
            "c" | "cancel" | "" => None,
            other => {
                println!("unknown choice: {other}");
                continue;
            }
        };
        match choice {
            Some(resolution) => {
                let outcome = flow.resolve(resolution).await?;
                println!("{}", outcome.message());
            }
            None => {
                println!("{}", flow.cancel().message());
            }
        }
        return Ok(());
    }
}

pub async fn delete(config: AppConfig, ids: Vec<String>) -> anyhow::Result<()> {
    let client = ApiClient::new(config.api_url.clone());
    let controller = BulkDeleteController::new();

    let progress: ProgressFn = Arc::new(|pct, _| {
        eprint!("\rdeleting... {pct}%");
    });
    let outcome = controller.run(&client, ids, Some(progress)).await?;
    eprintln!();
    println!("{}", bulk::summary(&outcome));
    Ok(())
}

pub async fn sync(config: AppConfig) -> anyhow::Result<()> {
    let client = ApiClient::new(config.api_url.clone());
    let report = client.sync().await?;
    println!("Sync finished: {} added, {} removed, {} total.", report.added, report.removed, report.total);
    Ok(())
}

pub async fn list(config: AppConfig, page_size: usize, page_index: usize) -> anyhow::Result<()> {
    let client = ApiClient::new(config.api_url.clone());
    let page = client.list_media(page_size, page_index).await?;
    info!("{} media total", page.total);
    for media in &page.items {
        println!("{}  {:>10}  {:<24} {}", media.id, media.size, media.mime_type, media.name);
    }
    println!("page {} ({} of {} shown)", page.page_index, page.items.len(), page.total);
    Ok(())
}
