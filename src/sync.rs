//! `nexora sync`: edit a post as a local markdown file, autosaved to a running server.
//!
//! The file is polled for changes and fed to an [`Autosave`] coordinator. Press enter to save
//! immediately, type `off`/`on` to pause automatic saves, and Ctrl-C to flush and quit.
//!
//! ```text
//! ---
//! slug: launch-notes
//! description: What we shipped this quarter
//! keywords: product, launch
//! status: draft
//! ---
//! # Launch notes
//!
//! Body text...
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::{mpsc, watch};

use crate::autosave::{Autosave, AutosaveConfig, DraftSnapshot, HttpEndpoint, SaveStatus};
use crate::db::post::PostStatus;

/// How long to wait for the final save on exit.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Base URL of the server.
    #[arg(long, env = "NEXORA_SERVER", default_value = "http://localhost:3000")]
    pub server: String,

    /// Session token, as found in the `session` cookie after signing in.
    #[arg(long, env = "NEXORA_SESSION", hide_env_values = true)]
    pub session: String,

    /// Heartbeat period.
    #[arg(long, default_value_t = 30_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,

    /// Quiet period after an edit before saving.
    #[arg(long, default_value_t = 2_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub debounce_ms: u64,

    /// How often to check the file for changes.
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_ms: u64,

    /// Markdown file to sync.
    pub file: PathBuf,
}

pub async fn run(args: SyncArgs) -> anyhow::Result<()> {
    let endpoint = HttpEndpoint::new(&args.server, &args.session)?;
    let identity = endpoint.whoami().await.context("contacting server")?;
    let Some(identity) = identity else {
        anyhow::bail!("session is not valid, sign in again and copy the new session cookie");
    };
    tracing::info!(author_id = %identity.author_id, role = %identity.role, "Signed in");

    let sidecar = sidecar_path(&args.file);
    let identifier = match tokio::fs::read_to_string(&sidecar).await {
        Ok(id) => Some(id.trim().to_string()).filter(|id| !id.is_empty()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e).with_context(|| format!("reading {}", sidecar.display())),
    };

    // Resuming a post: start from the stored copy so unchanged files aren't re-sent.
    let stored = match &identifier {
        Some(id) => match endpoint.fetch(id).await? {
            Some(stored) => Some(stored),
            None => {
                tracing::warn!(%id, "Post not found on server, a new one will be created");
                None
            }
        },
        None => None,
    };
    let identifier = stored.as_ref().and_then(|s| s.identifier.clone());

    let (data_tx, data_rx) = watch::channel(stored.unwrap_or_default());
    let (_identity_tx, identity_rx) = watch::channel(Some(identity));
    let (saved_tx, mut saved_rx) = mpsc::unbounded_channel::<DraftSnapshot>();

    let config = AutosaveConfig {
        interval: Duration::from_millis(args.interval_ms),
        debounce: Duration::from_millis(args.debounce_ms),
        ..Default::default()
    };
    let autosave = Autosave::builder(endpoint, data_rx, identity_rx)
        .config(config)
        .on_save(move |saved| {
            let _ = saved_tx.send(saved.clone());
        })
        .on_error(|e| tracing::warn!("Save failed: {e}"))
        .spawn();

    let mut status = autosave.status();
    let mut identifier = identifier;
    let mut poll = tokio::time::interval(Duration::from_millis(args.poll_ms));
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut commands = stdin_lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!(file = %args.file.display(), "Watching for changes, press enter to save now");
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = poll.tick() => {
                let text = match tokio::fs::read_to_string(&args.file).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(file = %args.file.display(), "Failed to read file: {e}");
                        continue;
                    }
                };
                let mut draft = parse_document(&text);
                draft.identifier = identifier.clone();
                data_tx.send_if_modified(|current| {
                    if current.same_content(&draft) && current.identifier == draft.identifier {
                        return false;
                    }
                    *current = draft;
                    true
                });
            }
            Some(saved) = saved_rx.recv() => {
                if identifier.is_none() {
                    record_identifier(&sidecar, &saved).await?;
                }
                identifier = saved.identifier.clone();
            }
            Ok(()) = status.changed() => {
                let status = *status.borrow_and_update();
                match status {
                    SaveStatus::Saving => tracing::debug!("Saving..."),
                    SaveStatus::Saved => tracing::info!("Saved"),
                    SaveStatus::Error => tracing::info!("Not saved, will retry on the next change or heartbeat"),
                    SaveStatus::Idle => {}
                }
            }
            Some(line) = commands.recv() => match line.trim() {
                "off" => {
                    autosave.set_enabled(false);
                    tracing::info!("Automatic saves paused");
                }
                "on" => {
                    autosave.set_enabled(true);
                    tracing::info!("Automatic saves resumed");
                }
                _ => autosave.save_now(),
            },
        }
    }

    tracing::info!("Exiting");
    // The exit flush is fire and forget, so a post that doesn't exist yet is created here
    // instead, where its identifier can still be written down.
    if identifier.is_none() && data_tx.borrow().is_meaningful() {
        if let Some(saved) = first_save(&autosave, &mut saved_rx, &mut status).await {
            record_identifier(&sidecar, &saved).await?;
        }
    }
    if let Some(flush) = autosave.exit().await {
        if tokio::time::timeout(FLUSH_TIMEOUT, flush).await.is_err() {
            tracing::warn!("Gave up waiting for the final save");
        }
    }
    Ok(())
}

/// Save now and wait for the outcome. `None` if it failed or took too long.
///
/// A save already in flight drops the request, but its own outcome is reported the same way.
async fn first_save(
    autosave: &Autosave, saved: &mut mpsc::UnboundedReceiver<DraftSnapshot>, status: &mut watch::Receiver<SaveStatus>,
) -> Option<DraftSnapshot> {
    status.mark_unchanged();
    autosave.save_now();
    let outcome = async {
        loop {
            tokio::select! {
                Some(draft) = saved.recv() => return Some(draft),
                Ok(()) = status.changed() => {
                    if *status.borrow_and_update() == SaveStatus::Error {
                        return None;
                    }
                }
                else => return None,
            }
        }
    };
    tokio::time::timeout(FLUSH_TIMEOUT, outcome).await.ok().flatten()
}

async fn record_identifier(sidecar: &Path, saved: &DraftSnapshot) -> anyhow::Result<()> {
    let Some(id) = &saved.identifier else {
        return Ok(());
    };
    tokio::fs::write(sidecar, id).await.with_context(|| format!("writing {}", sidecar.display()))?;
    tracing::info!(%id, "Created post");
    Ok(())
}

/// Lines typed on stdin.
///
/// Read from a plain thread, since a blocking read can't be cancelled and would otherwise hold up
/// runtime shutdown until the next newline.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Where the server-assigned identifier of a file's post is kept.
pub fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".nexora-id");
    PathBuf::from(name)
}

/// Read a markdown document with optional front matter into a draft.
///
/// The first `# ` heading is the title and everything after it is the body. Without a
/// heading, the whole document is body.
pub fn parse_document(text: &str) -> DraftSnapshot {
    let mut draft = DraftSnapshot::default();
    let mut rest = text;

    if let Some(after) = rest.strip_prefix("---\n").or_else(|| rest.strip_prefix("---\r\n")) {
        if let Some((front, body)) = split_front_matter(after) {
            apply_front_matter(&mut draft, front);
            rest = body;
        }
    }

    let rest = rest.trim_start_matches(['\n', '\r']);
    match rest.strip_prefix("# ") {
        Some(titled) => {
            let (title, body) = titled.split_once('\n').unwrap_or((titled, ""));
            draft.title = title.trim().to_string();
            draft.body = body.trim_start_matches(['\n', '\r']).trim_end().to_string();
        }
        None => draft.body = rest.trim_end().to_string(),
    }
    draft
}

/// Split at the closing `---` line, if there is one.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&text[..offset], &text[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn apply_front_matter(draft: &mut DraftSnapshot, front: &str) {
    for line in front.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "slug" => draft.seo.slug = value.to_string(),
            "description" => draft.seo.description = value.to_string(),
            "seo_title" => draft.seo.title = value.to_string(),
            "keywords" => {
                draft.seo.keywords =
                    value.split(',').map(str::trim).filter(|k| !k.is_empty()).map(String::from).collect()
            }
            "status" => {
                draft.status = match value {
                    "published" => PostStatus::Published,
                    _ => PostStatus::Draft,
                }
            }
            "image" => draft.featured_image = Some(value.to_string()).filter(|v| !v.is_empty()),
            "image_alt" => draft.featured_image_alt = Some(value.to_string()).filter(|v| !v.is_empty()),
            other => tracing::debug!(key = other, "Ignoring unknown front matter key"),
        }
    }
}
