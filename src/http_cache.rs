use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CACHE_VERSION: u32 = 1;
const APP_DIR: &str = "propcast";
const CACHE_FILE: &str = "http_cache.json";

static CACHE: Mutex<Option<HttpCacheFile>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HttpCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

/// GET `url` and parse the body, serving the cached body while it is younger than
/// `ttl` and revalidating with ETag / Last-Modified afterwards. A body is only
/// cached once `parse` accepts it, so a retry after a bad payload goes back to the
/// network.
pub fn fetch_cached<T>(
    client: &Client,
    url: &str,
    ttl: Duration,
    parse: impl Fn(&str) -> Result<T>,
) -> Result<T> {
    let mut cached_entry = with_cache(|cache| cache.entries.get(url).cloned());
    let now = system_time_to_secs(SystemTime::now()).unwrap_or_default();

    if let Some(entry) = cached_entry.as_ref()
        && now.saturating_sub(entry.fetched_at) < ttl.as_secs()
    {
        match parse(&entry.body) {
            Ok(parsed) => {
                debug!(url, "http cache hit");
                return Ok(parsed);
            }
            Err(err) => {
                debug!(url, %err, "cached body rejected, refetching");
                commit(url, None);
                cached_entry = None;
            }
        }
    }

    let mut req = client.get(url);
    if let Some(entry) = cached_entry.as_ref() {
        if let Some(etag) = entry.etag.as_ref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = entry.last_modified.as_ref() {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }
    }

    let resp = req.send().context("request failed")?;
    let status = resp.status();
    let headers = resp.headers().clone();
    if status == StatusCode::NOT_MODIFIED {
        let Some(mut entry) = cached_entry else {
            return Err(anyhow::anyhow!("received 304 without cache body"));
        };
        entry.fetched_at = now;
        return commit_parsed(url, entry, parse);
    }

    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, truncate(&body, 200)));
    }

    let header_text = |name: HeaderName| {
        headers
            .get(&name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };
    let entry = CacheEntry {
        body,
        etag: header_text(ETAG),
        last_modified: header_text(LAST_MODIFIED),
        fetched_at: now,
    };
    commit_parsed(url, entry, parse)
}

fn with_cache<T>(f: impl FnOnce(&mut HttpCacheFile) -> T) -> T {
    let mut guard = CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let cache = guard.get_or_insert_with(load_cache_file);
    f(cache)
}

/// Parses the fetched body and caches the entry only on success; a rejected body
/// also drops whatever was cached for `url` before.
fn commit_parsed<T>(url: &str, entry: CacheEntry, parse: impl Fn(&str) -> Result<T>) -> Result<T> {
    match parse(&entry.body) {
        Ok(parsed) => {
            commit(url, Some(entry));
            Ok(parsed)
        }
        Err(err) => {
            commit(url, None);
            Err(err)
        }
    }
}

fn commit(url: &str, entry: Option<CacheEntry>) {
    with_cache(|cache| {
        let changed = apply_entry(cache, url, entry);
        if changed && let Err(err) = save_cache_file(cache) {
            debug!(%err, "http cache not saved");
        }
    });
}

/// Inserts or removes the entry for `url`; returns whether the cache changed.
fn apply_entry(cache: &mut HttpCacheFile, url: &str, entry: Option<CacheEntry>) -> bool {
    match entry {
        Some(entry) => {
            cache.version = CACHE_VERSION;
            cache.entries.insert(url.to_string(), entry);
            true
        }
        None => cache.entries.remove(url).is_some(),
    }
}

fn load_cache_file() -> HttpCacheFile {
    let Some(path) = cache_path() else {
        return HttpCacheFile::default();
    };
    let Ok(raw) = fs::read_to_string(path) else {
        return HttpCacheFile::default();
    };
    let cache = serde_json::from_str::<HttpCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return HttpCacheFile::default();
    }
    cache
}

fn save_cache_file(cache: &HttpCacheFile) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir).ok();
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize http cache")?;
    fs::write(&tmp, json).context("write http cache")?;
    fs::rename(&tmp, &path).context("swap http cache")?;
    Ok(())
}

fn cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

/// `$XDG_CACHE_HOME/propcast`, else `~/.cache/propcast`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn system_time_to_secs(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}
