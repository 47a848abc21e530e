// src/cli/handlers/download.rs

//! `download` and `downloadlist` over HTTP(S).

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Url;
use reqwest::blocking::Client;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use crate::{
    cli::handlers::commons::{self, display},
    models::{ActionOutcome, Mode, Segment},
    session::Session,
};

const USER_AGENT: &str = concat!("cmc/", env!("CARGO_PKG_VERSION"));
const FALLBACK_FILE_NAME: &str = "download.bin";

/// The last path segment of `url`, or `download.bin`.
pub fn file_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map_or_else(|| FALLBACK_FILE_NAME.to_string(), str::to_string)
}

/// `download '<url>' to '<dir>'`.
///
/// The body is streamed into a temporary file beside the destination and
/// only moved into place once complete. Responses announcing more than the
/// configured cap are refused before reading; bodies that exceed it anyway
/// are cut off and discarded.
pub fn handle(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let url = parse_url(&commons::required_arg(segment, 0, "download")?.text)?;
    let dest_dir = commons::dir_after_keyword(session, segment, "to");
    let target = dest_dir.join(file_name_from_url(&url));

    let effect = format!("DOWNLOADED {} -> {}", url, display(&target));
    if mode == Mode::Simulate {
        return Ok(ActionOutcome::simulated(effect));
    }

    let client = build_client(session)?;
    let written = fetch(&client, &url, &target, session.config().download.max_bytes)?;
    Ok(ActionOutcome::done(format!(
        "Downloaded {} to {}",
        commons::format_size(written),
        display(&target)
    ))
    .with_effect(effect))
}

/// `downloadlist '<file>' to '<dir>'`: one URL per non-empty line.
///
/// Every URL is attempted in order. The step fails only when none of them
/// could be downloaded.
pub fn download_list(session: &mut Session, segment: &Segment, mode: Mode) -> Result<ActionOutcome> {
    let list = session.resolve_path(&commons::required_arg(segment, 0, "downloadlist")?.text);
    if !list.is_file() {
        bail!("Not found: {}", display(&list));
    }
    let contents = fs::read_to_string(&list)
        .with_context(|| format!("Cannot read '{}'", display(&list)))?;
    let raw_urls: Vec<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if raw_urls.is_empty() {
        bail!("No URLs in '{}'.", display(&list));
    }
    let dest_dir = commons::dir_after_keyword(session, segment, "to");

    let mut lines = Vec::new();
    let mut planned = Vec::new();
    for raw in &raw_urls {
        match parse_url(raw) {
            Ok(url) => {
                let target = dest_dir.join(file_name_from_url(&url));
                planned.push((url, target));
            }
            Err(e) => lines.push(format!("  ✗ {}: {:#}", raw, e)),
        }
    }

    if mode == Mode::Simulate {
        let effects = planned
            .iter()
            .map(|(url, target)| format!("DOWNLOADED {} -> {}", url, display(target)))
            .collect();
        let mut outcome = ActionOutcome::simulated_all(effects);
        for line in lines {
            outcome.message.push_str(&format!("\n{}", line));
        }
        return Ok(outcome);
    }

    let client = build_client(session)?;
    let cap = session.config().download.max_bytes;
    let mut effects = Vec::new();
    for (url, target) in &planned {
        match fetch(&client, url, target, cap) {
            Ok(written) => {
                lines.push(format!(
                    "  ✓ {} -> {} ({})",
                    url,
                    display(target),
                    commons::format_size(written)
                ));
                effects.push(format!("DOWNLOADED {} -> {}", url, display(target)));
            }
            Err(e) => {
                log::warn!("Download of '{}' failed: {:#}", url, e);
                lines.push(format!("  ✗ {}: {:#}", url, e));
            }
        }
    }

    if effects.is_empty() {
        bail!("No downloads succeeded.\n{}", lines.join("\n"));
    }
    let summary = format!(
        "Downloaded {} of {} file(s).\n{}",
        effects.len(),
        raw_urls.len(),
        lines.join("\n")
    );
    Ok(effects
        .into_iter()
        .fold(ActionOutcome::done(summary), |outcome, effect| outcome.with_effect(effect)))
}

fn parse_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let url = Url::parse(raw).with_context(|| format!("Invalid URL '{}'", raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Only http and https downloads are supported, not '{}'.", url.scheme());
    }
    Ok(url)
}

fn build_client(session: &Session) -> Result<Client> {
    let verify = session.safety().ssl_verify;
    if !verify {
        log::warn!("Downloading without certificate verification");
    }
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(session.config().download.timeout_secs))
        .danger_accept_invalid_certs(!verify)
        .build()
        .context("Failed to build HTTP client")
}

/// Streams `url` into `target`, creating its folder. Returns the byte count.
fn fetch(client: &Client, url: &Url, target: &Path, cap: u64) -> Result<u64> {
    let response = client
        .get(url.clone())
        .send()
        .with_context(|| format!("Request to '{}' failed", url))?
        .error_for_status()?;
    if let Some(length) = response.content_length() {
        if length > cap {
            bail!(
                "File exceeds the download limit ({} > {}).",
                commons::format_size(length),
                commons::format_size(cap)
            );
        }
    }

    let dest_dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Cannot create folder '{}'", display(dest_dir)))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dest_dir)
        .with_context(|| format!("Cannot write in '{}'", display(dest_dir)))?;
    let mut limited = response.take(cap.saturating_add(1));
    let written = io::copy(&mut limited, &mut tmp)
        .with_context(|| format!("Download of '{}' was interrupted", url))?;
    if written > cap {
        bail!(
            "File exceeds the download limit ({}).",
            commons::format_size(cap)
        );
    }
    tmp.flush()?;
    tmp.persist(target)
        .map_err(|e| anyhow!("Cannot save '{}': {}", display(target), e.error))?;

    log::info!("Downloaded '{}' ({} bytes)", url, written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CmcConfig;
    use crate::core::safety::ScriptedConfirmer;
    use std::fs;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::tempdir;

    /// Serves one HTTP response with `body` and returns the URL of `/path`.
    fn serve_once(body: &'static [u8], path: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request);
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let _ = stream.write_all(body);
            }
        });
        format!("http://{}/{}", address, path)
    }

    fn batch_session(dir: &std::path::Path, config: CmcConfig) -> Session {
        let mut session = Session::in_memory(dir, Box::new(ScriptedConfirmer::default()))
            .with_config(config);
        session.run_line("batch on").unwrap();
        session
    }

    #[test]
    fn test_file_name_from_url() {
        let named = Url::parse("https://example.com/files/tool.zip?x=1").unwrap();
        let bare = Url::parse("https://example.com/").unwrap();

        assert_eq!(file_name_from_url(&named), "tool.zip");
        assert_eq!(file_name_from_url(&bare), "download.bin");
    }

    #[test]
    fn test_download_writes_the_body() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let url = serve_once(b"payload", "data.txt");
        let mut session = batch_session(dir.path(), CmcConfig::default());

        // --- Execute ---
        let report = session
            .run_line(&format!("download '{}' to 'inbox'", url))
            .unwrap();

        // --- Assert ---
        assert_eq!(report.failed, 0);
        assert_eq!(
            fs::read_to_string(dir.path().join("inbox/data.txt")).unwrap(),
            "payload"
        );
        assert!(session.journal()[0].contains("DOWNLOADED"));
    }

    #[test]
    fn test_download_over_the_cap_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let url = serve_once(b"0123456789abcdef", "big.bin");
        let mut config = CmcConfig::default();
        config.download.max_bytes = 8;
        let mut session = batch_session(dir.path(), config);

        let report = session.run_line(&format!("download '{}' to '.'", url)).unwrap();

        assert_eq!(report.failed, 1);
        assert!(!dir.path().join("big.bin").exists());
    }

    #[test]
    fn test_dry_run_does_not_touch_the_network() {
        let dir = tempdir().unwrap();
        let mut session = batch_session(dir.path(), CmcConfig::default());

        let report = session
            .run_line("dry-run on; download 'http://127.0.0.1:9/x.iso' to 'isos'")
            .unwrap();

        assert_eq!(report.failed, 0);
        assert!(!dir.path().join("isos").exists());
    }

    #[test]
    fn test_download_list_fetches_every_valid_line() {
        // --- Setup ---
        let dir = tempdir().unwrap();
        let first = serve_once(b"one", "one.txt");
        let second = serve_once(b"two", "two.txt");
        fs::write(
            dir.path().join("urls.txt"),
            format!("{}\n\n  {}  \nftp://host/skipped.txt\n", first, second),
        )
        .unwrap();
        let mut session = batch_session(dir.path(), CmcConfig::default());

        // --- Execute ---
        let report = session.run_line("downloadlist 'urls.txt' to 'inbox'").unwrap();

        // --- Assert ---
        assert_eq!(report.failed, 0);
        assert_eq!(fs::read_to_string(dir.path().join("inbox/one.txt")).unwrap(), "one");
        assert_eq!(fs::read_to_string(dir.path().join("inbox/two.txt")).unwrap(), "two");
        assert_eq!(session.journal().len(), 2);
        let message = report.outcomes().next().map(|o| o.message.clone()).unwrap_or_default();
        assert!(message.starts_with("Downloaded 2 of 3 file(s)."));
        assert!(message.contains("ftp"));
    }

    #[test]
    fn test_download_list_needs_an_existing_file() {
        let dir = tempdir().unwrap();
        let mut session = batch_session(dir.path(), CmcConfig::default());

        let report = session.run_line("downloadlist 'missing.txt' to '.'").unwrap();

        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_download_list_under_dry_run_reports_each_url() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("urls.txt"),
            "http://127.0.0.1:9/a.iso\nhttp://127.0.0.1:9/b.iso\n",
        )
        .unwrap();
        let mut session = batch_session(dir.path(), CmcConfig::default());

        let report = session
            .run_line("dry-run on; downloadlist 'urls.txt' to 'isos'")
            .unwrap();

        let outcome = report.outcomes().last().cloned().unwrap_or_default();
        assert!(outcome.simulated);
        assert_eq!(outcome.side_effects.len(), 2);
        assert!(!dir.path().join("isos").exists());
    }

    #[test]
    fn test_unsupported_scheme_is_rejected() {
        let dir = tempdir().unwrap();
        let mut session = batch_session(dir.path(), CmcConfig::default());

        let report = session.run_line("download 'ftp://host/file' to '.'").unwrap();

        assert_eq!(report.failed, 1);
    }
}
