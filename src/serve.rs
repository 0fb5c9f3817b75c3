//! Development server with live reload support.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐  ┌──────────────────┐  ┌─────────────────┐
//! │  HTTP Thread    │  │  Watcher Thread  │  │ Keyboard Thread │
//! │  (tiny_http)    │  │  (notify)        │  │ (stdin lines)   │
//! └────────┬────────┘  └────────┬─────────┘  └────────┬────────┘
//!          │ read-only          │ Change              │ Key
//!          ▼                    ▼                     ▼
//!     build dir        ┌─────────────────────────────────────┐
//!          ▲           │  Engine (main thread, owns Site)    │
//!          └───────────│  dispatch → livereload → status     │
//!                      └─────────────────────────────────────┘
//! ```
//!
//! HTML responses get the livereload script (and, with `-navigate`, the
//! navigation plugin) injected before `</body>`, and have `urlprefix`
//! stripped from `href`/`src` attributes.

use crate::{
    config::ConfigSet,
    livereload::LiveReload,
    log,
    logger::{self, WatchStatus},
    site::{BuildError, ChangeEvent, Op, Site},
    utils::{fsx, html},
    verbose, watch,
};
use anyhow::{Context, Result, anyhow};
use parking_lot::RwLock;
use std::{
    fs,
    io::{BufRead, Cursor},
    net::SocketAddr,
    path::{Path, PathBuf},
    process::Command,
    sync::{Arc, mpsc},
    thread,
    time::Instant,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

// ============================================================================
// Constants
// ============================================================================

/// Reload path prefix understood by the navigation plugin.
const NAVIGATE_PREFIX: &str = "__hindsite_navigate:";

const NAVIGATE_PLUGIN: &str = r#"function HindsitePlugin() {}
HindsitePlugin.identifier = 'hindsitePlugin';
HindsitePlugin.version = '0.1';
HindsitePlugin.prototype.reload = function(path) {
  var prefix = "__hindsite_navigate:";
  if (path.lastIndexOf(prefix, 0) !== 0) {
    return false;
  }
  path = path.substring(prefix.length);
  if (window.location.pathname === path) {
    window.location.reload();
  } else {
    window.location.pathname = path;
  }
  return true;
};
LiveReload.addPlugin(HindsitePlugin);"#;

const CHANNEL_BOUND: usize = 16;

// ============================================================================
// Options and Shared State
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub http_port: u16,
    /// `None` disables live reload.
    pub lr_port: Option<u16>,
    pub launch: bool,
    pub navigate: bool,
}

/// State read by the HTTP thread.
#[derive(Debug)]
struct ServerState {
    build_dir: PathBuf,
    urlprefix: String,
    lr_port: Option<u16>,
    navigate: bool,
    /// Path of the page the browser last requested, or a navigate directive.
    browser_url: String,
}

enum Message {
    Key(String),
    Change(ChangeEvent),
    WatchError(notify::Error),
    Quit,
}

// ============================================================================
// Server Entry Point
// ============================================================================

/// Build the site, then serve it and rebuild on change until `Q` or Ctrl+C.
pub fn serve_site(mut site: Site, opts: ServeOptions) -> Result<()> {
    if let Err(e) = site.build()
        && e.downcast_ref::<BuildError>().is_none()
    {
        return Err(e);
    }

    let state = Arc::new(RwLock::new(ServerState {
        build_dir: site.dirs.build.clone(),
        urlprefix: site.configs().effective_global_config().urlprefix.clone(),
        lr_port: opts.lr_port,
        navigate: opts.navigate,
        browser_url: "/".into(),
    }));
    let configs: Arc<RwLock<ConfigSet>> = Arc::new(RwLock::new(site.configs().clone()));
    let (tx, rx) = mpsc::sync_channel::<Message>(CHANNEL_BOUND);

    let watch_tx = tx.clone();
    watch::spawn(&site.dirs, Arc::clone(&configs), move |evt| {
        let msg = match evt {
            Ok(evt) => Message::Change(evt),
            Err(e) => Message::WatchError(e),
        };
        watch_tx.send(msg).is_ok()
    })?;

    let reloader = opts.lr_port.map(LiveReload::start).transpose()?;

    let addr = SocketAddr::from(([127, 0, 0, 1], opts.http_port));
    let server = Server::http(addr).map_err(|e| anyhow!("Failed to bind {addr}: {e}"))?;
    let server = Arc::new(server);

    let signal_tx = tx.clone();
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        signal_tx.try_send(Message::Quit).ok();
    })
    .context("Failed to set Ctrl+C handler")?;

    let (srv, st) = (Arc::clone(&server), Arc::clone(&state));
    thread::spawn(move || {
        for request in srv.incoming_requests() {
            if let Err(e) = handle_request(request, &st) {
                log!("serve"; "request error: {e}");
            }
        }
    });

    let key_tx = tx;
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if key_tx.send(Message::Key(line)).is_err() {
                break;
            }
        }
    });

    let root_url = format!("http://localhost:{}/", opts.http_port);
    help(&site.dirs.build, &root_url);
    if opts.launch {
        let root_url = root_url.clone();
        thread::spawn(move || {
            verbose!("serve"; "launching browser: {root_url}");
            if let Err(e) = launch_browser(&root_url) {
                log!("error"; "{e}");
            }
        });
    }

    let mut engine = Engine {
        site,
        state,
        configs,
        reloader,
        status: WatchStatus::new(),
        root_url,
    };
    let result = engine.run(&rx);
    server.unblock();
    result
}

// ============================================================================
// Engine
// ============================================================================

struct Engine {
    site: Site,
    state: Arc<RwLock<ServerState>>,
    configs: Arc<RwLock<ConfigSet>>,
    reloader: Option<LiveReload>,
    status: WatchStatus,
    root_url: String,
}

impl Engine {
    /// Process messages until quit. Watcher errors end the loop.
    fn run(&mut self, rx: &mpsc::Receiver<Message>) -> Result<()> {
        for msg in rx {
            match msg {
                Message::Key(line) => {
                    if !self.key(&line) {
                        break;
                    }
                }
                Message::Change(evt) => self.change(&evt),
                Message::WatchError(e) => return Err(e).context("file watcher"),
                Message::Quit => break,
            }
        }
        Ok(())
    }

    /// Handle a keyboard command. Returns `false` on quit.
    fn key(&mut self, line: &str) -> bool {
        self.status.detach();
        match line.trim().to_uppercase().as_str() {
            "R" => {
                log!("serve"; "rebuilding...");
                self.rebuild();
                self.reload();
            }
            "D" => {
                self.site.opts.drafts = !self.site.opts.drafts;
                log!("serve"; "drafts: {}", self.site.opts.drafts);
            }
            "N" => {
                let mut state = self.state.write();
                state.navigate = !state.navigate;
                log!("serve"; "navigation: {}", state.navigate);
            }
            "Q" => return false,
            _ => help(&self.site.dirs.build, &self.root_url),
        }
        true
    }

    fn change(&mut self, evt: &ChangeEvent) {
        let start = Instant::now();
        let full = fsx::path_is_in_dir(&evt.path, &self.site.dirs.template)
            && !fsx::path_is_in_dir(&evt.path, &self.site.dirs.content);
        if full || logger::verbosity() > 0 {
            self.status.detach();
        }
        let verb = match evt.op {
            Op::Create | Op::Write => "updated",
            Op::Remove | Op::Rename => "removed",
        };
        let path = self.site.dirs.shorten(&evt.path.display().to_string());
        match self.site.dispatch(evt) {
            Ok(url) => {
                if let Some(url) = url {
                    self.navigate_to(&url);
                }
                let elapsed = start.elapsed().as_secs_f64();
                self.status.success(&format!("{verb}: {path} ({elapsed:.3}s)"));
            }
            Err(e) => {
                let detail = self.site.dirs.shorten(&format!("{e:#}"));
                self.status.error(&format!("{verb}: {path}"), &detail);
            }
        }
        if full {
            self.sync_configs();
            self.status.detach();
        }
        self.reload();
    }

    fn rebuild(&mut self) {
        if let Err(e) = self.site.build()
            && e.downcast_ref::<BuildError>().is_none()
        {
            log!("error"; "{}", self.site.dirs.shorten(&format!("{e:#}")));
        }
        self.sync_configs();
    }

    /// Publish configuration that the watcher and HTTP threads read.
    fn sync_configs(&self) {
        *self.configs.write() = self.site.configs().clone();
        self.state.write().urlprefix = self
            .site
            .configs()
            .effective_global_config()
            .urlprefix
            .clone();
    }

    fn navigate_to(&self, url: &str) {
        let mut state = self.state.write();
        if !state.navigate || state.lr_port.is_none() {
            return;
        }
        let path = url.strip_prefix(state.urlprefix.as_str()).unwrap_or(url);
        verbose!("serve"; "navigate to: {path}");
        state.browser_url = format!("{NAVIGATE_PREFIX}{path}");
    }

    fn reload(&self) {
        if let Some(reloader) = &self.reloader {
            reloader.reload(&self.state.read().browser_url);
        }
    }
}

fn help(build_dir: &Path, root_url: &str) {
    log!(
        "serve";
        "Serving build directory \"{}\" on \"{root_url}\"\n\n\
         Press the R key followed by the Enter key to force a complete site rebuild\n\
         Press the D key followed by the Enter key to toggle the server -drafts option\n\
         Press the N key followed by the Enter key to toggle the server -navigate option\n\
         Press the Q key followed by the Enter key to exit\n\
         Press the Enter key to print help",
        build_dir.display()
    );
}

/// Open `url` with the platform browser launcher.
fn launch_browser(url: &str) -> Result<()> {
    let (cmd, args): (&str, &[&str]) = if cfg!(windows) {
        ("cmd", &["/c", "start"])
    } else if cfg!(target_os = "macos") {
        ("open", &[])
    } else {
        ("xdg-open", &[])
    };
    let launcher =
        which::which(cmd).with_context(|| format!("`{cmd}` not found, cannot launch browser"))?;
    Command::new(launcher)
        .args(args)
        .arg(url)
        .status()
        .with_context(|| format!("Failed to launch browser: {url}"))?;
    Ok(())
}

// ============================================================================
// Request Handling
// ============================================================================

/// Serve a file from the build directory. `/` and directory URLs resolve to
/// `index.html`.
fn handle_request(request: Request, state: &RwLock<ServerState>) -> Result<()> {
    let url_path = urlencoding::decode(request.url())
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    let path = url_path.split('?').next().unwrap_or_default().to_owned();
    verbose!("serve"; "request: {path}");

    if path.ends_with('/') || path.ends_with(".html") {
        state.write().browser_url = path.clone();
    }
    if path.split('/').any(|s| s == "..") {
        return serve_not_found(request);
    }

    let state = state.read();
    let mut file = state.build_dir.join(path.trim_start_matches('/'));
    if path.ends_with('/') || file.is_dir() {
        file.push("index.html");
    }
    if !file.is_file() {
        return serve_not_found(request);
    }
    if fsx::ext(&file) == ".html" {
        let content = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let content = filter_html(&content, &state);
        drop(state);
        return serve_html(request, content);
    }
    drop(state);
    serve_file(request, &file)
}

/// Inject live reload scripts and strip `urlprefix` from URLs.
fn filter_html(content: &str, state: &ServerState) -> String {
    let mut content = content.to_owned();
    if let Some(port) = state.lr_port {
        let tag = format!(
            "<script src=\"http://localhost:{port}/livereload.js\"></script>\n</body>"
        );
        content = content.replacen("</body>", &tag, 1);
        if state.navigate {
            let plugin = format!("<script>\n{NAVIGATE_PLUGIN}\n</script>\n</body>");
            content = content.replacen("</body>", &plugin, 1);
        }
    }
    html::strip_urlprefix(&content, &state.urlprefix)
}

// ============================================================================
// Response Helpers
// ============================================================================

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(path);

    let response = Response::from_data(content)
        .with_header(Header::from_bytes("Content-Type", content_type).unwrap());

    request.respond(response)?;
    Ok(())
}

fn serve_html(request: Request, content: String) -> Result<()> {
    let response = Response::from_string(content)
        .with_header(Header::from_bytes("Content-Type", "text/html; charset=utf-8").unwrap());
    request.respond(response)?;
    Ok(())
}

fn serve_not_found(request: Request) -> Result<()> {
    let response = Response::new(
        StatusCode(404),
        vec![Header::from_bytes("Content-Type", "text/plain").unwrap()],
        Cursor::new("404 Not Found"),
        Some(13),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Guess MIME content type from file extension.
fn guess_content_type(path: &Path) -> &'static str {
    match fsx::ext(path).as_str() {
        ".html" | ".htm" => "text/html; charset=utf-8",
        ".css" => "text/css; charset=utf-8",
        ".js" | ".mjs" => "application/javascript; charset=utf-8",
        ".json" => "application/json; charset=utf-8",
        ".xml" => "application/xml; charset=utf-8",
        ".svg" => "image/svg+xml",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".ico" => "image/x-icon",
        ".woff" => "font/woff",
        ".woff2" => "font/woff2",
        ".pdf" => "application/pdf",
        ".txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(lr_port: Option<u16>, navigate: bool, urlprefix: &str) -> ServerState {
        ServerState {
            build_dir: PathBuf::from("/site/build"),
            urlprefix: urlprefix.into(),
            lr_port,
            navigate,
            browser_url: "/".into(),
        }
    }

    #[test]
    fn test_filter_html() {
        let page = "<a href=\"/blog/x.html\">x</a></body>";
        let out = filter_html(page, &state(Some(35729), false, "/blog"));
        assert_eq!(
            out,
            "<a href=\"/x.html\">x</a>\
             <script src=\"http://localhost:35729/livereload.js\"></script>\n</body>"
        );

        let out = filter_html(page, &state(Some(35729), true, ""));
        assert!(out.contains("livereload.js"));
        assert!(out.contains(NAVIGATE_PREFIX));
        assert!(out.ends_with("</script>\n</body>"));

        let out = filter_html(page, &state(None, true, ""));
        assert_eq!(out, page);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a/b.CSS")), "text/css; charset=utf-8");
        assert_eq!(guess_content_type(Path::new("a/b")), "application/octet-stream");
    }
}
