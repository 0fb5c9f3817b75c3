//! Command-line interface definitions.
//!
//! ```text
//! hindsite init  [SITE_DIR] -from TEMPLATE_DIR [OPTIONS]
//! hindsite build [SITE_DIR] [OPTIONS]
//! hindsite serve [SITE_DIR] [OPTIONS]
//! hindsite new   [SITE_DIR] DOCUMENT [OPTIONS]
//! hindsite help  [COMMAND]
//! ```
//!
//! Long options are written with a single dash (`-drafts`, `-port 8080:-1`);
//! [`normalize_args`] rewrites them for clap.

use crate::config::defaults::serve;
use clap::{Parser, Subcommand};
use std::{ffi::OsString, path::PathBuf};

/// Options accepted with a single leading dash.
const LONG_OPTIONS: &[&str] = &[
    "site", "content", "template", "build", "from", "port", "drafts", "lint", "launch",
    "navigate", "keep", "var", "config", "help", "version",
];

pub const USAGE: &str = "Hindsite is a static website generator.

Usage:

    hindsite init  [SITE_DIR] [OPTIONS]
    hindsite build [SITE_DIR] [OPTIONS]
    hindsite serve [SITE_DIR] [OPTIONS]
    hindsite new   [SITE_DIR] DOCUMENT [OPTIONS]
    hindsite help  [COMMAND]

Commands:

    init    initialize a new site
    build   build the website
    serve   start development webserver
    new     create a new content document
    help    display usage summary

Options:

    -site     SITE_DIR
    -content  CONTENT_DIR
    -template TEMPLATE_DIR
    -build    BUILD_DIR
    -from     SOURCE
    -port     [HTTP_PORT][:LR_PORT]
    -var      NAME=VALUE
    -config   CONFIG_FILE
    -drafts
    -lint
    -launch
    -navigate
    -keep
    -v
    -vv";

/// Hindsite static website generator CLI
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hindsite",
    version,
    about,
    long_about = None,
    disable_help_subcommand = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Site directory (default: current directory)
    #[arg(long, global = true)]
    pub site: Option<PathBuf>,

    /// Content directory (default: SITE_DIR/content)
    #[arg(long, global = true)]
    pub content: Option<PathBuf>,

    /// Template directory (default: SITE_DIR/template)
    #[arg(long, global = true)]
    pub template: Option<PathBuf>,

    /// Build directory (default: SITE_DIR/build)
    #[arg(long, global = true)]
    pub build: Option<PathBuf>,

    /// Publish draft documents
    #[arg(long, global = true)]
    pub drafts: bool,

    /// Check generated HTML for broken links and bad element ids
    #[arg(long, global = true)]
    pub lint: bool,

    /// Do not clear the build directory before building
    #[arg(long, global = true)]
    pub keep: bool,

    /// Set a configuration variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", global = true)]
    pub vars: Vec<String>,

    /// Configuration file merged into the root configuration
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new site from a template directory
    Init {
        site_dir: Option<PathBuf>,

        /// Directory of templates to copy into the template directory
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Build the website
    Build { site_dir: Option<PathBuf> },

    /// Start the development webserver. Rebuild and reload on change
    Serve {
        site_dir: Option<PathBuf>,

        /// HTTP and live reload ports; LR_PORT -1 disables live reload
        #[arg(long, value_name = "[HTTP_PORT][:LR_PORT]", value_parser = parse_ports, default_value = "")]
        port: Ports,

        /// Open the site in the default browser
        #[arg(long)]
        launch: bool,

        /// Point the browser at each document as it changes
        #[arg(long)]
        navigate: bool,
    },

    /// Create a new content document
    New {
        /// [SITE_DIR] DOCUMENT
        #[arg(required = true, num_args = 1..=2, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Document template file
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Display usage summary
    Help { topic: Option<String> },
}

impl Cli {
    /// Site directory from the positional argument or `-site`.
    pub fn site_dir(&self) -> Option<PathBuf> {
        let positional = match &self.command {
            Commands::Init { site_dir, .. }
            | Commands::Build { site_dir }
            | Commands::Serve { site_dir, .. } => site_dir.clone(),
            Commands::New { paths, .. } if paths.len() == 2 => Some(paths[0].clone()),
            Commands::New { .. } | Commands::Help { .. } => None,
        };
        positional.or_else(|| self.site.clone())
    }
}

// ============================================================================
// Ports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub http: u16,
    /// `None` disables live reload.
    pub lr: Option<u16>,
}

/// Parse `[HTTP_PORT][:LR_PORT]`; omitted parts take their defaults.
fn parse_ports(arg: &str) -> Result<Ports, String> {
    let illegal = || format!("illegal -port: {arg}");
    let (http, lr) = arg.split_once(':').unwrap_or((arg, ""));
    let http = match http {
        "" => serve::http_port(),
        p => p.parse().map_err(|_| illegal())?,
    };
    let lr = match lr {
        "" => Some(serve::lr_port()),
        "-1" => None,
        p => Some(p.parse().map_err(|_| illegal())?),
    };
    Ok(Ports { http, lr })
}

/// Rewrite single-dash long options (`-drafts`) as `--drafts`.
pub fn normalize_args<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| {
            let Some(s) = arg.to_str() else { return arg };
            let name = s.strip_prefix('-').unwrap_or_default();
            let name = name.split_once('=').map_or(name, |(n, _)| n);
            if !s.starts_with("--") && LONG_OPTIONS.contains(&name) {
                OsString::from(format!("-{s}"))
            } else {
                arg
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let args = normalize_args(args.iter().map(OsString::from));
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_normalize_args() {
        let args = normalize_args(["hindsite", "build", "-drafts", "-v", "-vv", "--lint", "-port=1"].map(OsString::from));
        assert_eq!(
            args,
            ["hindsite", "build", "--drafts", "-v", "-vv", "--lint", "--port=1"].map(OsString::from)
        );
    }

    #[test]
    fn test_parse_build() {
        let cli = parse(&["hindsite", "build", "blog", "-drafts", "-var", "author=Joe", "-var", "paginate=3", "-vv"]);
        assert!(matches!(cli.command, Commands::Build { .. }));
        assert_eq!(cli.site_dir(), Some(PathBuf::from("blog")));
        assert!(cli.drafts);
        assert!(!cli.lint);
        assert_eq!(cli.vars, ["author=Joe", "paginate=3"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_new() {
        let cli = parse(&["hindsite", "new", "content/posts/a.md"]);
        assert_eq!(cli.site_dir(), None);
        let cli = parse(&["hindsite", "new", "blog", "blog/content/a.md", "-from", "t.md"]);
        assert_eq!(cli.site_dir(), Some(PathBuf::from("blog")));
        let Commands::New { paths, from } = cli.command else { panic!("not new") };
        assert_eq!(paths[1], PathBuf::from("blog/content/a.md"));
        assert_eq!(from, Some(PathBuf::from("t.md")));
    }

    #[test]
    fn test_parse_ports() {
        assert_eq!(
            parse_ports("").unwrap(),
            Ports { http: serve::http_port(), lr: Some(serve::lr_port()) }
        );
        assert_eq!(parse_ports("8080").unwrap(), Ports { http: 8080, lr: Some(serve::lr_port()) });
        assert_eq!(parse_ports(":-1").unwrap(), Ports { http: serve::http_port(), lr: None });
        assert_eq!(parse_ports("1:2").unwrap(), Ports { http: 1, lr: Some(2) });
        assert_eq!(parse_ports("x").unwrap_err(), "illegal -port: x");
    }

    #[test]
    fn test_parse_serve() {
        let cli = parse(&["hindsite", "serve", "-port", "3000:-1", "-navigate"]);
        let Commands::Serve { port, launch, navigate, .. } = cli.command else { panic!("not serve") };
        assert_eq!(port, Ports { http: 3000, lr: None });
        assert!(navigate);
        assert!(!launch);
    }
}
