//! Hindsite - a static website generator with incremental rebuilds and live reload.

mod cli;
mod config;
mod document;
mod index;
mod init;
mod livereload;
mod logger;
mod markup;
mod new;
mod serve;
mod site;
mod templates;
mod utils;
mod watch;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Commands, USAGE};
use config::{RawConfig, SiteDirs};
use init::init_site;
use new::new_document;
use serve::{ServeOptions, serve_site};
use site::{BuildOptions, Site};
use std::process::ExitCode;

const COMMANDS: &[&str] = &["init", "build", "serve", "new", "help"];

fn main() -> ExitCode {
    if std::env::args_os().len() <= 1 {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    let cli = match Cli::try_parse_from(cli::normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            e.print().ok();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            log!("error"; "{}", e.render().to_string().trim_end());
            return ExitCode::FAILURE;
        }
    };
    logger::set_verbosity(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log!("error"; "{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Help { topic } => help(topic.as_deref()),
        Commands::Init { from, .. } => init_site(&resolve_dirs(cli, true)?, from.as_deref()),
        Commands::New { paths, from } => {
            let dirs = resolve_dirs(cli, false)?;
            let Some(doc) = paths.last() else {
                bail!("document has not been specified");
            };
            new_document(&dirs, &load_vars(cli)?, doc, from.as_deref())
        }
        Commands::Build { .. } => load_site(cli)?.build(),
        Commands::Serve {
            port,
            launch,
            navigate,
            ..
        } => {
            let opts = ServeOptions {
                http_port: port.http,
                lr_port: port.lr,
                launch: *launch,
                navigate: *navigate,
            };
            serve_site(load_site(cli)?, opts)
        }
    }
}

fn help(topic: Option<&str>) -> Result<()> {
    if let Some(topic) = topic
        && !COMMANDS.contains(&topic)
    {
        bail!("illegal help topic: {topic}");
    }
    println!("{USAGE}");
    Ok(())
}

fn resolve_dirs(cli: &Cli, for_init: bool) -> Result<SiteDirs> {
    SiteDirs::resolve(
        cli.site_dir().as_deref(),
        cli.content.as_deref(),
        cli.template.as_deref(),
        cli.build.as_deref(),
        for_init,
    )
}

/// Configuration overrides from `-config` then each `-var`.
fn load_vars(cli: &Cli) -> Result<RawConfig> {
    let mut vars = match &cli.config {
        Some(f) => RawConfig::from_file(f)?,
        None => RawConfig::default(),
    };
    for var in &cli.vars {
        vars.parse_var(var)?;
    }
    Ok(vars)
}

fn load_site(cli: &Cli) -> Result<Site> {
    let opts = BuildOptions {
        drafts: cli.drafts,
        lint: cli.lint,
        keep: cli.keep,
    };
    Ok(Site::new(resolve_dirs(cli, false)?, load_vars(cli)?, opts))
}
