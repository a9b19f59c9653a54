mod api;
mod auth;
mod cli;
mod config;
mod device;
mod diagnostics;
mod envelope;
mod error;
mod handshake;
mod normalize;
mod session;
mod store;
mod transport;

use anyhow::Result;
use clap::Parser;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "portalctl", about = "A Stalker-portal IPTV client")]
pub struct Args {
    #[arg(short = 'c', long, help = "One-shot command mode (e.g. \"channels 2\")")]
    pub command: Option<String>,

    #[arg(long, env = "PORTAL_URL", help = "Portal URL or bare hostname")]
    pub portal: Option<String>,

    #[arg(long, env = "PORTAL_MAC", help = "STB MAC address (AA:BB:CC:DD:EE:FF)")]
    pub mac: Option<String>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "State directory (session, history, diagnostics)")]
    pub state_dir: Option<PathBuf>,

    #[arg(long, value_name = "MS", help = "Request timeout in milliseconds")]
    pub timeout_ms: Option<u64>,

    #[arg(long, help = "Print raw JSON responses")]
    pub json: bool,

    #[arg(long, help = "Verbose output (print each URL pattern attempt)")]
    pub verbose: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load().unwrap_or_default()
    };

    // CLI overrides config
    if args.portal.is_some() {
        cfg.portal = args.portal.clone();
    }
    if args.mac.is_some() {
        cfg.mac = args.mac.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        cfg.timeout_ms = timeout_ms;
    }
    if args.state_dir.is_some() {
        cfg.state_dir = args.state_dir.clone();
    }

    if let Err(errors) = cfg.validate() {
        for error in &errors {
            eprintln!("Config error: {}", error);
        }
        return Err(anyhow::anyhow!("invalid configuration"));
    }

    let state_dir = cfg.state_dir();
    std::fs::create_dir_all(&state_dir)?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut diag = diagnostics::Diagnostics::new(cfg.diagnostics.buffer_size, &session_id);
    if cfg.diagnostics.enabled {
        let log_path = cfg
            .diagnostics
            .log_file
            .clone()
            .unwrap_or_else(|| state_dir.join("diagnostics.jsonl"));
        diag = diag.with_log_file(&log_path);
    }
    let diagnostics = Rc::new(RefCell::new(diag));

    let transport: Rc<dyn transport::Transport> =
        Rc::new(transport::HttpTransport::new(cfg.timeout_ms));
    let session_store = session::SessionStore::new(store::FileStore::new(&state_dir)?);
    let auth = auth::AuthManager::new(
        Rc::clone(&transport),
        session_store,
        Rc::clone(&diagnostics),
        &cfg.language,
        &cfg.timezone,
    );
    let api = api::PortalApi::new(auth, transport, Rc::clone(&diagnostics), args.verbose);

    let ctx = cli::Context {
        args,
        config: cfg,
        api: RefCell::new(api),
        diagnostics,
        session_id,
    };

    if let Some(command) = ctx.args.command.clone() {
        cli::run_once(&ctx, &command)
    } else {
        cli::run_repl(ctx)
    }
}
