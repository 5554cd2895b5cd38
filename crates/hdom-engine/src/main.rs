//! hdom - Main Entry Point

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hdom_engine::{control, transport, Callbacks, Command, Config, Controller};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Headless scriptable DOM
#[derive(Parser, Debug)]
#[command(name = "hdom", version, about)]
struct Args {
    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Serve the control protocol on this address instead of running once
    #[arg(short = 's', long = "serve", env = "HDOM_LISTEN")]
    serve: Option<SocketAddr>,

    /// Bootstrap HTML file
    #[arg(short = 'H', long = "html")]
    html: Option<PathBuf>,

    /// Page URL used for `location` and relative requests
    #[arg(long, default_value = "https://example.com/")]
    origin: String,

    /// Page scripts, run in order
    scripts: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting hdom {}", hdom_engine::VERSION);

    let html = match &args.html {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?,
        None => String::new(),
    };
    let scripts = args
        .scripts
        .iter()
        .map(|path| std::fs::read_to_string(path).with_context(|| format!("read {}", path.display())))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let config = Config {
        origin: args.origin.clone(),
        ..Config::default()
    };
    let origin = config.origin_url()?;
    let callbacks = Callbacks {
        xhr: Some(transport::http_transport(origin, &config.user_agent, config.exec_timeout)?),
        ..Callbacks::default()
    };
    let mut controller = Controller::new(html, scripts, config, callbacks);

    match args.serve {
        Some(addr) => smol::block_on(control::serve(addr, controller))?,
        None => {
            if let Some(html) = controller.handle(&Command::Start)? {
                println!("{html}");
            }
            controller.handle(&Command::Stop)?;
        }
    }
    Ok(())
}
