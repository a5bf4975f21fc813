use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use spotdash::{config, error, info, server, success, warning};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about="Personal Spotify dashboard with audio-feature based recommendations",
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the dashboard web server
    Serve(ServeOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct ServeOptions {
    /// Address to bind, overrides SERVER_ADDRESS
    #[clap(long)]
    addr: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(opt) => {
            tracing_subscriber::registry()
                .with(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            if let Err(e) = config::load_env().await {
                error!("Cannot load environment. Err: {}", e);
            }
            let env_file = config::data_dir().join(".env");
            if !env_file.is_file() {
                warning!(
                    "No .env file at {}, using process environment only",
                    env_file.display()
                );
            }

            let mut config = match config::Config::from_env() {
                Ok(config) => config,
                Err(e) => error!("{}", e),
            };
            if let Some(addr) = opt.addr {
                config.server_addr = addr;
            }

            info!("Starting dashboard on http://{}", config.server_addr);
            if let Err(e) = server::start_api_server(config).await {
                error!("Server failed: {}", e);
            }
            success!("Dashboard stopped");
        }
        Command::Completions(opt) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
