use clap::Parser;
use client::connection::Connection;
use client::game::{EntryMode, GameClient, IdleInput};
use client::transport::UdpTransport;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Local player identity; a guest identity is generated if omitted
    #[arg(short = 'u', long)]
    user_id: Option<String>,

    /// Character archetype (1 = rabbit, 2 = santa, 3 = ghost)
    #[arg(short = 'c', long, default_value = "1")]
    char_type: u8,

    /// Tournament game session id; launches directly instead of
    /// entering the lobby
    #[arg(long)]
    game_session_id: Option<String>,

    /// Linked external account id for the tournament launch
    #[arg(long)]
    account_id: Option<String>,

    /// Enter the lobby in special-event mode
    #[arg(long, default_value = "false")]
    kem: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    // Tournament sessions connect under the external session id; a
    // new identity always means a new connection.
    let identity = args
        .game_session_id
        .clone()
        .or(args.user_id.clone())
        .unwrap_or_else(|| format!("guest-{:08x}", rand::random::<u32>()));

    let entry = match args.game_session_id.clone() {
        Some(game_session_id) => EntryMode::Tournament {
            game_session_id,
            account_id: args.account_id.clone(),
        },
        None => EntryMode::Room { is_kem: args.kem },
    };

    info!("Connecting to {} as '{}'", args.server, identity);

    let transport = UdpTransport::connect(&args.server).await?;
    let connection = Connection::open(Box::new(transport), identity);
    let mut game = GameClient::new(connection, args.char_type, entry, Box::new(IdleInput));

    game.run().await?;

    Ok(())
}
