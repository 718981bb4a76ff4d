mod api;
mod blockchain;
mod cli;
mod config;
mod peer;

use std::io;
use std::sync::Arc;
use std::thread;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use dotenvy::dotenv;
use env_logger::Env;
use log::{error, warn};
use tokio::runtime::Handle;

use api::AppState;
use blockchain::Ledger;
use config::NodeConfig;
use peer::{Envelope, MessageKind, PeerClient, PeerGateway};

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = NodeConfig::parse();

    let ledger = Ledger::with_limits(config.difficulty, config.mining_limits()).map_err(|e| {
        error!("cannot create ledger: {}", e);
        io::Error::other(e)
    })?;
    let ledger = Arc::new(ledger);

    // a node that cannot accept peers has nothing to do
    let gateway = PeerGateway::bind(
        config.listen_addr(),
        Arc::clone(&ledger),
        config.max_connections as usize,
    )
    .await
    .map_err(|e| {
        error!("unable to start listener on {}: {}", config.listen_addr(), e);
        e
    })?
    .with_read_timeout(config.read_timeout());

    let peer = config
        .peer
        .as_ref()
        .map(|addr| PeerClient::new(addr.clone(), Handle::current()));

    match &peer {
        Some(peer) => {
            println!("Attempting to connect to peer: {}", peer.address());
            let greeting = Envelope::new(
                MessageKind::NewPeer,
                format!("Hi from {}", config.listen_addr()),
            );
            if let Err(e) = peer.send(&greeting).await {
                warn!("error connecting to peer {}: {}", peer.address(), e);
            }
        }
        None => println!("No peer to connect to, waiting for connections..."),
    }

    // stdin reads block, so the command surface gets its own thread
    {
        let ledger = Arc::clone(&ledger);
        let peer = peer.clone();
        thread::spawn(move || {
            println!("{}", cli::HELP);
            let stdin = io::stdin();
            if let Err(e) = cli::run_commands(&ledger, peer.as_ref(), stdin.lock(), io::stdout()) {
                warn!("command input closed: {}", e);
            }
        });
    }

    let Some(http_port) = config.http_port else {
        gateway.serve().await;
        return Ok(());
    };

    actix_web::rt::spawn(gateway.serve());

    println!("⛓️ Starting ledger API at http://{}:{}", config.host, http_port);

    let state = web::Data::new(AppState::new(ledger, peer));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), http_port))?
    .run()
    .await
}
