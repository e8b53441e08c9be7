use std::cell::RefCell;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::rc::Rc;

use tracing::{info, warn, Level};

use parlor_core::{Executor, SerProtocol, ServerEndpoint, ServiceContext, SharedService};
use parlor_network::{NetworkBackend, TcpTransport};
use parlor_services::{ChatService, LobbyService, Minigame, MinigameService};

use crate::cli::arguments::{GameKind, IpVersion, NetBackend, Run};
use crate::config::ServerConfig;

/// Unusable command line option values, reported with exit code 1.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct OptionsError(pub String);

/// Parses a logging level name, or its first letter.
fn parse_log_level(level: &str) -> Result<Level, OptionsError> {
    match level {
        "t" | "trace" => Ok(Level::TRACE),
        "d" | "debug" => Ok(Level::DEBUG),
        "i" | "info" => Ok(Level::INFO),
        "w" | "warn" => Ok(Level::WARN),
        "e" | "error" => Ok(Level::ERROR),
        unknown => Err(OptionsError(format!(
            "Unable to parse level \"{}\"",
            unknown
        ))),
    }
}

pub fn run(args: Run) -> eyre::Result<()> {
    let config = match &args.config {
        Some(path) => ServerConfig::from_path(path)?,
        None => ServerConfig::default(),
    };

    let level = match &args.log_level {
        Some(level) => parse_log_level(level)?,
        None => config.logger.level,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match args.net_backend {
        NetBackend::Tcp => {}
        NetBackend::Wss | NetBackend::UnsafeWs => {
            // The transport contract is where TLS/WebSocket backends plug
            // in; none is compiled into this build.
            return Err(OptionsError(
                "Websocket backends are not available in this build, use --net-backend tcp"
                    .to_owned(),
            )
            .into());
        }
    }
    if args.crt.is_some() || args.privkey.is_some() {
        warn!("TLS material is only used by the wss backend, ignoring");
    }

    let ip: IpAddr = match args.ip {
        IpVersion::V4 => Ipv4Addr::UNSPECIFIED.into(),
        IpVersion::V6 => Ipv6Addr::UNSPECIFIED.into(),
    };
    let port = args.port.unwrap_or(config.network.port);
    let local_endpoint = SocketAddr::new(ip, port);

    info!("Playing {:?} on {}", args.game, local_endpoint);

    /*
     * Online services, running inside one shared context.
     */

    let context = ServiceContext::new();

    let chat = Rc::new(RefCell::new(ChatService::new(
        &context,
        config.services.chat_cooldown_ms,
    )));

    let game = match args.game {
        GameKind::Acores => Minigame::Acores,
        GameKind::Bermudes => Minigame::Bermudes,
        GameKind::Canaries => Minigame::Canaries,
    };
    let minigame = Rc::new(RefCell::new(MinigameService::new(&context, game.provider())));
    let lobby = LobbyService::new_shared(
        &context,
        Rc::clone(&minigame),
        config.services.lobby_countdown_ms,
    );

    let ser_protocol = SerProtocol::new([
        Rc::clone(&chat) as SharedService,
        Rc::clone(&minigame) as SharedService,
        Rc::clone(&lobby) as SharedService,
    ])?;

    /*
     * Endpoint and executor wiring.
     */

    let transport = TcpTransport::bind(local_endpoint)?;
    let backend = NetworkBackend::new(transport, config.network.actors_limit);

    let joined_lobby = Rc::clone(&lobby);
    let left_lobby = Rc::clone(&lobby);
    let left_minigame = Rc::clone(&minigame);

    let mut executor = Executor::new(backend, ser_protocol)
        .on_joined(move |uid, name| {
            match joined_lobby.borrow_mut().assign_actor(uid) {
                Ok(player) => info!("Actor {} \"{}\" plays {}", uid, name, player),
                Err(err) => warn!("Actor {} \"{}\" not assigned: {}", uid, name, err),
            }
        })
        .on_left(move |uid, _reason| {
            // A departing player aborts the running game before freeing its
            // lobby slot.
            let was_playing = left_minigame.borrow().is_player(uid);
            if was_playing {
                left_minigame.borrow_mut().stop();
            }

            if let Err(err) = left_lobby.borrow_mut().remove_actor(uid) {
                warn!("Actor {} leaving: {}", uid, err);
            }
        });

    if args.testing {
        info!("Testing mode, server will be closed immediately");
        executor.endpoint_mut().close();
    }

    if executor.run() {
        info!("Successfully shut down");
        Ok(())
    } else {
        Err(eyre::eyre!("server stopped after an unhandled error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels_parse_by_name_or_letter() {
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("d").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("i").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("e").unwrap(), Level::ERROR);
        assert!(parse_log_level("verbose").is_err());
    }
}
