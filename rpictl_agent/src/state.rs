//! Shared agent state handed to every connection.

use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::board::{BoardContext, SysinfoSource};
use crate::config::AgentConfig;
use crate::notify::Broadcaster;
use crate::router::CommandRouter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub board: Arc<BoardContext>,
    pub router: Arc<CommandRouter>,
    pub broadcaster: Arc<Broadcaster>,

    // Connection bookkeeping
    pub client_count: Arc<AtomicUsize>,
    pub next_session: Arc<AtomicU64>,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Production state: board facts from cpuinfo, live figures from sysinfo.
    pub fn new(config: AgentConfig, shutdown: CancellationToken) -> Self {
        let board = BoardContext::load(
            &config.probes.paths.cpuinfo,
            config.board_ttl,
            Box::new(SysinfoSource),
        );
        Self::with_board(config, board, shutdown)
    }

    pub fn with_board(config: AgentConfig, board: BoardContext, shutdown: CancellationToken) -> Self {
        let board = Arc::new(board);
        let router = CommandRouter::new(config.probes.clone(), board.clone(), config.show_json);
        Self {
            config: Arc::new(config),
            board,
            router: Arc::new(router),
            broadcaster: Arc::new(Broadcaster::new()),
            client_count: Arc::new(AtomicUsize::new(0)),
            next_session: Arc::new(AtomicU64::new(1)),
            shutdown,
        }
    }
}
