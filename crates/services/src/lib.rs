//! Reference services of the parlor game server: chat, lobby and the
//! turn-based minigame controller, plus the board-game substrate the three
//! shipped minigames are built on.
pub mod axis;
pub mod board;
pub mod chat;
pub mod grid;
pub mod lobby;
pub mod minigame;

pub mod acores;
pub mod bermudes;
pub mod canaries;

pub use acores::Acores;
pub use axis::{AxisIterator, AxisType};
pub use bermudes::Bermudes;
pub use board::{BoardGame, GameCore, GameError, GridUpdate, Player};
pub use canaries::Canaries;
pub use chat::ChatService;
pub use grid::{Coordinates, Grid, Square};
pub use lobby::LobbyService;
pub use minigame::{BoardGameProvider, Minigame, MinigameService};
