pub mod fpl;
pub mod fpl_ownership;
pub mod fpl_players;

pub use fpl::FplClient;
pub use fpl_ownership::FplOwnershipAdapter;
pub use fpl_players::FplPlayersAdapter;
