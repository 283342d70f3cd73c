pub mod board;
pub mod capture;
pub mod card;
pub mod collab;
pub mod host;
pub mod input;
pub mod menu;
pub mod metrics;
pub mod persist;
pub mod session;
