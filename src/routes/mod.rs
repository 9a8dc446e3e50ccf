pub mod health;
pub mod playlist;
pub mod proxy;
pub mod stalker;
pub mod xtream;
