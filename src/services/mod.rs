pub mod m3u_parser;
pub mod stalker;
pub mod xtream;
