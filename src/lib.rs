pub mod config;
pub mod field;
pub mod led;
pub mod photon;
pub mod pipeline;
pub mod pose;
pub mod udp;
pub mod vision;
