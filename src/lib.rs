pub mod config;
pub mod dataset;
pub mod elo;
pub mod features;
pub mod fixtures_fetch;
pub mod form;
pub mod http_client;
pub mod model;
pub mod predict;
pub mod season_fetch;
pub mod team_names;
