pub mod config;
pub mod route_builder;
