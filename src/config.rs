//! This module holds the configuration for the server

use std::net::IpAddr;

use actix_toolbox::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Configuration regarding the server
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct ServerConfig {
    /// The address the server should bind to
    pub listen_address: IpAddr,
    /// The port the server should bind to
    pub listen_port: u16,
    /// Base64 encoded secret key
    ///
    /// The key is used to sign and verify session cookies.
    /// Use the `keygen` subcommand to generate a fresh one.
    pub secret_key: String,
    /// The token that grants access to the admin endpoints
    pub admin_token: String,
}

/// Configuration regarding the database
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct DBConfig {
    /// The host the database is accessible on
    pub host: String,
    /// The port the database is listening on
    pub port: u16,
    /// The name of the database
    pub name: String,
    /// The user to connect to the database with
    pub user: String,
    /// The password of the database user
    pub password: String,
}

/// This struct can be parsed from the configuration file
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Configuration regarding the server
    pub server: ServerConfig,
    /// Configuration regarding the database
    pub database: DBConfig,
    /// The logging configuration
    pub logging: LoggingConfig,
}
