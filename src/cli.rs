//! Command-line interface definition for onenote-sync
//!
//! The binary is a small reference host: each invocation builds a fresh
//! session for `--user`, restores the access token from the stored refresh
//! token when needed, and runs one operation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::onenote::sync::Course;

/// onenote-sync - OneNote notebooks for course hosts
///
/// Sign in with a Microsoft account, browse notebooks, mirror courses as
/// sections and download pages.
#[derive(Parser, Debug, Clone)]
#[command(name = "onenote-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Skip the course → section sync on top-level listings
    #[arg(long)]
    pub no_sync: bool,

    /// Override the database location
    #[arg(long, env = "ONENOTE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Host-application user the tokens belong to
    #[arg(short, long, env = "ONENOTE_USER", default_value = "local")]
    pub user: String,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the URL the user must visit to authorize the application
    LoginUrl,

    /// Exchange an authorization code for tokens
    Login {
        /// The `code` query parameter from the redirect
        #[arg(long)]
        code: String,
    },

    /// Report whether the user is signed in
    Status,

    /// List notebooks, sections of a notebook, or pages of a section
    List {
        /// Listing path: empty, `/<notebook>` or `/<notebook>/<section>`
        #[arg(default_value = "")]
        path: String,

        /// Enrolled course as ID=NAME (repeatable); used by the hierarchy sync
        #[arg(long = "course", value_parser = parse_course)]
        courses: Vec<Course>,

        /// Print items as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve the display name of a notebook or section id
    Name {
        /// Notebook or section id
        id: String,
    },

    /// Download a page as HTML, or as a zip archive when it has images
    Download {
        /// Page id
        page_id: String,

        /// Destination file
        output: PathBuf,
    },

    /// Show recorded course → section mappings
    Mappings,

    /// Delete the stored refresh token
    Forget,
}

/// Parse `ID=NAME` into a [`Course`]
pub fn parse_course(raw: &str) -> std::result::Result<Course, String> {
    match raw.split_once('=') {
        Some((id, name)) if !id.trim().is_empty() && !name.trim().is_empty() => {
            Ok(Course::new(id.trim(), name.trim()))
        }
        _ => Err(format!("expected ID=NAME, got '{}'", raw)),
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
