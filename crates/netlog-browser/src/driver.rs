//! Browser automation seam.
//!
//! A driver launches a browser and hands back a [`DriverConnection`]. The
//! connection pushes every observed request, response and exposed-function
//! callback onto one ordered channel, which the capture session consumes.

use crate::Result;
use async_trait::async_trait;
use netlog_core::{RequestInfo, ResponseInfo};
use std::path::PathBuf;
use tokio::sync::mpsc;

pub const DEFAULT_DEBUGGING_PORT: u16 = 9222;

/// Which browser profile directory to run with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BrowserProfile {
    /// Fresh profile, deleted when the connection is dropped
    #[default]
    Temporary,
    /// Named profile kept under `~/.netlog/profiles`
    Named(String),
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub chrome_path: Option<PathBuf>,
    pub profile: BrowserProfile,
    /// Page to open once hooks are installed
    pub start_url: Option<String>,
    pub headless: bool,
    pub debugging_port: u16,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            profile: BrowserProfile::Temporary,
            start_url: None,
            headless: false,
            debugging_port: DEFAULT_DEBUGGING_PORT,
        }
    }
}

/// Event observed by the driver
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// A request was issued
    Request {
        request_id: String,
        request: RequestInfo,
    },
    /// A response arrived for a previously issued request
    Response {
        request_id: String,
        request: RequestInfo,
        response: ResponseInfo,
    },
    /// Page script invoked an exposed host function
    Binding { name: String, payload: String },
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn DriverConnection>>;
}

#[async_trait]
pub trait DriverConnection: Send {
    /// Take the event channel. Returns `None` once taken.
    fn take_events(&mut self) -> Option<mpsc::Receiver<DriverEvent>>;

    /// Make `name` callable from page script; calls arrive as [`DriverEvent::Binding`]
    async fn expose_function(&mut self, name: &str) -> Result<()>;

    /// Run `source` in every new document before page scripts
    async fn add_init_script(&mut self, source: &str) -> Result<()>;

    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Read the body of a completed response
    async fn response_body(&mut self, request_id: &str) -> Result<Vec<u8>>;

    /// Current page URL, if known
    async fn page_url(&mut self) -> Option<String>;

    fn is_connected(&self) -> bool;

    /// Release browser resources
    async fn close(&mut self) -> Result<()>;
}
