//! Capture session state machine.
//!
//! `Idle -> Starting -> Active -> Stopping -> Idle`. One controller owns the
//! record sequences; a spawned consumer loop drains the driver's event channel
//! while the session is active. At most one session runs at a time per
//! controller, and a `start()` that finds it busy is rejected.

use crate::driver::{BrowserDriver, DriverConnection, DriverEvent, LaunchOptions};
use crate::notify::Notification;
use crate::vitals::{VitalSample, WEB_VITALS_BINDING, WEB_VITALS_SCRIPT};
use crate::{Error, Result};
use netlog_core::record::round2;
use netlog_core::{
    ExportOptions, Exporter, FilterProfile, HostFilter, NetworkRecord, RequestInfo, TimingTracker,
    WebVitalRecord,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;

const NOTIFICATION_CAPACITY: usize = 256;
const MAX_ERROR_MESSAGE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub is_running: bool,
    pub is_logging: bool,
    pub total_requests: usize,
    pub total_vitals: usize,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Resource types that are captured
    pub profile: FilterProfile,
    /// Hosts that are captured; empty captures all
    pub hosts: HostFilter,
    /// Liveness and stop-flag check interval
    pub poll_interval: Duration,
    /// Drop start timings older than this; `None` keeps them until resolved
    pub pending_ttl: Option<Duration>,
    pub launch: LaunchOptions,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            profile: FilterProfile::default(),
            hosts: HostFilter::default(),
            poll_interval: Duration::from_secs(1),
            pending_ttl: None,
            launch: LaunchOptions::default(),
        }
    }
}

/// State shared between the controller and its consumer loop
struct Shared {
    state: watch::Sender<SessionState>,
    logging: AtomicBool,
    records: Mutex<Vec<NetworkRecord>>,
    vitals: Mutex<Vec<WebVitalRecord>>,
    notifications: broadcast::Sender<Notification>,
}

impl Shared {
    fn notify(&self, notification: Notification) {
        // No subscribers is fine
        let _ = self.notifications.send(notification);
    }

    fn is_logging(&self) -> bool {
        self.logging.load(Ordering::SeqCst)
    }
}

/// Controller for one capture session
pub struct CaptureSession {
    driver: Arc<dyn BrowserDriver>,
    config: CaptureConfig,
    shared: Arc<Shared>,
}

impl CaptureSession {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: CaptureConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            driver,
            config,
            shared: Arc::new(Shared {
                state,
                logging: AtomicBool::new(false),
                records: Mutex::new(Vec::new()),
                vitals: Mutex::new(Vec::new()),
                notifications,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.shared.notifications.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    /// Launch the browser, install hooks and begin capturing
    pub async fn start(&self) -> Result<()> {
        // The flag is raised inside the claim so a concurrent stop() cannot be overwritten
        let claimed = self.shared.state.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Starting;
                self.shared.logging.store(true, Ordering::SeqCst);
                true
            } else {
                false
            }
        });

        if !claimed {
            tracing::warn!("Rejected start: session is {:?}", self.state());
            self.shared
                .notify(Notification::status("Error: A logging session is already running!"));
            return Err(Error::AlreadyRunning);
        }

        self.shared.notify(Notification::status("Starting browser..."));

        let (connection, events) = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!("Failed to start capture session: {}", e);
                self.shared.notify(Notification::status(format!(
                    "Error: {}",
                    truncate(&e.to_string(), MAX_ERROR_MESSAGE)
                )));
                self.shared.logging.store(false, Ordering::SeqCst);
                self.shared.state.send_replace(SessionState::Idle);
                return Err(e);
            }
        };

        self.shared.state.send_replace(SessionState::Active);
        self.shared.notify(Notification::status(
            "Browser opened! Navigate and perform actions. Close the browser or stop the session when done.",
        ));
        tracing::info!("Capture session active");

        let worker = CaptureLoop {
            connection,
            events,
            shared: Arc::clone(&self.shared),
            timings: TimingTracker::new(),
            profile: self.config.profile,
            hosts: self.config.hosts.clone(),
            poll_interval: self.config.poll_interval,
            pending_ttl: self.config.pending_ttl,
        };
        tokio::spawn(worker.run());

        Ok(())
    }

    async fn prepare(&self) -> Result<(Box<dyn DriverConnection>, mpsc::Receiver<DriverEvent>)> {
        let mut connection = self.driver.launch(&self.config.launch).await?;

        match install_hooks(connection.as_mut(), &self.config.launch).await {
            Ok(events) => Ok((connection, events)),
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    tracing::warn!("Failed to release browser after setup error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// Request a stop and wait until the session is idle again
    ///
    /// The consumer loop observes the request at its next poll tick. Calling
    /// this while idle just returns the current status.
    pub async fn stop(&self) -> SessionStatus {
        self.shared.logging.store(false, Ordering::SeqCst);
        self.wait().await;
        self.status().await
    }

    /// Wait until the session returns to idle (explicit stop or browser disconnect)
    pub async fn wait(&self) {
        let mut state = self.shared.state.subscribe();
        let _ = state.wait_for(|s| *s == SessionState::Idle).await;
    }

    /// Clear both record sequences
    pub async fn reset(&self) {
        self.shared.records.lock().await.clear();
        self.shared.vitals.lock().await.clear();
        tracing::info!("Capture logs cleared");
    }

    pub async fn status(&self) -> SessionStatus {
        SessionStatus {
            is_running: self.state() != SessionState::Idle,
            is_logging: self.shared.is_logging(),
            total_requests: self.shared.records.lock().await.len(),
            total_vitals: self.shared.vitals.lock().await.len(),
        }
    }

    pub async fn records(&self) -> Vec<NetworkRecord> {
        self.shared.records.lock().await.clone()
    }

    pub async fn vitals(&self) -> Vec<WebVitalRecord> {
        self.shared.vitals.lock().await.clone()
    }

    pub async fn export_network(&self, exporter: &Exporter, options: &ExportOptions) -> Result<PathBuf> {
        let records = self.records().await;
        Ok(exporter.export_network(&records, options)?)
    }

    pub async fn export_vitals(&self, exporter: &Exporter, options: &ExportOptions) -> Result<PathBuf> {
        let vitals = self.vitals().await;
        Ok(exporter.export_vitals(&vitals, options)?)
    }
}

async fn install_hooks(
    connection: &mut dyn DriverConnection,
    options: &LaunchOptions,
) -> Result<mpsc::Receiver<DriverEvent>> {
    let events = connection
        .take_events()
        .ok_or_else(|| Error::Browser("Driver event stream was already taken".to_string()))?;

    connection.expose_function(WEB_VITALS_BINDING).await?;
    connection.add_init_script(WEB_VITALS_SCRIPT).await?;

    if let Some(url) = &options.start_url {
        tracing::info!("Navigating to {}", url);
        connection.navigate(url).await?;
    }

    Ok(events)
}

fn truncate(message: &str, max_chars: usize) -> String {
    message.chars().take(max_chars).collect()
}

/// Single consumer of driver events while a session is active
struct CaptureLoop {
    connection: Box<dyn DriverConnection>,
    events: mpsc::Receiver<DriverEvent>,
    shared: Arc<Shared>,
    timings: TimingTracker,
    profile: FilterProfile,
    hosts: HostFilter,
    poll_interval: Duration,
    pending_ttl: Option<Duration>,
}

impl CaptureLoop {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        tracing::info!("Driver event channel closed");
                        self.shared.notify(Notification::status("Browser closed by user."));
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if !self.shared.is_logging() {
                        tracing::info!("Stop requested");
                        break;
                    }
                    if !self.connection.is_connected() {
                        tracing::info!("Browser disconnected");
                        self.shared.notify(Notification::status("Browser closed by user."));
                        break;
                    }
                    if let Some(ttl) = self.pending_ttl {
                        self.timings.evict_older_than(ttl);
                    }
                }
            }
        }

        self.shutdown().await;
    }

    fn accepts(&self, request: &RequestInfo) -> bool {
        self.profile.allows(request.resource_type) && self.hosts.allows(&request.url)
    }

    async fn handle(&mut self, event: DriverEvent) {
        if !self.shared.is_logging() {
            return;
        }

        match event {
            DriverEvent::Request { request, .. } => {
                if !self.accepts(&request) {
                    return;
                }
                self.timings.record_start(request.url.clone());
                tracing::debug!("[REQUEST] {} {} {}", request.resource_type, request.method, request.url);

                self.shared.notify(Notification::Request {
                    resource_type: request.resource_type.as_str().to_uppercase(),
                    method: request.method,
                    url: request.url,
                });
            }
            DriverEvent::Response {
                request_id,
                request,
                response,
            } => {
                if !self.accepts(&request) {
                    return;
                }

                let duration = self.timings.resolve(&request.url).unwrap_or_default();
                let size = match self.connection.response_body(&request_id).await {
                    Ok(body) => body.len() as u64,
                    Err(e) => {
                        tracing::debug!("Could not read body for {}: {}", request.url, e);
                        0
                    }
                };

                let record = netlog_core::extract(&request, Some(&response), duration, size);
                tracing::debug!(
                    "[RESPONSE] {} {} {:.2}ms {}B",
                    response.status,
                    record.url,
                    record.duration * 1000.0,
                    size
                );
                self.shared.records.lock().await.push(record);

                self.shared.notify(Notification::Response {
                    duration_ms: round2(duration.as_secs_f64() * 1000.0),
                    size,
                    url: request.url,
                    status: response.status,
                });
            }
            DriverEvent::Binding { name, payload } => {
                if name != WEB_VITALS_BINDING {
                    tracing::trace!("Ignoring binding call: {}", name);
                    return;
                }
                let Some(sample) = VitalSample::parse(&payload) else {
                    return;
                };

                let url = self.connection.page_url().await.unwrap_or_default();
                let record = WebVitalRecord::new(url, sample.name, sample.value, sample.rating);
                tracing::debug!("Web Vital captured: {} = {}", record.metric_name, record.value);

                self.shared.notify(Notification::WebVital {
                    name: record.metric_name.clone(),
                    value: record.value,
                    rating: record.rating,
                    url: record.url.clone(),
                });
                self.shared.vitals.lock().await.push(record);
            }
        }
    }

    async fn shutdown(mut self) {
        self.shared.state.send_replace(SessionState::Stopping);

        if let Err(e) = self.connection.close().await {
            tracing::warn!("Failed to release browser: {}", e);
        }
        if self.timings.pending() > 0 {
            tracing::debug!("{} requests never received a response", self.timings.pending());
        }

        self.shared.logging.store(false, Ordering::SeqCst);
        let total = self.shared.records.lock().await.len();
        self.shared.notify(Notification::status(format!(
            "Logging stopped. Captured {} requests.",
            total
        )));
        tracing::info!("Capture session stopped with {} requests", total);

        self.shared.state.send_replace(SessionState::Idle);
    }
}
