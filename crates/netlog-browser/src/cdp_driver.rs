use crate::correlate::{Correlator, is_redirect_hop};
use crate::driver::{BrowserDriver, BrowserProfile, DriverConnection, DriverEvent, LaunchOptions};
use crate::{ChromeFinder, ChromeLauncher, Error, ProfileManager, Result};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, GetRequestPostDataParams, GetResponseBodyParams, RequestId,
    ResourceType as CdpResourceType, Response as CdpResponse,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::{
    AddBindingParams, EnableParams as RuntimeEnableParams, EventBindingCalled,
};
use futures::StreamExt;
use netlog_core::{RequestInfo, ResourceType, ResponseInfo};
use std::collections::BTreeMap;
use std::process::Child;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CONNECT_ATTEMPTS: u32 = 5;
const EVENT_BUFFER: usize = 1024;

/// Drives a locally launched Chrome over the DevTools Protocol
#[derive(Debug, Default)]
pub struct ChromeDriver;

impl ChromeDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn DriverConnection>> {
        let chrome_binary = ChromeFinder::new(options.chrome_path.clone()).find()?;
        tracing::info!("Using Chrome at {}", chrome_binary.display());

        let profile = match &options.profile {
            BrowserProfile::Temporary => ProfileManager::temporary()?,
            BrowserProfile::Named(name) => ProfileManager::named(name)?,
        };
        tracing::debug!("Chrome profile: {}", profile.path().display());

        let launcher = ChromeLauncher::new(chrome_binary, profile.path().to_path_buf())
            .with_debugging_port(options.debugging_port)
            .with_headless(options.headless);
        let mut child = launcher.launch()?;

        match ChromeConnection::connect(launcher.debugging_port()).await {
            Ok(mut connection) => {
                connection.child = Some(child);
                connection.profile = Some(profile);
                Ok(Box::new(connection))
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(e)
            }
        }
    }
}

/// Live CDP connection to one Chrome page
pub struct ChromeConnection {
    browser: Browser,
    page: Page,
    connected: Arc<AtomicBool>,
    events: Option<mpsc::Receiver<DriverEvent>>,
    handler_task: JoinHandle<()>,
    pump_task: JoinHandle<()>,
    child: Option<Child>,
    profile: Option<ProfileManager>,
}

impl ChromeConnection {
    /// Connect to a Chrome listening on `debugging_port` and start pumping events
    pub async fn connect(debugging_port: u16) -> Result<Self> {
        tracing::info!("CDP: connecting to Chrome on port {}", debugging_port);

        // Chrome may not be ready to accept connections yet
        let ws_url = format!("http://localhost:{}", debugging_port);
        let (browser, mut handler) = {
            let mut retries = CONNECT_ATTEMPTS;
            loop {
                match Browser::connect(&ws_url).await {
                    Ok(result) => break result,
                    Err(e) => {
                        retries -= 1;
                        if retries == 0 {
                            return Err(Error::Cdp(format!(
                                "Failed to connect to Chrome after {} attempts: {}",
                                CONNECT_ATTEMPTS, e
                            )));
                        }
                        tracing::debug!("CDP connection attempt failed, retrying... ({} left)", retries);
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
        };

        let connected = Arc::new(AtomicBool::new(true));

        // The handler must be polled for any browser command to complete
        let handler_connected = Arc::clone(&connected);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
            tracing::debug!("CDP handler stream ended");
            handler_connected.store(false, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        let page = match browser.pages().await?.into_iter().next() {
            Some(page) => page,
            None => browser.new_page("about:blank").await?,
        };

        page.execute(EnableParams::default()).await?;
        page.execute(RuntimeEnableParams::default()).await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let pump_task = tokio::spawn(pump_events(page.clone(), tx, Arc::clone(&connected)));

        tracing::info!("CDP: connected, network capture enabled");

        Ok(Self {
            browser,
            page,
            connected,
            events: Some(rx),
            handler_task,
            pump_task,
            child: None,
            profile: None,
        })
    }
}

#[async_trait]
impl DriverConnection for ChromeConnection {
    fn take_events(&mut self) -> Option<mpsc::Receiver<DriverEvent>> {
        self.events.take()
    }

    async fn expose_function(&mut self, name: &str) -> Result<()> {
        self.page.execute(AddBindingParams::new(name)).await?;
        Ok(())
    }

    async fn add_init_script(&mut self, source: &str) -> Result<()> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(source))
            .await?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn response_body(&mut self, request_id: &str) -> Result<Vec<u8>> {
        if is_redirect_hop(request_id) {
            return Ok(Vec::new());
        }

        let params = GetResponseBodyParams::new(RequestId::new(request_id));
        let body = self.page.execute(params).await?;

        if body.base64_encoded {
            base64::engine::general_purpose::STANDARD
                .decode(&body.body)
                .map_err(|e| Error::Cdp(format!("Invalid base64 response body: {}", e)))
        } else {
            Ok(body.body.clone().into_bytes())
        }
    }

    async fn page_url(&mut self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        let mut result = Ok(());
        if self.is_connected() {
            result = self.browser.close().await.map(|_| ()).map_err(Error::from);
        }
        self.connected.store(false, Ordering::SeqCst);

        self.pump_task.abort();
        self.handler_task.abort();

        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.profile = None;

        result
    }
}

fn resource_type(cdp_type: Option<&CdpResourceType>) -> ResourceType {
    match cdp_type {
        Some(CdpResourceType::Fetch) => ResourceType::Fetch,
        Some(CdpResourceType::Xhr) => ResourceType::Xhr,
        Some(CdpResourceType::Script) => ResourceType::Script,
        Some(CdpResourceType::Document) => ResourceType::Document,
        _ => ResourceType::Other,
    }
}

fn headers_map(value: &serde_json::Value) -> BTreeMap<String, String> {
    let Some(object) = value.as_object() else {
        return BTreeMap::new();
    };

    object
        .iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (name.clone(), value)
        })
        .collect()
}

fn response_info(response: &CdpResponse) -> ResponseInfo {
    let mut info = ResponseInfo::new(
        u16::try_from(response.status).unwrap_or_default(),
        response.status_text.clone(),
    );
    info.headers = headers_map(response.headers.inner());
    info
}

/// Forward CDP network and binding events onto the driver channel
///
/// A response is emitted once its body has finished loading (or failed after
/// headers arrived), so the body can be read immediately. Redirect hops are
/// emitted as soon as the follow-up request shows up.
async fn pump_events(page: Page, tx: mpsc::Sender<DriverEvent>, connected: Arc<AtomicBool>) {
    let listeners = async {
        Ok::<_, chromiumoxide::error::CdpError>((
            page.event_listener::<EventRequestWillBeSent>().await?,
            page.event_listener::<EventResponseReceived>().await?,
            page.event_listener::<EventLoadingFinished>().await?,
            page.event_listener::<EventLoadingFailed>().await?,
            page.event_listener::<EventBindingCalled>().await?,
        ))
    };

    let (mut requests, mut responses, mut finished, mut failed, mut bindings) = match listeners.await {
        Ok(streams) => streams,
        Err(e) => {
            tracing::warn!("CDP: failed to subscribe to network events: {}", e);
            connected.store(false, Ordering::SeqCst);
            return;
        }
    };

    let mut correlator = Correlator::new();

    loop {
        let events: Vec<DriverEvent> = tokio::select! {
            Some(event) = requests.next() => {
                let mut request = RequestInfo::new(
                    event.request.method.clone(),
                    event.request.url.clone(),
                    resource_type(event.r#type.as_ref()),
                );
                request.headers = headers_map(event.request.headers.inner());

                if event.request.has_post_data.unwrap_or(false) {
                    match page.execute(GetRequestPostDataParams::new(event.request_id.clone())).await {
                        Ok(post) => request.post_data = Some(post.post_data.clone()),
                        Err(e) => tracing::debug!("Could not read POST data for {}: {}", request.url, e),
                    }
                }

                tracing::trace!("Request: {} {}", request.method, request.url);
                let redirect = event.redirect_response.as_ref().map(response_info);
                correlator.on_request(event.request_id.inner(), request, redirect)
            }
            Some(event) = responses.next() => {
                correlator.on_response(event.request_id.inner(), response_info(&event.response));
                continue;
            }
            Some(event) = finished.next() => {
                correlator.on_finished(event.request_id.inner()).into_iter().collect()
            }
            Some(event) = failed.next() => {
                correlator
                    .on_failed(event.request_id.inner(), &event.error_text)
                    .into_iter()
                    .collect()
            }
            Some(event) = bindings.next() => {
                vec![DriverEvent::Binding {
                    name: event.name.clone(),
                    payload: event.payload.clone(),
                }]
            }
            else => break,
        };

        for event in events {
            if tx.send(event).await.is_err() {
                tracing::debug!("CDP: event receiver dropped, stopping pump");
                connected.store(false, Ordering::SeqCst);
                return;
            }
        }
    }

    tracing::debug!("CDP: event streams ended with {} requests in flight", correlator.pending());
    connected.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_mapping() {
        assert_eq!(resource_type(Some(&CdpResourceType::Xhr)), ResourceType::Xhr);
        assert_eq!(resource_type(Some(&CdpResourceType::Fetch)), ResourceType::Fetch);
        assert_eq!(resource_type(Some(&CdpResourceType::Document)), ResourceType::Document);
        assert_eq!(resource_type(Some(&CdpResourceType::Image)), ResourceType::Other);
        assert_eq!(resource_type(None), ResourceType::Other);
    }

    #[test]
    fn test_headers_map_stringifies_values() {
        let headers = serde_json::json!({"content-type": "application/json", "x-count": 3});
        let map = headers_map(&headers);
        assert_eq!(map["content-type"], "application/json");
        assert_eq!(map["x-count"], "3");
        assert!(headers_map(&serde_json::Value::Null).is_empty());
    }
}
