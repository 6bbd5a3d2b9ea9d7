use crate::OutputFormat;
use anyhow::{Context, Result, anyhow, bail};
use console::style;
use netlog_browser::{
    BrowserProfile, CaptureConfig, CaptureSession, ChromeDriver, LaunchOptions, Notification, SessionStatus,
};
use netlog_core::{ExportOptions, Exporter, FilterProfile, HostFilter, Rating, ReportCategory, ReportStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Options for one `netlog capture` run
pub struct CaptureArgs {
    pub url: Option<String>,
    pub profile: FilterProfile,
    pub hosts: Vec<String>,
    pub chrome_path: Option<PathBuf>,
    pub browser_profile: Option<String>,
    pub headless: bool,
    pub reports_dir: PathBuf,
    pub prefix: Option<String>,
    pub poll_interval: Duration,
    pub pending_ttl: Option<Duration>,
}

impl CaptureArgs {
    fn config(&self) -> Result<CaptureConfig> {
        // Report names are checked up front so a bad prefix never costs a capture
        if let Some(prefix) = &self.prefix
            && prefix.contains(['/', '\\'])
        {
            bail!("Invalid prefix '{}': no path characters allowed", prefix);
        }

        let hosts = HostFilter::from_patterns(&self.hosts)?;
        let profile = match &self.browser_profile {
            Some(name) => BrowserProfile::Named(name.clone()),
            None => BrowserProfile::Temporary,
        };

        Ok(CaptureConfig {
            profile: self.profile,
            hosts,
            poll_interval: self.poll_interval,
            pending_ttl: self.pending_ttl,
            launch: LaunchOptions {
                chrome_path: self.chrome_path.clone(),
                profile,
                start_url: self.url.clone(),
                headless: self.headless,
                ..LaunchOptions::default()
            },
        })
    }
}

#[derive(Serialize)]
struct CaptureSummary {
    status: SessionStatus,
    network_report: Option<PathBuf>,
    vitals_report: Option<PathBuf>,
}

pub fn execute(args: CaptureArgs, format: OutputFormat) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(args, format));

    runtime.shutdown_timeout(Duration::from_millis(100));

    result
}

async fn run(args: CaptureArgs, format: OutputFormat) -> Result<()> {
    let config = args.config()?;
    let store = ReportStore::new(&args.reports_dir);
    store
        .ensure_dirs()
        .with_context(|| format!("Failed to prepare reports directory {}", args.reports_dir.display()))?;

    let session = CaptureSession::new(Arc::new(ChromeDriver::new()), config);
    let printer = tokio::spawn(print_notifications(session.subscribe(), format));

    if let Err(e) = session.start().await {
        drop(session);
        let _ = printer.await;
        return Err(e).context("Failed to start capture session");
    }

    if format == OutputFormat::Pretty {
        println!("{}", style("Press Ctrl+C to stop capturing.").dim());
    }

    tokio::select! {
        _ = session.wait() => {
            tracing::debug!("Session ended on its own");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            tracing::info!("Interrupted, stopping capture");
        }
    }

    let status = session.stop().await;

    let options = match &args.prefix {
        Some(prefix) => ExportOptions::with_prefix(prefix.clone()),
        None => ExportOptions::default(),
    };
    let network = Exporter::new(store.category_dir(ReportCategory::Network));
    let vitals = Exporter::new(store.category_dir(ReportCategory::Vitals));

    let network_result = session.export_network(&network, &options).await;
    let vitals_result = session.export_vitals(&vitals, &options).await;

    // Closing the notification channel ends the printer
    drop(session);
    let _ = printer.await;

    let (network_report, vitals_report) = combine_exports(network_result, vitals_result)?;

    match format {
        OutputFormat::Json => {
            let summary = CaptureSummary {
                status,
                network_report,
                vitals_report,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Pretty => {
            println!();
            println!("{}", style("Capture Summary").bold().cyan());
            println!("  Requests:   {}", status.total_requests);
            println!("  Web Vitals: {}", status.total_vitals);
            match network_report {
                Some(path) => println!("  {} {}", style("Network report:").green(), path.display()),
                None => println!("  {}", style("No requests to export.").yellow()),
            }
            match vitals_report {
                Some(path) => println!("  {} {}", style("Vitals report:").green(), path.display()),
                None => println!("  {}", style("No web vitals to export.").yellow()),
            }
        }
    }

    Ok(())
}

/// An empty sequence is not a failure for the capture command
fn exported(result: netlog_browser::Result<PathBuf>) -> Result<Option<PathBuf>> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(netlog_browser::Error::Core(netlog_core::Error::NothingToExport(what))) => {
            tracing::debug!("Nothing to export: {}", what);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Both exports are attempted; a failure names whatever did get written
fn combine_exports(
    network: netlog_browser::Result<PathBuf>,
    vitals: netlog_browser::Result<PathBuf>,
) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
    match (exported(network), exported(vitals)) {
        (Ok(network), Ok(vitals)) => Ok((network, vitals)),
        (Err(network), Err(vitals)) => Err(anyhow!(
            "Failed to export network report: {:#}; failed to export vitals report: {:#}",
            network,
            vitals
        )),
        (Err(e), Ok(vitals)) => Err(e.context(match vitals {
            Some(path) => format!("Failed to export network report (vitals report written to {})", path.display()),
            None => "Failed to export network report".to_string(),
        })),
        (Ok(network), Err(e)) => Err(e.context(match network {
            Some(path) => format!("Failed to export vitals report (network report written to {})", path.display()),
            None => "Failed to export vitals report".to_string(),
        })),
    }
}

async fn print_notifications(mut rx: broadcast::Receiver<Notification>, format: OutputFormat) {
    loop {
        match rx.recv().await {
            Ok(notification) => print_notification(&notification, format),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Dropped {} notifications", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_notification(notification: &Notification, format: OutputFormat) {
    if format == OutputFormat::Json {
        if let Ok(line) = serde_json::to_string(notification) {
            println!("{}", line);
        }
        return;
    }

    match notification {
        Notification::Status { message } if message.starts_with("Error:") => {
            println!("{}", style(message).red().bold());
        }
        Notification::Status { message } => println!("{}", style(message).cyan()),
        Notification::Request {
            resource_type,
            method,
            url,
        } => {
            println!(
                "{} {} {}",
                style(format!("[{}]", resource_type)).dim(),
                style(method).yellow(),
                url
            );
        }
        Notification::Response {
            duration_ms,
            size,
            url,
            status,
        } => {
            let status_text = if *status >= 400 {
                style(status.to_string()).red()
            } else {
                style(status.to_string()).green()
            };
            println!(
                "  {} {} {} {}",
                status_text,
                style(format!("{:.2}ms", duration_ms)).dim(),
                style(format!("{}B", size)).dim(),
                url
            );
        }
        Notification::WebVital {
            name,
            value,
            rating,
            url,
        } => {
            let rating_text = match rating {
                Rating::Good => style(rating.as_str()).green(),
                Rating::NeedsImprovement => style(rating.as_str()).yellow(),
                Rating::Poor => style(rating.as_str()).red(),
                Rating::Unknown => style(rating.as_str()).dim(),
            };
            println!(
                "{} {} = {} ({}) {}",
                style("[WEB VITAL]").magenta().bold(),
                name,
                value,
                rating_text,
                style(url).dim()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CaptureArgs {
        CaptureArgs {
            url: Some("https://example.com".to_string()),
            profile: FilterProfile::Minimal,
            hosts: vec!["example.com,*.example.com".to_string()],
            chrome_path: None,
            browser_profile: Some("work".to_string()),
            headless: true,
            reports_dir: PathBuf::from("reports"),
            prefix: None,
            poll_interval: Duration::from_millis(250),
            pending_ttl: Some(Duration::from_secs(60)),
        }
    }

    #[test]
    fn test_builds_capture_config() {
        let config = args().config().unwrap();

        assert_eq!(config.profile, FilterProfile::Minimal);
        assert!(config.hosts.allows("https://api.example.com/v1"));
        assert!(!config.hosts.allows("https://tracker.io/collect"));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.pending_ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.launch.profile, BrowserProfile::Named("work".to_string()));
        assert_eq!(config.launch.start_url.as_deref(), Some("https://example.com"));
        assert!(config.launch.headless);
    }

    #[test]
    fn test_invalid_host_pattern_is_rejected() {
        let mut args = args();
        args.hosts = vec!["[*".to_string()];
        assert!(args.config().is_err());
    }

    #[test]
    fn test_nothing_to_export_is_not_an_error() {
        let empty = Err(netlog_browser::Error::Core(netlog_core::Error::NothingToExport("requests")));
        assert_eq!(exported(empty).unwrap(), None);

        let failed = Err(netlog_browser::Error::Core(netlog_core::Error::InvalidFilename("a/b".to_string())));
        assert!(exported(failed).is_err());
    }

    #[test]
    fn test_prefix_with_path_characters_is_rejected() {
        for prefix in ["team/a", "..\\up"] {
            let mut args = args();
            args.prefix = Some(prefix.to_string());
            let err = args.config().unwrap_err();
            assert!(err.to_string().contains("Invalid prefix"), "{}", err);
        }

        let mut args = args();
        args.prefix = Some("checkout".to_string());
        assert!(args.config().is_ok());
    }

    fn invalid(name: &str) -> netlog_browser::Result<PathBuf> {
        Err(netlog_browser::Error::Core(netlog_core::Error::InvalidFilename(name.to_string())))
    }

    #[test]
    fn test_one_failed_export_keeps_the_other() {
        let written = PathBuf::from("reports/web_vitals/WV_checkout.csv");
        let err = combine_exports(invalid("NL_bad"), Ok(written)).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Failed to export network report"), "{}", message);
        assert!(message.contains("WV_checkout.csv"), "{}", message);

        let empty = Err(netlog_browser::Error::Core(netlog_core::Error::NothingToExport("requests")));
        let err = combine_exports(empty, invalid("WV_bad")).unwrap_err();
        assert!(format!("{:#}", err).starts_with("Failed to export vitals report"));
    }

    #[test]
    fn test_both_failed_exports_are_reported() {
        let err = combine_exports(invalid("NL_bad"), invalid("WV_bad")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("NL_bad"), "{}", message);
        assert!(message.contains("WV_bad"), "{}", message);
    }

    #[test]
    fn test_successful_exports_pass_through() {
        let network = PathBuf::from("reports/network_logs/NL_a.csv");
        let vitals = Err(netlog_browser::Error::Core(netlog_core::Error::NothingToExport("web vitals")));
        let (network_report, vitals_report) = combine_exports(Ok(network.clone()), vitals).unwrap();
        assert_eq!(network_report, Some(network));
        assert_eq!(vitals_report, None);
    }
}
