// Browser capture: the driver seam, the Chrome/CDP driver and the capture session

mod cdp_driver;
mod chrome_finder;
mod correlate;
pub mod driver;
mod error;
mod launcher;
pub mod notify;
mod profile;
pub mod session;
pub mod vitals;

pub use cdp_driver::{ChromeConnection, ChromeDriver};
pub use chrome_finder::ChromeFinder;
pub use driver::{BrowserDriver, BrowserProfile, DriverConnection, DriverEvent, LaunchOptions};
pub use error::{Error, Result};
pub use launcher::ChromeLauncher;
pub use notify::Notification;
pub use profile::ProfileManager;
pub use session::{CaptureConfig, CaptureSession, SessionState, SessionStatus};
