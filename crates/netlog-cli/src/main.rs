use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use netlog_cli::commands::{self, capture::CaptureArgs};
use netlog_cli::{CaptureProfile, CategoryArg, OutputFormat};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "netlog")]
#[command(author, version)]
#[command(
    about = "Capture browser network traffic and Web Vitals to CSV reports",
    long_about = "netlog drives a Chrome window, records fetch/xhr/script/document traffic with \
                  timing, size and GraphQL operation details, samples Core Web Vitals, and exports \
                  both as CSV reports that can be listed, inspected, renamed and deleted."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Open Chrome and capture network traffic and Web Vitals
    Capture {
        /// URL to open once capture hooks are installed
        #[arg(long)]
        url: Option<String>,

        /// Resource types to capture
        #[arg(long, value_enum, default_value = "extended")]
        profile: CaptureProfile,

        /// Only capture these hosts (repeatable, comma-separated, globs like *.example.com)
        #[arg(long)]
        hosts: Vec<String>,

        /// Path to the Chrome binary
        #[arg(long, env = "NETLOG_CHROME_PATH")]
        chrome_path: Option<PathBuf>,

        /// Named persistent browser profile under ~/.netlog/profiles
        #[arg(long, value_name = "NAME")]
        browser_profile: Option<String>,

        /// Run Chrome without a window
        #[arg(long)]
        headless: bool,

        /// Directory holding network_logs/ and web_vitals/
        #[arg(long, env = "NETLOG_REPORTS_DIR", default_value = "reports")]
        reports_dir: PathBuf,

        /// Prefix for exported filenames
        #[arg(long)]
        prefix: Option<String>,

        /// How often the session checks for stop requests and browser liveness
        #[arg(long, default_value_t = 1000)]
        poll_interval_ms: u64,

        /// Forget request start times older than this many seconds
        #[arg(long)]
        pending_ttl_secs: Option<u64>,
    },

    /// Manage exported CSV reports
    Reports {
        /// Directory holding network_logs/ and web_vitals/
        #[arg(long, global = true, env = "NETLOG_REPORTS_DIR", default_value = "reports")]
        reports_dir: PathBuf,

        #[command(subcommand)]
        command: ReportsCommands,
    },

    /// Generate shell completion scripts
    #[command(long_about = "Generate shell completion scripts for netlog.\n\n\
        SUPPORTED SHELLS: bash, zsh, fish, powershell, elvish\n\n\
        INSTALLATION:\n  \
        bash: netlog completion --shell bash >> ~/.bashrc\n  \
        zsh:  netlog completion --shell zsh > ~/.zfunc/_netlog\n  \
        fish: netlog completion --shell fish > ~/.config/fish/completions/netlog.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ReportsCommands {
    /// List exported reports, newest first
    List {
        /// Only list one category
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },

    /// Print the rows of a report
    Show {
        /// Report path relative to the reports directory, e.g. network_logs/NL_010324_09:30:00AM.csv
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Rename a report within its category
    Rename {
        #[arg(value_name = "PATH")]
        path: String,

        /// New filename; .csv is appended when missing
        #[arg(value_name = "NEW_NAME")]
        new_name: String,
    },

    /// Delete a report
    Delete {
        #[arg(value_name = "PATH")]
        path: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Capture {
            url,
            profile,
            hosts,
            chrome_path,
            browser_profile,
            headless,
            reports_dir,
            prefix,
            poll_interval_ms,
            pending_ttl_secs,
        } => commands::capture::execute(
            CaptureArgs {
                url,
                profile: profile.into(),
                hosts,
                chrome_path,
                browser_profile,
                headless,
                reports_dir,
                prefix,
                poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
                pending_ttl: pending_ttl_secs.map(Duration::from_secs),
            },
            cli.format,
        ),
        Commands::Reports {
            reports_dir,
            command,
        } => match command {
            ReportsCommands::List { category } => {
                commands::reports::list(&reports_dir, category.map(Into::into), cli.format)
            }
            ReportsCommands::Show { path } => commands::reports::show(&reports_dir, &path, cli.format),
            ReportsCommands::Rename { path, new_name } => {
                commands::reports::rename(&reports_dir, &path, &new_name, cli.format)
            }
            ReportsCommands::Delete { path } => commands::reports::delete(&reports_dir, &path, cli.format),
        },
        Commands::Completion { shell } => commands::completion::execute(shell, &mut Cli::command()),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("netlog=debug,netlog_cli=debug,netlog_core=debug,netlog_browser=debug")
    } else {
        EnvFilter::new("netlog=info,netlog_cli=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
