use clap::Parser;
use std::path::PathBuf;

/// Execution mode for a job, selected by a mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Connect straight to a reachable client host and run the suite
    /// over the execution service.
    Direct,
    /// Submit the whole job to the queue service, which provisions
    /// hardware and runs it on our behalf.
    Queued,
}

// certrunner - orchestrates hardware certification test jobs
#[derive(Parser, Debug)]
#[clap(
    name = "certrunner",
    version,
    about = "Run hardware certification test suites against a device under test",
    after_help = "EXECUTION MODES:\n  --direct               Run the suite over the execution service on a reachable client host\n  --queued               Submit the job to the queue service for provisioning and execution\n\nEXAMPLES:\n  certrunner --direct --job-config jobs/install.json --client-ip 10.1.2.3\n  certrunner --direct --job-config jobs/install.json --client-ip 10.1.2.3 --dut-ip 10.1.2.4 --output-dir out/\n  certrunner --queued --job-config jobs/install.json --machine-id 202101-28595 --iso-url http://cdimage/noble.iso"
)]
pub struct CliArgs {
    // Direct mode - run the job against a reachable client host
    #[clap(
        long = "direct",
        conflicts_with = "queued",
        help = "Run the suite directly over the execution service"
    )]
    pub direct: bool,

    // Queued mode - submit the job to the external queue service
    #[clap(long = "queued", help = "Submit the job to the queue service")]
    pub queued: bool,

    // Job config - declarative description of the suite to run
    #[clap(long = "job-config", help = "JSON job config file", required = true)]
    pub job_config: PathBuf,

    // Client address - host running the execution service (direct mode)
    #[clap(long = "client-ip", help = "Address of the client host running the execution service")]
    pub client_ip: Option<String>,

    // DUT address - enables diagnostic log collection after the run
    #[clap(long = "dut-ip", help = "Address of the device under test, for log collection")]
    pub dut_ip: Option<String>,

    // Machine id - selects the job spec template (queued mode)
    #[clap(long = "machine-id", help = "Machine id used to select the job spec template")]
    pub machine_id: Option<String>,

    // ISO url - substituted into the job spec template (queued mode)
    #[clap(long = "iso-url", help = "URL of the image to test")]
    pub iso_url: Option<String>,

    // Output directory for the HTML report and collected logs
    #[clap(long = "output-dir", default_value = ".", help = "Directory for reports and logs")]
    pub output_dir: PathBuf,

    // Workspace root containing robot/ and the job spec templates
    #[clap(long = "root-dir", default_value = ".", help = "Workspace root directory")]
    pub root_dir: PathBuf,

    // Optional TOML file overriding the DUT SSH connection defaults
    #[clap(long = "connection-config", help = "TOML file with DUT connection settings")]
    pub connection_config: Option<PathBuf>,

    // Open the HTML report in a browser once the run finishes
    #[clap(long = "open-report", help = "Open the HTML report when the run finishes")]
    pub open_report: bool,

    // Verbose mode - show more log information
    #[clap(short = 'v', long = "verbose", help = "Enable verbose logging")]
    pub verbose: bool,

    // Quiet mode - suppress non-essential output
    #[clap(short = 'q', long = "quiet", help = "Suppress non-essential output")]
    pub quiet: bool,
}

impl CliArgs {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the selected execution mode, if any mode flag was given
    pub fn get_execution_mode(&self) -> Option<ExecutionMode> {
        if self.direct {
            Some(ExecutionMode::Direct)
        } else if self.queued {
            Some(ExecutionMode::Queued)
        } else {
            None
        }
    }

    /// Get log level
    pub fn get_log_level(&self) -> &str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
