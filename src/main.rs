use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use transit_report::config::{
    CredentialSource, DEFAULT_COMPANY_ID, DEFAULT_COMPANY_NAME, DEFAULT_CREDENTIALS_FILE,
    DEFAULT_SHEET_KEY, DEFAULT_WORKSHEET, ServerConfig, Settings, SheetTarget,
};
use transit_report::retry::RetryPolicy;
use transit_report::sync::{self, RunOutcome};
use transit_report::{Result, logging};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    logging::init()?;
    let server = ServerConfig::from_env()?;

    match cli.command {
        Command::Export(args) => execute_export(server, args),
        Command::Companies(args) => execute_companies(server, args),
    }
}

fn execute_export(server: ServerConfig, args: ExportArgs) -> Result<()> {
    let sheet = (!args.skip_sheets).then(|| SheetTarget {
        sheet_key: args.sheet_key.clone(),
        worksheet: args.worksheet.clone(),
        credentials: CredentialSource::from_env_or(args.credentials_file.clone()),
    });

    let mut settings = Settings::new(server).with_retry(
        args.retry.max_retries,
        Duration::from_secs(args.retry.backoff_secs),
    );
    settings.company_id = args.company_id;
    settings.company_name = args.company_name;
    settings.output_dir = args.output_dir;
    settings.sheet = sheet;

    match sync::run(&settings)? {
        RunOutcome::Exported(summary) => {
            info!(rows = summary.rows, "export finished");
        }
        RunOutcome::NoData => {
            error!(company = %settings.company_name, "no GIT data fetched");
        }
        RunOutcome::CompanyRejected => {
            error!(company_id = settings.company_id, "company switch rejected, nothing fetched");
        }
    }
    Ok(())
}

fn execute_companies(server: ServerConfig, args: RetryArgs) -> Result<()> {
    let policy = RetryPolicy::new(args.max_retries, Duration::from_secs(args.backoff_secs));
    let user = sync::fetch_user_info(&server, policy)?;
    println!("{}", serde_json::to_string_pretty(&user.user_companies)?);
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Export the goods-in-transit report to Excel and Google Sheets."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the report for one company and export it.
    Export(ExportArgs),
    /// Log in and print the companies the user may access.
    Companies(RetryArgs),
}

#[derive(clap::Args)]
struct ExportArgs {
    /// Company whose shipments are exported.
    #[arg(long, default_value_t = DEFAULT_COMPANY_ID)]
    company_id: i64,

    /// Company name used in log messages.
    #[arg(long, default_value = DEFAULT_COMPANY_NAME)]
    company_name: String,

    /// Directory receiving the dated workbook.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Document key of the target spreadsheet.
    #[arg(long, default_value = DEFAULT_SHEET_KEY)]
    sheet_key: String,

    /// Worksheet replaced with the report.
    #[arg(long, default_value = DEFAULT_WORKSHEET)]
    worksheet: String,

    /// Service-account key file, used when GOOGLE_CREDS_BASE64 is unset.
    #[arg(long, default_value = DEFAULT_CREDENTIALS_FILE)]
    credentials_file: PathBuf,

    /// Only write the local workbook.
    #[arg(long)]
    skip_sheets: bool,

    #[command(flatten)]
    retry: RetryArgs,
}

#[derive(clap::Args)]
struct RetryArgs {
    /// Attempts per HTTP call before giving up.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Seconds to wait between attempts.
    #[arg(long, default_value_t = 3)]
    backoff_secs: u64,
}
