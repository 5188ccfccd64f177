// capsheet CLI - capability scenario worksheet, headless
//
// Each invocation opens the worksheet the way the dashboard does (default
// scenario, else the local draft), applies one command, flushes any pending
// auto-save and renders the result.

mod exit_codes;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use capsheet_api::{ApiError, ScenarioSummary};
use capsheet_config::{Draft, Settings};
use capsheet_worksheet::{
    AppContext, StartupOutcome, StatusLevel, StatusMessage, WorksheetController, WorksheetError,
};

use exit_codes::{api_exit_code, worksheet_exit_code, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "capsheet")]
#[command(about = "Capability scenario worksheet (CLI mode, headless)")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// API base URL (overrides settings)
    #[arg(long, global = true, env = "CAPSHEET_API_BASE", value_name = "URL")]
    api_base: Option<String>,

    /// User id (skips /api/current-user)
    #[arg(long = "user", global = true, env = "CAPSHEET_USER_ID", value_name = "ID")]
    user: Option<i64>,

    /// Directory for local drafts
    #[arg(long, global = true, value_name = "DIR")]
    draft_dir: Option<PathBuf>,

    /// Settings file (default: <config dir>/capsheet/settings.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Work on this scenario instead of the default one
    #[arg(long, global = true, value_name = "ID")]
    scenario: Option<i64>,

    /// Start from an empty worksheet even if a local draft exists
    #[arg(long, global = true)]
    ignore_draft: bool,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Machine-readable output on stdout
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or create the settings file
    #[command(subcommand)]
    Config(ConfigCommands),

    #[command(flatten)]
    Sheet(SheetCommand),
}

#[derive(Subcommand)]
enum SheetCommand {
    /// Show the worksheet: capabilities, activation and metrics
    #[command(after_help = "\
Examples:
  capsheet status
  capsheet status --controls
  capsheet --scenario 12 status --json")]
    Status {
        /// List each capability's controls
        #[arg(long)]
        controls: bool,
    },

    /// List saved scenarios (default first, newest first)
    Scenarios,

    /// Load a scenario
    Load {
        scenario_id: i64,
    },

    /// Drop the loaded scenario and start from an empty worksheet
    Unload,

    /// Toggle one or more capabilities on or off
    #[command(after_help = "\
Examples:
  capsheet toggle CAP-001
  capsheet toggle CAP-001 CAP-007")]
    Toggle {
        #[arg(required = true, value_name = "CAPABILITY_ID")]
        capability_ids: Vec<String>,
    },

    /// Toggle one control of an active capability
    ToggleControl {
        capability_id: String,
        control_id: String,
    },

    /// Activate every capability and all their controls
    ActivateAll,

    /// Deactivate everything
    ClearAll,

    /// Save into the loaded scenario (or the local draft when none is loaded)
    Save,

    /// Save the current selection as a new scenario
    SaveAs {
        name: String,
    },

    /// Create an empty scenario and switch to it
    New {
        name: String,
    },

    /// Delete the loaded scenario
    Delete {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Rename the loaded scenario
    Rename {
        name: String,
    },

    /// Make the loaded scenario open by default
    SetDefault {
        /// Clear the default flag instead
        #[arg(long)]
        off: bool,
    },

    /// Inspect, restore or discard the local draft
    #[command(subcommand)]
    Draft(DraftCommands),
}

#[derive(Subcommand)]
enum DraftCommands {
    /// Print the local draft, if any
    Show,
    /// Apply the local draft to the worksheet
    Restore,
    /// Delete the local draft
    Discard,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print effective settings (file + flags) as JSON
    Show,
    /// Print the settings file path
    Path,
    /// Write the effective settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
        "\nprofile: ", env!("BUILD_PROFILE"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let global = cli.global;
    let settings = effective_settings(&global);

    match cli.command {
        Commands::Config(cmd) => cmd_config(cmd, &settings, &global),
        Commands::Sheet(cmd) => cmd_worksheet(cmd, settings, &global),
    }
}

/// Settings file, then flags and environment on top.
fn effective_settings(global: &GlobalArgs) -> Settings {
    let mut settings = match &global.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    if let Some(base) = &global.api_base {
        settings.api_base = base.clone();
    }
    if let Some(user) = global.user {
        settings.user_id = Some(user);
    }
    if let Some(dir) = &global.draft_dir {
        settings.draft_dir = Some(dir.clone());
    }
    settings
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn api(err: ApiError) -> Self {
        let hint = api_hint(&err);
        Self { code: api_exit_code(&err), message: err.user_message(), hint }
    }

    /// Prefer the controller's status text, which carries the operation
    /// context, over the bare error.
    pub fn worksheet(err: &WorksheetError, status: Option<&StatusMessage>) -> Self {
        let message = status
            .filter(|s| matches!(s.level, StatusLevel::Error | StatusLevel::Warning))
            .map(|s| s.text.clone())
            .unwrap_or_else(|| err.user_message());
        let hint = match err {
            WorksheetError::Api(api) => api_hint(api),
            WorksheetError::NoScenarioBound => {
                Some("load a scenario first (capsheet --scenario <ID> ...) or use save-as".to_string())
            }
            WorksheetError::TreeNotLoaded => {
                Some("the capability tree is required; check the API server".to_string())
            }
            WorksheetError::Selection(_) => {
                Some("run `capsheet status` to see capability ids".to_string())
            }
            WorksheetError::InvalidName(_) => None,
        };
        Self { code: worksheet_exit_code(err), message, hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn api_hint(err: &ApiError) -> Option<String> {
    match err {
        ApiError::Network(_) => {
            Some("is the API server running? set --api-base or CAPSHEET_API_BASE".to_string())
        }
        ApiError::NotFound(_) => Some("list scenarios with `capsheet scenarios`".to_string()),
        ApiError::DuplicateName(_) => Some("choose a different name".to_string()),
        ApiError::Http(..) | ApiError::Parse(_) => None,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::general(format!("failed to encode output: {}", e)))?;
    println!("{}", output);
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config(cmd: ConfigCommands, settings: &Settings, global: &GlobalArgs) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(Settings::config_path);
    match cmd {
        ConfigCommands::Show => print_json(settings),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::args(format!("{} already exists", path.display()))
                    .with_hint("pass --force to overwrite it"));
            }
            settings
                .save_to(&path)
                .map_err(|e| CliError::general(format!("failed to write settings: {}", e)))?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        }
    }
}

// ============================================================================
// worksheet commands
// ============================================================================

enum Output {
    View { controls: bool },
    Scenarios(Vec<ScenarioSummary>),
    Draft(Option<Draft>),
    /// The controller declined; its status says why.
    Refused,
}

fn cmd_worksheet(cmd: SheetCommand, settings: Settings, global: &GlobalArgs) -> Result<(), CliError> {
    if let SheetCommand::Delete { yes: false } = cmd {
        return Err(CliError::args("refusing to delete without confirmation")
            .with_hint("pass --yes to delete the loaded scenario"));
    }

    let restore = !matches!(cmd, SheetCommand::Draft(_));
    let mut sheet = open_worksheet(settings, global, restore)?;

    let result = execute(&mut sheet, cmd).map_err(|e| CliError::worksheet(&e, sheet.status()));

    // Flush on exit; a failed save must not look like success
    let command_status = sheet.status().cloned();
    sheet.dismiss_status();
    if sheet.flush() {
        log::debug!("flushed pending auto-save");
    }
    let save_failure = sheet
        .status()
        .filter(|s| s.level == StatusLevel::Error)
        .map(|s| s.text.clone());

    let output = result?;
    if let Some(text) = save_failure {
        return Err(CliError::general(text).with_hint("the change was not saved; run the command again"));
    }

    if !global.json && !matches!(output, Output::Refused) {
        if let Some(status) = &command_status {
            eprintln!("{}", render::status_line(status));
        }
    }

    match output {
        Output::View { controls } => {
            let mut view = sheet.view();
            view.status = command_status;
            if global.json {
                print_json(&view)
            } else {
                print!("{}", render::worksheet(&view, controls));
                Ok(())
            }
        }
        Output::Scenarios(list) => {
            if global.json {
                print_json(&list)
            } else if list.is_empty() {
                eprintln!("No saved scenarios.");
                Ok(())
            } else {
                print!("{}", render::scenario_table(&list, sheet.binding().scenario_id()));
                Ok(())
            }
        }
        Output::Draft(draft) => {
            if global.json {
                print_json(&draft)
            } else {
                match draft {
                    Some(draft) => print!("{}", render::draft(&draft)),
                    None => eprintln!("No local draft."),
                }
                Ok(())
            }
        }
        Output::Refused => {
            let text = command_status.map(|s| s.text).unwrap_or_default();
            Err(CliError::general(text))
        }
    }
}

/// Startup, then `--scenario` or the local draft.
fn open_worksheet(settings: Settings, global: &GlobalArgs, restore: bool) -> Result<WorksheetController, CliError> {
    let mut ctx = AppContext::new(settings).map_err(CliError::api)?;
    ctx.resolve_user();
    let mut sheet = ctx.worksheet();

    let outcome = sheet
        .startup()
        .map_err(|e| CliError::worksheet(&e, sheet.status()))?;

    if let Some(scenario_id) = global.scenario {
        sheet
            .load(Some(scenario_id))
            .map_err(|e| CliError::worksheet(&e, sheet.status()))?;
    } else if let StartupOutcome::DraftAvailable(draft) = &outcome {
        if restore && !global.ignore_draft {
            log::info!(
                "restoring local draft ({} capabilities)",
                draft.active_capability_ids.len()
            );
            sheet.restore_draft();
        }
    }
    Ok(sheet)
}

fn execute(sheet: &mut WorksheetController, cmd: SheetCommand) -> Result<Output, WorksheetError> {
    let view = Output::View { controls: false };
    match cmd {
        SheetCommand::Status { controls } => Ok(Output::View { controls }),
        SheetCommand::Scenarios => sheet.list_scenarios().map(Output::Scenarios),
        SheetCommand::Load { scenario_id } => sheet.load(Some(scenario_id)).map(|_| view),
        SheetCommand::Unload => sheet.load(None).map(|_| view),
        SheetCommand::Toggle { capability_ids } => {
            for capability_id in &capability_ids {
                sheet.toggle_capability(capability_id)?;
            }
            Ok(view)
        }
        SheetCommand::ToggleControl { capability_id, control_id } => {
            sheet.toggle_control(&control_id, &capability_id)?;
            Ok(Output::View { controls: true })
        }
        SheetCommand::ActivateAll => sheet.activate_all().map(|_| view),
        SheetCommand::ClearAll => {
            sheet.clear_all();
            Ok(view)
        }
        SheetCommand::Save => sheet.save().map(|_| view),
        SheetCommand::SaveAs { name } => sheet.save_as(&name).map(|_| view),
        SheetCommand::New { name } => sheet.create_new(&name).map(|_| view),
        SheetCommand::Delete { .. } => sheet.delete().map(|_| view),
        SheetCommand::Rename { name } => sheet.rename(&name).map(|_| view),
        SheetCommand::SetDefault { off } => sheet.set_default(!off).map(|_| view),
        SheetCommand::Draft(DraftCommands::Show) => Ok(Output::Draft(sheet.pending_draft().cloned())),
        SheetCommand::Draft(DraftCommands::Restore) => {
            if sheet.restore_draft() {
                Ok(view)
            } else {
                Ok(Output::Refused)
            }
        }
        SheetCommand::Draft(DraftCommands::Discard) => {
            sheet.discard_draft();
            Ok(view)
        }
    }
}
