use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use backport::analyzer::{parse_merged_after, AnalysisInput, DependencyAnalyzer};
use backport::config::BackportConfig;
use backport::engine::{BatchSpec, CherryPickEngine, EngineOptions, StdinPrompter};
use backport::error::BackportError;
use backport::github::GhCli;
use backport::model::{parse_pr_references, ErrorKind, TargetBranch, ValidationError, Version};
use backport::report::OutputFormat;
use backport::status::BackportStatus;
use backport::telemetry;

use backport_git::{GitCli, Vcs};

/// Backport orchestration for release and staging branches
///
/// Automates cherry-picking merged mainline PRs onto release/staging
/// branches. Each cherry-pick runs in an isolated worktree, so your
/// working directory is never touched; conflicts are reported with the
/// retained worktree path for manual resolution.
///
/// TYPICAL FLOW:
///
///   # cherry-pick two PRs onto a release branch
///   backport pick release/1.7.2511 2680 2681
///
///   # discover PRs via the backport_1.7.2511 label on main
///   backport pick release/1.7.2511 --from-backport-label
///
///   # a pick conflicted? find the missing prerequisites
///   backport analyze --file src/widget.rs --target release/1.7.2511
///
///   # where does the backport stand overall?
///   backport status 1.7.2511
#[derive(Parser)]
#[command(name = "backport")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'backport <command> --help' for details on a specific command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create cherry-pick PRs for merged mainline PRs
    ///
    /// Resolves a deterministic processing order from the mainline's
    /// first-parent history, skips changes already present on the target,
    /// and attempts the rest one by one in isolated worktrees. A conflict
    /// on one change never stops the batch; the final report partitions
    /// every change into success/conflict/skipped/failed.
    Pick(PickArgs),

    /// Find missing prerequisite PRs for a file or a PR
    ///
    /// Lists every merged mainline PR that touched the same file(s),
    /// classifies each against the target branch (already present,
    /// missing, or cherry-pick in flight), and suggests a backport order
    /// by merge time. Read-only.
    Analyze(AnalyzeArgs),

    /// Show backport status for a version
    ///
    /// Partitions the merged PRs labeled backport_<version> into
    /// backported / in flight / pending against the target branch.
    /// Read-only.
    Status(StatusArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Args)]
struct PickArgs {
    /// Target branch (release/X.Y.Z or staging/X.Y.Z)
    target_branch: String,

    /// PR numbers or URLs
    prs: Vec<String>,

    /// Discover PRs from the backport_<version> label on the mainline
    #[arg(long)]
    from_backport_label: bool,

    /// Show planned actions without side effects
    #[arg(long)]
    dry_run: bool,

    /// Skip interactive confirmation prompts
    #[arg(long)]
    no_confirm: bool,

    /// Keep worktrees after successful cherry-picks
    #[arg(long)]
    keep_worktree: bool,

    /// Remove worktrees even after conflicts (destroys diagnostic state)
    #[arg(long)]
    force_cleanup: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// File path to analyze (which PRs modified this file)
    #[arg(long, conflicts_with = "pr", required_unless_present = "pr")]
    file: Option<String>,

    /// PR number to analyze (find prerequisites for this PR)
    #[arg(long)]
    pr: Option<String>,

    /// Target branch to check against (e.g. release/1.7.2511)
    #[arg(long)]
    target: String,

    /// Only consider PRs merged after this date (YYYY-MM-DD)
    #[arg(long)]
    merged_after: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct StatusArgs {
    /// Release version (e.g. 1.7.2511)
    version: String,

    /// Branch to measure against (default: release/<version>)
    #[arg(long)]
    branch: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Repository as owner/repo for GitHub queries (default: current repo)
    #[arg(long, short = 'R')]
    repo: Option<String>,

    /// Git remote to use (auto-detected if not set: upstream, then origin)
    #[arg(long)]
    remote: Option<String>,

    /// Output format
    #[arg(long, default_value = "text")]
    format: OutputFormat,
}

fn main() -> ExitCode {
    telemetry::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Pick(args) => run_pick(&args),
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Status(args) => run_status(&args),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "backport",
                &mut std::io::stdout(),
            );
            Ok(0)
        }
    };

    match result {
        Ok(code) => exit_from(code),
        Err(err) => {
            eprintln!("ERROR: {err}");
            exit_from(err.exit_code())
        }
    }
}

fn exit_from(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Resolved per-invocation context shared by all commands.
struct Session {
    repo_root: PathBuf,
    config: BackportConfig,
    vcs: GitCli,
    store: GhCli,
    remote: String,
}

impl Session {
    fn open(common: &CommonArgs) -> Result<Self, BackportError> {
        let repo_root = std::env::current_dir()?;
        let config = BackportConfig::load(&repo_root)?;
        let timeout = config.limits.command_timeout();
        let vcs = GitCli::new(repo_root.clone()).with_timeout(timeout);
        let repo = common.repo.clone().or_else(|| config.repo.github.clone());
        let store = GhCli::new(repo, timeout);
        let remote = common
            .remote
            .clone()
            .or_else(|| config.repo.remote.clone())
            .unwrap_or_else(|| detect_remote(&vcs));
        Ok(Self {
            repo_root,
            config,
            vcs,
            store,
            remote,
        })
    }

    fn mainline(&self) -> &str {
        &self.config.repo.mainline
    }
}

/// Upstream-remote auto-detection: prefer `upstream`, then `origin`, then
/// the sole configured remote.
fn detect_remote(vcs: &GitCli) -> String {
    let Ok(remotes) = vcs.remotes() else {
        return "origin".to_owned();
    };
    if remotes.len() == 1 {
        return remotes[0].clone();
    }
    for preferred in ["upstream", "origin"] {
        if remotes.iter().any(|r| r == preferred) {
            return preferred.to_owned();
        }
    }
    remotes.first().cloned().unwrap_or_else(|| "origin".to_owned())
}

fn run_pick(args: &PickArgs) -> Result<i32, BackportError> {
    let target = TargetBranch::parse_backport_target(&args.target_branch)?;
    let spec = if args.from_backport_label {
        let version = target.version().ok_or_else(|| {
            BackportError::Validation(ValidationError {
                kind: ErrorKind::Branch,
                value: args.target_branch.clone(),
                reason: "label discovery needs a versioned target branch".to_owned(),
            })
        })?;
        BatchSpec::ByLabel(version.backport_label())
    } else {
        let numbers = parse_pr_references(&args.prs)?;
        if numbers.is_empty() {
            return Err(BackportError::Validation(ValidationError {
                kind: ErrorKind::PrNumber,
                value: String::new(),
                reason: "provide PR numbers or use --from-backport-label".to_owned(),
            }));
        }
        BatchSpec::Explicit(numbers)
    };

    let session = Session::open(&args.common)?;
    let opts = EngineOptions {
        dry_run: args.dry_run,
        keep_worktree: args.keep_worktree,
        force_cleanup: args.force_cleanup,
        confirm: !args.no_confirm && !args.dry_run,
    };

    let mut engine = CherryPickEngine::new(
        &session.vcs,
        &session.store,
        &session.repo_root,
        session.remote.clone(),
        session.mainline(),
    );
    let report = engine.run(&target, &spec, opts, &mut StdinPrompter)?;

    match args.common.format {
        OutputFormat::Json => println!("{}", OutputFormat::to_json(&report)?),
        OutputFormat::Text => {
            print!("{}", report.render_text());
            // Conflicts need prerequisite analysis; point at it.
            if let Some(conflicted) = report
                .entries
                .iter()
                .flat_map(|e| e.conflicted_files.first())
                .next()
            {
                println!(
                    "\nConflicts require prerequisite analysis. Next step:\n  backport analyze --file {} --target {}",
                    conflicted.display(),
                    target.name()
                );
            }
        }
    }
    let _ = std::io::stdout().flush();
    Ok(report.exit_code())
}

fn run_analyze(args: &AnalyzeArgs) -> Result<i32, BackportError> {
    let target = TargetBranch::parse(&args.target)?;
    let merged_after = args
        .merged_after
        .as_deref()
        .map(parse_merged_after)
        .transpose()?;

    let input = if let Some(file) = &args.file {
        // A path that is not in the checkout is almost always a typo;
        // reject it before spending API calls.
        if !std::path::Path::new(file).exists() {
            return Err(BackportError::Validation(ValidationError {
                kind: ErrorKind::Path,
                value: file.clone(),
                reason: "file does not exist in the repository".to_owned(),
            }));
        }
        AnalysisInput::File(file.clone())
    } else {
        let raw = args.pr.as_deref().unwrap_or_default();
        AnalysisInput::Change(raw.parse()?)
    };

    let session = Session::open(&args.common)?;
    let analyzer = DependencyAnalyzer::new(
        &session.vcs,
        &session.store,
        session.remote.clone(),
        session.mainline(),
    );
    let report = analyzer.analyze(&input, &target, merged_after)?;

    match args.common.format {
        OutputFormat::Json => println!("{}", OutputFormat::to_json(&report)?),
        OutputFormat::Text => print!("{}", report.render_text()),
    }
    Ok(0)
}

fn run_status(args: &StatusArgs) -> Result<i32, BackportError> {
    let version: Version = args.version.parse()?;
    let branch = match &args.branch {
        Some(name) => TargetBranch::parse_backport_target(name)?,
        None => TargetBranch::parse_backport_target(&format!("release/{version}"))?,
    };

    let session = Session::open(&args.common)?;
    let status = BackportStatus::new(
        &session.vcs,
        &session.store,
        session.remote.clone(),
        session.mainline(),
    );
    let report = status.report(&version, &branch)?;

    match args.common.format {
        OutputFormat::Json => println!("{}", OutputFormat::to_json(&report)?),
        OutputFormat::Text => print!("{}", report.render_text()),
    }
    Ok(report.exit_code())
}
