use anyhow::{Context, Result};
use bundle_patcher::config::{
    apply_config, load_from_path, run_rules, ApplicationError, Mode, PatchConfig, RunReport,
};
use bundle_patcher::diff::hunks;
use bundle_patcher::{PatchOutcome, PatchStatus, Rule, RuleSet};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::{ColoredString, Colorize};
use log::LevelFilter;
use similar::ChangeTag;
use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "bundle-patcher")]
#[command(about = "Idempotent literal and regex patching for built web bundles", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patch configs to their target files
    Apply {
        /// Files to patch instead of the config's targets
        paths: Vec<PathBuf>,

        /// Specific patch file to apply (otherwise applies all in patches/)
        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Base directory for relative target paths
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show a diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Apply rules given on the command line, in the order given
    Replace {
        /// Files to patch
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Replace every occurrence of FIND with REPLACE
        #[arg(
            short,
            long,
            num_args = 2,
            value_names = ["FIND", "REPLACE"],
            allow_hyphen_values = true
        )]
        literal: Vec<String>,

        /// Replace every match of PATTERN; REPLACE may use $1 or ${name}
        #[arg(
            short = 'e',
            long,
            num_args = 2,
            value_names = ["PATTERN", "REPLACE"],
            allow_hyphen_values = true
        )]
        regex: Vec<String>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show a diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Check that every target is fully patched, without writing
    Check {
        /// Files to check instead of the config's targets
        paths: Vec<PathBuf>,

        /// Specific patch file to check (otherwise checks all in patches/)
        #[arg(short, long)]
        patches: Option<PathBuf>,

        /// Base directory for relative target paths
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// List patch configs and their rules
    List {
        /// Specific patch file to list (otherwise lists all in patches/)
        #[arg(short, long)]
        patches: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(cli.verbose);

    match cli.command {
        Commands::Apply {
            paths,
            patches,
            root,
            dry_run,
            diff,
        } => cmd_apply(paths, patches, root, dry_run, diff),

        Commands::Replace {
            paths,
            dry_run,
            diff,
            ..
        } => {
            let sub = matches
                .subcommand_matches("replace")
                .context("missing replace arguments")?;
            let rules = rules_from_args(sub)?;
            cmd_replace(paths, rules, dry_run, diff)
        }

        Commands::Check {
            paths,
            patches,
            root,
        } => cmd_check(paths, patches, root),

        Commands::List { patches } => cmd_list(patches),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // RUST_LOG, when set, takes precedence over -v
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Build rules from `--literal` and `--regex` pairs, keeping command-line order.
fn rules_from_args(matches: &ArgMatches) -> Result<Vec<Rule>> {
    let mut indexed = Vec::new();

    for kind in ["literal", "regex"] {
        let (Some(values), Some(indices)) =
            (matches.get_many::<String>(kind), matches.indices_of(kind))
        else {
            continue;
        };
        let values: Vec<&String> = values.collect();
        let indices: Vec<usize> = indices.collect();

        for (pair, idx) in values.chunks(2).zip(indices.chunks(2)) {
            let ([needle, replace], Some(first)) = (pair, idx.first()) else {
                anyhow::bail!("--{kind} takes a search value and a replacement");
            };
            indexed.push((*first, kind, needle.to_string(), replace.to_string()));
        }
    }

    if indexed.is_empty() {
        anyhow::bail!("give at least one --literal or --regex rule");
    }

    indexed.sort_by_key(|(idx, ..)| *idx);

    Ok(indexed
        .into_iter()
        .enumerate()
        .map(|(n, (_, kind, needle, replace))| {
            let id = format!("{kind}-{}", n + 1);
            if kind == "literal" {
                Rule::literal(id, needle, replace)
            } else {
                Rule::regex(id, needle, replace)
            }
        })
        .collect())
}

/// Helper: Discover all .toml patch files in ./patches.
fn discover_patch_files() -> Result<Vec<PathBuf>> {
    let patches_dir = env::current_dir()?.join("patches");

    if !patches_dir.exists() {
        anyhow::bail!(
            "No patch file given and {} does not exist (use --patches)",
            patches_dir.display()
        );
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&patches_dir).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
        {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();

    if files.is_empty() {
        anyhow::bail!("No .toml patch files found in {}", patches_dir.display());
    }

    Ok(files)
}

/// Load every config up front so a bad rule anywhere fails before any write.
fn load_configs(patches: Option<PathBuf>) -> Result<Vec<(PathBuf, PatchConfig)>> {
    let files = match patches {
        Some(path) => vec![path],
        None => discover_patch_files()?,
    };

    files
        .into_iter()
        .map(|file| -> Result<(PathBuf, PatchConfig)> {
            let config = load_from_path(&file)?;
            Ok((file, config))
        })
        .collect()
}

/// Resolve the base directory for relative target paths
///
/// Priority order:
/// 1. Explicit --root flag
/// 2. BUNDLE_PATCHER_ROOT environment variable
/// 3. The config's root, already anchored to its file by the loader
fn resolve_root(cli_root: Option<&Path>, config: &PatchConfig) -> Result<PathBuf> {
    if let Some(path) = cli_root {
        return path
            .canonicalize()
            .with_context(|| format!("root {} does not exist", path.display()));
    }

    if let Ok(env_path) = env::var("BUNDLE_PATCHER_ROOT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: BUNDLE_PATCHER_ROOT is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    match &config.meta.root {
        Some(root) => Ok(root.clone()),
        None => Ok(env::current_dir()?),
    }
}

/// Paths typed on the command line are relative to the current directory.
fn absolutize(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let cwd = env::current_dir()?;
    Ok(paths.into_iter().map(|p| cwd.join(p)).collect())
}

/// Helper: Show a diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    for (idx, hunk) in hunks(original, modified).iter().enumerate() {
        if idx > 0 {
            println!("{}", "@@".cyan());
        }
        for line in hunk {
            let sign = match line.tag {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            print!("{}", paint(line.tag, sign));
            for segment in &line.segments {
                if segment.emphasized {
                    print!("{}", paint(line.tag, &segment.text).bold().underline());
                } else {
                    print!("{}", paint(line.tag, &segment.text));
                }
            }
            println!();
        }
    }
}

fn paint(tag: ChangeTag, text: &str) -> ColoredString {
    match tag {
        ChangeTag::Delete => text.red(),
        ChangeTag::Insert => text.green(),
        ChangeTag::Equal => text.normal(),
    }
}

#[derive(Default)]
struct Totals {
    patched: usize,
    unchanged: usize,
    not_found: usize,
    failed: usize,
}

impl Totals {
    fn print(&self, dry_run: bool) {
        println!("{}", "Summary:".bold());
        let patched = if dry_run { "would patch" } else { "patched" };
        println!("  {} {}", format!("{}", self.patched).green(), patched);
        println!("  {} unchanged", format!("{}", self.unchanged).yellow());
        println!("  {} not found", format!("{}", self.not_found).cyan());
        println!("  {} failed", format!("{}", self.failed).red());
    }
}

fn report_outcome(outcome: &PatchOutcome, dry_run: bool, show_diff: bool, totals: &mut Totals) {
    let line = outcome.status_line(dry_run);
    match outcome.status {
        PatchStatus::Changed => {
            println!("{} {}", "✓".green(), line);
            totals.patched += 1;
            if show_diff {
                if let Some((before, after)) = outcome.contents() {
                    display_diff(&outcome.file, before, after);
                }
            }
        }
        PatchStatus::Unchanged => {
            println!("{} {}", "⊙".yellow(), line);
            totals.unchanged += 1;
        }
        PatchStatus::NotFound => {
            println!("{} {}", "⊘".cyan(), line);
            totals.not_found += 1;
        }
    }
}

fn report_files(report: &RunReport, dry_run: bool, show_diff: bool, totals: &mut Totals) {
    if let RunReport::SkippedVersion { reason } = report {
        println!("{} Skipped ({})", "⊘".cyan(), reason);
        return;
    }

    for (file, result) in report.files() {
        match result {
            Ok(outcome) => report_outcome(outcome, dry_run, show_diff, totals),
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                eprintln!("  File: {}", file.display());
                totals.failed += 1;
            }
        }
    }
}

fn cmd_apply(
    paths: Vec<PathBuf>,
    patches: Option<PathBuf>,
    root: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let configs = load_configs(patches)?;
    let overrides = if paths.is_empty() {
        None
    } else {
        Some(absolutize(paths)?)
    };
    let mode = if dry_run { Mode::Check } else { Mode::Apply };

    let mut totals = Totals::default();

    for (config_path, config) in &configs {
        println!(
            "Applying '{}' from {}...",
            config.display_name(),
            config_path.display()
        );
        if dry_run {
            println!("{}", "  [DRY RUN - no files will be written]".cyan());
        }

        let root = resolve_root(root.as_deref(), config)?;
        match apply_config(config, &root, overrides.as_deref(), mode) {
            Ok(report) => report_files(&report, dry_run, show_diff, &mut totals),
            Err(e) => report_config_error(&e, &mut totals),
        }

        println!();
    }

    totals.print(dry_run);

    if totals.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn report_config_error(e: &ApplicationError, totals: &mut Totals) {
    eprintln!("{} {}", "✗".red(), e);
    if matches!(e, ApplicationError::NoTargets) {
        eprintln!("  Add [[targets]] to the config or pass files on the command line");
    }
    totals.failed += 1;
}

fn cmd_replace(
    paths: Vec<PathBuf>,
    rules: Vec<Rule>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let rules = RuleSet::compile(&rules)?;
    let files = absolutize(paths)?;
    let mode = if dry_run { Mode::Check } else { Mode::Apply };

    let mut totals = Totals::default();
    let report = RunReport::Files(run_rules(&rules, &files, mode));
    report_files(&report, dry_run, show_diff, &mut totals);

    println!();
    totals.print(dry_run);

    if totals.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_check(paths: Vec<PathBuf>, patches: Option<PathBuf>, root: Option<PathBuf>) -> Result<()> {
    let configs = load_configs(patches)?;
    let overrides = if paths.is_empty() {
        None
    } else {
        Some(absolutize(paths)?)
    };

    println!("{}", "Checking patches...".bold());
    println!();

    let mut up_to_date = 0;
    let mut pending = 0;
    let mut unstable = 0;
    let mut failed = 0;

    for (config_path, config) in &configs {
        println!("{} ({})", config.display_name().bold(), config_path.display());

        let root = resolve_root(root.as_deref(), config)?;
        let report = match apply_config(config, &root, overrides.as_deref(), Mode::Check) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e);
                failed += 1;
                continue;
            }
        };

        if let RunReport::SkippedVersion { reason } = &report {
            println!("{} Skipped ({})", "⊘".cyan(), reason);
            continue;
        }

        for (file, result) in report.files() {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    eprintln!("{} {}", "✗".red(), e);
                    failed += 1;
                    continue;
                }
            };

            match outcome.status {
                PatchStatus::NotFound => {
                    println!("{} {}", "⊘".cyan(), outcome.status_line(true));
                }
                PatchStatus::Unchanged => {
                    println!("{} {}: up to date", "✓".green(), file.display());
                    up_to_date += 1;
                }
                PatchStatus::Changed => {
                    let pending_rules: Vec<&str> = outcome
                        .hits
                        .iter()
                        .filter(|hit| hit.replacements > 0)
                        .map(|hit| hit.id.as_str())
                        .collect();
                    eprintln!(
                        "{} {}: not fully patched (pending: {})",
                        "✗".red(),
                        file.display(),
                        pending_rules.join(", ")
                    );
                    pending += 1;
                }
            }

            if !outcome.idempotent {
                eprintln!(
                    "{} {}: rules are not idempotent; each run changes the file again",
                    "✗".red(),
                    file.display()
                );
                unstable += 1;
            }
        }

        println!();
    }

    println!("{}", "Summary:".bold());
    println!("  {} up to date", format!("{}", up_to_date).green());
    println!("  {} pending", format!("{}", pending).yellow());
    println!("  {} not idempotent", format!("{}", unstable).red());
    println!("  {} failed", format!("{}", failed).red());

    if pending > 0 || unstable > 0 || failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(patches: Option<PathBuf>) -> Result<()> {
    let configs = load_configs(patches)?;

    for (config_path, config) in &configs {
        let version = config.meta.version.as_deref().unwrap_or("unversioned");
        println!(
            "{} {} ({})",
            config.display_name().bold(),
            version.dimmed(),
            config_path.display()
        );
        if let Some(description) = &config.meta.description {
            println!("  {}", description);
        }
        if let Some(requires) = &config.meta.requires {
            println!("  requires bundle-patcher {}", requires);
        }

        for target in &config.targets {
            match (&target.path, &target.dir) {
                (Some(path), _) => println!("  target: {}", path),
                (None, Some(dir)) => println!(
                    "  target: {}/{}{}",
                    dir,
                    target.glob_pattern(),
                    if target.recursive { " (recursive)" } else { "" }
                ),
                (None, None) => {}
            }
        }

        for (idx, rule) in config.to_rules().iter().enumerate() {
            println!("  {:>3}. {}", idx + 1, rule);
        }
        println!();
    }

    Ok(())
}
