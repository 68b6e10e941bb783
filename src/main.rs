use anyhow::{Context, Result};
use clap::{ArgAction, ColorChoice, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use comfy_table::{ContentArrangement, Table};
use is_terminal::IsTerminal;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tallylog::config::{Config, DEFAULT_CONFIG};
use tallylog::files::{list_logs, peek_file, previous_of, LogFile};
use tallylog::html::render_page;
use tallylog::{drilldown, Analyzers, GroupKey, Grouper, Report};

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFmt { Text, Table, Json, Html }

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "tallylog",
    version,
    about = "Summarize, rank and diff access logs",
    long_about = "Parses log lines with a configured regex, groups them by key columns, aggregates every group and renders a ranked table, optionally diffed against a previous log.",
    after_long_help = "Examples:\n  tallylog run access.log\n  tallylog run access.log --prev auto --output table\n  tallylog run access.log --prev access.log.1 --html report.html\n  tallylog list /var/log/nginx --glob '*.log*'\n  tallylog drill access.log --seed 42 --key 9f3b1c0d2e4a5b6c --by Timestamp",
    color = ColorChoice::Auto
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Analyzer definitions (default ./tallylog.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false, global = true)]
    quiet: bool,
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,
    #[arg(long, global = true)]
    log_path: Option<String>,
    #[arg(long, short = 'C', default_value_t = false, global = true)]
    no_color: bool,
    #[arg(long, default_value_t = false, global = true)]
    force_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a log file
    Run(RunArgs),
    /// List log files under a directory with their detected type
    List(ListArgs),
    /// Break one group down by a column
    Drill(DrillArgs),
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
        #[arg(long)]
        out: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    file: PathBuf,
    /// Analyzer name; detected from the first line when omitted
    #[arg(long, short = 'a')]
    analyzer: Option<String>,
    /// Baseline log: a path, or `auto` for the next older file of the same type
    #[arg(long)]
    prev: Option<String>,
    /// Group key seed; fix it to address groups with `drill`
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, short = 'n')]
    limit: Option<usize>,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long)]
    html: Option<String>,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long)]
    csv_path: Option<String>,
    /// Show a byte progress bar while parsing
    #[arg(long, default_value_t = false)]
    progress: bool,
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    #[arg(default_value = ".")]
    dir: PathBuf,
    #[arg(long, short = 'g')]
    glob: Option<String>,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
}

#[derive(clap::Args, Debug)]
struct DrillArgs {
    file: PathBuf,
    /// Group key as printed in JSON/HTML output
    #[arg(long, short = 'k')]
    key: GroupKey,
    /// Seed used by the run that printed the key
    #[arg(long)]
    seed: u64,
    #[arg(long, default_value = "Timestamp")]
    by: String,
    #[arg(long, short = 'a')]
    analyzer: Option<String>,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    #[arg(long)]
    html: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if cli.force_color { true } else { color_default && !cli.no_color };
    let _ = ENABLE_COLOR.set(enable_color);

    let res = match &cli.command {
        Command::Run(args) => run(&cli, args),
        Command::List(args) => list(&cli, args),
        Command::Drill(args) => drill(&cli, args),
        Command::Completions { shell, out } => completions(*shell, out.as_deref()),
    };
    if let Err(e) = res {
        eprintln!("{} {:#}", paint("error:", "1;31"), e);
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if let Some(lvl) = cli.log_level {
        let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
        builder.filter_level(f);
    } else if cli.verbose > 0 {
        let f = if cli.verbose >= 3 { log::LevelFilter::Trace } else if cli.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        builder.filter_level(f);
    }
    if let Some(fmt) = cli.log_format {
        match fmt {
            LogFormat::Json => {
                builder.format(|buf, record| {
                    let obj = serde_json::json!({
                        "ts": chrono::Local::now().to_rfc3339(),
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "msg": record.args().to_string(),
                    });
                    writeln!(buf, "{}", obj)
                });
            }
            LogFormat::Text => {
                builder.format(|buf, record| {
                    let ts = chrono::Local::now().format("%H:%M:%S%.3f");
                    writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                });
            }
        }
    }
    if let Some(path) = cli.log_path.as_ref() {
        match File::create(path) {
            Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
            Err(e) => eprintln!("Failed to open log file {}: {}", path, e),
        }
    }
    builder.init();
}

fn load_analyzers(cli: &Cli) -> Result<Analyzers> {
    let path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = Config::load(&path).with_context(|| format!("failed to load config {}", path.display()))?;
    log::debug!("loaded {} analyzers from {}", config.analyzers.len(), path.display());
    config.resolve().with_context(|| format!("invalid config {}", path.display()))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path).with_context(|| format!("failed to open {}", path.display()))?))
}

/// Reader for `path`, wrapped in a byte progress bar when `progress` is set.
fn open_tracked(path: &Path, progress: bool) -> Result<(Box<dyn BufRead>, Option<indicatif::ProgressBar>)> {
    let reader = open(path)?;
    if !progress { return Ok((Box::new(reader), None)); }
    let len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let pb = indicatif::ProgressBar::new(len);
    pb.set_style(indicatif::ProgressStyle::with_template("{msg} {wide_bar} {bytes}/{total_bytes}")?);
    pb.set_message(format!("Parsing {}", path.display()));
    Ok((Box::new(pb.wrap_read(reader)), Some(pb)))
}

fn resolve_prev(prev: Option<&str>, file: &Path, analyzers: &Analyzers) -> Result<Option<PathBuf>> {
    match prev {
        None => Ok(None),
        Some("auto") => {
            let file = std::fs::canonicalize(file).with_context(|| format!("failed to resolve {}", file.display()))?;
            let dir = file.parent().unwrap_or(Path::new("."));
            let files = list_logs(dir, None, analyzers)?;
            let found = previous_of(&files, &file).map(Path::to_path_buf);
            match &found {
                Some(p) => log::info!("using {} as previous log", p.display()),
                None => log::warn!("no older log of the same type next to {}", file.display()),
            }
            Ok(found)
        }
        Some(p) => Ok(Some(PathBuf::from(p))),
    }
}

fn grouper(seed: Option<u64>) -> Grouper {
    let g = seed.map(Grouper::with_seed).unwrap_or_else(Grouper::random);
    log::debug!("group key seed {}", g.seed());
    g
}

fn run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let analyzers = load_analyzers(cli)?;
    let first = peek_file(&args.file).with_context(|| format!("failed to read {}", args.file.display()))?;
    let pipeline = analyzers.select(args.analyzer.as_deref(), first.as_deref())?;
    let prev = resolve_prev(args.prev.as_deref(), &args.file, &analyzers)?;
    let grouper = grouper(args.seed);

    let (mut cur, cur_pb) = open_tracked(&args.file, args.progress)?;
    let (mut old, old_pb) = match prev.as_deref() {
        Some(p) => { let (r, pb) = open_tracked(p, args.progress)?; (Some(r), pb) }
        None => (None, None),
    };
    let report = pipeline.run(cur.as_mut(), old.as_mut().map(|r| r.as_mut() as &mut dyn BufRead), &grouper, args.limit)
        .with_context(|| format!("failed to analyze {}", args.file.display()));
    for pb in [cur_pb, old_pb].into_iter().flatten() { pb.finish_and_clear(); }
    let report = report?;

    let mut subtitle = vec![format!("analyzer: {}", pipeline.name), format!("seed: {}", grouper.seed())];
    if let Some(p) = &prev { subtitle.push(format!("previous: {}", p.display())); }
    let title = args.file.display().to_string();
    let json = || serde_json::json!({
        "file": title,
        "prev": prev.as_ref().map(|p| p.display().to_string()),
        "analyzer": pipeline.name,
        "seed": grouper.seed(),
        "report": report,
    });
    let page = || render_page(&title, &subtitle, &report.to_html(&pipeline.html_options()));

    print_report(&report, args.output, &json, &page)?;
    if let Some(path) = &args.html {
        std::fs::write(path, page()).with_context(|| format!("failed to write {}", path))?;
        eprintln!("{} {}", paint("Wrote HTML report to", "32"), path);
    }
    if let Some(path) = &args.json_path {
        std::fs::write(path, serde_json::to_string_pretty(&json())?).with_context(|| format!("failed to write {}", path))?;
        eprintln!("{} {}", paint("Wrote JSON to", "32"), path);
    }
    if let Some(path) = &args.csv_path {
        let f = File::create(path).with_context(|| format!("failed to create {}", path))?;
        report.write_csv(f).with_context(|| format!("failed to write {}", path))?;
        eprintln!("{} {}", paint("Wrote CSV to", "32"), path);
    }
    Ok(())
}

fn print_report(report: &Report, output: OutputFmt, json: impl Fn() -> serde_json::Value, page: impl Fn() -> String) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match output {
        OutputFmt::Text => report.write_text(&mut out)?,
        OutputFmt::Table => writeln!(out, "{}", report.to_comfy_table())?,
        OutputFmt::Json => writeln!(out, "{}", serde_json::to_string_pretty(&json())?)?,
        OutputFmt::Html => writeln!(out, "{}", page())?,
    }
    Ok(())
}

fn list(cli: &Cli, args: &ListArgs) -> Result<()> {
    let analyzers = load_analyzers(cli)?;
    let files = list_logs(&args.dir, args.glob.as_deref(), &analyzers)?;
    match args.output {
        OutputFmt::Json => println!("{}", serde_json::to_string_pretty(&files)?),
        OutputFmt::Table | OutputFmt::Html => println!("{}", files_table(&files)),
        OutputFmt::Text => {
            let mut current: Option<&str> = None;
            for f in &files {
                if current != Some(f.log_type_name()) {
                    println!("{}", paint(f.log_type_name(), "1;36"));
                    current = Some(f.log_type_name());
                }
                let prev = f.prev.as_ref().map(|p| format!("  (prev: {})", p.display())).unwrap_or_default();
                println!("  {}  {:>10}  {}{}", f.modified_str(), f.size_human(), f.path.display(), paint(&prev, "2"));
            }
        }
    }
    Ok(())
}

fn files_table(files: &[LogFile]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Type", "Modified", "Size", "Path", "First line"]);
    for f in files {
        table.add_row(vec![f.log_type_name().to_string(), f.modified_str(), f.size_human(), f.path.display().to_string(), f.peek_short()]);
    }
    table
}

fn drill(cli: &Cli, args: &DrillArgs) -> Result<()> {
    let analyzers = load_analyzers(cli)?;
    let first = peek_file(&args.file).with_context(|| format!("failed to read {}", args.file.display()))?;
    let pipeline = analyzers.select(args.analyzer.as_deref(), first.as_deref())?;
    let records = pipeline.parse(open(&args.file)?, &Grouper::with_seed(args.seed))?;
    let buckets = drilldown::buckets(&records, args.key, &args.by)?;
    let report = drilldown::to_report(&records, args.key, &buckets);
    let title = format!("{} / {}", args.file.display(), args.key);
    let subtitle = vec![format!("analyzer: {}", pipeline.name), format!("by: {}", args.by)];
    let page = || render_page(&title, &subtitle, &report.to_html(&drilldown::html_options(&buckets)));
    let json = || serde_json::json!({ "file": args.file.display().to_string(), "key": args.key, "by": args.by, "report": report });
    print_report(&report, args.output, &json, &page)?;
    if let Some(path) = &args.html {
        std::fs::write(path, page()).with_context(|| format!("failed to write {}", path))?;
        eprintln!("{} {}", paint("Wrote HTML report to", "32"), path);
    }
    Ok(())
}

fn completions(shell: Shell, out: Option<&str>) -> Result<()> {
    let mut cmd = Cli::command();
    match out {
        Some(path) => {
            let mut f = File::create(path).with_context(|| format!("failed to create {}", path))?;
            clap_complete::generate(shell, &mut cmd, "tallylog", &mut f);
        }
        None => clap_complete::generate(shell, &mut cmd, "tallylog", &mut std::io::stdout()),
    }
    Ok(())
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) && !s.is_empty() { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}
