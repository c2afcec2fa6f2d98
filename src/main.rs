//! txview - Entry Point

use clap::Parser;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

use txview::config;
use txview::model::error::AppError;
use txview::model::record::{LevelMask, TraceLevel};
use txview::source::loader::LoadNotice;
use txview::state::session::{LogSession, SessionEvent, SessionOptions};
use txview::view_state::log::{LogView, RowFields};
use txview::view_state::matcher::StringMatcher;

/// txview - print the rows of a binary trace log
#[derive(Parser, Debug)]
#[command(name = "txview")]
#[command(version)]
#[command(about = "Read a binary trace log and print its visible rows")]
pub struct Args {
    /// Path to the trace log file
    pub file: PathBuf,

    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma-separated levels to show (fatal,error,warn,info,verbose,debug)
    #[arg(short, long, value_parser = parse_levels)]
    pub levels: Option<LevelMask>,

    /// Only show rows whose record text matches
    #[arg(short, long)]
    pub search: Option<String>,

    /// Print one JSON object per row
    #[arg(long)]
    pub json: bool,

    /// Show timestamps relative to the first record
    #[arg(long)]
    pub relative_time: bool,
}

fn parse_levels(list: &str) -> Result<LevelMask, String> {
    list.split(',')
        .filter(|name| !name.trim().is_empty())
        .map(|name| TraceLevel::parse(name).ok_or_else(|| format!("unknown level '{}'", name.trim())))
        .collect()
}

fn main() -> Result<(), AppError> {
    let args = Args::parse();

    // Defaults → Config File → Env Vars → CLI Args
    let relative_override = args.relative_time.then_some(true);
    let config = config::resolve(args.config.clone(), relative_override)?;

    txview::logging::init(&config.log_file_path)?;
    info!(config = ?config, "Configuration loaded and resolved");

    let mut session = LogSession::open(&args.file, SessionOptions::from(&config));
    let event = session.wait(|percent| eprint!("\rLoading {percent:>3}%"));
    eprintln!();

    match event {
        Some(SessionEvent::Loaded { notice }) => report_notice(notice.as_ref()),
        Some(SessionEvent::Failed(err)) => return Err(err.into()),
        Some(SessionEvent::Progress(_)) | None => {}
    }

    let Some(view) = session.view_mut() else {
        return Ok(());
    };
    if let Some(levels) = args.levels {
        view.set_level_mask(levels);
    }
    if let Some(needle) = &args.search {
        view.set_text_filter(Some(StringMatcher::new(needle, config.search_mode)?));
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    print_rows(view, args.json, &mut out)?;
    out.flush()?;
    Ok(())
}

fn report_notice(notice: Option<&LoadNotice>) {
    match notice {
        Some(LoadNotice::Incomplete(err)) => eprintln!("warning: log incomplete: {err}"),
        Some(LoadNotice::Empty) => eprintln!("log contains no records"),
        None => {}
    }
}

fn print_rows(view: &LogView, json: bool, out: &mut impl Write) -> io::Result<()> {
    for fields in (0..view.row_count()).filter_map(|row| view.row(row)) {
        if json {
            serde_json::to_writer(&mut *out, &fields).map_err(io::Error::from)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", plain_line(&fields))?;
        }
    }
    Ok(())
}

fn plain_line(fields: &RowFields) -> String {
    let mark = if fields.bookmarked { '*' } else { ' ' };
    format!(
        "{mark}{:>6} {} {:<7} {}({}) {}: {}",
        fields.msg_num,
        fields.time,
        fields.level.name(),
        fields.thread_name,
        fields.thread_id,
        fields.logger,
        fields.text
    )
}
