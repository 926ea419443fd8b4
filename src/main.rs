use std::path::PathBuf;
use std::process::ExitCode;

use arboard::Clipboard;
use clap::Parser;
use tracing::{error, info};

use querygrid::domain::DEFAULT_ROWS_PER_PAGE;
use querygrid::export::DirectorySink;
use querygrid::{ExportFormat, GridConfig, GridError, History, Message, Model, loader, logging, ui};

/// Show one page of a data file, driven by a shareable query string.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Data file (csv, parquet, arrow or json)
    file: String,

    /// JSON file with column descriptors
    #[arg(long)]
    columns: Option<String>,

    /// Starting query string, e.g. "page=2&search=admin"
    #[arg(long, default_value = "")]
    query: String,

    #[arg(long)]
    search: Option<String>,

    /// Click the header of this column id
    #[arg(long)]
    sort: Option<String>,

    /// Toggle visibility of a column id, can be repeated
    #[arg(long)]
    toggle: Vec<String>,

    #[arg(long)]
    page: Option<usize>,

    #[arg(long)]
    page_size: Option<usize>,

    /// Page size used when the query has none
    #[arg(long, default_value_t = DEFAULT_ROWS_PER_PAGE)]
    default_page_size: usize,

    #[arg(long, value_enum)]
    export: Option<ExportFormat>,

    #[arg(long, default_value = ".")]
    out_dir: String,

    /// Copy the resulting link to the clipboard
    #[arg(long)]
    copy_link: bool,

    #[arg(long, default_value = "querygrid.log")]
    log_file: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand(path: &str) -> Result<PathBuf, GridError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.into_owned()))
        .map_err(|e| GridError::InvalidPath(e.to_string()))
}

// Flags replayed as user actions, in a fixed order
fn messages(cli: &Cli) -> Vec<Message> {
    let mut messages: Vec<Message> = cli
        .toggle
        .iter()
        .map(|id| Message::ToggleColumn(id.clone()))
        .collect();
    if let Some(id) = &cli.sort {
        messages.push(Message::SortColumn(id.clone()));
    }
    if let Some(text) = &cli.search {
        messages.push(Message::Search(text.clone()));
    }
    if let Some(size) = cli.page_size {
        messages.push(Message::SetRowsPerPage(size));
    }
    if let Some(page) = cli.page {
        messages.push(Message::GotoPage(page));
    }
    if let Some(format) = cli.export {
        messages.push(Message::Export(format));
    }
    messages
}

fn run(cli: Cli) -> Result<(), GridError> {
    logging::init(&expand(&cli.log_file)?)?;
    info!("Starting querygrid!");

    let config = GridConfig {
        default_rows_per_page: cli.default_page_size,
        export_dir: expand(&cli.out_dir)?,
        ..GridConfig::default()
    };

    let columns = cli.columns.as_deref().map(expand).transpose()?;
    let table = loader::load_table(expand(&cli.file)?, columns)?;

    let query = cli.query.strip_prefix('?').unwrap_or(&cli.query);
    let start = format!("{}?{}", config.base_path, query);
    let mut model = Model::init(
        &config,
        table,
        Box::new(History::new(start)),
        Box::new(DirectorySink::new(config.export_dir.clone())),
    );

    for message in messages(&cli) {
        model.update(message)?;
    }

    let view = model.view()?;
    for line in ui::buffer_lines(&ui::render_page(&view)) {
        println!("{line}");
    }
    if !model.status_message().is_empty() {
        println!("{}", model.status_message());
    }

    let location = model.location().to_string();
    println!("{location}");

    if cli.copy_link {
        let mut clipboard = Clipboard::new()?;
        clipboard.set_text(location)?;
    }

    Ok(())
}
