use std::time::Instant;

use tracing::{debug, info, trace};

use crate::controller::Controller;
use crate::domain::{GridConfig, GridError, Message};
use crate::export::{self, DownloadSink, SpreadsheetSerializer, SpreadsheetWriter};
use crate::pipeline::{self, GridView};
use crate::query::{QueryString, StateDefaults, ViewState, ViewStateUpdate, join_location, split_location};
use crate::table::Table;

/// Where the grid state lives. Each state change pushes a new `path?query`.
pub trait Navigator {
    fn location(&self) -> &str;
    fn navigate(&mut self, location: String);
}

/// In-memory location history.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new(initial: impl Into<String>) -> Self {
        History {
            entries: vec![initial.into()],
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    // Returns false when already at the first entry
    pub fn back(&mut self) -> bool {
        if self.entries.len() > 1 {
            self.entries.pop();
            true
        } else {
            false
        }
    }
}

impl Navigator for History {
    fn location(&self) -> &str {
        self.entries.last().map(String::as_str).unwrap_or("/")
    }

    fn navigate(&mut self, location: String) {
        trace!("Navigate to {}", location);
        self.entries.push(location);
    }
}

pub struct Model {
    config: GridConfig,
    table: Table,
    controller: Controller,
    navigator: Box<dyn Navigator>,
    serializer: Box<dyn SpreadsheetSerializer>,
    sink: Box<dyn DownloadSink>,
    status_message: String,
    last_update: Instant,
}

impl Model {
    pub fn init(
        config: &GridConfig,
        table: Table,
        navigator: Box<dyn Navigator>,
        sink: Box<dyn DownloadSink>,
    ) -> Self {
        Self {
            config: config.clone(),
            controller: Controller::new(config),
            table,
            navigator,
            serializer: Box::new(SpreadsheetWriter),
            sink,
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }

    pub fn with_serializer(mut self, serializer: Box<dyn SpreadsheetSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn location(&self) -> &str {
        self.navigator.location()
    }

    pub fn query(&self) -> QueryString {
        split_location(self.navigator.location()).1
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn defaults(&self) -> StateDefaults {
        StateDefaults {
            hidden_columns: self.table.default_hidden().into_iter().collect(),
            rows_per_page: self.config.default_rows_per_page,
        }
    }

    /// Decodes the view state from the current location. Never cached.
    pub fn state(&self) -> Result<ViewState, GridError> {
        ViewState::decode(&self.query(), &self.defaults())
    }

    pub fn view(&self) -> Result<GridView<'_>, GridError> {
        let state = self.state()?;
        Ok(pipeline::run(&self.table, &state))
    }

    /// Writes `update` into the query string and navigates there.
    pub fn apply(&mut self, update: &ViewStateUpdate) -> Result<(), GridError> {
        if update.is_empty() {
            return Ok(());
        }
        let (path, query) = split_location(self.navigator.location());
        let path = if path.is_empty() {
            self.config.base_path.clone()
        } else {
            path.to_string()
        };
        let location = join_location(&path, &update.encode(&query));
        self.navigator.navigate(location);
        self.last_update = Instant::now();
        Ok(())
    }

    pub fn update(&mut self, message: Message) -> Result<(), GridError> {
        if let Message::Export(format) = message {
            let state = self.state()?;
            let view = pipeline::run(&self.table, &state);
            let count = export::export(&view, format, self.serializer.as_ref(), self.sink.as_mut())?;
            self.set_status_message(format!("Exported {} rows to {}", count, format.filename()));
            return Ok(());
        }

        let state = self.state()?;
        let page_count = pipeline::run(&self.table, &state).page_count;
        match self.controller.handle_message(&message, &state, page_count) {
            Some(update) => {
                self.apply(&update)?;
                debug!("Applied {:?}, now at {}", message, self.location());
            }
            None => trace!("{:?} changed nothing", message),
        }
        Ok(())
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        info!("{}", self.status_message);
    }
}
