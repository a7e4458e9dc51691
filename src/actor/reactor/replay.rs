use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
#[cfg(test)]
use tempfile::NamedTempFile;
use tracing::warn;

use super::{CommandResult, Event, Reactor};
use crate::actor::{self};
use crate::common::config::Config;
use crate::layout_engine::LayoutEngine;
use crate::sys::headless::{HeadlessWindow, HeadlessWindowSystem};

/// Writes the config, the starting layout and then every event, one RON
/// value per line.
pub struct Record {
    file: Option<File>,
    #[cfg(test)]
    temp: Option<NamedTempFile>,
}

impl Record {
    pub fn new(path: Option<&Path>) -> std::io::Result<Self> {
        Ok(Self {
            file: path.map(File::create).transpose()?,
            #[cfg(test)]
            temp: None,
        })
    }

    /// A record that writes nothing.
    pub fn disabled() -> Self {
        Self {
            file: None,
            #[cfg(test)]
            temp: None,
        }
    }

    #[cfg(test)]
    pub fn new_for_test(temp: NamedTempFile) -> Self { Self { file: None, temp: Some(temp) } }

    fn file(&mut self) -> Option<&mut File> {
        #[cfg(test)]
        return self.file.as_mut().or(self.temp.as_mut().map(|temp| temp.as_file_mut()));
        #[cfg(not(test))]
        self.file.as_mut()
    }

    pub(super) fn start(&mut self, config: &Config, layout: &LayoutEngine) {
        let Some(file) = self.file() else { return };
        if let Err(err) = write_header(file, config, layout) {
            warn!(%err, "could not start recording");
        }
    }

    pub(super) fn on_event(&mut self, event: &Event) {
        let Some(file) = self.file() else { return };
        if let Err(err) = write_event(file, event) {
            warn!(%err, "could not record event");
        }
    }
}

fn write_header(file: &mut File, config: &Config, layout: &LayoutEngine) -> anyhow::Result<()> {
    let config = ron::ser::to_string(config)?;
    let layout = ron::ser::to_string(layout)?;
    writeln!(file, "{config}\n{layout}")?;
    Ok(())
}

fn write_event(file: &mut File, event: &Event) -> anyhow::Result<()> {
    let line = ron::ser::to_string(event)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Re-applies a recording to a headless reactor and returns it.
///
/// Windows the recording refers to are made up as default headless windows
/// the first time they appear.
pub fn replay(
    path: &Path,
    mut on_result: impl FnMut(&Event, &CommandResult),
) -> anyhow::Result<Reactor> {
    let file = BufReader::new(File::open(path)?);
    let mut lines = file.lines();
    let config: Config = ron::de::from_str(&lines.next().context("empty record file")??)?;
    let layout: LayoutEngine = ron::de::from_str(&lines.next().context("missing layout line")??)?;

    let window_system = Arc::new(Mutex::new(HeadlessWindowSystem::new()));
    for (_, container) in layout.tree().iter() {
        if let Some(window) = container.kind.as_window() {
            window_system.lock().add_window(window.handle, HeadlessWindow::default());
        }
    }
    let (broadcast_tx, _) = actor::channel();
    let mut reactor = Reactor::new(
        config,
        layout,
        Box::new(window_system.clone()),
        Record::disabled(),
        broadcast_tx,
    );

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = ron::de::from_str(&line)?;
        if let Event::WindowShown(handle) = event {
            window_system.lock().windows.entry(handle).or_default();
        }
        let result = reactor.handle_event(event.clone());
        on_result(&event, &result);
    }
    Ok(reactor)
}
