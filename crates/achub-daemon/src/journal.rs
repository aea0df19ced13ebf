//! Append-only JSONL journal (spec §6). One line per event, sorted keys,
//! flushed immediately — a run can be tailed or replayed with nothing more
//! than `cat`/`jq`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use achub_core::Event;

pub struct Journal {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl Journal {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: Mutex::new(None),
        }
    }

    pub fn open(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        *self.file.lock().unwrap() = Some(file);
        Ok(())
    }

    pub fn write(&self, event: &Event) -> std::io::Result<()> {
        let mut guard = self.file.lock().unwrap();
        if guard.is_none() {
            drop(guard);
            self.open()?;
            guard = self.file.lock().unwrap();
        }
        let file = guard.as_mut().expect("opened above");
        writeln!(file, "{}", event.to_json_line())?;
        file.flush()
    }

    pub fn close(&self) {
        *self.file.lock().unwrap() = None;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use achub_core::event;

    #[test]
    fn writes_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("run.jsonl"));
        journal.open().unwrap();
        journal.write(&event::hub_started(&["a".to_string()])).unwrap();
        journal.write(&event::hub_stopped()).unwrap();
        journal.close();

        let contents = std::fs::read_to_string(dir.path().join("run.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("nested").join("deep").join("run.jsonl"));
        journal.write(&event::hub_stopped()).unwrap();
        assert!(journal.path().exists());
    }
}
