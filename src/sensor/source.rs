use std::{
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use futures_lite::StreamExt;
use inotify::{EventStream, Inotify, WatchMask};

/// Parse the raw state of a source: `on`/`true`/`1` or `off`/`false`/`0`.
pub fn parse_source_state(content: &str) -> Result<bool> {
    match content.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => bail!("unrecognized source state {other:?}"),
    }
}

/// Read the current raw state from a source file.
pub fn read_source_state(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("couldn't read source {}", path.display()))?;

    parse_source_state(&content).with_context(|| format!("in source {}", path.display()))
}

/// Change events for one source file.
///
/// The parent directory is watched rather than the file itself, so writers
/// that replace the file by renaming over it are still seen.
pub struct SourceWatch {
    events: EventStream<[u8; 1024]>,
    file_name: OsString,
}

impl SourceWatch {
    pub fn new(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .context("source path has no file name")?
            .to_os_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let inotify = Inotify::init().context("failed to init inotify")?;

        // CLOSE_WRITE for in-place writes, MOVED_TO for atomic replacement
        inotify
            .watches()
            .add(&dir, WatchMask::CLOSE_WRITE | WatchMask::MOVED_TO)
            .with_context(|| format!("couldn't set up inotify watch on {}", dir.display()))?;

        let events = inotify
            .into_event_stream([0; 1024])
            .context("couldn't create inotify event stream")?;

        Ok(Self { events, file_name })
    }

    /// Wait until the source file has been written.
    pub async fn changed(&mut self) -> Result<()> {
        loop {
            let event = self
                .events
                .next()
                .await
                .ok_or_else(|| anyhow!("inotify event stream ended"))?
                .context("error while reading inotify events")?;

            if names_file(event.name.as_deref(), &self.file_name) {
                return Ok(());
            }
        }
    }
}

/// Whether a directory event refers to `file_name`.
fn names_file(event_name: Option<&OsStr>, file_name: &OsStr) -> bool {
    event_name == Some(file_name)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sensor::BlockObservation;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "binary-sensor-predictor-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn wait_for_change(watch: &mut SourceWatch) {
        tokio::time::timeout(Duration::from_secs(5), watch.changed())
            .await
            .expect("no change event within 5s")
            .unwrap();
    }

    #[test]
    fn test_names_file() {
        let file_name = OsStr::new("porch");

        assert!(names_file(Some(OsStr::new("porch")), file_name));
        assert!(!names_file(Some(OsStr::new("porch.tmp")), file_name));
        assert!(!names_file(None, file_name));
    }

    #[tokio::test]
    async fn test_brief_on_between_polls_is_observed() {
        let dir = temp_dir("watch-brief");
        let path = dir.join("porch");
        fs::write(&path, "off").unwrap();

        let mut watch = SourceWatch::new(&path).unwrap();
        let mut observation = BlockObservation::new();
        observation.record(read_source_state(&path).unwrap());

        // on and back off well before the next poll would happen
        fs::write(&path, "on").unwrap();
        wait_for_change(&mut watch).await;
        observation.record(read_source_state(&path).unwrap());

        fs::write(&path, "off").unwrap();
        wait_for_change(&mut watch).await;
        observation.record(read_source_state(&path).unwrap());

        assert!(observation.finish_block());
        assert!(!observation.block_on());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_replaced_file_is_seen() {
        let dir = temp_dir("watch-rename");
        let path = dir.join("hallway");
        fs::write(&path, "off").unwrap();

        let mut watch = SourceWatch::new(&path).unwrap();

        // unrelated files in the same directory are ignored
        fs::write(dir.join("other"), "on").unwrap();

        let staged = dir.join("hallway.new");
        fs::write(&staged, "on").unwrap();
        fs::rename(&staged, &path).unwrap();

        wait_for_change(&mut watch).await;
        assert!(read_source_state(&path).unwrap());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_parse_source_state() {
        for on in ["on", "ON\n", " true ", "1"] {
            assert!(parse_source_state(on).unwrap(), "content={on:?}");
        }

        for off in ["off", "Off\n", "false", "0"] {
            assert!(!parse_source_state(off).unwrap(), "content={off:?}");
        }

        assert!(parse_source_state("unavailable").is_err());
        assert!(parse_source_state("").is_err());
    }

    #[test]
    fn test_read_source_state() {
        let path = std::env::temp_dir().join(format!(
            "binary-sensor-predictor-source-{}",
            std::process::id()
        ));

        fs::write(&path, "on\n").unwrap();
        assert!(read_source_state(&path).unwrap());

        fs::write(&path, "off").unwrap();
        assert!(!read_source_state(&path).unwrap());

        fs::remove_file(&path).unwrap();
        assert!(read_source_state(&path).is_err());
    }
}
