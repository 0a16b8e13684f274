//! FileSink - directory-backed append-only streams
//!
//! Layout under `base_path`:
//!
//! ```text
//! <group>/            one directory per log group (created out of band)
//!   <stream>.jsonl    one JSON LogEvent per line
//!   <stream>.token    current sequence token (absent until first append)
//! ```

use contracts::{
    AppendOutcome, ContractError, LogEvent, LogStreamSink, SequenceToken, StreamDescription,
    StreamTarget,
};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

const STREAM_EXT: &str = "jsonl";
const TOKEN_EXT: &str = "token";
const STAGED_TOKEN_EXT: &str = "token.tmp";

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Directory holding one sub-directory per log group
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./logs"));

        Self { base_path }
    }
}

/// Sink that stores streams as JSON-lines files
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
}

impl FileSink {
    /// Create a new FileSink
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;

        Ok(Self {
            name: name.into(),
            config,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params);
        Self::new(name, config)
    }

    /// Create a group directory
    pub fn create_group(&self, group: &str) -> Result<(), ContractError> {
        let dir = self.group_dir(group)?;
        fs::create_dir_all(dir)?;
        Ok(())
    }

    fn group_dir(&self, group: &str) -> Result<PathBuf, ContractError> {
        check_component(&self.name, group)?;
        Ok(self.config.base_path.join(group))
    }

    fn existing_group_dir(&self, group: &str) -> Result<PathBuf, ContractError> {
        let dir = self.group_dir(group)?;
        if !dir.is_dir() {
            return Err(ContractError::group_not_found(group));
        }
        Ok(dir)
    }

    fn stream_paths(&self, target: &StreamTarget) -> Result<(PathBuf, PathBuf), ContractError> {
        let dir = self.existing_group_dir(&target.group)?;
        check_component(&self.name, &target.stream)?;
        Ok((
            dir.join(format!("{}.{STREAM_EXT}", target.stream)),
            dir.join(format!("{}.{TOKEN_EXT}", target.stream)),
        ))
    }

    fn write_batch(
        &self,
        target: &StreamTarget,
        token: Option<&SequenceToken>,
        events: &[LogEvent],
    ) -> Result<AppendOutcome, ContractError> {
        let (stream_path, token_path) = self.stream_paths(target)?;
        if !stream_path.is_file() {
            return Err(ContractError::StreamNotFound {
                group: target.group.clone(),
                stream: target.stream.clone(),
            });
        }

        let current = read_token(&token_path)?;
        if current.as_ref() != token {
            return Err(ContractError::InvalidSequenceToken {
                expected: current.map(|t| t.to_string()),
            });
        }

        let mut lines = Vec::new();
        for event in events {
            serde_json::to_writer(&mut lines, event)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            lines.push(b'\n');
        }

        let next = current
            .as_ref()
            .and_then(|t| t.as_str().parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let next_token = SequenceToken::new(next.to_string());

        let mut file = OpenOptions::new().append(true).open(&stream_path)?;
        let tail = file.metadata()?.len();
        if let Err(e) = commit(&mut file, &lines, &token_path, &next_token) {
            // The stream never keeps lines its token does not cover
            if let Err(rollback) = file.set_len(tail) {
                error!(
                    sink = %self.name,
                    path = %stream_path.display(),
                    error = %rollback,
                    "Rollback of partial batch failed"
                );
            }
            return Err(e.into());
        }

        Ok(AppendOutcome {
            next_token: Some(next_token),
        })
    }
}

/// Write the batch, then publish the new token
///
/// The token is staged in a sibling file and renamed into place, so it only
/// changes once every line is on disk.
fn commit(
    file: &mut File,
    lines: &[u8],
    token_path: &Path,
    next_token: &SequenceToken,
) -> std::io::Result<()> {
    file.write_all(lines)?;
    file.sync_data()?;

    let staged = token_path.with_extension(STAGED_TOKEN_EXT);
    fs::write(&staged, next_token.as_str())?;
    fs::rename(&staged, token_path)
}

/// Reject names that would escape the group/stream directory
fn check_component(sink_name: &str, name: &str) -> Result<(), ContractError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ContractError::sink_request(
            sink_name,
            format!("invalid group or stream name '{name}'"),
        ));
    }
    Ok(())
}

fn read_token(path: &Path) -> Result<Option<SequenceToken>, ContractError> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let content = content.trim();
            Ok((!content.is_empty()).then(|| SequenceToken::new(content)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl LogStreamSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_sink_describe", skip(self), fields(sink = %self.name))]
    async fn describe_streams(
        &self,
        group: &str,
        prefix: &str,
    ) -> Result<Vec<StreamDescription>, ContractError> {
        let dir = self.existing_group_dir(group)?;

        let mut streams = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(STREAM_EXT) {
                continue;
            }
            let Some(stream) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !stream.starts_with(prefix) {
                continue;
            }
            let token = read_token(&dir.join(format!("{stream}.{TOKEN_EXT}")))?;
            streams.push(StreamDescription {
                stream: stream.to_string(),
                token,
            });
        }
        streams.sort_by(|a, b| a.stream.cmp(&b.stream));
        Ok(streams)
    }

    #[instrument(name = "file_sink_create", skip(self), fields(sink = %self.name))]
    async fn create_stream(&mut self, group: &str, stream: &str) -> Result<(), ContractError> {
        let target = StreamTarget::new(group, stream);
        let (stream_path, _) = self.stream_paths(&target)?;

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&stream_path)
        {
            Ok(_) => {
                debug!(sink = %self.name, path = %stream_path.display(), "Stream created");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ContractError::StreamAlreadyExists {
                    group: group.to_string(),
                    stream: stream.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(
        name = "file_sink_append",
        skip(self, token, events),
        fields(sink = %self.name, events = events.len())
    )]
    async fn append_events(
        &mut self,
        target: &StreamTarget,
        token: Option<&SequenceToken>,
        events: &[LogEvent],
    ) -> Result<AppendOutcome, ContractError> {
        self.write_batch(target, token, events).map_err(|e| {
            error!(sink = %self.name, error = %e, "Append failed");
            e
        })
    }
}
