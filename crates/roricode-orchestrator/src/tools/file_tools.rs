// File system tools: read_file, list_dir, write_file
//
// Relative paths resolve against the registry's working directory.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::fs;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use super::tool::{Tool, ToolArguments, ToolContext, ToolError, ToolParameters, aborted};

/// Files larger than this are refused unless a line limit is given.
const MAX_READ_BYTES: u64 = 1024 * 1024;

fn not_text(path: &Path) -> ToolError {
    ToolError::Execution(format!("{} is not a UTF-8 text file", path.display()))
}

/// Streams the file, keeping only lines `start..start + limit` (0-based).
/// Returns the kept text, the total line count and the end index.
async fn read_line_range(
    path: &Path,
    start: usize,
    limit: Option<usize>,
) -> Result<(String, usize, usize), ToolError> {
    let file = fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let stop = limit.map_or(usize::MAX, |limit| start.saturating_add(limit));

    let mut kept = Vec::new();
    let mut total_lines = 0;
    while let Some(line) = lines.next_line().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData { not_text(path) } else { ToolError::Io(e) }
    })? {
        if (start..stop).contains(&total_lines) {
            kept.push(line);
        }
        total_lines += 1;
    }
    let end = stop.min(total_lines);
    Ok((kept.join("\n"), total_lines, end))
}

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
    /// 1-based first line
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Reads a text file, optionally a line range of it.
#[derive(Debug, Default)]
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Use offset and limit to read a range of lines."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_property("path", "string", "Path of the file to read", true)
            .add_property("offset", "integer", "First line to read, starting at 1", false)
            .add_property("limit", "integer", "Maximum number of lines to return", false)
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: ReadFileArgs = args.parse()?;
        let path = ctx.resolve_path(&args.path);

        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| ToolError::Execution(format!("Failed to read file {}: {}", path.display(), e)))?;
        if metadata.is_dir() {
            return Err(ToolError::Execution(format!(
                "{} is a directory, use list_dir instead",
                path.display()
            )));
        }
        if metadata.len() > MAX_READ_BYTES && args.limit.is_none() {
            return Err(ToolError::Execution(format!(
                "{} is {} bytes; pass offset/limit to read part of it",
                path.display(),
                metadata.len()
            )));
        }

        let start = args.offset.unwrap_or(1).max(1) - 1;
        let (selected, total_lines, end) = if args.offset.is_none() && args.limit.is_none() {
            let bytes = fs::read(&path).await?;
            let content = String::from_utf8(bytes).map_err(|_| not_text(&path))?;
            let total_lines = content.lines().count();
            (content, total_lines, total_lines)
        } else {
            read_line_range(&path, start, args.limit).await?
        };

        debug!(path = %path.display(), total_lines, start, end, "Read file");
        Ok(json!({
            "path": path.display().to_string(),
            "content": selected,
            "total_lines": total_lines,
            "start_line": start + 1,
            "end_line": end.max(start),
            "truncated": start > 0 || end < total_lines,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ListDirArgs {
    #[serde(default = "current_dir")]
    path: String,
    #[serde(default)]
    show_hidden: bool,
}

fn current_dir() -> String {
    ".".to_string()
}

/// Lists the entries of a directory.
#[derive(Debug, Default)]
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List files and subdirectories of a directory with their type and size."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_property("path", "string", "Directory to list (default: current directory)", false)
            .add_property("show_hidden", "boolean", "Include entries starting with a dot", false)
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: ListDirArgs = args.parse()?;
        let path = ctx.resolve_path(&args.path);

        let mut reader = fs::read_dir(&path).await.map_err(|e| {
            ToolError::Execution(format!("Failed to list directory {}: {}", path.display(), e))
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !args.show_hidden && name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().await?;
            let kind = if file_type.is_dir() {
                "dir"
            } else if file_type.is_symlink() {
                "symlink"
            } else {
                "file"
            };
            let size = if file_type.is_file() { entry.metadata().await?.len() } else { 0 };
            entries.push((name, kind, size));
        }

        // Directories first, then by name.
        entries.sort_by(|a, b| (a.1 != "dir", &a.0).cmp(&(b.1 != "dir", &b.0)));

        let count = entries.len();
        let entries: Vec<Value> = entries
            .into_iter()
            .map(|(name, kind, size)| json!({ "name": name, "type": kind, "size": size }))
            .collect();

        Ok(json!({
            "path": path.display().to_string(),
            "entries": entries,
            "count": count,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
    #[serde(default)]
    append: bool,
}

/// Creates, overwrites or appends to a file. Always asks first.
#[derive(Debug, Default)]
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating parent directories as needed. \
         Overwrites by default; set append to add to the end instead."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_property("path", "string", "Path of the file to write", true)
            .add_property("content", "string", "Text to write", true)
            .add_property("append", "boolean", "Append instead of overwriting", false)
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: WriteFileArgs = args.parse()?;
        let path = ctx.resolve_path(&args.path);
        let exists = fs::try_exists(&path).await.unwrap_or(false);

        let (operation, dangerous) = match (exists, args.append) {
            (true, false) => ("Overwrite file", true),
            (true, true) => ("Append to file", false),
            (false, _) => ("Create file", false),
        };
        let detail = format!("{} ({} bytes)", path.display(), args.content.len());
        if !ctx.confirm(operation, &detail, dangerous).await {
            return Ok(aborted("User aborted file write"));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if args.append {
            let mut file = fs::OpenOptions::new().create(true).append(true).open(&path).await?;
            file.write_all(args.content.as_bytes()).await?;
            file.flush().await?;
        } else {
            fs::write(&path, args.content.as_bytes()).await?;
        }

        debug!(path = %path.display(), bytes = args.content.len(), append = args.append, "Wrote file");
        Ok(json!({
            "path": path.display().to_string(),
            "bytes_written": args.content.len(),
            "created": !exists,
            "appended": args.append,
        }))
    }
}
