// File and directory management: file_manage, dir_manage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::tool::{Tool, ToolArguments, ToolContext, ToolError, ToolParameters, aborted};

/// Cap on entries returned by a recursive listing.
const MAX_LIST_ENTRIES: usize = 1000;

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum FileOperation {
    Copy,
    Move,
    Rename,
}

impl FileOperation {
    const fn label(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Rename => "rename",
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileManageArgs {
    operation: FileOperation,
    source: String,
    destination: String,
    #[serde(default)]
    overwrite: bool,
}

/// Copies, moves or renames files.
#[derive(Debug, Default)]
pub struct FileManageTool;

#[async_trait]
impl Tool for FileManageTool {
    fn name(&self) -> &str {
        "file_manage"
    }

    fn description(&self) -> &str {
        "Copy, move or rename a file. Refuses to replace an existing destination unless overwrite is set."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_enum_property("operation", "Operation to perform", &["copy", "move", "rename"], true)
            .add_property("source", "string", "Existing file", true)
            .add_property("destination", "string", "Target path", true)
            .add_property("overwrite", "boolean", "Replace the destination if it exists", false)
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: FileManageArgs = args.parse()?;
        let source = ctx.resolve_path(&args.source);
        let destination = ctx.resolve_path(&args.destination);

        let metadata = fs::metadata(&source)
            .await
            .map_err(|e| ToolError::Execution(format!("Source {} is not accessible: {}", source.display(), e)))?;
        if args.operation == FileOperation::Copy && metadata.is_dir() {
            return Err(ToolError::Execution(format!(
                "{} is a directory; only files can be copied",
                source.display()
            )));
        }
        let replacing = exists(&destination).await;
        if replacing && !args.overwrite {
            return Err(ToolError::Execution(format!(
                "Destination {} already exists; set overwrite to replace it",
                destination.display()
            )));
        }

        let dangerous = replacing || args.operation != FileOperation::Copy;
        let detail = format!("{} {} -> {}", args.operation.label(), source.display(), destination.display());
        if !ctx.confirm("File management", &detail, dangerous).await {
            return Ok(aborted("User aborted file operation"));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        match args.operation {
            FileOperation::Copy => {
                fs::copy(&source, &destination).await?;
            }
            FileOperation::Move | FileOperation::Rename => {
                if let Err(e) = fs::rename(&source, &destination).await {
                    // rename(2) fails across filesystems
                    if metadata.is_dir() {
                        return Err(e.into());
                    }
                    fs::copy(&source, &destination).await?;
                    fs::remove_file(&source).await?;
                }
            }
        }

        debug!(operation = args.operation.label(), source = %source.display(), destination = %destination.display(), "File operation done");
        Ok(json!({
            "operation": args.operation.label(),
            "source": source.display().to_string(),
            "destination": destination.display().to_string(),
            "replaced": replacing,
        }))
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DirOperation {
    Create,
    Delete,
    List,
}

#[derive(Debug, Deserialize)]
struct DirManageArgs {
    operation: DirOperation,
    path: String,
    #[serde(default)]
    recursive: bool,
    #[serde(default)]
    show_hidden: bool,
    #[serde(default)]
    details: bool,
}

/// Creates, deletes or lists directories.
#[derive(Debug, Default)]
pub struct DirManageTool;

#[async_trait]
impl Tool for DirManageTool {
    fn name(&self) -> &str {
        "dir_manage"
    }

    fn description(&self) -> &str {
        "Create, delete or list a directory. Deleting a non-empty directory needs recursive; \
         listing with recursive walks subdirectories."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_enum_property("operation", "Operation to perform", &["create", "delete", "list"], true)
            .add_property("path", "string", "Directory path", true)
            .add_property(
                "recursive",
                "boolean",
                "create: make parents; delete: remove contents; list: walk subdirectories",
                false,
            )
            .add_property("show_hidden", "boolean", "list: include entries starting with a dot", false)
            .add_property("details", "boolean", "list: include size and modification time", false)
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: DirManageArgs = args.parse()?;
        let path = ctx.resolve_path(&args.path);
        match args.operation {
            DirOperation::Create => create_dir(ctx, &path, args.recursive).await,
            DirOperation::Delete => delete_dir(ctx, &path, args.recursive).await,
            DirOperation::List => list_dir(&path, &args).await,
        }
    }
}

async fn create_dir(ctx: &ToolContext, path: &Path, recursive: bool) -> Result<Value, ToolError> {
    if exists(path).await {
        return Err(ToolError::Execution(format!("{} already exists", path.display())));
    }
    if !ctx.confirm("Create directory", &path.display().to_string(), false).await {
        return Ok(aborted("User aborted directory creation"));
    }
    if recursive {
        fs::create_dir_all(path).await?;
    } else {
        fs::create_dir(path).await?;
    }
    debug!(path = %path.display(), "Created directory");
    Ok(json!({ "operation": "create", "path": path.display().to_string() }))
}

async fn delete_dir(ctx: &ToolContext, path: &Path, recursive: bool) -> Result<Value, ToolError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| ToolError::Execution(format!("Directory {} is not accessible: {}", path.display(), e)))?;
    if !metadata.is_dir() {
        return Err(ToolError::Execution(format!("{} is not a directory", path.display())));
    }
    if ctx.working_dir().starts_with(path) {
        return Err(ToolError::Execution(format!(
            "Refusing to delete {}: it contains the working directory",
            path.display()
        )));
    }
    let empty = fs::read_dir(path).await?.next_entry().await?.is_none();
    if !empty && !recursive {
        return Err(ToolError::Execution(format!(
            "Directory {} is not empty; set recursive to delete it with its contents",
            path.display()
        )));
    }

    if !ctx.confirm("Delete directory", &path.display().to_string(), true).await {
        return Ok(aborted("User aborted directory deletion"));
    }
    if empty {
        fs::remove_dir(path).await?;
    } else {
        fs::remove_dir_all(path).await?;
    }
    debug!(path = %path.display(), recursive, "Deleted directory");
    Ok(json!({ "operation": "delete", "path": path.display().to_string() }))
}

async fn list_dir(root: &Path, args: &DirManageArgs) -> Result<Value, ToolError> {
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    let mut entries = Vec::new();
    let mut truncated = false;

    while let Some(dir) = pending.pop() {
        let mut reader = fs::read_dir(&dir).await.map_err(|e| {
            ToolError::Execution(format!("Failed to list directory {}: {}", dir.display(), e))
        })?;
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !args.show_hidden && name.starts_with('.') {
                continue;
            }
            if entries.len() >= MAX_LIST_ENTRIES {
                truncated = true;
                break;
            }
            let file_type = entry.file_type().await?;
            let relative = entry.path().strip_prefix(root).map_or_else(|_| name.clone(), |p| p.display().to_string());

            let mut item = json!({
                "path": relative,
                "type": if file_type.is_dir() { "dir" } else if file_type.is_symlink() { "symlink" } else { "file" },
            });
            if args.details {
                let metadata = entry.metadata().await?;
                item["size"] = json!(metadata.len());
                if let Ok(modified) = metadata.modified() {
                    item["modified"] = json!(DateTime::<Utc>::from(modified).to_rfc3339());
                }
            }
            entries.push(item);

            if args.recursive && file_type.is_dir() {
                pending.push(entry.path());
            }
        }
        if truncated {
            break;
        }
    }

    entries.sort_by(|a, b| a["path"].as_str().cmp(&b["path"].as_str()));
    Ok(json!({
        "operation": "list",
        "path": root.display().to_string(),
        "count": entries.len(),
        "entries": entries,
        "truncated": truncated,
    }))
}
