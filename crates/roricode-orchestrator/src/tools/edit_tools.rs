// Targeted file edits: search_replace, insert_content, replace_lines
//
// All three rewrite an existing UTF-8 file in place and ask before writing.

use async_trait::async_trait;
use regex::{NoExpand, RegexBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use super::tool::{Tool, ToolArguments, ToolContext, ToolError, ToolParameters, aborted};

async fn read_text(path: &Path) -> Result<String, ToolError> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| ToolError::Execution(format!("Failed to read file {}: {}", path.display(), e)))?;
    String::from_utf8(bytes)
        .map_err(|_| ToolError::Execution(format!("{} is not a UTF-8 text file", path.display())))
}

/// Byte offset just past line `line` (1-based), or the end of the text.
fn offset_after_line(text: &str, line: usize) -> usize {
    text.split_inclusive('\n').take(line).map(str::len).sum()
}

/// Puts `content` at byte `at`, keeping it on lines of its own.
fn insert_at(text: &str, at: usize, content: &str) -> String {
    let (head, tail) = text.split_at(at);
    let mut out = String::with_capacity(text.len() + content.len() + 2);
    out.push_str(head);
    if !head.is_empty() && !head.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(content);
    if !tail.is_empty() && !content.is_empty() && !content.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(tail);
    out
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SearchReplaceArgs {
    path: String,
    search: String,
    #[serde(default)]
    replace: String,
    #[serde(default)]
    regex: bool,
    #[serde(default = "default_true")]
    global: bool,
    #[serde(default = "default_true")]
    case_sensitive: bool,
}

/// Replaces literal text or regex matches in a file.
#[derive(Debug, Default)]
pub struct SearchReplaceTool;

#[async_trait]
impl Tool for SearchReplaceTool {
    fn name(&self) -> &str {
        "search_replace"
    }

    fn description(&self) -> &str {
        "Search for text in a file and replace it. Matches literally unless regex is set; \
         replaces every match unless global is false."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_property("path", "string", "Path of the file to edit", true)
            .add_property("search", "string", "Text or regular expression to find", true)
            .add_property("replace", "string", "Replacement text ($1 refers to groups in regex mode)", true)
            .add_property("regex", "boolean", "Treat search as a regular expression", false)
            .add_property("global", "boolean", "Replace all matches (default true)", false)
            .add_property("case_sensitive", "boolean", "Match case (default true)", false)
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: SearchReplaceArgs = args.parse()?;
        if args.search.is_empty() {
            return Err(ToolError::invalid(self.name(), "search cannot be empty"));
        }
        let path = ctx.resolve_path(&args.path);

        let pattern = if args.regex { args.search.clone() } else { regex::escape(&args.search) };
        let matcher = RegexBuilder::new(&pattern)
            .case_insensitive(!args.case_sensitive)
            .build()
            .map_err(|e| ToolError::invalid(self.name(), format!("invalid pattern: {e}")))?;

        let content = read_text(&path).await?;
        let found = matcher.find_iter(&content).count();
        if found == 0 {
            return Err(ToolError::Execution(format!(
                "No matches found for '{}' in {}",
                args.search,
                path.display()
            )));
        }
        let replaced = if args.global { found } else { 1 };
        let limit = if args.global { 0 } else { 1 };

        let detail = format!("{}: {} occurrence(s) of '{}'", path.display(), replaced, args.search);
        if !ctx.confirm("Search and replace", &detail, true).await {
            return Ok(aborted("User aborted search and replace"));
        }

        let updated = if args.regex {
            matcher.replacen(&content, limit, args.replace.as_str())
        } else {
            matcher.replacen(&content, limit, NoExpand(&args.replace))
        };
        fs::write(&path, updated.as_bytes()).await?;

        debug!(path = %path.display(), replaced, "Search and replace applied");
        Ok(json!({
            "path": path.display().to_string(),
            "replacements": replaced,
            "output": format!("Successfully replaced {} occurrence(s) in {}", replaced, path.display()),
        }))
    }
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum InsertPosition {
    Beginning,
    #[default]
    End,
    AfterLine,
}

impl InsertPosition {
    const fn label(self) -> &'static str {
        match self {
            Self::Beginning => "beginning",
            Self::End => "end",
            Self::AfterLine => "after_line",
        }
    }
}

#[derive(Debug, Deserialize)]
struct InsertContentArgs {
    path: String,
    content: String,
    #[serde(default)]
    position: InsertPosition,
    #[serde(default)]
    line_number: Option<usize>,
}

/// Inserts lines at the start, the end or after a given line of a file.
#[derive(Debug, Default)]
pub struct InsertContentTool;

#[async_trait]
impl Tool for InsertContentTool {
    fn name(&self) -> &str {
        "insert_content"
    }

    fn description(&self) -> &str {
        "Insert text into an existing file at the beginning, at the end, or after a given line."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_property("path", "string", "Path of the file to edit", true)
            .add_property("content", "string", "Text to insert", true)
            .add_enum_property(
                "position",
                "Where to insert (default end)",
                &["beginning", "end", "after_line"],
                false,
            )
            .add_property("line_number", "integer", "Line to insert after, for after_line", false)
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: InsertContentArgs = args.parse()?;
        let path = ctx.resolve_path(&args.path);
        let content = read_text(&path).await?;
        let total_lines = content.lines().count();

        let at = match args.position {
            InsertPosition::Beginning => 0,
            InsertPosition::End => content.len(),
            InsertPosition::AfterLine => {
                let line = args.line_number.ok_or_else(|| {
                    ToolError::invalid(self.name(), "line_number is required for after_line")
                })?;
                if line == 0 || line > total_lines {
                    return Err(ToolError::invalid(
                        self.name(),
                        format!("line_number {line} is outside 1..={total_lines}"),
                    ));
                }
                offset_after_line(&content, line)
            }
        };

        let detail = match args.line_number.filter(|_| args.position == InsertPosition::AfterLine) {
            Some(line) => format!("{} (after line {})", path.display(), line),
            None => format!("{} ({})", path.display(), args.position.label()),
        };
        if !ctx.confirm("Insert content", &detail, false).await {
            return Ok(aborted("User aborted content insertion"));
        }

        let updated = insert_at(&content, at, &args.content);
        fs::write(&path, updated.as_bytes()).await?;

        debug!(path = %path.display(), position = args.position.label(), "Inserted content");
        Ok(json!({
            "path": path.display().to_string(),
            "position": args.position.label(),
            "lines_inserted": args.content.lines().count(),
            "total_lines": updated.lines().count(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ReplaceLinesArgs {
    path: String,
    start_line: usize,
    end_line: usize,
    #[serde(default)]
    content: String,
}

/// Replaces an inclusive line range. Empty content deletes the range.
#[derive(Debug, Default)]
pub struct ReplaceLinesTool;

#[async_trait]
impl Tool for ReplaceLinesTool {
    fn name(&self) -> &str {
        "replace_lines"
    }

    fn description(&self) -> &str {
        "Replace lines start_line through end_line (1-based, inclusive) of a file with new content. \
         Pass empty content to delete the lines."
    }

    fn parameter_schema(&self) -> ToolParameters {
        ToolParameters::new()
            .add_property("path", "string", "Path of the file to edit", true)
            .add_property("start_line", "integer", "First line to replace, starting at 1", true)
            .add_property("end_line", "integer", "Last line to replace", true)
            .add_property("content", "string", "Replacement text", true)
    }

    async fn execute(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let args: ReplaceLinesArgs = args.parse()?;
        let path = ctx.resolve_path(&args.path);
        let content = read_text(&path).await?;
        let total_lines = content.lines().count();

        if args.start_line == 0 || args.start_line > args.end_line || args.end_line > total_lines {
            return Err(ToolError::invalid(
                self.name(),
                format!(
                    "line range {}-{} is invalid for a file of {} lines",
                    args.start_line, args.end_line, total_lines
                ),
            ));
        }

        let detail = format!("{} lines {}-{}", path.display(), args.start_line, args.end_line);
        if !ctx.confirm("Replace lines", &detail, true).await {
            return Ok(aborted("User aborted line replacement"));
        }

        let start = offset_after_line(&content, args.start_line - 1);
        let end = offset_after_line(&content, args.end_line);
        let mut updated = String::with_capacity(content.len() + args.content.len());
        updated.push_str(&content[..start]);
        updated.push_str(&args.content);
        let tail = &content[end..];
        let replaced_ended_line = content[..end].ends_with('\n');
        if !args.content.is_empty() && !args.content.ends_with('\n') && (replaced_ended_line || !tail.is_empty()) {
            updated.push('\n');
        }
        updated.push_str(tail);
        fs::write(&path, updated.as_bytes()).await?;

        let lines_removed = args.end_line - args.start_line + 1;
        debug!(path = %path.display(), start = args.start_line, end = args.end_line, "Replaced lines");
        Ok(json!({
            "path": path.display().to_string(),
            "lines_removed": lines_removed,
            "lines_inserted": args.content.lines().count(),
            "total_lines": updated.lines().count(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::Confirmator;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        answer: bool,
        seen: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl Confirmator for Recorder {
        async fn request_confirmation(&self, operation: &str, _detail: &str, dangerous: bool) -> bool {
            self.seen.lock().unwrap().push((operation.to_string(), dangerous));
            self.answer
        }
    }

    fn args(tool: &str, value: Value) -> ToolArguments {
        let Value::Object(map) = value else { panic!("object expected") };
        ToolArguments::new(tool, map)
    }

    fn setup(content: &str, answer: bool) -> (TempDir, ToolContext, Arc<Recorder>) {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), content).unwrap();
        let recorder = Arc::new(Recorder { answer, ..Recorder::default() });
        let ctx = ToolContext::new(temp_dir.path())
            .with_confirmator(Some(recorder.clone() as Arc<dyn Confirmator>));
        (temp_dir, ctx, recorder)
    }

    fn read(dir: &TempDir) -> String {
        std::fs::read_to_string(dir.path().join("a.txt")).unwrap()
    }

    #[tokio::test]
    async fn test_search_replace_literal_and_first_only() {
        let (dir, ctx, recorder) = setup("cost $1 and $1\n", true);

        let result = SearchReplaceTool
            .execute(&ctx, args("search_replace", json!({"path": "a.txt", "search": "$1", "replace": "$2"})))
            .await
            .unwrap();
        assert_eq!(result["replacements"], 2);
        assert_eq!(read(&dir), "cost $2 and $2\n");

        SearchReplaceTool
            .execute(
                &ctx,
                args("search_replace", json!({"path": "a.txt", "search": "$2", "replace": "x", "global": false})),
            )
            .await
            .unwrap();
        assert_eq!(read(&dir), "cost x and $2\n");
        assert_eq!(recorder.seen.lock().unwrap()[0], ("Search and replace".to_string(), true));
    }

    #[tokio::test]
    async fn test_search_replace_regex_groups_and_case() {
        let (dir, ctx, _) = setup("Foo=1\nfoo=2\n", true);

        SearchReplaceTool
            .execute(
                &ctx,
                args(
                    "search_replace",
                    json!({
                        "path": "a.txt",
                        "search": r"foo=(\d)",
                        "replace": "bar=$1",
                        "regex": true,
                        "case_sensitive": false,
                    }),
                ),
            )
            .await
            .unwrap();
        assert_eq!(read(&dir), "bar=1\nbar=2\n");
    }

    #[tokio::test]
    async fn test_search_replace_no_match_and_denied() {
        let (dir, ctx, recorder) = setup("alpha\n", false);

        let err = SearchReplaceTool
            .execute(&ctx, args("search_replace", json!({"path": "a.txt", "search": "beta", "replace": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No matches found for 'beta'"));
        assert!(recorder.seen.lock().unwrap().is_empty());

        let result = SearchReplaceTool
            .execute(&ctx, args("search_replace", json!({"path": "a.txt", "search": "alpha", "replace": "x"})))
            .await
            .unwrap();
        assert_eq!(result["aborted"], true);
        assert_eq!(read(&dir), "alpha\n");
    }

    #[tokio::test]
    async fn test_insert_content_positions() {
        let (dir, ctx, recorder) = setup("one\ntwo", true);

        InsertContentTool
            .execute(&ctx, args("insert_content", json!({"path": "a.txt", "content": "zero", "position": "beginning"})))
            .await
            .unwrap();
        InsertContentTool
            .execute(&ctx, args("insert_content", json!({"path": "a.txt", "content": "three"})))
            .await
            .unwrap();
        let result = InsertContentTool
            .execute(
                &ctx,
                args(
                    "insert_content",
                    json!({"path": "a.txt", "content": "one and a half\n", "position": "after_line", "line_number": 2}),
                ),
            )
            .await
            .unwrap();

        assert_eq!(read(&dir), "zero\none\none and a half\ntwo\nthree");
        assert_eq!(result["total_lines"], 5);
        assert!(recorder.seen.lock().unwrap().iter().all(|(op, dangerous)| op == "Insert content" && !dangerous));
    }

    #[tokio::test]
    async fn test_insert_after_line_out_of_range() {
        let (dir, ctx, recorder) = setup("one\n", true);

        let err = InsertContentTool
            .execute(
                &ctx,
                args("insert_content", json!({"path": "a.txt", "content": "x", "position": "after_line", "line_number": 4})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(recorder.seen.lock().unwrap().is_empty());
        assert_eq!(read(&dir), "one\n");
    }

    #[tokio::test]
    async fn test_replace_lines_and_delete_range() {
        let (dir, ctx, recorder) = setup("a\nb\nc\nd\n", true);

        let result = ReplaceLinesTool
            .execute(
                &ctx,
                args("replace_lines", json!({"path": "a.txt", "start_line": 2, "end_line": 3, "content": "B"})),
            )
            .await
            .unwrap();
        assert_eq!(read(&dir), "a\nB\nd\n");
        assert_eq!(result["lines_removed"], 2);

        ReplaceLinesTool
            .execute(
                &ctx,
                args("replace_lines", json!({"path": "a.txt", "start_line": 3, "end_line": 3, "content": ""})),
            )
            .await
            .unwrap();
        assert_eq!(read(&dir), "a\nB\n");
        assert_eq!(recorder.seen.lock().unwrap()[0], ("Replace lines".to_string(), true));
    }

    #[tokio::test]
    async fn test_replace_lines_rejects_bad_range() {
        let (_dir, ctx, _) = setup("a\nb\n", true);

        for (start, end) in [(0, 1), (2, 1), (1, 3)] {
            let err = ReplaceLinesTool
                .execute(
                    &ctx,
                    args("replace_lines", json!({"path": "a.txt", "start_line": start, "end_line": end, "content": "x"})),
                )
                .await
                .unwrap_err();
            assert!(err.to_string().contains("is invalid"), "{start}-{end}");
        }
    }
}
