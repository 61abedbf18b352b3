//! Tools the model can call, and the registry that dispatches them.

mod command_safety;
mod edit_tools;
mod file_tools;
mod http_tool;
mod manage_tools;
mod registry;
mod shell;
mod time_tool;
mod tool;

pub use command_safety::{CommandClass, CommandSafety};
pub use edit_tools::{InsertContentTool, ReplaceLinesTool, SearchReplaceTool};
pub use file_tools::{ListDirTool, ReadFileTool, WriteFileTool};
pub use http_tool::HttpRequestTool;
pub use manage_tools::{DirManageTool, FileManageTool};
pub use registry::ToolRegistry;
pub use shell::ShellTool;
pub use time_tool::CurrentTimeTool;
pub use tool::{
    Confirmator, Tool, ToolArguments, ToolCall, ToolContext, ToolError, ToolParameters,
    ToolPropertySchema, ToolResult, aborted,
};

/// Registers the built-in tool set.
pub fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(ShellTool::new());
    registry.register(CurrentTimeTool);
    registry.register(ReadFileTool);
    registry.register(ListDirTool);
    registry.register(WriteFileTool);
    registry.register(SearchReplaceTool);
    registry.register(InsertContentTool);
    registry.register(ReplaceLinesTool);
    registry.register(FileManageTool);
    registry.register(DirManageTool);
    registry.register(HttpRequestTool::new());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tools_registered() {
        let registry = ToolRegistry::new(".");
        register_builtin_tools(&registry);
        assert_eq!(
            registry.names(),
            vec![
                "current_time",
                "dir_manage",
                "file_manage",
                "http_request",
                "insert_content",
                "list_dir",
                "read_file",
                "replace_lines",
                "search_replace",
                "shell",
                "write_file",
            ]
        );
        for schema in registry.describe_all() {
            assert_eq!(schema.parameters["type"], "object");
            assert!(!schema.description.is_empty());
        }
    }
}
