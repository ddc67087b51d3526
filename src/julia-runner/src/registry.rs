//! Tool catalog.

use julia_mcp_types::{PropertySchema, Tool, ToolInputSchema};

/// The tools this server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JuliaTool {
    ExecuteCode,
    AddPackage,
    InstalledPackages,
    Documentation,
}

/// The single argument a tool cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredArgument {
    pub name: &'static str,
    pub description: &'static str,
    /// Message of the invalid-params error when the argument is absent.
    pub missing_message: &'static str,
}

impl JuliaTool {
    /// All tools, in advertised order.
    pub const ALL: [JuliaTool; 4] = [
        JuliaTool::ExecuteCode,
        JuliaTool::AddPackage,
        JuliaTool::InstalledPackages,
        JuliaTool::Documentation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            JuliaTool::ExecuteCode => "execute_julia",
            JuliaTool::AddPackage => "add_julia_package",
            JuliaTool::InstalledPackages => "get_installed_julia_packages",
            JuliaTool::Documentation => "get_julia_documentation",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            JuliaTool::ExecuteCode => "Execute Julia code",
            JuliaTool::AddPackage => "Add a Julia package to the project",
            JuliaTool::InstalledPackages => "Get the list of installed Julia packages",
            JuliaTool::Documentation => "Get documentation for a Julia function",
        }
    }

    pub fn required_argument(self) -> Option<RequiredArgument> {
        match self {
            JuliaTool::ExecuteCode => Some(RequiredArgument {
                name: "code",
                description: "Julia code to execute",
                missing_message: "Code is required",
            }),
            JuliaTool::AddPackage => Some(RequiredArgument {
                name: "package_name",
                description: "Name of the Julia package to add",
                missing_message: "Package name is required",
            }),
            JuliaTool::InstalledPackages => None,
            JuliaTool::Documentation => Some(RequiredArgument {
                name: "function_name",
                description: "Name of the Julia function",
                missing_message: "Function name is required",
            }),
        }
    }

    /// Prefix of the text returned when execution fails.
    pub fn failure_prefix(self) -> &'static str {
        match self {
            JuliaTool::ExecuteCode => "Error executing Julia code",
            JuliaTool::AddPackage => "Error adding Julia package",
            JuliaTool::InstalledPackages => "Error getting installed Julia packages",
            JuliaTool::Documentation => "Error getting Julia documentation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn descriptor(self) -> Tool {
        let schema = match self.required_argument() {
            Some(arg) => ToolInputSchema::object().required_property(
                arg.name,
                PropertySchema::string().description(arg.description),
            ),
            None => ToolInputSchema::object(),
        };
        Tool::new(self.name(), self.description()).with_schema(schema)
    }
}

/// Immutable catalog of tool descriptors, built once.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: JuliaTool::ALL.into_iter().map(JuliaTool::descriptor).collect(),
        }
    }

    /// Descriptors in declaration order.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    pub fn get(&self, name: &str) -> Option<JuliaTool> {
        JuliaTool::from_name(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
