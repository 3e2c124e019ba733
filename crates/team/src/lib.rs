//! Team and delegation for agentloom.
//!
//! A `Team` holds named sub-agents reachable from a parent agent. Two
//! construction modes exist: `Team::conversation` pre-spawns N peers that
//! share one memory and take round-robin turns; `Team::context` starts
//! empty and spawns role-scoped agents lazily when `call` meets an
//! unknown name. The `agent` tool (`Team::delegate_tool`) is the only
//! surface the rest of the system uses to reach a team.

pub mod delegate;
pub mod roles;
pub mod team;

pub use delegate::DelegateTool;
pub use roles::{NoRoles, RoleConfig, RoleRepository, StaticRoles, TomlRoleDir};
pub use team::{
    is_valid_agent_name, AgentTemplate, Team, DELEGATE_TOOL_NAME, MAX_NAME_LEN, NAME_SUGGESTIONS,
};
