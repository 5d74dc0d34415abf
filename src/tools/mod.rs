pub mod code;
pub mod datetime;
pub mod descriptions;
pub mod echo;
pub mod executor;
pub mod registry;
pub mod special;

pub use code::CodeTool;
pub use datetime::DatetimeTool;
pub use descriptions::{
    DescriptionError, DescriptionStore, DirectoryDescriptions, InMemoryDescriptions,
};
pub use echo::EchoTool;
pub use executor::ToolExecutor;
pub use registry::{
    args_schema_of, descriptors_prompt, Tool, ToolDescriptor, ToolKind, ToolRegistry,
};
pub use special::{MemoryEffect, SpecialOutcome, SpecialTool, CLEAR_CONFIRMATION, SAVE_CONFIRMATION};
