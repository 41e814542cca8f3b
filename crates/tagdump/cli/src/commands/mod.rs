mod card_operations;
mod data_management;

// Re-export all command handlers
pub(crate) use card_operations::*;
pub(crate) use data_management::*;
