pub(crate) mod display;
pub(crate) mod reader;
pub(crate) mod session;
