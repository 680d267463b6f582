//! Built-in path tools for Genesis.
//!
//! Three handler families:
//!
//! - [`text`] — pure-Rust text tools (`save_text`, `load_text`).
//! - [`command`] — tools backed by an external binary run inside the
//!   step workspace (OCR, denoise, overlay, PDF extraction).
//! - [`translate`] — an LLM-backed in-process tool.
//!
//! [`catalog::register_builtins`] wires the standard set into a
//! [`RegistryBuilder`](genesis_core::RegistryBuilder); deployments that
//! ship their own binaries can register [`command::CommandTool`]s with
//! different templates instead.

pub mod calc;
pub mod catalog;
pub mod command;
pub mod text;
pub mod translate;

pub use calc::CalculatorTool;
pub use catalog::register_builtins;
pub use command::CommandTool;
pub use text::{LoadTextTool, SaveTextTool};
pub use translate::TranslateTool;
