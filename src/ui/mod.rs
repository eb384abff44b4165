//! UI module for consistent CLI output
//!
//! Uses `cliclack` for spinners and prompts in interactive terminals and
//! falls back to plain, prefixed lines in CI and when output is piped.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, outro_warn, remark, section, stage_result,
    stage_summary, step_info, step_ok, step_ok_detail, step_warn,
};
pub use progress::{StageProgress, TaskSpinner};
pub use prompts::confirm;
