//! Application-level orchestration utilities.
//!
//! This module owns the job lifecycle (start, busy refusal, completion) and post-job
//! processing such as history recording and exports. UI/CLI layers call into this
//! module to keep responsibilities separated.

mod controller;
mod post_process;

pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use post_process::{export_entry_json, process_job_completion};
