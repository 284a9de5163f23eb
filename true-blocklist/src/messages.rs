//! Texts shown on the trigger surface.

use crate::traits::ConfirmPrompt;

pub const CONFIRM_PROMPT: ConfirmPrompt = ConfirmPrompt {
    title: "Truly block your blocked blogs?",
    message: "This may take a while if you have a lot of blocked blogs.",
    confirm_label: "Truly block my blocks",
};

pub const WORKING_TITLE: &str = "Truly blocking your blocks...";
pub const WORKING_WARNING: &str =
    "Do not navigate away from this page, otherwise the process will be interrupted.";
pub const GATHERING: &str = "Gathering blocks...";
pub const COMPLETE_TITLE: &str = "All done!";

pub fn progress(total_found: usize) -> String {
    format!("Found {} blocked blogs...", total_found)
}

pub fn account_done(total_found: usize) -> String {
    format!("Found {} blocked blogs.", total_found)
}

pub fn complete(total_blocked: usize) -> String {
    format!("Truly blocked {} blogs!", total_blocked)
}
