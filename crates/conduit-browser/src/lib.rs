//! Browser-side coordination for renderer requests.
//!
//! Provides:
//! - Capture request coalescing (`capturer`)
//! - Guest window creation and lifetime binding (`guest`)
//! - The nested window options tree and its merge (`options`)
//! - Collaborator traits for windows and contents (`window`)
//! - An in-memory backend for those traits (`headless`)

pub mod capturer;
pub mod guest;
pub mod headless;
pub mod options;
pub mod window;

pub use capturer::{
    CaptureOptions, CaptureService, CaptureState, CapturedSource, DesktopCapturer, Thumbnail,
};
pub use guest::{GuestWindowManager, NewWindowEvent, NEW_WINDOW};
pub use options::{merge_options, OptionValue, OptionsObject};
pub use window::{BrowserWindow, WebContents, WindowService};
