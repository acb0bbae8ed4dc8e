//! Vision pathway - turning landmark frames into gaze zones
//!
//! Face-mesh detection runs outside this crate. Frames arrive over the UDP
//! landmark feed and are classified here.

pub mod gaze_classifier;
mod udp_landmarks;

pub use gaze_classifier::{classify, iris_ratio, GazeClassifier};
pub use udp_landmarks::{
    feed_addr_from_env, parse_feed_message, spawn_feed_task, FeedMessage, FeedSlot,
    SharedFeedSlot, DEFAULT_FEED_ADDR,
};
