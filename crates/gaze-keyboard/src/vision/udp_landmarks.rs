use crate::session::UserCommand;
use crate::types::{Landmark, LandmarkFrame, Landmarks};
use anyhow::Result;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;

pub const DEFAULT_FEED_ADDR: &str = "127.0.0.1:5055";

/// Latest landmark state shared between the listener and the tick loop
#[derive(Debug, Clone, Default)]
pub struct FeedSlot {
    /// `None` after an explicit no-face message
    pub frame: Option<LandmarkFrame>,
    pub updated: Option<Instant>,
}

impl FeedSlot {
    pub fn store(&mut self, frame: Option<LandmarkFrame>) {
        self.frame = frame;
        self.updated = Some(Instant::now());
    }

    /// The stored frame if it arrived within `max_age` of `now`
    pub fn fresh(&self, now: Instant, max_age: std::time::Duration) -> Option<&LandmarkFrame> {
        let updated = self.updated?;
        if now.saturating_duration_since(updated) > max_age {
            return None;
        }
        self.frame.as_ref()
    }
}

pub type SharedFeedSlot = Arc<Mutex<FeedSlot>>;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Frame(LandmarkFrame),
    NoFace,
    Command(UserCommand),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonFeedMsg {
    Frame {
        landmarks: Vec<[f32; 2]>,
        #[serde(default = "unit_width")]
        frame_width: f32,
    },
    Face {
        face: bool,
    },
    Command(UserCommand),
}

fn unit_width() -> f32 {
    1.0
}

pub fn feed_addr_from_env() -> Option<SocketAddr> {
    let raw = std::env::var("GAZEKEY_FEED_ADDR").ok()?;
    raw.parse::<SocketAddr>().ok()
}

pub fn parse_feed_message(msg: &str) -> Option<FeedMessage> {
    let msg = msg.trim();
    if msg.is_empty() {
        return None;
    }

    // JSON: {"landmarks":[[0.31,0.42],...],"frame_width":640} | {"face":false} | {"command":"start-typing"}
    if msg.starts_with('{') {
        return match serde_json::from_str::<JsonFeedMsg>(msg) {
            Ok(JsonFeedMsg::Frame {
                landmarks,
                frame_width,
            }) => {
                let points = landmarks
                    .into_iter()
                    .map(|[x, y]| Landmark::new(x, y))
                    .collect();
                Some(FeedMessage::Frame(LandmarkFrame {
                    landmarks: Landmarks::new(points),
                    frame_width,
                }))
            }
            Ok(JsonFeedMsg::Face { face: false }) => Some(FeedMessage::NoFace),
            Ok(JsonFeedMsg::Face { face: true }) => None,
            Ok(JsonFeedMsg::Command(command)) => Some(FeedMessage::Command(command)),
            Err(e) => {
                log::warn!("Unparseable feed message: {e}");
                None
            }
        };
    }

    // text: noface | command start-typing
    let mut tokens = msg.split_whitespace();
    match tokens.next()? {
        "noface" | "no-face" => Some(FeedMessage::NoFace),
        "command" => {
            let name = tokens.next()?;
            UserCommand::from_name(name).map(FeedMessage::Command)
        }
        _ => None,
    }
}

/// Bind the feed socket and forward messages until the runtime exits.
/// Returns the bound address (useful with port 0).
pub async fn spawn_feed_task(
    bind_addr: SocketAddr,
    slot: SharedFeedSlot,
    commands: Sender<UserCommand>,
) -> Result<SocketAddr> {
    let sock = UdpSocket::bind(bind_addr).await?;
    let local = sock.local_addr()?;
    log::info!("Landmark feed listening on {local}");

    tokio::spawn(async move {
        // a full 478-point mesh is ~15 KiB of JSON
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let (len, _src) = match sock.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("Landmark feed recv error: {e}");
                    continue;
                }
            };

            let Ok(s) = std::str::from_utf8(&buf[..len]) else {
                continue;
            };
            match parse_feed_message(s) {
                Some(FeedMessage::Frame(frame)) => slot.lock().store(Some(frame)),
                Some(FeedMessage::NoFace) => slot.lock().store(None),
                Some(FeedMessage::Command(command)) => {
                    if commands.send(command).is_err() {
                        log::info!("Command channel closed, stopping landmark feed");
                        break;
                    }
                }
                None => {}
            }
        }
    });

    Ok(local)
}
