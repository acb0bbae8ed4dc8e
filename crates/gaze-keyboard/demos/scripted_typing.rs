//! Types a phrase with a scripted "user" and no camera.
//!
//! The user looks toward the half of the keyboard holding the next letter and
//! glances back to center whenever the wrong key gets locked.
//!
//!     RUST_LOG=debug cargo run --example scripted_typing -- "HI THERE"

use log::LevelFilter;
use rayos_gaze_keyboard::calibration::CalibrationSampling;
use rayos_gaze_keyboard::vision::gaze_classifier::{IRIS_POINTS, LEFT_CORNER, RIGHT_CORNER};
use rayos_gaze_keyboard::*;
use std::time::Duration;

const TICK_MS: u64 = 30;

fn frame(ratio: f32) -> LandmarkFrame {
    let mut points = vec![Landmark::new(0.0, 0.0); 478];
    points[LEFT_CORNER] = Landmark::new(0.30, 0.45);
    points[RIGHT_CORNER] = Landmark::new(0.40, 0.45);
    for index in IRIS_POINTS {
        points[index] = Landmark::new(0.30 + 0.10 * ratio, 0.45);
    }
    LandmarkFrame {
        landmarks: Landmarks::new(points),
        frame_width: 640.0,
    }
}

fn symbol_for(ch: char) -> Option<KeySymbol> {
    match ch.to_ascii_uppercase() {
        ' ' => Some(KeySymbol::Space),
        c @ 'A'..='Z' => Some(KeySymbol::Letter(c)),
        _ => None,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let phrase = std::env::args().nth(1).unwrap_or_else(|| "HI".to_string());

    let mut config = Config::default();
    config.calibration.targets = vec![CalibrationTarget::Center];
    config.calibration.sampling = CalibrationSampling::Average;

    let mut session = Session::new(config)?;
    let mut frontend = LogFrontend::new(false);
    let center = frame(0.5);
    let left = frame(0.2);
    let right = frame(0.8);

    let mut t = 0;
    let mut tick = |session: &mut Session, gaze: &LandmarkFrame, frontend: &mut LogFrontend| {
        let report = session.tick(Some(gaze), Duration::from_millis(t));
        frontend.render(&report);
        for observation in &report.observations {
            frontend.record(observation);
        }
        t += TICK_MS;
        report
    };

    while session.state_kind() == StateKind::Calibrating {
        tick(&mut session, &center, &mut frontend);
    }
    session.start_typing()?;

    for target in phrase.chars().filter_map(symbol_for) {
        let in_left = session.layout().group(ScanGroup::A).any(|k| k == target);
        let toward = if in_left { &left } else { &right };

        loop {
            let wrong_lock = session
                .scan_state()
                .locked_key
                .map_or(false, |locked| locked != target);
            let gaze = if wrong_lock { &center } else { toward };

            let report = tick(&mut session, gaze, &mut frontend);
            if let Some(key) = report.confirmed {
                if key.symbol == target {
                    break;
                }
            }
        }
    }

    println!("{}", session.text());
    Ok(())
}
