use rayos_gaze_keyboard::calibration::CalibrationSampling;
use rayos_gaze_keyboard::vision::gaze_classifier::{IRIS_POINTS, LEFT_CORNER, RIGHT_CORNER};
use rayos_gaze_keyboard::*;
use std::time::Duration;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Synthetic face-mesh frame whose iris sits at `ratio` between the eye corners
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

fn center_only_config() -> Config {
    let mut config = Config::default();
    config.calibration.targets = vec![CalibrationTarget::Center];
    config.calibration.sampling = CalibrationSampling::Average;
    config
}

/// Calibrate on ratio 0.5 and start typing; returns the next free tick time
fn typing_session() -> (Session, u64) {
    let mut session = Session::new(center_only_config()).expect("session");
    let center = frame(0.5);
    let mut t = 0;
    while session.state_kind() == StateKind::Calibrating {
        session.tick(Some(&center), ms(t));
        t += 30;
        assert!(t < 10_000, "calibration never finished");
    }
    session.start_typing().expect("start typing");
    (session, t)
}

#[test]
fn classifier_band_around_calibrated_center() {
    let classifier = GazeClassifier::default();
    let calibration = CalibrationResult::centered(0.52);

    let zone_of = |ratio: f32| {
        let sample = classifier
            .sample(&frame(ratio).landmarks, 640.0)
            .expect("sample");
        classifier.classify(sample.ratio, &calibration)
    };

    assert_eq!(zone_of(0.52), Zone::Center);
    assert_eq!(zone_of(0.50), Zone::Center);
    assert_eq!(zone_of(0.40), Zone::Left);
    assert_eq!(zone_of(0.65), Zone::Right);
}

#[test]
fn scanning_never_advances_while_a_key_is_locked() {
    let selector = ScanSelector::default();
    let mut state = ScanState::default();

    let mut locked_at = None;
    for t in (0..=1050).step_by(30) {
        let tick = selector.tick(&mut state, Zone::Left, ms(t));
        if let (Some(index), Some(_)) = (locked_at, state.locked_key) {
            assert_eq!(state.scan_index, index, "advanced under lock at {t}");
            assert!(!tick.advanced);
        }
        if state.locked_key.is_some() && locked_at.is_none() {
            locked_at = Some(state.scan_index);
        }
    }
    assert!(locked_at.is_some());
}

#[test]
fn leaving_a_zone_cancels_the_pending_key() {
    let selector = ScanSelector::default();
    let mut state = ScanState::default();

    for t in (0..=900).step_by(30) {
        selector.tick(&mut state, Zone::Right, ms(t));
    }
    assert_eq!(state.locked_key, Some(KeySymbol::Letter('P')));

    let tick = selector.tick(&mut state, Zone::Left, ms(930));
    assert_eq!(tick.confirmed, None);
    assert_eq!(state.locked_key, None);
    assert!(!state.is_dwelling());
}

#[test]
fn center_gaze_is_a_clean_rest() {
    let selector = ScanSelector::default();
    let mut state = ScanState::default();

    for t in (0..=900).step_by(30) {
        selector.tick(&mut state, Zone::Left, ms(t));
    }
    let tick = selector.tick(&mut state, Zone::Center, ms(930));
    assert_eq!(tick.highlighted, None);
    assert_eq!(tick.progress, 0.0);
    assert_eq!(state.locked_key, None);
    assert_eq!(state.dwell_elapsed(ms(930)), None);
}

#[test]
fn calibration_only_counts_time_with_a_face() {
    let mut session = Session::new(center_only_config()).expect("session");

    for t in [0, 30, 60] {
        let report = session.tick(None, ms(t));
        assert_eq!(report.state, StateKind::Calibrating);
        assert_eq!(report.gaze, session::GazeStatus::NoFace);
    }

    let center = frame(0.5);
    let mut finished_at = None;
    let mut t = 90;
    while t <= 2000 && finished_at.is_none() {
        session.tick(Some(&center), ms(t));
        if session.state_kind() == StateKind::Ready {
            finished_at = Some(t);
        }
        t += 30;
    }

    // dwell is timed from the first frame with a face
    assert_eq!(finished_at, Some(90 + 1500));
    let result = session.calibration_result().expect("result");
    assert!((result.center_ratio - 0.5).abs() < 1e-3);
}

#[test]
fn typing_b_takes_one_scan_step_and_one_dwell() {
    let (mut session, start) = typing_session();
    let left = frame(0.2);

    let mut highlights = Vec::new();
    let mut confirmed = Vec::new();
    let mut t = start;
    while t <= start + 1080 {
        let report = session.tick(Some(&left), ms(t));
        assert_eq!(report.zone, Some(Zone::Left));
        if highlights.last() != Some(&report.highlighted) {
            highlights.push(report.highlighted);
        }
        if let Some(key) = report.confirmed {
            confirmed.push((t - start, key.symbol));
        }
        t += 30;
    }

    assert_eq!(confirmed, vec![(1080, KeySymbol::Letter('B'))]);
    assert_eq!(session.text(), "B");
    assert_eq!(
        highlights,
        vec![
            Some(KeySymbol::Letter('A')),
            Some(KeySymbol::Letter('B')),
            Some(KeySymbol::Letter('C')),
        ]
    );
}

#[test]
fn recalibrating_mid_dwell_drops_the_key() {
    let (mut session, start) = typing_session();
    let right = frame(0.8);

    let mut t = start;
    while t <= start + 900 {
        session.tick(Some(&right), ms(t));
        t += 30;
    }
    assert!(session.scan_state().locked_key.is_some());

    session.recalibrate();
    assert_eq!(session.state_kind(), StateKind::Calibrating);
    assert_eq!(session.scan_state(), &ScanState::default());
    assert!(session.calibration_result().is_none());

    // the old deadline passes without a confirm
    while t <= start + 2000 {
        let report = session.tick(Some(&right), ms(t));
        assert!(report.confirmed.is_none());
        t += 30;
    }
    assert_eq!(session.text(), "");
}

#[test]
fn blink_during_dwell_does_not_lose_progress() {
    let (mut session, start) = typing_session();
    let left = frame(0.2);

    let mut t = start;
    while t <= start + 780 {
        session.tick(Some(&left), ms(t));
        t += 30;
    }
    assert_eq!(session.scan_state().locked_key, Some(KeySymbol::Letter('B')));

    // a second of no face
    while t <= start + 1800 {
        let report = session.tick(None, ms(t));
        assert!(report.confirmed.is_none());
        assert_eq!(report.highlighted, Some(KeySymbol::Letter('B')));
        assert!((report.progress - 0.5).abs() < 1e-6);
        t += 30;
    }
    assert_eq!(session.scan_state().locked_key, Some(KeySymbol::Letter('B')));

    let mut confirmed_at = None;
    while t <= start + 2400 && confirmed_at.is_none() {
        let report = session.tick(Some(&left), ms(t));
        if report.confirmed.is_some() {
            confirmed_at = Some(t - start);
        }
        t += 30;
    }
    assert_eq!(confirmed_at, Some(2130));
    assert_eq!(session.text(), "B");
}

#[test]
fn settings_during_calibration_pause_the_dwell() {
    let mut session = Session::new(center_only_config()).expect("session");
    let center = frame(0.5);

    for t in (0..=300).step_by(30) {
        session.tick(Some(&center), ms(t));
    }
    session.open_settings();
    session.close_settings().expect("close settings");

    // ten seconds in settings are not fixation time
    let report = session.tick(Some(&frame(0.9)), ms(10_000));
    assert_eq!(report.state, StateKind::Calibrating);
    assert!(session.calibration_result().is_none());

    let mut t = 10_030;
    while session.state_kind() == StateKind::Calibrating {
        session.tick(Some(&center), ms(t));
        t += 30;
        assert!(t < 20_000, "calibration never finished");
    }
    assert_eq!(t - 30, 11_200);
}

#[test]
fn applied_speech_rate_reaches_the_voice() {
    let (mut session, start) = typing_session();
    let left = frame(0.2);
    let mut t = start;
    while t <= start + 1080 {
        session.tick(Some(&left), ms(t));
        t += 30;
    }
    assert_eq!(session.text(), "B");

    session
        .apply_command(UserCommand::ApplySettings(config::SettingsUpdate {
            rate: Some(220),
            ..Default::default()
        }))
        .expect("apply settings");
    let request = session
        .apply_command(UserCommand::SpeakText)
        .expect("speak")
        .expect("request");

    let heard = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = std::sync::Arc::clone(&heard);
    let (queue, worker) = speech::spawn_speech_worker(move |req: SpeakRequest| {
        sink.lock().unwrap().push(req.voice.program_args());
    })
    .expect("spawn speech worker");
    queue.dispatch(request);
    drop(queue);
    worker.join().expect("join");

    let heard = heard.lock().unwrap();
    assert_eq!(heard.len(), 1);
    assert_eq!(heard[0][..2], ["-s", "220"]);
}

#[derive(Default)]
struct RecordingFrontend {
    reports: Vec<TickReport>,
    observations: Vec<Observation>,
}

impl Frontend for RecordingFrontend {
    fn render(&mut self, report: &TickReport) {
        self.reports.push(report.clone());
    }

    fn record(&mut self, observation: &Observation) {
        self.observations.push(observation.clone());
    }
}

#[test]
fn runtime_applies_commands_and_reads_the_feed() {
    let session = Session::new(center_only_config()).expect("session");
    let mut keyboard = GazeKeyboard::new(session, RecordingFrontend::default())
        .with_stale_after(Duration::from_secs(60));

    // nothing on the feed yet counts as no face
    let report = keyboard.step(ms(0));
    assert_eq!(report.gaze, session::GazeStatus::NoFace);

    keyboard.feed_slot().lock().store(Some(frame(0.5)));
    let mut t = 30;
    while keyboard.session().state_kind() == StateKind::Calibrating && t < 5000 {
        keyboard.step(ms(t));
        t += 30;
    }
    assert_eq!(keyboard.session().state_kind(), StateKind::Ready);
    assert_eq!(keyboard.frontend().observations.len(), 1);

    keyboard
        .command_sender()
        .send(UserCommand::StartTyping)
        .expect("send");
    let report = keyboard.step(ms(t));
    assert_eq!(report.state, StateKind::Typing);
    assert_eq!(report.zone, Some(Zone::Center));

    // rejected commands are logged and skipped
    keyboard
        .command_sender()
        .send(UserCommand::CloseSettings)
        .expect("send");
    let report = keyboard.step(ms(t + 30));
    assert_eq!(report.state, StateKind::Typing);
    assert_eq!(keyboard.frontend().reports.len() as u64, t / 30 + 2);
}
