use log::debug;

use crate::error::{LagError, Result};
use crate::models::{in_frame_order, FrameObservation, LagMatch, LagResults, ServerEvents, SyncOffset};

use super::config::MarkerConfig;

const MIN_ENTRIES: usize = 2;

/// Pairs every injected keystroke with the first frame showing its marker.
///
/// For keystroke `j` the observations are scanned in ascending frame order
/// from the start, every time; earlier matches are not remembered. The lag
/// for a match is `frame timestamp - server timestamp[j] + offset`.
/// Keystrokes with no matching frame are skipped.
pub fn correlate(
    server_events: &ServerEvents,
    observations: &[FrameObservation],
    sync_offset: SyncOffset,
    marker_config: &MarkerConfig,
) -> Result<Vec<LagMatch>> {
    check_inputs(server_events, observations)?;

    let frames = in_frame_order(observations);
    let server = server_events.as_slice();
    let mut matches = Vec::with_capacity(server.len() - 1);

    debug!(
        "Correlating {} keystrokes against {} frames, offset {}ms",
        server.len() - 1,
        frames.len(),
        sync_offset.millis()
    );

    for (key_index, &key_ts) in server.iter().enumerate().skip(1) {
        let marker = marker_config.marker(key_index);

        let Some(frame) = frames
            .iter()
            .find(|obs| marker_config.matches(&obs.text, &marker))
        else {
            debug!("No frame shows marker {:?} for key {}", marker, key_index);
            continue;
        };

        let lag_ms = frame
            .timestamp_ms
            .saturating_sub(key_ts)
            .saturating_add(sync_offset.millis());

        matches.push(LagMatch {
            key_index,
            frame_index: frame.frame_index,
            lag_ms,
        });
    }

    Ok(matches)
}

/// Lag values only, in keystroke order.
pub fn calculate_lag(
    server_events: &ServerEvents,
    observations: &[FrameObservation],
    sync_offset: SyncOffset,
    marker_config: &MarkerConfig,
) -> Result<LagResults> {
    let matches = correlate(server_events, observations, sync_offset, marker_config)?;
    Ok(LagResults::from(matches.as_slice()))
}

/// Fails with `InsufficientData` unless both inputs hold at least two entries.
pub fn check_inputs(server_events: &ServerEvents, observations: &[FrameObservation]) -> Result<()> {
    ensure_enough("server events", server_events.len())?;
    ensure_enough("frame observations", observations.len())
}

fn ensure_enough(what: &'static str, len: usize) -> Result<()> {
    if len < MIN_ENTRIES {
        return Err(LagError::InsufficientData {
            what,
            len,
            min: MIN_ENTRIES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::MatchMode;

    fn obs(frame_index: usize, text: &str, timestamp_ms: i64) -> FrameObservation {
        FrameObservation::new(frame_index, text, timestamp_ms)
    }

    fn scenario_b_frames() -> Vec<FrameObservation> {
        vec![obs(0, "", 1000), obs(1, "m", 1040), obs(2, "mm", 1120)]
    }

    fn lags(server: &[i64], frames: &[FrameObservation], offset: i64, config: &MarkerConfig) -> Vec<i64> {
        calculate_lag(
            &ServerEvents::new(server.to_vec()),
            frames,
            SyncOffset::from_millis(offset),
            config,
        )
        .unwrap()
        .into_inner()
    }

    #[test]
    fn single_server_event_is_insufficient() {
        let err = calculate_lag(
            &ServerEvents::new(vec![1000]),
            &scenario_b_frames(),
            SyncOffset::from_millis(0),
            &MarkerConfig::default(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            LagError::InsufficientData { what: "server events", len: 1, min: 2 }
        ));
    }

    #[test]
    fn single_observation_is_insufficient() {
        let err = calculate_lag(
            &ServerEvents::new(vec![1000, 1050]),
            &[obs(0, "m", 1000)],
            SyncOffset::from_millis(0),
            &MarkerConfig::default(),
        )
        .unwrap_err();

        assert!(matches!(err, LagError::InsufficientData { what: "frame observations", .. }));
    }

    #[test]
    fn growing_marker_yields_one_lag_per_keystroke() {
        let result = lags(&[1000, 1050, 1130], &scenario_b_frames(), 0, &MarkerConfig::default());
        assert_eq!(result, vec![-10, -10]);
    }

    #[test]
    fn offset_is_added_to_every_lag() {
        let result = lags(&[1000, 1050, 1130], &scenario_b_frames(), 250, &MarkerConfig::default());
        assert_eq!(result, vec![240, 240]);
    }

    #[test]
    fn missing_marker_leaves_a_gap() {
        let frames = vec![obs(0, "", 1000), obs(1, "m", 1040), obs(2, "", 1120)];
        let result = lags(&[1000, 1050, 1130], &frames, 0, &MarkerConfig::default());
        assert_eq!(result, vec![-10]);
    }

    #[test]
    fn gap_in_the_middle_keeps_later_key_indices() {
        let frames = vec![obs(0, "", 1000), obs(1, "x", 1040), obs(2, "mm", 1120)];
        let matches = correlate(
            &ServerEvents::new(vec![1000, 1050, 1130]),
            &frames,
            SyncOffset::from_millis(0),
            &MarkerConfig::default(),
        )
        .unwrap();

        // "mm" starts with "m", so key 1 also lands on frame 2
        assert_eq!(
            matches,
            vec![
                LagMatch { key_index: 1, frame_index: 2, lag_ms: 70 },
                LagMatch { key_index: 2, frame_index: 2, lag_ms: -10 },
            ]
        );
    }

    #[test]
    fn exact_mode_ignores_longer_text() {
        let frames = vec![obs(0, "mm", 1000), obs(1, "m", 1040), obs(2, "mmm", 1120)];
        let config = MarkerConfig {
            match_mode: MatchMode::Exact,
            ..MarkerConfig::default()
        };

        let matches = correlate(
            &ServerEvents::new(vec![900, 1010, 1020, 1100]),
            &frames,
            SyncOffset::from_millis(0),
            &config,
        )
        .unwrap();

        let pairs: Vec<(usize, usize)> = matches.iter().map(|m| (m.key_index, m.frame_index)).collect();
        assert_eq!(pairs, vec![(1, 1), (2, 0), (3, 2)]);
    }

    #[test]
    fn each_keystroke_rescans_from_the_first_frame() {
        // Frame 0 already shows two characters; prefix matching lets both
        // keystrokes claim it.
        let frames = vec![obs(0, "mm", 1000), obs(1, "m", 1040)];
        let matches = correlate(
            &ServerEvents::new(vec![900, 950, 980]),
            &frames,
            SyncOffset::from_millis(0),
            &MarkerConfig::default(),
        )
        .unwrap();

        assert!(matches.iter().all(|m| m.frame_index == 0));
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn completion_order_does_not_change_the_result() {
        let in_order = vec![
            obs(0, "", 1000),
            obs(1, "m", 1040),
            obs(2, "m", 1080),
            obs(3, "mm", 1120),
        ];
        let out_of_order = vec![
            in_order[3].clone(),
            in_order[0].clone(),
            in_order[2].clone(),
            in_order[1].clone(),
        ];
        let server = [1000, 1030, 1100];

        let expected = lags(&server, &in_order, 7, &MarkerConfig::default());
        assert_eq!(lags(&server, &out_of_order, 7, &MarkerConfig::default()), expected);
        assert_eq!(expected, vec![17, 27]);
    }

    #[test]
    fn custom_unit_character() {
        let frames = vec![obs(0, "", 0), obs(1, "a", 33), obs(2, "aa", 66)];
        let config = MarkerConfig {
            unit: 'a',
            ..MarkerConfig::default()
        };
        assert_eq!(lags(&[0, 10, 20], &frames, 0, &config), vec![23, 46]);
    }

    #[test]
    fn generated_inputs_are_bounded_deterministic_and_exact() {
        // Small linear congruential generator keeps the inputs reproducible.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (state >> 33) % bound
        };

        for _ in 0..200 {
            let server_len = 2 + next(12) as usize;
            let mut server = Vec::with_capacity(server_len);
            let mut ts = next(10_000) as i64;
            for _ in 0..server_len {
                ts += next(200) as i64;
                server.push(ts);
            }

            let frame_count = 2 + next(40) as usize;
            let frames: Vec<FrameObservation> = (0..frame_count)
                .map(|i| obs(i, &"m".repeat(next(server_len as u64 + 1) as usize), i as i64 * 4))
                .collect();
            let offset = next(1_000) as i64 - 500;

            let server_events = ServerEvents::new(server.clone());
            let config = MarkerConfig::default();
            let first = correlate(&server_events, &frames, SyncOffset::from_millis(offset), &config).unwrap();
            let second = correlate(&server_events, &frames, SyncOffset::from_millis(offset), &config).unwrap();

            assert_eq!(first, second);
            assert!(first.len() <= server_len - 1);
            for m in &first {
                let frame = frames.iter().find(|f| f.frame_index == m.frame_index).unwrap();
                assert_eq!(m.lag_ms, frame.timestamp_ms - server[m.key_index] + offset);
                // first matching frame in ascending order
                assert!(frames
                    .iter()
                    .filter(|f| f.frame_index < m.frame_index)
                    .all(|f| !f.text.starts_with(&"m".repeat(m.key_index))));
            }
        }
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let frames = vec![obs(0, "m", i64::MAX), obs(1, "mm", i64::MIN)];
        let result = calculate_lag(
            &ServerEvents::new(vec![0, i64::MIN, i64::MAX]),
            &frames,
            SyncOffset::from_millis(i64::MAX),
            &MarkerConfig::default(),
        )
        .unwrap();
        assert_eq!(result.len(), 2);

        let matches = correlate(
            &ServerEvents::new(vec![0, i64::MIN, i64::MAX]),
            &frames,
            SyncOffset::from_millis(i64::MAX),
            &MarkerConfig::default(),
        )
        .unwrap();
        let report = crate::models::LagReport::new(
            uuid::Uuid::nil(),
            chrono::Utc::now(),
            SyncOffset::from_millis(i64::MAX),
            3,
            frames.len(),
            matches,
        );
        assert_eq!(report.lags.len(), 2);
        assert!(report.summary.is_some());
    }
}
