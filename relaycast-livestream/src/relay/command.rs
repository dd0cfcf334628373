// ffmpeg invocation for a relay
//
// Relays never transcode: input is stream-copied into FLV for the destination.

use relaycast_core::service::RelaySpec;
use std::process::Stdio;
use tokio::process::Command;

/// Arguments passed to ffmpeg for `spec`.
///
/// File replays are read at native frame rate (`-re`) and looped with
/// `-stream_loop`, which counts repeats after the first play.
#[must_use]
pub fn relay_args(spec: &RelaySpec) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-loglevel", "error"]
        .into_iter()
        .map(String::from)
        .collect();

    if spec.is_replay() {
        args.push("-re".to_string());
    }
    if let Some(loops) = spec.loop_count {
        args.push("-stream_loop".to_string());
        args.push(loops.saturating_sub(1).to_string());
    }

    args.extend(
        [
            "-i",
            spec.source.as_str(),
            "-c",
            "copy",
            "-f",
            "flv",
            spec.destination.as_str(),
        ]
        .into_iter()
        .map(String::from),
    );
    args
}

/// Command for `spec`, killed if its handle is dropped.
#[must_use]
pub fn relay_command(ffmpeg_path: &str, spec: &RelaySpec) -> Command {
    let mut cmd = Command::new(ffmpeg_path);
    cmd.args(relay_args(spec))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[String], flag: &str) -> Option<usize> {
        args.iter().position(|a| a == flag)
    }

    #[test]
    fn test_live_relay_has_no_pacing_or_loop() {
        let spec = RelaySpec::live(
            "rtmp://127.0.0.1:1935/live/key-1".to_string(),
            "rtmp://a.rtmp.youtube.com/live2/key-1".to_string(),
        );
        let args = relay_args(&spec);

        assert!(position(&args, "-re").is_none());
        assert!(position(&args, "-stream_loop").is_none());
        assert_eq!(
            &args[args.len() - 7..],
            [
                "-i",
                "rtmp://127.0.0.1:1935/live/key-1",
                "-c",
                "copy",
                "-f",
                "flv",
                "rtmp://a.rtmp.youtube.com/live2/key-1"
            ]
        );
    }

    #[test]
    fn test_replay_loops_count_minus_one_before_input() {
        let spec = RelaySpec::replay(
            "/media/v1.mp4".to_string(),
            "rtmp://a.rtmp.youtube.com/live2/key-1".to_string(),
            3,
        );
        let args = relay_args(&spec);

        let re = position(&args, "-re").unwrap();
        let stream_loop = position(&args, "-stream_loop").unwrap();
        let input = position(&args, "-i").unwrap();
        assert_eq!(args[stream_loop + 1], "2");
        assert!(re < input && stream_loop < input);
        assert_eq!(args[input + 1], "/media/v1.mp4");
    }

    #[test]
    fn test_single_play_replay_does_not_repeat() {
        let spec = RelaySpec::replay("/media/v1.mp4".into(), "rtmp://dest/k".into(), 1);
        let args = relay_args(&spec);
        let stream_loop = position(&args, "-stream_loop").unwrap();
        assert_eq!(args[stream_loop + 1], "0");
    }
}
