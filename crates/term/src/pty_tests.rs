// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Read;

#[tokio::test]
async fn spawn_runs_a_shell_and_echoes_input() {
    let (session, mut reader) = PtySession::spawn("/tmp", 24, 80).expect("spawn");
    session.write(b"echo ready\n").expect("write");

    let mut buf = [0u8; 4096];
    let mut seen = String::new();
    for _ in 0..20 {
        let n = tokio::task::spawn_blocking({
            let mut reader_ref = &mut reader;
            move || reader_ref.read(&mut buf).map(|n| (n, buf))
        })
        .await
        .expect("join")
        .expect("read");
        seen.push_str(&String::from_utf8_lossy(&n.1[..n.0]));
        if seen.contains("ready") {
            break;
        }
    }
    assert!(seen.contains("ready"), "did not see expected output in: {seen:?}");

    session.kill(std::time::Duration::from_millis(50)).await.expect("kill");
}

#[tokio::test]
async fn resize_does_not_error() {
    let (session, _reader) = PtySession::spawn("/tmp", 24, 80).expect("spawn");
    session.resize(40, 120).expect("resize");
    session.kill(std::time::Duration::from_millis(50)).await.expect("kill");
}

#[tokio::test]
async fn send_named_signal_accepts_sig_prefixed_and_bare_names() {
    let (session, _reader) = PtySession::spawn("/tmp", 24, 80).expect("spawn");
    session.send_named_signal("SIGHUP").expect("sends");
    session.send_named_signal("HUP").expect("sends");
    session.kill(std::time::Duration::from_millis(50)).await.expect("kill");
}

#[tokio::test]
async fn send_named_signal_rejects_unknown_name() {
    let (session, _reader) = PtySession::spawn("/tmp", 24, 80).expect("spawn");
    let err = session.send_named_signal("NOTASIGNAL").expect_err("rejects");
    assert!(matches!(err, TermError::UnknownSignal(_)));
    session.kill(std::time::Duration::from_millis(50)).await.expect("kill");
}
