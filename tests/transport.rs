//! End-to-end tests driving real subprocesses.
//!
//! A fake client is stood up as a shell script in a temp directory, so
//! these tests exercise the full path: spawn, stdin, concurrent drain,
//! exit-status convention, and response reconstruction.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use subcurl::{
    AssembledRequest, Error, PerformOptions, ResponseEvent, Transport, HTTP_ERROR_EXIT_CODE,
};

/// Write an executable shell script into `dir` and return its path.
fn write_script(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

fn transport_for(binary: &PathBuf) -> Transport {
    Transport::builder().binary(binary).build().unwrap()
}

#[tokio::test]
async fn perform_reconstructs_response() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(
        &dir,
        "fake_client",
        r#"printf 'HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nhello from fake client'"#,
    );

    let transport = transport_for(&client);
    let response = transport
        .perform(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.status_text, "OK");
    assert_eq!(response.headers.get("content-type"), Some("text/plain"));
    assert_eq!(response.body_text(), "hello from fake client");
}

#[tokio::test]
async fn redirect_blocks_collapse_to_terminal_response() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(
        &dir,
        "fake_client",
        r#"printf 'HTTP/1.1 301 Moved Permanently\r\nLocation: /next\r\n\r\n'
printf 'HTTP/1.1 200 OK\r\nX-Final: yes\r\n\r\nlanded'"#,
    );

    let transport = transport_for(&client);
    let response = transport
        .perform(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("x-final"), Some("yes"));
    assert!(!response.headers.contains("location"));
    assert_eq!(response.body_text(), "landed");
}

#[tokio::test]
async fn http_error_exit_code_still_yields_response() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(
        &dir,
        "fake_client",
        &format!(
            r#"printf 'HTTP/1.1 404 Not Found\r\n\r\nmissing page'
exit {HTTP_ERROR_EXIT_CODE}"#
        ),
    );

    let transport = transport_for(&client);
    let response = transport
        .perform(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert_eq!(response.body_text(), "missing page");
}

#[tokio::test]
async fn fatal_exit_code_carries_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(
        &dir,
        "fake_client",
        r#"printf 'curl: (6) Could not resolve host: nope.invalid' >&2
exit 6"#,
    );

    let transport = transport_for(&client);
    let err = transport
        .perform(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap_err();

    match err {
        Error::TransportFailed { code, stderr } => {
            assert_eq!(code, 6);
            assert!(stderr.contains("Could not resolve host"));
        }
        other => panic!("expected TransportFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn garbage_output_reports_no_response() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(&dir, "fake_client", r#"printf 'not http at all'"#);

    let transport = transport_for(&client);
    let err = transport
        .perform(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap_err();

    match err {
        Error::NoResponseFound { preview } => assert!(preview.contains("not http")),
        other => panic!("expected NoResponseFound, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_binary_fails_before_spawn() {
    let transport = transport_for(&PathBuf::from("/nonexistent/fake_client"));
    let err = transport
        .perform(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BinaryNotFound { .. }));
}

#[tokio::test]
async fn stdin_body_reaches_the_client() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(
        &dir,
        "fake_client",
        r#"printf 'HTTP/1.1 200 OK\r\n\r\n'
cat"#,
    );

    let transport = transport_for(&client);
    let request = AssembledRequest::new(vec![]).body(b"posted payload".to_vec());
    let response = transport
        .perform(&request, &PerformOptions::new())
        .await
        .unwrap();

    assert_eq!(response.body_text(), "posted payload");
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(&dir, "fake_client", "sleep 5");

    let transport = transport_for(&client);
    let started = Instant::now();
    let err = transport
        .perform(
            &AssembledRequest::new(vec![]),
            &PerformOptions::new().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn pre_cancelled_token_yields_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(
        &dir,
        "fake_client",
        r#"printf 'HTTP/1.1 200 OK\r\n\r\nbody'"#,
    );

    let token = CancellationToken::new();
    token.cancel();

    let transport = transport_for(&client);
    let err = transport
        .perform(
            &AssembledRequest::new(vec![]),
            &PerformOptions::new().cancel_token(token),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn streaming_yields_head_then_body() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(
        &dir,
        "fake_client",
        r#"printf 'HTTP/1.1 200 OK\r\nX-Mode: stream\r\n\r\nfirst'
printf ' second'"#,
    );

    let transport = transport_for(&client);
    let mut stream = transport
        .send(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap();

    let mut body = Vec::new();
    let mut saw_head = false;
    while let Some(event) = stream.next().await {
        match event.unwrap() {
            ResponseEvent::Head(head) => {
                assert!(!saw_head, "head must be yielded exactly once");
                assert!(body.is_empty(), "head must precede all body chunks");
                assert_eq!(head.status, 200);
                assert_eq!(head.headers.get("x-mode"), Some("stream"));
                saw_head = true;
            }
            ResponseEvent::Body(chunk) => body.extend_from_slice(&chunk),
        }
    }

    assert!(saw_head);
    assert_eq!(body, b"first second");
}

#[tokio::test]
async fn dropping_stream_kills_the_subprocess() {
    let dir = tempfile::tempdir().unwrap();
    // The fake client serves the head, lingers, then touches a marker
    // file. A killed client never reaches the marker line.
    let client = write_script(
        &dir,
        "fake_client",
        r#"printf 'HTTP/1.1 200 OK\r\n\r\nstart'
sleep 1
: > "$1""#,
    );
    let marker = dir.path().join("still-alive");

    let transport = transport_for(&client);
    let request = AssembledRequest::new(vec![marker.to_string_lossy().into_owned()]);
    let mut stream = transport
        .send(&request, &PerformOptions::new())
        .await
        .unwrap();

    // Consume up to the head, then drop the stream mid-flight.
    while let Some(event) = stream.next().await {
        if matches!(event.unwrap(), ResponseEvent::Head(_)) {
            break;
        }
    }
    drop(stream);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!marker.exists(), "subprocess survived the stream drop");
}

#[tokio::test]
async fn streaming_collect_matches_perform() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(
        &dir,
        "fake_client",
        r#"printf 'HTTP/1.1 200 OK\r\nX-A: 1\r\n\r\nsame bytes either way'"#,
    );

    let transport = transport_for(&client);
    let buffered = transport
        .perform(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap();
    let streamed = transport
        .send(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(streamed.status, buffered.status);
    assert_eq!(streamed.body, buffered.body);
}

#[tokio::test]
async fn streaming_fatal_exit_surfaces_as_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = write_script(
        &dir,
        "fake_client",
        r#"printf 'curl: (7) Failed to connect' >&2
exit 7"#,
    );

    let transport = transport_for(&client);
    let mut stream = transport
        .send(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap();

    let mut last_err = None;
    while let Some(event) = stream.next().await {
        if let Err(e) = event {
            last_err = Some(e);
        }
    }
    match last_err {
        Some(Error::TransportFailed { code: 7, .. }) => {}
        other => panic!("expected TransportFailed(7), got {other:?}"),
    }
}

/// A wrapper script next to a fake underlying binary: resolution should
/// bypass the wrapper, replay its baked-in flags, filter the conflicting
/// header, and append the caller's arguments last.
#[tokio::test]
async fn wrapper_script_resolves_to_underlying_binary() {
    let dir = tempfile::tempdir().unwrap();

    // The fake underlying binary echoes its argv, one per line, as the body.
    write_script(
        &dir,
        "curl.exe",
        r#"printf 'HTTP/1.1 200 OK\r\n\r\n'
printf '%s\n' "$@""#,
    );

    let wrapper = dir.path().join("curl_chrome124.bat");
    fs::write(
        &wrapper,
        "@echo off\r\n\
         :: fingerprint flags\r\n\
         \"%~dp0curl.exe\" --ciphers TLS_AES_128_GCM_SHA256 ^\r\n\
         -H \"User-Agent: Mozilla/5.0 (Chrome)\" ^\r\n\
         -H \"Accept-Language: en-US\" %*\r\n",
    )
    .unwrap();

    let transport = transport_for(&wrapper);
    let request = AssembledRequest::new(vec![
        "-H".into(),
        "User-Agent: custom-agent".into(),
        "https://example.com".into(),
    ]);
    let response = transport
        .perform(&request, &PerformOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let body = response.body_text();
    let lines: Vec<&str> = body.lines().map(str::trim_end).collect();

    // Baked-in flags replayed in order, minus the conflicting header.
    assert_eq!(lines[0], "--ciphers");
    assert_eq!(lines[1], "TLS_AES_128_GCM_SHA256");
    assert!(lines.contains(&"Accept-Language: en-US"));
    assert!(!lines.contains(&"User-Agent: Mozilla/5.0 (Chrome)"));

    // Caller arguments appended after the baked-in ones.
    assert!(lines.contains(&"User-Agent: custom-agent"));
    assert_eq!(lines.last(), Some(&"https://example.com"));
}

#[tokio::test]
async fn unreadable_wrapper_falls_back_to_running_it() {
    let dir = tempfile::tempdir().unwrap();

    // A .bat that is not a parseable wrapper but is itself executable.
    let wrapper = dir.path().join("broken.bat");
    fs::write(
        &wrapper,
        "#!/bin/sh\nprintf 'HTTP/1.1 200 OK\\r\\n\\r\\nran the wrapper itself'\n",
    )
    .unwrap();
    let mut perms = fs::metadata(&wrapper).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&wrapper, perms).unwrap();

    let transport = transport_for(&wrapper);
    let response = transport
        .perform(&AssembledRequest::new(vec![]), &PerformOptions::new())
        .await
        .unwrap();

    assert_eq!(response.body_text(), "ran the wrapper itself");
}
