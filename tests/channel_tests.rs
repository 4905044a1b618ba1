use std::time::Duration;

use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio_util::sync::CancellationToken;

use xmm_bearer::commands::{build_cgpaddr, AtCommand};
use xmm_bearer::{AtPort, BearerError, CommandChannel};

/// Plays the modem side: echoes each command line, then writes the next
/// canned answer. Stops answering once the answers run out.
async fn fake_modem(stream: DuplexStream, answers: Vec<&'static str>) {
    let mut reader = BufReader::new(stream);
    for answer in answers {
        let mut line = Vec::new();
        if reader.read_until(b'\r', &mut line).await.unwrap_or(0) == 0 {
            return;
        }
        let echo = String::from_utf8_lossy(&line).trim().to_string();
        let out = reader.get_mut();
        if out.write_all(format!("{echo}\r\n{answer}").as_bytes()).await.is_err() {
            return;
        }
    }
    std::future::pending::<()>().await;
}

fn port_with(answers: Vec<&'static str>) -> AtPort<DuplexStream> {
    let (ours, theirs) = duplex(1024);
    tokio::spawn(fake_modem(theirs, answers));
    AtPort::new("ttyACM0", ours)
}

fn command(body: &str, timeout: Duration) -> AtCommand {
    AtCommand {
        body: body.to_string(),
        timeout,
        sensitive: false,
    }
}

#[tokio::test]
async fn test_ok_reply_returns_information_text() {
    let port = port_with(vec!["\r\n+CGPADDR: 1,\"10.0.0.1\"\r\n\r\nOK\r\n"]);

    let reply = port
        .command(&build_cgpaddr(1), &CancellationToken::new())
        .await
        .expect("command should succeed");
    assert_eq!(reply, "+CGPADDR: 1,\"10.0.0.1\"");
    assert_eq!(port.name(), "ttyACM0");
}

#[tokio::test]
async fn test_multi_line_reply_and_sequential_commands() {
    let port = port_with(vec![
        "\r\n+CGACT: 1,1\r\n+CGACT: 2,0\r\n\r\nOK\r\n",
        "\r\nOK\r\n",
    ]);
    let cancel = CancellationToken::new();

    let first = port.command(&command("+CGACT?", Duration::from_secs(3)), &cancel).await.unwrap();
    assert_eq!(first, "+CGACT: 1,1\r\n+CGACT: 2,0");

    let second = port.command(&command("+XDNS=1,3", Duration::from_secs(3)), &cancel).await.unwrap();
    assert_eq!(second, "");
}

#[tokio::test]
async fn test_no_carrier_reply() {
    let port = port_with(vec!["\r\nNO CARRIER\r\n"]);

    let err = port
        .command(&command("+CGACT=0,1", Duration::from_secs(3)), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, BearerError::NoCarrier);
    assert!(err.is_no_carrier());
}

#[tokio::test]
async fn test_error_replies() {
    for answer in ["\r\nERROR\r\n", "\r\n+CME ERROR: 148\r\n"] {
        let port = port_with(vec![answer]);

        let err = port
            .command(&command("+CGACT=1,1", Duration::from_secs(3)), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, BearerError::Failed(answer.trim().to_string()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_silent_modem_times_out() {
    let port = port_with(vec![]);
    let timeout = Duration::from_millis(500);

    let err = port
        .command(&command("+CGDATA=\"M-RAW_IP\",1", timeout), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, BearerError::Timeout(timeout));
}

#[tokio::test]
async fn test_cancelled_command() {
    let port = port_with(vec![]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = port
        .command(&command("+CGACT?", Duration::from_secs(3)), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, BearerError::Canceled);
}

#[tokio::test]
async fn test_closed_port_fails() {
    let (ours, theirs) = duplex(64);
    drop(theirs);
    let port = AtPort::new("ttyACM0", ours);

    let err = port
        .command(&command("+CGACT?", Duration::from_secs(3)), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BearerError::Failed(_)), "unexpected error {err:?}");
}

/// Answers the first command only after `delay`, then answers the second
/// command normally.
async fn slow_then_normal_modem(stream: DuplexStream, delay: Duration, second: &'static str) {
    let mut reader = BufReader::new(stream);
    for (pause, answer) in [(delay, "\r\nOK\r\n"), (Duration::ZERO, second)] {
        let mut line = Vec::new();
        if reader.read_until(b'\r', &mut line).await.unwrap_or(0) == 0 {
            return;
        }
        tokio::time::sleep(pause).await;
        let echo = String::from_utf8_lossy(&line).trim().to_string();
        if reader
            .get_mut()
            .write_all(format!("{echo}\r\n{answer}").as_bytes())
            .await
            .is_err()
        {
            return;
        }
    }
    std::future::pending::<()>().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_does_not_leak_into_next_command() {
    let (ours, theirs) = duplex(1024);
    tokio::spawn(slow_then_normal_modem(
        theirs,
        Duration::from_secs(2),
        "\r\n+CGPADDR: 1,\"10.0.0.9\"\r\n\r\nOK\r\n",
    ));
    let port = AtPort::new("ttyACM0", ours);
    let cancel = CancellationToken::new();

    let first = port
        .command(&command("+CGACT=1,1", Duration::from_secs(1)), &cancel)
        .await;
    assert_eq!(first, Err(BearerError::Timeout(Duration::from_secs(1))));

    let second = port
        .command(&command("+CGPADDR=1", Duration::from_secs(3)), &cancel)
        .await;
    assert_eq!(second.as_deref(), Ok("+CGPADDR: 1,\"10.0.0.9\""));
}

#[tokio::test(start_paused = true)]
async fn test_buffered_late_reply_is_drained() {
    let (ours, theirs) = duplex(1024);
    tokio::spawn(slow_then_normal_modem(
        theirs,
        Duration::from_millis(1500),
        "\r\n+CGACT: 1,1\r\n\r\nOK\r\n",
    ));
    let port = AtPort::new("ttyACM0", ours);
    let cancel = CancellationToken::new();

    let first = port
        .command(&command("+CGACT=1,1", Duration::from_secs(1)), &cancel)
        .await;
    assert!(matches!(first, Err(BearerError::Timeout(_))));

    // The late reply is sitting in the buffer by now.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let second = port
        .command(&command("+CGACT?", Duration::from_secs(3)), &cancel)
        .await;
    assert_eq!(second.as_deref(), Ok("+CGACT: 1,1"));
}
