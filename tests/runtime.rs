//! Whole pipeline: test pattern in, `cat` as the encoder, real sockets out

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use robocast::actuator::{ActuatorControl, Direction, LogMotor, Motion};
use robocast::capture::{TestPatternSource, VideoConfig};
use robocast::protocol::StreamHeader;
use robocast::transcode::TranscoderConfig;
use robocast::{Config, Error, Robocast};

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

async fn asset_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "robocast-runtime-{}-{}",
        std::process::id(),
        NEXT_DIR.fetch_add(1, Ordering::Relaxed)
    ));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("index.html"), "ws=$ADDRESS size=${WIDTH}x${HEIGHT}")
        .await
        .unwrap();
    tokio::fs::write(dir.join("jsmpg.js"), "var jsmpeg;").await.unwrap();
    dir
}

fn config(static_dir: PathBuf, program: &str) -> Config {
    let mut config = Config::default()
        .resolution(16, 8)
        .framerate(50)
        .http_addr("127.0.0.1:0".parse().unwrap())
        .stream_addr("127.0.0.1:0".parse().unwrap())
        .static_dir(static_dir)
        .warmup(Duration::ZERO)
        .stats_interval(Duration::ZERO);
    config.video.rotation = 0;
    config.transcoder = TranscoderConfig::default()
        .program(program)
        .custom_args(Vec::<String>::new());
    config
}

fn actuators() -> Arc<ActuatorControl> {
    Arc::new(ActuatorControl::new(
        LogMotor::new("one"),
        LogMotor::new("two"),
    ))
}

async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        path
    );
    socket.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    socket.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn streams_until_source_is_exhausted() {
    let config = config(asset_dir().await, "cat");
    let video: VideoConfig = config.video;
    let source = TestPatternSource::new(video).with_limit(20);
    let actuators = actuators();

    let running = Robocast::new(config, source, Arc::clone(&actuators))
        .start()
        .await
        .unwrap();

    let page = http_get(running.http_addr(), "/index.html").await;
    assert!(page.starts_with("HTTP/1.1 200"));
    assert!(page.contains(&format!("ws={} size=16x8", running.stream_addr().port())));

    let (mut viewer, _) = connect_async(format!("ws://{}/", running.stream_addr()))
        .await
        .unwrap();
    match viewer.next().await {
        Some(Ok(Message::Binary(data))) => {
            assert_eq!(data, StreamHeader::new(16, 8).encode());
        }
        other => panic!("expected header, got {:?}", other),
    }
    tokio::time::timeout(Duration::from_secs(5), async {
        while running.registry().viewer_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    actuators.drive(Direction::Forwards);

    let reader = tokio::spawn(async move {
        let mut received = Vec::new();
        while let Some(Ok(msg)) = viewer.next().await {
            match msg {
                Message::Binary(data) => received.extend_from_slice(&data),
                Message::Close(_) => break,
                _ => {}
            }
        }
        received
    });

    let summary = running.run_until(std::future::pending::<()>()).await.unwrap();

    assert_eq!(summary.frames_written, 20);
    assert_eq!(summary.stats.bytes_read, 20 * video.frame_len() as u64);
    assert_eq!(actuators.motions(), (Motion::Stopped, Motion::Stopped));

    let received = reader.await.unwrap();
    assert_eq!(received.len(), 20 * video.frame_len());
    // First luma row of the first frame
    assert_eq!(&received[..4], &[0, 1, 2, 3]);
}

#[tokio::test]
async fn stops_on_interrupt() {
    let config = config(asset_dir().await, "cat");
    let source = TestPatternSource::new(config.video);
    let actuators = actuators();

    let summary = Robocast::new(config, source, Arc::clone(&actuators))
        .run_until(tokio::time::sleep(Duration::from_millis(200)))
        .await
        .unwrap();

    assert!(summary.frames_written > 0);
    assert_eq!(actuators.motions(), (Motion::Stopped, Motion::Stopped));
}

#[tokio::test]
async fn transcoder_exit_is_fatal() {
    let config = config(asset_dir().await, "true");
    let source = TestPatternSource::new(config.video);
    let actuators = actuators();

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        Robocast::new(config, source, Arc::clone(&actuators)).run_until(std::future::pending::<()>()),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(Error::TranscoderTerminated { .. })));
    assert_eq!(actuators.motions(), (Motion::Stopped, Motion::Stopped));
}

#[tokio::test]
async fn missing_assets_fail_start() {
    let dir = std::env::temp_dir().join("robocast-runtime-missing-assets");
    let config = config(dir, "cat");
    let source = TestPatternSource::new(config.video);

    let result = Robocast::new(config, source, actuators()).start().await;

    assert!(matches!(result, Err(Error::Asset { .. })));
}
