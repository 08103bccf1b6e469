#![allow(dead_code)]

use quick_vision::capture::{Capture, CaptureError, FrameSource};
use quick_vision::delivery::{DeliveryError, MessageSink, Notifier};
use quick_vision::gateway::{GatewayError, VisionBackend};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;

pub struct RecordedRequest {
    pub head: String,
    pub body: String,
}

/// Answer one connection per canned `(status, body)` pair, in order.
pub fn serve(responses: Vec<(u16, String)>) -> (SocketAddr, Receiver<RecordedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = channel();
    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((stream, _)) = listener.accept() else {
                return;
            };
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap_or(0);
                }
                let done = line == "\r\n";
                head.push_str(&line);
                if done {
                    break;
                }
            }
            let mut buf = vec![0; content_length];
            let _ = reader.read_exact(&mut buf);
            let _ = tx.send(RecordedRequest {
                head,
                body: String::from_utf8_lossy(&buf).into_owned(),
            });

            let mut stream = reader.into_inner();
            let response = format!(
                "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });
    (addr, rx)
}

pub struct FakeFrames {
    pub result: Mutex<Option<Result<Capture, CaptureError>>>,
}

impl FakeFrames {
    pub fn ok() -> Self {
        Self {
            result: Mutex::new(Some(Ok(Capture::new(vec![0x89, b'P', b'N', b'G'], 4, 3)))),
        }
    }

    pub fn denied() -> Self {
        Self {
            result: Mutex::new(Some(Err(CaptureError::Access("permission denied".into())))),
        }
    }
}

impl FrameSource for FakeFrames {
    fn capture(&self) -> Result<Capture, CaptureError> {
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(Capture::new(vec![1], 1, 1)))
    }
}

/// Replays scripted answers and counts calls.
#[derive(Clone, Default)]
pub struct ScriptedVision {
    pub answers: Arc<Mutex<VecDeque<Result<String, GatewayError>>>>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedVision {
    pub fn new(answers: Vec<Result<String, GatewayError>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into())),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisionBackend for ScriptedVision {
    fn analyze(&self, _image: &[u8], _prompt: &str, _model: &str) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub sent: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl MessageSink for RecordingSink {
    fn send(&self, text: &str) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Rejected("chat not found".into()));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub shown: Arc<Mutex<Vec<(String, String)>>>,
    pub fail: bool,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::NotificationUnsupported);
        }
        self.shown
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}
