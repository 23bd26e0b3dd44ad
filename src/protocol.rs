// src/protocol.rs
//
// Newline-framed JSON channel to the external policy. One object per line
// in both directions, flushed after every send; the inbound side reads one
// line at a time so framing is never consumed ahead of the protocol.
//
// Generic over reader/writer so tests can drive the full negotiation loop
// with an in-memory script.

use std::io::{BufRead, Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logger::EpisodeEndMetrics;
use crate::snapshot::{LayoutSnapshot, ProductSnapshot, RobotWire, StateSnapshot};
use crate::tasks::Task;
use crate::types::{ActionKind, StatusKind};

/// Hard cap on one protocol line.
pub const MAX_LINE_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("inbound line exceeds {MAX_LINE_BYTES} bytes")]
    Oversized,
    #[error("channel closed by peer")]
    Closed,
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Messages the simulator sends to the policy.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Outbound {
    #[serde(rename = "INIT")]
    Init {
        timestamp: f64,
        warehouse_layout: LayoutSnapshot,
        products: Vec<ProductSnapshot>,
        robots: Vec<RobotWire>,
    },
    #[serde(rename = "NEW_TASK")]
    NewTask {
        timestamp: f64,
        task: Task,
        state: StateSnapshot,
    },
    #[serde(rename = "ROBOT_STATUS")]
    RobotStatus {
        timestamp: f64,
        robot_index: usize,
        status_type: StatusKind,
        task_id: String,
        message: String,
        state: StateSnapshot,
    },
    #[serde(rename = "ACK")]
    Ack {
        task_id: String,
        robot_index: i64,
        status: String,
        estimated_completion_time: f64,
    },
    #[serde(rename = "ERROR")]
    Error {
        task_id: String,
        error_code: String,
        message: String,
        robot_index: i64,
    },
    #[serde(rename = "EPISODE_END")]
    EpisodeEnd {
        timestamp: f64,
        metrics: EpisodeEndMetrics,
        final_state: StateSnapshot,
    },
}

/// Action payload of an inbound ACTION message. Missing fields default to
/// the WAIT shape so a sparse answer degrades instead of erroring.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionMsg {
    #[serde(default)]
    pub action_type: ActionKind,
    #[serde(default = "minus_one")]
    pub robot_index: i64,
    #[serde(default = "minus_one")]
    pub product_id: i64,
    #[serde(default = "minus_one")]
    pub source_node: i64,
    #[serde(default = "minus_one")]
    pub target_node: i64,
    #[serde(default)]
    pub strategy: String,
    #[serde(default = "minus_one")]
    pub secondary_robot: i64,
    #[serde(default = "minus_one")]
    pub handover_node: i64,
    #[serde(default)]
    pub reason: String,
}

fn minus_one() -> i64 {
    -1
}

impl ActionMsg {
    pub fn wait() -> Self {
        Self {
            action_type: ActionKind::Wait,
            robot_index: -1,
            product_id: -1,
            source_node: -1,
            target_node: -1,
            strategy: String::new(),
            secondary_robot: -1,
            handover_node: -1,
            reason: String::new(),
        }
    }

    pub fn is_wait(&self) -> bool {
        self.action_type == ActionKind::Wait
    }

    /// Assigned robot index, if the policy named a valid one.
    pub fn robot(&self, fleet_size: usize) -> Option<usize> {
        usize::try_from(self.robot_index)
            .ok()
            .filter(|&r| r < fleet_size)
    }

    /// Chosen target node, if valid for the given node count.
    pub fn target(&self, node_count: usize) -> Option<usize> {
        usize::try_from(self.target_node)
            .ok()
            .filter(|&n| n < node_count)
    }
}

/// Messages the policy sends back. The inbound vocabulary is exactly
/// READY / ACTION / RESET; anything else is a parse error the caller
/// degrades to WAIT.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "ACTION")]
    Action { action: ActionMsg },
    #[serde(rename = "RESET")]
    Reset {
        #[serde(default)]
        episode_number: u64,
    },
}

/// Line-delimited JSON transport. `log_messages` echoes traffic to stderr.
pub struct JsonLineChannel<R, W> {
    reader: R,
    writer: W,
    log_messages: bool,
    message_count: u64,
}

impl<R: BufRead, W: Write> JsonLineChannel<R, W> {
    pub fn new(reader: R, writer: W, log_messages: bool) -> Self {
        Self {
            reader,
            writer,
            log_messages,
            message_count: 0,
        }
    }

    /// Serialize one message as a single line and flush immediately.
    pub fn send(&mut self, msg: &Outbound) -> Result<(), ProtocolError> {
        let line = serde_json::to_string(msg)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        if self.log_messages {
            eprintln!("[json send #{}] {line}", self.message_count);
            self.message_count += 1;
        }
        Ok(())
    }

    /// Blocking read of the next message. `Ok(None)` on EOF; empty lines are
    /// skipped; a malformed line is a `Parse` error (the line is consumed).
    /// The read itself is capped one byte past `MAX_LINE_BYTES`, so an
    /// oversized line is rejected without ever being buffered whole.
    pub fn recv(&mut self) -> Result<Option<Inbound>, ProtocolError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .reader
                .by_ref()
                .take(MAX_LINE_BYTES as u64 + 1)
                .read_line(&mut line)?;
            if n == 0 {
                return Ok(None);
            }
            if n > MAX_LINE_BYTES {
                return Err(ProtocolError::Oversized);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if self.log_messages {
                eprintln!("[json recv #{}] {trimmed}", self.message_count);
                self.message_count += 1;
            }
            let msg: Inbound = serde_json::from_str(trimmed)?;
            return Ok(Some(msg));
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

/// Channel over the process stdio, the production configuration.
pub fn stdio_channel(
    log_messages: bool,
) -> JsonLineChannel<std::io::BufReader<std::io::Stdin>, std::io::Stdout> {
    JsonLineChannel::new(
        std::io::BufReader::new(std::io::stdin()),
        std::io::stdout(),
        log_messages,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn channel_from(input: &str) -> JsonLineChannel<Cursor<Vec<u8>>, Vec<u8>> {
        JsonLineChannel::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), false)
    }

    #[test]
    fn recv_parses_action() {
        let input = r#"{"type":"ACTION","action":{"robot_index":1,"action_type":"PICKUP_AND_DELIVER","source_node":5,"target_node":12}}"#;
        let mut ch = channel_from(&format!("{input}\n"));
        match ch.recv().unwrap().unwrap() {
            Inbound::Action { action } => {
                assert_eq!(action.action_type, ActionKind::PickupAndDeliver);
                assert_eq!(action.robot_index, 1);
                assert_eq!(action.source_node, 5);
                assert_eq!(action.target_node, 12);
                assert_eq!(action.product_id, -1);
                assert!(!action.is_wait());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn recv_ready_and_reset() {
        let mut ch = channel_from("{\"type\":\"READY\"}\n{\"type\":\"RESET\",\"episode_number\":3}\n");
        assert!(matches!(ch.recv().unwrap().unwrap(), Inbound::Ready));
        match ch.recv().unwrap().unwrap() {
            Inbound::Reset { episode_number } => assert_eq!(episode_number, 3),
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(ch.recv().unwrap().is_none());
    }

    #[test]
    fn empty_lines_are_skipped() {
        let mut ch = channel_from("\n\n{\"type\":\"READY\"}\n");
        assert!(matches!(ch.recv().unwrap().unwrap(), Inbound::Ready));
    }

    #[test]
    fn malformed_line_is_a_parse_error() {
        let mut ch = channel_from("not json at all\n");
        assert!(matches!(ch.recv(), Err(ProtocolError::Parse(_))));
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        let mut ch = channel_from("{\"type\":\"SURPRISE\"}\n");
        assert!(matches!(ch.recv(), Err(ProtocolError::Parse(_))));
    }

    #[test]
    fn decision_style_tags_are_rejected() {
        let input = r#"{"type":"ACTION_DECISION","action":{"robot_index":0}}"#;
        let mut ch = channel_from(&format!("{input}\n"));
        assert!(matches!(ch.recv(), Err(ProtocolError::Parse(_))));
    }

    #[test]
    fn oversized_line_is_rejected_without_full_buffering() {
        // One newline-less line past the cap must error, not be swallowed.
        let huge = "a".repeat(MAX_LINE_BYTES + 16);
        let mut ch = channel_from(&huge);
        assert!(matches!(ch.recv(), Err(ProtocolError::Oversized)));
    }

    #[test]
    fn wait_action_defaults() {
        let mut ch = channel_from("{\"type\":\"ACTION\",\"action\":{}}\n");
        match ch.recv().unwrap().unwrap() {
            Inbound::Action { action } => {
                assert!(action.is_wait());
                assert_eq!(action.robot_index, -1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn action_accessors_validate_ranges() {
        let action = ActionMsg {
            robot_index: 2,
            target_node: 12,
            ..ActionMsg::wait()
        };
        assert_eq!(action.robot(3), Some(2));
        assert_eq!(action.robot(2), None);
        assert_eq!(action.target(13), Some(12));
        assert_eq!(action.target(12), None);
        assert_eq!(ActionMsg::wait().robot(5), None);
    }

    #[test]
    fn send_writes_one_flushed_line() {
        let mut ch = channel_from("");
        ch.send(&Outbound::Ack {
            task_id: "order_1".to_string(),
            robot_index: 0,
            status: "accepted".to_string(),
            estimated_completion_time: 45.0,
        })
        .unwrap();

        let out = String::from_utf8(ch.writer().clone()).unwrap();
        assert!(out.ends_with('\n'));
        assert_eq!(out.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
        assert_eq!(value["type"], "ACK");
        assert_eq!(value["task_id"], "order_1");
        assert_eq!(value["status"], "accepted");
        assert_eq!(value["estimated_completion_time"], 45.0);
    }
}
