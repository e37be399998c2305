#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use starknet_ledger::apdu::ApduCommand;
use starknet_ledger::constants::{ins, SIGNATURE_LENGTH};
use starknet_ledger::{DeviceCommunicationError, DeviceTransport};

pub const STARKNET_PATH: &str = "m/2645'/1195502025'/1470455285'/0'/0'/0";

pub type CommandLog = Arc<Mutex<Vec<ApduCommand>>>;

/// Replays canned answers in order and records every command it receives
pub struct ScriptedTransport {
    log: CommandLog,
    answers: VecDeque<Result<Vec<u8>, DeviceCommunicationError>>,
}

impl ScriptedTransport {
    pub fn new(answers: Vec<Result<Vec<u8>, DeviceCommunicationError>>) -> (Self, CommandLog) {
        let log = CommandLog::default();
        let transport = Self {
            log: log.clone(),
            answers: answers.into(),
        };
        (transport, log)
    }
}

impl DeviceTransport for ScriptedTransport {
    fn exchange(&mut self, command: &ApduCommand) -> Result<Vec<u8>, DeviceCommunicationError> {
        self.log.lock().unwrap().push(command.clone());
        self.answers
            .pop_front()
            .unwrap_or_else(|| Err(DeviceCommunicationError::Framing("no scripted answer left".to_string())))
    }
}

/// Answers like a device: acks path registration, and signs by echoing the
/// received payload back as `r` with `s` all zeroes. Sleeps on every command
/// to widen any window for interleaving.
pub struct EchoDevice {
    log: CommandLog,
    delay: Duration,
}

impl EchoDevice {
    pub fn new(delay: Duration) -> (Self, CommandLog) {
        let log = CommandLog::default();
        (Self { log: log.clone(), delay }, log)
    }
}

impl DeviceTransport for EchoDevice {
    fn exchange(&mut self, command: &ApduCommand) -> Result<Vec<u8>, DeviceCommunicationError> {
        self.log.lock().unwrap().push(command.clone());
        std::thread::sleep(self.delay);
        match command.ins {
            ins::SIGN_HASH => Ok(signature_answer(&command.data, &[0u8; 32])),
            _ => Ok(vec![]),
        }
    }
}

/// `[64][r][s]`
pub fn signature_answer(r: &[u8], s: &[u8]) -> Vec<u8> {
    let mut answer = vec![SIGNATURE_LENGTH as u8];
    answer.extend_from_slice(r);
    answer.extend_from_slice(s);
    answer
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
